//! Error and diagnostic types for the usecode converter
//!
//! Fatal problems (a structurally broken listing, unreadable configuration)
//! are reported through [`Error`]. Everything else is a [`Diagnostic`]: it is
//! recorded against the function it concerns and processing carries on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Structural violation in the disassembly listing
    #[error("malformed input at line {line}: expected {expected}, found '{found}'")]
    MalformedInput {
        line: usize,
        expected: String,
        found: String,
    },

    /// Configuration or dataset error
    #[error("configuration error: {message}")]
    Config { message: String },

    /// JSON export error
    #[error("serialization error: {message}")]
    Serialize { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(line: usize, expected: impl Into<String>, found: &str) -> Self {
        Error::MalformedInput {
            line,
            expected: expected.into(),
            found: found.trim().to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize {
            message: err.to_string(),
        }
    }
}

/// Severity of a non-fatal finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Note,
}

/// A reference the resolver could not bind to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnresolvedReference {
    /// Jump/branch target with no instruction at that address
    JumpTarget(u16),
    /// String push naming a label absent from the data section
    DataLabel(u16),
    /// Indexed call past the end of the extern table
    ExternIndex(u16),
    /// Intrinsic id absent from the intrinsic table
    Intrinsic(u16),
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JumpTarget(addr) => write!(f, "jump target {:04X}", addr),
            Self::DataLabel(label) => write!(f, "data label L{:04X}", label),
            Self::ExternIndex(index) => write!(f, "extern index {}", index),
            Self::Intrinsic(id) => write!(f, "intrinsic {:04X}H", id),
        }
    }
}

/// Kind of non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Line matched no known pattern and was skipped
    UnrecognizedLine { text: String },
    /// Opcode byte missing from the opcode table
    UnknownOpcode { opcode: u8 },
    /// Raw bytes did not cover the opcode's operand layout
    OperandDecode { message: String },
    /// Line lists more bytes than the opcode encodes; the extra bytes are dropped
    LengthMismatch { opcode: u8, expected: usize, found: usize },
    /// Instruction address not above the previous one
    NonMonotonicAddress { address: u16 },
    /// `.externsize` disagrees with the number of `.extern` lines
    ExternCountMismatch { declared: u16, found: usize },
    /// Data label already used in the same function
    DuplicateLabel { label: u16 },
    /// String payload with a terminator-like byte or quote in its body
    AmbiguousString { label: u16, reason: String },
    /// Reference left unresolved by the resolver
    Unresolved(UnresolvedReference),
    /// Intrinsic table parameter count differs from the call's declared count
    ArgCountMismatch { id: u16, declared: u8, expected: u8 },
}

/// A non-fatal finding attached to a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Source line (1-based), when the finding came from the parser
    pub line: Option<usize>,
    /// Instruction address, when the finding concerns one instruction
    pub address: Option<u16>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn at_line(line: usize, kind: DiagnosticKind) -> Self {
        Self {
            line: Some(line),
            address: None,
            kind,
        }
    }

    pub fn at_address(address: u16, kind: DiagnosticKind) -> Self {
        Self {
            line: None,
            address: Some(address),
            kind,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.kind {
            DiagnosticKind::ArgCountMismatch { .. } | DiagnosticKind::Unresolved(_) => {
                Severity::Note
            }
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        if let Some(address) = self.address {
            write!(f, "{:04X}: ", address)?;
        }
        match &self.kind {
            DiagnosticKind::UnrecognizedLine { text } => {
                write!(f, "unrecognized line '{}'", text)
            }
            DiagnosticKind::UnknownOpcode { opcode } => {
                write!(f, "unknown opcode {:02X}", opcode)
            }
            DiagnosticKind::OperandDecode { message } => write!(f, "{}", message),
            DiagnosticKind::LengthMismatch { opcode, expected, found } => write!(
                f,
                "opcode {:02X} encodes {} byte(s), line lists {}; extra bytes dropped",
                opcode, expected, found
            ),
            DiagnosticKind::NonMonotonicAddress { address } => {
                write!(f, "instruction address {:04X} is not increasing, skipped", address)
            }
            DiagnosticKind::ExternCountMismatch { declared, found } => {
                write!(f, ".externsize declares {} but {} .extern line(s) found", declared, found)
            }
            DiagnosticKind::DuplicateLabel { label } => {
                write!(f, "duplicate data label L{:04X}, segment skipped", label)
            }
            DiagnosticKind::AmbiguousString { label, reason } => {
                write!(f, "string L{:04X}: {}", label, reason)
            }
            DiagnosticKind::Unresolved(reference) => write!(f, "unresolved {}", reference),
            DiagnosticKind::ArgCountMismatch { id, declared, expected } => write!(
                f,
                "intrinsic {:04X}H called with {} argument(s), table expects {}",
                id, declared, expected
            ),
        }
    }
}

/// Collection of diagnostics for error recovery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => tracing::warn!("{}", diagnostic),
            Severity::Note => tracing::debug!("{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in other {
            self.push(diagnostic);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of findings with the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity() == severity).count()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} diagnostic(s):", self.items.len())?;
        for (i, diagnostic) in self.items.iter().enumerate() {
            writeln!(f, "[{}] {}", i + 1, diagnostic)?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
