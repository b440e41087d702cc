//! Parsed usecode representation
//!
//! A [`ParseResult`] owns every [`UsecodeFunction`] read from one listing;
//! each function owns its data segments and instructions outright.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Diagnostics, UnresolvedReference};

/// Decoded instruction operand
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operand {
    /// Immediate integer
    Immediate(u16),
    /// Absolute code address (relative jumps are normalised on decode)
    CodeAddress(u16),
    /// Reference to a data segment label `Lxxxx`
    DataLabel(u16),
    /// Zero-based index into the function's extern table
    ExternIndex(u16),
    /// Intrinsic id and the argument count declared at the call site
    Intrinsic { id: u16, argc: u8 },
    /// Local variable slot
    Slot(u16),
    /// Global flag number
    Flag(u16),
    /// Function number called directly
    Function(u16),
    /// Symbolic token such as `eventid` or `itemref`
    Bare(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "{:04X}H", value),
            Self::CodeAddress(addr) => write!(f, "{:04X}", addr),
            Self::DataLabel(label) => write!(f, "L{:04X}", label),
            Self::ExternIndex(index) => write!(f, "extern:{:04X}", index),
            Self::Intrinsic { id, argc } => write!(f, "{:04X}, {}", id, argc),
            Self::Slot(slot) => write!(f, "[{:04X}]", slot),
            Self::Flag(flag) => write!(f, "flag:{:04X}", flag),
            Self::Function(func) => write!(f, "func:{:04X}", func),
            Self::Bare(token) => write!(f, "{}", token),
        }
    }
}

/// Decoded data segment contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    /// Quoted text with the delimiters and terminator stripped
    Text(String),
    /// Raw byte dump
    Bytes(Vec<u8>),
}

/// A labelled block in a function's data section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSegment {
    /// Label text, `L` followed by four hex digits
    pub label: String,
    /// Offset within the data section (the label's numeric value)
    pub address: u16,
    pub payload: Payload,
}

impl DataSegment {
    pub fn is_string(&self) -> bool {
        matches!(self.payload, Payload::Text(_))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Bytes(_) => None,
        }
    }
}

/// Format a data offset as its label text
pub fn label_name(address: u16) -> String {
    format!("L{:04X}", address)
}

/// Intrinsic annotation attached by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Annotation {
    Intrinsic {
        id: u16,
        name: String,
        description: String,
    },
    UnresolvedIntrinsic {
        id: u16,
    },
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intrinsic {
                name, description, ..
            } => write!(f, "{}() # {}", name, description),
            Self::UnresolvedIntrinsic { id } => write!(f, "unresolved intrinsic {:04X}H", id),
        }
    }
}

/// Target bound to one operand by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    /// Jump landing on the instruction at `index` in the function
    Jump { target: u16, index: usize },
    /// String push bound to the data segment at `index`
    Label { label: u16, index: usize },
    /// Extern slot bound to a function number
    Extern { slot: u16, function: u16 },
    /// Direct call to a function number
    Function { function: u16 },
    Unresolved(UnresolvedReference),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved(_))
    }
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// Offset within the code section
    pub address: u16,
    pub opcode: u8,
    pub raw_bytes: Vec<u8>,
    /// Canonical mnemonic from the opcode table, `unknown` if absent
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    /// Intrinsic annotation, set by the resolver
    pub annotation: Option<Annotation>,
    /// Operand targets, set by the resolver
    pub resolutions: Vec<Resolution>,
    /// Trailing `;` comment from the listing, verbatim
    pub source_comment: Option<String>,
}

impl Instruction {
    pub fn is_unknown(&self) -> bool {
        self.mnemonic == UNKNOWN_MNEMONIC
    }

    /// `mnemonic operand, operand`
    pub fn listing(&self) -> String {
        if self.operands.is_empty() {
            return self.mnemonic.clone();
        }
        let operands: Vec<String> = self.operands.iter().map(|op| op.to_string()).collect();
        format!("{} {}", self.mnemonic, operands.join(", "))
    }
}

pub const UNKNOWN_MNEMONIC: &str = "unknown";

/// One usecode function record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsecodeFunction {
    pub func_number: u16,
    pub argc: u16,
    pub localc: u16,
    /// Declared `.externsize`, `None` when the listing omits it
    pub extern_size: Option<u16>,
    pub externs: Vec<u16>,
    pub data_segments: Vec<DataSegment>,
    pub instructions: Vec<Instruction>,
    /// Non-fatal findings recorded while parsing this function
    pub diagnostics: Diagnostics,
}

impl UsecodeFunction {
    pub fn new(func_number: u16) -> Self {
        Self {
            func_number,
            argc: 0,
            localc: 0,
            extern_size: None,
            externs: Vec::new(),
            data_segments: Vec::new(),
            instructions: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Declared extern count, falling back to the number of `.extern` lines
    pub fn extern_count(&self) -> usize {
        self.extern_size
            .map(|n| n as usize)
            .unwrap_or(self.externs.len())
    }

    pub fn segment(&self, label: u16) -> Option<&DataSegment> {
        self.segment_index(label).map(|i| &self.data_segments[i])
    }

    pub fn segment_index(&self, label: u16) -> Option<usize> {
        self.data_segments.iter().position(|s| s.address == label)
    }

    /// Index of the instruction at `address` (instructions are sorted)
    pub fn instruction_index(&self, address: u16) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&address, |inst| inst.address)
            .ok()
    }

    pub fn instruction_at(&self, address: u16) -> Option<&Instruction> {
        self.instruction_index(address).map(|i| &self.instructions[i])
    }

    pub fn string_segments(&self) -> impl Iterator<Item = &DataSegment> {
        self.data_segments.iter().filter(|s| s.is_string())
    }
}

/// All functions read from one disassembly listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseResult {
    functions: Vec<UsecodeFunction>,
    /// Findings outside any function (lines before the first `.funcnumber`)
    diagnostics: Diagnostics,
    #[serde(skip)]
    index: HashMap<u16, usize>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function, returning it back if the number is already taken
    pub(crate) fn insert(&mut self, function: UsecodeFunction) -> Result<(), UsecodeFunction> {
        if self.index.contains_key(&function.func_number) {
            return Err(function);
        }
        self.index.insert(function.func_number, self.functions.len());
        self.functions.push(function);
        Ok(())
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: crate::error::Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn get(&self, func_number: u16) -> Option<&UsecodeFunction> {
        self.index.get(&func_number).map(|&i| &self.functions[i])
    }

    pub fn get_mut(&mut self, func_number: u16) -> Option<&mut UsecodeFunction> {
        self.index.get(&func_number).map(|&i| &mut self.functions[i])
    }

    pub fn contains(&self, func_number: u16) -> bool {
        self.index.contains_key(&func_number)
    }

    /// Functions in file order
    pub fn iter(&self) -> std::slice::Iter<'_, UsecodeFunction> {
        self.functions.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, UsecodeFunction> {
        self.functions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl IntoIterator for ParseResult {
    type Item = UsecodeFunction;
    type IntoIter = std::vec::IntoIter<UsecodeFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParseResult {
    type Item = &'a UsecodeFunction;
    type IntoIter = std::slice::Iter<'a, UsecodeFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.iter()
    }
}
