//! Disassembly parser
//!
//! Line scanner over a usecode listing:
//!
//! ```text
//! .funcnumber 0096H
//! .data
//! L0000: db '@The sails must be furled before the planks are raised.@'
//!        db 00
//! .code
//! .argc 0001H
//! .localc 0000H
//! .externsize 0002H
//! .extern 08FFH
//! .extern 0829H
//! 0000: 48          push eventid
//! 0001: 1F 01 00    pushi 0001H
//! ```
//!
//! The scanner is an explicit state machine ([`ParserState`]) driven by the
//! directive table ([`Directive`]). Lines it cannot make sense of become
//! diagnostics on the nearest function; only structural violations are fatal.

use crate::error::{Diagnostic, DiagnosticKind, Error, Result};
use crate::lexer;
use crate::model::{
    DataSegment, Instruction, ParseResult, Payload, UsecodeFunction, UNKNOWN_MNEMONIC, label_name,
};
use crate::opcode::OpcodeTable;

/// Scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Before the first `.funcnumber`
    Seeking,
    /// After `.funcnumber`, before `.data`/`.code`
    InHeader,
    InData,
    InCode,
}

/// Directive keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    FuncNumber,
    Argc,
    Localc,
    ExternSize,
    Extern,
    Data,
    Code,
}

const DIRECTIVES: &[(&str, Directive)] = &[
    (".funcnumber", Directive::FuncNumber),
    (".argc", Directive::Argc),
    (".localc", Directive::Localc),
    (".externsize", Directive::ExternSize),
    (".extern", Directive::Extern),
    (".data", Directive::Data),
    (".code", Directive::Code),
];

impl Directive {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        DIRECTIVES
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(keyword))
            .map(|(_, d)| *d)
    }

    pub fn keyword(&self) -> &'static str {
        DIRECTIVES
            .iter()
            .find(|(_, d)| d == self)
            .map(|(k, _)| *k)
            .unwrap_or("")
    }

    /// Whether the directive carries a hex operand
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Data | Self::Code)
    }

    /// State after this directive is seen in `state`; `None` if not allowed
    pub fn transition(&self, state: ParserState) -> Option<ParserState> {
        match (self, state) {
            (Self::FuncNumber, _) => Some(ParserState::InHeader),
            (_, ParserState::Seeking) => None,
            (Self::Data, _) => Some(ParserState::InData),
            (Self::Code, _) => Some(ParserState::InCode),
            // Header directives may follow .data/.code in real listings
            (_, current) => Some(current),
        }
    }
}

/// Parse a hex word written as `0096H`, `0096` or `0x0096`
pub fn parse_hex_word(text: &str) -> Option<u16> {
    let text = text.trim();
    let text = text
        .strip_suffix('H')
        .or_else(|| text.strip_suffix('h'))
        .unwrap_or(text);
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if text.is_empty() || text.len() > 5 {
        return None;
    }
    u16::from_str_radix(text, 16).ok()
}

fn parse_hex_byte(text: &str) -> Option<u8> {
    let text = text.strip_suffix('H').unwrap_or(text);
    if text.is_empty() || text.len() > 2 {
        return None;
    }
    u8::from_str_radix(text, 16).ok()
}

fn is_byte_token(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Split off the first whitespace-delimited word
fn next_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(end) => Some((&text[..end], &text[end..])),
        None => Some((text, "")),
    }
}

/// Parse an `Lxxxx:` label token
fn parse_label(token: &str) -> Option<u16> {
    let hex = token.strip_prefix('L')?;
    if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

/// One `db` operand run
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Quoted(String),
    Bytes(Vec<u8>),
}

/// Parse the text after `db`
fn parse_db(text: &str) -> Option<Vec<Piece>> {
    let text = text.trim();
    let mut pieces = Vec::new();
    if text.is_empty() {
        return Some(pieces);
    }

    let rest = if let Some(body) = text.strip_prefix('\'') {
        // Last quote closes the literal; whatever follows must be bytes
        match body.rfind('\'') {
            Some(end) => {
                pieces.push(Piece::Quoted(body[..end].to_string()));
                body[end + 1..].trim_start().trim_start_matches(',')
            }
            None => {
                pieces.push(Piece::Quoted(body.to_string()));
                ""
            }
        }
    } else {
        text
    };

    let bytes: Option<Vec<u8>> = rest
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(parse_hex_byte)
        .collect();
    let bytes = bytes?;
    if !bytes.is_empty() {
        pieces.push(Piece::Bytes(bytes));
    }
    Some(pieces)
}

/// Parse the text after `db`, dropping a trailing `; comment`.
///
/// A `;` may sit inside a quoted literal, so the longest prefix that still
/// parses wins.
fn parse_db_line(text: &str) -> Option<Vec<Piece>> {
    parse_db(text).or_else(|| {
        text.rmatch_indices(';')
            .find_map(|(at, _)| parse_db(&text[..at]))
    })
}

/// Data segment under construction
#[derive(Debug)]
struct SegmentBuilder {
    label: u16,
    line: usize,
    pieces: Vec<Piece>,
}

impl SegmentBuilder {
    /// Decode the accumulated pieces, returning the segment and any findings
    fn finish(self) -> (DataSegment, Vec<Diagnostic>) {
        let mut notes = Vec::new();
        let mut ambiguous = |reason: &str| {
            notes.push(Diagnostic::at_line(
                self.line,
                DiagnosticKind::AmbiguousString {
                    label: self.label,
                    reason: reason.to_string(),
                },
            ));
        };

        let payload = match self.pieces.first() {
            Some(Piece::Quoted(_)) => {
                let mut text = String::new();
                let last = self.pieces.len() - 1;
                for (i, piece) in self.pieces.iter().enumerate() {
                    match piece {
                        Piece::Quoted(s) => {
                            if s.contains('\'') {
                                ambiguous("quote character inside literal");
                            }
                            text.push_str(s);
                        }
                        Piece::Bytes(bytes) => {
                            for (j, &b) in bytes.iter().enumerate() {
                                let terminal = i == last && j == bytes.len() - 1;
                                if b == 0 && terminal {
                                    break;
                                }
                                if b == 0 {
                                    ambiguous("terminator byte before end of segment");
                                }
                                text.push(char::from(b));
                            }
                        }
                    }
                }
                Payload::Text(text)
            }
            _ => {
                let mut bytes = Vec::new();
                for piece in &self.pieces {
                    match piece {
                        Piece::Bytes(b) => bytes.extend_from_slice(b),
                        Piece::Quoted(s) => {
                            bytes.extend(s.chars().map(|c| u8::try_from(c).unwrap_or(b'?')))
                        }
                    }
                }
                Payload::Bytes(bytes)
            }
        };

        let segment = DataSegment {
            label: label_name(self.label),
            address: self.label,
            payload,
        };
        (segment, notes)
    }
}

/// Function record under construction
#[derive(Debug)]
struct FunctionBuilder {
    function: UsecodeFunction,
    /// Line of the `.funcnumber` directive
    line: usize,
    header: String,
    has_argc: bool,
    has_localc: bool,
    segment: Option<SegmentBuilder>,
}

impl FunctionBuilder {
    fn warn(&mut self, diagnostic: Diagnostic) {
        self.function.diagnostics.push(diagnostic);
    }

    fn close_segment(&mut self) {
        if let Some(builder) = self.segment.take() {
            let (segment, notes) = builder.finish();
            self.function.diagnostics.extend(notes);
            self.function.data_segments.push(segment);
        }
    }

    fn finish(mut self) -> Result<UsecodeFunction> {
        self.close_segment();
        let number = self.function.func_number;
        if !self.has_argc {
            return Err(Error::malformed(
                self.line,
                format!("'.argc' directive in function {:04X}", number),
                &self.header,
            ));
        }
        if !self.has_localc {
            return Err(Error::malformed(
                self.line,
                format!("'.localc' directive in function {:04X}", number),
                &self.header,
            ));
        }
        if let Some(declared) = self.function.extern_size {
            let found = self.function.externs.len();
            if declared as usize != found {
                let line = self.line;
                self.warn(Diagnostic::at_line(
                    line,
                    DiagnosticKind::ExternCountMismatch { declared, found },
                ));
            }
        }
        self.function.data_segments.sort_by_key(|s| s.address);
        tracing::debug!(
            "closed function {:04X}: {} segment(s), {} instruction(s)",
            number,
            self.function.data_segments.len(),
            self.function.instructions.len()
        );
        Ok(self.function)
    }
}

/// Usecode disassembly parser
pub struct Parser<'t> {
    opcodes: &'t OpcodeTable,
    state: ParserState,
    current: Option<FunctionBuilder>,
    result: ParseResult,
}

impl Default for Parser<'static> {
    fn default() -> Self {
        Self::new(OpcodeTable::standard())
    }
}

impl<'t> Parser<'t> {
    pub fn new(opcodes: &'t OpcodeTable) -> Self {
        Self {
            opcodes,
            state: ParserState::Seeking,
            current: None,
            result: ParseResult::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Parse a complete listing
    pub fn parse(mut self, source: &str) -> Result<ParseResult> {
        for (i, line) in source.lines().enumerate() {
            self.parse_line(i + 1, line)?;
        }
        self.close_function()?;
        tracing::debug!("parsed {} function(s)", self.result.len());
        Ok(self.result)
    }

    fn parse_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            return Ok(());
        }

        if trimmed.starts_with('.') {
            return self.parse_directive(line_no, trimmed);
        }

        match self.state {
            ParserState::InData => self.parse_data_line(line_no, trimmed),
            ParserState::InCode => self.parse_code_line(line_no, trimmed),
            ParserState::InHeader | ParserState::Seeking => {
                self.unrecognized(line_no, trimmed);
            }
        }
        Ok(())
    }

    fn unrecognized(&mut self, line_no: usize, text: &str) {
        let diagnostic = Diagnostic::at_line(
            line_no,
            DiagnosticKind::UnrecognizedLine {
                text: text.to_string(),
            },
        );
        match self.current.as_mut() {
            Some(builder) => builder.warn(diagnostic),
            None => self.result.push_diagnostic(diagnostic),
        }
    }

    fn close_function(&mut self) -> Result<()> {
        let Some(builder) = self.current.take() else {
            return Ok(());
        };
        let line = builder.line;
        let header = builder.header.clone();
        let function = builder.finish()?;
        let number = function.func_number;
        self.result.insert(function).map_err(|_| {
            Error::malformed(line, format!("unique function number (0x{:04X} repeats)", number), &header)
        })
    }

    fn parse_directive(&mut self, line_no: usize, text: &str) -> Result<()> {
        let (keyword, rest) = next_word(text).unwrap_or((text, ""));
        let directive = Directive::from_keyword(keyword)
            .ok_or_else(|| Error::malformed(line_no, "a known directive", text))?;

        let next = directive.transition(self.state).ok_or_else(|| {
            Error::malformed(
                line_no,
                format!("'.funcnumber' before '{}'", directive.keyword()),
                text,
            )
        })?;

        let value = if directive.takes_value() {
            let word = next_word(rest).map(|(w, _)| w).unwrap_or("");
            Some(parse_hex_word(word).ok_or_else(|| {
                Error::malformed(
                    line_no,
                    format!("hex operand after '{}'", directive.keyword()),
                    text,
                )
            })?)
        } else {
            None
        };

        if directive == Directive::FuncNumber {
            self.close_function()?;
            let number = value.unwrap_or_default();
            tracing::debug!("opened function {:04X} at line {}", number, line_no);
            self.current = Some(FunctionBuilder {
                function: UsecodeFunction::new(number),
                line: line_no,
                header: text.to_string(),
                has_argc: false,
                has_localc: false,
                segment: None,
            });
            self.state = next;
            return Ok(());
        }

        // Every other directive needs an open function (checked by transition)
        let Some(builder) = self.current.as_mut() else {
            return Err(Error::malformed(line_no, "'.funcnumber' first", text));
        };
        builder.close_segment();
        let value = value.unwrap_or_default();
        match directive {
            Directive::Argc => {
                builder.function.argc = value;
                builder.has_argc = true;
            }
            Directive::Localc => {
                builder.function.localc = value;
                builder.has_localc = true;
            }
            Directive::ExternSize => builder.function.extern_size = Some(value),
            Directive::Extern => builder.function.externs.push(value),
            Directive::Data | Directive::Code | Directive::FuncNumber => {}
        }
        self.state = next;
        Ok(())
    }

    fn parse_data_line(&mut self, line_no: usize, text: &str) {
        let Some(builder) = self.current.as_mut() else {
            return;
        };

        let (label, body) = match text.split_once(':') {
            Some((head, body)) if parse_label(head.trim()).is_some() => {
                (parse_label(head.trim()), body)
            }
            _ => (None, text),
        };

        let body = body.trim();
        let pieces = if (body.is_empty() || body.starts_with(';')) && label.is_some() {
            Some(Vec::new())
        } else {
            match next_word(body) {
                Some((db, rest)) if db.eq_ignore_ascii_case("db") => parse_db_line(rest),
                _ => None,
            }
        };
        let Some(pieces) = pieces else {
            self.unrecognized(line_no, text);
            return;
        };

        match label {
            Some(label) => {
                builder.close_segment();
                let taken = builder.function.data_segments.iter().any(|s| s.address == label);
                if taken {
                    builder.warn(Diagnostic::at_line(line_no, DiagnosticKind::DuplicateLabel { label }));
                    return;
                }
                builder.segment = Some(SegmentBuilder {
                    label,
                    line: line_no,
                    pieces,
                });
            }
            None => match builder.segment.as_mut() {
                Some(segment) => segment.pieces.extend(pieces),
                None => self.unrecognized(line_no, text),
            },
        }
    }

    fn parse_code_line(&mut self, line_no: usize, text: &str) {
        match self.decode_instruction(line_no, text) {
            Some(instruction) => {
                let Some(builder) = self.current.as_mut() else {
                    return;
                };
                if let Some(last) = builder.function.instructions.last() {
                    if instruction.address <= last.address {
                        builder.warn(Diagnostic::at_line(
                            line_no,
                            DiagnosticKind::NonMonotonicAddress {
                                address: instruction.address,
                            },
                        ));
                        return;
                    }
                }
                tracing::trace!("{:04X}: {}", instruction.address, instruction.listing());
                builder.function.instructions.push(instruction);
            }
            None => self.unrecognized(line_no, text),
        }
    }

    /// Decode `<addr>: <bytes> <mnemonic> [operands] [; comment]`
    fn decode_instruction(&mut self, line_no: usize, text: &str) -> Option<Instruction> {
        let (body, comment) = match text.split_once(';') {
            Some((body, comment)) => (body, Some(comment.trim().to_string())),
            None => (text, None),
        };

        let (addr, rest) = body.split_once(':')?;
        let addr = addr.trim();
        if addr.is_empty() || addr.len() > 4 || !addr.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let address = u16::from_str_radix(addr, 16).ok()?;

        let mut raw_bytes = Vec::new();
        let mut rest = rest;
        while let Some((word, tail)) = next_word(rest) {
            if !is_byte_token(word) {
                break;
            }
            raw_bytes.push(u8::from_str_radix(word, 16).ok()?);
            rest = tail;
        }
        let (_listed_mnemonic, operand_text) = next_word(rest)?;
        let opcode = *raw_bytes.first()?;

        let mut instruction = Instruction {
            address,
            opcode,
            raw_bytes,
            mnemonic: UNKNOWN_MNEMONIC.to_string(),
            operands: Vec::new(),
            annotation: None,
            resolutions: Vec::new(),
            source_comment: comment.filter(|c| !c.is_empty()),
        };

        let opcodes = self.opcodes;
        let Some(info) = opcodes.lookup(opcode) else {
            self.warn(line_no, DiagnosticKind::UnknownOpcode { opcode });
            return Some(instruction);
        };
        instruction.mnemonic = info.mnemonic.to_string();

        let length = info.length();
        if instruction.raw_bytes.len() > length {
            self.warn(
                line_no,
                DiagnosticKind::LengthMismatch {
                    opcode,
                    expected: length,
                    found: instruction.raw_bytes.len(),
                },
            );
            instruction.raw_bytes.truncate(length);
        }

        match info.layout.decode(address, &instruction.raw_bytes) {
            Ok(operands) => instruction.operands = operands,
            Err(err) => match lexer::operands_from_listing(info.layout, operand_text) {
                Some(operands) => {
                    instruction.operands = operands;
                    self.warn(
                        line_no,
                        DiagnosticKind::OperandDecode {
                            message: format!("{}; using listed operands", err),
                        },
                    );
                }
                None => self.warn(
                    line_no,
                    DiagnosticKind::OperandDecode {
                        message: err.to_string(),
                    },
                ),
            },
        }
        Some(instruction)
    }

    fn warn(&mut self, line_no: usize, kind: DiagnosticKind) {
        if let Some(builder) = self.current.as_mut() {
            builder.warn(Diagnostic::at_line(line_no, kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operand;

    fn parse(source: &str) -> Result<ParseResult> {
        Parser::default().parse(source)
    }

    const HEADER: &str = ".funcnumber 0010H\n.argc 0000H\n.localc 0000H\n";

    #[test]
    fn test_directive_table() {
        assert_eq!(Directive::from_keyword(".funcnumber"), Some(Directive::FuncNumber));
        assert_eq!(Directive::from_keyword(".EXTERN"), Some(Directive::Extern));
        assert_eq!(Directive::from_keyword(".msize"), None);
        assert_eq!(Directive::Extern.keyword(), ".extern");
        assert_eq!(Directive::Data.transition(ParserState::Seeking), None);
        assert_eq!(
            Directive::Argc.transition(ParserState::InCode),
            Some(ParserState::InCode)
        );
        assert_eq!(
            Directive::FuncNumber.transition(ParserState::InData),
            Some(ParserState::InHeader)
        );
    }

    #[test]
    fn test_parse_hex_word() {
        assert_eq!(parse_hex_word("0096H"), Some(0x96));
        assert_eq!(parse_hex_word("08FF"), Some(0x8FF));
        assert_eq!(parse_hex_word("0x10"), Some(0x10));
        assert_eq!(parse_hex_word("xyz"), None);
        assert_eq!(parse_hex_word(""), None);
    }

    #[test]
    fn test_header_values() {
        let source = "\
.funcnumber 0096H
.code
.argc 0001H
.localc 0003H
.externsize 0002H
.extern 08FFH
.extern 0829H
";
        let result = parse(source).unwrap();
        let func = result.get(0x96).unwrap();
        assert_eq!(func.argc, 1);
        assert_eq!(func.localc, 3);
        assert_eq!(func.extern_size, Some(2));
        assert_eq!(func.externs, vec![0x08FF, 0x0829]);
        assert!(func.diagnostics.is_empty());
    }

    #[test]
    fn test_string_segment_with_terminator() {
        let source = format!("{}.data\nL0000: db '@Hello@'\n       db 00\n", HEADER);
        let result = parse(&source).unwrap();
        let seg = &result.get(0x10).unwrap().data_segments[0];
        assert_eq!(seg.label, "L0000");
        assert!(seg.is_string());
        assert_eq!(seg.text(), Some("@Hello@"));
    }

    #[test]
    fn test_multiline_string_accumulates() {
        let source = format!(
            "{}.data\nL0000: db 'first part, '\n db 'second part'\n db 00\nL0020: db 05, 06\n",
            HEADER
        );
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.data_segments.len(), 2);
        assert_eq!(func.data_segments[0].text(), Some("first part, second part"));
        assert_eq!(func.data_segments[1].payload, Payload::Bytes(vec![5, 6]));
        assert!(!func.data_segments[1].is_string());
    }

    #[test]
    fn test_inline_terminator_and_embedded_quote() {
        let source = format!("{}.data\nL0000: db 'It's here', 00\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.data_segments[0].text(), Some("It's here"));
        assert!(func
            .diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::AmbiguousString { .. })));
    }

    #[test]
    fn test_embedded_terminator_flagged() {
        let source = format!("{}.data\nL0000: db 'a'\n db 00\n db 'b'\n db 00\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.data_segments[0].text(), Some("a\u{0}b"));
        assert_eq!(func.diagnostics.len(), 1);
    }

    #[test]
    fn test_data_line_comments() {
        let source = format!(
            "{}.data\nL0000: db 'Hi' ; greeting\n       db 00 ; end\nL0010: db 'a;b' ; it's\n db 00\nL0020: ; empty\n",
            HEADER
        );
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert!(func.diagnostics.is_empty(), "{}", func.diagnostics);
        assert_eq!(func.data_segments.len(), 3);
        assert_eq!(func.data_segments[0].text(), Some("Hi"));
        assert_eq!(func.data_segments[1].text(), Some("a;b"));
        assert_eq!(func.data_segments[2].label, "L0020");
    }

    #[test]
    fn test_instruction_decoding() {
        let source = format!(
            "{}.code\n0000: 48          push eventid\n0001: 1F 01 00    pushi 0001H  ; one\n0004: 38 88 00 02 callis 0088, 2\n",
            HEADER
        );
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.instructions.len(), 3);

        let push = &func.instructions[0];
        assert_eq!(push.mnemonic, "push");
        assert_eq!(push.operands, vec![Operand::Bare("eventid".into())]);

        let pushi = &func.instructions[1];
        assert_eq!(pushi.raw_bytes, vec![0x1F, 0x01, 0x00]);
        assert_eq!(pushi.operands, vec![Operand::Immediate(1)]);
        assert_eq!(pushi.source_comment.as_deref(), Some("one"));

        let callis = &func.instructions[2];
        assert_eq!(callis.operands, vec![Operand::Intrinsic { id: 0x88, argc: 2 }]);
    }

    #[test]
    fn test_unknown_opcode_retained() {
        let source = format!("{}.code\n0000: EE 01    mystery 01\n0002: 25    ret\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.instructions.len(), 2);
        assert!(func.instructions[0].is_unknown());
        assert!(func.instructions[0].operands.is_empty());
        assert_eq!(func.instructions[1].mnemonic, "ret");
        assert!(matches!(
            func.diagnostics.iter().next().unwrap().kind,
            DiagnosticKind::UnknownOpcode { opcode: 0xEE }
        ));
    }

    #[test]
    fn test_truncated_bytes_use_listing() {
        let source = format!("{}.code\n0000: 05 10    jne 0040\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.instructions[0].operands, vec![Operand::CodeAddress(0x40)]);
        assert!(matches!(
            func.diagnostics.iter().next().unwrap().kind,
            DiagnosticKind::OperandDecode { .. }
        ));
    }

    #[test]
    fn test_extra_bytes_dropped_and_flagged() {
        let source = format!("{}.code\n0000: 1F 01 00 05 pushi 0001H\n0004: 25 ret\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        let pushi = &func.instructions[0];
        assert_eq!(pushi.raw_bytes, vec![0x1F, 0x01, 0x00]);
        assert_eq!(pushi.operands, vec![Operand::Immediate(1)]);
        assert_eq!(func.diagnostics.len(), 1);
        let diagnostic = func.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.line, Some(5));
        assert_eq!(
            diagnostic.kind,
            DiagnosticKind::LengthMismatch { opcode: 0x1F, expected: 3, found: 4 }
        );
    }

    #[test]
    fn test_unrecognized_line_is_skipped() {
        let source = format!("{}.code\n0000: 48 push eventid\ngarbage here\n0001: 25 ret\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.instructions.len(), 2);
        assert_eq!(func.diagnostics.len(), 1);
        assert_eq!(func.diagnostics.iter().next().unwrap().line, Some(6));
    }

    #[test]
    fn test_non_monotonic_address_skipped() {
        let source = format!("{}.code\n0001: 25 ret\n0001: 25 ret\n0000: 25 ret\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.instructions.len(), 1);
        assert_eq!(func.diagnostics.len(), 2);
    }

    #[test]
    fn test_code_before_funcnumber_is_fatal() {
        let err = parse(".code\n0000: 25 ret\n").unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 1, .. }));
    }

    #[test]
    fn test_unknown_directive_is_fatal() {
        let err = parse(&format!("{}.bogus 0001H\n", HEADER)).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 4, .. }));
    }

    #[test]
    fn test_missing_argc_is_fatal() {
        let err = parse(".funcnumber 0001H\n.localc 0000H\n.code\n").unwrap_err();
        assert!(err.to_string().contains(".argc"));
    }

    #[test]
    fn test_duplicate_function_is_fatal() {
        let source = format!("{}{}", HEADER, HEADER);
        assert!(parse(&source).is_err());
    }

    #[test]
    fn test_extern_count_mismatch_warns() {
        let source = format!("{}.externsize 0002H\n.extern 0400H\n", HEADER);
        let result = parse(&source).unwrap();
        let func = result.get(0x10).unwrap();
        assert_eq!(func.extern_size, Some(2));
        assert_eq!(func.externs.len(), 1);
        assert!(matches!(
            func.diagnostics.iter().next().unwrap().kind,
            DiagnosticKind::ExternCountMismatch { declared: 2, found: 1 }
        ));
    }

    #[test]
    fn test_preamble_lines_recorded_on_result() {
        let source = format!("usecode listing\n{}", HEADER);
        let result = parse(&source).unwrap();
        assert_eq!(result.diagnostics().len(), 1);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_functions_in_file_order() {
        let source = "\
.funcnumber 0200H
.argc 0000H
.localc 0000H
.funcnumber 0100H
.argc 0002H
.localc 0001H
";
        let result = parse(source).unwrap();
        let order: Vec<u16> = result.iter().map(|f| f.func_number).collect();
        assert_eq!(order, vec![0x200, 0x100]);
        assert_eq!(result.get(0x100).unwrap().argc, 2);
    }
}
