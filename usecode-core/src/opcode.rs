//! Usecode opcode table
//!
//! Maps every one-byte opcode to its mnemonic and to an [`OperandLayout`],
//! which fixes both the encoded length of the instruction and the function
//! used to decode its operand bytes.

use once_cell::sync::Lazy;

use crate::model::Operand;

/// Operand encoding of an opcode (all multi-byte fields little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operands
    None,
    /// No operand bytes, but an implied symbolic operand (`push eventid`)
    Implicit(&'static str),
    /// 8-bit immediate
    Imm8,
    /// 16-bit immediate
    Imm16,
    /// 16-bit offset into the data section
    Data16,
    /// Signed 16-bit jump, relative to the next instruction
    Jump16,
    /// 16-bit immediate followed by a relative jump (`cmps`)
    CaseJump,
    /// Four variable slots followed by a relative jump (`loop`)
    Loop,
    /// 16-bit local variable slot
    Slot16,
    /// 16-bit global flag number
    Flag16,
    /// 16-bit index into the function's extern table
    Extern16,
    /// 16-bit intrinsic id plus 8-bit declared argument count
    Intrinsic,
    /// 16-bit function number called directly
    Function16,
}

/// Raw bytes too short for the opcode's layout
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("opcode {opcode:02X} needs {expected} byte(s), line lists {found}")]
pub struct DecodeError {
    pub opcode: u8,
    pub expected: usize,
    pub found: usize,
}

fn word(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

impl OperandLayout {
    /// Number of operand bytes following the opcode byte
    pub fn operand_len(&self) -> usize {
        match self {
            Self::None | Self::Implicit(_) => 0,
            Self::Imm8 => 1,
            Self::Imm16
            | Self::Data16
            | Self::Jump16
            | Self::Slot16
            | Self::Flag16
            | Self::Extern16
            | Self::Function16 => 2,
            Self::Intrinsic => 3,
            Self::CaseJump => 4,
            Self::Loop => 10,
        }
    }

    /// Decodes the operands of an instruction located at `address`.
    ///
    /// `bytes` is the full encoded instruction, opcode byte included.
    pub fn decode(&self, address: u16, bytes: &[u8]) -> Result<Vec<Operand>, DecodeError> {
        let length = 1 + self.operand_len();
        if bytes.len() < length {
            return Err(DecodeError {
                opcode: bytes.first().copied().unwrap_or(0),
                expected: length,
                found: bytes.len(),
            });
        }

        let next = address.wrapping_add(length as u16);
        let operands = match self {
            Self::None => Vec::new(),
            Self::Implicit(token) => vec![Operand::Bare(token.to_string())],
            Self::Imm8 => vec![Operand::Immediate(bytes[1] as u16)],
            Self::Imm16 => vec![Operand::Immediate(word(bytes, 1))],
            Self::Data16 => vec![Operand::DataLabel(word(bytes, 1))],
            Self::Jump16 => vec![Operand::CodeAddress(next.wrapping_add(word(bytes, 1)))],
            Self::CaseJump => vec![
                Operand::Immediate(word(bytes, 1)),
                Operand::CodeAddress(next.wrapping_add(word(bytes, 3))),
            ],
            Self::Loop => vec![
                Operand::Slot(word(bytes, 1)),
                Operand::Slot(word(bytes, 3)),
                Operand::Slot(word(bytes, 5)),
                Operand::Slot(word(bytes, 7)),
                Operand::CodeAddress(next.wrapping_add(word(bytes, 9))),
            ],
            Self::Slot16 => vec![Operand::Slot(word(bytes, 1))],
            Self::Flag16 => vec![Operand::Flag(word(bytes, 1))],
            Self::Extern16 => vec![Operand::ExternIndex(word(bytes, 1))],
            Self::Intrinsic => vec![Operand::Intrinsic {
                id: word(bytes, 1),
                argc: bytes[3],
            }],
            Self::Function16 => vec![Operand::Function(word(bytes, 1))],
        };
        Ok(operands)
    }
}

/// One opcode table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub layout: OperandLayout,
}

impl OpcodeInfo {
    const fn new(opcode: u8, mnemonic: &'static str, layout: OperandLayout) -> Self {
        Self {
            opcode,
            mnemonic,
            layout,
        }
    }

    /// Encoded length in bytes, opcode included
    pub fn length(&self) -> usize {
        1 + self.layout.operand_len()
    }
}

use OperandLayout as L;

const OPCODES: &[OpcodeInfo] = &[
    // Control flow
    OpcodeInfo::new(0x02, "loop", L::Loop),
    OpcodeInfo::new(0x04, "startconv", L::Jump16),
    OpcodeInfo::new(0x05, "jne", L::Jump16),
    OpcodeInfo::new(0x06, "jmp", L::Jump16),
    OpcodeInfo::new(0x07, "cmps", L::CaseJump),
    // Arithmetic / logic
    OpcodeInfo::new(0x09, "add", L::None),
    OpcodeInfo::new(0x0A, "sub", L::None),
    OpcodeInfo::new(0x0B, "div", L::None),
    OpcodeInfo::new(0x0C, "mul", L::None),
    OpcodeInfo::new(0x0D, "mod", L::None),
    OpcodeInfo::new(0x0E, "and", L::None),
    OpcodeInfo::new(0x0F, "or", L::None),
    OpcodeInfo::new(0x10, "not", L::None),
    // Stack
    OpcodeInfo::new(0x12, "pop", L::Slot16),
    OpcodeInfo::new(0x13, "push", L::Implicit("true")),
    OpcodeInfo::new(0x14, "push", L::Implicit("false")),
    // Comparison
    OpcodeInfo::new(0x16, "cmpgt", L::None),
    OpcodeInfo::new(0x17, "cmplt", L::None),
    OpcodeInfo::new(0x18, "cmpge", L::None),
    OpcodeInfo::new(0x19, "cmple", L::None),
    OpcodeInfo::new(0x1A, "cmpne", L::None),
    // Strings, arrays, immediates
    OpcodeInfo::new(0x1C, "addsi", L::Data16),
    OpcodeInfo::new(0x1D, "pushs", L::Data16),
    OpcodeInfo::new(0x1E, "arrc", L::Imm16),
    OpcodeInfo::new(0x1F, "pushi", L::Imm16),
    OpcodeInfo::new(0x21, "push", L::Slot16),
    OpcodeInfo::new(0x22, "cmpeq", L::None),
    // Calls and returns
    OpcodeInfo::new(0x24, "call", L::Extern16),
    OpcodeInfo::new(0x25, "ret", L::None),
    OpcodeInfo::new(0x26, "aidx", L::Slot16),
    OpcodeInfo::new(0x2C, "ret2", L::None),
    OpcodeInfo::new(0x2D, "setr", L::None),
    OpcodeInfo::new(0x2E, "initloop", L::None),
    OpcodeInfo::new(0x2F, "addsv", L::Slot16),
    OpcodeInfo::new(0x30, "in", L::None),
    OpcodeInfo::new(0x32, "rts", L::None),
    OpcodeInfo::new(0x33, "say", L::None),
    OpcodeInfo::new(0x38, "callis", L::Intrinsic),
    OpcodeInfo::new(0x39, "calli", L::Intrinsic),
    OpcodeInfo::new(0x3E, "push", L::Implicit("itemref")),
    OpcodeInfo::new(0x3F, "abrt", L::None),
    OpcodeInfo::new(0x40, "endconv", L::None),
    // Flags and misc
    OpcodeInfo::new(0x42, "pushf", L::Flag16),
    OpcodeInfo::new(0x43, "popf", L::Flag16),
    OpcodeInfo::new(0x44, "pushb", L::Imm8),
    OpcodeInfo::new(0x46, "popv", L::Slot16),
    OpcodeInfo::new(0x47, "calle", L::Function16),
    OpcodeInfo::new(0x48, "push", L::Implicit("eventid")),
    OpcodeInfo::new(0x4A, "arra", L::None),
    OpcodeInfo::new(0x4B, "pop", L::Implicit("eventid")),
];

static STANDARD: Lazy<OpcodeTable> = Lazy::new(|| OpcodeTable::from_entries(OPCODES));

/// Read-only opcode lookup table, indexed by opcode byte
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    slots: [Option<OpcodeInfo>; 256],
}

impl OpcodeTable {
    fn from_entries(entries: &[OpcodeInfo]) -> Self {
        let mut slots = [None; 256];
        for entry in entries {
            slots[entry.opcode as usize] = Some(*entry);
        }
        Self { slots }
    }

    /// The usecode opcode set, built once per process
    pub fn standard() -> &'static OpcodeTable {
        &STANDARD
    }

    pub fn lookup(&self, opcode: u8) -> Option<&OpcodeInfo> {
        self.slots[opcode as usize].as_ref()
    }

    /// Entries in opcode order
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
