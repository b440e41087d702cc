//! Operand lexer
//!
//! Tokenizes the operand field of an instruction line (`pushs L0039`,
//! `callis 0088H@2`, `pop [0001]`). The tokens are only consulted when the
//! raw bytes on a line are too short to decode, so the listing text stands in
//! for the missing bytes.

use logos::Logos;

use crate::model::Operand;
use crate::opcode::OperandLayout;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
pub enum OperandToken {
    /// Data label `L0039`
    #[regex(r"L[0-9A-Fa-f]{4}", |lex| u16::from_str_radix(&lex.slice()[1..], 16).ok(), priority = 10)]
    Label(u16),

    /// Variable slot `[0001]`
    #[regex(r"\[[0-9A-Fa-f]+\]", |lex| {
        let s = lex.slice();
        u16::from_str_radix(&s[1..s.len() - 1], 16).ok()
    })]
    Slot(u16),

    /// Hex word with suffix `0001H`
    #[regex(r"[0-9A-Fa-f]+H", |lex| {
        let s = lex.slice();
        u32::from_str_radix(&s[..s.len() - 1], 16).ok()
    }, priority = 5)]
    HexWord(u32),

    /// Bare hex number `0040`, `A0F3`; wins over `Ident` on equal length
    #[regex(r"[0-9A-Fa-f]+", |lex| u32::from_str_radix(lex.slice(), 16).ok(), priority = 3)]
    Number(u32),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token(",")]
    Comma,

    #[token("@")]
    At,

    #[token(":")]
    Colon,
}

impl OperandToken {
    /// Numeric value carried by the token, if any
    pub fn value(&self) -> Option<u32> {
        match self {
            Self::Label(v) | Self::Slot(v) => Some(*v as u32),
            Self::HexWord(v) | Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Tokenize an operand field; `Err` carries the offending slice
pub fn tokenize(text: &str) -> Result<Vec<OperandToken>, String> {
    let mut lexer = OperandToken::lexer(text);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => return Err(lexer.slice().to_string()),
        }
    }
    Ok(tokens)
}

/// Build operands for `layout` from the listed operand text.
///
/// Returns `None` when the text does not carry enough values for the layout.
pub fn operands_from_listing(layout: OperandLayout, text: &str) -> Option<Vec<Operand>> {
    let tokens = tokenize(text).ok()?;
    let values: Vec<u16> = tokens
        .iter()
        .filter_map(|t| t.value())
        .map(u16::try_from)
        .collect::<Result<_, _>>()
        .ok()?;
    let first = values.first().copied();

    let operands = match layout {
        OperandLayout::None => Vec::new(),
        OperandLayout::Implicit(token) => vec![Operand::Bare(token.to_string())],
        OperandLayout::Imm8 | OperandLayout::Imm16 => vec![Operand::Immediate(first?)],
        OperandLayout::Data16 => vec![Operand::DataLabel(first?)],
        OperandLayout::Jump16 => vec![Operand::CodeAddress(first?)],
        OperandLayout::CaseJump => vec![
            Operand::Immediate(first?),
            Operand::CodeAddress(*values.get(1)?),
        ],
        OperandLayout::Loop => {
            if values.len() < 5 {
                return None;
            }
            let mut ops: Vec<Operand> = values[..4].iter().map(|&v| Operand::Slot(v)).collect();
            ops.push(Operand::CodeAddress(values[4]));
            ops
        }
        OperandLayout::Slot16 => vec![Operand::Slot(first?)],
        OperandLayout::Flag16 => vec![Operand::Flag(*values.last()?)],
        OperandLayout::Extern16 => vec![Operand::ExternIndex(first?)],
        OperandLayout::Intrinsic => {
            let argc = u8::try_from(*values.get(1)?).ok()?;
            vec![Operand::Intrinsic { id: first?, argc }]
        }
        OperandLayout::Function16 => vec![Operand::Function(*values.last()?)],
    };
    Some(operands)
}
