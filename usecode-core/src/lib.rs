//! # usecode-core
//!
//! Reads a textual usecode disassembly and turns each function into an
//! annotated Lua scaffold.
//!
//! ## Example
//!
//! ```text
//! .funcnumber 0096H
//! .code
//! .argc 0001H
//! .localc 0000H
//! 0000: 48          push eventid
//! 0001: 38 88 00 02 callis 0088, 2
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Disassembly (.dis)
//!     ↓ parser (opcode table, operand lexer)
//! ParseResult { UsecodeFunction* }
//!     ↓ resolver (intrinsic table)
//! Resolved functions
//!     ↓ scaffold
//! Lua text, one unit per function
//! ```

pub mod config;
pub mod error;
pub mod intrinsics;
pub mod lexer;
pub mod model;
pub mod opcode;
pub mod parser;
pub mod pipeline;
pub mod printer;
pub mod resolver;
pub mod scaffold;

pub use config::{Config, ScaffoldConfig};
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, Error, Result, Severity, UnresolvedReference};
pub use intrinsics::{IntrinsicEntry, IntrinsicTable};
pub use model::{
    Annotation, DataSegment, Instruction, Operand, ParseResult, Payload, Resolution, UsecodeFunction,
};
pub use opcode::{OpcodeInfo, OpcodeTable, OperandLayout};
pub use parser::Parser;
pub use pipeline::{Conversion, ScaffoldUnit, Tables, convert};
pub use resolver::{CallSite, CallTarget, ResolveReport, Resolver};
pub use scaffold::ScaffoldGenerator;

/// Parse a disassembly listing with the standard opcode table
pub fn parse(source: &str) -> Result<ParseResult> {
    Parser::default().parse(source)
}

/// Parse and resolve a listing, then render one function
pub fn scaffold(source: &str, func_number: u16) -> Result<Option<String>> {
    let mut parsed = parse(source)?;
    let Some(function) = parsed.get_mut(func_number) else {
        return Ok(None);
    };
    Resolver::new(IntrinsicTable::builtin()).resolve(function);
    let config = ScaffoldConfig::default();
    Ok(Some(ScaffoldGenerator::new(&config).generate(function)))
}
