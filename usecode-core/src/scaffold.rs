//! Lua scaffold generator
//!
//! Renders one resolved function as an annotated Lua skeleton:
//!
//! 1. header comment (function number, argc, locals, externs)
//! 2. event type constants
//! 3. string bindings, one per string data segment
//! 4. function signature
//! 5. one trace comment per instruction, then `end`
//!
//! The body is a trace, not a translation: nothing here simulates the stack
//! or rebuilds control flow from jumps.

use crate::config::ScaffoldConfig;
use crate::error::UnresolvedReference;
use crate::intrinsics::{EVENT_TYPES, known_function};
use crate::model::{Instruction, Resolution, UsecodeFunction, label_name};
use crate::printer::Printer;

/// Implicit parameters every usecode function receives
pub const IMPLICIT_PARAMS: &[&str] = &["eventid", "objectref"];

pub struct ScaffoldGenerator<'c> {
    config: &'c ScaffoldConfig,
}

impl<'c> ScaffoldGenerator<'c> {
    pub fn new(config: &'c ScaffoldConfig) -> Self {
        Self { config }
    }

    /// Render `function`; resolution should already have run on it
    pub fn generate(&self, function: &UsecodeFunction) -> String {
        let mut out = Printer::new(self.config.indent);

        self.header(&mut out, function);
        out.blank_line();
        self.event_constants(&mut out);
        out.blank_line();
        self.string_bindings(&mut out, function);
        out.blank_line();

        out.writeln(&format!(
            "function {}({})",
            self.config.function_name(function.func_number),
            self.parameters(function).join(", ")
        ));
        out.indented(|out| {
            for instruction in &function.instructions {
                out.writeln(&self.trace_comment(function, instruction));
            }
        });
        out.writeln("end");

        out.finish()
    }

    fn header(&self, out: &mut Printer, function: &UsecodeFunction) {
        let number = function.func_number;
        out.writeln("--[[");
        out.indented(|out| {
            out.writeln(&format!("Function: {}", self.config.function_name(number)));
            out.writeln(&format!("Original Usecode: 0x{:04X}", number));
            if let Some(name) = known_function(number) {
                out.writeln(&format!("Known as: {}", name));
            }
            out.writeln("");
            out.writeln(&format!("Args: {}", function.argc));

            if self.config.list_locals && function.localc > 0 {
                let names: Vec<String> = (0..function.localc).map(local_name).collect();
                out.writeln(&format!("Locals: {} ({})", function.localc, names.join(", ")));
            } else {
                out.writeln(&format!("Locals: {}", function.localc));
            }

            out.writeln(&format!("Externs: {}", function.extern_count()));
            out.indented(|out| {
                for (slot, &target) in function.externs.iter().enumerate() {
                    match known_function(target) {
                        Some(name) => out.writeln(&format!("[{}] 0x{:04X} {}", slot, target, name)),
                        None => out.writeln(&format!("[{}] 0x{:04X}", slot, target)),
                    }
                }
            });
        });
        out.writeln("]]");
    }

    fn event_constants(&self, out: &mut Printer) {
        out.writeln("-- Event types");
        for (value, name) in EVENT_TYPES {
            out.writeln(&format!("local EVENT_{} = {}", name.to_uppercase(), value));
        }
    }

    fn string_bindings(&self, out: &mut Printer, function: &UsecodeFunction) {
        out.writeln("-- String data");
        for segment in function.string_segments() {
            let text = segment.text().unwrap_or_default();
            out.writeln(&format!(
                "local {} = {}",
                self.config.binding_name(&segment.label),
                lua_string(text)
            ));
        }
    }

    fn parameters(&self, function: &UsecodeFunction) -> Vec<String> {
        IMPLICIT_PARAMS
            .iter()
            .map(|p| p.to_string())
            .chain((0..function.argc).map(|i| format!("arg{}", i)))
            .collect()
    }

    /// `-- AAAA: mnemonic operands -> target  ; comment`
    fn trace_comment(&self, function: &UsecodeFunction, instruction: &Instruction) -> String {
        let mut line = format!("-- {:04X}: {}", instruction.address, instruction.listing());

        for resolution in &instruction.resolutions {
            let target = match resolution {
                Resolution::Jump { target, .. } => format!("{:04X}", target),
                Resolution::Label { label, index } => match function.data_segments.get(*index) {
                    Some(segment) if segment.is_string() => self.config.binding_name(&segment.label),
                    Some(segment) => segment.label.clone(),
                    // segments changed since resolution
                    None => label_name(*label),
                },
                Resolution::Extern { function, .. } | Resolution::Function { function } => {
                    self.config.function_name(*function)
                }
                Resolution::Unresolved(UnresolvedReference::JumpTarget(target)) => {
                    format!("?{:04X} (unresolved)", target)
                }
                Resolution::Unresolved(UnresolvedReference::DataLabel(label)) => {
                    format!("?L{:04X} (unresolved)", label)
                }
                Resolution::Unresolved(UnresolvedReference::ExternIndex(slot)) => {
                    format!("?extern[{}] (unresolved)", slot)
                }
                // rendered from the annotation below
                Resolution::Unresolved(UnresolvedReference::Intrinsic(_)) => continue,
            };
            line.push_str(" -> ");
            line.push_str(&target);
        }

        if let Some(annotation) = &instruction.annotation {
            line.push_str(" -> ");
            line.push_str(&annotation.to_string());
        }

        if let Some(comment) = &instruction.source_comment {
            line.push_str("  ; ");
            line.push_str(comment);
        }
        line
    }
}

/// Name given to local variable slot `slot`
pub fn local_name(slot: u16) -> String {
    format!("var_{:04X}", slot)
}

/// Quote `text` as a Lua double-quoted string literal
pub fn lua_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => match u8::try_from(c) {
                // Latin-1 byte from a hex run
                Ok(byte) => out.push_str(&format!("\\{:03}", byte)),
                Err(_) => {
                    let mut buf = [0u8; 4];
                    for byte in c.encode_utf8(&mut buf).bytes() {
                        out.push_str(&format!("\\{:03}", byte));
                    }
                }
            },
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::IntrinsicTable;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn scaffold(source: &str) -> String {
        let mut func = Parser::default()
            .parse(source)
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        Resolver::new(IntrinsicTable::builtin()).resolve(&mut func);
        let config = ScaffoldConfig::default();
        ScaffoldGenerator::new(&config).generate(&func)
    }

    #[test]
    fn test_lua_string_escaping() {
        assert_eq!(lua_string("plain"), "\"plain\"");
        assert_eq!(lua_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(lua_string("a\\b"), "\"a\\\\b\"");
        assert_eq!(lua_string("\u{1}"), "\"\\001\"");
        assert_eq!(lua_string("\u{E9}"), "\"\\233\"");
        assert_eq!(lua_string("\u{20AC}"), "\"\\226\\130\\172\"");
    }

    #[test]
    fn test_empty_function_has_all_blocks() {
        let text = scaffold(".funcnumber 0400H\n.argc 0000H\n.localc 0000H\n");
        assert!(text.starts_with("--[[\n    Function: func_0400\n"));
        assert!(text.contains("    Args: 0\n"));
        assert!(text.contains("    Externs: 0\n"));
        assert!(text.contains("-- Event types\nlocal EVENT_BARK = 0\n"));
        assert!(text.contains("local EVENT_SPECIAL = 7\n"));
        assert!(text.contains("-- String data\n"));
        assert!(text.ends_with("function func_0400(eventid, objectref)\nend\n"));
    }

    #[test]
    fn test_signature_and_locals() {
        let text = scaffold(".funcnumber 0010H\n.argc 0002H\n.localc 0002H\n");
        assert!(text.contains("function func_0010(eventid, objectref, arg0, arg1)\n"));
        assert!(text.contains("    Locals: 2 (var_0000, var_0001)\n"));
    }

    #[test]
    fn test_trace_comments() {
        let source = "\
.funcnumber 0010H
.data
L0000: db 'Hi \"there\"'
       db 00
L0010: db 01, 02
.code
.argc 0000H
.localc 0000H
.externsize 0001H
.extern 08FFH
0000: 1D 00 00    pushs L0000
0003: 1D 10 00    pushs L0010
0006: 24 00 00    call extern:0000  ; show it
0009: 06 F4 FF    jmp 0000
000C: 05 10 00    jne 001F
000F: 38 99 99 00 callis 9999, 0
0013: 25          ret
";
        let text = scaffold(source);
        assert!(text.contains("local str_L0000 = \"Hi \\\"there\\\"\"\n"));
        assert!(!text.contains("str_L0010 ="));
        assert!(text.contains("    -- 0000: pushs L0000 -> str_L0000\n"));
        assert!(text.contains("    -- 0003: pushs L0010 -> L0010\n"));
        assert!(text.contains("    -- 0006: call extern:0000 -> func_08FF  ; show it\n"));
        assert!(text.contains("    -- 0009: jmp 0000 -> 0000\n"));
        assert!(text.contains("    -- 000C: jne 001F -> ?001F (unresolved)\n"));
        assert!(text.contains("    -- 000F: callis 9999, 0 -> unresolved intrinsic 9999H\n"));
        assert!(text.contains("        [0] 0x08FF show_message\n"));
        assert!(text.contains("    -- 0013: ret\nend\n"));
    }

    #[test]
    fn test_case_jump_and_direct_call_comments() {
        let source = "\
.funcnumber 0040H
.argc 0000H
.localc 0000H
.code
0000: 07 05 00 07 00 cmps 0005H, 000C
0005: 39 88 00 02 calli 0088, 2
0009: 47 29 08    calle func:0829
000C: 25          ret
";
        let text = scaffold(source);
        assert!(text.contains("    -- 0000: cmps 0005H, 000C -> 000C\n"));
        assert!(text.contains(
            "    -- 0005: calli 0088, 2 -> check_object_flag() # Check object flag state\n"
        ));
        assert!(text.contains("    -- 0009: calle func:0829 -> func_0829\n"));
    }

    #[test]
    fn test_stale_label_index_falls_back_to_label() {
        let source = "\
.funcnumber 0010H
.data
L0000: db 'Hi'
       db 00
.code
.argc 0000H
.localc 0000H
0000: 1D 00 00    pushs L0000
";
        let mut func = Parser::default()
            .parse(source)
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        Resolver::new(IntrinsicTable::builtin()).resolve(&mut func);
        func.data_segments.clear();
        let config = ScaffoldConfig::default();
        let text = ScaffoldGenerator::new(&config).generate(&func);
        assert!(text.contains("    -- 0000: pushs L0000 -> L0000\n"));
    }

    #[test]
    fn test_config_prefixes() {
        let mut func = UsecodeFunction::new(0x20);
        func.data_segments.push(crate::model::DataSegment {
            label: "L0000".into(),
            address: 0,
            payload: crate::model::Payload::Text("x".into()),
        });
        let config = ScaffoldConfig {
            function_prefix: "uc_".into(),
            string_prefix: "s_".into(),
            indent: 2,
            list_locals: false,
        };
        let text = ScaffoldGenerator::new(&config).generate(&func);
        assert!(text.contains("  Function: uc_0020\n"));
        assert!(text.contains("local s_L0000 = \"x\"\n"));
        assert!(text.contains("function uc_0020(eventid, objectref)\n"));
    }
}
