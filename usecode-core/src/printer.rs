//! Line-oriented text builder with indentation tracking

/// Accumulates output lines, prefixing each with the current indentation
pub struct Printer {
    buffer: String,
    indent_unit: String,
    indent_level: usize,
}

impl Printer {
    pub fn new(indent_width: usize) -> Self {
        Self {
            buffer: String::new(),
            indent_unit: " ".repeat(indent_width),
            indent_level: 0,
        }
    }

    /// Get the output, always newline-terminated
    pub fn finish(mut self) -> String {
        if !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
        self.buffer
    }

    /// Write one line at the current indentation
    pub fn writeln(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent_level {
                self.buffer.push_str(&self.indent_unit);
            }
            self.buffer.push_str(line);
        }
        self.buffer.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    /// Run `f` one indentation level deeper
    pub fn indented<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.indent_level += 1;
        f(self);
        self.indent_level -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut printer = Printer::new(2);
        printer.writeln("a");
        printer.indented(|p| {
            p.writeln("b");
            p.writeln("");
            p.indented(|p| p.writeln("c"));
        });
        printer.writeln("d");
        assert_eq!(printer.finish(), "a\n  b\n\n    c\nd\n");
    }

    #[test]
    fn test_finish_adds_newline() {
        assert_eq!(Printer::new(4).finish(), "\n");
    }
}
