//! Batch conversion: parse, then resolve and render each selected function

use crate::config::Config;
use crate::error::{Diagnostics, Result, UnresolvedReference};
use crate::intrinsics::IntrinsicTable;
use crate::opcode::OpcodeTable;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scaffold::ScaffoldGenerator;

/// Read-only lookup tables shared by every stage
#[derive(Debug, Clone, Copy)]
pub struct Tables<'t> {
    pub opcodes: &'t OpcodeTable,
    pub intrinsics: &'t IntrinsicTable,
}

impl Tables<'static> {
    /// Standard opcode set and built-in intrinsic dataset
    pub fn standard() -> Self {
        Self {
            opcodes: OpcodeTable::standard(),
            intrinsics: IntrinsicTable::builtin(),
        }
    }
}

impl<'t> Tables<'t> {
    pub fn new(opcodes: &'t OpcodeTable, intrinsics: &'t IntrinsicTable) -> Self {
        Self {
            opcodes,
            intrinsics,
        }
    }
}

/// Rendered output for one function
#[derive(Debug, Clone)]
pub struct ScaffoldUnit {
    pub func_number: u16,
    /// `func_XXXX.<extension>`
    pub file_name: String,
    pub text: String,
    pub unresolved: Vec<(u16, UnresolvedReference)>,
    /// Parser findings plus resolver notes for this function
    pub diagnostics: Diagnostics,
}

/// Result of a batch run
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    /// One unit per converted function, in file order
    pub units: Vec<ScaffoldUnit>,
    /// Selected function numbers not present in the listing
    pub missing: Vec<u16>,
    /// Findings outside any function
    pub diagnostics: Diagnostics,
}

impl Conversion {
    pub fn unresolved_count(&self) -> usize {
        self.units.iter().map(|u| u.unresolved.len()).sum()
    }
}

/// Convert the functions in `source` named by `selection` (all when empty)
pub fn convert(
    source: &str,
    tables: &Tables<'_>,
    config: &Config,
    selection: &[u16],
) -> Result<Conversion> {
    let parsed = Parser::new(tables.opcodes).parse(source)?;
    let resolver = Resolver::new(tables.intrinsics);
    let generator = ScaffoldGenerator::new(&config.scaffold);

    let missing: Vec<u16> = selection
        .iter()
        .copied()
        .filter(|n| !parsed.contains(*n))
        .collect();
    for number in &missing {
        tracing::warn!("function {:04X} not found in listing", number);
    }

    let diagnostics = parsed.diagnostics().clone();
    let mut units = Vec::new();
    for mut function in parsed {
        if !selection.is_empty() && !selection.contains(&function.func_number) {
            continue;
        }
        let report = resolver.resolve(&mut function);
        let text = generator.generate(&function);

        let mut unit_diagnostics = function.diagnostics.clone();
        unit_diagnostics.extend(report.notes);
        units.push(ScaffoldUnit {
            func_number: function.func_number,
            file_name: format!(
                "{}.{}",
                config.scaffold.function_name(function.func_number),
                config.output.extension
            ),
            text,
            unresolved: report.unresolved,
            diagnostics: unit_diagnostics,
        });
    }

    let conversion = Conversion {
        units,
        missing,
        diagnostics,
    };
    tracing::info!(
        "converted {} function(s), {} unresolved reference(s)",
        conversion.units.len(),
        conversion.unresolved_count()
    );
    Ok(conversion)
}
