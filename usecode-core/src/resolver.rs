//! Cross-reference resolver
//!
//! Second pass over a parsed function. Binds jump operands to instructions,
//! string pushes to data segments, indexed calls to extern slots and
//! intrinsic calls to the intrinsic table. Nothing here fails: a reference
//! with no target is recorded as unresolved and left in place.

use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, UnresolvedReference};
use crate::intrinsics::{IntrinsicEntry, IntrinsicTable};
use crate::model::{Annotation, Instruction, Operand, Resolution, UsecodeFunction};

/// Outcome of resolving one function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// `(instruction address, reference)` for every target not found
    pub unresolved: Vec<(u16, UnresolvedReference)>,
    /// Validation notes such as argument count mismatches
    pub notes: Vec<Diagnostic>,
}

impl ResolveReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.notes.is_empty()
    }

    /// Everything in the report as diagnostics, in address order
    pub fn diagnostics(&self) -> Diagnostics {
        let mut all: Vec<Diagnostic> = self
            .unresolved
            .iter()
            .map(|(address, reference)| {
                Diagnostic::at_address(*address, DiagnosticKind::Unresolved(reference.clone()))
            })
            .chain(self.notes.iter().cloned())
            .collect();
        all.sort_by_key(|d| d.address);

        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(all);
        diagnostics
    }
}

/// Resolved target of a call-class instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget<'a> {
    Intrinsic(&'a IntrinsicEntry),
    UnknownIntrinsic(u16),
    /// Indexed call through the extern table
    Extern { slot: u16, function: u16 },
    /// Direct call by function number
    Function(u16),
    /// Extern index past the end of the table
    MissingExtern(u16),
}

/// A call instruction paired with its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite<'a> {
    pub instruction: &'a Instruction,
    pub target: CallTarget<'a>,
}

pub struct Resolver<'t> {
    intrinsics: &'t IntrinsicTable,
}

impl<'t> Resolver<'t> {
    pub fn new(intrinsics: &'t IntrinsicTable) -> Self {
        Self { intrinsics }
    }

    /// Rebuild the resolutions and annotations of every instruction
    pub fn resolve(&self, function: &mut UsecodeFunction) -> ResolveReport {
        let mut report = ResolveReport::default();

        for i in 0..function.instructions.len() {
            let (resolutions, annotation) =
                self.resolve_instruction(function, &function.instructions[i], &mut report);
            let instruction = &mut function.instructions[i];
            instruction.resolutions = resolutions;
            instruction.annotation = annotation;
        }

        tracing::debug!(
            "resolved function {:04X}: {} unresolved, {} note(s)",
            function.func_number,
            report.unresolved.len(),
            report.notes.len()
        );
        report
    }

    fn resolve_instruction(
        &self,
        function: &UsecodeFunction,
        instruction: &Instruction,
        report: &mut ResolveReport,
    ) -> (Vec<Resolution>, Option<Annotation>) {
        let address = instruction.address;
        let mut resolutions = Vec::new();
        let mut annotation = None;

        for operand in &instruction.operands {
            let resolution = match *operand {
                Operand::CodeAddress(target) => match function.instruction_index(target) {
                    Some(index) => Resolution::Jump { target, index },
                    None => Resolution::Unresolved(UnresolvedReference::JumpTarget(target)),
                },
                Operand::DataLabel(label) => match function.segment_index(label) {
                    Some(index) => Resolution::Label { label, index },
                    None => Resolution::Unresolved(UnresolvedReference::DataLabel(label)),
                },
                Operand::ExternIndex(slot) => match function.externs.get(slot as usize) {
                    Some(&target) => Resolution::Extern {
                        slot,
                        function: target,
                    },
                    None => Resolution::Unresolved(UnresolvedReference::ExternIndex(slot)),
                },
                Operand::Function(target) => Resolution::Function { function: target },
                Operand::Intrinsic { id, argc } => match self.intrinsics.get(id) {
                    Some(entry) => {
                        if entry.params != argc {
                            report.notes.push(Diagnostic::at_address(
                                address,
                                DiagnosticKind::ArgCountMismatch {
                                    id,
                                    declared: argc,
                                    expected: entry.params,
                                },
                            ));
                        }
                        annotation = Some(Annotation::Intrinsic {
                            id,
                            name: entry.name.clone(),
                            description: entry.description.clone(),
                        });
                        continue;
                    }
                    None => {
                        annotation = Some(Annotation::UnresolvedIntrinsic { id });
                        Resolution::Unresolved(UnresolvedReference::Intrinsic(id))
                    }
                },
                Operand::Immediate(_) | Operand::Slot(_) | Operand::Flag(_) | Operand::Bare(_) => {
                    continue;
                }
            };

            if let Resolution::Unresolved(reference) = &resolution {
                report.unresolved.push((address, reference.clone()));
            }
            resolutions.push(resolution);
        }

        (resolutions, annotation)
    }

    /// Call-class instructions of `function` with their targets, in address order
    pub fn call_sites<'a>(&'a self, function: &'a UsecodeFunction) -> Vec<CallSite<'a>> {
        let mut sites = Vec::new();
        for instruction in &function.instructions {
            for operand in &instruction.operands {
                let target = match *operand {
                    Operand::Intrinsic { id, .. } => match self.intrinsics.get(id) {
                        Some(entry) => CallTarget::Intrinsic(entry),
                        None => CallTarget::UnknownIntrinsic(id),
                    },
                    Operand::ExternIndex(slot) => match function.externs.get(slot as usize) {
                        Some(&target) => CallTarget::Extern {
                            slot,
                            function: target,
                        },
                        None => CallTarget::MissingExtern(slot),
                    },
                    Operand::Function(target) => CallTarget::Function(target),
                    _ => continue,
                };
                sites.push(CallSite {
                    instruction,
                    target,
                });
            }
        }
        sites
    }
}
