use common::InstructionDescription;
use serde::Serialize;

use crate::decoder::Decoder;
use crate::descriptor::EncodingDescriptor;
use crate::error::CompileError;
use crate::format::FieldRule;
use crate::identifiers::{IdentifierEnumeration, InstrId};
use crate::match_table::MatchTable;
use crate::partition::OpcodePartition;
use crate::plan::{DispatchPlan, TrialOrder};

/// Everything the renderers and the decoder consume, derived in one pass
/// from a description. Compilation either succeeds completely or fails with
/// the first structural defect found.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    descriptors: Vec<EncodingDescriptor>,
    identifiers: IdentifierEnumeration,
    rules: Vec<FieldRule>,
    partition: OpcodePartition,
    plan: DispatchPlan,
    matches: MatchTable,
}

/// Two instructions with different masks that can match the same word. The
/// trial order decides the word in favour of `winner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub winner: InstrId,
    pub shadowed: InstrId,
    pub word: u32,
}

impl CompiledTable {
    pub fn compile(description: &InstructionDescription) -> Result<Self, CompileError> {
        Self::compile_with(description, TrialOrder::default())
    }

    pub fn compile_with(
        description: &InstructionDescription,
        order: TrialOrder,
    ) -> Result<Self, CompileError> {
        let descriptors = description
            .iter()
            .map(|(id, entry)| EncodingDescriptor::from_entry(id, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_descriptors(descriptors, order)
    }

    #[tracing::instrument(skip_all, name = "CompiledTable::from_descriptors")]
    pub fn from_descriptors(
        descriptors: Vec<EncodingDescriptor>,
        order: TrialOrder,
    ) -> Result<Self, CompileError> {
        let identifiers = IdentifierEnumeration::new(descriptors.iter().map(|d| d.id()))?;
        let rules = descriptors
            .iter()
            .map(EncodingDescriptor::field_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let matches = MatchTable::build(&descriptors, &rules, &identifiers)?;
        let partition = OpcodePartition::build(&descriptors);
        let plan = DispatchPlan::build(&partition, order);

        let table = Self {
            descriptors,
            identifiers,
            rules,
            partition,
            plan,
            matches,
        };
        for overlap in table.overlaps() {
            tracing::warn!(
                winner = table.identifiers.name(overlap.winner),
                shadowed = table.identifiers.name(overlap.shadowed),
                word = format_args!("{:#010x}", overlap.word),
                "encodings overlap; trial order decides"
            );
        }
        tracing::info!(
            instructions = table.identifiers.len(),
            opcodes = table.partition.used().count(),
            ambiguous = table.plan.trials().len(),
            "compiled decode table"
        );
        Ok(table)
    }

    pub fn descriptors(&self) -> &[EncodingDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, id: InstrId) -> &EncodingDescriptor {
        &self.descriptors[id.index()]
    }

    pub fn identifiers(&self) -> &IdentifierEnumeration {
        &self.identifiers
    }

    pub fn rule(&self, id: InstrId) -> FieldRule {
        self.rules[id.index()]
    }

    pub fn partition(&self) -> &OpcodePartition {
        &self.partition
    }

    pub fn plan(&self) -> &DispatchPlan {
        &self.plan
    }

    pub fn matches(&self) -> &MatchTable {
        &self.matches
    }

    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(self)
    }

    /// Pairs of instructions under the same opcode whose encodings are not
    /// disjoint, with a word both of them match.
    pub fn overlaps(&self) -> Vec<Overlap> {
        let mut overlaps = Vec::new();
        for (opcode, trials) in self.plan.trials() {
            let members: Vec<(usize, InstrId, &EncodingDescriptor)> = self
                .identifiers
                .iter()
                .map(|(id, _)| (id, self.descriptor(id)))
                .filter(|(_, d)| d.opcode() == *opcode)
                .filter_map(|(id, d)| {
                    let rank = trials.iter().position(|mask| *mask == d.mask())?;
                    Some((rank, id, d))
                })
                .collect();
            for (rank_a, id_a, a) in &members {
                for (rank_b, id_b, b) in &members {
                    if rank_a >= rank_b {
                        continue;
                    }
                    let shared = a.mask() & b.mask();
                    if (a.match_value() ^ b.match_value()) & shared == 0 {
                        overlaps.push(Overlap {
                            winner: *id_a,
                            shadowed: *id_b,
                            word: a.match_value() | b.match_value(),
                        });
                    }
                }
            }
        }
        overlaps
    }

    /// Serializable view of the compiled table.
    pub fn report(&self) -> TableReport<'_> {
        TableReport {
            identifiers: self.identifiers.iter().map(|(_, name)| name).collect(),
            terminal: self.identifiers.terminal(),
            plan: &self.plan,
            overlaps: self.overlaps(),
            matches: self
                .matches
                .iter()
                .map(|(mask, match_value, entry)| MatchRow {
                    mask,
                    match_value,
                    id: self.identifiers.name(entry.id),
                    rule: entry.rule,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TableReport<'a> {
    pub identifiers: Vec<&'a str>,
    pub terminal: usize,
    pub plan: &'a DispatchPlan,
    pub overlaps: Vec<Overlap>,
    pub matches: Vec<MatchRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct MatchRow<'a> {
    pub mask: u32,
    #[serde(rename = "match")]
    pub match_value: u32,
    pub id: &'a str,
    pub rule: FieldRule,
}
