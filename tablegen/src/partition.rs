use common::constants::OPCODE_COUNT;
use serde::Serialize;

use crate::descriptor::EncodingDescriptor;

/// Distinct masks used by the instructions sharing one opcode, in the order
/// they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpcodeGroup {
    masks: Vec<u32>,
}

impl OpcodeGroup {
    fn insert(&mut self, mask: u32) {
        if !self.masks.contains(&mask) {
            self.masks.push(mask);
        }
    }

    pub fn masks(&self) -> &[u32] {
        &self.masks
    }

    pub fn is_used(&self) -> bool {
        !self.masks.is_empty()
    }

    /// More than one mask: the decoder has to probe them in turn.
    pub fn is_ambiguous(&self) -> bool {
        self.masks.len() > 1
    }
}

/// Opcode groups indexed by opcode value. Opcodes come from the low seven
/// bits of the encoding, so every descriptor lands inside the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodePartition {
    groups: Vec<OpcodeGroup>,
}

impl OpcodePartition {
    #[tracing::instrument(skip_all, name = "OpcodePartition::build")]
    pub fn build(descriptors: &[EncodingDescriptor]) -> Self {
        let mut groups = vec![OpcodeGroup::default(); OPCODE_COUNT];
        for descriptor in descriptors {
            groups[usize::from(descriptor.opcode())].insert(descriptor.mask());
        }

        for (opcode, group) in groups.iter().enumerate().filter(|(_, g)| g.is_used()) {
            tracing::debug!(opcode = format_args!("{opcode:#04x}"), masks = ?group.masks, "opcode group");
        }

        Self { groups }
    }

    pub fn group(&self, opcode: u8) -> Option<&OpcodeGroup> {
        self.groups.get(usize::from(opcode))
    }

    /// Used opcodes in ascending order.
    pub fn used(&self) -> impl Iterator<Item = (u8, &OpcodeGroup)> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.is_used())
            .map(|(opcode, group)| (opcode as u8, group))
    }
}
