use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::EncodingDescriptor;
use crate::error::CompileError;
use crate::format::FieldRule;
use crate::identifiers::{IdentifierEnumeration, InstrId};

/// What a `(mask, match)` pair decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchEntry {
    pub id: InstrId,
    pub rule: FieldRule,
}

/// `(mask, raw & mask)` to instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTable {
    entries: BTreeMap<(u32, u32), MatchEntry>,
}

impl MatchTable {
    #[tracing::instrument(skip_all, name = "MatchTable::build")]
    pub fn build(
        descriptors: &[EncodingDescriptor],
        rules: &[FieldRule],
        identifiers: &IdentifierEnumeration,
    ) -> Result<Self, CompileError> {
        let mut entries: BTreeMap<(u32, u32), MatchEntry> = BTreeMap::new();
        for (descriptor, rule) in descriptors.iter().zip(rules) {
            let key = (descriptor.mask(), descriptor.match_value());
            let id = identifiers
                .id(descriptor.id())
                .ok_or_else(|| CompileError::malformed(descriptor.id(), "not enumerated"))?;
            if let Some(existing) = entries.get(&key) {
                return Err(CompileError::AmbiguousEncoding {
                    first: identifiers.name(existing.id).to_string(),
                    second: descriptor.id().to_string(),
                    mask: key.0,
                    match_value: key.1,
                });
            }
            entries.insert(key, MatchEntry { id, rule: *rule });
        }
        Ok(Self { entries })
    }

    pub fn get(&self, mask: u32, match_value: u32) -> Option<&MatchEntry> {
        self.entries.get(&(mask, match_value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by `(mask, match)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &MatchEntry)> {
        self.entries
            .iter()
            .map(|(&(mask, match_value), entry)| (mask, match_value, entry))
    }
}
