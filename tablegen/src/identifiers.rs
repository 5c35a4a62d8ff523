use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::CompileError;

/// Dense ordinal of an instruction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InstrId(usize);

impl InstrId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifiers numbered in description order, followed by one terminal
/// ordinal equal to the number of identifiers. The terminal is never a
/// decode result; it sizes per-identifier tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierEnumeration {
    names: Vec<String>,
    #[serde(skip)]
    ordinals: HashMap<String, usize>,
}

impl IdentifierEnumeration {
    /// Fails on the first name that repeats an earlier one, or whose
    /// generated symbol does.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, CompileError> {
        let mut enumeration = Self {
            names: Vec::new(),
            ordinals: HashMap::new(),
        };
        let mut symbols: HashMap<String, usize> = HashMap::new();
        for name in names {
            if enumeration.ordinals.contains_key(name) {
                return Err(CompileError::malformed(name, "identifier listed twice"));
            }
            let ordinal = enumeration.names.len();
            let generated = symbol(name);
            if let Some(&earlier) = symbols.get(&generated) {
                return Err(CompileError::malformed(
                    name,
                    format!(
                        "symbol `{generated}` is also generated for `{}`",
                        enumeration.names[earlier]
                    ),
                ));
            }
            symbols.insert(generated, ordinal);
            enumeration.ordinals.insert(name.to_string(), ordinal);
            enumeration.names.push(name.to_string());
        }
        Ok(enumeration)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn terminal(&self) -> usize {
        self.names.len()
    }

    pub fn id(&self, name: &str) -> Option<InstrId> {
        self.ordinals.get(name).copied().map(InstrId)
    }

    pub fn name(&self, id: InstrId) -> &str {
        &self.names[id.0]
    }

    /// Upper-case symbol for generated code: `fence.i` becomes `FENCE_I`.
    pub fn symbol(&self, id: InstrId) -> String {
        symbol(&self.names[id.0])
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstrId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| (InstrId(ordinal), name.as_str()))
    }
}

pub fn symbol(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_input_order() {
        let enumeration = IdentifierEnumeration::new(["sub", "add", "fence.i"]).unwrap();
        assert_eq!(enumeration.id("sub").unwrap().index(), 0);
        assert_eq!(enumeration.id("add").unwrap().index(), 1);
        assert_eq!(enumeration.terminal(), 3);
        assert_eq!(enumeration.symbol(enumeration.id("fence.i").unwrap()), "FENCE_I");
        assert_eq!(enumeration.id("mul"), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert_eq!(
            IdentifierEnumeration::new(["add", "sub", "add"]),
            Err(CompileError::MalformedDescriptor {
                id: "add".to_string(),
                reason: "identifier listed twice".to_string(),
            })
        );
    }

    #[test]
    fn colliding_symbols_are_rejected() {
        let err = IdentifierEnumeration::new(["fence.i", "add", "fence_i"]).unwrap_err();
        match err {
            CompileError::MalformedDescriptor { id, reason } => {
                assert_eq!(id, "fence_i");
                assert!(reason.contains("FENCE_I"));
                assert!(reason.contains("`fence.i`"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn enumeration_is_deterministic() {
        let names = ["lui", "auipc", "jal", "jalr"];
        let a = IdentifierEnumeration::new(names).unwrap();
        let b = IdentifierEnumeration::new(names).unwrap();
        assert_eq!(a, b);
        let ordinals: Vec<usize> = a.iter().map(|(id, _)| id.index()).collect();
        assert_eq!(ordinals, [0, 1, 2, 3]);
    }
}
