//! Serde model of the instruction description document produced by
//! [riscv-opcodes](https://github.com/riscv/riscv-opcodes) (`instr_dict.json`
//! or `instr_dict.yaml`).
//!
//! Entries are kept in the order the document lists them. Downstream tables
//! are indexed by that order, so it is part of the contract.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML description: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("cannot infer description format of {0:?} (expected .json, .yaml or .yml)")]
    UnknownFormat(PathBuf),
    #[error("description contains no instructions")]
    Empty,
    #[error("identifier `{0}` is listed more than once")]
    DuplicateIdentifier(String),
}

/// Encoding metadata of one instruction, as written in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionEntry {
    /// 32 characters, most significant bit first: `0`, `1`, or `-` for a
    /// bit that belongs to a variable field.
    pub encoding: String,
    #[serde(default)]
    pub variable_fields: Vec<String>,
    #[serde(default)]
    pub extension: Vec<String>,
    /// Hexadecimal, e.g. `"0x13"`.
    #[serde(rename = "match")]
    pub match_value: String,
    /// Hexadecimal, e.g. `"0x707f"`.
    pub mask: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstructionDescription {
    entries: IndexMap<String, InstructionEntry>,
}

/// Top-level document mapping with every key kept, repeated ones included.
struct DocumentEntries(Vec<(String, InstructionEntry)>);

impl<'de> Deserialize<'de> for DocumentEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = DocumentEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from instruction identifiers to encodings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(DocumentEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl InstructionDescription {
    pub fn from_json_str(text: &str) -> Result<Self, DescriptionError> {
        Self::from_document(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DescriptionError> {
        Self::from_document(serde_yaml::from_str(text)?)
    }

    /// Loads a description, picking the parser from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, DescriptionError> {
        let text = std::fs::read_to_string(path).map_err(|source| DescriptionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Err(DescriptionError::UnknownFormat(path.to_path_buf())),
        }
    }

    fn from_document(document: DocumentEntries) -> Result<Self, DescriptionError> {
        let mut description = Self::default();
        for (id, entry) in document.0 {
            description.insert(id, entry)?;
        }
        if description.is_empty() {
            return Err(DescriptionError::Empty);
        }
        Ok(description)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstructionEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    pub fn get(&self, id: &str) -> Option<&InstructionEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut InstructionEntry> {
        self.entries.get_mut(id)
    }

    /// Appends an entry. Fails if `id` is already present.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        entry: InstructionEntry,
    ) -> Result<(), DescriptionError> {
        match self.entries.entry(id.into()) {
            Entry::Occupied(occupied) => {
                Err(DescriptionError::DuplicateIdentifier(occupied.key().clone()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }
}

/// Parses `0x`-prefixed (or bare) hexadecimal as found in `match` and `mask`.
pub fn parse_hex(text: &str) -> Option<u32> {
    let digits = text
        .trim()
        .strip_prefix("0x")
        .or_else(|| text.trim().strip_prefix("0X"))
        .unwrap_or(text.trim());
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(&digits.replace('_', ""), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
sub:
  encoding: 0100000----------000-----0110011
  variable_fields: [rd, rs1, rs2]
  extension: [rv_i]
  match: '0x40000033'
  mask: '0xfe00707f'
add:
  encoding: 0000000----------000-----0110011
  variable_fields: [rd, rs1, rs2]
  extension: [rv_i]
  match: '0x33'
  mask: '0xfe00707f'
"#;

    #[test]
    fn yaml_keeps_document_order() {
        let description = InstructionDescription::from_yaml_str(YAML).unwrap();
        let ids: Vec<_> = description.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["sub", "add"]);
        assert_eq!(description.get("add").unwrap().match_value, "0x33");
    }

    #[test]
    fn json_ignores_unknown_keys() {
        let json = r#"{
            "addi": {
                "encoding": "-----------------000-----0010011",
                "variable_fields": ["rd", "rs1", "imm12"],
                "extension": ["rv_i"],
                "match": "0x13",
                "mask": "0x707f",
                "comment": "extra keys are tolerated"
            }
        }"#;
        let description = InstructionDescription::from_json_str(json).unwrap();
        assert_eq!(description.len(), 1);
        assert_eq!(description.get("addi").unwrap().variable_fields.len(), 3);
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            InstructionDescription::from_json_str("{}"),
            Err(DescriptionError::Empty)
        ));
    }

    #[test]
    fn repeated_identifier_is_rejected() {
        let json = r#"{
            "add": {
                "encoding": "0000000----------000-----0110011",
                "variable_fields": ["rd", "rs1", "rs2"],
                "match": "0x33",
                "mask": "0xfe00707f"
            },
            "add": {
                "encoding": "0100000----------000-----0110011",
                "variable_fields": ["rd", "rs1", "rs2"],
                "match": "0x40000033",
                "mask": "0xfe00707f"
            }
        }"#;
        assert!(matches!(
            InstructionDescription::from_json_str(json),
            Err(DescriptionError::DuplicateIdentifier(ref id)) if id == "add"
        ));

        let repeated = format!("{YAML}{}", &YAML[YAML.find("add:").unwrap()..]);
        assert!(InstructionDescription::from_yaml_str(&repeated).is_err());
    }

    #[test]
    fn insert_does_not_replace() {
        let mut description = InstructionDescription::from_yaml_str(YAML).unwrap();
        let sub = description.get("sub").unwrap().clone();
        let err = description.insert("add", sub).unwrap_err();
        assert!(matches!(err, DescriptionError::DuplicateIdentifier(ref id) if id == "add"));
        assert_eq!(description.get("add").unwrap().match_value, "0x33");
        assert_eq!(description.len(), 2);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = InstructionDescription::from_path(Path::new("Cargo.toml")).unwrap_err();
        assert!(matches!(err, DescriptionError::UnknownFormat(_)));
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("0x707f"), Some(0x707f));
        assert_eq!(parse_hex("FE00707F"), Some(0xfe00707f));
        assert_eq!(parse_hex("0x"), None);
        assert_eq!(parse_hex("0x1_0000_0000"), None);
    }
}
