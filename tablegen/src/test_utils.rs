use common::{InstructionDescription, InstructionEntry};

use crate::descriptor::EncodingDescriptor;
use crate::fixtures::rv64_base;
use crate::table::CompiledTable;

pub fn description() -> InstructionDescription {
    rv64_base().unwrap()
}

pub fn entry(id: &str) -> InstructionEntry {
    description()
        .get(id)
        .unwrap_or_else(|| panic!("no fixture entry `{id}`"))
        .clone()
}

pub fn descriptor(id: &str) -> EncodingDescriptor {
    EncodingDescriptor::from_entry(id, &entry(id)).unwrap()
}

pub fn descriptors() -> Vec<EncodingDescriptor> {
    description()
        .iter()
        .map(|(id, entry)| EncodingDescriptor::from_entry(id, entry).unwrap())
        .collect()
}

pub fn compiled() -> CompiledTable {
    CompiledTable::compile(&description()).unwrap()
}

/// Entry for a made-up instruction; `mask` and `match` are derived from
/// the encoding string.
pub fn synthetic(encoding: &str, fields: &[&str]) -> InstructionEntry {
    let bits = |keep: fn(u8) -> bool| {
        encoding
            .bytes()
            .fold(0u32, |acc, b| (acc << 1) | u32::from(keep(b)))
    };
    InstructionEntry {
        encoding: encoding.to_string(),
        variable_fields: fields.iter().map(|f| f.to_string()).collect(),
        extension: vec!["rv_test".to_string()],
        match_value: format!("{:#x}", bits(|b| b == b'1')),
        mask: format!("{:#x}", bits(|b| b != b'-')),
    }
}
