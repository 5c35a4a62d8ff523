use std::collections::BTreeSet;
use std::str::FromStr;

use common::constants::{INSTRUCTION_WIDTH, OPCODE_MASK, REGISTER_COUNT};
use common::description::{parse_hex, InstructionEntry};
use common::VariableField;
use serde::Serialize;

use crate::error::CompileError;
use crate::format::{FieldRule, Operands};

/// Encoding of one instruction.
///
/// Construction validates that `mask` and `match` agree with the literal bits
/// of the encoding, that the opcode bits are literal, and that the declared
/// variable fields cover exactly the variable bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingDescriptor {
    id: String,
    encoding: String,
    mask: u32,
    match_value: u32,
    variable_fields: BTreeSet<VariableField>,
    extensions: Vec<String>,
}

impl EncodingDescriptor {
    pub fn new(
        id: &str,
        encoding: &str,
        mask: u32,
        match_value: u32,
        variable_fields: impl IntoIterator<Item = VariableField>,
    ) -> Result<Self, CompileError> {
        if id.is_empty() {
            return Err(CompileError::malformed(id, "empty identifier"));
        }
        let (literal_mask, literal_bits) = literal_bits(id, encoding)?;
        if literal_mask & OPCODE_MASK != OPCODE_MASK {
            return Err(CompileError::malformed(id, "opcode bits [6:0] are not all literal"));
        }
        if mask != literal_mask {
            return Err(CompileError::malformed(
                id,
                format!("mask {mask:#010x} disagrees with encoding ({literal_mask:#010x})"),
            ));
        }
        if match_value != literal_bits {
            return Err(CompileError::malformed(
                id,
                format!("match {match_value:#010x} disagrees with encoding ({literal_bits:#010x})"),
            ));
        }

        let variable_fields: BTreeSet<VariableField> = variable_fields.into_iter().collect();
        let declared = variable_fields
            .iter()
            .fold(0u32, |acc, field| acc | field.mask());
        if declared & literal_mask != 0 {
            return Err(CompileError::malformed(
                id,
                format!("variable fields overlap literal bits {:#010x}", declared & literal_mask),
            ));
        }
        if declared | literal_mask != u32::MAX {
            return Err(CompileError::malformed(
                id,
                format!("bits {:#010x} belong to no declared field", !(declared | literal_mask)),
            ));
        }

        Ok(Self {
            id: id.to_string(),
            encoding: encoding.to_string(),
            mask,
            match_value,
            variable_fields,
            extensions: Vec::new(),
        })
    }

    /// Builds a descriptor from a description entry.
    pub fn from_entry(id: &str, entry: &InstructionEntry) -> Result<Self, CompileError> {
        let mask = parse_hex(&entry.mask)
            .ok_or_else(|| CompileError::malformed(id, format!("bad mask `{}`", entry.mask)))?;
        let match_value = parse_hex(&entry.match_value).ok_or_else(|| {
            CompileError::malformed(id, format!("bad match `{}`", entry.match_value))
        })?;
        let fields = entry
            .variable_fields
            .iter()
            .map(|name| VariableField::from_str(name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| CompileError::UnsupportedFieldCombination {
                id: id.to_string(),
                fields: entry.variable_fields.clone(),
            })?;

        let mut descriptor = Self::new(id, &entry.encoding, mask, match_value, fields)?;
        descriptor.extensions = entry.extension.clone();
        Ok(descriptor)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn match_value(&self) -> u32 {
        self.match_value
    }

    /// Bits [6:0] of the encoding.
    pub fn opcode(&self) -> u8 {
        (self.match_value & OPCODE_MASK) as u8
    }

    pub fn variable_fields(&self) -> &BTreeSet<VariableField> {
        &self.variable_fields
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn matches(&self, raw: u32) -> bool {
        raw & self.mask == self.match_value
    }

    pub fn field_rule(&self) -> Result<FieldRule, CompileError> {
        FieldRule::synthesize(&self.variable_fields).ok_or_else(|| {
            CompileError::UnsupportedFieldCombination {
                id: self.id.clone(),
                fields: self
                    .variable_fields
                    .iter()
                    .map(|field| field.name().to_string())
                    .collect(),
            }
        })
    }

    /// Canonical instruction word carrying `operands`. Literal bits always
    /// win over operand bits that overlap them (shift amounts, CSR numbers).
    ///
    /// Returns `None` if a register index or the immediate does not fit.
    pub fn encode(&self, operands: &Operands) -> Option<u32> {
        let rule = self.field_rule().ok()?;
        let registers = [operands.rs1, operands.rs2, operands.rd];
        if registers.iter().flatten().any(|index| *index >= REGISTER_COUNT) {
            return None;
        }
        if let Some(imm) = operands.imm {
            if !rule.immediate.fits(imm) {
                return None;
            }
        }
        Some(self.match_value | (rule.place(operands) & !self.mask))
    }
}

/// `(mask, value)` of the literal bits in an encoding string.
fn literal_bits(id: &str, encoding: &str) -> Result<(u32, u32), CompileError> {
    if encoding.len() != INSTRUCTION_WIDTH {
        return Err(CompileError::malformed(
            id,
            format!("encoding has {} bits, expected {INSTRUCTION_WIDTH}", encoding.len()),
        ));
    }
    encoding
        .bytes()
        .try_fold((0u32, 0u32), |(mask, value), bit| match bit {
            b'0' => Ok(((mask << 1) | 1, value << 1)),
            b'1' => Ok(((mask << 1) | 1, (value << 1) | 1)),
            b'-' => Ok((mask << 1, value << 1)),
            other => Err(CompileError::malformed(
                id,
                format!("unexpected character `{}` in encoding", other as char),
            )),
        })
}
