use common::constants::OPCODE_MASK;
use serde::Serialize;

use crate::error::DecodeError;
use crate::format::Operands;
use crate::identifiers::InstrId;
use crate::plan::Dispatch;
use crate::table::CompiledTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedInstruction {
    pub raw: u32,
    pub id: InstrId,
    pub operands: Operands,
}

/// Table-driven decoder over a [`CompiledTable`]. This is the behaviour the
/// rendered dispatch code reproduces.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    table: &'a CompiledTable,
}

impl<'a> Decoder<'a> {
    pub fn new(table: &'a CompiledTable) -> Self {
        Self { table }
    }

    pub fn decode(&self, raw: u32) -> Result<DecodedInstruction, DecodeError> {
        let opcode = (raw & OPCODE_MASK) as u8;
        let probe = |mask: u32| {
            self.table
                .matches()
                .get(mask, raw & mask)
                .map(|entry| DecodedInstruction {
                    raw,
                    id: entry.id,
                    operands: entry.rule.extract(raw),
                })
        };

        let decoded = match self.table.plan().dispatch(opcode) {
            Dispatch::Unused => return Err(DecodeError::UnknownOpcode { raw, opcode }),
            Dispatch::Single(mask) => probe(mask),
            Dispatch::Trials(masks) => masks.iter().find_map(|mask| probe(*mask)),
        };
        decoded.ok_or(DecodeError::UnknownInstruction { raw, opcode })
    }

    /// Name of a decoded instruction.
    pub fn name(&self, decoded: &DecodedInstruction) -> &'a str {
        self.table.identifiers().name(decoded.id)
    }

    /// `addi rd=x1 rs1=x1 imm=1` style rendering.
    pub fn disassemble(&self, decoded: &DecodedInstruction) -> String {
        let mut text = self.name(decoded).to_string();
        let registers = [
            ("rd", decoded.operands.rd),
            ("rs1", decoded.operands.rs1),
            ("rs2", decoded.operands.rs2),
        ];
        for (slot, index) in registers {
            if let Some(index) = index {
                text.push_str(&format!(" {slot}=x{index}"));
            }
        }
        if let Some(imm) = decoded.operands.imm {
            text.push_str(&format!(" imm={imm}"));
        }
        text
    }
}
