//! Rust rendering: an `InstrId` enum and a self-contained `decode` module.
//!
//! The decoder module refers to the enum as `super::InstrId`, so both files
//! are expected to sit side by side in the consuming crate.

use std::io::Write;

use common::constants::OPCODE_COUNT;
use strum::IntoEnumIterator;

use super::{indent, AsModule, Module};
use crate::format::ImmediateFormat;
use crate::table::CompiledTable;

const BANNER: &str = "// This file is automatically generated. Do not change it.\n";

const MASKS_PER_LINE: usize = 8;

pub struct IdentifiersModule<'a> {
    table: &'a CompiledTable,
}

impl<'a> IdentifiersModule<'a> {
    pub fn new(table: &'a CompiledTable) -> Self {
        Self { table }
    }

    pub fn write(&self, f: &mut impl Write) -> std::io::Result<()> {
        let identifiers = self.table.identifiers();
        writeln!(f, "{BANNER}")?;
        writeln!(f, "#[allow(non_camel_case_types, clippy::upper_case_acronyms)]")?;
        writeln!(f, "#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]")?;
        writeln!(f, "pub enum InstrId {{")?;
        for (id, _) in identifiers.iter() {
            writeln!(f, "{}{} = {},", indent(1), identifiers.symbol(id), id.index())?;
        }
        writeln!(f, "{}/// Not a decode result; sizes per-instruction tables.", indent(1))?;
        writeln!(f, "{}END = {},", indent(1), identifiers.terminal())?;
        writeln!(f, "}}")?;
        writeln!(f)?;

        writeln!(f, "impl InstrId {{")?;
        writeln!(f, "{}pub const COUNT: usize = {};", indent(1), identifiers.terminal())?;
        writeln!(f)?;
        writeln!(f, "{}pub const fn name(self) -> &'static str {{", indent(1))?;
        writeln!(f, "{}match self {{", indent(2))?;
        for (id, name) in identifiers.iter() {
            writeln!(
                f,
                "{}InstrId::{} => {name:?},",
                indent(3),
                identifiers.symbol(id)
            )?;
        }
        writeln!(f, "{}InstrId::END => \"END\",", indent(3))?;
        writeln!(f, "{}}}", indent(2))?;
        writeln!(f, "{}}}", indent(1))?;
        writeln!(f, "}}")
    }
}

impl AsModule for IdentifiersModule<'_> {
    fn as_module(&self) -> std::io::Result<Module> {
        let mut contents = vec![];
        self.write(&mut contents)?;
        Ok(Module {
            name: String::from("identifiers.rs"),
            contents,
        })
    }
}

/// `MASKS`, `TRIALS`, the `(mask, match)` lookup and `decode`.
pub struct DecoderModule<'a> {
    table: &'a CompiledTable,
}

impl<'a> DecoderModule<'a> {
    pub fn new(table: &'a CompiledTable) -> Self {
        Self { table }
    }

    pub fn write(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(f, "{BANNER}")?;
        writeln!(f, "use super::InstrId;")?;
        writeln!(f)?;
        self.write_types(f)?;
        writeln!(f)?;
        self.write_masks(f)?;
        writeln!(f)?;
        self.write_trials(f)?;
        writeln!(f)?;
        self.write_immediates(f)?;
        self.write_lookup(f)?;
        writeln!(f)?;
        write_decode(f)
    }

    fn write_types(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(f, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]")?;
        writeln!(f, "pub struct Instruction {{")?;
        for field in [
            "raw: u32",
            "id: InstrId",
            "rs1: Option<u8>",
            "rs2: Option<u8>",
            "rd: Option<u8>",
            "imm: Option<i64>",
        ] {
            writeln!(f, "{}pub {field},", indent(1))?;
        }
        writeln!(f, "}}")?;
        writeln!(f)?;
        writeln!(f, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]")?;
        writeln!(f, "pub enum DecodeError {{")?;
        writeln!(f, "{}UnknownOpcode {{ raw: u32, opcode: u8 }},", indent(1))?;
        writeln!(f, "{}UnknownInstruction {{ raw: u32, opcode: u8 }},", indent(1))?;
        writeln!(f, "}}")
    }

    fn write_masks(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(f, "/// Sole mask of each single-mask opcode, zero otherwise.")?;
        writeln!(f, "pub const MASKS: [u32; {OPCODE_COUNT}] = [")?;
        for chunk in self.table.plan().mask_table().chunks(MASKS_PER_LINE) {
            let masks = chunk
                .iter()
                .map(|mask| format!("{:x}", Underscored(*mask)))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "{}{masks},", indent(1))?;
        }
        writeln!(f, "];")
    }

    fn write_trials(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(f, "/// Masks probed in order for opcodes with several masks.")?;
        writeln!(f, "pub const TRIALS: &[(u8, &[u32])] = &[")?;
        for (opcode, trials) in self.table.plan().trials() {
            let masks = trials
                .iter()
                .map(|mask| format!("{:x}", Underscored(*mask)))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "{}({opcode:#04x}, &[{masks}]),", indent(1))?;
        }
        writeln!(f, "];")
    }

    fn write_immediates(&self, f: &mut impl Write) -> std::io::Result<()> {
        let used: Vec<ImmediateFormat> = ImmediateFormat::iter()
            .filter(|format| {
                self.table
                    .identifiers()
                    .iter()
                    .any(|(id, _)| self.table.rule(id).immediate == *format)
            })
            .collect();
        let sign_extended = used.iter().any(|format| {
            matches!(
                format,
                ImmediateFormat::I | ImmediateFormat::S | ImmediateFormat::B | ImmediateFormat::J
            )
        });
        if sign_extended {
            writeln!(f, "const fn sext(value: u32, width: u32) -> i64 {{")?;
            writeln!(f, "{}let shift = 64 - width;", indent(1))?;
            writeln!(f, "{}((value as i64) << shift) >> shift", indent(1))?;
            writeln!(f, "}}")?;
            writeln!(f)?;
        }
        for format in used {
            let Some(body) = immediate_body(format) else {
                continue;
            };
            writeln!(
                f,
                "const fn {}(raw: u32) -> i64 {{",
                immediate_fn(format)
            )?;
            writeln!(f, "{}{body}", indent(1))?;
            writeln!(f, "}}")?;
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_lookup(&self, f: &mut impl Write) -> std::io::Result<()> {
        let identifiers = self.table.identifiers();
        writeln!(f, "fn lookup(mask: u32, raw: u32) -> Option<Instruction> {{")?;
        writeln!(f, "{}let reg = |shift: u32| Some(((raw >> shift) & 0x1f) as u8);", indent(1))?;
        writeln!(f, "{}let (id, rs1, rs2, rd, imm) = match (mask, raw & mask) {{", indent(1))?;
        for (id, _) in identifiers.iter() {
            let descriptor = self.table.descriptor(id);
            let rule = self.table.rule(id);
            let register = |used: bool, shift: u32| {
                if used {
                    format!("reg({shift})")
                } else {
                    String::from("None")
                }
            };
            let imm = match rule.immediate {
                ImmediateFormat::None => String::from("None"),
                format => format!("Some({}(raw))", immediate_fn(format)),
            };
            writeln!(
                f,
                "{}({:#x}, {:#x}) => (InstrId::{}, {}, {}, {}, {imm}),",
                indent(2),
                descriptor.mask(),
                descriptor.match_value(),
                identifiers.symbol(id),
                register(rule.rs1, 15),
                register(rule.rs2, 20),
                register(rule.rd, 7),
            )?;
        }
        writeln!(f, "{}_ => return None,", indent(2))?;
        writeln!(f, "{}}};", indent(1))?;
        writeln!(
            f,
            "{}Some(Instruction {{ raw, id, rs1, rs2, rd, imm }})",
            indent(1)
        )?;
        writeln!(f, "}}")
    }
}

impl AsModule for DecoderModule<'_> {
    fn as_module(&self) -> std::io::Result<Module> {
        let mut contents = vec![];
        self.write(&mut contents)?;
        Ok(Module {
            name: String::from("decode.rs"),
            contents,
        })
    }
}

fn write_decode(f: &mut impl Write) -> std::io::Result<()> {
    writeln!(f, "pub fn decode(raw: u32) -> Result<Instruction, DecodeError> {{")?;
    writeln!(f, "{}let opcode = (raw & 0x7f) as u8;", indent(1))?;
    writeln!(f, "{}let found = match MASKS[usize::from(opcode)] {{", indent(1))?;
    writeln!(f, "{}0 => {{", indent(2))?;
    writeln!(f, "{}let (_, masks) = TRIALS", indent(3))?;
    writeln!(f, "{}.iter()", indent(4))?;
    writeln!(f, "{}.find(|(candidate, _)| *candidate == opcode)", indent(4))?;
    writeln!(
        f,
        "{}.ok_or(DecodeError::UnknownOpcode {{ raw, opcode }})?;",
        indent(4)
    )?;
    writeln!(f, "{}masks.iter().find_map(|mask| lookup(*mask, raw))", indent(3))?;
    writeln!(f, "{}}}", indent(2))?;
    writeln!(f, "{}mask => lookup(mask, raw),", indent(2))?;
    writeln!(f, "{}}};", indent(1))?;
    writeln!(
        f,
        "{}found.ok_or(DecodeError::UnknownInstruction {{ raw, opcode }})",
        indent(1)
    )?;
    writeln!(f, "}}")
}

fn immediate_fn(format: ImmediateFormat) -> String {
    format!("{}_imm", format.name().to_ascii_lowercase())
}

fn immediate_body(format: ImmediateFormat) -> Option<&'static str> {
    match format {
        ImmediateFormat::I => Some("sext(raw >> 20, 12)"),
        ImmediateFormat::S => Some("sext(((raw >> 25) << 5) | ((raw >> 7) & 0x1f), 12)"),
        ImmediateFormat::B => Some(
            "sext(((raw >> 31) << 12) | (((raw >> 7) & 1) << 11) | (((raw >> 25) & 0x3f) << 5) | (((raw >> 8) & 0xf) << 1), 13)",
        ),
        ImmediateFormat::U => Some("(raw & 0xffff_f000) as i64"),
        ImmediateFormat::J => Some(
            "sext(((raw >> 31) << 20) | (((raw >> 12) & 0xff) << 12) | (((raw >> 20) & 1) << 11) | (((raw >> 21) & 0x3ff) << 1), 21)",
        ),
        ImmediateFormat::Fence => Some("(raw >> 20) as i64"),
        ImmediateFormat::None => None,
    }
}

/// Hex formatting with a `_` between the two 16-bit halves.
struct Underscored(u32);

impl std::fmt::LowerHex for Underscored {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}_{:04x}", self.0 >> 16, self.0 & 0xffff)
    }
}
