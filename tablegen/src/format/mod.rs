//! Field extraction rules.
//!
//! Every descriptor gets a [`FieldRule`]: the register slots it populates and
//! the [`ImmediateFormat`] of its immediate. The immediate format is picked
//! from the declared variable fields by [`ImmediateFormat::classify`].

use std::collections::BTreeSet;

use common::constants::REGISTER_INDEX_MASK;
use common::VariableField;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, IntoStaticStr};

pub mod format_b;
pub mod format_fence;
pub mod format_i;
pub mod format_j;
pub mod format_s;
pub mod format_u;

use format_b::FormatB;
use format_fence::FormatFence;
use format_i::FormatI;
use format_j::FormatJ;
use format_s::FormatS;
use format_u::FormatU;

/// Bits `[hi:lo]` of `word`, shifted down.
pub(crate) const fn bits(word: u32, hi: u32, lo: u32) -> u32 {
    let width = hi - lo + 1;
    if width == 32 {
        word
    } else {
        (word >> lo) & ((1 << width) - 1)
    }
}

pub(crate) const fn bit(word: u32, n: u32) -> u32 {
    (word >> n) & 1
}

/// Sign-extends the low `width` bits of `value` to 64 bits.
pub(crate) const fn sign_extend(value: u32, width: u32) -> i64 {
    let shift = 64 - width;
    ((value as i64) << shift) >> shift
}

/// Decoding and placement of one immediate layout.
pub trait ImmediateCodec {
    fn decode(word: u32) -> i64;
    /// Places `imm` into the immediate bits of an otherwise empty word.
    fn encode(imm: i64) -> u32;
    /// Whether `imm` survives an encode/decode round trip.
    fn fits(imm: i64) -> bool;
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ImmediateFormat {
    I,
    S,
    B,
    U,
    J,
    Fence,
    None,
}

impl ImmediateFormat {
    /// The format a single variable field belongs to, if it is an immediate
    /// component at all.
    fn of_field(field: VariableField) -> Option<ImmediateFormat> {
        match field {
            VariableField::Imm12
            | VariableField::Csr
            | VariableField::Shamt
            | VariableField::Shamtd
            | VariableField::Shamtw => Some(ImmediateFormat::I),
            VariableField::Imm12hi | VariableField::Imm12lo => Some(ImmediateFormat::S),
            VariableField::Bimm12hi | VariableField::Bimm12lo => Some(ImmediateFormat::B),
            VariableField::Imm20 => Some(ImmediateFormat::U),
            VariableField::Jimm20 => Some(ImmediateFormat::J),
            VariableField::Fm | VariableField::Pred | VariableField::Succ => {
                Some(ImmediateFormat::Fence)
            }
            VariableField::Rd
            | VariableField::Rs1
            | VariableField::Rs2
            | VariableField::Rs3
            | VariableField::Rm
            | VariableField::Zimm
            | VariableField::Aq
            | VariableField::Rl => None,
        }
    }

    /// Fields that must all be present for a multi-part immediate.
    fn required_fields(self) -> &'static [VariableField] {
        match self {
            ImmediateFormat::S => &[VariableField::Imm12hi, VariableField::Imm12lo],
            ImmediateFormat::B => &[VariableField::Bimm12hi, VariableField::Bimm12lo],
            ImmediateFormat::Fence => &[VariableField::Fm, VariableField::Pred, VariableField::Succ],
            ImmediateFormat::I | ImmediateFormat::U | ImmediateFormat::J | ImmediateFormat::None => &[],
        }
    }

    /// Picks the immediate format for a set of variable fields.
    ///
    /// Returns `None` when the immediate fields present belong to more than
    /// one format, or when a multi-part immediate is missing one of its parts.
    pub fn classify(fields: &BTreeSet<VariableField>) -> Option<ImmediateFormat> {
        let formats: BTreeSet<ImmediateFormat> =
            fields.iter().filter_map(|field| Self::of_field(*field)).collect();
        let format = match formats.len() {
            0 => return Some(ImmediateFormat::None),
            1 => *formats.first()?,
            _ => return None,
        };
        format
            .required_fields()
            .iter()
            .all(|field| fields.contains(field))
            .then_some(format)
    }

    pub fn decode(self, word: u32) -> Option<i64> {
        match self {
            ImmediateFormat::I => Some(FormatI::decode(word)),
            ImmediateFormat::S => Some(FormatS::decode(word)),
            ImmediateFormat::B => Some(FormatB::decode(word)),
            ImmediateFormat::U => Some(FormatU::decode(word)),
            ImmediateFormat::J => Some(FormatJ::decode(word)),
            ImmediateFormat::Fence => Some(FormatFence::decode(word)),
            ImmediateFormat::None => None,
        }
    }

    pub fn encode(self, imm: i64) -> u32 {
        match self {
            ImmediateFormat::I => FormatI::encode(imm),
            ImmediateFormat::S => FormatS::encode(imm),
            ImmediateFormat::B => FormatB::encode(imm),
            ImmediateFormat::U => FormatU::encode(imm),
            ImmediateFormat::J => FormatJ::encode(imm),
            ImmediateFormat::Fence => FormatFence::encode(imm),
            ImmediateFormat::None => 0,
        }
    }

    pub fn fits(self, imm: i64) -> bool {
        match self {
            ImmediateFormat::I => FormatI::fits(imm),
            ImmediateFormat::S => FormatS::fits(imm),
            ImmediateFormat::B => FormatB::fits(imm),
            ImmediateFormat::U => FormatU::fits(imm),
            ImmediateFormat::J => FormatJ::fits(imm),
            ImmediateFormat::Fence => FormatFence::fits(imm),
            ImmediateFormat::None => false,
        }
    }

    /// Word bits the immediate is read from.
    pub fn bit_mask(self) -> u32 {
        match self {
            ImmediateFormat::I | ImmediateFormat::Fence => 0xfff0_0000,
            ImmediateFormat::S | ImmediateFormat::B => 0xfe00_0f80,
            ImmediateFormat::U | ImmediateFormat::J => 0xffff_f000,
            ImmediateFormat::None => 0,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Operand values pulled out of (or placed into) an instruction word.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operands {
    pub rs1: Option<u8>,
    pub rs2: Option<u8>,
    pub rd: Option<u8>,
    pub imm: Option<i64>,
}

/// Extraction rule of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub rs1: bool,
    pub rs2: bool,
    pub rd: bool,
    pub immediate: ImmediateFormat,
}

const RS1_SHIFT: u32 = 15;
const RS2_SHIFT: u32 = 20;
const RD_SHIFT: u32 = 7;

impl FieldRule {
    /// Derives the rule from a set of variable fields; `None` if the set has
    /// no consistent immediate format.
    pub fn synthesize(fields: &BTreeSet<VariableField>) -> Option<FieldRule> {
        Some(FieldRule {
            rs1: fields.contains(&VariableField::Rs1) || fields.contains(&VariableField::Zimm),
            rs2: fields.contains(&VariableField::Rs2),
            rd: fields.contains(&VariableField::Rd),
            immediate: ImmediateFormat::classify(fields)?,
        })
    }

    pub fn extract(&self, word: u32) -> Operands {
        let register = |shift: u32| ((word >> shift) & REGISTER_INDEX_MASK) as u8;
        Operands {
            rs1: self.rs1.then(|| register(RS1_SHIFT)),
            rs2: self.rs2.then(|| register(RS2_SHIFT)),
            rd: self.rd.then(|| register(RD_SHIFT)),
            imm: self.immediate.decode(word),
        }
    }

    /// Places operands into the fields of an otherwise empty word. Operands
    /// the rule does not use are ignored.
    pub fn place(&self, operands: &Operands) -> u32 {
        let register = |value: Option<u8>, used: bool, shift: u32| match (value, used) {
            (Some(index), true) => (u32::from(index) & REGISTER_INDEX_MASK) << shift,
            _ => 0,
        };
        let imm = operands
            .imm
            .map_or(0, |imm| self.immediate.encode(imm));
        register(operands.rs1, self.rs1, RS1_SHIFT)
            | register(operands.rs2, self.rs2, RS2_SHIFT)
            | register(operands.rd, self.rd, RD_SHIFT)
            | imm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[VariableField]) -> BTreeSet<VariableField> {
        names.iter().copied().collect()
    }

    #[test]
    fn classification_table() {
        use VariableField::*;
        let cases = [
            (vec![Rd, Rs1, Imm12], Some(ImmediateFormat::I)),
            (vec![Rd, Csr, Zimm], Some(ImmediateFormat::I)),
            (vec![Rd, Rs1, Shamtd], Some(ImmediateFormat::I)),
            (vec![Rs1, Rs2, Imm12hi, Imm12lo], Some(ImmediateFormat::S)),
            (vec![Rs1, Rs2, Bimm12hi, Bimm12lo], Some(ImmediateFormat::B)),
            (vec![Rd, Imm20], Some(ImmediateFormat::U)),
            (vec![Rd, Jimm20], Some(ImmediateFormat::J)),
            (vec![Fm, Pred, Succ, Rs1, Rd], Some(ImmediateFormat::Fence)),
            (vec![Rd, Rs1, Rs2], Some(ImmediateFormat::None)),
            (vec![], Some(ImmediateFormat::None)),
            (vec![Rs1, Rs2, Imm12hi], None),
            (vec![Pred, Succ], None),
            (vec![Rd, Imm12, Imm20], None),
            (vec![Bimm12hi, Bimm12lo, Imm12hi, Imm12lo], None),
        ];
        for (names, expected) in cases {
            assert_eq!(ImmediateFormat::classify(&fields(&names)), expected, "{names:?}");
        }
    }

    #[test]
    fn zimm_uses_rs1_slot() {
        use VariableField::*;
        let rule = FieldRule::synthesize(&fields(&[Rd, Csr, Zimm])).unwrap();
        assert!(rule.rs1 && rule.rd && !rule.rs2);
        // csrrwi x1, mstatus, 5
        let operands = rule.extract(0x3002_d0f3);
        assert_eq!(operands.rs1, Some(5));
        assert_eq!(operands.rd, Some(1));
        assert_eq!(operands.imm, Some(0x300));
    }

    #[test]
    fn registers_only() {
        use VariableField::*;
        let rule = FieldRule::synthesize(&fields(&[Rd, Rs1, Rs2])).unwrap();
        // add x3, x1, x2
        let operands = rule.extract(0x0020_81b3);
        assert_eq!(
            operands,
            Operands {
                rs1: Some(1),
                rs2: Some(2),
                rd: Some(3),
                imm: None,
            }
        );
        assert_eq!(rule.place(&operands) | 0x33, 0x0020_81b3);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0x800, 12), -2048);
        assert_eq!(sign_extend(0x7ff, 12), 2047);
        assert_eq!(sign_extend(0x1ffc, 13), -4);
        assert_eq!(bits(0xdead_beef, 31, 0), 0xdead_beef);
        assert_eq!(bits(0xdead_beef, 7, 4), 0xe);
    }

    #[test]
    fn bit_masks_cover_encodings() {
        for format in [
            ImmediateFormat::I,
            ImmediateFormat::S,
            ImmediateFormat::B,
            ImmediateFormat::U,
            ImmediateFormat::J,
            ImmediateFormat::Fence,
        ] {
            assert_eq!(format.encode(-1) & !format.bit_mask(), 0, "{format:?}");
        }
    }
}
