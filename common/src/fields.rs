use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Named operand fields as they appear in `variable_fields` of a
/// riscv-opcodes description.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VariableField {
    Rd,
    Rs1,
    Rs2,
    Rs3,
    Rm,
    Imm12,
    Imm12hi,
    Imm12lo,
    Bimm12hi,
    Bimm12lo,
    Imm20,
    Jimm20,
    Shamt,
    Shamtd,
    Shamtw,
    Csr,
    Zimm,
    Fm,
    Pred,
    Succ,
    Aq,
    Rl,
}

impl VariableField {
    /// Inclusive `(hi, lo)` bit range the field occupies in a 32-bit word.
    #[rustfmt::skip] // keep the table aligned
    pub const fn bit_range(self) -> (u32, u32) {
        match self {
            VariableField::Rd       => (11, 7),
            VariableField::Rs1      => (19, 15),
            VariableField::Rs2      => (24, 20),
            VariableField::Rs3      => (31, 27),
            VariableField::Rm       => (14, 12),
            VariableField::Imm12    => (31, 20),
            VariableField::Imm12hi  => (31, 25),
            VariableField::Imm12lo  => (11, 7),
            VariableField::Bimm12hi => (31, 25),
            VariableField::Bimm12lo => (11, 7),
            VariableField::Imm20    => (31, 12),
            VariableField::Jimm20   => (31, 12),
            VariableField::Shamt    => (24, 20),
            VariableField::Shamtd   => (25, 20),
            VariableField::Shamtw   => (24, 20),
            VariableField::Csr      => (31, 20),
            VariableField::Zimm     => (19, 15),
            VariableField::Fm       => (31, 28),
            VariableField::Pred     => (27, 24),
            VariableField::Succ     => (23, 20),
            VariableField::Aq       => (26, 26),
            VariableField::Rl       => (25, 25),
        }
    }

    /// Mask with ones over the bits of this field.
    pub const fn mask(self) -> u32 {
        let (hi, lo) = self.bit_range();
        let width = hi - lo + 1;
        if width == 32 {
            u32::MAX
        } else {
            ((1u32 << width) - 1) << lo
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}
