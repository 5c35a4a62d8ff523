use super::{bits, sign_extend, ImmediateCodec};

/// I-type: `imm[11:0] = word[31:20]`, sign-extended.
pub struct FormatI;

impl ImmediateCodec for FormatI {
    fn decode(word: u32) -> i64 {
        sign_extend(bits(word, 31, 20), 12)
    }

    fn encode(imm: i64) -> u32 {
        ((imm as u32) & 0xfff) << 20
    }

    fn fits(imm: i64) -> bool {
        (-2048..=2047).contains(&imm)
    }
}
