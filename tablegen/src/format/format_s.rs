use super::{bits, sign_extend, ImmediateCodec};

/// S-type: `imm[11:5] = word[31:25]`, `imm[4:0] = word[11:7]`.
pub struct FormatS;

impl ImmediateCodec for FormatS {
    fn decode(word: u32) -> i64 {
        sign_extend((bits(word, 31, 25) << 5) | bits(word, 11, 7), 12)
    }

    fn encode(imm: i64) -> u32 {
        let imm = imm as u32;
        (((imm >> 5) & 0x7f) << 25) | ((imm & 0x1f) << 7)
    }

    fn fits(imm: i64) -> bool {
        (-2048..=2047).contains(&imm)
    }
}
