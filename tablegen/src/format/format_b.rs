use super::{bit, bits, sign_extend, ImmediateCodec};

/// B-type branch offset:
/// `imm[12] = word[31]`, `imm[10:5] = word[30:25]`, `imm[4:1] = word[11:8]`,
/// `imm[11] = word[7]`. Bit 0 is always zero.
pub struct FormatB;

impl ImmediateCodec for FormatB {
    fn decode(word: u32) -> i64 {
        sign_extend(
            (bit(word, 31) << 12)
                | (bit(word, 7) << 11)
                | (bits(word, 30, 25) << 5)
                | (bits(word, 11, 8) << 1),
            13,
        )
    }

    fn encode(imm: i64) -> u32 {
        let imm = imm as u32;
        (((imm >> 12) & 0x1) << 31)
            | (((imm >> 5) & 0x3f) << 25)
            | (((imm >> 1) & 0xf) << 8)
            | (((imm >> 11) & 0x1) << 7)
    }

    fn fits(imm: i64) -> bool {
        imm % 2 == 0 && (-4096..=4094).contains(&imm)
    }
}
