use super::{bit, bits, sign_extend, ImmediateCodec};

/// J-type jump offset:
/// `imm[20] = word[31]`, `imm[10:1] = word[30:21]`, `imm[11] = word[20]`,
/// `imm[19:12] = word[19:12]`. Bit 0 is always zero.
pub struct FormatJ;

impl ImmediateCodec for FormatJ {
    fn decode(word: u32) -> i64 {
        sign_extend(
            (bit(word, 31) << 20)
                | (bits(word, 19, 12) << 12)
                | (bit(word, 20) << 11)
                | (bits(word, 30, 21) << 1),
            21,
        )
    }

    fn encode(imm: i64) -> u32 {
        let imm = imm as u32;
        (((imm >> 20) & 0x1) << 31)
            | (((imm >> 1) & 0x3ff) << 21)
            | (((imm >> 11) & 0x1) << 20)
            | (((imm >> 12) & 0xff) << 12)
    }

    fn fits(imm: i64) -> bool {
        imm % 2 == 0 && (-(1 << 20)..(1 << 20)).contains(&imm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jal_forward() {
        // jal x1, 2048
        assert_eq!(FormatJ::decode(0x0010_00ef), 2048);
    }

    #[test]
    fn jal_backwards() {
        // jal x0, -2
        assert_eq!(FormatJ::decode(0xfffff06f), -2);
        assert_eq!(FormatJ::encode(-2), 0xffff_f000);
    }
}
