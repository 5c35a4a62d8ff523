use super::{bits, ImmediateCodec};

/// `fm`, `pred` and `succ` read together as `word[31:20]`, zero-extended.
pub struct FormatFence;

impl ImmediateCodec for FormatFence {
    fn decode(word: u32) -> i64 {
        i64::from(bits(word, 31, 20))
    }

    fn encode(imm: i64) -> u32 {
        ((imm as u32) & 0xfff) << 20
    }

    fn fits(imm: i64) -> bool {
        (0..=0xfff).contains(&imm)
    }
}
