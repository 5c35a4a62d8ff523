use super::ImmediateCodec;

/// U-type: `word[31:12]` kept in place with the low twelve bits cleared.
/// The value is zero-extended; no sign step is applied.
pub struct FormatU;

impl ImmediateCodec for FormatU {
    fn decode(word: u32) -> i64 {
        i64::from(word & 0xffff_f000)
    }

    fn encode(imm: i64) -> u32 {
        (imm as u32) & 0xffff_f000
    }

    fn fits(imm: i64) -> bool {
        imm & 0xfff == 0 && (0..=0xffff_f000).contains(&imm)
    }
}
