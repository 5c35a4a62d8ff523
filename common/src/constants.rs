pub const INSTRUCTION_WIDTH: usize = 32;
pub const OPCODE_BITS: usize = 7;
pub const OPCODE_COUNT: usize = 1 << OPCODE_BITS;
pub const OPCODE_MASK: u32 = (1 << OPCODE_BITS) - 1;
pub const REGISTER_COUNT: u8 = 32;
pub const REGISTER_INDEX_MASK: u32 = 0x1f;
