/// Structural defects found while compiling a description. Any of these
/// aborts the whole run; no partial table is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("malformed descriptor `{id}`: {reason}")]
    MalformedDescriptor { id: String, reason: String },

    #[error("`{first}` and `{second}` share mask {mask:#010x} and match {match_value:#010x}")]
    AmbiguousEncoding {
        first: String,
        second: String,
        mask: u32,
        match_value: u32,
    },

    #[error("unsupported variable field combination for `{id}`: {fields:?}")]
    UnsupportedFieldCombination { id: String, fields: Vec<String> },
}

impl CompileError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the table-driven decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode {opcode:#x} of instruction {raw:#010x}")]
    UnknownOpcode { raw: u32, opcode: u8 },

    #[error("unknown instruction {raw:#010x} (opcode {opcode:#x})")]
    UnknownInstruction { raw: u32, opcode: u8 },
}
