//! A built-in RV64 description (I, M, Zicsr, Zifencei and the privileged
//! returns) in riscv-opcodes form. Used by the test suites and by
//! `rvdecode selftest`.

use common::{DescriptionError, InstructionDescription};

pub const RV64_BASE_YAML: &str = include_str!("../data/rv64_base.yaml");

pub fn rv64_base() -> Result<InstructionDescription, DescriptionError> {
    InstructionDescription::from_yaml_str(RV64_BASE_YAML)
}
