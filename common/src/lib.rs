pub mod constants;
pub mod description;
pub mod fields;

pub use description::{DescriptionError, InstructionDescription, InstructionEntry};
pub use fields::VariableField;
