//! Compiles riscv-opcodes style instruction descriptions into decode tables.
//!
//! The pipeline runs descriptors through the opcode partition, the dispatch
//! plan, per-instruction field rules and the identifier enumeration, all
//! collected in a [`CompiledTable`]. [`Decoder`] runs the compiled tables
//! directly; [`render`] emits them as C++ or Rust source.

pub mod decoder;
pub mod descriptor;
pub mod error;
pub mod fixtures;
pub mod format;
pub mod identifiers;
pub mod match_table;
pub mod partition;
pub mod plan;
pub mod render;
pub mod table;

#[cfg(test)]
mod test_utils;

pub use decoder::{DecodedInstruction, Decoder};
pub use descriptor::EncodingDescriptor;
pub use error::{CompileError, DecodeError};
pub use format::{FieldRule, ImmediateFormat, Operands};
pub use identifiers::{IdentifierEnumeration, InstrId};
pub use plan::{Dispatch, DispatchPlan, TrialOrder};
pub use render::{render, Artifact, DispatchPolicy, Module, RenderError, RenderOptions, Target};
pub use table::{CompiledTable, Overlap};
