//! Glue between the `rvdecode` command line and the table compiler: loading
//! descriptions from disk, writing rendered modules and the built-in
//! self-check.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{bail, eyre, WrapErr};

pub use common;
pub use tablegen;

use common::InstructionDescription;
use tablegen::{
    render, Artifact, CompiledTable, DecodedInstruction, InstrId, Operands, RenderOptions,
    TrialOrder,
};

/// Reads and compiles a riscv-opcodes description (`.json`, `.yaml` or `.yml`).
pub fn compile_file(path: &Path, order: TrialOrder) -> eyre::Result<CompiledTable> {
    if !path.is_file() {
        bail!("\"{}\" does not exist or is not a file", path.display());
    }
    let description = InstructionDescription::from_path(path)
        .wrap_err_with(|| format!("failed to load {}", path.display()))?;
    CompiledTable::compile_with(&description, order)
        .wrap_err_with(|| format!("failed to compile {}", path.display()))
}

/// Renders each requested artifact and writes it to its path.
pub fn write_artifacts(
    table: &CompiledTable,
    outputs: &[(Artifact, PathBuf)],
    options: &RenderOptions,
) -> eyre::Result<()> {
    if outputs.is_empty() {
        bail!("at least one of --enum, --decoder or --exec must be specified");
    }
    for (artifact, path) in outputs {
        let module = render(table, *artifact, options)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, &module.contents)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        tracing::info!(
            artifact = <&'static str>::from(*artifact),
            path = %path.display(),
            bytes = module.contents.len(),
            "wrote {}",
            module.name
        );
    }
    Ok(())
}

/// Parses an instruction word given as hex, with or without `0x` and `_`
/// separators.
pub fn parse_word(text: &str) -> eyre::Result<u32> {
    common::description::parse_hex(text)
        .ok_or_else(|| eyre!("`{text}` is not a 32-bit hexadecimal instruction word"))
}

/// Outcome of [`selftest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelftestReport {
    pub instructions: usize,
    pub words: usize,
}

/// Operand patterns every instruction is encoded with: all zero, and every
/// free bit set.
fn operand_patterns(table: &CompiledTable, id: InstrId) -> [Operands; 2] {
    let rule = table.rule(id);
    [
        Operands {
            rs1: Some(0),
            rs2: Some(0),
            rd: Some(0),
            imm: rule.immediate.decode(0),
        },
        Operands {
            rs1: Some(31),
            rs2: Some(31),
            rd: Some(31),
            imm: rule.immediate.decode(u32::MAX),
        },
    ]
}

/// Whether `decoded` carries the operands that were `placed` in the word.
/// Immediate bits pinned by the encoding (shift opcodes, CSR numbers) are
/// not compared.
fn operands_agree(
    table: &CompiledTable,
    id: InstrId,
    placed: &Operands,
    decoded: &Operands,
) -> bool {
    let rule = table.rule(id);
    let registers_agree = decoded.rs1 == placed.rs1.filter(|_| rule.rs1)
        && decoded.rs2 == placed.rs2.filter(|_| rule.rs2)
        && decoded.rd == placed.rd.filter(|_| rule.rd);
    let free = rule.immediate.bit_mask() & !table.descriptor(id).mask();
    let immediate_agrees = match (placed.imm, decoded.imm) {
        (None, None) => true,
        (Some(placed), Some(read)) => {
            rule.immediate.encode(placed) & free == rule.immediate.encode(read) & free
        }
        _ => false,
    };
    registers_agree && immediate_agrees
}

/// Encodes every instruction of `table` and checks that the decoder maps each
/// word back to the same instruction and the operands it was encoded with.
pub fn selftest(table: &CompiledTable) -> eyre::Result<SelftestReport> {
    let decoder = table.decoder();
    let mut words = 0;
    for (id, name) in table.identifiers().iter() {
        let descriptor = table.descriptor(id);
        for operands in operand_patterns(table, id) {
            let raw = descriptor
                .encode(&operands)
                .ok_or_else(|| eyre!("`{name}` cannot encode {operands:?}"))?;
            let decoded: DecodedInstruction = decoder
                .decode(raw)
                .wrap_err_with(|| format!("`{name}` encoded as {raw:#010x}"))?;
            if decoded.id != id {
                bail!(
                    "{raw:#010x} encodes `{name}` but decodes as `{}`",
                    decoder.name(&decoded)
                );
            }
            if !operands_agree(table, id, &operands, &decoded.operands) {
                bail!(
                    "{raw:#010x} (`{name}`) placed {operands:?} but decoded {:?}",
                    decoded.operands
                );
            }
            words += 1;
        }
    }
    tracing::debug!(words, "selftest decoded every canonical word");
    Ok(SelftestReport {
        instructions: table.identifiers().len(),
        words,
    })
}
