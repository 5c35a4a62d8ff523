//! C++ rendering: an identifiers header, a decoder source file and an
//! executor callback table. Generated decoders expect `get_bits`,
//! `get_bits_r` and the `decode_*_imm` helpers from `bits_manipulation.hpp`.

use std::io::Write;

use common::constants::OPCODE_COUNT;

use super::{indent, AsModule, DispatchPolicy, Module};
use crate::format::{FieldRule, ImmediateFormat};
use crate::table::CompiledTable;

const BANNER: &str = "/*\n * This file is automatically generated. Do not change it\n */\n";

const MASKS_PER_LINE: usize = 8;

/// `InstrID` enumeration with its `kEndID` terminal and `enum_to_str`.
pub struct IdentifiersHeader<'a> {
    table: &'a CompiledTable,
    namespace: &'a str,
}

impl<'a> IdentifiersHeader<'a> {
    pub fn new(table: &'a CompiledTable, namespace: &'a str) -> Self {
        Self { table, namespace }
    }

    pub fn write(&self, f: &mut impl Write) -> std::io::Result<()> {
        let identifiers = self.table.identifiers();
        writeln!(f, "{BANNER}")?;
        writeln!(f, "#ifndef IDENTIFIERS_HPP")?;
        writeln!(f, "#define IDENTIFIERS_HPP")?;
        writeln!(f)?;
        writeln!(f, "#include <utility>")?;
        writeln!(f)?;
        open_namespace(f, self.namespace)?;

        writeln!(f, "enum InstrID")?;
        writeln!(f, "{{")?;
        for (id, _) in identifiers.iter() {
            writeln!(f, "{}k{},", indent(1), identifiers.symbol(id))?;
        }
        writeln!(f, "{}kEndID", indent(1))?;
        writeln!(f, "}};")?;
        writeln!(f)?;

        writeln!(f, "inline const char *enum_to_str(InstrID id) noexcept")?;
        writeln!(f, "{{")?;
        writeln!(f, "{}switch (id)", indent(1))?;
        writeln!(f, "{}{{", indent(1))?;
        for (id, _) in identifiers.iter() {
            let symbol = identifiers.symbol(id);
            writeln!(f, "{}case k{symbol}:", indent(2))?;
            writeln!(f, "{}return \"{symbol}\";", indent(3))?;
        }
        writeln!(f, "{}default:", indent(2))?;
        writeln!(f, "{}std::unreachable();", indent(3))?;
        writeln!(f, "{}}}", indent(1))?;
        writeln!(f, "}}")?;
        writeln!(f)?;

        close_namespace(f, self.namespace)?;
        writeln!(f, "#endif // IDENTIFIERS_HPP")
    }
}

impl AsModule for IdentifiersHeader<'_> {
    fn as_module(&self) -> std::io::Result<Module> {
        let mut contents = vec![];
        self.write(&mut contents)?;
        Ok(Module {
            name: String::from("identifiers.hpp"),
            contents,
        })
    }
}

/// `Decoder::decode` and the per-instruction decoding functions.
pub struct DecoderSource<'a> {
    table: &'a CompiledTable,
    namespace: &'a str,
    policy: DispatchPolicy,
}

impl<'a> DecoderSource<'a> {
    pub fn new(table: &'a CompiledTable, namespace: &'a str, policy: DispatchPolicy) -> Self {
        Self {
            table,
            namespace,
            policy,
        }
    }

    pub fn write(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(f, "{BANNER}")?;
        let mut includes = vec!["<cstdint>", "<format>", "<stdexcept>"];
        if self.policy == DispatchPolicy::Flat {
            includes.extend(["<array>", "<unordered_map>", "<vector>"]);
            includes.sort_unstable();
        }
        for include in includes {
            writeln!(f, "#include {include}")?;
        }
        writeln!(f)?;
        writeln!(f, "#include \"bits_manipulation.hpp\"")?;
        writeln!(f, "#include \"decoder.hpp\"")?;
        writeln!(f, "#include \"identifiers.hpp\"")?;
        writeln!(f)?;
        open_namespace(f, self.namespace)?;

        writeln!(f, "namespace")?;
        writeln!(f, "{{")?;
        writeln!(f)?;
        writeln!(
            f,
            "constexpr std::uint64_t key(Decoder::mask_type mask, Decoder::match_type match) noexcept"
        )?;
        writeln!(f, "{{")?;
        writeln!(
            f,
            "{}return (std::uint64_t{{mask}} << 32) | match;",
            indent(1)
        )?;
        writeln!(f, "}}")?;
        writeln!(f)?;
        writeln!(f, "}} // namespace")?;
        writeln!(f)?;

        match self.policy {
            DispatchPolicy::Switch => {
                self.write_decode_switch(f)?;
                writeln!(f)?;
                self.write_get_decoder(f)?;
            }
            DispatchPolicy::Flat => {
                self.write_masks_array(f)?;
                writeln!(f)?;
                self.write_trials_map(f)?;
                writeln!(f)?;
                self.write_match_map(f)?;
                writeln!(f)?;
                self.write_decode_flat(f)?;
            }
        }
        writeln!(f)?;
        close_namespace(f, self.namespace)
    }

    fn write_decode_switch(&self, f: &mut impl Write) -> std::io::Result<()> {
        let plan = self.table.plan();
        writeln!(f, "Instruction Decoder::decode(RawInstruction raw_instr)")?;
        writeln!(f, "{{")?;
        writeln!(f, "{}auto opcode = get_bits<6, 0>(raw_instr);", indent(1))?;
        writeln!(f, "{}switch (opcode)", indent(1))?;
        writeln!(f, "{}{{", indent(1))?;
        for (opcode, group) in self.table.partition().used() {
            if let [mask] = group.masks() {
                writeln!(f, "{}case {opcode:#x}:", indent(2))?;
                writeln!(
                    f,
                    "{}if (auto decoder = get_decoder({mask:#x}, raw_instr & {mask:#x})) [[likely]]",
                    indent(3)
                )?;
                writeln!(f, "{}return decoder(raw_instr);", indent(4))?;
                writeln!(f, "{}break;", indent(3))?;
            }
        }
        for (opcode, trials) in plan.trials() {
            let masks = trials
                .iter()
                .map(|mask| format!("mask_type{{{mask:#x}}}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "{}case {opcode:#x}:", indent(2))?;
            writeln!(f, "{}for (auto mask : {{{masks}}})", indent(3))?;
            writeln!(f, "{}{{", indent(3))?;
            writeln!(
                f,
                "{}if (auto decoder = get_decoder(mask, raw_instr & mask))",
                indent(4)
            )?;
            writeln!(f, "{}return decoder(raw_instr);", indent(5))?;
            writeln!(f, "{}}}", indent(3))?;
            writeln!(f, "{}break;", indent(3))?;
        }
        writeln!(f, "{}default: [[unlikely]]", indent(2))?;
        write_unknown_opcode(f, 3)?;
        writeln!(f, "{}}}", indent(1))?;
        writeln!(f)?;
        write_unknown_instruction(f, 1)?;
        writeln!(f, "}}")
    }

    fn write_get_decoder(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(
            f,
            "Decoder::decoding_func_type Decoder::get_decoder(mask_type mask, match_type match) noexcept"
        )?;
        writeln!(f, "{{")?;
        writeln!(f, "{}switch (key(mask, match))", indent(1))?;
        writeln!(f, "{}{{", indent(1))?;
        let identifiers = self.table.identifiers();
        for (id, _) in identifiers.iter() {
            let descriptor = self.table.descriptor(id);
            writeln!(
                f,
                "{}case key({:#x}, {:#x}):",
                indent(2),
                descriptor.mask(),
                descriptor.match_value()
            )?;
            write!(f, "{}return ", indent(3))?;
            write_decoding_lambda(f, &identifiers.symbol(id), &self.table.rule(id), 3)?;
            writeln!(f, ";")?;
        }
        writeln!(f, "{}default: [[unlikely]]", indent(2))?;
        writeln!(f, "{}return nullptr;", indent(3))?;
        writeln!(f, "{}}}", indent(1))?;
        writeln!(f, "}}")
    }

    fn write_masks_array(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(
            f,
            "const std::array<Decoder::mask_type, {OPCODE_COUNT}> Decoder::masks_ = {{"
        )?;
        let lines = self
            .table
            .plan()
            .mask_table()
            .chunks(MASKS_PER_LINE)
            .map(|chunk| {
                let masks = chunk
                    .iter()
                    .map(|mask| format!("{mask:#010x}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}{masks}", indent(1))
            })
            .collect::<Vec<_>>();
        writeln!(f, "{}", lines.join(",\n"))?;
        writeln!(f, "}};")
    }

    fn write_trials_map(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(
            f,
            "const std::unordered_map<std::uint8_t, std::vector<Decoder::mask_type>> Decoder::trials_ = {{"
        )?;
        for (opcode, trials) in self.table.plan().trials() {
            let masks = trials
                .iter()
                .map(|mask| format!("{mask:#x}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "{}{{{opcode:#x}, {{{masks}}}}},", indent(1))?;
        }
        writeln!(f, "}};")
    }

    fn write_match_map(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(
            f,
            "const std::unordered_map<std::uint64_t, Decoder::decoding_func_type> Decoder::match_map_ = {{"
        )?;
        let identifiers = self.table.identifiers();
        for (id, _) in identifiers.iter() {
            let descriptor = self.table.descriptor(id);
            write!(
                f,
                "{}{{key({:#x}, {:#x}), ",
                indent(1),
                descriptor.mask(),
                descriptor.match_value()
            )?;
            write_decoding_lambda(f, &identifiers.symbol(id), &self.table.rule(id), 1)?;
            writeln!(f, "}},")?;
        }
        writeln!(f, "}};")
    }

    fn write_decode_flat(&self, f: &mut impl Write) -> std::io::Result<()> {
        writeln!(f, "Instruction Decoder::decode(RawInstruction raw_instr)")?;
        writeln!(f, "{{")?;
        writeln!(f, "{}auto opcode = get_bits<6, 0>(raw_instr);", indent(1))?;
        writeln!(f, "{}auto try_mask = [raw_instr](mask_type mask) {{", indent(1))?;
        writeln!(
            f,
            "{}auto it = match_map_.find(key(mask, raw_instr & mask));",
            indent(2)
        )?;
        writeln!(
            f,
            "{}return it == match_map_.end() ? nullptr : it->second;",
            indent(2)
        )?;
        writeln!(f, "{}}};", indent(1))?;
        writeln!(f)?;
        writeln!(f, "{}if (auto mask = masks_[opcode]) [[likely]]", indent(1))?;
        writeln!(f, "{}{{", indent(1))?;
        writeln!(f, "{}if (auto decoder = try_mask(mask))", indent(2))?;
        writeln!(f, "{}return decoder(raw_instr);", indent(3))?;
        writeln!(f, "{}}}", indent(1))?;
        writeln!(
            f,
            "{}else if (auto trials = trials_.find(opcode); trials != trials_.end())",
            indent(1)
        )?;
        writeln!(f, "{}{{", indent(1))?;
        writeln!(f, "{}for (auto mask : trials->second)", indent(2))?;
        writeln!(f, "{}{{", indent(2))?;
        writeln!(f, "{}if (auto decoder = try_mask(mask))", indent(3))?;
        writeln!(f, "{}return decoder(raw_instr);", indent(4))?;
        writeln!(f, "{}}}", indent(2))?;
        writeln!(f, "{}}}", indent(1))?;
        writeln!(f, "{}else [[unlikely]]", indent(1))?;
        write_unknown_opcode(f, 2)?;
        writeln!(f)?;
        write_unknown_instruction(f, 1)?;
        writeln!(f, "}}")
    }
}

impl AsModule for DecoderSource<'_> {
    fn as_module(&self) -> std::io::Result<Module> {
        let mut contents = vec![];
        self.write(&mut contents)?;
        Ok(Module {
            name: String::from("decoder.cpp"),
            contents,
        })
    }
}

/// `exec_<id>` declarations and the `kCallbacks_` table indexed by `InstrID`.
/// Meant to be included inside the `Executor` class body.
pub struct ExecutorTable<'a> {
    table: &'a CompiledTable,
    namespace: &'a str,
}

impl<'a> ExecutorTable<'a> {
    pub fn new(table: &'a CompiledTable, namespace: &'a str) -> Self {
        Self { table, namespace }
    }

    pub fn write(&self, f: &mut impl Write) -> std::io::Result<()> {
        let identifiers = self.table.identifiers();
        writeln!(f, "{BANNER}")?;
        writeln!(f, "// Included into the body of {}::Executor.", self.namespace)?;
        writeln!(f)?;
        for (id, _) in identifiers.iter() {
            writeln!(
                f,
                "{}static bool {}(Hart &h, const Instruction &instr);",
                indent(1),
                callback_name(&identifiers.symbol(id))
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{}static constexpr std::array<callback_type, InstrID::kEndID> kCallbacks_ = {{",
            indent(1)
        )?;
        let callbacks = identifiers
            .iter()
            .map(|(id, _)| format!("{}{}", indent(2), callback_name(&identifiers.symbol(id))))
            .collect::<Vec<_>>();
        writeln!(f, "{}", callbacks.join(",\n"))?;
        writeln!(f, "{}}};", indent(1))
    }
}

impl AsModule for ExecutorTable<'_> {
    fn as_module(&self) -> std::io::Result<Module> {
        let mut contents = vec![];
        self.write(&mut contents)?;
        Ok(Module {
            name: String::from("executor_table.hpp"),
            contents,
        })
    }
}

fn callback_name(symbol: &str) -> String {
    format!("exec_{}", symbol.to_ascii_lowercase())
}

fn open_namespace(f: &mut impl Write, namespace: &str) -> std::io::Result<()> {
    writeln!(f, "namespace {namespace}")?;
    writeln!(f, "{{")?;
    writeln!(f)
}

fn close_namespace(f: &mut impl Write, namespace: &str) -> std::io::Result<()> {
    writeln!(f, "}} // namespace {namespace}")?;
    writeln!(f)
}

fn write_unknown_opcode(f: &mut impl Write, level: usize) -> std::io::Result<()> {
    writeln!(f, "{}throw std::invalid_argument{{std::format(", indent(level))?;
    writeln!(
        f,
        "{}\"unknown opcode {{:#x}} of instruction {{:#x}}\", opcode, raw_instr)}};",
        indent(level + 1)
    )
}

fn write_unknown_instruction(f: &mut impl Write, level: usize) -> std::io::Result<()> {
    writeln!(f, "{}throw std::invalid_argument{{std::format(", indent(level))?;
    writeln!(
        f,
        "{}\"unknown instruction {{:#x}} (opcode {{:#x}})\", raw_instr, opcode)}};",
        indent(level + 1)
    )
}

/// Expression computing the immediate of `format` from `raw_instr`.
fn immediate_expression(format: ImmediateFormat) -> Option<&'static str> {
    match format {
        ImmediateFormat::I => Some("decode_i_imm(raw_instr)"),
        ImmediateFormat::S => Some("decode_s_imm(raw_instr)"),
        ImmediateFormat::B => Some("decode_b_imm(raw_instr)"),
        ImmediateFormat::U => Some("decode_u_imm(raw_instr)"),
        ImmediateFormat::J => Some("decode_j_imm(raw_instr)"),
        ImmediateFormat::Fence => Some("get_bits<31, 20>(raw_instr)"),
        ImmediateFormat::None => None,
    }
}

/// Writes a capture-less lambda building the `Instruction` of `symbol`. The
/// opening line continues the current one; the closing brace is left
/// unterminated.
fn write_decoding_lambda(
    f: &mut impl Write,
    symbol: &str,
    rule: &FieldRule,
    level: usize,
) -> std::io::Result<()> {
    let mut initializers = vec![
        String::from(".raw = raw_instr"),
        format!(".id = InstrID::k{symbol}"),
    ];
    if rule.rs1 {
        initializers.push(String::from(".rs1 = get_bits_r<19, 15, Byte>(raw_instr)"));
    }
    if rule.rs2 {
        initializers.push(String::from(".rs2 = get_bits_r<24, 20, Byte>(raw_instr)"));
    }
    if rule.rd {
        initializers.push(String::from(".rd = get_bits_r<11, 7, Byte>(raw_instr)"));
    }
    if let Some(imm) = immediate_expression(rule.immediate) {
        initializers.push(format!(".imm = {imm}"));
    }

    writeln!(f, "[](RawInstruction raw_instr) noexcept {{")?;
    writeln!(f, "{}return Instruction{{", indent(level + 1))?;
    let body = initializers
        .iter()
        .map(|initializer| format!("{}{initializer}", indent(level + 2)))
        .collect::<Vec<_>>();
    writeln!(f, "{}", body.join(",\n"))?;
    writeln!(f, "{}}};", indent(level + 1))?;
    write!(f, "{}}}", indent(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::compiled;

    fn text(module: &dyn AsModule) -> String {
        String::from_utf8(module.as_module().unwrap().contents).unwrap()
    }

    #[test]
    fn identifiers_header() {
        let table = compiled();
        let header = text(&IdentifiersHeader::new(&table, "yarvs"));
        assert!(header.starts_with("/*\n * This file is automatically generated"));
        assert!(header.contains("namespace yarvs\n{"));
        assert!(header.contains("    kLUI,\n    kAUIPC,\n"));
        assert!(header.contains("    kFENCE_I,\n"));
        assert!(header.contains("    kREMUW,\n    kEndID\n};"));
        assert!(header.contains("        case kADDI:\n            return \"ADDI\";"));
        assert_eq!(
            header.matches("case k").count(),
            table.identifiers().len()
        );
    }

    #[test]
    fn switch_decoder() {
        let table = compiled();
        let source = text(&DecoderSource::new(&table, "yarvs", DispatchPolicy::Switch));
        assert!(source.contains(
            "        case 0x33:\n            if (auto decoder = get_decoder(0xfe00707f, raw_instr & 0xfe00707f)) [[likely]]"
        ));
        assert!(source.contains(
            "        case 0x13:\n            for (auto mask : {mask_type{0xfc00707f}, mask_type{0x707f}})"
        ));
        assert!(source.contains("for (auto mask : {mask_type{0xffffffff}, mask_type{0x707f}})"));
        assert!(!source.contains("case 0x7f:"));
        assert!(source.contains(
            "        case key(0x707f, 0x13):\n            return [](RawInstruction raw_instr) noexcept {\n"
        ));
        assert_eq!(
            source.matches("case key(").count(),
            table.identifiers().len()
        );
        assert!(!source.contains("match_map_"));
    }

    #[test]
    fn decoding_lambdas_follow_field_rules() {
        let table = compiled();
        let source = text(&DecoderSource::new(&table, "yarvs", DispatchPolicy::Switch));
        let beq = "                    .raw = raw_instr,\n                    .id = InstrID::kBEQ,\n                    .rs1 = get_bits_r<19, 15, Byte>(raw_instr),\n                    .rs2 = get_bits_r<24, 20, Byte>(raw_instr),\n                    .imm = decode_b_imm(raw_instr)\n";
        assert!(source.contains(beq));
        let ecall = "                    .raw = raw_instr,\n                    .id = InstrID::kECALL\n";
        assert!(source.contains(ecall));
        assert!(source.contains(".imm = get_bits<31, 20>(raw_instr)"));
    }

    #[test]
    fn flat_decoder() {
        let table = compiled();
        let source = text(&DecoderSource::new(&table, "yarvs", DispatchPolicy::Flat));
        assert!(source.contains("Decoder::masks_ = {\n    0x00000000, 0x00000000, 0x00000000, 0x0000707f,"));
        assert!(source.contains("    {0x13, {0xfc00707f, 0x707f}},\n"));
        assert!(source.contains("    {key(0xfe00707f, 0x40000033), [](RawInstruction raw_instr) noexcept {\n"));
        assert_eq!(source.matches("{key(").count(), table.identifiers().len());
        assert!(!source.contains("get_decoder"));
    }

    #[test]
    fn executor_table() {
        let table = compiled();
        let header = text(&ExecutorTable::new(&table, "yarvs"));
        assert!(header.contains("    static bool exec_addi(Hart &h, const Instruction &instr);\n"));
        assert!(header.contains("    static bool exec_fence_i(Hart &h, const Instruction &instr);\n"));
        assert!(header.contains("std::array<callback_type, InstrID::kEndID> kCallbacks_ = {\n        exec_lui,\n"));
        assert!(header.contains("        exec_remuw\n    };"));
    }

    #[test]
    fn custom_namespace() {
        let table = compiled();
        let header = text(&IdentifiersHeader::new(&table, "sim"));
        assert!(header.contains("namespace sim\n{"));
        assert!(header.contains("} // namespace sim"));
    }
}
