use std::sync::OnceLock;

use proptest::prelude::*;
use proptest::sample::Index;
use tablegen::{fixtures, CompiledTable, DecodeError, ImmediateFormat, InstrId, Operands};

fn table() -> &'static CompiledTable {
    static TABLE: OnceLock<CompiledTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let description = fixtures::rv64_base().unwrap();
        CompiledTable::compile(&description).unwrap()
    })
}

fn pick(index: &Index) -> InstrId {
    let identifiers = table().identifiers();
    identifiers
        .iter()
        .nth(index.index(identifiers.len()))
        .map(|(id, _)| id)
        .unwrap()
}

/// Operands read straight from the RISC-V bit layout of `raw`.
fn layout_operands(format: ImmediateFormat, raw: u32) -> (u8, u8, u8, Option<i64>) {
    let field = |shift: u32, width: u32| ((raw >> shift) & ((1 << width) - 1)) as i32;
    // arithmetic shift keeps the sign of bit 31
    let sign = (raw as i32) >> 31;
    let imm = match format {
        ImmediateFormat::I => Some((raw as i32) >> 20),
        ImmediateFormat::S => Some(((raw as i32) >> 25 << 5) | field(7, 5)),
        ImmediateFormat::B => Some(
            (sign << 12) | (field(7, 1) << 11) | (field(25, 6) << 5) | (field(8, 4) << 1),
        ),
        ImmediateFormat::J => Some(
            (sign << 20) | (field(12, 8) << 12) | (field(20, 1) << 11) | (field(21, 10) << 1),
        ),
        ImmediateFormat::U | ImmediateFormat::Fence | ImmediateFormat::None => None,
    };
    (
        field(15, 5) as u8,
        field(20, 5) as u8,
        field(7, 5) as u8,
        imm.map(i64::from),
    )
}

proptest! {
    #[test]
    fn canonical_encoding_round_trips(
        index in any::<Index>(),
        rs1 in 0u8..32,
        rs2 in 0u8..32,
        rd in 0u8..32,
        imm_bits in any::<u32>(),
    ) {
        let table = table();
        let id = pick(&index);
        let descriptor = table.descriptor(id);
        let rule = table.rule(id);
        let operands = Operands {
            rs1: Some(rs1),
            rs2: Some(rs2),
            rd: Some(rd),
            imm: rule.immediate.decode(imm_bits),
        };

        let raw = descriptor.encode(&operands).unwrap();
        prop_assert_eq!(raw & descriptor.mask(), descriptor.match_value());

        let decoded = table.decoder().decode(raw).unwrap();
        prop_assert_eq!(decoded.id, id);
        prop_assert_eq!(decoded.raw, raw);
        prop_assert_eq!(decoded.operands.rs1, rule.rs1.then_some(rs1));
        prop_assert_eq!(decoded.operands.rs2, rule.rs2.then_some(rs2));
        prop_assert_eq!(decoded.operands.rd, rule.rd.then_some(rd));

        match (operands.imm, decoded.operands.imm) {
            (None, None) => prop_assert_eq!(rule.immediate, ImmediateFormat::None),
            (Some(placed), Some(read)) => {
                // Immediate bits that are literal in the encoding (shift
                // opcodes, CSR numbers) come back as the literal value.
                let free = rule.immediate.bit_mask() & !descriptor.mask();
                prop_assert_eq!(
                    rule.immediate.encode(read) & free,
                    rule.immediate.encode(placed) & free
                );
                if rule.immediate.bit_mask() & descriptor.mask() == 0 {
                    prop_assert_eq!(read, placed);
                }
            }
            other => prop_assert!(false, "immediate mismatch {:?}", other),
        }
    }

    #[test]
    fn immediates_follow_the_bit_layout(word in any::<u32>()) {
        for format in [
            ImmediateFormat::I,
            ImmediateFormat::S,
            ImmediateFormat::B,
            ImmediateFormat::J,
        ] {
            prop_assert_eq!(format.decode(word), layout_operands(format, word).3);
        }
    }

    #[test]
    fn decoded_instructions_match_their_encoding(raw in any::<u32>()) {
        let table = table();
        match table.decoder().decode(raw) {
            Ok(decoded) => {
                let descriptor = table.descriptor(decoded.id);
                prop_assert!(descriptor.matches(raw));
                let rule = table.rule(decoded.id);
                let (rs1, rs2, rd, imm) = layout_operands(rule.immediate, raw);
                prop_assert_eq!(decoded.operands.rs1, rule.rs1.then_some(rs1));
                prop_assert_eq!(decoded.operands.rs2, rule.rs2.then_some(rs2));
                prop_assert_eq!(decoded.operands.rd, rule.rd.then_some(rd));
                if imm.is_some() {
                    prop_assert_eq!(decoded.operands.imm, imm);
                }
            }
            Err(DecodeError::UnknownOpcode { opcode, .. }) => {
                prop_assert!(!table.partition().group(opcode).unwrap().is_used());
            }
            Err(DecodeError::UnknownInstruction { opcode, .. }) => {
                let unmatched = table
                    .descriptors()
                    .iter()
                    .filter(|d| d.opcode() == opcode)
                    .all(|d| !d.matches(raw));
                prop_assert!(unmatched);
            }
        }
    }
}
