use std::collections::BTreeMap;

use common::constants::OPCODE_COUNT;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::partition::OpcodePartition;

/// Order in which the masks of an ambiguous opcode are probed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TrialOrder {
    /// Most literal bits first; equal bit counts fall back to the larger
    /// numeric value.
    #[default]
    Specificity,
    /// Larger numeric mask value first.
    NumericDescending,
}

impl TrialOrder {
    pub fn sort(self, masks: &[u32]) -> Vec<u32> {
        match self {
            TrialOrder::Specificity => masks
                .iter()
                .copied()
                .sorted_by(|a, b| b.count_ones().cmp(&a.count_ones()).then(b.cmp(a)))
                .collect(),
            TrialOrder::NumericDescending => masks.iter().copied().sorted_by(|a, b| b.cmp(a)).collect(),
        }
    }
}

/// How each opcode is dispatched.
///
/// `mask_table[opcode]` holds the sole mask of a single-mask opcode and zero
/// otherwise. Opcodes with several masks have an ordered trial list instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    order: TrialOrder,
    mask_table: Vec<u32>,
    trials: BTreeMap<u8, Vec<u32>>,
}

/// What the decoder does with a given opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<'a> {
    Unused,
    Single(u32),
    Trials(&'a [u32]),
}

impl DispatchPlan {
    #[tracing::instrument(skip_all, name = "DispatchPlan::build")]
    pub fn build(partition: &OpcodePartition, order: TrialOrder) -> Self {
        let mut mask_table = vec![0; OPCODE_COUNT];
        let mut trials = BTreeMap::new();

        for (opcode, group) in partition.used() {
            match group.masks() {
                [mask] => mask_table[usize::from(opcode)] = *mask,
                masks => {
                    let sorted = order.sort(masks);
                    tracing::debug!(
                        opcode = format_args!("{opcode:#04x}"),
                        trials = ?sorted,
                        "ambiguous opcode"
                    );
                    trials.insert(opcode, sorted);
                }
            }
        }

        Self {
            order,
            mask_table,
            trials,
        }
    }

    pub fn order(&self) -> TrialOrder {
        self.order
    }

    /// The 128-entry opcode to mask table.
    pub fn mask_table(&self) -> &[u32] {
        &self.mask_table
    }

    pub fn trials(&self) -> &BTreeMap<u8, Vec<u32>> {
        &self.trials
    }

    pub fn dispatch(&self, opcode: u8) -> Dispatch<'_> {
        match self.mask_table.get(usize::from(opcode)) {
            Some(&mask) if mask != 0 => Dispatch::Single(mask),
            _ => match self.trials.get(&opcode) {
                Some(trials) => Dispatch::Trials(trials),
                None => Dispatch::Unused,
            },
        }
    }

    /// Masks to probe for `opcode`, in order. Empty for unused opcodes.
    pub fn masks_for(&self, opcode: u8) -> &[u32] {
        match self.dispatch(opcode) {
            Dispatch::Unused => &[],
            Dispatch::Single(_) => std::slice::from_ref(&self.mask_table[usize::from(opcode)]),
            Dispatch::Trials(trials) => trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::descriptors;
    use std::str::FromStr;

    #[test]
    fn single_and_ambiguous_opcodes() {
        let partition = OpcodePartition::build(&descriptors());
        let plan = DispatchPlan::build(&partition, TrialOrder::default());

        assert_eq!(plan.mask_table().len(), OPCODE_COUNT);
        assert_eq!(plan.dispatch(0x33), Dispatch::Single(0xfe00_707f));
        assert_eq!(plan.dispatch(0x37), Dispatch::Single(0x7f));
        assert_eq!(plan.dispatch(0x7f), Dispatch::Unused);
        assert_eq!(
            plan.dispatch(0x13),
            Dispatch::Trials(&[0xfc00_707f, 0x0000_707f])
        );
        assert_eq!(
            plan.dispatch(0x73),
            Dispatch::Trials(&[0xffff_ffff, 0x0000_707f])
        );
        // ambiguous opcodes keep a zero entry in the mask table
        assert_eq!(plan.mask_table()[0x13], 0);
        assert_eq!(plan.masks_for(0x33), [0xfe00_707f]);
        assert!(plan.masks_for(0x7f).is_empty());
    }

    #[test]
    fn every_used_opcode_is_covered() {
        let partition = OpcodePartition::build(&descriptors());
        let plan = DispatchPlan::build(&partition, TrialOrder::default());
        for opcode in 0..OPCODE_COUNT as u8 {
            let used = partition.group(opcode).unwrap().is_used();
            assert_eq!(plan.dispatch(opcode) != Dispatch::Unused, used, "{opcode:#x}");
        }
    }

    #[test]
    fn specificity_beats_numeric_value() {
        // 0x8000_007f has 8 literal bits, 0x0000_707f has 10
        let masks = [0x8000_007f, 0x0000_707f];
        assert_eq!(TrialOrder::Specificity.sort(&masks), [0x0000_707f, 0x8000_007f]);
        assert_eq!(
            TrialOrder::NumericDescending.sort(&masks),
            [0x8000_007f, 0x0000_707f]
        );
    }

    #[test]
    fn equal_specificity_falls_back_to_numeric() {
        let masks = [0x0000_707f, 0x0700_007f];
        assert_eq!(TrialOrder::Specificity.sort(&masks), [0x0700_007f, 0x0000_707f]);
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!(TrialOrder::from_str("specificity"), Ok(TrialOrder::Specificity));
        assert_eq!(
            TrialOrder::from_str("numeric-descending"),
            Ok(TrialOrder::NumericDescending)
        );
    }
}
