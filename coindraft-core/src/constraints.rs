//! Coin-selection constraints
//!
//! Holds the optional explicit UTXO selection strategy and the
//! exclusion filter currently in force. The selector is a closed
//! variant matched exhaustively at every use site; the exclusion merge
//! rule is selector-aware before filter-aware so the two mechanisms
//! never fight over the same UTXO.

use std::collections::{BTreeMap, BTreeSet};

use bitcoin::OutPoint;

use crate::error::EngineError;
use crate::types::WalletNode;

/// The selection strategy currently in force.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// No explicit choice: the engine composes its automatic
    /// strategies (exact-match first, greedy fallback).
    Automatic,
    /// Pin the exact set of inputs to use, bypassing automatic
    /// algorithms.
    Preset(BTreeSet<OutPoint>),
    /// Spend everything available.
    MaxAvailable,
}

impl Default for Selector {
    fn default() -> Self {
        Selector::Automatic
    }
}

/// UTXOs barred from automatic selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeUtxoFilter {
    pub excluded: BTreeSet<OutPoint>,
}

impl ExcludeUtxoFilter {
    pub fn is_excluded(&self, utxo: &OutPoint) -> bool {
        self.excluded.contains(utxo)
    }
}

/// Selection strategy plus exclusion filter, mutated by UI input or
/// external events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionConstraints {
    pub selector: Selector,
    pub filter: Option<ExcludeUtxoFilter>,
}

impl SelectionConstraints {
    /// Install a preset selection and drop any filter (the selector
    /// subsumes it).
    pub fn set_preset(&mut self, utxos: BTreeSet<OutPoint>) {
        self.selector = Selector::Preset(utxos);
        self.filter = None;
    }

    /// Remove a UTXO from consideration, whatever the current state.
    ///
    /// - `MaxAvailable`: materialize a preset of all wallet UTXOs minus
    ///   this one minus any active exclusions, then drop the filter.
    /// - `Preset`: remove from the member set directly. Fails without
    ///   mutating when that would empty the set.
    /// - `Automatic`: add to the exclusion filter, creating one if
    ///   absent and preserving existing exclusions.
    pub fn exclude_utxo(
        &mut self,
        utxo: OutPoint,
        wallet_utxos: &BTreeMap<OutPoint, WalletNode>,
    ) -> Result<(), EngineError> {
        match &mut self.selector {
            Selector::MaxAvailable => {
                let mut preset: BTreeSet<OutPoint> = wallet_utxos.keys().copied().collect();
                preset.remove(&utxo);
                if let Some(filter) = &self.filter {
                    for excluded in &filter.excluded {
                        preset.remove(excluded);
                    }
                }
                self.selector = Selector::Preset(preset);
                self.filter = None;
                Ok(())
            }
            Selector::Preset(preset) => {
                let remaining = preset.iter().filter(|u| **u != utxo).count();
                if remaining == 0 {
                    return Err(EngineError::EmptyPresetAfterExclusion);
                }
                preset.remove(&utxo);
                Ok(())
            }
            Selector::Automatic => {
                self.filter
                    .get_or_insert_with(ExcludeUtxoFilter::default)
                    .excluded
                    .insert(utxo);
                Ok(())
            }
        }
    }

    /// The filters to hand to the transaction builder.
    pub fn filters(&self) -> Vec<ExcludeUtxoFilter> {
        match &self.filter {
            Some(filter) => vec![filter.clone()],
            None => Vec::new(),
        }
    }

    /// Human-readable summary of the constraint in force, for display
    /// next to a clear control. Empty when nothing is constrained.
    pub fn summary(&self) -> String {
        match (&self.selector, &self.filter) {
            (Selector::Preset(preset), _) => {
                let n = preset.len();
                format!(" ({} UTXO{} selected)", n, if n == 1 { "" } else { "s" })
            }
            (_, Some(filter)) => {
                let n = filter.excluded.len();
                format!(" ({} UTXO{} excluded)", n, if n == 1 { "" } else { "s" })
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;
    use std::str::FromStr;

    fn outpoint(n: u32) -> OutPoint {
        let txid =
            Txid::from_str("9dcbf5a86b4e70be97fc5c953ad4111dfe0a94ea6768286e5efd6c35fd9ec9d1")
                .unwrap();
        OutPoint::new(txid, n)
    }

    fn wallet_utxos(count: u32) -> BTreeMap<OutPoint, WalletNode> {
        (0..count)
            .map(|n| (outpoint(n), WalletNode::new(format!("/0/{}", n))))
            .collect()
    }

    #[test]
    fn exclude_with_no_selector_adds_filter() {
        let mut constraints = SelectionConstraints::default();
        constraints
            .exclude_utxo(outpoint(0), &wallet_utxos(3))
            .unwrap();
        constraints
            .exclude_utxo(outpoint(1), &wallet_utxos(3))
            .unwrap();

        assert_eq!(constraints.selector, Selector::Automatic);
        let filter = constraints.filter.as_ref().unwrap();
        assert!(filter.is_excluded(&outpoint(0)));
        assert!(filter.is_excluded(&outpoint(1)));
    }

    #[test]
    fn exclude_with_max_available_materializes_preset() {
        let mut constraints = SelectionConstraints::default();
        constraints
            .exclude_utxo(outpoint(2), &wallet_utxos(4))
            .unwrap();
        constraints.selector = Selector::MaxAvailable;

        constraints
            .exclude_utxo(outpoint(0), &wallet_utxos(4))
            .unwrap();

        // Preset contains everything except the excluded utxo and the
        // prior filter entries; the filter is gone.
        match &constraints.selector {
            Selector::Preset(preset) => {
                assert!(!preset.contains(&outpoint(0)));
                assert!(!preset.contains(&outpoint(2)));
                assert!(preset.contains(&outpoint(1)));
                assert!(preset.contains(&outpoint(3)));
            }
            other => panic!("expected preset, got {:?}", other),
        }
        assert!(constraints.filter.is_none());
    }

    #[test]
    fn exclude_from_preset_removes_directly() {
        let mut constraints = SelectionConstraints::default();
        constraints.set_preset([outpoint(0), outpoint(1)].into_iter().collect());

        constraints
            .exclude_utxo(outpoint(0), &wallet_utxos(2))
            .unwrap();

        assert_eq!(
            constraints.selector,
            Selector::Preset([outpoint(1)].into_iter().collect())
        );
    }

    #[test]
    fn emptying_a_preset_fails_without_mutating() {
        let mut constraints = SelectionConstraints::default();
        constraints.set_preset([outpoint(0)].into_iter().collect());

        let err = constraints
            .exclude_utxo(outpoint(0), &wallet_utxos(1))
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyPresetAfterExclusion);
        assert_eq!(
            constraints.selector,
            Selector::Preset([outpoint(0)].into_iter().collect())
        );
    }

    #[test]
    fn summary_reports_selection_and_exclusion() {
        let mut constraints = SelectionConstraints::default();
        assert_eq!(constraints.summary(), "");

        constraints
            .exclude_utxo(outpoint(0), &wallet_utxos(2))
            .unwrap();
        assert_eq!(constraints.summary(), " (1 UTXO excluded)");

        constraints.set_preset([outpoint(0), outpoint(1)].into_iter().collect());
        assert_eq!(constraints.summary(), " (2 UTXOs selected)");
    }
}
