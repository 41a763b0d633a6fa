//! Spent-UTXO watch for finalized drafts
//!
//! After a draft is finalized its inputs are watched: each wallet
//! history update is checked for spend confirmations of the exact
//! outputs the draft consumed. Once every consumed UTXO is confirmed
//! spent the draft is resolved and the engine can reset.

use std::collections::{BTreeMap, BTreeSet};

use bitcoin::OutPoint;

use crate::types::{FinalizedDraft, NodeHistory, WalletNode};

/// Outcome of applying a history update to the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerVerdict {
    /// No finalized draft is being watched.
    Inactive,
    /// Every consumed UTXO is now confirmed spent.
    Resolved,
    /// The draft is still pending; the current draft may have gone
    /// stale (e.g. a concurrent spend elsewhere) and should be
    /// recomputed, without discarding the watch.
    Stale,
}

/// Watches a finalized draft's inputs until they are all confirmed
/// spent.
#[derive(Debug, Default)]
pub struct SpentUtxoTracker {
    pending: BTreeMap<OutPoint, WalletNode>,
    watched_nodes: BTreeSet<WalletNode>,
    active: bool,
}

impl SpentUtxoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin watching a finalized draft. Replaces any prior watch.
    pub fn watch(&mut self, finalized: &FinalizedDraft) {
        self.pending = finalized.consumed_utxos().clone();
        self.watched_nodes = finalized.watched_nodes.clone();
        self.active = true;
        log::debug!(
            "watching {} utxos across {} nodes for spend confirmation",
            self.pending.len(),
            self.watched_nodes.len()
        );
    }

    /// Stop watching.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.watched_nodes.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// UTXOs not yet confirmed spent.
    pub fn pending_utxos(&self) -> impl Iterator<Item = &OutPoint> {
        self.pending.keys()
    }

    /// Apply a wallet history update.
    ///
    /// A pending UTXO is confirmed spent when an affected node that
    /// owns it now lists a transaction output with the same outpoint
    /// marked spent.
    pub fn apply(&mut self, changes: &[NodeHistory]) -> TrackerVerdict {
        if !self.active {
            return TrackerVerdict::Inactive;
        }

        let confirmed: Vec<OutPoint> = self
            .pending
            .iter()
            .filter(|(utxo, owner)| {
                changes.iter().any(|change| {
                    change.node == **owner
                        && change
                            .txos
                            .iter()
                            .any(|txo| txo.outpoint == **utxo && txo.spent)
                })
            })
            .map(|(utxo, _)| *utxo)
            .collect();

        for utxo in confirmed {
            self.pending.remove(&utxo);
        }

        if self.pending.is_empty() {
            log::debug!("all finalized utxos confirmed spent");
            self.active = false;
            TrackerVerdict::Resolved
        } else {
            TrackerVerdict::Stale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DraftTransaction, TxoRef};
    use bitcoin::{Amount, Txid};
    use std::str::FromStr;

    fn outpoint(n: u32) -> OutPoint {
        let txid =
            Txid::from_str("3d7c1421a4732a250ee59ce08b2ae34b5de8d3242e266a81a3d09887b8ca2e7c")
                .unwrap();
        OutPoint::new(txid, n)
    }

    fn finalized_with(utxos: &[(u32, &str)]) -> FinalizedDraft {
        let selected: BTreeMap<OutPoint, WalletNode> = utxos
            .iter()
            .map(|(n, node)| (outpoint(*n), WalletNode::new(*node)))
            .collect();
        FinalizedDraft::new(DraftTransaction {
            selected_utxos: selected,
            payments: vec![],
            change: None,
            consolidation_nodes: vec![],
            fee: Amount::from_sat(300),
            vsize: 150,
        })
    }

    fn spent(node: &str, n: u32) -> NodeHistory {
        NodeHistory {
            node: WalletNode::new(node),
            txos: vec![TxoRef {
                outpoint: outpoint(n),
                spent: true,
            }],
        }
    }

    #[test]
    fn inactive_without_watch() {
        let mut tracker = SpentUtxoTracker::new();
        assert_eq!(tracker.apply(&[spent("/0/0", 0)]), TrackerVerdict::Inactive);
    }

    #[test]
    fn resolves_when_all_spent() {
        let mut tracker = SpentUtxoTracker::new();
        tracker.watch(&finalized_with(&[(0, "/0/0"), (1, "/0/1")]));

        assert_eq!(tracker.apply(&[spent("/0/0", 0)]), TrackerVerdict::Stale);
        assert_eq!(tracker.apply(&[spent("/0/1", 1)]), TrackerVerdict::Resolved);
        assert!(!tracker.is_active());
    }

    #[test]
    fn unrelated_node_history_is_stale_not_resolved() {
        let mut tracker = SpentUtxoTracker::new();
        tracker.watch(&finalized_with(&[(0, "/0/0")]));

        assert_eq!(tracker.apply(&[spent("/0/9", 0)]), TrackerVerdict::Stale);
        assert!(tracker.is_active());
        assert_eq!(tracker.pending_utxos().count(), 1);
    }

    #[test]
    fn spend_must_match_exact_outpoint() {
        let mut tracker = SpentUtxoTracker::new();
        tracker.watch(&finalized_with(&[(0, "/0/0")]));

        // Right node, wrong output index.
        assert_eq!(tracker.apply(&[spent("/0/0", 5)]), TrackerVerdict::Stale);

        // Right outpoint but not marked spent.
        let unspent = NodeHistory {
            node: WalletNode::new("/0/0"),
            txos: vec![TxoRef {
                outpoint: outpoint(0),
                spent: false,
            }],
        };
        assert_eq!(tracker.apply(&[unspent]), TrackerVerdict::Stale);
    }
}
