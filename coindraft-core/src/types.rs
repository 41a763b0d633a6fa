//! Core domain types for the draft engine
//!
//! These types describe the inputs the engine derives from (payments,
//! wallet nodes) and the artifacts it derives (draft and finalized
//! transactions). A [`DraftTransaction`] is immutable once produced and
//! is superseded wholesale by the next recompute, never patched in
//! place.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bitcoin::{Amount, OutPoint};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single payment output under composition.
///
/// Payments form an ordered sequence; insertion order is output order.
/// The list is mutated by UI input or external events and the engine
/// reads an immutable snapshot of it per recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    /// Destination address. Validation is external; an unparseable
    /// destination surfaces as a transient build failure.
    pub address: String,
    /// Amount in satoshis.
    pub amount: Amount,
    /// User-supplied label.
    pub label: String,
    /// Send the maximum available value to this destination.
    pub send_max: bool,
}

impl Payment {
    pub fn new(address: impl Into<String>, amount: Amount) -> Self {
        Self {
            address: address.into(),
            amount,
            label: String::new(),
            send_max: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            address: String::new(),
            amount: Amount::from_sat(0),
            label: String::new(),
            send_max: false,
        }
    }
}

/// Wallet-internal address-chain slot, identified by its derivation
/// suffix (e.g. `/1/42`). Owns zero or more transaction outputs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletNode(pub String);

impl WalletNode {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }
}

impl fmt::Display for WalletNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transaction output reference as reported by a wallet history
/// update, with its current spent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxoRef {
    pub outpoint: OutPoint,
    pub spent: bool,
}

/// History snapshot for one wallet node, carried by history-changed
/// events. Lists the transaction outputs the node currently owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHistory {
    pub node: WalletNode,
    pub txos: Vec<TxoRef>,
}

/// Change output of a draft: the wallet-internal node receiving the
/// leftover value, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOutput {
    pub node: WalletNode,
    pub amount: Amount,
}

/// A not-yet-finalized candidate transaction derived from the current
/// inputs. Produced only by the engine's recompute and fully replaced
/// each time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTransaction {
    /// Selected inputs mapped to their owning address-chain node.
    pub selected_utxos: BTreeMap<OutPoint, WalletNode>,
    /// Payment outputs, in payment-list order.
    pub payments: Vec<Payment>,
    /// Change output, when creating one was cheaper than over-paying
    /// fees.
    pub change: Option<ChangeOutput>,
    /// Additional nodes touched by a consolidate-small-utxos pass.
    pub consolidation_nodes: Vec<WalletNode>,
    /// Resulting fee in satoshis.
    pub fee: Amount,
    /// Virtual size of the built transaction in vbytes.
    pub vsize: u64,
}

impl DraftTransaction {
    /// Realized fee rate in sat/vB. The rate is read back from the
    /// built transaction rather than solved analytically, which is how
    /// the explicit-fee/weight circularity is resolved.
    pub fn fee_rate(&self) -> Decimal {
        if self.vsize == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.fee.to_sat()) / Decimal::from(self.vsize)
    }

    /// Total value of the selected inputs, as known to the given
    /// universe of wallet UTXOs.
    pub fn input_count(&self) -> usize {
        self.selected_utxos.len()
    }

    /// Every wallet node this draft touches: input-owning nodes, the
    /// change node, and any consolidation nodes.
    pub fn touched_nodes(&self) -> BTreeSet<WalletNode> {
        let mut nodes: BTreeSet<WalletNode> = self.selected_utxos.values().cloned().collect();
        if let Some(change) = &self.change {
            nodes.insert(change.node.clone());
        }
        nodes.extend(self.consolidation_nodes.iter().cloned());
        nodes
    }
}

/// A draft promoted by explicit user confirmation.
///
/// Captures the exact inputs the transaction consumes so their spend
/// can be watched for. At most one finalized draft is active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedDraft {
    pub draft: DraftTransaction,
    /// Nodes whose history updates are relevant to this draft.
    pub watched_nodes: BTreeSet<WalletNode>,
}

impl FinalizedDraft {
    pub fn new(draft: DraftTransaction) -> Self {
        let watched_nodes = draft.touched_nodes();
        Self {
            draft,
            watched_nodes,
        }
    }

    /// The exact UTXO set this draft consumes.
    pub fn consumed_utxos(&self) -> &BTreeMap<OutPoint, WalletNode> {
        &self.draft.selected_utxos
    }
}

/// Display denomination for amounts. Conversion itself is external;
/// the engine only carries the current choice through its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinUnit {
    Btc,
    Sats,
}

impl Default for BitcoinUnit {
    fn default() -> Self {
        BitcoinUnit::Btc
    }
}

impl fmt::Display for BitcoinUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitcoinUnit::Btc => write!(f, "BTC"),
            BitcoinUnit::Sats => write!(f, "sats"),
        }
    }
}
