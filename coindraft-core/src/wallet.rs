//! Contracts the engine requires of its wallet collaborators
//!
//! Coin-selection algorithms and transaction building are external to
//! the engine; this module defines the narrow interface they are
//! consumed through. The engine composes [`SelectorSpec`]s in priority
//! order and hands them to the backend, which tries them with
//! first-success-wins semantics.

use std::collections::{BTreeMap, BTreeSet};

use bitcoin::{Amount, OutPoint};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::constraints::ExcludeUtxoFilter;
use crate::error::BuildError;
use crate::types::{DraftTransaction, Payment, WalletNode};

/// Wallet-level options forwarded to the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingOptions {
    /// Spend all UTXOs of an address together to avoid partial reuse.
    pub group_by_address: bool,
    /// Allow spending the wallet's own unconfirmed change.
    pub include_mempool_change: bool,
}

/// A selection strategy instruction for the builder, in the priority
/// order the engine composed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorSpec {
    /// Size-optimizing exact/near-exact match search. `cost_of_change`
    /// lets the strategy decide whether creating change is cheaper than
    /// over-paying fees.
    BranchAndBound {
        no_inputs_fee: u64,
        cost_of_change: u64,
    },
    /// Greedy largest-first fallback.
    Knapsack { no_inputs_fee: u64 },
    /// Use exactly this input set.
    Preset(BTreeSet<OutPoint>),
    /// Spend everything available.
    MaxAvailable,
}

/// Everything a single build attempt needs.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Strategies in priority order; first success wins.
    pub selectors: Vec<SelectorSpec>,
    /// Exclusion filters applied to the UTXO universe.
    pub filters: Vec<ExcludeUtxoFilter>,
    /// Payment outputs, in order.
    pub payments: &'a [Payment],
    /// Target fee rate (sat/vB).
    pub fee_rate: Decimal,
    /// Floor the realized rate must not fall below.
    pub min_fee_rate: Decimal,
    /// Explicit absolute fee when the user has overridden estimation.
    pub explicit_fee: Option<Amount>,
    /// Current chain height, for coinbase-maturity rules.
    pub block_height: Option<u32>,
    pub grouping: GroupingOptions,
}

/// The wallet-side collaborator the engine drives.
///
/// `build_transaction` is a bounded local computation, not an I/O
/// call; the engine invokes it synchronously on its owner thread.
pub trait WalletBackend {
    /// All spendable UTXOs mapped to their owning address-chain node.
    fn wallet_utxos(&self) -> BTreeMap<OutPoint, WalletNode>;

    /// Fee contribution of the transaction skeleton (no inputs) at the
    /// given rate: the "cost of an empty input set" handed to
    /// selection strategies.
    fn no_inputs_fee(&self, payments: &[Payment], fee_rate: Decimal) -> u64;

    /// Fee cost of adding a change output at the given rates.
    fn cost_of_change(&self, fee_rate: Decimal, min_fee_rate: Decimal) -> u64;

    /// Select inputs and assemble a draft for the request.
    fn build_transaction(&self, request: &BuildRequest<'_>)
        -> Result<DraftTransaction, BuildError>;
}

/// Failure of a single selection strategy. Strategies are composed
/// with fallback-on-failure semantics, so this only surfaces when
/// every strategy in the chain has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionFailure {
    #[error("insufficient funds: {required:?} required, {available:?} available")]
    InsufficientFunds { available: Amount, required: Amount },
}

/// Contract for a single coin-selection strategy.
///
/// `cost_of_empty_inputs` is the fee the transaction skeleton already
/// costs; `cost_of_change` is what adding a change output would cost,
/// so the strategy can trade change creation against fee over-payment.
pub trait CoinSelector {
    fn name(&self) -> &'static str;

    fn select(
        &self,
        universe: &BTreeMap<OutPoint, Amount>,
        target: Amount,
        fee_rate: Decimal,
        cost_of_empty_inputs: u64,
        cost_of_change: u64,
    ) -> Result<BTreeSet<OutPoint>, SelectionFailure>;
}
