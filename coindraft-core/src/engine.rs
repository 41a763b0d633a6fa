//! The reactive draft engine
//!
//! Owns every mutable input of a transaction draft (payments, fee
//! policy, selection constraints) and the derived artifacts (the
//! current draft, the finalized draft and its spend watch). All
//! mutation happens through engine methods on a single owner thread;
//! each mutating operation triggers one recompute and one state-changed
//! notification, with recomputes requested mid-recompute coalesced into
//! a single trailing run.

use std::collections::BTreeSet;

use bitcoin::{Amount, OutPoint};
use rust_decimal::Decimal;

use crate::config::DraftConfig;
use crate::constraints::{SelectionConstraints, Selector};
use crate::error::{BuildError, EngineError, FeeError};
use crate::fee::{fallback_fee_rate, infer_target_blocks, FeePolicy, FeeRateTable};
use crate::tracker::{SpentUtxoTracker, TrackerVerdict};
use crate::types::{BitcoinUnit, DraftTransaction, FinalizedDraft, NodeHistory, Payment};
use crate::wallet::{BuildRequest, SelectorSpec, WalletBackend};

/// Where the engine currently stands in the draft lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No meaningful input yet.
    Empty,
    /// Some input entered, but no payment is complete enough to build.
    Drafting,
    /// A draft exists and reflects the current inputs.
    Valid,
    /// The wallet cannot cover the requested payments plus fee.
    InsufficientFunds,
    /// The last build failed on its inputs (e.g. an unparseable
    /// destination mid-edit).
    Invalid,
    /// The current draft was confirmed by the user and its inputs are
    /// being watched for spend confirmation.
    Finalized,
}

/// Immutable view of the engine handed to state-changed listeners.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub draft: Option<DraftTransaction>,
    pub state: EngineState,
    /// The wallet could not fund the last build attempt.
    pub insufficient_inputs: bool,
    /// An explicit fee override is set but zero.
    pub insufficient_fee: bool,
    /// The current draft's realized rate is below the minimum relay
    /// rate; it will be refused at finalize.
    pub below_min_relay: bool,
    /// Rate to display: the draft's realized rate when one exists,
    /// otherwise the policy's estimated rate.
    pub effective_fee_rate: Option<Decimal>,
    /// The estimator table is older than the configured staleness
    /// window (or absent entirely).
    pub fee_estimate_stale: bool,
    /// Confirmation target to display on the fee control.
    pub target_blocks_display: u32,
    /// Summary of any selection constraint in force.
    pub selection_summary: Option<String>,
    /// Display denomination.
    pub unit: BitcoinUnit,
}

type Listener = Box<dyn Fn(&EngineSnapshot)>;

/// The draft engine. Generic over the wallet backend so tests can drive
/// it with a deterministic in-memory wallet.
pub struct DraftEngine<W: WalletBackend> {
    wallet: W,
    config: DraftConfig,

    payments: Vec<Payment>,
    fee_policy: FeePolicy,
    constraints: SelectionConstraints,

    fee_table: Option<FeeRateTable>,
    block_height: Option<u32>,

    draft: Option<DraftTransaction>,
    finalized: Option<FinalizedDraft>,
    tracker: SpentUtxoTracker,

    insufficient_inputs: bool,
    target_blocks_display: u32,
    unit: BitcoinUnit,
    state: EngineState,

    in_recompute: bool,
    pending_recompute: bool,
    listeners: Vec<Listener>,
}

impl<W: WalletBackend> DraftEngine<W> {
    pub fn new(wallet: W, config: DraftConfig) -> Self {
        let unit = config.wallet.unit;
        Self {
            wallet,
            config,
            payments: vec![Payment::default()],
            fee_policy: FeePolicy::default(),
            constraints: SelectionConstraints::default(),
            fee_table: None,
            block_height: None,
            draft: None,
            finalized: None,
            tracker: SpentUtxoTracker::new(),
            insufficient_inputs: false,
            target_blocks_display: crate::fee::DEFAULT_TARGET_BLOCKS,
            unit,
            state: EngineState::Empty,
            in_recompute: false,
            pending_recompute: false,
            listeners: Vec::new(),
        }
    }

    /// Register a state-changed listener. Called once per settled
    /// recompute with the post-recompute snapshot.
    pub fn subscribe(&mut self, listener: impl Fn(&EngineSnapshot) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let effective_fee_rate = match &self.draft {
            Some(draft) => Some(draft.fee_rate()),
            None => match self.fee_policy.effective_fee_rate(self.fee_table.as_ref()) {
                Ok(rate) => rate,
                Err(_) => Some(fallback_fee_rate()),
            },
        };
        let below_min_relay = self
            .draft
            .as_ref()
            .map(|draft| draft.fee_rate() < self.config.min_relay_fee_rate())
            .unwrap_or(false);
        let stale_after = chrono::Duration::seconds(
            i64::try_from(self.config.network.fee_table_stale_secs).unwrap_or(i64::MAX),
        );
        let fee_estimate_stale = self
            .fee_table
            .as_ref()
            .map(|table| table.is_stale(stale_after))
            .unwrap_or(true);
        let summary = self.constraints.summary();
        EngineSnapshot {
            draft: self.draft.clone(),
            state: self.state,
            insufficient_inputs: self.insufficient_inputs,
            insufficient_fee: self.fee_policy.user_override()
                && matches!(self.fee_policy.explicit_fee(), Some(a) if a.to_sat() == 0),
            below_min_relay,
            effective_fee_rate,
            fee_estimate_stale,
            target_blocks_display: self.target_blocks_display,
            selection_summary: if summary.is_empty() {
                None
            } else {
                Some(summary)
            },
            unit: self.unit,
        }
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn finalized(&self) -> Option<&FinalizedDraft> {
        self.finalized.as_ref()
    }

    pub fn block_height(&self) -> Option<u32> {
        self.block_height
    }

    /// Replace the payment list. An empty list collapses to a single
    /// blank payment so there is always a row under composition.
    pub fn set_payments(&mut self, payments: Vec<Payment>) -> Result<(), EngineError> {
        self.payments = if payments.is_empty() {
            vec![Payment::default()]
        } else {
            payments
        };
        self.recompute()
    }

    pub fn add_payment(&mut self, payment: Payment) -> Result<(), EngineError> {
        self.payments.push(payment);
        self.recompute()
    }

    pub fn remove_payment(&mut self, index: usize) -> Result<(), EngineError> {
        if index < self.payments.len() {
            self.payments.remove(index);
        }
        if self.payments.is_empty() {
            self.payments.push(Payment::default());
        }
        self.recompute()
    }

    /// Choose a confirmation target. Clears any explicit fee override.
    pub fn set_target_blocks(&mut self, target: u32) -> Result<(), EngineError> {
        self.fee_policy.set_target_blocks(target)?;
        self.target_blocks_display = target;
        self.recompute()
    }

    /// Set or clear an explicit absolute fee, overriding estimation.
    pub fn set_explicit_fee(&mut self, amount: Option<Amount>) -> Result<(), EngineError> {
        self.fee_policy.set_explicit_fee(amount);
        self.recompute()
    }

    /// Store a fresh estimator table. Refreshes the displayed rate but
    /// deliberately does not rebuild the draft; a new table must not
    /// silently change a transaction the user is looking at.
    pub fn set_fee_table(&mut self, table: FeeRateTable) {
        log::debug!("fee rate table updated at {}", table.updated_at());
        self.fee_table = Some(table);
        self.notify();
    }

    /// Record a new chain tip. Used by subsequent builds for
    /// coinbase-maturity rules; does not touch the current draft.
    pub fn set_block_height(&mut self, height: u32) {
        self.block_height = Some(height);
    }

    pub fn set_display_unit(&mut self, unit: BitcoinUnit) {
        self.unit = unit;
        self.notify();
    }

    /// Bar a UTXO from selection, per the constraint merge rules.
    pub fn exclude_utxo(&mut self, utxo: OutPoint) -> Result<(), EngineError> {
        let wallet_utxos = self.wallet.wallet_utxos();
        self.constraints.exclude_utxo(utxo, &wallet_utxos)?;
        self.recompute()
    }

    /// Spend exactly the given UTXOs. With a single payment under
    /// composition it becomes a sweep of the whole selection, so the
    /// request alone yields a complete draft.
    pub fn spend_requested(&mut self, utxos: Vec<OutPoint>) -> Result<(), EngineError> {
        let preset: BTreeSet<OutPoint> = utxos.into_iter().collect();
        self.constraints.set_preset(preset);
        if self.payments.len() == 1 {
            self.payments[0].send_max = true;
        }
        self.recompute()
    }

    /// React to a wallet history update.
    ///
    /// Only meaningful once a draft is finalized: a resolved watch
    /// (every consumed UTXO confirmed spent) resets the engine for the
    /// next transaction, anything else recomputes in case the current
    /// draft went stale.
    pub fn handle_history_changed(&mut self, changes: &[NodeHistory]) -> Result<(), EngineError> {
        match self.tracker.apply(changes) {
            TrackerVerdict::Inactive => Ok(()),
            TrackerVerdict::Resolved => {
                log::info!("finalized transaction confirmed spent, resetting draft");
                self.clear();
                Ok(())
            }
            TrackerVerdict::Stale => self.recompute(),
        }
    }

    /// The wallet's node set changed out from under us; every draft
    /// input is suspect, so start over.
    pub fn handle_nodes_changed(&mut self) {
        self.clear();
    }

    /// A transaction label changed; rebuild so the draft carries the
    /// current labels.
    pub fn handle_label_changed(&mut self) -> Result<(), EngineError> {
        self.recompute()
    }

    /// Promote the current draft. Verifies the realized fee rate
    /// against the minimum relay rate, arms the spend watch, and
    /// returns the finalized draft.
    pub fn finalize(&mut self) -> Result<FinalizedDraft, EngineError> {
        let draft = self.draft.clone().ok_or(EngineError::NoActiveDraft)?;
        let minimum = self.config.min_relay_fee_rate();
        let rate = draft.fee_rate();
        if rate < minimum {
            return Err(EngineError::FeeRateBelowMinimum { rate, minimum });
        }

        let finalized = FinalizedDraft::new(draft);
        self.tracker.watch(&finalized);
        self.finalized = Some(finalized.clone());
        self.state = EngineState::Finalized;
        log::info!(
            "draft finalized: {} inputs, fee {} sats",
            finalized.draft.input_count(),
            finalized.draft.fee.to_sat()
        );
        self.notify();
        Ok(finalized)
    }

    /// Reset to the initial state: one blank payment, default fee
    /// policy, no constraints, no draft, watch disarmed. The fee table,
    /// chain height and display unit survive; they describe the world,
    /// not the draft. Idempotent.
    pub fn clear(&mut self) {
        self.payments = vec![Payment::default()];
        self.fee_policy = FeePolicy::default();
        self.constraints = SelectionConstraints::default();
        self.draft = None;
        self.finalized = None;
        self.tracker.clear();
        self.insufficient_inputs = false;
        self.target_blocks_display = crate::fee::DEFAULT_TARGET_BLOCKS;
        self.state = EngineState::Empty;
        self.notify();
    }

    /// Run one settled recompute: requests arriving while a recompute
    /// is in flight coalesce into a single trailing run, and listeners
    /// hear exactly one notification for the whole batch.
    fn recompute(&mut self) -> Result<(), EngineError> {
        if self.in_recompute {
            self.pending_recompute = true;
            return Ok(());
        }
        self.in_recompute = true;
        let mut result = self.recompute_once();
        while self.pending_recompute {
            self.pending_recompute = false;
            result = self.recompute_once();
        }
        self.in_recompute = false;
        // A finalized draft owns the lifecycle state until its watch
        // resolves or the engine is cleared; recomputes refresh the
        // draft underneath it without leaving Finalized.
        if self.finalized.is_some() {
            self.state = EngineState::Finalized;
        }
        self.notify();
        result
    }

    fn recompute_once(&mut self) -> Result<(), EngineError> {
        // An explicit override with no usable fee amount means the user
        // is mid-edit on the fee field; hold the draft back rather than
        // building one with a fee they did not enter.
        if self.fee_policy.user_override() && !self.fee_policy.has_usable_explicit_fee() {
            self.draft = None;
            self.state = EngineState::Empty;
            return Ok(());
        }

        let actionable = self
            .payments
            .iter()
            .any(|p| !p.address.is_empty() && (p.amount.to_sat() > 0 || p.send_max));
        if !actionable {
            self.draft = None;
            let any_content = self.payments.iter().any(|p| {
                !p.address.is_empty() || p.amount.to_sat() > 0 || !p.label.is_empty()
            });
            self.state = if any_content {
                EngineState::Drafting
            } else {
                EngineState::Empty
            };
            return Ok(());
        }

        let table = self.fee_table.as_ref();
        let rate = match self.fee_policy.effective_fee_rate(table) {
            Ok(rate) => rate,
            Err(FeeError::RateUnavailable) => Some(fallback_fee_rate()),
            Err(err) => return Err(err.into()),
        };
        let min_fee_rate = self.fee_policy.minimum_acceptable_rate(table);
        let fee_rate = rate.unwrap_or(min_fee_rate);
        let explicit_fee = if self.fee_policy.user_override() {
            self.fee_policy.explicit_fee()
        } else {
            None
        };

        let selectors = match &self.constraints.selector {
            Selector::Preset(preset) => vec![SelectorSpec::Preset(preset.clone())],
            Selector::MaxAvailable => vec![SelectorSpec::MaxAvailable],
            Selector::Automatic => {
                let no_inputs_fee = self.wallet.no_inputs_fee(&self.payments, fee_rate);
                let cost_of_change = self.wallet.cost_of_change(fee_rate, min_fee_rate);
                vec![
                    SelectorSpec::BranchAndBound {
                        no_inputs_fee,
                        cost_of_change,
                    },
                    SelectorSpec::Knapsack { no_inputs_fee },
                ]
            }
        };

        let result = {
            let request = BuildRequest {
                selectors,
                filters: self.constraints.filters(),
                payments: &self.payments,
                fee_rate,
                min_fee_rate,
                explicit_fee,
                block_height: self.block_height,
                grouping: self.config.grouping(),
            };
            self.wallet.build_transaction(&request)
        };

        match result {
            Ok(draft) => {
                if self.fee_policy.user_override() {
                    // Re-sync the confirmation-target control with the
                    // rate the explicit fee actually buys.
                    self.target_blocks_display =
                        infer_target_blocks(draft.fee_rate(), self.fee_table.as_ref());
                }
                log::debug!(
                    "draft rebuilt: {} inputs, fee {} sats, {} sat/vB",
                    draft.input_count(),
                    draft.fee.to_sat(),
                    draft.fee_rate()
                );
                self.draft = Some(draft);
                self.insufficient_inputs = false;
                self.state = EngineState::Valid;
                Ok(())
            }
            Err(BuildError::InsufficientFunds {
                available,
                required,
            }) => {
                log::debug!(
                    "insufficient funds: {} required, {} available",
                    required,
                    available
                );
                self.draft = None;
                self.insufficient_inputs = true;
                self.state = EngineState::InsufficientFunds;
                Ok(())
            }
            Err(BuildError::InvalidDestination(_)) => {
                self.draft = None;
                self.insufficient_inputs = false;
                self.state = EngineState::Invalid;
                Ok(())
            }
            Err(BuildError::Unexpected(message)) => {
                log::warn!("transaction build failed: {}", message);
                self.draft = None;
                self.state = EngineState::Invalid;
                Err(EngineError::Builder(message))
            }
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        for listener in &self.listeners {
            listener(&snapshot);
        }
    }
}
