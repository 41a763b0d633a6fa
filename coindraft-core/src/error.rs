//! Error taxonomy for the draft engine
//!
//! Errors are split by how the engine reacts to them:
//!
//! - [`BuildError`]: outcomes of a transaction build attempt. The two
//!   recognized kinds (`InsufficientFunds`, `InvalidDestination`) are
//!   expected while the user is editing and are absorbed into engine
//!   state flags rather than surfaced to the caller. Anything else is
//!   `Unexpected` and propagates.
//! - [`FeeError`]: fee policy contract violations and the transient
//!   "no fee table yet" condition.
//! - [`EngineError`]: contract errors on the engine surface itself,
//!   such as finalizing without a draft.

use bitcoin::Amount;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures reported by a [`WalletBackend`](crate::wallet::WalletBackend)
/// transaction build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The wallet cannot cover the requested payments plus fee.
    ///
    /// A frequently-hit state during editing; never fatal.
    #[error("insufficient funds: {required:?} required, {available:?} available")]
    InsufficientFunds {
        /// Total spendable value available to the selection.
        available: Amount,
        /// Value the selection would have needed.
        required: Amount,
    },

    /// A payment destination did not parse or validate.
    ///
    /// Transient while the user is mid-edit; absorbed silently.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Any other builder failure. The engine does not guess recovery
    /// for these; they propagate to the caller un-absorbed.
    #[error("transaction build failed: {0}")]
    Unexpected(String),
}

/// Fee policy errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FeeError {
    /// A target-block count outside the fixed supported set.
    #[error("target blocks {0} is not a supported confirmation target")]
    InvalidTargetBlocks(u32),

    /// No fee rate table has been received from the estimator yet.
    /// Callers substitute [`fallback_fee_rate`](crate::fee::fallback_fee_rate).
    #[error("no fee rate table available")]
    RateUnavailable,
}

/// Contract errors on the engine surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// `finalize()` was called with no current draft.
    #[error("no active draft to finalize")]
    NoActiveDraft,

    /// The draft's realized fee rate is below the minimum relay rate.
    /// Checked independently in `finalize()` even when the UI already
    /// warned about it.
    #[error("draft fee rate {rate} sat/vB is below the minimum relay rate {minimum} sat/vB")]
    FeeRateBelowMinimum { rate: Decimal, minimum: Decimal },

    /// Excluding a UTXO from a preset selection would leave the preset
    /// empty. The constraints are left untouched; callers should clear
    /// the selector instead of keeping a draft with zero allowed inputs.
    #[error("excluding this utxo would empty the preset selection")]
    EmptyPresetAfterExclusion,

    /// Fee policy contract violation.
    #[error(transparent)]
    Fee(#[from] FeeError),

    /// Unexpected failure from the transaction builder.
    #[error("transaction builder failure: {0}")]
    Builder(String),
}
