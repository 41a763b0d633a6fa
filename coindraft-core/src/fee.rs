//! Fee rate tables and the fee policy
//!
//! The policy resolves a target confirmation speed or an explicit user
//! fee into a concrete fee rate, and tracks whether the user has
//! overridden automatic estimation. Rates are fractional sat/vB values
//! carried as [`Decimal`].
//!
//! In explicit-fee mode the effective rate is circular (rate = amount /
//! weight, and weight is unknown until a draft exists), so the policy
//! deliberately returns no rate there; the engine reads the realized
//! rate back off the built draft instead.

use std::collections::BTreeMap;

use bitcoin::Amount;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::FeeError;

/// The fixed, ascending set of supported confirmation targets.
pub const TARGET_BLOCKS_RANGE: [u32; 10] = [1, 2, 3, 4, 5, 10, 25, 50, 100, 500];

/// Default confirmation target when nothing has been chosen yet.
pub const DEFAULT_TARGET_BLOCKS: u32 = 5;

/// Rate substituted when no estimator table is available (sat/vB).
pub fn fallback_fee_rate() -> Decimal {
    dec!(20.0)
}

/// Protocol dust-relay rate floor (sat/vB).
pub fn dust_relay_fee_rate() -> Decimal {
    dec!(3.0)
}

/// Whether `target` is a member of [`TARGET_BLOCKS_RANGE`].
pub fn is_supported_target(target: u32) -> bool {
    TARGET_BLOCKS_RANGE.contains(&target)
}

/// Estimator-supplied mapping from confirmation target to fee rate.
///
/// The key set is always exactly [`TARGET_BLOCKS_RANGE`]; a missing
/// table as a whole (not per-key) signals "unknown". Carries the time
/// it was received so consumers can treat old estimates as stale.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeRateTable {
    rates: BTreeMap<u32, Decimal>,
    updated_at: DateTime<Utc>,
}

impl FeeRateTable {
    /// Build a table, validating that the keys are exactly the fixed
    /// target set.
    pub fn new(rates: BTreeMap<u32, Decimal>) -> Result<Self, FeeError> {
        for target in TARGET_BLOCKS_RANGE {
            if !rates.contains_key(&target) {
                return Err(FeeError::InvalidTargetBlocks(target));
            }
        }
        if let Some(extra) = rates.keys().find(|k| !is_supported_target(**k)) {
            return Err(FeeError::InvalidTargetBlocks(*extra));
        }
        Ok(Self {
            rates,
            updated_at: Utc::now(),
        })
    }

    /// Rate for a confirmation target.
    pub fn rate_for(&self, target: u32) -> Result<Decimal, FeeError> {
        self.rates
            .get(&target)
            .copied()
            .ok_or(FeeError::InvalidTargetBlocks(target))
    }

    /// Minimum rate across all targets.
    pub fn minimum_rate(&self) -> Decimal {
        self.rates
            .values()
            .copied()
            .min()
            .unwrap_or_else(fallback_fee_rate)
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the table is older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        Utc::now() - self.updated_at > max_age
    }
}

/// Re-derive a confirmation-target display value from an observed fee
/// rate: walk the fixed target set from fastest to slowest and return
/// the first target whose table rate the observed rate exceeds, or the
/// slowest target when none qualifies.
///
/// When two targets carry equal rates the lowest target wins. This is
/// a display convenience used to re-sync the target-blocks control
/// after a user-set absolute fee; it is never used to pick fees.
pub fn infer_target_blocks(observed_rate: Decimal, table: Option<&FeeRateTable>) -> u32 {
    let mut slowest = TARGET_BLOCKS_RANGE[0];
    for target in TARGET_BLOCKS_RANGE {
        slowest = slowest.max(target);
        let candidate = table
            .and_then(|t| t.rate_for(target).ok())
            .unwrap_or_else(fallback_fee_rate);
        if observed_rate > candidate {
            return target;
        }
    }
    slowest
}

/// Resolves the fee input for a draft: either an automatic rate from a
/// confirmation target, or an explicit absolute fee set by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePolicy {
    user_override: bool,
    target_blocks: u32,
    explicit_fee: Option<Amount>,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            user_override: false,
            target_blocks: DEFAULT_TARGET_BLOCKS,
            explicit_fee: None,
        }
    }
}

impl FeePolicy {
    pub fn user_override(&self) -> bool {
        self.user_override
    }

    pub fn target_blocks(&self) -> u32 {
        self.target_blocks
    }

    pub fn explicit_fee(&self) -> Option<Amount> {
        self.explicit_fee
    }

    /// Select a confirmation target; drops any explicit fee override.
    pub fn set_target_blocks(&mut self, target: u32) -> Result<(), FeeError> {
        if !is_supported_target(target) {
            return Err(FeeError::InvalidTargetBlocks(target));
        }
        self.target_blocks = target;
        self.user_override = false;
        self.explicit_fee = None;
        Ok(())
    }

    /// Set an explicit absolute fee, overriding automatic estimation.
    ///
    /// `None` models a cleared fee entry while the user is mid-typing.
    /// A zero amount is accepted here; downstream validation flags it
    /// as an insufficient fee rather than rejecting the edit.
    pub fn set_explicit_fee(&mut self, amount: Option<Amount>) {
        self.user_override = true;
        self.explicit_fee = amount;
    }

    /// Whether an explicit fee is set and usable (non-zero).
    pub fn has_usable_explicit_fee(&self) -> bool {
        matches!(self.explicit_fee, Some(a) if a.to_sat() > 0)
    }

    /// The effective fee rate for the current policy.
    ///
    /// `Ok(None)` in explicit-fee mode: the rate is resolved
    /// transaction-side once a draft exists. `Err(RateUnavailable)`
    /// when no table has been received; callers substitute
    /// [`fallback_fee_rate`].
    pub fn effective_fee_rate(
        &self,
        table: Option<&FeeRateTable>,
    ) -> Result<Option<Decimal>, FeeError> {
        if self.user_override && self.explicit_fee.is_some() {
            return Ok(None);
        }
        let table = table.ok_or(FeeError::RateUnavailable)?;
        Ok(Some(table.rate_for(self.target_blocks)?))
    }

    /// Minimum rate the selection may fall to: the smallest table rate
    /// (or the fallback constant), floored at the dust-relay rate.
    pub fn minimum_acceptable_rate(&self, table: Option<&FeeRateTable>) -> Decimal {
        let min = table
            .map(FeeRateTable::minimum_rate)
            .unwrap_or_else(fallback_fee_rate);
        min.max(dust_relay_fee_rate())
    }
}
