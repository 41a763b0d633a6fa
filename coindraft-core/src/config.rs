//! Configuration for the draft engine
//!
//! Settings are stored in TOML with a strongly-typed structure and
//! reasonable defaults. Nothing here is security-sensitive; the values
//! feed wallet-level build options and display preferences.

use std::fs;
use std::path::Path;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BitcoinUnit;
use crate::wallet::GroupingOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DraftConfig {
    #[serde(default)]
    pub wallet: WalletSettings,

    #[serde(default)]
    pub network: NetworkSettings,
}

/// Wallet-level behavior options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletSettings {
    /// Spend all UTXOs of an address together.
    #[serde(default = "default_true")]
    pub group_by_address: bool,

    /// Allow spending the wallet's own unconfirmed change.
    #[serde(default)]
    pub include_mempool_change: bool,

    /// Display denomination.
    #[serde(default)]
    pub unit: BitcoinUnit,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            group_by_address: default_true(),
            include_mempool_change: false,
            unit: BitcoinUnit::default(),
        }
    }
}

/// Network-derived limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSettings {
    /// Minimum relay fee rate in sat/vB; drafts below it cannot be
    /// finalized.
    #[serde(default = "default_min_relay_fee_rate")]
    pub min_relay_fee_rate: f64,

    /// Age in seconds after which a fee rate table counts as stale.
    #[serde(default = "default_fee_table_stale_secs")]
    pub fee_table_stale_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            min_relay_fee_rate: default_min_relay_fee_rate(),
            fee_table_stale_secs: default_fee_table_stale_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_min_relay_fee_rate() -> f64 {
    1.0
}

fn default_fee_table_stale_secs() -> u64 {
    600
}

impl DraftConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Builder options derived from the wallet settings.
    pub fn grouping(&self) -> GroupingOptions {
        GroupingOptions {
            group_by_address: self.wallet.group_by_address,
            include_mempool_change: self.wallet.include_mempool_change,
        }
    }

    /// Minimum relay fee rate as a decimal sat/vB value.
    pub fn min_relay_fee_rate(&self) -> Decimal {
        Decimal::from_f64(self.network.min_relay_fee_rate).unwrap_or_else(|| dec!(1.0))
    }
}
