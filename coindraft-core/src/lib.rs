//! CoinDraft Core Library
//!
//! This crate provides the reactive transaction-draft engine for the
//! CoinDraft Bitcoin wallet: it keeps an in-progress spend (payments,
//! fee policy, coin-selection constraints) continuously reconciled with
//! a buildable draft transaction, and watches finalized drafts until
//! their inputs are confirmed spent.
//!
//! # Modules
//!
//! - `types`: Core domain types and data structures
//! - `error`: Error taxonomy for engine, fee and build failures
//! - `fee`: Fee rate tables and the fee policy
//! - `constraints`: Coin-selection constraints and exclusion rules
//! - `wallet`: Contracts the engine requires of wallet collaborators
//! - `engine`: The reactive draft engine itself
//! - `tracker`: Spent-UTXO watch for finalized drafts
//! - `events`: Wallet event bus and the engine-side router
//! - `config`: Configuration management
//! - `logging`: Logging setup

/// Core domain types for the draft engine
pub mod types;

/// Error taxonomy
pub mod error;

/// Fee rate tables and the fee policy
pub mod fee;

/// Coin-selection constraints
pub mod constraints;

/// Wallet collaborator contracts
pub mod wallet;

/// The reactive draft engine
pub mod engine;

/// Spent-UTXO watch for finalized drafts
pub mod tracker;

/// Wallet event bus and router
pub mod events;

/// Configuration management
pub mod config;

/// Logging setup
pub mod logging;

pub use config::DraftConfig;
pub use constraints::{ExcludeUtxoFilter, SelectionConstraints, Selector};
pub use engine::{DraftEngine, EngineSnapshot, EngineState};
pub use error::{BuildError, EngineError, FeeError};
pub use events::{EventRouter, WalletEvent, WalletEventBus};
pub use fee::{FeePolicy, FeeRateTable, DEFAULT_TARGET_BLOCKS, TARGET_BLOCKS_RANGE};
pub use tracker::{SpentUtxoTracker, TrackerVerdict};
pub use types::{
    BitcoinUnit, ChangeOutput, DraftTransaction, FinalizedDraft, NodeHistory, Payment, TxoRef,
    WalletNode,
};
pub use wallet::{
    BuildRequest, CoinSelector, GroupingOptions, SelectionFailure, SelectorSpec, WalletBackend,
};
