//! Wallet event bus and the engine-side router
//!
//! External subsystems (estimator, chain watcher, UTXO views, settings)
//! publish [`WalletEvent`]s onto a [`WalletEventBus`]; the engine's
//! owner thread drains them through an [`EventRouter`]. Publication
//! never blocks on the engine and carries owned data, so publishers
//! share no locks with engine state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use bitcoin::OutPoint;

use crate::engine::DraftEngine;
use crate::error::EngineError;
use crate::fee::FeeRateTable;
use crate::types::{BitcoinUnit, NodeHistory};
use crate::wallet::WalletBackend;

/// External happenings the engine reacts to.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    /// A fresh estimator table arrived.
    FeeRatesUpdated(FeeRateTable),
    /// Wallet history changed for the listed nodes.
    HistoryChanged(Vec<NodeHistory>),
    /// The wallet's node set itself changed (e.g. a rescan or descriptor
    /// edit); all draft inputs are suspect.
    NodesChanged,
    /// A transaction entry label was edited.
    EntryLabelChanged,
    /// An external view asked to spend exactly these UTXOs.
    SpendRequested(Vec<OutPoint>),
    /// An external view asked to bar this UTXO from selection.
    ExcludeUtxo(OutPoint),
    /// Display denomination preference changed.
    UnitChanged(BitcoinUnit),
    /// A new chain tip was observed.
    BlockHeightChanged(u32),
}

/// An open subscription to the bus. Dropping it (or calling
/// [`WalletEventBus::unsubscribe`]) stops delivery.
pub struct Subscription {
    id: u64,
    receiver: Receiver<WalletEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Events published since the last drain, in publication order.
    pub fn pending(&self) -> impl Iterator<Item = WalletEvent> + '_ {
        self.receiver.try_iter()
    }
}

/// Multi-subscriber fan-out bus for wallet events.
///
/// Each subscriber gets its own queue; `publish` clones the event into
/// every live queue and silently drops subscribers whose receiving end
/// is gone.
#[derive(Default)]
pub struct WalletEventBus {
    subscribers: Mutex<HashMap<u64, Sender<WalletEvent>>>,
    next_id: AtomicU64,
}

impl WalletEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // The registry holds no invariant a panicked holder could break;
    // recover the guard rather than dropping registrations.
    fn registry(&self) -> MutexGuard<'_, HashMap<u64, Sender<WalletEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel();
        self.registry().insert(id, sender);
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.registry().remove(&id);
    }

    pub fn publish(&self, event: WalletEvent) {
        self.registry()
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.registry().len()
    }
}

/// Routes bus events into engine method calls on the engine's owner
/// thread.
pub struct EventRouter {
    subscription: Subscription,
}

impl EventRouter {
    pub fn new(bus: &WalletEventBus) -> Self {
        Self {
            subscription: bus.subscribe(),
        }
    }

    /// Apply all pending events to the engine, in publication order.
    ///
    /// A recoverable per-event error (an exclusion that would empty a
    /// preset) is logged and skipped; builder failures propagate.
    pub fn drain<W: WalletBackend>(&self, engine: &mut DraftEngine<W>) -> Result<(), EngineError> {
        let events: Vec<WalletEvent> = self.subscription.pending().collect();
        for event in events {
            match Self::route(engine, event) {
                Ok(()) => {}
                Err(EngineError::EmptyPresetAfterExclusion) => {
                    log::warn!("ignoring exclusion that would empty the preset selection");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Dispatch one event to the matching engine operation.
    pub fn route<W: WalletBackend>(
        engine: &mut DraftEngine<W>,
        event: WalletEvent,
    ) -> Result<(), EngineError> {
        match event {
            WalletEvent::FeeRatesUpdated(table) => {
                engine.set_fee_table(table);
                Ok(())
            }
            WalletEvent::HistoryChanged(changes) => engine.handle_history_changed(&changes),
            WalletEvent::NodesChanged => {
                engine.handle_nodes_changed();
                Ok(())
            }
            WalletEvent::EntryLabelChanged => engine.handle_label_changed(),
            WalletEvent::SpendRequested(utxos) => engine.spend_requested(utxos),
            WalletEvent::ExcludeUtxo(utxo) => engine.exclude_utxo(utxo),
            WalletEvent::UnitChanged(unit) => {
                engine.set_display_unit(unit);
                Ok(())
            }
            WalletEvent::BlockHeightChanged(height) => {
                engine.set_block_height(height);
                Ok(())
            }
        }
    }

    /// Cancel the subscription. Events published afterwards are no
    /// longer delivered to this router.
    pub fn detach(self, bus: &WalletEventBus) {
        bus.unsubscribe(self.subscription.id);
    }
}
