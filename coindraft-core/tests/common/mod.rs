//! Shared test support: a deterministic in-memory wallet backend.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::str::FromStr;

use bitcoin::{Amount, OutPoint, Txid};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coindraft_core::error::BuildError;
use coindraft_core::fee::{FeeRateTable, TARGET_BLOCKS_RANGE};
use coindraft_core::types::{ChangeOutput, DraftTransaction, Payment, WalletNode};
use coindraft_core::wallet::{BuildRequest, SelectorSpec, WalletBackend};

pub fn outpoint(n: u32) -> OutPoint {
    let txid = Txid::from_str("c0ffee1421a4732a250ee59ce08b2ae34b5de8d3242e266a81a3d09887b8ca2e")
        .unwrap();
    OutPoint::new(txid, n)
}

/// A fee table where every target carries the same rate.
pub fn flat_table(rate: Decimal) -> FeeRateTable {
    let rates: BTreeMap<u32, Decimal> = TARGET_BLOCKS_RANGE.iter().map(|t| (*t, rate)).collect();
    FeeRateTable::new(rates).unwrap()
}

/// A fee table with three rate brackets: fast (1-4 blocks) at 100,
/// medium (5-10) at 40, slow (25+) at 10 sat/vB.
pub fn bracket_table() -> FeeRateTable {
    let rates: BTreeMap<u32, Decimal> = TARGET_BLOCKS_RANGE
        .iter()
        .map(|t| {
            let rate = match *t {
                1..=4 => dec!(100.0),
                5 | 10 => dec!(40.0),
                _ => dec!(10.0),
            };
            (*t, rate)
        })
        .collect();
    FeeRateTable::new(rates).unwrap()
}

/// Deterministic wallet backend. Selection is greedy largest-first,
/// sizes follow a fixed P2WPKH-style model, and every build attempt is
/// counted so tests can assert which operations trigger rebuilds.
pub struct MockWallet {
    pub utxos: BTreeMap<OutPoint, (WalletNode, Amount)>,
    /// Shared so tests keep a handle after the engine takes ownership.
    pub builds: Rc<Cell<usize>>,
    pub fail_next: Rc<Cell<bool>>,
}

/// Wallet holding one UTXO per value, owned by nodes `/0/0`, `/0/1`, ...
pub fn wallet_with(values: &[u64]) -> MockWallet {
    let utxos = values
        .iter()
        .enumerate()
        .map(|(n, value)| {
            (
                outpoint(n as u32),
                (
                    WalletNode::new(format!("/0/{}", n)),
                    Amount::from_sat(*value),
                ),
            )
        })
        .collect();
    MockWallet {
        utxos,
        builds: Rc::new(Cell::new(0)),
        fail_next: Rc::new(Cell::new(false)),
    }
}

const TX_OVERHEAD_VBYTES: u64 = 11;
const INPUT_VBYTES: u64 = 68;
const OUTPUT_VBYTES: u64 = 31;

fn vsize_for(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD_VBYTES + INPUT_VBYTES * inputs as u64 + OUTPUT_VBYTES * outputs as u64
}

impl MockWallet {
    fn fee_for(&self, request: &BuildRequest<'_>, inputs: usize, outputs: usize) -> u64 {
        match request.explicit_fee {
            Some(fee) => fee.to_sat(),
            None => (request.fee_rate * Decimal::from(vsize_for(inputs, outputs)))
                .ceil()
                .to_u64()
                .unwrap_or(0),
        }
    }
}

impl WalletBackend for MockWallet {
    fn wallet_utxos(&self) -> BTreeMap<OutPoint, WalletNode> {
        self.utxos
            .iter()
            .map(|(op, (node, _))| (*op, node.clone()))
            .collect()
    }

    fn no_inputs_fee(&self, payments: &[Payment], fee_rate: Decimal) -> u64 {
        (fee_rate * Decimal::from(vsize_for(0, payments.len())))
            .ceil()
            .to_u64()
            .unwrap_or(0)
    }

    fn cost_of_change(&self, fee_rate: Decimal, _min_fee_rate: Decimal) -> u64 {
        (fee_rate * Decimal::from(OUTPUT_VBYTES))
            .ceil()
            .to_u64()
            .unwrap_or(0)
    }

    fn build_transaction(
        &self,
        request: &BuildRequest<'_>,
    ) -> Result<DraftTransaction, BuildError> {
        self.builds.set(self.builds.get() + 1);
        if self.fail_next.take() {
            return Err(BuildError::Unexpected("forced failure".into()));
        }
        for payment in request.payments {
            if payment.address.is_empty() || payment.address.starts_with("invalid") {
                return Err(BuildError::InvalidDestination(payment.address.clone()));
            }
        }

        // Universe after exclusion filters, largest value first.
        let mut universe: Vec<(OutPoint, WalletNode, Amount)> = self
            .utxos
            .iter()
            .filter(|(op, _)| !request.filters.iter().any(|f| f.is_excluded(op)))
            .map(|(op, (node, amount))| (*op, node.clone(), *amount))
            .collect();
        universe.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
        let available: u64 = universe.iter().map(|e| e.2.to_sat()).sum();

        let send_max = request.payments.iter().any(|p| p.send_max);
        let target: u64 = request
            .payments
            .iter()
            .filter(|p| !p.send_max)
            .map(|p| p.amount.to_sat())
            .sum();
        let outputs = request.payments.len();

        let selected: Vec<(OutPoint, WalletNode, Amount)> = 'selection: {
            for selector in &request.selectors {
                match selector {
                    SelectorSpec::Preset(set) => {
                        break 'selection universe
                            .iter()
                            .filter(|(op, _, _)| set.contains(op))
                            .cloned()
                            .collect();
                    }
                    SelectorSpec::MaxAvailable => break 'selection universe.clone(),
                    // Exact-match search is not modeled; fall through to
                    // the greedy strategy.
                    SelectorSpec::BranchAndBound { .. } => continue,
                    SelectorSpec::Knapsack { .. } => {
                        if send_max {
                            break 'selection universe.clone();
                        }
                        let mut acc: Vec<(OutPoint, WalletNode, Amount)> = Vec::new();
                        let mut total = 0u64;
                        for entry in &universe {
                            acc.push(entry.clone());
                            total += entry.2.to_sat();
                            let fee = self.fee_for(request, acc.len(), outputs + 1);
                            if total >= target + fee {
                                break 'selection acc;
                            }
                        }
                        let required =
                            target + self.fee_for(request, universe.len().max(1), outputs + 1);
                        return Err(BuildError::InsufficientFunds {
                            available: Amount::from_sat(available),
                            required: Amount::from_sat(required),
                        });
                    }
                }
            }
            return Err(BuildError::Unexpected(
                "no selector produced a selection".into(),
            ));
        };

        let total: u64 = selected.iter().map(|e| e.2.to_sat()).sum();
        let selected_utxos: BTreeMap<OutPoint, WalletNode> = selected
            .iter()
            .map(|(op, node, _)| (*op, node.clone()))
            .collect();
        let inputs = selected_utxos.len();

        let mut payments = request.payments.to_vec();
        let (fee, change, vsize) = if send_max {
            let fee = self.fee_for(request, inputs, outputs);
            if total <= target + fee {
                return Err(BuildError::InsufficientFunds {
                    available: Amount::from_sat(available),
                    required: Amount::from_sat(target + fee),
                });
            }
            let max_amount = total - target - fee;
            for payment in payments.iter_mut() {
                if payment.send_max {
                    payment.amount = Amount::from_sat(max_amount);
                }
            }
            (fee, None, vsize_for(inputs, outputs))
        } else {
            let fee_with_change = self.fee_for(request, inputs, outputs + 1);
            if total > target + fee_with_change {
                let change = ChangeOutput {
                    node: WalletNode::new("/1/0"),
                    amount: Amount::from_sat(total - target - fee_with_change),
                };
                (fee_with_change, Some(change), vsize_for(inputs, outputs + 1))
            } else {
                let fee = self.fee_for(request, inputs, outputs);
                if total < target + fee {
                    return Err(BuildError::InsufficientFunds {
                        available: Amount::from_sat(available),
                        required: Amount::from_sat(target + fee),
                    });
                }
                // Leftover too small for change is absorbed into the fee.
                (total - target, None, vsize_for(inputs, outputs))
            }
        };

        Ok(DraftTransaction {
            selected_utxos,
            payments,
            change,
            consolidation_nodes: vec![],
            fee: Amount::from_sat(fee),
            vsize,
        })
    }
}
