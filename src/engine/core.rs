// 11.1: engine state and the read surface exposed to collaborators (REST and
// P2P layers call in here). admission of unconfirmed transactions also lives
// here; block confirmation and orphaning are in blocks.rs.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::account::Account;
use crate::asset::Asset;
use crate::order::{Order, Trade};
use crate::registry::{Group, NameRecord};
use crate::store::{Ledger, LedgerState};
use crate::transaction::Transaction;
use crate::types::{Address, Amount, AssetId, BlockHeight, GroupId, OrderId, Signature};
use std::collections::HashMap;
use tracing::debug;

/// The apply/orphan engine. Owns one ledger-store connection and the
/// unconfirmed pool; each public operation is one synchronous unit of work.
#[derive(Debug)]
pub struct Engine {
    pub(super) ledger: Ledger,
    pub(super) unconfirmed: HashMap<Signature, Transaction>,
    pub(super) config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ledger: Ledger::new(),
            unconfirmed: HashMap::new(),
            config,
        }
    }

    // ---- read surface ----

    pub fn balance(&self, address: Address, asset: AssetId) -> Amount {
        self.ledger.balance(address, asset)
    }

    pub fn account(&self, address: Address) -> Option<&Account> {
        self.ledger.account(address)
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.ledger.asset(id)
    }

    pub fn asset_by_name(&self, name: &str) -> Option<&Asset> {
        self.ledger.asset_by_name(name)
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.ledger.order(id)
    }

    pub fn open_orders(&self, have: AssetId, want: AssetId) -> Vec<Order> {
        self.ledger.open_orders(have, want)
    }

    pub fn trades(&self, have: AssetId, want: AssetId) -> Vec<Trade> {
        self.ledger.trades_for(have, want)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.ledger.group(id)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.ledger.group_by_name(name)
    }

    pub fn is_member(&self, group: GroupId, address: Address) -> bool {
        self.ledger.is_member(group, address)
    }

    pub fn name_record(&self, name: &str) -> Option<&NameRecord> {
        self.ledger.name_record(name)
    }

    pub fn data_record(&self, signature: Signature) -> Option<&[u8]> {
        self.ledger.data_record(signature)
    }

    pub fn confirmed_transaction(&self, signature: Signature) -> Option<&Transaction> {
        self.ledger.state.transactions.get(&signature)
    }

    /// Height of the chain tip; None before genesis.
    pub fn height(&self) -> Option<BlockHeight> {
        self.ledger.state.blocks.last().map(|b| b.height)
    }

    pub fn block_count(&self) -> usize {
        self.ledger.state.blocks.len()
    }

    // ---- unconfirmed pool ----

    /// Admit a transaction to the unconfirmed pool. Validation only; nothing
    /// mutates on failure and the specific reason is surfaced to the caller.
    pub fn admit_unconfirmed(&mut self, tx: Transaction) -> Result<(), EngineError> {
        if self.unconfirmed.len() >= self.config.max_unconfirmed {
            return Err(EngineError::PoolFull);
        }
        if self.unconfirmed.contains_key(&tx.signature) {
            // same reason as a confirmed duplicate: replay
            return Err(crate::transaction::ValidationError::DuplicateSignature.into());
        }
        tx.validate(&self.ledger)?;

        debug!(signature = %tx.signature, kind = ?tx.kind(), "admitted unconfirmed transaction");
        self.unconfirmed.insert(tx.signature, tx);
        Ok(())
    }

    pub fn unconfirmed_count(&self) -> usize {
        self.unconfirmed.len()
    }

    pub fn is_unconfirmed(&self, signature: Signature) -> bool {
        self.unconfirmed.contains_key(&signature)
    }

    /// Pool contents in a deterministic order (timestamp, then signature).
    pub fn unconfirmed_transactions(&self) -> Vec<&Transaction> {
        let mut txs: Vec<&Transaction> = self.unconfirmed.values().collect();
        txs.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.signature.cmp(&b.signature))
        });
        txs
    }

    // ---- test and simulation hooks ----

    /// Make the next `n` store commits fail, exercising the conflict-retry path.
    pub fn inject_store_conflicts(&mut self, n: u32) {
        self.ledger.inject_conflicts(n);
    }

    /// Deep snapshot of all ledger tables, for state comparison in tests.
    pub fn snapshot(&self) -> LedgerState {
        self.ledger.snapshot()
    }

    /// Open savepoint count; zero whenever no unit of work is in flight.
    pub fn savepoint_depth_for_tests(&self) -> usize {
        self.ledger.savepoint_depth()
    }
}
