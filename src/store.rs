// 2.0: the ledger store. every table the core persists lives in LedgerState, and
// Ledger wraps it with the transactional contract the engine relies on: strictly
// nested savepoints, at-most-once commit, discard of a whole unit of work.
//
// the relational engine itself is an external collaborator; these typed maps stand
// in for its keyed rows (insert-or-overwrite upsert semantics). serialization
// conflicts from a concurrent store are simulated through a test fuse, in the same
// spirit as the mocked external modules elsewhere in this crate's lineage.

use crate::account::Account;
use crate::asset::Asset;
use crate::block::Block;
use crate::order::{Order, Trade};
use crate::registry::{Group, GroupMember, NameRecord};
use crate::transaction::Transaction;
use crate::types::{Address, Amount, AssetId, GroupId, OrderId, Signature};
use crate::undo::UndoRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every persisted table. Cloneable so savepoints are cheap to reason about:
/// a savepoint is a full snapshot, rollback is a swap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) balances: HashMap<(Address, AssetId), Amount>,
    pub(crate) assets: HashMap<AssetId, Asset>,
    pub(crate) asset_names: HashMap<String, AssetId>,
    pub(crate) next_asset_id: u64,
    pub(crate) orders: HashMap<OrderId, Order>,
    pub(crate) trades: Vec<Trade>,
    pub(crate) names: HashMap<String, NameRecord>,
    pub(crate) groups: HashMap<GroupId, Group>,
    pub(crate) group_names: HashMap<String, GroupId>,
    pub(crate) next_group_id: u64,
    pub(crate) members: HashMap<(GroupId, Address), GroupMember>,
    pub(crate) data_records: HashMap<Signature, Vec<u8>>,
    pub(crate) transactions: HashMap<Signature, Transaction>,
    pub(crate) undo_records: HashMap<Signature, UndoRecord>,
    pub(crate) blocks: Vec<Block>,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            next_group_id: 1, // 0 is GroupId::NONE
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Serialization failure under SERIALIZABLE isolation. Recoverable: roll back
    /// to the last savepoint and retry the whole unit of work.
    #[error("store serialization conflict, retry the unit of work")]
    Conflict,

    /// Savepoint stack discipline was broken. Only the most recently opened
    /// savepoint may be released or rolled back.
    #[error("no open savepoint")]
    SavepointUnderflow,
}

/// Transactional wrapper over the state tables.
#[derive(Debug)]
pub struct Ledger {
    pub(crate) state: LedgerState,
    savepoints: Vec<LedgerState>,
    conflict_fuse: u32,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            state: LedgerState::new(),
            savepoints: Vec::new(),
            conflict_fuse: 0,
        }
    }

    /// Open a nested savepoint. Mutations after this point can be undone with
    /// `rollback_savepoint` without touching earlier work.
    pub fn begin_savepoint(&mut self) {
        self.savepoints.push(self.state.clone());
    }

    /// Undo everything since the most recent savepoint and close it.
    pub fn rollback_savepoint(&mut self) -> Result<(), StoreError> {
        let snapshot = self.savepoints.pop().ok_or(StoreError::SavepointUnderflow)?;
        self.state = snapshot;
        Ok(())
    }

    /// Close the most recent savepoint, keeping its mutations.
    pub fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.savepoints.pop().ok_or(StoreError::SavepointUnderflow)?;
        Ok(())
    }

    pub fn savepoint_depth(&self) -> usize {
        self.savepoints.len()
    }

    /// Publish the unit of work. At most once: a conflict means nothing was
    /// published and the caller must roll back and retry from scratch.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        if self.conflict_fuse > 0 {
            self.conflict_fuse -= 1;
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    /// Abandon the whole unit of work: roll back through every open savepoint.
    /// No partial state remains visible.
    pub fn discard(&mut self) {
        if let Some(base) = self.savepoints.first().cloned() {
            self.state = base;
            self.savepoints.clear();
        }
    }

    /// Make the next `n` commits fail with `StoreError::Conflict`. Stand-in for
    /// serialization failures from a concurrent store connection.
    pub fn inject_conflicts(&mut self, n: u32) {
        self.conflict_fuse = n;
    }

    /// Deep snapshot of the current tables, for state comparison in tests.
    pub fn snapshot(&self) -> LedgerState {
        self.state.clone()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
