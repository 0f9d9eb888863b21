// 7.0: undo records. apply returns one of these for every transaction and the
// engine stores it keyed by signature, so orphaning is a pure function of the
// record: every previous value an orphan needs was captured at apply time.
// a missing record at orphan time is an invariant violation, not caller error.

use crate::order::Trade;
use crate::types::{Address, AssetId, GroupId, Signature};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoRecord {
    /// The creator account was created by this apply.
    pub created_creator: bool,
    /// The creator's public key was learned by this apply.
    pub learned_key: bool,
    pub kind: UndoKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UndoKind {
    Genesis {
        /// Accounts created by the genesis grants, removed on orphan.
        created_accounts: Vec<Address>,
    },
    Payment {
        created_recipient: bool,
    },
    AssetIssue {
        asset_id: AssetId,
    },
    AssetUpdate {
        previous_owner: Address,
        previous_description: String,
    },
    OrderCreate {
        /// Trades caused by this order, in execution order. Orphaned in reverse.
        trades: Vec<TradeUndo>,
    },
    OrderCancel,
    NameRegister,
    NameUpdate {
        previous_owner: Address,
        previous_data: String,
    },
    GroupCreate {
        group_id: GroupId,
    },
    GroupJoin,
    SetDefaultGroup {
        previous: GroupId,
    },
    DataRecord,
}

/// Everything needed to reverse one trade: the trade itself plus both orders'
/// open/fulfilled flags as they were immediately before it executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUndo {
    pub trade: Trade,
    pub initiator_was_closed: bool,
    pub initiator_was_fulfilled: bool,
    pub target_was_closed: bool,
    pub target_was_fulfilled: bool,
}

/// Store access for undo records.
impl crate::store::Ledger {
    pub(crate) fn store_undo(&mut self, signature: Signature, record: UndoRecord) {
        self.state.undo_records.insert(signature, record);
    }

    pub(crate) fn take_undo(&mut self, signature: Signature) -> Option<UndoRecord> {
        self.state.undo_records.remove(&signature)
    }
}
