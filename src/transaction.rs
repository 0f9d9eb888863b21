// 9.0: the transaction registry. a closed payload enum covers every kind the
// ledger accepts; dispatch is an exhaustive match, so an unhandled kind is a
// compile error rather than a runtime lookup failure.
//
// validation is pure: it reads the ledger, never mutates it, and returns a named
// reason the caller can surface verbatim. apply/orphan live in engine/apply.rs.

use crate::store::Ledger;
use crate::types::{
    Address, Amount, AssetId, GroupId, OrderId, Price, PublicKey, Signature, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Longest accepted asset, name and group name.
pub const MAX_NAME_LEN: usize = 400;
/// Longest accepted arbitrary-data payload, in bytes.
pub const MAX_DATA_LEN: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Sole identity of the transaction; unique and immutable once set.
    pub signature: Signature,
    /// Signature of the creator's previous transaction; None for the first.
    /// Forms the per-account undo/ordering chain and blocks replays.
    pub reference: Option<Signature>,
    pub creator: Address,
    pub creator_key: PublicKey,
    pub timestamp: Timestamp,
    /// Paid in the native asset; burned on apply, restored on orphan.
    pub fee: Amount,
    pub group_id: GroupId,
    pub payload: TxPayload,
    /// Set when confirmed in a block; None while unconfirmed.
    pub block_height: Option<crate::types::BlockHeight>,
}

// equality and hashing are defined solely by the signature
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

/// Kind tag, for logging and table queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Genesis,
    Payment,
    AssetIssue,
    AssetUpdate,
    OrderCreate,
    OrderCancel,
    NameRegister,
    NameUpdate,
    GroupCreate,
    GroupJoin,
    SetDefaultGroup,
    DataRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxPayload {
    /// Creates the native asset and the initial balances. Height-0 block only.
    Genesis { grants: Vec<(Address, Amount)> },
    /// Transfer of any asset, native payments included.
    Payment {
        recipient: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// Mints a new asset to the creator under the next sequential id.
    AssetIssue {
        name: String,
        description: String,
        quantity: Amount,
        divisible: bool,
    },
    /// Owner and/or description change by the current owner.
    AssetUpdate {
        asset: AssetId,
        new_owner: Address,
        new_description: String,
    },
    /// Places an exchange order; matching runs inside the same apply.
    OrderCreate {
        have: AssetId,
        want: AssetId,
        amount: Amount,
        price: Price,
    },
    /// Closes the creator's own open order. Settled trades stand.
    OrderCancel { order: OrderId },
    NameRegister { name: String, data: String },
    NameUpdate {
        name: String,
        new_owner: Address,
        new_data: String,
    },
    GroupCreate { name: String },
    GroupJoin { group: GroupId },
    SetDefaultGroup { group: GroupId },
    /// Arbitrary payload anchored on chain, keyed by the signature.
    DataRecord { data: Vec<u8> },
}

impl Transaction {
    pub fn kind(&self) -> TxKind {
        match &self.payload {
            TxPayload::Genesis { .. } => TxKind::Genesis,
            TxPayload::Payment { .. } => TxKind::Payment,
            TxPayload::AssetIssue { .. } => TxKind::AssetIssue,
            TxPayload::AssetUpdate { .. } => TxKind::AssetUpdate,
            TxPayload::OrderCreate { .. } => TxKind::OrderCreate,
            TxPayload::OrderCancel { .. } => TxKind::OrderCancel,
            TxPayload::NameRegister { .. } => TxKind::NameRegister,
            TxPayload::NameUpdate { .. } => TxKind::NameUpdate,
            TxPayload::GroupCreate { .. } => TxKind::GroupCreate,
            TxPayload::GroupJoin { .. } => TxKind::GroupJoin,
            TxPayload::SetDefaultGroup { .. } => TxKind::SetDefaultGroup,
            TxPayload::DataRecord { .. } => TxKind::DataRecord,
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.payload, TxPayload::Genesis { .. })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("reference does not match the creator's last transaction")]
    InvalidReference,

    #[error("transaction signature already confirmed")]
    DuplicateSignature,

    #[error("insufficient balance of {asset}")]
    InsufficientBalance { asset: AssetId },

    #[error("insufficient native balance to cover the fee")]
    InsufficientFee,

    #[error("unknown {0}")]
    UnknownAsset(AssetId),

    #[error("unknown name {0:?}")]
    UnknownName(String),

    #[error("unknown {0}")]
    UnknownGroup(GroupId),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("order is closed")]
    OrderClosed,

    #[error("not authorised")]
    NotAuthorized,

    #[error("asset name {0:?} already taken")]
    DuplicateAssetName(String),

    #[error("name {0:?} already registered")]
    DuplicateName(String),

    #[error("group name {0:?} already taken")]
    DuplicateGroupName(String),

    #[error("already a member of {0}")]
    AlreadyMember(GroupId),

    #[error("amount out of range")]
    AmountOutOfRange,

    #[error("indivisible asset amounts must be whole units")]
    IndivisibleAmount,

    #[error("an order must exchange two different assets")]
    SameAssetPair,

    #[error("genesis transaction outside the height-0 block")]
    GenesisOutOfPlace,
}

impl Transaction {
    /// Pure read-only check against current ledger state. Run at admission and
    /// again at confirmation (state may have moved in between).
    pub fn validate(&self, ledger: &Ledger) -> Result<(), ValidationError> {
        if ledger.state.transactions.contains_key(&self.signature) {
            return Err(ValidationError::DuplicateSignature);
        }

        if let TxPayload::Genesis { grants } = &self.payload {
            // height placement is the engine's call; here only shape
            if !ledger.state.blocks.is_empty() || ledger.asset_exists(AssetId::NATIVE) {
                return Err(ValidationError::GenesisOutOfPlace);
            }
            if grants.is_empty() {
                return Err(ValidationError::AmountOutOfRange);
            }
            return Ok(());
        }

        if ledger.last_reference(self.creator) != self.reference {
            return Err(ValidationError::InvalidReference);
        }

        match &self.payload {
            TxPayload::Genesis { .. } => unreachable!("handled above"),

            TxPayload::Payment {
                asset, amount, ..
            } => {
                let asset_row = ledger
                    .asset(*asset)
                    .ok_or(ValidationError::UnknownAsset(*asset))?;
                if amount.is_zero() {
                    return Err(ValidationError::AmountOutOfRange);
                }
                if !asset_row.divisible && !amount.is_whole() {
                    return Err(ValidationError::IndivisibleAmount);
                }
                self.check_spend(ledger, *asset, *amount)
            }

            TxPayload::AssetIssue {
                name,
                quantity,
                divisible,
                ..
            } => {
                if name.is_empty() || name.len() > MAX_NAME_LEN {
                    return Err(ValidationError::AmountOutOfRange);
                }
                if ledger.asset_by_name(name).is_some() {
                    return Err(ValidationError::DuplicateAssetName(name.clone()));
                }
                if quantity.is_zero() {
                    return Err(ValidationError::AmountOutOfRange);
                }
                if !divisible && !quantity.is_whole() {
                    return Err(ValidationError::IndivisibleAmount);
                }
                self.check_fee(ledger)
            }

            TxPayload::AssetUpdate { asset, .. } => {
                let asset_row = ledger
                    .asset(*asset)
                    .ok_or(ValidationError::UnknownAsset(*asset))?;
                // the native asset has no owner to speak for it
                if *asset == AssetId::NATIVE || asset_row.owner != self.creator {
                    return Err(ValidationError::NotAuthorized);
                }
                self.check_fee(ledger)
            }

            TxPayload::OrderCreate {
                have,
                want,
                amount,
                ..
            } => {
                if have == want {
                    return Err(ValidationError::SameAssetPair);
                }
                let have_row = ledger
                    .asset(*have)
                    .ok_or(ValidationError::UnknownAsset(*have))?;
                if !ledger.asset_exists(*want) {
                    return Err(ValidationError::UnknownAsset(*want));
                }
                if amount.is_zero() {
                    return Err(ValidationError::AmountOutOfRange);
                }
                if !have_row.divisible && !amount.is_whole() {
                    return Err(ValidationError::IndivisibleAmount);
                }
                self.check_spend(ledger, *have, *amount)
            }

            TxPayload::OrderCancel { order } => {
                let row = ledger
                    .order(*order)
                    .ok_or(ValidationError::OrderNotFound(*order))?;
                if row.creator != self.creator {
                    return Err(ValidationError::NotAuthorized);
                }
                if !row.is_open() {
                    return Err(ValidationError::OrderClosed);
                }
                self.check_fee(ledger)
            }

            TxPayload::NameRegister { name, .. } => {
                if name.is_empty() || name.len() > MAX_NAME_LEN {
                    return Err(ValidationError::AmountOutOfRange);
                }
                if ledger.name_record(name).is_some() {
                    return Err(ValidationError::DuplicateName(name.clone()));
                }
                self.check_fee(ledger)
            }

            TxPayload::NameUpdate { name, .. } => {
                let record = ledger
                    .name_record(name)
                    .ok_or_else(|| ValidationError::UnknownName(name.clone()))?;
                if record.owner != self.creator {
                    return Err(ValidationError::NotAuthorized);
                }
                self.check_fee(ledger)
            }

            TxPayload::GroupCreate { name } => {
                if name.is_empty() || name.len() > MAX_NAME_LEN {
                    return Err(ValidationError::AmountOutOfRange);
                }
                if ledger.group_by_name(name).is_some() {
                    return Err(ValidationError::DuplicateGroupName(name.clone()));
                }
                self.check_fee(ledger)
            }

            TxPayload::GroupJoin { group } => {
                if ledger.group(*group).is_none() {
                    return Err(ValidationError::UnknownGroup(*group));
                }
                if ledger.is_member(*group, self.creator) {
                    return Err(ValidationError::AlreadyMember(*group));
                }
                self.check_fee(ledger)
            }

            TxPayload::SetDefaultGroup { group } => {
                if *group != GroupId::NONE {
                    if ledger.group(*group).is_none() {
                        return Err(ValidationError::UnknownGroup(*group));
                    }
                    if !ledger.is_member(*group, self.creator) {
                        return Err(ValidationError::NotAuthorized);
                    }
                }
                self.check_fee(ledger)
            }

            TxPayload::DataRecord { data } => {
                if data.is_empty() || data.len() > MAX_DATA_LEN {
                    return Err(ValidationError::AmountOutOfRange);
                }
                self.check_fee(ledger)
            }
        }
    }

    /// Creator must cover `amount` of `asset` plus the fee; combined when the
    /// spend itself is native.
    fn check_spend(
        &self,
        ledger: &Ledger,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), ValidationError> {
        if asset == AssetId::NATIVE {
            let total = amount
                .checked_add(self.fee)
                .ok_or(ValidationError::AmountOutOfRange)?;
            if ledger.balance(self.creator, AssetId::NATIVE) < total {
                return Err(ValidationError::InsufficientBalance { asset });
            }
            Ok(())
        } else {
            if ledger.balance(self.creator, asset) < amount {
                return Err(ValidationError::InsufficientBalance { asset });
            }
            self.check_fee(ledger)
        }
    }

    fn check_fee(&self, ledger: &Ledger) -> Result<(), ValidationError> {
        if ledger.balance(self.creator, AssetId::NATIVE) < self.fee {
            return Err(ValidationError::InsufficientFee);
        }
        Ok(())
    }
}
