// 11.0.2: error types for engine operations, split along the recovery taxonomy:
// validation failures are recoverable and surfaced verbatim; store conflicts are
// retried; invariant violations abort the unit of work outright.

use crate::account::AccountError;
use crate::store::StoreError;
use crate::transaction::ValidationError;
use crate::types::{BlockHeight, Signature};

/// An apply or orphan routine found it cannot proceed without leaving partial
/// state. Fatal to the enclosing unit of work; indicates a defect, not caller
/// error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvariantViolation {
    #[error("no undo record for applied transaction {0}")]
    MissingUndo(Signature),

    #[error("undo record for {0} does not match its transaction kind")]
    UndoMismatch(Signature),

    #[error("balance inconsistency during apply/orphan: {0}")]
    Balance(#[from] AccountError),

    #[error("order {0} missing during orphan")]
    MissingOrder(crate::types::OrderId),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("unconfirmed pool is full")]
    PoolFull,

    #[error("block height {found} does not follow chain tip {expected}")]
    UnexpectedHeight {
        expected: BlockHeight,
        found: BlockHeight,
    },

    #[error("block {0} is not the chain tip")]
    NotChainTip(Signature),

    #[error("store unavailable after {attempts} conflict retries")]
    RepositoryUnavailable { attempts: u32 },
}
