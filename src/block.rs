// 10.0: blocks. an ordered list of transactions under one signature; the
// sequence within the block is the authoritative total order for apply and for
// the strict-reverse orphan. forging and PoS weight selection happen elsewhere;
// the core only confirms and orphans what it is given.

use crate::transaction::Transaction;
use crate::types::{BlockHeight, Signature, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: BlockHeight,
    pub signature: Signature,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        height: BlockHeight,
        signature: Signature,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            height,
            signature,
            timestamp,
            transactions,
        }
    }
}
