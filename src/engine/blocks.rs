// 11.3: block confirmation and orphaning. each is one unit of work: an outer
// savepoint around the whole block, a nested savepoint per transaction, commit
// with bounded retry on store conflicts. a failed transaction rejects the whole
// block; orphaning walks strict reverse apply order.

use super::apply::{apply_transaction, orphan_transaction};
use super::core::Engine;
use super::results::EngineError;
use crate::block::Block;
use crate::store::StoreError;
use crate::transaction::ValidationError;
use crate::types::BlockHeight;
use tracing::{info, warn};

impl Engine {
    /// Confirm a block on top of the current tip. Every transaction is
    /// re-validated against current state (it may have moved since admission);
    /// any failure rolls the whole block back. On success the included
    /// transactions leave the unconfirmed pool.
    pub fn apply_block(&mut self, block: &Block) -> Result<(), EngineError> {
        let expected = self
            .height()
            .map(|h| h.next())
            .unwrap_or(BlockHeight(0));
        if block.height != expected {
            return Err(EngineError::UnexpectedHeight {
                expected,
                found: block.height,
            });
        }

        let mut attempts = 0;
        loop {
            self.ledger.begin_savepoint();
            match self.apply_block_transactions(block) {
                Ok(()) => match self.ledger.commit() {
                    Ok(()) => {
                        self.ledger.release_savepoint()?;
                        for tx in &block.transactions {
                            self.unconfirmed.remove(&tx.signature);
                        }
                        info!(
                            height = %block.height,
                            transactions = block.transactions.len(),
                            "applied block"
                        );
                        return Ok(());
                    }
                    Err(StoreError::Conflict) => {
                        self.ledger.rollback_savepoint()?;
                        attempts += 1;
                        warn!(height = %block.height, attempts, "store conflict applying block, retrying");
                        if attempts > self.config.max_commit_retries {
                            return Err(EngineError::RepositoryUnavailable { attempts });
                        }
                    }
                    Err(other) => {
                        self.ledger.rollback_savepoint()?;
                        return Err(other.into());
                    }
                },
                Err(err) => {
                    self.ledger.rollback_savepoint()?;
                    warn!(height = %block.height, error = %err, "rejected block");
                    return Err(err);
                }
            }
        }
    }

    fn apply_block_transactions(&mut self, block: &Block) -> Result<(), EngineError> {
        for tx in &block.transactions {
            if tx.is_genesis() && block.height != BlockHeight(0) {
                return Err(ValidationError::GenesisOutOfPlace.into());
            }

            // speculative apply under its own savepoint: earlier transactions in
            // the block survive a failed candidate until the outer rollback
            self.ledger.begin_savepoint();
            let result = tx
                .validate(&self.ledger)
                .map_err(EngineError::from)
                .and_then(|()| apply_transaction(&mut self.ledger, tx, block.height));
            match result {
                Ok(()) => self.ledger.release_savepoint()?,
                Err(err) => {
                    self.ledger.rollback_savepoint()?;
                    return Err(err);
                }
            }
        }
        self.ledger.state.blocks.push(block.clone());
        Ok(())
    }

    /// Orphan the chain tip during a reorganisation. Transactions are reversed
    /// last-applied first, then the block record itself; the orphaned
    /// transactions return to the unconfirmed pool.
    pub fn orphan_block(&mut self, block: &Block) -> Result<(), EngineError> {
        match self.ledger.state.blocks.last() {
            Some(tip) if tip.signature == block.signature => {}
            _ => return Err(EngineError::NotChainTip(block.signature)),
        }

        let mut attempts = 0;
        loop {
            self.ledger.begin_savepoint();
            match self.orphan_block_transactions(block) {
                Ok(()) => match self.ledger.commit() {
                    Ok(()) => {
                        self.ledger.release_savepoint()?;
                        for tx in &block.transactions {
                            if !tx.is_genesis() {
                                self.unconfirmed.insert(tx.signature, tx.clone());
                            }
                        }
                        info!(
                            height = %block.height,
                            transactions = block.transactions.len(),
                            "orphaned block"
                        );
                        return Ok(());
                    }
                    Err(StoreError::Conflict) => {
                        self.ledger.rollback_savepoint()?;
                        attempts += 1;
                        warn!(height = %block.height, attempts, "store conflict orphaning block, retrying");
                        if attempts > self.config.max_commit_retries {
                            return Err(EngineError::RepositoryUnavailable { attempts });
                        }
                    }
                    Err(other) => {
                        self.ledger.rollback_savepoint()?;
                        return Err(other.into());
                    }
                },
                Err(err) => {
                    // an orphan failure is an invariant violation: abandon the
                    // whole unit of work, leave nothing partial behind
                    self.ledger.rollback_savepoint()?;
                    return Err(err);
                }
            }
        }
    }

    fn orphan_block_transactions(&mut self, block: &Block) -> Result<(), EngineError> {
        for tx in block.transactions.iter().rev() {
            orphan_transaction(&mut self.ledger, tx)?;
        }
        self.ledger.state.blocks.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::transaction::{Transaction, TxPayload};
    use crate::types::{
        Address, Amount, AssetId, GroupId, PublicKey, Signature, Timestamp,
    };
    use rust_decimal_macros::dec;

    fn amt(v: rust_decimal::Decimal) -> Amount {
        Amount::new_unchecked(v)
    }

    fn genesis_block(grants: Vec<(Address, Amount)>) -> Block {
        let tx = Transaction {
            signature: Signature::from_seed(1),
            reference: None,
            creator: Address::from_seed(1000),
            creator_key: PublicKey::from_seed(1000),
            timestamp: Timestamp::from_millis(0),
            fee: Amount::zero(),
            group_id: GroupId::NONE,
            payload: TxPayload::Genesis { grants },
            block_height: None,
        };
        Block::new(
            BlockHeight(0),
            Signature::from_seed(100),
            Timestamp::from_millis(0),
            vec![tx],
        )
    }

    fn payment(
        seed: u64,
        creator: Address,
        reference: Option<Signature>,
        recipient: Address,
        amount: rust_decimal::Decimal,
    ) -> Transaction {
        Transaction {
            signature: Signature::from_seed(seed),
            reference,
            creator,
            creator_key: PublicKey::from_seed(seed),
            timestamp: Timestamp::from_millis(seed as i64),
            fee: amt(dec!(0.1)),
            group_id: GroupId::NONE,
            payload: TxPayload::Payment {
                recipient,
                asset: AssetId::NATIVE,
                amount: amt(amount),
            },
            block_height: None,
        }
    }

    fn block(height: u64, seed: u64, txs: Vec<Transaction>) -> Block {
        Block::new(
            BlockHeight(height),
            Signature::from_seed(seed),
            Timestamp::from_millis(height as i64 * 1000),
            txs,
        )
    }

    #[test]
    fn apply_then_orphan_is_identity() {
        let alice = Address::from_seed(1);
        let bob = Address::from_seed(2);
        let mut engine = Engine::new(EngineConfig::default());
        engine.apply_block(&genesis_block(vec![(alice, amt(dec!(100)))])).unwrap();

        let after_genesis = engine.snapshot();

        let b1 = block(1, 101, vec![payment(10, alice, None, bob, dec!(25))]);
        engine.apply_block(&b1).unwrap();
        assert_eq!(engine.balance(bob, AssetId::NATIVE).value(), dec!(25));

        engine.orphan_block(&b1).unwrap();
        assert_eq!(engine.snapshot(), after_genesis);
        // orphaned transaction went back to the pool
        assert!(engine.is_unconfirmed(Signature::from_seed(10)));
    }

    #[test]
    fn invalid_transaction_rejects_whole_block() {
        let alice = Address::from_seed(1);
        let bob = Address::from_seed(2);
        let mut engine = Engine::new(EngineConfig::default());
        engine.apply_block(&genesis_block(vec![(alice, amt(dec!(100)))])).unwrap();
        let before = engine.snapshot();

        // second payment overdraws after the first; the whole block must fail
        let t1 = payment(10, alice, None, bob, dec!(80));
        let t2 = payment(11, alice, Some(Signature::from_seed(10)), bob, dec!(80));
        let bad = block(1, 101, vec![t1, t2]);

        let err = engine.apply_block(&bad).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.savepoint_depth_for_tests(), 0);
    }

    #[test]
    fn height_must_follow_tip() {
        let alice = Address::from_seed(1);
        let mut engine = Engine::new(EngineConfig::default());
        engine.apply_block(&genesis_block(vec![(alice, amt(dec!(100)))])).unwrap();

        let skipped = block(5, 101, vec![]);
        assert!(matches!(
            engine.apply_block(&skipped),
            Err(EngineError::UnexpectedHeight { .. })
        ));
    }

    #[test]
    fn orphan_requires_chain_tip() {
        let alice = Address::from_seed(1);
        let mut engine = Engine::new(EngineConfig::default());
        let g = genesis_block(vec![(alice, amt(dec!(100)))]);
        engine.apply_block(&g).unwrap();

        let b1 = block(1, 101, vec![payment(10, alice, None, alice, dec!(1))]);
        engine.apply_block(&b1).unwrap();

        // genesis is no longer the tip
        assert!(matches!(
            engine.orphan_block(&g),
            Err(EngineError::NotChainTip(_))
        ));
    }

    #[test]
    fn conflict_retries_then_succeeds() {
        let alice = Address::from_seed(1);
        let mut engine = Engine::new(EngineConfig::default());
        engine.inject_store_conflicts(2);
        engine.apply_block(&genesis_block(vec![(alice, amt(dec!(100)))])).unwrap();
        assert_eq!(engine.balance(alice, AssetId::NATIVE).value(), dec!(100));
    }

    #[test]
    fn conflict_retries_are_bounded() {
        let alice = Address::from_seed(1);
        let mut engine = Engine::new(EngineConfig::default());
        engine.inject_store_conflicts(100);
        let err = engine
            .apply_block(&genesis_block(vec![(alice, amt(dec!(100)))]))
            .unwrap_err();
        assert!(matches!(err, EngineError::RepositoryUnavailable { .. }));
    }
}
