// 3.0: accounts and the balance ledger.
//
// an account appears implicitly on its first credit or transaction and is never
// hard-deleted while any balance or history references it. the last_reference
// field is the replay guard: a new transaction from an address must carry the
// signature of that address's previous transaction.

use crate::store::Ledger;
use crate::types::{Address, Amount, AssetId, GroupId, PublicKey, Signature};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Signature of the most recently applied transaction created by this
    /// address. None until the first one.
    pub last_reference: Option<Signature>,
    /// Learned from the first signed transaction; absent for accounts that have
    /// only ever received funds.
    pub public_key: Option<PublicKey>,
    pub default_group_id: GroupId,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            last_reference: None,
            public_key: None,
            default_group_id: GroupId::NONE,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    #[error("insufficient funds: {address} holds {available} of {asset}, needs {requested}")]
    InsufficientFunds {
        address: Address,
        asset: AssetId,
        requested: Amount,
        available: Amount,
    },

    #[error("balance overflow crediting {amount} of {asset} to {address}")]
    BalanceOverflow {
        address: Address,
        asset: AssetId,
        amount: Amount,
    },
}

impl Ledger {
    /// Idempotent account creation. Returns true if the account was created now.
    pub fn ensure_account(&mut self, address: Address) -> bool {
        if self.state.accounts.contains_key(&address) {
            return false;
        }
        self.state.accounts.insert(address, Account::new(address));
        true
    }

    pub fn account(&self, address: Address) -> Option<&Account> {
        self.state.accounts.get(&address)
    }

    pub(crate) fn remove_account(&mut self, address: Address) {
        self.state.accounts.remove(&address);
    }

    /// Balance for an (address, asset) pair; zero when absent.
    pub fn balance(&self, address: Address, asset: AssetId) -> Amount {
        self.state
            .balances
            .get(&(address, asset))
            .copied()
            .unwrap_or_else(Amount::zero)
    }

    pub fn credit(
        &mut self,
        address: Address,
        asset: AssetId,
        delta: Amount,
    ) -> Result<(), AccountError> {
        self.ensure_account(address);
        let current = self.balance(address, asset);
        let updated = current
            .checked_add(delta)
            .ok_or(AccountError::BalanceOverflow {
                address,
                asset,
                amount: delta,
            })?;
        if updated.is_zero() {
            // zero balances are never stored, so credit(0) cannot mint a row
            self.state.balances.remove(&(address, asset));
        } else {
            self.state.balances.insert((address, asset), updated);
        }
        Ok(())
    }

    pub fn debit(
        &mut self,
        address: Address,
        asset: AssetId,
        delta: Amount,
    ) -> Result<(), AccountError> {
        let current = self.balance(address, asset);
        let updated = current
            .checked_sub(delta)
            .ok_or(AccountError::InsufficientFunds {
                address,
                asset,
                requested: delta,
                available: current,
            })?;
        if updated.is_zero() {
            // keep the table sparse so orphaning restores it byte-identical
            self.state.balances.remove(&(address, asset));
        } else {
            self.state.balances.insert((address, asset), updated);
        }
        Ok(())
    }

    pub fn last_reference(&self, address: Address) -> Option<Signature> {
        self.state
            .accounts
            .get(&address)
            .and_then(|a| a.last_reference)
    }

    pub fn set_last_reference(&mut self, address: Address, reference: Option<Signature>) {
        self.ensure_account(address);
        if let Some(account) = self.state.accounts.get_mut(&address) {
            account.last_reference = reference;
        }
    }

    /// Record the public key if the account does not have one yet. Returns true
    /// when the key was learned by this call (captured for undo).
    pub fn learn_public_key(&mut self, address: Address, key: PublicKey) -> bool {
        self.ensure_account(address);
        match self.state.accounts.get_mut(&address) {
            Some(account) if account.public_key.is_none() => {
                account.public_key = Some(key);
                true
            }
            _ => false,
        }
    }

    pub fn forget_public_key(&mut self, address: Address) {
        if let Some(account) = self.state.accounts.get_mut(&address) {
            account.public_key = None;
        }
    }

    pub fn default_group(&self, address: Address) -> GroupId {
        self.state
            .accounts
            .get(&address)
            .map(|a| a.default_group_id)
            .unwrap_or(GroupId::NONE)
    }

    pub fn set_default_group(&mut self, address: Address, group: GroupId) {
        self.ensure_account(address);
        if let Some(account) = self.state.accounts.get_mut(&address) {
            account.default_group_id = group;
        }
    }
}
