// 11.2: per-kind apply and orphan. apply captures everything orphan will need
// into an UndoRecord stored with the transaction row; orphan consumes it and
// restores every field apply touched, including the creator's last reference.
// validation has already passed when apply runs, so balance failures here are
// invariant violations, not caller errors.

use super::results::{EngineError, InvariantViolation};
use crate::matching::{match_order, undo_trade};
use crate::order::Order;
use crate::registry::NameRecord;
use crate::store::Ledger;
use crate::transaction::{Transaction, TxPayload};
use crate::types::{Amount, AssetId, BlockHeight, OrderId};
use crate::undo::{UndoKind, UndoRecord};

/// Forward state mutation for one confirmed transaction. Stores the transaction
/// row (with its block height) and the captured undo record.
pub(super) fn apply_transaction(
    ledger: &mut Ledger,
    tx: &Transaction,
    height: BlockHeight,
) -> Result<(), EngineError> {
    let created_creator = ledger.ensure_account(tx.creator);
    let learned_key = if tx.is_genesis() {
        false
    } else {
        ledger.learn_public_key(tx.creator, tx.creator_key)
    };

    if !tx.fee.is_zero() {
        ledger
            .debit(tx.creator, AssetId::NATIVE, tx.fee)
            .map_err(InvariantViolation::Balance)?;
    }
    ledger.set_last_reference(tx.creator, Some(tx.signature));

    let kind = apply_payload(ledger, tx)?;

    let mut row = tx.clone();
    row.block_height = Some(height);
    ledger.state.transactions.insert(tx.signature, row);
    ledger.store_undo(
        tx.signature,
        UndoRecord {
            created_creator,
            learned_key,
            kind,
        },
    );
    Ok(())
}

fn apply_payload(ledger: &mut Ledger, tx: &Transaction) -> Result<UndoKind, EngineError> {
    match &tx.payload {
        TxPayload::Genesis { grants } => {
            let total: Amount = grants.iter().map(|(_, a)| *a).sum();
            ledger.insert_asset(
                tx.creator,
                "COIN".into(),
                "native chain coin".into(),
                total,
                true,
                tx.signature,
            );
            let mut created_accounts = Vec::new();
            for (address, amount) in grants {
                if ledger.ensure_account(*address) {
                    created_accounts.push(*address);
                }
                ledger
                    .credit(*address, AssetId::NATIVE, *amount)
                    .map_err(InvariantViolation::Balance)?;
            }
            Ok(UndoKind::Genesis { created_accounts })
        }

        TxPayload::Payment {
            recipient,
            asset,
            amount,
        } => {
            ledger
                .debit(tx.creator, *asset, *amount)
                .map_err(InvariantViolation::Balance)?;
            let created_recipient = ledger.ensure_account(*recipient);
            ledger
                .credit(*recipient, *asset, *amount)
                .map_err(InvariantViolation::Balance)?;
            Ok(UndoKind::Payment { created_recipient })
        }

        TxPayload::AssetIssue {
            name,
            description,
            quantity,
            divisible,
        } => {
            let asset_id = ledger.insert_asset(
                tx.creator,
                name.clone(),
                description.clone(),
                *quantity,
                *divisible,
                tx.signature,
            );
            ledger
                .credit(tx.creator, asset_id, *quantity)
                .map_err(InvariantViolation::Balance)?;
            Ok(UndoKind::AssetIssue { asset_id })
        }

        TxPayload::AssetUpdate {
            asset,
            new_owner,
            new_description,
        } => {
            let row = ledger.asset(*asset).expect("validated asset exists");
            let previous_owner = row.owner;
            let previous_description = row.description.clone();
            ledger.set_asset_owner(*asset, *new_owner);
            ledger.set_asset_description(*asset, new_description.clone());
            Ok(UndoKind::AssetUpdate {
                previous_owner,
                previous_description,
            })
        }

        TxPayload::OrderCreate {
            have,
            want,
            amount,
            price,
        } => {
            let order_id = OrderId(tx.signature);
            ledger.insert_order(Order::new(
                order_id,
                tx.creator,
                *have,
                *want,
                *amount,
                *price,
                tx.timestamp,
            ));
            let trades = match_order(ledger, order_id, tx.timestamp)?;
            Ok(UndoKind::OrderCreate { trades })
        }

        TxPayload::OrderCancel { order } => {
            let row = ledger.order_mut(*order).expect("validated order exists");
            row.is_closed = true;
            Ok(UndoKind::OrderCancel)
        }

        TxPayload::NameRegister { name, data } => {
            ledger.insert_name(NameRecord {
                name: name.clone(),
                owner: tx.creator,
                data: data.clone(),
                reference: tx.signature,
            });
            Ok(UndoKind::NameRegister)
        }

        TxPayload::NameUpdate {
            name,
            new_owner,
            new_data,
        } => {
            let record = ledger.name_record(name).expect("validated name exists");
            let previous_owner = record.owner;
            let previous_data = record.data.clone();
            ledger.set_name_owner_data(name, *new_owner, new_data.clone());
            Ok(UndoKind::NameUpdate {
                previous_owner,
                previous_data,
            })
        }

        TxPayload::GroupCreate { name } => {
            let group_id = ledger.insert_group(tx.creator, name.clone(), tx.signature);
            Ok(UndoKind::GroupCreate { group_id })
        }

        TxPayload::GroupJoin { group } => {
            ledger.add_member(*group, tx.creator, tx.signature);
            Ok(UndoKind::GroupJoin)
        }

        TxPayload::SetDefaultGroup { group } => {
            let previous = ledger.default_group(tx.creator);
            ledger.set_default_group(tx.creator, *group);
            Ok(UndoKind::SetDefaultGroup { previous })
        }

        TxPayload::DataRecord { data } => {
            ledger.insert_data_record(tx.signature, data.clone());
            Ok(UndoKind::DataRecord)
        }
    }
}

/// Exact inverse of `apply_transaction`, driven entirely by the stored undo
/// record. Transactions must be orphaned in strict reverse apply order.
pub(super) fn orphan_transaction(ledger: &mut Ledger, tx: &Transaction) -> Result<(), EngineError> {
    let undo = ledger
        .take_undo(tx.signature)
        .ok_or(InvariantViolation::MissingUndo(tx.signature))?;

    orphan_payload(ledger, tx, &undo)?;

    if !tx.fee.is_zero() {
        ledger
            .credit(tx.creator, AssetId::NATIVE, tx.fee)
            .map_err(InvariantViolation::Balance)?;
    }
    ledger.set_last_reference(tx.creator, tx.reference);
    if undo.learned_key {
        ledger.forget_public_key(tx.creator);
    }
    if undo.created_creator {
        ledger.remove_account(tx.creator);
    }
    ledger.state.transactions.remove(&tx.signature);
    Ok(())
}

fn orphan_payload(
    ledger: &mut Ledger,
    tx: &Transaction,
    undo: &UndoRecord,
) -> Result<(), EngineError> {
    match (&tx.payload, &undo.kind) {
        (TxPayload::Genesis { grants }, UndoKind::Genesis { created_accounts }) => {
            for (address, amount) in grants.iter().rev() {
                ledger
                    .debit(*address, AssetId::NATIVE, *amount)
                    .map_err(InvariantViolation::Balance)?;
            }
            for address in created_accounts {
                ledger.remove_account(*address);
            }
            ledger.remove_asset(AssetId::NATIVE);
            Ok(())
        }

        (
            TxPayload::Payment {
                recipient,
                asset,
                amount,
            },
            UndoKind::Payment { created_recipient },
        ) => {
            ledger
                .debit(*recipient, *asset, *amount)
                .map_err(InvariantViolation::Balance)?;
            ledger
                .credit(tx.creator, *asset, *amount)
                .map_err(InvariantViolation::Balance)?;
            if *created_recipient {
                ledger.remove_account(*recipient);
            }
            Ok(())
        }

        (TxPayload::AssetIssue { quantity, .. }, UndoKind::AssetIssue { asset_id }) => {
            ledger
                .debit(tx.creator, *asset_id, *quantity)
                .map_err(InvariantViolation::Balance)?;
            ledger.remove_asset(*asset_id);
            Ok(())
        }

        (
            TxPayload::AssetUpdate { asset, .. },
            UndoKind::AssetUpdate {
                previous_owner,
                previous_description,
            },
        ) => {
            ledger.set_asset_owner(*asset, *previous_owner);
            ledger.set_asset_description(*asset, previous_description.clone());
            Ok(())
        }

        (TxPayload::OrderCreate { .. }, UndoKind::OrderCreate { trades }) => {
            let order_id = OrderId(tx.signature);
            for trade_undo in trades.iter().rev() {
                undo_trade(ledger, trade_undo)?;
            }
            ledger
                .remove_order(order_id)
                .ok_or(InvariantViolation::MissingOrder(order_id))?;
            Ok(())
        }

        (TxPayload::OrderCancel { order }, UndoKind::OrderCancel) => {
            let row = ledger
                .order_mut(*order)
                .ok_or(InvariantViolation::MissingOrder(*order))?;
            // validation required the order open, so the pre-apply flags were
            // open/unfulfilled
            row.is_closed = false;
            Ok(())
        }

        (TxPayload::NameRegister { name, .. }, UndoKind::NameRegister) => {
            ledger.remove_name(name);
            Ok(())
        }

        (
            TxPayload::NameUpdate { name, .. },
            UndoKind::NameUpdate {
                previous_owner,
                previous_data,
            },
        ) => {
            ledger.set_name_owner_data(name, *previous_owner, previous_data.clone());
            Ok(())
        }

        (TxPayload::GroupCreate { .. }, UndoKind::GroupCreate { group_id }) => {
            ledger.remove_group(*group_id);
            Ok(())
        }

        (TxPayload::GroupJoin { group }, UndoKind::GroupJoin) => {
            ledger.remove_member(*group, tx.creator);
            Ok(())
        }

        (TxPayload::SetDefaultGroup { .. }, UndoKind::SetDefaultGroup { previous }) => {
            ledger.set_default_group(tx.creator, *previous);
            Ok(())
        }

        (TxPayload::DataRecord { .. }, UndoKind::DataRecord) => {
            ledger.remove_data_record(tx.signature);
            Ok(())
        }

        _ => Err(InvariantViolation::UndoMismatch(tx.signature).into()),
    }
}
