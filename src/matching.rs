// 8.0: the order matching engine. runs inside the same ledger transaction as the
// order-create apply that triggers it, walks the opposite book in price-time
// priority and settles each trade atomically with the fulfilled updates.
//
// pricing convention: an order's price P is want units per have unit. a counter
// order quotes Q in the opposite orientation, so the two cross when P * Q <= 1.
// all conversions round down to the 8 dp grid (whole units for indivisible
// assets); the payer keeps the rounding remainder, so no leg ever exceeds a
// remaining quantity and per-asset sums are conserved exactly.
//
// deterministic rules: self-matching is disallowed (same-creator counter orders
// are skipped), and a counter order whose creator can no longer cover the
// settlement is skipped rather than closed.

use crate::engine::InvariantViolation;
use crate::order::{Order, Trade};
use crate::store::Ledger;
use crate::types::{Amount, OrderId, Timestamp};
use crate::undo::TradeUndo;

/// Match a freshly inserted order against the opposite book. Returns the undo
/// capture for every trade executed, in execution order. A row that disappears
/// mid-match is an invariant violation; the caller abandons the unit of work.
pub fn match_order(
    ledger: &mut Ledger,
    order_id: OrderId,
    now: Timestamp,
) -> Result<Vec<TradeUndo>, InvariantViolation> {
    let initiator = match ledger.order(order_id) {
        Some(o) => o.clone(),
        None => return Ok(Vec::new()),
    };

    let mut trades = Vec::new();
    let counters = ledger.open_orders(initiator.want, initiator.have);

    for counter in counters {
        let current = ledger
            .order(order_id)
            .ok_or(InvariantViolation::MissingOrder(order_id))?
            .clone();
        if !current.is_open() {
            break;
        }

        // book is sorted best price first: the first non-crossing counter ends it
        if current.price.value() * counter.price.value() > rust_decimal::Decimal::ONE {
            break;
        }

        if counter.creator == current.creator {
            continue;
        }

        let Some((have_amount, want_amount)) = trade_amounts(ledger, &current, &counter) else {
            continue;
        };
        if want_amount.is_zero() {
            // too small to buy anything even at the best price; no later counter
            // can do better
            break;
        }
        if have_amount.is_zero() {
            continue;
        }

        // counter creator must still cover its leg; funds are not escrowed at
        // order creation
        if ledger.balance(counter.creator, counter.have) < want_amount {
            continue;
        }

        execute_trade(ledger, &current, &counter, have_amount, want_amount)?;

        let trade = Trade {
            initiating: current.id,
            target: counter.id,
            initiator_amount: have_amount,
            target_amount: want_amount,
            traded_at: now,
        };
        ledger.record_trade(trade.clone());

        trades.push(TradeUndo {
            trade,
            initiator_was_closed: current.is_closed,
            initiator_was_fulfilled: current.is_fulfilled,
            target_was_closed: counter.is_closed,
            target_was_fulfilled: counter.is_fulfilled,
        });
    }

    Ok(trades)
}

/// Quantities for one trade, both rounded down: `want_amount` in the counter's
/// have asset (what the initiator receives), `have_amount` in the initiator's
/// have asset (what the initiator pays). None when remainders are exhausted.
fn trade_amounts(ledger: &Ledger, initiator: &Order, counter: &Order) -> Option<(Amount, Amount)> {
    let initiator_remaining = initiator.remaining();
    let counter_remaining = counter.remaining();
    if initiator_remaining.is_zero() || counter_remaining.is_zero() {
        return None;
    }

    // counter price Q is have-of-initiator per have-of-counter, so the initiator
    // can afford remaining / Q of the counter's asset
    let affordable = Amount::new(initiator_remaining.value() / counter.price.value())?;
    let mut want_amount = counter_remaining.min(affordable);

    let want_divisible = ledger.asset(counter.have).map(|a| a.divisible).unwrap_or(true);
    if !want_divisible {
        want_amount = want_amount.floor();
    }

    let mut have_amount = Amount::new(want_amount.value() * counter.price.value())?;
    let have_divisible = ledger.asset(initiator.have).map(|a| a.divisible).unwrap_or(true);
    if !have_divisible {
        have_amount = have_amount.floor();
    }

    debug_assert!(have_amount <= initiator_remaining);
    Some((have_amount, want_amount))
}

/// Settle one trade: move both legs and update fulfilled on both orders, all in
/// the caller's ledger transaction.
fn execute_trade(
    ledger: &mut Ledger,
    initiator: &Order,
    counter: &Order,
    have_amount: Amount,
    want_amount: Amount,
) -> Result<(), InvariantViolation> {
    ledger.debit(initiator.creator, initiator.have, have_amount)?;
    ledger.credit(counter.creator, initiator.have, have_amount)?;
    ledger.debit(counter.creator, counter.have, want_amount)?;
    ledger.credit(initiator.creator, counter.have, want_amount)?;

    ledger
        .order_mut(initiator.id)
        .ok_or(InvariantViolation::MissingOrder(initiator.id))?
        .fill(have_amount);
    ledger
        .order_mut(counter.id)
        .ok_or(InvariantViolation::MissingOrder(counter.id))?
        .fill(want_amount);

    Ok(())
}

/// Reverse one trade during orphaning: move both legs back and restore both
/// orders' fulfilled totals and flags to their captured pre-trade values.
/// A missing order row is an invariant violation, surfaced (not panicked) so
/// the enclosing unit of work can roll back whole.
pub fn undo_trade(ledger: &mut Ledger, undo: &TradeUndo) -> Result<(), InvariantViolation> {
    let trade = &undo.trade;
    let initiator = ledger
        .order(trade.initiating)
        .ok_or(InvariantViolation::MissingOrder(trade.initiating))?
        .clone();
    let counter = ledger
        .order(trade.target)
        .ok_or(InvariantViolation::MissingOrder(trade.target))?
        .clone();

    ledger.debit(counter.creator, initiator.have, trade.initiator_amount)?;
    ledger.credit(initiator.creator, initiator.have, trade.initiator_amount)?;
    ledger.debit(initiator.creator, counter.have, trade.target_amount)?;
    ledger.credit(counter.creator, counter.have, trade.target_amount)?;

    let o = ledger
        .order_mut(trade.initiating)
        .ok_or(InvariantViolation::MissingOrder(trade.initiating))?;
    o.unfill(trade.initiator_amount);
    o.is_closed = undo.initiator_was_closed;
    o.is_fulfilled = undo.initiator_was_fulfilled;

    let c = ledger
        .order_mut(trade.target)
        .ok_or(InvariantViolation::MissingOrder(trade.target))?;
    c.unfill(trade.target_amount);
    c.is_closed = undo.target_was_closed;
    c.is_fulfilled = undo.target_was_fulfilled;

    ledger.unrecord_trade(trade);

    Ok(())
}
