// 6.0: exchange orders and trades. an order offers `amount` of its have asset at
// `price` want-per-have. fulfilled tracks the matched quantity in have units:
// 0 <= fulfilled <= amount, and is_fulfilled exactly when they are equal. a
// closed order never matches again.

use crate::store::Ledger;
use crate::types::{Address, Amount, AssetId, OrderId, Price, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub creator: Address,
    pub have: AssetId,
    pub want: AssetId,
    /// Total offered quantity of the have asset.
    pub amount: Amount,
    /// Matched quantity so far, in have units.
    pub fulfilled: Amount,
    /// Want units received per have unit offered.
    pub price: Price,
    pub created_at: Timestamp,
    pub is_closed: bool,
    pub is_fulfilled: bool,
}

impl Order {
    pub fn new(
        id: OrderId,
        creator: Address,
        have: AssetId,
        want: AssetId,
        amount: Amount,
        price: Price,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            creator,
            have,
            want,
            amount,
            fulfilled: Amount::zero(),
            price,
            created_at,
            is_closed: false,
            is_fulfilled: false,
        }
    }

    pub fn remaining(&self) -> Amount {
        self.amount
            .checked_sub(self.fulfilled)
            .unwrap_or_else(Amount::zero)
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed && !self.is_fulfilled
    }

    /// Record a matched quantity. Closes the order when fully fulfilled.
    pub fn fill(&mut self, matched: Amount) {
        debug_assert!(matched <= self.remaining(), "cannot fill more than remaining");
        self.fulfilled = self
            .fulfilled
            .checked_add(matched)
            .expect("fulfilled bounded by amount");
        if self.fulfilled == self.amount {
            self.is_fulfilled = true;
            self.is_closed = true;
        }
    }

    /// Reverse of `fill`, used when a trade is orphaned. Flags are restored by
    /// the caller from the captured pre-trade values.
    pub fn unfill(&mut self, matched: Amount) {
        self.fulfilled = self
            .fulfilled
            .checked_sub(matched)
            .expect("unfill bounded by fulfilled");
    }
}

/// An executed match between two orders. Immutable once recorded.
/// `initiator_amount` is in the initiating order's have asset, `target_amount`
/// in the target order's have asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub initiating: OrderId,
    pub target: OrderId,
    pub initiator_amount: Amount,
    pub target_amount: Amount,
    pub traded_at: Timestamp,
}

impl Ledger {
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.state.orders.get(&id)
    }

    pub(crate) fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.state.orders.get_mut(&id)
    }

    pub(crate) fn insert_order(&mut self, order: Order) {
        self.state.orders.insert(order.id, order);
    }

    pub(crate) fn remove_order(&mut self, id: OrderId) -> Option<Order> {
        self.state.orders.remove(&id)
    }

    /// Open orders offering `have` for `want`, best price first: ascending price
    /// (cheapest in have-per-want terms for the counterparty), then creation
    /// time, then order id. The ordering is total, so matching is deterministic.
    pub fn open_orders(&self, have: AssetId, want: AssetId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .state
            .orders
            .values()
            .filter(|o| o.have == have && o.want == want && o.is_open())
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            a.price
                .cmp(&b.price)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        orders
    }

    /// Trades touching the (have, want) pair, in either orientation, in
    /// execution order.
    pub fn trades_for(&self, have: AssetId, want: AssetId) -> Vec<Trade> {
        self.state
            .trades
            .iter()
            .filter(|t| {
                self.state
                    .orders
                    .get(&t.initiating)
                    .map(|o| {
                        (o.have == have && o.want == want) || (o.have == want && o.want == have)
                    })
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub(crate) fn record_trade(&mut self, trade: Trade) {
        self.state.trades.push(trade);
    }

    /// Remove a trade during orphaning. Strict reverse ordering means the trade
    /// being removed is always the most recently recorded one.
    pub(crate) fn unrecord_trade(&mut self, trade: &Trade) {
        debug_assert_eq!(self.state.trades.last(), Some(trade));
        self.state.trades.pop();
    }
}
