//! Ledger Core Simulation.
//!
//! Demonstrates the full node-core lifecycle including genesis, payments,
//! asset issuance, exchange matching, block orphaning and conflict retry.

use chain_ledger::*;
use rust_decimal_macros::dec;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("Chain Ledger Core Simulation");
    println!("Apply/Orphan Engine, Asset Exchange, Full Lifecycle\n");

    scenario_1_genesis_and_payments();
    scenario_2_asset_exchange();
    scenario_3_order_cancel();
    scenario_4_reorganisation();
    scenario_5_conflict_retry();

    println!("\nAll simulations completed successfully.");
}

fn amt(v: rust_decimal::Decimal) -> Amount {
    Amount::new_unchecked(v)
}

fn genesis_block(grants: Vec<(Address, Amount)>) -> Block {
    let tx = Transaction {
        signature: Signature::from_seed(1),
        reference: None,
        creator: Address::from_seed(999),
        creator_key: PublicKey::from_seed(999),
        timestamp: Timestamp::from_millis(0),
        fee: Amount::zero(),
        group_id: GroupId::NONE,
        payload: TxPayload::Genesis { grants },
        block_height: None,
    };
    Block::new(
        BlockHeight(0),
        Signature::from_seed(9000),
        Timestamp::from_millis(0),
        vec![tx],
    )
}

fn tx(
    seed: u64,
    creator: Address,
    reference: Option<Signature>,
    payload: TxPayload,
) -> Transaction {
    Transaction {
        signature: Signature::from_seed(seed),
        reference,
        creator,
        creator_key: PublicKey::from_seed(seed),
        timestamp: Timestamp::from_millis(seed as i64),
        fee: amt(dec!(0.1)),
        group_id: GroupId::NONE,
        payload,
        block_height: None,
    }
}

/// Genesis grants and a chain of payments.
fn scenario_1_genesis_and_payments() {
    println!("Scenario 1: Genesis and Payments\n");

    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);

    let mut engine = Engine::new(EngineConfig::default());
    engine
        .apply_block(&genesis_block(vec![(alice, amt(dec!(1000)))]))
        .unwrap();

    println!("  Genesis grants Alice 1000 COIN");

    let t1 = tx(
        10,
        alice,
        None,
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(250)),
        },
    );
    let t2 = tx(
        11,
        alice,
        Some(t1.signature),
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(100)),
        },
    );

    engine.admit_unconfirmed(t1.clone()).unwrap();
    engine.admit_unconfirmed(t2.clone()).unwrap();
    println!("  Admitted {} unconfirmed payments", engine.unconfirmed_count());

    let b1 = Block::new(
        BlockHeight(1),
        Signature::from_seed(9001),
        Timestamp::from_millis(1000),
        vec![t1.clone(), t2],
    );
    engine.apply_block(&b1).unwrap();

    println!(
        "  Block 1 applied: Alice {} COIN, Bob {} COIN",
        engine.balance(alice, AssetId::NATIVE),
        engine.balance(bob, AssetId::NATIVE)
    );

    // a replayed signature is refused outright
    let replay = engine.admit_unconfirmed(t1);
    println!("  Replaying a confirmed payment: {}\n", replay.unwrap_err());
}

/// Asset issuance and exchange matching with a partial fill.
fn scenario_2_asset_exchange() {
    println!("Scenario 2: Asset Exchange\n");

    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);

    let mut engine = Engine::new(EngineConfig::default());
    engine
        .apply_block(&genesis_block(vec![
            (alice, amt(dec!(1000))),
            (bob, amt(dec!(1000))),
        ]))
        .unwrap();

    let issue = tx(
        10,
        alice,
        None,
        TxPayload::AssetIssue {
            name: "GOLD".into(),
            description: "a scarce token".into(),
            quantity: amt(dec!(100)),
            divisible: true,
        },
    );
    let gold = AssetId(1);

    // bob asks for 2 COIN per GOLD; alice bids 10 COIN for GOLD at 0.5 GOLD/COIN
    let ask = tx(
        11,
        bob,
        None,
        TxPayload::OrderCreate {
            have: gold,
            want: AssetId::NATIVE,
            amount: amt(dec!(20)),
            price: Price::new_unchecked(dec!(2)),
        },
    );
    let pay_bob = tx(
        12,
        alice,
        Some(issue.signature),
        TxPayload::Payment {
            recipient: bob,
            asset: gold,
            amount: amt(dec!(50)),
        },
    );
    let bid = tx(
        13,
        alice,
        Some(pay_bob.signature),
        TxPayload::OrderCreate {
            have: AssetId::NATIVE,
            want: gold,
            amount: amt(dec!(10)),
            price: Price::new_unchecked(dec!(0.5)),
        },
    );

    let b1 = Block::new(
        BlockHeight(1),
        Signature::from_seed(9001),
        Timestamp::from_millis(1000),
        vec![issue, pay_bob, ask, bid.clone()],
    );
    engine.apply_block(&b1).unwrap();

    println!("  Alice issues 100 GOLD, sends 50 to Bob");
    println!("  Bob asks 20 GOLD at 2 COIN each; Alice bids 10 COIN at 0.5 GOLD each");

    let trades = engine.trades(AssetId::NATIVE, gold);
    for t in &trades {
        println!(
            "  Trade: {} COIN for {} GOLD",
            t.initiator_amount, t.target_amount
        );
    }

    let resting = engine.order(OrderId(Signature::from_seed(11))).unwrap();
    println!(
        "  Bob's ask rests with {} GOLD remaining",
        resting.remaining()
    );
    println!(
        "  Balances: Alice {} GOLD, Bob {} COIN\n",
        engine.balance(alice, gold),
        engine.balance(bob, AssetId::NATIVE)
    );
}

/// Cancelling a resting order closes it without touching balances.
fn scenario_3_order_cancel() {
    println!("Scenario 3: Order Cancel\n");

    let alice = Address::from_seed(1);
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .apply_block(&genesis_block(vec![(alice, amt(dec!(1000)))]))
        .unwrap();

    let issue = tx(
        10,
        alice,
        None,
        TxPayload::AssetIssue {
            name: "GOLD".into(),
            description: "a scarce token".into(),
            quantity: amt(dec!(100)),
            divisible: true,
        },
    );
    let order = tx(
        11,
        alice,
        Some(issue.signature),
        TxPayload::OrderCreate {
            have: AssetId(1),
            want: AssetId::NATIVE,
            amount: amt(dec!(10)),
            price: Price::new_unchecked(dec!(3)),
        },
    );
    let order_id = OrderId(order.signature);
    let cancel = tx(
        12,
        alice,
        Some(order.signature),
        TxPayload::OrderCancel { order: order_id },
    );

    let b1 = Block::new(
        BlockHeight(1),
        Signature::from_seed(9001),
        Timestamp::from_millis(1000),
        vec![issue, order, cancel],
    );
    engine.apply_block(&b1).unwrap();

    let row = engine.order(order_id).unwrap();
    println!("  Order created then cancelled in one block");
    println!(
        "  closed: {}, fulfilled: {}, open asks: {}\n",
        row.is_closed,
        row.fulfilled,
        engine.open_orders(AssetId(1), AssetId::NATIVE).len()
    );
}

/// Orphaning blocks in reverse returns the ledger to its exact earlier state.
fn scenario_4_reorganisation() {
    println!("Scenario 4: Reorganisation\n");

    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);

    let mut engine = Engine::new(EngineConfig::default());
    engine
        .apply_block(&genesis_block(vec![(alice, amt(dec!(1000)))]))
        .unwrap();
    let checkpoint = engine.snapshot();

    let t1 = tx(
        10,
        alice,
        None,
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(100)),
        },
    );
    let t2 = tx(
        11,
        alice,
        Some(t1.signature),
        TxPayload::AssetIssue {
            name: "GOLD".into(),
            description: "a scarce token".into(),
            quantity: amt(dec!(100)),
            divisible: true,
        },
    );
    let b1 = Block::new(
        BlockHeight(1),
        Signature::from_seed(9001),
        Timestamp::from_millis(1000),
        vec![t1, t2],
    );
    let t3 = tx(
        12,
        alice,
        Some(Signature::from_seed(11)),
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId(1),
            amount: amt(dec!(25)),
        },
    );
    let b2 = Block::new(
        BlockHeight(2),
        Signature::from_seed(9002),
        Timestamp::from_millis(2000),
        vec![t3],
    );

    engine.apply_block(&b1).unwrap();
    engine.apply_block(&b2).unwrap();
    println!(
        "  Applied blocks 1 and 2: Bob holds {} GOLD",
        engine.balance(bob, AssetId(1))
    );

    engine.orphan_block(&b2).unwrap();
    engine.orphan_block(&b1).unwrap();

    println!(
        "  Orphaned both: state identical to checkpoint: {}",
        engine.snapshot() == checkpoint
    );
    println!(
        "  Orphaned transactions back in the pool: {}\n",
        engine.unconfirmed_count()
    );
}

/// Store conflicts are retried with bounded attempts.
fn scenario_5_conflict_retry() {
    println!("Scenario 5: Conflict Retry\n");

    let alice = Address::from_seed(1);
    let mut engine = Engine::new(EngineConfig::default());

    engine.inject_store_conflicts(2);
    engine
        .apply_block(&genesis_block(vec![(alice, amt(dec!(1000)))]))
        .unwrap();
    println!("  Two injected conflicts, block still landed after retries");

    engine.inject_store_conflicts(100);
    let t1 = tx(
        10,
        alice,
        None,
        TxPayload::Payment {
            recipient: Address::from_seed(2),
            asset: AssetId::NATIVE,
            amount: amt(dec!(1)),
        },
    );
    let b1 = Block::new(
        BlockHeight(1),
        Signature::from_seed(9001),
        Timestamp::from_millis(1000),
        vec![t1],
    );
    let err = engine.apply_block(&b1).unwrap_err();
    println!("  Persistent conflicts give up: {}", err);
    println!(
        "  Ledger untouched: Alice still has {} COIN",
        engine.balance(alice, AssetId::NATIVE)
    );
}
