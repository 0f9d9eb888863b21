//! End-to-end scenarios: replay protection, exchange determinism, registry
//! lifecycles and multi-block reorganisations.

use chain_ledger::*;
use rust_decimal_macros::dec;

fn amt(v: rust_decimal::Decimal) -> Amount {
    Amount::new_unchecked(v)
}

fn tx(seed: u64, creator: Address, reference: Option<Signature>, payload: TxPayload) -> Transaction {
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

fn genesis_block(grants: Vec<(Address, Amount)>) -> Block {
    let g = Transaction {
        fee: Amount::zero(),
        ..tx(1, Address::from_seed(999), None, TxPayload::Genesis { grants })
    };
    Block::new(
        BlockHeight(0),
        Signature::from_seed(9000),
        Timestamp::from_millis(0),
        vec![g],
    )
}

fn block(height: u64, seed: u64, transactions: Vec<Transaction>) -> Block {
    Block::new(
        BlockHeight(height),
        Signature::from_seed(seed),
        Timestamp::from_millis(height as i64 * 1000),
        transactions,
    )
}

fn started(grants: Vec<(Address, Amount)>) -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    engine.apply_block(&genesis_block(grants)).unwrap();
    engine
}

#[test]
fn crossing_orders_settle_deterministically() {
    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);
    let mut engine = started(vec![(alice, amt(dec!(1000))), (bob, amt(dec!(1000)))]);

    // alice issues HAVE, bob issues WANT; bob rests 10 WANT at 0.5 HAVE each,
    // alice then offers 5 HAVE at 2 WANT each. exactly one trade: 5 for 10.
    let issue_h = tx(
        10,
        alice,
        None,
        TxPayload::AssetIssue {
            name: "HAVE".into(),
            description: String::new(),
            quantity: amt(dec!(1000)),
            divisible: true,
        },
    );
    let issue_w = tx(
        11,
        bob,
        None,
        TxPayload::AssetIssue {
            name: "WANT".into(),
            description: String::new(),
            quantity: amt(dec!(1000)),
            divisible: true,
        },
    );
    let h = AssetId(1);
    let w = AssetId(2);
    let rest = tx(
        12,
        bob,
        Some(issue_w.signature),
        TxPayload::OrderCreate {
            have: w,
            want: h,
            amount: amt(dec!(10)),
            price: Price::new_unchecked(dec!(0.5)),
        },
    );
    let take = tx(
        13,
        alice,
        Some(issue_h.signature),
        TxPayload::OrderCreate {
            have: h,
            want: w,
            amount: amt(dec!(5)),
            price: Price::new_unchecked(dec!(2)),
        },
    );

    engine
        .apply_block(&block(1, 9001, vec![issue_h, issue_w, rest, take]))
        .unwrap();

    let trades = engine.trades(h, w);
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].initiator_amount.value(), dec!(5));
    assert_eq!(trades[0].target_amount.value(), dec!(10));

    for seed in [12u64, 13] {
        let order = engine.order(OrderId(Signature::from_seed(seed))).unwrap();
        assert!(order.is_fulfilled);
        assert!(order.is_closed);
    }

    assert_eq!(engine.balance(alice, h).value(), dec!(995));
    assert_eq!(engine.balance(alice, w).value(), dec!(10));
    assert_eq!(engine.balance(bob, w).value(), dec!(990));
    assert_eq!(engine.balance(bob, h).value(), dec!(5));
}

#[test]
fn replay_and_stale_references_are_refused() {
    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);
    let mut engine = started(vec![(alice, amt(dec!(1000)))]);

    let t1 = tx(
        10,
        alice,
        None,
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(10)),
        },
    );
    engine.apply_block(&block(1, 9001, vec![t1.clone()])).unwrap();

    // the confirmed signature cannot come back
    assert!(matches!(
        engine.admit_unconfirmed(t1.clone()),
        Err(EngineError::Validation(ValidationError::DuplicateSignature))
    ));

    // a fresh transaction must reference alice's latest, not her first
    let stale = tx(
        11,
        alice,
        None,
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(10)),
        },
    );
    assert!(matches!(
        engine.admit_unconfirmed(stale),
        Err(EngineError::Validation(ValidationError::InvalidReference))
    ));

    let fresh = tx(
        12,
        alice,
        Some(t1.signature),
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(10)),
        },
    );
    engine.admit_unconfirmed(fresh).unwrap();
    assert_eq!(engine.unconfirmed_count(), 1);
}

#[test]
fn two_block_reorg_returns_to_genesis_state() {
    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);
    let mut engine = started(vec![(alice, amt(dec!(1000)))]);
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
            description: String::new(),
            quantity: amt(dec!(100)),
            divisible: true,
        },
    );
    let b1 = block(1, 9001, vec![t1.clone(), t2.clone()]);

    let t3 = tx(
        12,
        alice,
        Some(t2.signature),
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId(1),
            amount: amt(dec!(25)),
        },
    );
    let b2 = block(2, 9002, vec![t3]);

    engine.apply_block(&b1).unwrap();
    engine.apply_block(&b2).unwrap();
    assert_eq!(engine.balance(bob, AssetId(1)).value(), dec!(25));
    assert_eq!(
        engine.account(alice).unwrap().last_reference,
        Some(Signature::from_seed(12))
    );

    engine.orphan_block(&b2).unwrap();
    assert_eq!(
        engine.account(alice).unwrap().last_reference,
        Some(Signature::from_seed(11))
    );

    engine.orphan_block(&b1).unwrap();
    assert_eq!(engine.snapshot(), checkpoint);
    assert_eq!(engine.account(alice).unwrap().last_reference, None);
    // bob only ever existed through the orphaned payment
    assert!(engine.account(bob).is_none());
    assert!(engine.asset(AssetId(1)).is_none());
    assert_eq!(engine.unconfirmed_count(), 3);
    assert_eq!(engine.height(), Some(BlockHeight(0)));
}

#[test]
fn asset_update_transfers_ownership_and_reverses() {
    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);
    let mut engine = started(vec![(alice, amt(dec!(1000))), (bob, amt(dec!(1000)))]);

    let issue = tx(
        10,
        alice,
        None,
        TxPayload::AssetIssue {
            name: "GOLD".into(),
            description: "v1".into(),
            quantity: amt(dec!(100)),
            divisible: true,
        },
    );
    let gold = AssetId(1);
    engine.apply_block(&block(1, 9001, vec![issue.clone()])).unwrap();
    let checkpoint = engine.snapshot();

    // only the current owner may hand an asset over
    let not_owner = tx(
        11,
        bob,
        None,
        TxPayload::AssetUpdate {
            asset: gold,
            new_owner: bob,
            new_description: "hijacked".into(),
        },
    );
    assert!(matches!(
        engine.admit_unconfirmed(not_owner),
        Err(EngineError::Validation(ValidationError::NotAuthorized))
    ));

    // and the native coin has no owner to speak for it
    let native = tx(
        12,
        alice,
        Some(issue.signature),
        TxPayload::AssetUpdate {
            asset: AssetId::NATIVE,
            new_owner: alice,
            new_description: "still nobody's".into(),
        },
    );
    assert!(matches!(
        engine.admit_unconfirmed(native),
        Err(EngineError::Validation(ValidationError::NotAuthorized))
    ));

    let update = tx(
        13,
        alice,
        Some(issue.signature),
        TxPayload::AssetUpdate {
            asset: gold,
            new_owner: bob,
            new_description: "v2".into(),
        },
    );
    let b2 = block(2, 9002, vec![update]);
    engine.apply_block(&b2).unwrap();

    let row = engine.asset(gold).unwrap();
    assert_eq!(row.owner, bob);
    assert_eq!(row.description, "v2");

    engine.orphan_block(&b2).unwrap();
    let row = engine.asset(gold).unwrap();
    assert_eq!(row.owner, alice);
    assert_eq!(row.description, "v1");
    assert_eq!(engine.snapshot(), checkpoint);
}

#[test]
fn cancelled_order_reopens_on_orphan() {
    let alice = Address::from_seed(1);
    let mut engine = started(vec![(alice, amt(dec!(1000)))]);

    let issue = tx(
        10,
        alice,
        None,
        TxPayload::AssetIssue {
            name: "GOLD".into(),
            description: String::new(),
            quantity: amt(dec!(100)),
            divisible: true,
        },
    );
    let create = tx(
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
    let order_id = OrderId(create.signature);
    engine
        .apply_block(&block(1, 9001, vec![issue, create]))
        .unwrap();
    assert!(engine.order(order_id).unwrap().is_open());

    let cancel = tx(
        12,
        alice,
        Some(Signature::from_seed(11)),
        TxPayload::OrderCancel { order: order_id },
    );
    let b2 = block(2, 9002, vec![cancel]);
    engine.apply_block(&b2).unwrap();
    assert!(engine.order(order_id).unwrap().is_closed);
    assert!(engine.open_orders(AssetId(1), AssetId::NATIVE).is_empty());

    engine.orphan_block(&b2).unwrap();
    let row = engine.order(order_id).unwrap();
    assert!(row.is_open());
    assert!(row.fulfilled.is_zero());
}

#[test]
fn name_and_group_lifecycle_reverses_cleanly() {
    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);
    let mut engine = started(vec![(alice, amt(dec!(1000))), (bob, amt(dec!(1000)))]);
    let checkpoint = engine.snapshot();

    let register = tx(
        10,
        alice,
        None,
        TxPayload::NameRegister {
            name: "alice.node".into(),
            data: "v1".into(),
        },
    );
    let create = tx(
        11,
        alice,
        Some(register.signature),
        TxPayload::GroupCreate {
            name: "forgers".into(),
        },
    );
    let set_default = tx(
        12,
        alice,
        Some(create.signature),
        TxPayload::SetDefaultGroup { group: GroupId(1) },
    );
    let update = tx(
        13,
        alice,
        Some(set_default.signature),
        TxPayload::NameUpdate {
            name: "alice.node".into(),
            new_owner: bob,
            new_data: "v2".into(),
        },
    );
    let join = tx(14, bob, None, TxPayload::GroupJoin { group: GroupId(1) });

    let b1 = block(1, 9001, vec![register, create, set_default, update, join]);
    engine.apply_block(&b1).unwrap();

    let record = engine.name_record("alice.node").unwrap();
    assert_eq!(record.owner, bob);
    assert_eq!(record.data, "v2");
    assert_eq!(engine.group_by_name("forgers").unwrap().owner, alice);
    assert!(engine.is_member(GroupId(1), bob));
    assert_eq!(engine.account(alice).unwrap().default_group_id, GroupId(1));

    engine.orphan_block(&b1).unwrap();
    assert!(engine.name_record("alice.node").is_none());
    assert!(engine.group_by_name("forgers").is_none());
    assert!(!engine.is_member(GroupId(1), bob));
    assert_eq!(engine.snapshot(), checkpoint);
}

#[test]
fn data_record_is_anchored_and_reversible() {
    let alice = Address::from_seed(1);
    let mut engine = started(vec![(alice, amt(dec!(1000)))]);

    let anchor = tx(
        10,
        alice,
        None,
        TxPayload::DataRecord {
            data: vec![0xde, 0xad, 0xbe, 0xef],
        },
    );
    let b1 = block(1, 9001, vec![anchor.clone()]);
    engine.apply_block(&b1).unwrap();
    assert_eq!(
        engine.data_record(anchor.signature),
        Some(&[0xde, 0xad, 0xbe, 0xef][..])
    );

    engine.orphan_block(&b1).unwrap();
    assert!(engine.data_record(anchor.signature).is_none());
}

#[test]
fn genesis_is_height_zero_only() {
    let alice = Address::from_seed(1);
    let mut engine = started(vec![(alice, amt(dec!(1000)))]);

    let late = Transaction {
        fee: Amount::zero(),
        ..tx(
            50,
            Address::from_seed(999),
            None,
            TxPayload::Genesis {
                grants: vec![(alice, amt(dec!(1)))],
            },
        )
    };
    let err = engine.apply_block(&block(1, 9001, vec![late])).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::GenesisOutOfPlace)
    ));
    assert_eq!(engine.height(), Some(BlockHeight(0)));
}

#[test]
fn confirmed_transactions_carry_their_height() {
    let alice = Address::from_seed(1);
    let bob = Address::from_seed(2);
    let mut engine = started(vec![(alice, amt(dec!(1000)))]);

    let t1 = tx(
        10,
        alice,
        None,
        TxPayload::Payment {
            recipient: bob,
            asset: AssetId::NATIVE,
            amount: amt(dec!(10)),
        },
    );
    engine.admit_unconfirmed(t1.clone()).unwrap();
    assert!(engine.confirmed_transaction(t1.signature).is_none());

    engine.apply_block(&block(1, 9001, vec![t1.clone()])).unwrap();
    assert!(!engine.is_unconfirmed(t1.signature));
    let row = engine.confirmed_transaction(t1.signature).unwrap();
    assert_eq!(row.block_height, Some(BlockHeight(1)));
}
