// chain-ledger: proof-of-stake full-node ledger core.
// reversibility-first architecture: every apply has an exact orphan.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, Signature, AssetId, Amount, Price
//   2.x  store.rs: ledger tables, savepoints, commit (store mocked)
//   3.x  account.rs: accounts, balances, reference chain
//   4.x  asset.rs: asset register, sequential issuance
//   5.x  registry.rs: name and group registers
//   6.x  order.rs: exchange orders and trades
//   7.x  undo.rs: undo records captured at apply time
//   8.x  matching.rs: price-time priority matching
//   9.x  transaction.rs: payload enum, validation
//   10.x block.rs: block records
//   11.x engine/: apply/orphan engine: admission, blocks, retry

// ledger state modules
pub mod account;
pub mod asset;
pub mod block;
pub mod order;
pub mod registry;
pub mod store;
pub mod types;
pub mod undo;

// transaction processing modules
pub mod engine;
pub mod matching;
pub mod transaction;

// re exports for convenience
pub use account::*;
pub use asset::*;
pub use block::*;
pub use engine::*;
pub use order::*;
pub use registry::*;
pub use store::{Ledger, LedgerState, StoreError};
pub use transaction::*;
pub use types::*;
pub use undo::{TradeUndo, UndoKind, UndoRecord};
