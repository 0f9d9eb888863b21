// 11.0: the apply/orphan engine. coordinates unconfirmed admission, block
// confirmation and strict-reverse orphaning over the ledger store, with bounded
// retry on store conflicts. deterministic, synchronous per unit of work.

mod apply;
mod blocks;
mod config;
mod core;
mod results;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{EngineError, InvariantViolation};
