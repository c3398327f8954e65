//! Ledger storage for the recruit-bidding auction engine.
//!
//! All authoritative auction state lives in the store; engine workers are
//! stateless between requests and derive correctness from the store's
//! per-document atomic updates instead of in-process locks.

pub mod documents;
pub mod memory;
pub mod store;

pub use {memory::MemoryLedger, store::LedgerStore};
