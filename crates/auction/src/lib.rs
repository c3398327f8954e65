//! Recruit-bidding auction engine.
//!
//! Clans compete for the right to recruit a candidate by placing
//! point-denominated bids within a fixed window; the highest bid wins and the
//! winning clan's balance is debited. The engine holds no authoritative state
//! of its own: everything lives in the [`ledger::LedgerStore`], and every
//! state transition is guarded by a conditional write so any number of
//! workers can serve bids, retractions and clock fires concurrently.

use {bigdecimal::BigDecimal, thiserror::Error};

pub mod clock;
pub mod config;
pub mod engine;
pub mod finalize;
pub mod notify;

pub use {config::Config, engine::Engine, notify::Notifier};

/// Caller-facing error taxonomy. Every rejection names the reason the action
/// did not take effect; none of these may abort a finalization in progress.
#[derive(Debug, Error)]
pub enum Error {
    #[error("an auction is already open for this recruit")]
    AlreadyActive,
    #[error("this player already has a finalized placement")]
    AlreadyPlaced,
    #[error("clan already has a bid in this session; retract it first")]
    DuplicateBid,
    #[error("insufficient points: {available} available, {required} required")]
    InsufficientPoints {
        available: BigDecimal,
        required: BigDecimal,
    },
    #[error("the auction is no longer accepting bids")]
    SessionClosed,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("bid amount must be a positive multiple of {increment}")]
    InvalidAmount { increment: BigDecimal },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
