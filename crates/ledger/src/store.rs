//! The storage contract the engine runs against.
//!
//! Every state-changing call is conditioned on the expected prior value of
//! the affected document and reports whether the condition held. Callers
//! never read-then-write without such a guard; that is the entire
//! concurrency-control story of the engine, which may run as any number of
//! stateless workers.

use {
    crate::documents::{
        AuctionSession,
        Bid,
        ClanAccount,
        ClanTag,
        Outcome,
        Placement,
        PlayerTag,
        RecruitId,
        RecruitRecord,
        SessionId,
    },
    anyhow::Result,
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
};

/// Result of the `auction_open: false -> true` compare-and-set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimRecruit {
    Claimed,
    /// The flag was already set; another session is live.
    AlreadyOpen,
    /// The player already has a finalized placement on record.
    AlreadyPlaced,
    Missing,
}

/// Result of the conditional bid append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushBid {
    Pushed,
    /// The clan already has a bid in this session.
    Duplicate,
    /// The session left `Open` before the write executed.
    Closed,
    Missing,
}

/// Result of the conditional bid removal.
#[derive(Clone, Debug, PartialEq)]
pub enum PullBid {
    Pulled(Bid),
    NoBid,
    Closed,
    Missing,
}

/// Result of the check-and-reserve on a clan account.
#[derive(Clone, Debug, PartialEq)]
pub enum ReservePoints {
    Reserved,
    Insufficient { available: BigDecimal },
    Missing,
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn clan(&self, tag: &ClanTag) -> Result<Option<ClanAccount>>;
    async fn upsert_clan(&self, clan: ClanAccount) -> Result<()>;
    async fn recruit(&self, id: RecruitId) -> Result<Option<RecruitRecord>>;
    async fn upsert_recruit(&self, recruit: RecruitRecord) -> Result<()>;

    /// Atomically claims a recruit for a new session. Refuses recruits whose
    /// flag is already set or whose player already has a placement.
    async fn claim_recruit(&self, id: RecruitId) -> Result<ClaimRecruit>;

    /// Clears the `auction_open` flag. Idempotent.
    async fn release_recruit(&self, id: RecruitId) -> Result<()>;

    /// Creates an `Open` session with no bids and assigns its id.
    async fn create_session(
        &self,
        recruit_id: RecruitId,
        opened_by: u64,
        opened_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<AuctionSession>;

    /// Removes a session document. Only used to roll back a failed open.
    async fn delete_session(&self, id: SessionId) -> Result<()>;

    async fn session(&self, id: SessionId) -> Result<Option<AuctionSession>>;

    /// Sessions still `Open` whose `closes_at` has passed.
    async fn expired_open_sessions(&self, now: DateTime<Utc>) -> Result<Vec<AuctionSession>>;

    /// Recruits whose `auction_open` flag is set but which have no live
    /// session left to finalize.
    async fn orphaned_open_recruits(&self) -> Result<Vec<RecruitRecord>>;

    /// Appends a bid, conditioned on `status = Open` and no existing bid from
    /// the same clan at write time.
    async fn push_bid(&self, session: SessionId, bid: Bid) -> Result<PushBid>;

    /// Removes a clan's bid, conditioned on `status = Open` at write time.
    async fn pull_bid(&self, session: SessionId, clan: &ClanTag) -> Result<PullBid>;

    /// Compare-and-set `status: Open -> Finalizing`. Returns the frozen
    /// session snapshot to at most one caller; every other caller (duplicate
    /// clock delivery, recovery sweep, missing document) gets `None`.
    async fn begin_finalizing(&self, session: SessionId) -> Result<Option<AuctionSession>>;

    /// Transition `Finalizing -> Finalized` and record the outcome.
    async fn finish_session(&self, session: SessionId, outcome: &Outcome) -> Result<()>;

    async fn outcome(&self, session: SessionId) -> Result<Option<Outcome>>;

    /// Check-and-reserve within the single clan document: succeeds only when
    /// `points - reserved_points >= amount`.
    async fn reserve_points(&self, clan: &ClanTag, amount: &BigDecimal) -> Result<ReservePoints>;

    /// Releases a reservation without spending anything.
    async fn release_points(&self, clan: &ClanTag, amount: &BigDecimal) -> Result<()>;

    /// Winner debit: decrements both `points` and `reserved_points`.
    async fn settle_points(&self, clan: &ClanTag, amount: &BigDecimal) -> Result<()>;

    async fn record_placement(&self, placement: Placement) -> Result<()>;
    async fn placement(&self, player: &PlayerTag) -> Result<Option<Placement>>;
}
