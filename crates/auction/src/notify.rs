//! Outbound boundary to the presentation layer.

use {
    anyhow::Result,
    ledger::documents::{AuctionSession, Outcome, RecruitRecord},
};

/// Delivers human-readable auction events.
///
/// The engine invokes `outcome` exactly once per session, after the ledger is
/// already consistent; a failed delivery is logged and never retried, so an
/// implementation must not rely on redelivery.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// A session began accepting bids.
    async fn session_opened(
        &self,
        session: &AuctionSession,
        recruit: &RecruitRecord,
    ) -> Result<()>;

    /// The final result of a session.
    async fn outcome(&self, outcome: &Outcome) -> Result<()>;

    /// A recruit was left locked with no session to finalize; the recovery
    /// sweep cleared the flag and reports the anomaly instead of dropping it.
    async fn unable_to_finalize(&self, recruit: &RecruitRecord) -> Result<()>;
}
