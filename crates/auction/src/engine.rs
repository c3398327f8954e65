//! Auction session lifecycle and bid handling.

use {
    crate::{Error, Result, clock, config::Config, finalize, notify::Notifier},
    anyhow::Context,
    bigdecimal::{BigDecimal, Zero},
    chrono::Utc,
    ledger::{
        documents::{
            AuctionSession,
            Bid,
            ClanTag,
            Outcome,
            Placement,
            RecruitId,
            SessionId,
            SessionStatus,
        },
        store::{ClaimRecruit, LedgerStore, PullBid, PushBid, ReservePoints},
    },
    std::sync::Arc,
};

/// Stateless auction worker over a shared [`LedgerStore`].
///
/// Cheap to clone; any number of clones may serve requests and clock fires
/// concurrently. Correctness comes from the store's conditional writes, not
/// from anything held here.
#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: Config,
}

impl Engine {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>, config: Config) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Opens a bidding session for a recruit and arms the auction clock.
    ///
    /// The recruit claim is a compare-and-set; everything after it rolls the
    /// claim back on failure so a recruit is never left locked without a
    /// session.
    pub async fn open_auction(
        &self,
        recruit_id: RecruitId,
        opened_by: u64,
    ) -> Result<AuctionSession> {
        match self.store.claim_recruit(recruit_id).await? {
            ClaimRecruit::Claimed => {}
            ClaimRecruit::AlreadyOpen => return Err(Error::AlreadyActive),
            ClaimRecruit::AlreadyPlaced => return Err(Error::AlreadyPlaced),
            ClaimRecruit::Missing => return Err(Error::NotFound("recruit")),
        }

        match self.create_session(recruit_id, opened_by).await {
            Ok(session) => {
                metrics().sessions_opened.inc();
                tracing::info!(
                    session = session.id,
                    recruit = recruit_id,
                    closes_at = %session.closes_at,
                    "auction opened"
                );
                clock::schedule(self.clone(), session.id, session.closes_at);
                Ok(session)
            }
            Err(err) => {
                if let Err(release_err) = self.store.release_recruit(recruit_id).await {
                    tracing::error!(
                        recruit = recruit_id,
                        ?release_err,
                        "failed to roll back recruit claim"
                    );
                }
                Err(err)
            }
        }
    }

    async fn create_session(&self, recruit_id: RecruitId, opened_by: u64) -> Result<AuctionSession> {
        let recruit = self
            .store
            .recruit(recruit_id)
            .await?
            .ok_or(Error::NotFound("recruit"))?;
        let opened_at = Utc::now();
        let closes_at = opened_at
            + chrono::Duration::from_std(self.config.auction_duration)
                .context("auction duration out of range")?;

        let session = self
            .store
            .create_session(recruit_id, opened_by, opened_at, closes_at)
            .await?;

        if let Err(err) = self.notifier.session_opened(&session, &recruit).await {
            self.store.delete_session(session.id).await?;
            return Err(Error::Storage(err.context("failed to announce session")));
        }
        Ok(session)
    }

    /// Places a clan's bid in an open session, reserving the points.
    pub async fn place_bid(
        &self,
        session_id: SessionId,
        clan_tag: ClanTag,
        amount: BigDecimal,
        placed_by: u64,
    ) -> Result<Bid> {
        if !self.config.is_valid_amount(&amount) {
            metrics().bids.with_label_values(&["invalid_amount"]).inc();
            return Err(Error::InvalidAmount {
                increment: self.config.bid_increment.clone(),
            });
        }

        // Best-effort preflight so most rejections never touch the clan
        // document. The writes below re-check under the document locks.
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(Error::NotFound("session"))?;
        if session.status != SessionStatus::Open {
            metrics().bids.with_label_values(&["too_late"]).inc();
            return Err(Error::SessionClosed);
        }
        if session.bid_of(&clan_tag).is_some() {
            return Err(Error::DuplicateBid);
        }

        match self.store.reserve_points(&clan_tag, &amount).await? {
            ReservePoints::Reserved => {}
            ReservePoints::Insufficient { available } => {
                metrics().bids.with_label_values(&["insufficient"]).inc();
                return Err(Error::InsufficientPoints {
                    available,
                    required: amount,
                });
            }
            ReservePoints::Missing => return Err(Error::NotFound("clan")),
        }

        let bid = Bid {
            clan_tag: clan_tag.clone(),
            amount: amount.clone(),
            placed_by,
            placed_at: Utc::now(),
        };
        // The append is conditioned on `status = Open` at write time; a
        // reservation whose bid did not land must not stick around.
        match self.store.push_bid(session_id, bid.clone()).await {
            Ok(PushBid::Pushed) => {
                metrics().bids.with_label_values(&["placed"]).inc();
                tracing::info!(
                    session = session_id,
                    clan = %clan_tag,
                    amount = %amount,
                    "bid placed"
                );
                Ok(bid)
            }
            Ok(PushBid::Duplicate) => {
                self.unreserve(&clan_tag, &amount).await;
                Err(Error::DuplicateBid)
            }
            Ok(PushBid::Closed) => {
                self.unreserve(&clan_tag, &amount).await;
                metrics().bids.with_label_values(&["too_late"]).inc();
                Err(Error::SessionClosed)
            }
            Ok(PushBid::Missing) => {
                self.unreserve(&clan_tag, &amount).await;
                Err(Error::NotFound("session"))
            }
            Err(err) => {
                self.unreserve(&clan_tag, &amount).await;
                Err(err.into())
            }
        }
    }

    async fn unreserve(&self, clan: &ClanTag, amount: &BigDecimal) {
        if let Err(err) = self.store.release_points(clan, amount).await {
            tracing::error!(clan = %clan, %amount, ?err, "failed to roll back reservation");
        }
    }

    /// Retracts a clan's bid and releases the reserved points.
    pub async fn remove_bid(
        &self,
        session_id: SessionId,
        clan_tag: &ClanTag,
        actor: u64,
    ) -> Result<Bid> {
        match self.store.pull_bid(session_id, clan_tag).await? {
            PullBid::Pulled(bid) => {
                self.store.release_points(clan_tag, &bid.amount).await?;
                tracing::info!(
                    session = session_id,
                    clan = %clan_tag,
                    amount = %bid.amount,
                    actor,
                    "bid retracted"
                );
                Ok(bid)
            }
            PullBid::NoBid => Err(Error::NotFound("bid")),
            PullBid::Closed => Err(Error::SessionClosed),
            PullBid::Missing => Err(Error::NotFound("session")),
        }
    }

    /// Points a clan can still commit to new bids.
    pub async fn available_points(&self, clan_tag: &ClanTag) -> Result<BigDecimal> {
        let clan = self
            .store
            .clan(clan_tag)
            .await?
            .ok_or(Error::NotFound("clan"))?;
        Ok(clan.available())
    }

    /// Fire handler for the auction clock. Safe to invoke any number of
    /// times and from any worker; only the caller that wins the
    /// `Open -> Finalizing` compare-and-set applies the ledger effects and
    /// emits the outcome.
    pub async fn finalize(&self, session_id: SessionId) -> Result<Option<Outcome>> {
        let Some(session) = self.store.begin_finalizing(session_id).await? else {
            if self.store.session(session_id).await?.is_none() {
                tracing::error!(session = session_id, "clock fired for a missing session");
            } else {
                tracing::debug!(session = session_id, "session already claimed for finalization");
            }
            return Ok(None);
        };

        let decision = finalize::decide(&session.bids, &mut rand::thread_rng());
        let outcome = self.apply(&session, decision).await?;

        let label = match &outcome.winner_clan_tag {
            Some(_) if outcome.amount.is_zero() => "uncontested",
            Some(_) => "won",
            None => "no_bids",
        };
        metrics().finalizations.with_label_values(&[label]).inc();

        if let Err(err) = self.notifier.outcome(&outcome).await {
            // The ledger is already consistent; delivery is best-effort.
            tracing::warn!(session = session_id, ?err, "failed to deliver outcome");
        }
        Ok(Some(outcome))
    }

    /// Applies the decision to the ledger and closes the session out.
    async fn apply(&self, session: &AuctionSession, decision: finalize::Decision) -> Result<Outcome> {
        let finalized_at = Utc::now();
        let outcome = match &decision.winner {
            Some(winner) if decision.contested => {
                self.store
                    .settle_points(&winner.clan_tag, &winner.amount)
                    .await?;
                Outcome {
                    session_id: session.id,
                    winner_clan_tag: Some(winner.clan_tag.clone()),
                    amount: winner.amount.clone(),
                    was_tie: decision.was_tie,
                    finalized_at,
                }
            }
            Some(winner) => {
                // Uncontested: the sole bidder wins without being charged.
                self.store
                    .release_points(&winner.clan_tag, &winner.amount)
                    .await?;
                Outcome {
                    session_id: session.id,
                    winner_clan_tag: Some(winner.clan_tag.clone()),
                    amount: BigDecimal::zero(),
                    was_tie: false,
                    finalized_at,
                }
            }
            None => Outcome::no_winner(session.id, finalized_at),
        };

        // Every losing bidder gets their full reservation back.
        for bid in &session.bids {
            if Some(&bid.clan_tag) == outcome.winner_clan_tag.as_ref() {
                continue;
            }
            self.store.release_points(&bid.clan_tag, &bid.amount).await?;
        }

        if let Some(winner) = &outcome.winner_clan_tag {
            if let Some(recruit) = self.store.recruit(session.recruit_id).await? {
                self.store
                    .record_placement(Placement {
                        player_tag: recruit.player_tag,
                        clan_tag: winner.clone(),
                        finalized_at,
                    })
                    .await?;
            }
        }

        self.store.release_recruit(session.recruit_id).await?;
        self.store.finish_session(session.id, &outcome).await?;
        tracing::info!(
            session = session.id,
            winner = ?outcome.winner_clan_tag,
            amount = %outcome.amount,
            was_tie = outcome.was_tie,
            "auction finalized"
        );
        Ok(outcome)
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "auction")]
struct Metrics {
    /// Total number of sessions opened.
    sessions_opened: prometheus::IntCounter,

    /// Bid placement attempts by result.
    #[metric(labels("result"))]
    bids: prometheus::IntCounterVec,

    /// Finalized sessions by outcome.
    #[metric(labels("outcome"))]
    finalizations: prometheus::IntCounterVec,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(prometheus_metric_storage::default_storage_registry()).unwrap()
}
