//! In-memory [`LedgerStore`] with per-document atomicity.
//!
//! Every mutation runs while holding the dashmap entry lock of the affected
//! document, which gives the same guarantee a document store's compare-and-set
//! and conditional array updates provide: concurrent writers observe each
//! document before or after a mutation, never in between.

use {
    crate::{
        documents::{
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
            SessionStatus,
        },
        store::{ClaimRecruit, LedgerStore, PullBid, PushBid, ReservePoints},
    },
    anyhow::{Context, Result, bail},
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    dashmap::DashMap,
    std::sync::atomic::{AtomicI64, Ordering},
};

#[derive(Default)]
pub struct MemoryLedger {
    clans: DashMap<ClanTag, ClanAccount>,
    recruits: DashMap<RecruitId, RecruitRecord>,
    sessions: DashMap<SessionId, AuctionSession>,
    outcomes: DashMap<SessionId, Outcome>,
    placements: DashMap<PlayerTag, Placement>,
    next_session_id: AtomicI64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            next_session_id: AtomicI64::new(1),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    async fn clan(&self, tag: &ClanTag) -> Result<Option<ClanAccount>> {
        Ok(self.clans.get(tag).map(|clan| clan.clone()))
    }

    async fn upsert_clan(&self, clan: ClanAccount) -> Result<()> {
        self.clans.insert(clan.tag.clone(), clan);
        Ok(())
    }

    async fn recruit(&self, id: RecruitId) -> Result<Option<RecruitRecord>> {
        Ok(self.recruits.get(&id).map(|recruit| recruit.clone()))
    }

    async fn upsert_recruit(&self, recruit: RecruitRecord) -> Result<()> {
        self.recruits.insert(recruit.id, recruit);
        Ok(())
    }

    async fn claim_recruit(&self, id: RecruitId) -> Result<ClaimRecruit> {
        let Some(mut recruit) = self.recruits.get_mut(&id) else {
            return Ok(ClaimRecruit::Missing);
        };
        if self.placements.contains_key(&recruit.player_tag) {
            return Ok(ClaimRecruit::AlreadyPlaced);
        }
        if recruit.auction_open {
            return Ok(ClaimRecruit::AlreadyOpen);
        }
        recruit.auction_open = true;
        Ok(ClaimRecruit::Claimed)
    }

    async fn release_recruit(&self, id: RecruitId) -> Result<()> {
        if let Some(mut recruit) = self.recruits.get_mut(&id) {
            recruit.auction_open = false;
        }
        Ok(())
    }

    async fn create_session(
        &self,
        recruit_id: RecruitId,
        opened_by: u64,
        opened_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<AuctionSession> {
        let session = AuctionSession {
            id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            recruit_id,
            opened_by,
            opened_at,
            closes_at,
            status: SessionStatus::Open,
            bids: Vec::new(),
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        self.sessions.remove(&id);
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<AuctionSession>> {
        Ok(self.sessions.get(&id).map(|session| session.clone()))
    }

    async fn expired_open_sessions(&self, now: DateTime<Utc>) -> Result<Vec<AuctionSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|session| session.is_expired(now))
            .map(|session| session.clone())
            .collect())
    }

    async fn orphaned_open_recruits(&self) -> Result<Vec<RecruitRecord>> {
        Ok(self
            .recruits
            .iter()
            .filter(|recruit| {
                recruit.auction_open
                    && !self.sessions.iter().any(|session| {
                        session.recruit_id == recruit.id
                            && session.status != SessionStatus::Finalized
                    })
            })
            .map(|recruit| recruit.clone())
            .collect())
    }

    async fn push_bid(&self, session: SessionId, bid: Bid) -> Result<PushBid> {
        let Some(mut session) = self.sessions.get_mut(&session) else {
            return Ok(PushBid::Missing);
        };
        if session.status != SessionStatus::Open {
            return Ok(PushBid::Closed);
        }
        if session.bid_of(&bid.clan_tag).is_some() {
            return Ok(PushBid::Duplicate);
        }
        session.bids.push(bid);
        Ok(PushBid::Pushed)
    }

    async fn pull_bid(&self, session: SessionId, clan: &ClanTag) -> Result<PullBid> {
        let Some(mut session) = self.sessions.get_mut(&session) else {
            return Ok(PullBid::Missing);
        };
        if session.status != SessionStatus::Open {
            return Ok(PullBid::Closed);
        }
        let Some(index) = session.bids.iter().position(|bid| &bid.clan_tag == clan) else {
            return Ok(PullBid::NoBid);
        };
        Ok(PullBid::Pulled(session.bids.remove(index)))
    }

    async fn begin_finalizing(&self, session: SessionId) -> Result<Option<AuctionSession>> {
        let Some(mut session) = self.sessions.get_mut(&session) else {
            return Ok(None);
        };
        if session.status != SessionStatus::Open {
            return Ok(None);
        }
        session.status = SessionStatus::Finalizing;
        Ok(Some(session.clone()))
    }

    async fn finish_session(&self, session: SessionId, outcome: &Outcome) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(&session)
            .context("finishing a missing session")?;
        if session.status != SessionStatus::Finalizing {
            bail!("finishing session {} in state {:?}", session.id, session.status);
        }
        session.status = SessionStatus::Finalized;
        self.outcomes.insert(session.id, outcome.clone());
        Ok(())
    }

    async fn outcome(&self, session: SessionId) -> Result<Option<Outcome>> {
        Ok(self.outcomes.get(&session).map(|outcome| outcome.clone()))
    }

    async fn reserve_points(&self, clan: &ClanTag, amount: &BigDecimal) -> Result<ReservePoints> {
        let Some(mut clan) = self.clans.get_mut(clan) else {
            return Ok(ReservePoints::Missing);
        };
        let available = clan.available();
        if available < *amount {
            return Ok(ReservePoints::Insufficient { available });
        }
        let reserved = &clan.reserved_points + amount;
        clan.reserved_points = reserved;
        Ok(ReservePoints::Reserved)
    }

    async fn release_points(&self, clan: &ClanTag, amount: &BigDecimal) -> Result<()> {
        let mut clan = self
            .clans
            .get_mut(clan)
            .context("releasing points of a missing clan")?;
        let reserved = &clan.reserved_points - amount;
        clan.reserved_points = reserved;
        Ok(())
    }

    async fn settle_points(&self, clan: &ClanTag, amount: &BigDecimal) -> Result<()> {
        let mut clan = self
            .clans
            .get_mut(clan)
            .context("settling points of a missing clan")?;
        let points = &clan.points - amount;
        let reserved = &clan.reserved_points - amount;
        clan.points = points;
        clan.reserved_points = reserved;
        Ok(())
    }

    async fn record_placement(&self, placement: Placement) -> Result<()> {
        self.placements
            .insert(placement.player_tag.clone(), placement);
        Ok(())
    }

    async fn placement(&self, player: &PlayerTag) -> Result<Option<Placement>> {
        Ok(self.placements.get(player).map(|placement| placement.clone()))
    }
}
