//! Persisted document shapes.

use {
    bigdecimal::{BigDecimal, Zero},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

pub type SessionId = i64;
pub type RecruitId = i64;

/// Unique identifier of a clan account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClanTag(pub String);

impl ClanTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for ClanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-game tag of the candidate a recruit record refers to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerTag(pub String);

impl PlayerTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for PlayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A clan's point balance.
///
/// `reserved_points` tracks points committed against open bids. Only
/// `available()` may back new bids; `reserved_points <= points` holds at all
/// times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClanAccount {
    pub tag: ClanTag,
    pub points: BigDecimal,
    pub reserved_points: BigDecimal,
}

impl ClanAccount {
    pub fn new(tag: ClanTag, points: BigDecimal) -> Self {
        Self {
            tag,
            points,
            reserved_points: BigDecimal::zero(),
        }
    }

    pub fn available(&self) -> BigDecimal {
        &self.points - &self.reserved_points
    }
}

/// A candidate clans can bid on.
///
/// `auction_open` flips false -> true only through the store's compare-and-set
/// and back exactly once per session, by the finalizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecruitRecord {
    pub id: RecruitId,
    pub player_tag: PlayerTag,
    pub th_level: u8,
    pub requester_discord_id: u64,
    pub notification_channel: u64,
    pub auction_open: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Finalizing,
    Finalized,
}

/// A single clan's sealed bid within a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub clan_tag: ClanTag,
    pub amount: BigDecimal,
    pub placed_by: u64,
    pub placed_at: DateTime<Utc>,
}

/// One time-boxed bidding round for a single recruit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuctionSession {
    pub id: SessionId,
    pub recruit_id: RecruitId,
    pub opened_by: u64,
    pub opened_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub bids: Vec<Bid>,
}

impl AuctionSession {
    pub fn bid_of(&self, clan: &ClanTag) -> Option<&Bid> {
        self.bids.iter().find(|bid| &bid.clan_tag == clan)
    }

    /// Whether the session outlived its window without being finalized.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Open && self.closes_at <= now
    }
}

/// The final result of a session.
///
/// `amount` is what the winner was charged: 0 when nobody won and 0 for an
/// uncontested single bidder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub session_id: SessionId,
    pub winner_clan_tag: Option<ClanTag>,
    pub amount: BigDecimal,
    pub was_tie: bool,
    pub finalized_at: DateTime<Utc>,
}

impl Outcome {
    pub fn no_winner(session_id: SessionId, finalized_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            winner_clan_tag: None,
            amount: BigDecimal::zero(),
            was_tie: false,
            finalized_at,
        }
    }
}

/// Recorded when a session finalizes with a winner; blocks re-auctioning the
/// same player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub player_tag: PlayerTag,
    pub clan_tag: ClanTag,
    pub finalized_at: DateTime<Utc>,
}
