use crate::{AuctionId, GuildId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Auction model
#[derive(Debug, Clone, Serialize)]
pub struct Auction {
    pub id: AuctionId,
    pub guild_id: GuildId,
    pub item_name: String,
    pub description: String,
    pub starting_price: i64,
    pub buyout_price: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub creator_id: MemberId,
    /// Equals `starting_price` until the first accepted bid.
    pub current_bid: i64,
    pub current_winner_id: Option<MemberId>,
    pub created_at: DateTime<Utc>,
    /// Sticky: overrides the time-derived status.
    pub termination: Option<Termination>,
    pub settlement: Option<Settlement>,
}

impl Auction {
    pub fn status(&self, now: DateTime<Utc>) -> AuctionStatus {
        match self.termination {
            Some(Termination::Cancelled { .. }) => AuctionStatus::Cancelled,
            Some(Termination::BoughtOut { .. }) => AuctionStatus::Ended,
            None if now < self.start_time => AuctionStatus::Upcoming,
            None if now < self.end_time => AuctionStatus::Active,
            None => AuctionStatus::Ended,
        }
    }

    /// The server-side minimum; anything lower is `BidTooLow`.
    pub fn minimum_bid(&self) -> i64 {
        self.current_bid.saturating_add(1)
    }

    /// Ended by time, not yet closed.
    pub fn is_due_for_settlement(&self, now: DateTime<Utc>) -> bool {
        self.termination.is_none() && self.settlement.is_none() && now >= self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Upcoming,
    Active,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Termination {
    Cancelled {
        by: MemberId,
        at: DateTime<Utc>,
    },
    BoughtOut {
        buyer: MemberId,
        price: i64,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    NoWinner,
    Paid,
    /// The winner could no longer cover the price at close.
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub outcome: SettlementOutcome,
    pub winner: Option<MemberId>,
    pub price: Option<i64>,
    pub settled_at: DateTime<Utc>,
}

// Bid model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bid {
    pub auction_id: AuctionId,
    pub member_id: MemberId,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
    /// Final entry written by a buyout.
    pub buyout: bool,
}

// Create auction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    pub item_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub starting_price: i64,
    #[serde(default)]
    pub buyout_price: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
