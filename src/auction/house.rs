/// Auction lifecycle: create, read, cancel, and close (settlement).
/// Each auction sits behind its own mutex; bids, buyouts, cancel and close
/// for one auction are serialized on it, different auctions run in parallel.
// region:    --- Imports
use super::model::{
    Auction, AuctionStatus, Bid, NewAuction, Settlement, SettlementOutcome, Termination,
};
use crate::clock::Clock;
use crate::error::{EconomyError, Result};
use crate::guild::{is_owner, require_owner, GuildDirectory};
use crate::ledger::{DkpLedger, LedgerError, MAX_AMOUNT};
use crate::{AuctionId, GuildId, MemberId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Entries
pub(crate) struct AuctionEntry {
    pub auction: Auction,
    /// Append-only, in acceptance order.
    pub bids: Vec<Bid>,
}

pub(crate) type AuctionSlot = Arc<Mutex<AuctionEntry>>;
// endregion: --- Entries

// region:    --- Read Model
#[derive(Debug, Clone, Serialize)]
pub struct AuctionSummary {
    pub id: AuctionId,
    pub guild_id: GuildId,
    pub item_name: String,
    pub description: String,
    pub starting_price: i64,
    pub buyout_price: Option<i64>,
    pub current_bid: i64,
    pub minimum_bid: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub creator_id: MemberId,
    pub current_winner_id: Option<MemberId>,
    pub total_bids: usize,
    pub can_bid: bool,
    pub can_buyout: bool,
    pub time_remaining_secs: Option<i64>,
    pub is_owner: bool,
    pub is_current_winner: bool,
    pub user_highest_bid: Option<i64>,
    pub winner: Option<MemberId>,
    pub final_price: Option<i64>,
    pub settlement: Option<SettlementOutcome>,
    pub created_at: DateTime<Utc>,
}
// endregion: --- Read Model

// region:    --- Auction House
pub struct AuctionHouse {
    auctions: RwLock<HashMap<AuctionId, AuctionSlot>>,
    next_id: AtomicI64,
    directory: Arc<dyn GuildDirectory>,
    ledger: Arc<dyn DkpLedger>,
    clock: Arc<dyn Clock>,
}

impl AuctionHouse {
    pub fn new(
        directory: Arc<dyn GuildDirectory>,
        ledger: Arc<dyn DkpLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auctions: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            directory,
            ledger,
            clock,
        }
    }

    /// Owner-only.
    pub async fn create(
        &self,
        owner: MemberId,
        guild: GuildId,
        fields: NewAuction,
    ) -> Result<Auction> {
        require_owner(self.directory.as_ref(), guild, owner).await?;

        let item_name = fields.item_name.trim().to_string();
        if item_name.is_empty() {
            return Err(EconomyError::InvalidField {
                field: "item_name",
                reason: "must not be empty",
            });
        }
        if fields.starting_price < 1 {
            return Err(EconomyError::InvalidPrices("starting_price must be at least 1"));
        }
        if fields.starting_price > MAX_AMOUNT
            || matches!(fields.buyout_price, Some(buyout) if buyout > MAX_AMOUNT)
        {
            return Err(EconomyError::InvalidPrices("prices must not exceed 10^12"));
        }
        if matches!(fields.buyout_price, Some(buyout) if buyout <= fields.starting_price) {
            return Err(EconomyError::InvalidPrices(
                "buyout_price must exceed starting_price",
            ));
        }
        if fields.end_time <= fields.start_time {
            return Err(EconomyError::InvalidRange);
        }

        let auction = Auction {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            guild_id: guild,
            item_name,
            description: fields.description.unwrap_or_default(),
            starting_price: fields.starting_price,
            buyout_price: fields.buyout_price,
            start_time: fields.start_time,
            end_time: fields.end_time,
            creator_id: owner,
            current_bid: fields.starting_price,
            current_winner_id: None,
            created_at: self.clock.now(),
            termination: None,
            settlement: None,
        };
        {
            let mut auctions = self.auctions.write().unwrap_or_else(|e| e.into_inner());
            auctions.insert(
                auction.id,
                Arc::new(Mutex::new(AuctionEntry {
                    auction: auction.clone(),
                    bids: Vec::new(),
                })),
            );
        }

        info!(
            "{:<12} --> created auction id={} guild={} start_price={} buyout={:?}",
            "Auction", auction.id, guild, auction.starting_price, auction.buyout_price
        );
        Ok(auction)
    }

    pub fn status(&self, auction: &Auction) -> AuctionStatus {
        auction.status(self.clock.now())
    }

    pub async fn get(&self, id: AuctionId) -> Result<Auction> {
        let slot = self.slot(id)?;
        let mut entry = slot.lock().await;
        self.settle_quietly(&mut entry).await;
        Ok(entry.auction.clone())
    }

    pub async fn summary(&self, id: AuctionId, viewer: MemberId) -> Result<AuctionSummary> {
        let slot = self.slot(id)?;
        let mut entry = slot.lock().await;
        self.settle_quietly(&mut entry).await;
        let viewer_is_owner =
            is_owner(self.directory.as_ref(), entry.auction.guild_id, viewer).await;
        Ok(self.summarize(&entry, viewer, viewer_is_owner))
    }

    /// Auctions of a guild, newest first.
    pub async fn list(&self, guild: GuildId, viewer: MemberId) -> Vec<AuctionSummary> {
        let viewer_is_owner = is_owner(self.directory.as_ref(), guild, viewer).await;
        let mut summaries = Vec::new();
        for slot in self.slots() {
            let mut entry = slot.lock().await;
            if entry.auction.guild_id != guild {
                continue;
            }
            self.settle_quietly(&mut entry).await;
            summaries.push(self.summarize(&entry, viewer, viewer_is_owner));
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        summaries
    }

    /// Accepted bids in order.
    pub async fn bids(&self, id: AuctionId) -> Result<Vec<Bid>> {
        let slot = self.slot(id)?;
        let entry = slot.lock().await;
        Ok(entry.bids.clone())
    }

    /// Owner-only, not once the auction has ended. Open bids were never debited,
    /// so nothing is refunded.
    pub async fn cancel(&self, id: AuctionId, requester: MemberId) -> Result<Auction> {
        let slot = self.slot(id)?;
        let mut entry = slot.lock().await;
        require_owner(self.directory.as_ref(), entry.auction.guild_id, requester).await?;

        let now = self.clock.now();
        match entry.auction.status(now) {
            AuctionStatus::Ended => {
                self.settle_quietly(&mut entry).await;
                return Err(EconomyError::AlreadyEnded);
            }
            AuctionStatus::Cancelled => return Err(EconomyError::AlreadyCancelled),
            AuctionStatus::Upcoming | AuctionStatus::Active => {}
        }
        entry.auction.termination = Some(Termination::Cancelled { by: requester, at: now });

        info!(
            "{:<12} --> cancelled auction id={} by={} (open bids: {})",
            "Auction",
            id,
            requester,
            entry.bids.len()
        );
        Ok(entry.auction.clone())
    }

    /// Closes every auction whose end time has passed. Returns how many closed.
    pub async fn settle_due(&self) -> usize {
        let mut settled = 0;
        for slot in self.slots() {
            let mut entry = slot.lock().await;
            if !entry.auction.is_due_for_settlement(self.clock.now()) {
                continue;
            }
            match self.settle(&mut entry).await {
                Ok(true) => settled += 1,
                Ok(false) => {}
                Err(e) => error!(
                    "{:<12} --> settlement of auction {} deferred: {}",
                    "Auction", entry.auction.id, e
                ),
            }
        }
        settled
    }

    pub(crate) fn slot(&self, id: AuctionId) -> Result<AuctionSlot> {
        let auctions = self.auctions.read().unwrap_or_else(|e| e.into_inner());
        auctions
            .get(&id)
            .cloned()
            .ok_or(EconomyError::AuctionNotFound(id))
    }

    fn slots(&self) -> Vec<AuctionSlot> {
        let auctions = self.auctions.read().unwrap_or_else(|e| e.into_inner());
        auctions.values().cloned().collect()
    }

    /// Close a time-ended auction: debit the highest bidder once.
    /// Caller holds the auction lock. `Ok(false)` when nothing was due.
    /// A ledger outage leaves the auction unsettled for a later attempt.
    pub(crate) async fn settle(&self, entry: &mut AuctionEntry) -> Result<bool> {
        let now = self.clock.now();
        if !entry.auction.is_due_for_settlement(now) {
            return Ok(false);
        }
        let auction = &mut entry.auction;

        let outcome = match auction.current_winner_id {
            None => SettlementOutcome::NoWinner,
            Some(winner) => {
                let reason = format!("auction:{}", auction.id);
                match self.ledger.debit(winner, auction.current_bid, &reason).await {
                    Ok(_) => SettlementOutcome::Paid,
                    Err(LedgerError::InsufficientFunds { balance, required }) => {
                        warn!(
                            "{:<12} --> auction {} winner {} defaulted (balance {}, price {})",
                            "Auction", auction.id, winner, balance, required
                        );
                        SettlementOutcome::Defaulted
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        auction.settlement = Some(Settlement {
            outcome,
            winner: auction.current_winner_id,
            price: auction.current_winner_id.map(|_| auction.current_bid),
            settled_at: now,
        });
        info!(
            "{:<12} --> closed auction id={} outcome={:?} winner={:?} price={}",
            "Auction", auction.id, outcome, auction.current_winner_id, auction.current_bid
        );
        Ok(true)
    }

    /// Settlement on read paths: failures are logged, the read still succeeds.
    pub(crate) async fn settle_quietly(&self, entry: &mut AuctionEntry) {
        if let Err(e) = self.settle(entry).await {
            error!(
                "{:<12} --> settlement of auction {} deferred: {}",
                "Auction", entry.auction.id, e
            );
        }
    }

    fn summarize(
        &self,
        entry: &AuctionEntry,
        viewer: MemberId,
        viewer_is_owner: bool,
    ) -> AuctionSummary {
        let now = self.clock.now();
        let auction = &entry.auction;
        let status = auction.status(now);
        let active = status == AuctionStatus::Active;
        // winner and price are reported only once the item is paid for
        let paid = auction
            .settlement
            .as_ref()
            .filter(|settlement| settlement.outcome == SettlementOutcome::Paid);

        AuctionSummary {
            id: auction.id,
            guild_id: auction.guild_id,
            item_name: auction.item_name.clone(),
            description: auction.description.clone(),
            starting_price: auction.starting_price,
            buyout_price: auction.buyout_price,
            current_bid: auction.current_bid,
            minimum_bid: auction.minimum_bid(),
            start_time: auction.start_time,
            end_time: auction.end_time,
            status,
            creator_id: auction.creator_id,
            current_winner_id: auction.current_winner_id,
            total_bids: entry.bids.len(),
            can_bid: active,
            can_buyout: active && auction.buyout_price.is_some(),
            time_remaining_secs: active.then(|| (auction.end_time - now).num_seconds()),
            is_owner: viewer_is_owner,
            is_current_winner: auction.current_winner_id == Some(viewer),
            user_highest_bid: entry
                .bids
                .iter()
                .filter(|bid| bid.member_id == viewer)
                .map(|bid| bid.amount)
                .max(),
            winner: paid.and_then(|settlement| settlement.winner),
            final_price: paid.and_then(|settlement| settlement.price),
            settlement: auction.settlement.as_ref().map(|s| s.outcome),
            created_at: auction.created_at,
        }
    }
}
// endregion: --- Auction House
