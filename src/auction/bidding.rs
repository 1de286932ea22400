/// Bid acceptance.
/// 1. auction must be active
/// 2. amount must exceed the current bid
/// 3. bidder's balance must cover the amount (checked, not debited)
/// A bid at or above the buyout price resolves as a buyout.
// region:    --- Imports
use super::buyout::{execute_buyout, BuyoutReceipt};
use super::house::AuctionHouse;
use super::model::{AuctionStatus, Bid};
use crate::clock::Clock;
use crate::error::{EconomyError, Result};
use crate::guild::{require_member, GuildDirectory};
use crate::ledger::{DkpLedger, MAX_AMOUNT};
use crate::{AuctionId, MemberId};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
// endregion: --- Imports

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BidOutcome {
    Accepted {
        current_bid: i64,
        minimum_next_bid: i64,
    },
    BoughtOut(BuyoutReceipt),
}

pub struct BidLedger {
    house: Arc<AuctionHouse>,
    ledger: Arc<dyn DkpLedger>,
    directory: Arc<dyn GuildDirectory>,
    clock: Arc<dyn Clock>,
}

impl BidLedger {
    pub fn new(
        house: Arc<AuctionHouse>,
        ledger: Arc<dyn DkpLedger>,
        directory: Arc<dyn GuildDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            house,
            ledger,
            directory,
            clock,
        }
    }

    /// The whole read-check-write runs under the auction lock, so bids on one
    /// auction are totally ordered.
    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        member: MemberId,
        amount: i64,
    ) -> Result<BidOutcome> {
        if amount > MAX_AMOUNT {
            return Err(EconomyError::InvalidField {
                field: "bid_amount",
                reason: "is too large",
            });
        }
        let slot = self.house.slot(auction_id)?;
        let mut entry = slot.lock().await;
        require_member(self.directory.as_ref(), entry.auction.guild_id, member).await?;

        let now = self.clock.now();
        if entry.auction.status(now) != AuctionStatus::Active {
            self.house.settle_quietly(&mut entry).await;
            info!(
                "{:<12} --> bid rejected auction={} member={}: not active",
                "Bidding", auction_id, member
            );
            return Err(EconomyError::NotActive);
        }

        let current_bid = entry.auction.current_bid;
        if amount <= current_bid {
            info!(
                "{:<12} --> bid rejected auction={} member={}: {} <= {}",
                "Bidding", auction_id, member, amount, current_bid
            );
            return Err(EconomyError::BidTooLow {
                current_bid,
                minimum_bid: entry.auction.minimum_bid(),
            });
        }

        if let Some(buyout_price) = entry.auction.buyout_price {
            if amount >= buyout_price {
                info!(
                    "{:<12} --> bid {} reaches buyout price {} on auction={}",
                    "Bidding", amount, buyout_price, auction_id
                );
                let receipt =
                    execute_buyout(self.ledger.as_ref(), &mut entry, member, buyout_price, now)
                        .await?;
                return Ok(BidOutcome::BoughtOut(receipt));
            }
        }

        let balance = self.ledger.balance(member).await?;
        if balance < amount {
            info!(
                "{:<12} --> bid rejected auction={} member={}: balance {} < {}",
                "Bidding", auction_id, member, balance, amount
            );
            return Err(EconomyError::InsufficientFunds { required: amount });
        }

        entry.bids.push(Bid {
            auction_id,
            member_id: member,
            amount,
            placed_at: now,
            buyout: false,
        });
        entry.auction.current_bid = amount;
        entry.auction.current_winner_id = Some(member);

        info!(
            "{:<12} --> bid accepted auction={} member={} amount={}",
            "Bidding", auction_id, member, amount
        );
        Ok(BidOutcome::Accepted {
            current_bid: amount,
            minimum_next_bid: entry.auction.minimum_bid(),
        })
    }
}
