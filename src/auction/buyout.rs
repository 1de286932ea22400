/// Immediate purchase at the buyout price, ending an active auction.
// region:    --- Imports
use super::house::{AuctionEntry, AuctionHouse};
use super::model::{AuctionStatus, Bid, Settlement, SettlementOutcome, Termination};
use crate::clock::Clock;
use crate::error::{EconomyError, Result};
use crate::guild::{require_member, GuildDirectory};
use crate::ledger::DkpLedger;
use crate::{AuctionId, MemberId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
// endregion: --- Imports

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyoutReceipt {
    pub final_price: i64,
    pub total_dkp: i64,
}

pub struct BuyoutResolver {
    house: Arc<AuctionHouse>,
    ledger: Arc<dyn DkpLedger>,
    directory: Arc<dyn GuildDirectory>,
    clock: Arc<dyn Clock>,
}

impl BuyoutResolver {
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

    pub async fn buyout(&self, auction_id: AuctionId, member: MemberId) -> Result<BuyoutReceipt> {
        let slot = self.house.slot(auction_id)?;
        let mut entry = slot.lock().await;
        require_member(self.directory.as_ref(), entry.auction.guild_id, member).await?;

        let Some(price) = entry.auction.buyout_price else {
            return Err(EconomyError::NoBuyoutOption);
        };
        let now = self.clock.now();
        if entry.auction.status(now) != AuctionStatus::Active {
            self.house.settle_quietly(&mut entry).await;
            info!(
                "{:<12} --> buyout rejected auction={} member={}: not active",
                "Buyout", auction_id, member
            );
            return Err(EconomyError::NotActive);
        }

        execute_buyout(self.ledger.as_ref(), &mut entry, member, price, now).await
    }
}

/// Check funds, debit, then end the auction with `member` as winner.
/// Caller holds the auction lock and has checked the auction is active.
pub(crate) async fn execute_buyout(
    ledger: &dyn DkpLedger,
    entry: &mut AuctionEntry,
    member: MemberId,
    price: i64,
    now: DateTime<Utc>,
) -> Result<BuyoutReceipt> {
    let auction_id = entry.auction.id;
    let balance = ledger.balance(member).await?;
    if balance < price {
        info!(
            "{:<12} --> buyout rejected auction={} member={}: balance {} < {}",
            "Buyout", auction_id, member, balance, price
        );
        return Err(EconomyError::InsufficientFunds { required: price });
    }

    let total_dkp = ledger
        .debit(member, price, &format!("auction:{}", auction_id))
        .await?;

    let auction = &mut entry.auction;
    auction.termination = Some(Termination::BoughtOut {
        buyer: member,
        price,
        at: now,
    });
    auction.current_bid = price;
    auction.current_winner_id = Some(member);
    auction.settlement = Some(Settlement {
        outcome: SettlementOutcome::Paid,
        winner: Some(member),
        price: Some(price),
        settled_at: now,
    });
    entry.bids.push(Bid {
        auction_id,
        member_id: member,
        amount: price,
        placed_at: now,
        buyout: true,
    });

    info!(
        "{:<12} --> bought out auction={} member={} price={}",
        "Buyout", auction_id, member, price
    );
    Ok(BuyoutReceipt {
        final_price: price,
        total_dkp,
    })
}
