/// Auction settlement scheduler
/// Auction status is derived from the clock on every read, so this task is not
/// needed for correct status. It closes auctions whose end time has passed
/// even when nobody looks at them, debiting the winner.
// region:    --- Imports
use crate::auction::AuctionHouse;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Settlement Scheduler
pub struct SettlementScheduler {
    auctions: Arc<AuctionHouse>,
    period: Duration,
}

impl SettlementScheduler {
    pub fn new(auctions: Arc<AuctionHouse>, period: Duration) -> Self {
        Self { auctions, period }
    }

    /// Start the sweep loop
    pub fn start(&self) -> JoinHandle<()> {
        let auctions = Arc::clone(&self.auctions);
        let period = self.period;
        tokio::spawn(async move {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let settled = auctions.settle_due().await;
                if settled > 0 {
                    info!("{:<12} --> closed {} auction(s)", "Scheduler", settled);
                } else {
                    debug!("{:<12} --> nothing to close", "Scheduler");
                }
            }
        })
    }
}
// endregion: --- Settlement Scheduler
