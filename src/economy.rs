/// All engine components wired to one clock, ledger and guild directory.
/// Points flow in through the event side and out through the auction side;
/// the two sides share only the collaborators.
// region:    --- Imports
use crate::auction::{AuctionHouse, BidLedger, BuyoutResolver};
use crate::clock::Clock;
use crate::events::{AccessCodeValidator, EventRegistry, ParticipationStateMachine};
use crate::guild::GuildDirectory;
use crate::ledger::DkpLedger;
use std::sync::Arc;
// endregion: --- Imports

pub struct Economy {
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<dyn DkpLedger>,
    pub directory: Arc<dyn GuildDirectory>,
    pub events: Arc<EventRegistry>,
    pub participation: ParticipationStateMachine,
    pub attendance: AccessCodeValidator,
    pub auctions: Arc<AuctionHouse>,
    pub bids: BidLedger,
    pub buyouts: BuyoutResolver,
}

impl Economy {
    pub fn new(
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn DkpLedger>,
        directory: Arc<dyn GuildDirectory>,
    ) -> Self {
        let events = Arc::new(EventRegistry::new(Arc::clone(&directory), Arc::clone(&clock)));
        let participation = ParticipationStateMachine::new(
            Arc::clone(&events),
            Arc::clone(&directory),
            Arc::clone(&clock),
        );
        let attendance = AccessCodeValidator::new(
            Arc::clone(&events),
            Arc::clone(&ledger),
            Arc::clone(&directory),
            Arc::clone(&clock),
        );

        let auctions = Arc::new(AuctionHouse::new(
            Arc::clone(&directory),
            Arc::clone(&ledger),
            Arc::clone(&clock),
        ));
        let bids = BidLedger::new(
            Arc::clone(&auctions),
            Arc::clone(&ledger),
            Arc::clone(&directory),
            Arc::clone(&clock),
        );
        let buyouts = BuyoutResolver::new(
            Arc::clone(&auctions),
            Arc::clone(&ledger),
            Arc::clone(&directory),
            Arc::clone(&clock),
        );

        Self {
            clock,
            ledger,
            directory,
            events,
            participation,
            attendance,
            auctions,
            bids,
            buyouts,
        }
    }
}
