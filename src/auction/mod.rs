pub mod bidding;
pub mod buyout;
pub mod house;
pub mod model;

pub use bidding::{BidLedger, BidOutcome};
pub use buyout::{BuyoutReceipt, BuyoutResolver};
pub use house::{AuctionHouse, AuctionSummary};
pub use model::{Auction, AuctionStatus, Bid, NewAuction, SettlementOutcome, Termination};
