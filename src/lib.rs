pub mod auction;
pub mod clock;
pub mod config;
pub mod database;
pub mod economy;
pub mod error;
pub mod events;
pub mod guild;
pub mod handlers;
pub mod ledger;
pub mod scheduler;

pub type MemberId = i64;
pub type GuildId = i64;
pub type EventId = i64;
pub type AuctionId = i64;
