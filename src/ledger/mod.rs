/// DKP ledger: the authoritative balance holder.
/// 1. In-memory ledger (tests, single-node runs)
/// 2. Postgres ledger (see `postgres`)
// region:    --- Imports
use crate::clock::Clock;
use crate::MemberId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Modules
pub mod postgres;
pub use postgres::PgLedger;
// endregion: --- Modules

/// Largest reward, price or bid the economy accepts.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

// region:    --- Ledger Trait
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("invalid amount {0}")]
    InvalidAmount(i64),

    #[error("amount would overflow the balance")]
    Overflow,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Postgres `numeric_value_out_of_range`.
const PG_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_OUT_OF_RANGE) => {
                LedgerError::Overflow
            }
            _ => LedgerError::Unavailable(e.to_string()),
        }
    }
}

/// One balance movement. `delta` is positive for credits, negative for debits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub member_id: MemberId,
    pub delta: i64,
    pub reason: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Balance service consumed by the economy. Both mutations are atomic per call.
#[async_trait]
pub trait DkpLedger: Send + Sync {
    async fn balance(&self, member: MemberId) -> Result<i64, LedgerError>;

    async fn credit(&self, member: MemberId, amount: i64, reason: &str)
        -> Result<i64, LedgerError>;

    /// Fails with `InsufficientFunds` rather than going below zero.
    async fn debit(&self, member: MemberId, amount: i64, reason: &str)
        -> Result<i64, LedgerError>;

    /// Newest first.
    async fn history(&self, member: MemberId) -> Result<Vec<LedgerEntry>, LedgerError>;
}
// endregion: --- Ledger Trait

// region:    --- Memory Ledger
#[derive(Default)]
struct Book {
    balances: HashMap<MemberId, i64>,
    journal: Vec<LedgerEntry>,
}

pub struct MemoryLedger {
    book: Mutex<Book>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl MemoryLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            book: Mutex::new(Book::default()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the ledger going away; every call fails with `Unavailable` while off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("memory ledger switched off".into()))
        }
    }

    fn apply(&self, member: MemberId, delta: i64, reason: &str) -> Result<i64, LedgerError> {
        self.check_available()?;
        let mut book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        let balance = book.balances.get(&member).copied().unwrap_or(0);
        let balance_after = balance
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        if balance_after < 0 {
            return Err(LedgerError::InsufficientFunds {
                balance,
                required: -delta,
            });
        }
        book.balances.insert(member, balance_after);
        book.journal.push(LedgerEntry {
            member_id: member,
            delta,
            reason: reason.to_string(),
            balance_after,
            created_at: self.clock.now(),
        });
        Ok(balance_after)
    }
}

#[async_trait]
impl DkpLedger for MemoryLedger {
    async fn balance(&self, member: MemberId) -> Result<i64, LedgerError> {
        self.check_available()?;
        let book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        Ok(book.balances.get(&member).copied().unwrap_or(0))
    }

    async fn credit(
        &self,
        member: MemberId,
        amount: i64,
        reason: &str,
    ) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let balance = self.apply(member, amount, reason)?;
        info!(
            "{:<12} --> credit member={} amount={} reason={} balance={}",
            "Ledger", member, amount, reason, balance
        );
        Ok(balance)
    }

    async fn debit(
        &self,
        member: MemberId,
        amount: i64,
        reason: &str,
    ) -> Result<i64, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        match self.apply(member, -amount, reason) {
            Ok(balance) => {
                info!(
                    "{:<12} --> debit member={} amount={} reason={} balance={}",
                    "Ledger", member, amount, reason, balance
                );
                Ok(balance)
            }
            Err(e) => {
                warn!("{:<12} --> debit rejected member={}: {}", "Ledger", member, e);
                Err(e)
            }
        }
    }

    async fn history(&self, member: MemberId) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.check_available()?;
        let book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        Ok(book
            .journal
            .iter()
            .rev()
            .filter(|entry| entry.member_id == member)
            .cloned()
            .collect())
    }
}
// endregion: --- Memory Ledger
