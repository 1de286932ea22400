// region:    --- Imports
use super::{DkpLedger, LedgerEntry, LedgerError};
use crate::clock::Clock;
use crate::database::DatabaseManager;
use crate::MemberId;
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Queries
const GET_BALANCE: &str = "SELECT balance FROM dkp_balances WHERE member_id = $1";

const CREDIT_BALANCE: &str = r#"
    INSERT INTO dkp_balances (member_id, balance, updated_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (member_id)
    DO UPDATE SET balance = dkp_balances.balance + EXCLUDED.balance,
                  updated_at = EXCLUDED.updated_at
    RETURNING balance
"#;

/// Conditional update: matches no row when the balance cannot cover the amount.
const DEBIT_BALANCE: &str = r#"
    UPDATE dkp_balances
    SET balance = balance - $2, updated_at = $3
    WHERE member_id = $1 AND balance >= $2
    RETURNING balance
"#;

const INSERT_TRANSACTION: &str = r#"
    INSERT INTO dkp_transactions (member_id, delta, reason, balance_after, created_at)
    VALUES ($1, $2, $3, $4, $5)
"#;

const GET_HISTORY: &str = r#"
    SELECT member_id, delta, reason, balance_after, created_at
    FROM dkp_transactions
    WHERE member_id = $1
    ORDER BY id DESC
"#;
// endregion: --- Queries

// region:    --- Postgres Ledger
pub struct PgLedger {
    db: Arc<DatabaseManager>,
    clock: Arc<dyn Clock>,
}

impl PgLedger {
    pub fn new(db: Arc<DatabaseManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

#[async_trait]
impl DkpLedger for PgLedger {
    async fn balance(&self, member: MemberId) -> Result<i64, LedgerError> {
        let row = sqlx::query(GET_BALANCE)
            .bind(member)
            .fetch_optional(&*self.db.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("balance")).unwrap_or(0))
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
        let reason = reason.to_string();
        let now = self.clock.now();
        let balance = self
            .db
            .transaction(move |tx| {
                Box::pin(async move {
                    let balance: i64 = sqlx::query(CREDIT_BALANCE)
                        .bind(member)
                        .bind(amount)
                        .bind(now)
                        .fetch_one(&mut **tx)
                        .await?
                        .get("balance");

                    sqlx::query(INSERT_TRANSACTION)
                        .bind(member)
                        .bind(amount)
                        .bind(&reason)
                        .bind(balance)
                        .bind(now)
                        .execute(&mut **tx)
                        .await?;

                    Ok::<_, LedgerError>(balance)
                })
            })
            .await?;

        info!(
            "{:<12} --> credit member={} amount={} balance={}",
            "Ledger", member, amount, balance
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
        let reason = reason.to_string();
        let now = self.clock.now();
        let result = self
            .db
            .transaction(move |tx| {
                Box::pin(async move {
                    let updated = sqlx::query(DEBIT_BALANCE)
                        .bind(member)
                        .bind(amount)
                        .bind(now)
                        .fetch_optional(&mut **tx)
                        .await?;

                    let Some(row) = updated else {
                        let balance = sqlx::query(GET_BALANCE)
                            .bind(member)
                            .fetch_optional(&mut **tx)
                            .await?
                            .map(|r| r.get::<i64, _>("balance"))
                            .unwrap_or(0);
                        return Err(LedgerError::InsufficientFunds {
                            balance,
                            required: amount,
                        });
                    };
                    let balance: i64 = row.get("balance");

                    sqlx::query(INSERT_TRANSACTION)
                        .bind(member)
                        .bind(-amount)
                        .bind(&reason)
                        .bind(balance)
                        .bind(now)
                        .execute(&mut **tx)
                        .await?;

                    Ok::<_, LedgerError>(balance)
                })
            })
            .await;

        match &result {
            Ok(balance) => info!(
                "{:<12} --> debit member={} amount={} balance={}",
                "Ledger", member, amount, balance
            ),
            Err(e) => warn!("{:<12} --> debit rejected member={}: {}", "Ledger", member, e),
        }
        result
    }

    async fn history(&self, member: MemberId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(GET_HISTORY)
            .bind(member)
            .fetch_all(&*self.db.pool)
            .await?;
        Ok(entries)
    }
}
// endregion: --- Postgres Ledger
