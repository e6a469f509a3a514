//! PostgreSQL storage backed by sqlx.
//!
//! # Atomicity Guarantees
//!
//! A [`PgUnit`] wraps one database transaction. Account lookups use
//! `SELECT ... FOR UPDATE`, so a second request on the same account waits for
//! the first unit to commit or roll back before it reads the balance. If a
//! unit is dropped without `commit`, sqlx rolls the transaction back.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::{Account, NewAccount, card_number_for},
        ledger::{LedgerEntry, NewLedgerEntry},
        rate::{Rate, ServiceCode},
    },
    store::{AtomicUnit, Store},
};

const ACCOUNT_COLUMNS: &str = "id, card_number, full_name, email, user_class, balance, is_active, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, account_id, kind, amount, balance_before, balance_after, service_details, created_at";

/// Unique constraint on `accounts.email`, see migrations.
const EMAIL_CONSTRAINT: &str = "accounts_email_key";

/// Store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<PgUnit, AppError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnit { tx })
    }

    async fn list_rates(&self) -> Result<Vec<Rate>, AppError> {
        let rates = sqlx::query_as::<_, Rate>(
            "SELECT service_name, base_rate, subsidized_discount FROM rates ORDER BY service_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rates)
    }

    async fn find_account(&self, user_id: i64) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, AppError> {
        // Reserve the id first so the card number can be written in the same insert
        let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('accounts', 'id'))")
            .fetch_one(&self.pool)
            .await?;

        let created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (id, card_number, full_name, email, user_class, balance)
            VALUES ($1, $2, $3, $4, $5, 0.00)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(card_number_for(id))
        .bind(&account.full_name)
        .bind(&account.email)
        .bind(account.user_class.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.constraint() == Some(EMAIL_CONSTRAINT) => {
                AppError::EmailTaken
            }
            other => AppError::Database(other),
        })?;

        Ok(created)
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC, seq DESC
            "#
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn resolve_token(&self, token_hash: &str) -> Result<Option<i64>, AppError> {
        let user_id = sqlx::query_scalar(
            "SELECT user_id FROM access_tokens WHERE token_hash = $1 AND is_active = true",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One PostgreSQL transaction.
pub struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

impl AtomicUnit for PgUnit {
    async fn lock_account(&mut self, user_id: i64) -> Result<Option<Account>, AppError> {
        // FOR UPDATE holds the row until this transaction ends
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn lock_card(&mut self, card_number: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE card_number = $1 FOR UPDATE"
        ))
        .bind(card_number)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn lookup_rate(&mut self, service: ServiceCode) -> Result<Option<Rate>, AppError> {
        let rate = sqlx::query_as::<_, Rate>(
            "SELECT service_name, base_rate, subsidized_discount FROM rates WHERE service_name = $1",
        )
        .bind(service.service_name())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(rate)
    }

    async fn apply_delta(
        &mut self,
        account_id: i64,
        expected_before: Decimal,
        new_balance: Decimal,
    ) -> Result<(), AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $1,
                updated_at = NOW()
            WHERE id = $2 AND balance = $3
            "#,
        )
        .bind(new_balance)
        .bind(account_id)
        .bind(expected_before)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::Conflict);
        }

        Ok(())
    }

    async fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, AppError> {
        let stored = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO ledger_entries (
                account_id,
                kind,
                amount,
                balance_before,
                balance_after,
                service_details
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.account_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(entry.service_details)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(stored)
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
