//! Storage abstractions for accounts, rates and the ledger.
//!
//! Two traits split storage along the atomicity line:
//!
//! - [`Store`]: the shared handle. Read-only queries and account creation,
//!   plus [`Store::begin`] to open a unit of work.
//! - [`AtomicUnit`]: one all-or-nothing unit of work. Account lookups inside a
//!   unit lock the account until the unit ends, so a read-compute-write cycle
//!   cannot interleave with another one on the same account. Nothing written
//!   through a unit is visible until [`AtomicUnit::commit`]; dropping a unit
//!   without committing discards its writes.
//!
//! Implementations:
//! - [`postgres::PgStore`]: PostgreSQL, one database transaction per unit
//! - [`memory::MemoryStore`]: in-process state, used by tests and local runs

pub mod memory;
pub mod postgres;

use std::future::Future;

use rust_decimal::Decimal;

use crate::{
    error::AppError,
    models::{
        account::{Account, NewAccount},
        ledger::{LedgerEntry, NewLedgerEntry},
        rate::{Rate, ServiceCode},
    },
};

/// Shared storage handle, cloned into every request.
pub trait Store: Clone + Send + Sync + 'static {
    /// Unit of work type opened by [`Store::begin`].
    type Unit: AtomicUnit;

    /// Open a unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Unit, AppError>> + Send;

    /// All rates, ordered by service name.
    fn list_rates(&self) -> impl Future<Output = Result<Vec<Rate>, AppError>> + Send;

    /// Account by user id, without locking.
    fn find_account(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Create an account with a zero balance and a card number derived from its id.
    ///
    /// Fails with [`AppError::EmailTaken`] if the email is already registered.
    fn create_account(
        &self,
        account: NewAccount,
    ) -> impl Future<Output = Result<Account, AppError>> + Send;

    /// Ledger entries for an account, newest first.
    fn list_entries(
        &self,
        account_id: i64,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, AppError>> + Send;

    /// User id owning an active token with this SHA-256 hex hash.
    fn resolve_token(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<i64>, AppError>> + Send;

    /// Check that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// One all-or-nothing unit of work.
pub trait AtomicUnit: Send {
    /// Lock and return the account with this user id.
    fn lock_account(
        &mut self,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Lock and return the account with this card number, active or not.
    fn lock_card(
        &mut self,
        card_number: &str,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Rate for a service.
    fn lookup_rate(
        &mut self,
        service: ServiceCode,
    ) -> impl Future<Output = Result<Option<Rate>, AppError>> + Send;

    /// Write `new_balance` if the stored balance still equals `expected_before`.
    ///
    /// Fails with [`AppError::Conflict`] when it does not.
    fn apply_delta(
        &mut self,
        account_id: i64,
        expected_before: Decimal,
        new_balance: Decimal,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Append a ledger entry, returning it with its id and timestamp.
    fn append(
        &mut self,
        entry: NewLedgerEntry,
    ) -> impl Future<Output = Result<LedgerEntry, AppError>> + Send;

    /// Make every write of this unit durable and visible.
    fn commit(self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Discard every write of this unit.
    fn rollback(self) -> impl Future<Output = Result<(), AppError>> + Send;
}
