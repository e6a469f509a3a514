//! In-process storage.
//!
//! All state sits behind one async mutex. A [`MemoryUnit`] owns the lock for
//! its whole lifetime and stages its writes; `commit` applies them, anything
//! else throws them away. Units are therefore fully serialized, which is a
//! coarser version of the row locks the PostgreSQL store takes.
//!
//! Faults can be armed with [`MemoryStore::fail_next`] to make the next append
//! or commit fail, which is how rollback paths are exercised without a
//! database.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, NewAccount, card_number_for},
        ledger::{LedgerEntry, NewLedgerEntry},
        rate::{Rate, ServiceCode},
    },
    store::{AtomicUnit, Store},
};

/// A storage step that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Append,
    Commit,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: BTreeMap<i64, Account>,
    rates: BTreeMap<&'static str, Rate>,
    /// Insertion order is creation order.
    entries: Vec<LedgerEntry>,
    tokens: BTreeMap<String, i64>,
    last_id: i64,
    armed_fault: Option<Fault>,
}

impl MemoryState {
    fn trip(&mut self, step: Fault) -> Result<(), AppError> {
        if self.armed_fault == Some(step) {
            self.armed_fault = None;
            return Err(AppError::Storage(format!("injected {step:?} failure")));
        }
        Ok(())
    }
}

/// Store keeping everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Empty store with no rates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the same rate table as the initial migration.
    pub async fn seeded() -> Self {
        let store = Self::new();
        for rate in default_rates() {
            store.insert_rate(rate).await;
        }
        store
    }

    /// Insert or replace a rate.
    pub async fn insert_rate(&self, rate: Rate) {
        let mut state = self.state.lock().await;
        state.rates.insert(rate.service_name.service_name(), rate);
    }

    /// Register a bearer token for a user. Only its hash is kept.
    pub async fn issue_token(&self, user_id: i64, token: &str) {
        let mut state = self.state.lock().await;
        state
            .tokens
            .insert(crate::middleware::auth::hash_token(token), user_id);
    }

    /// Flip an account's active flag, as the admin tooling would.
    pub async fn set_active(&self, user_id: i64, is_active: bool) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&user_id)
            .ok_or(AppError::AccountNotFound)?;
        account.is_active = is_active;
        Ok(())
    }

    /// Make the next `step` fail with a storage error.
    pub async fn fail_next(&self, step: Fault) {
        self.state.lock().await.armed_fault = Some(step);
    }
}

/// Rates seeded by `migrations/20250101000002_create_rates.sql`.
pub fn default_rates() -> Vec<Rate> {
    let rate = |service_name, base_rate: i64, discount_bp: i64| Rate {
        service_name,
        base_rate: Decimal::new(base_rate * 100, 2),
        subsidized_discount: Decimal::new(discount_bp, 4),
    };

    vec![
        rate(ServiceCode::Bicicleta, 2000, 5000),
        rate(ServiceCode::Parqueadero, 4000, 2000),
        rate(ServiceCode::Transmilenio, 2700, 2500),
    ]
}

impl Store for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, AppError> {
        let state = self.state.clone().lock_owned().await;
        Ok(MemoryUnit {
            state,
            balances: BTreeMap::new(),
            entries: Vec::new(),
        })
    }

    async fn list_rates(&self) -> Result<Vec<Rate>, AppError> {
        let state = self.state.lock().await;
        Ok(state.rates.values().cloned().collect())
    }

    async fn find_account(&self, user_id: i64) -> Result<Option<Account>, AppError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&user_id).cloned())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut state = self.state.lock().await;
        if state.accounts.values().any(|a| a.email == account.email) {
            return Err(AppError::EmailTaken);
        }

        state.last_id += 1;
        let id = state.last_id;
        let now = Utc::now();
        let created = Account {
            id,
            card_number: card_number_for(id),
            full_name: account.full_name,
            email: account.email,
            user_class: account.user_class,
            balance: Decimal::new(0, 2),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(id, created.clone());

        Ok(created)
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn resolve_token(&self, token_hash: &str) -> Result<Option<i64>, AppError> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(token_hash).copied())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Unit of work holding the store lock.
#[derive(Debug)]
pub struct MemoryUnit {
    state: OwnedMutexGuard<MemoryState>,
    /// Staged balances by account id.
    balances: BTreeMap<i64, Decimal>,
    /// Staged ledger entries.
    entries: Vec<LedgerEntry>,
}

impl MemoryUnit {
    /// Account as this unit sees it, with staged balance applied.
    fn view(&self, account: &Account) -> Account {
        let mut view = account.clone();
        if let Some(balance) = self.balances.get(&account.id) {
            view.balance = *balance;
        }
        view
    }
}

impl AtomicUnit for MemoryUnit {
    async fn lock_account(&mut self, user_id: i64) -> Result<Option<Account>, AppError> {
        Ok(self.state.accounts.get(&user_id).map(|a| self.view(a)))
    }

    async fn lock_card(&mut self, card_number: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .state
            .accounts
            .values()
            .find(|a| a.card_number == card_number)
            .map(|a| self.view(a)))
    }

    async fn lookup_rate(&mut self, service: ServiceCode) -> Result<Option<Rate>, AppError> {
        Ok(self.state.rates.get(service.service_name()).cloned())
    }

    async fn apply_delta(
        &mut self,
        account_id: i64,
        expected_before: Decimal,
        new_balance: Decimal,
    ) -> Result<(), AppError> {
        let current = self
            .state
            .accounts
            .get(&account_id)
            .map(|a| self.view(a).balance)
            .ok_or(AppError::AccountNotFound)?;

        if current != expected_before {
            return Err(AppError::Conflict);
        }
        if new_balance < Decimal::ZERO {
            return Err(AppError::Storage(format!(
                "balance of account {account_id} would become negative"
            )));
        }

        self.balances.insert(account_id, new_balance);
        Ok(())
    }

    async fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, AppError> {
        self.state.trip(Fault::Append)?;

        let stored = LedgerEntry {
            id: Uuid::new_v4(),
            account_id: entry.account_id,
            kind: entry.kind,
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            service_details: entry.service_details,
            created_at: Utc::now(),
        };
        self.entries.push(stored.clone());

        Ok(stored)
    }

    async fn commit(mut self) -> Result<(), AppError> {
        self.state.trip(Fault::Commit)?;

        let now = Utc::now();
        let balances = std::mem::take(&mut self.balances);
        for (id, balance) in balances {
            if let Some(account) = self.state.accounts.get_mut(&id) {
                account.balance = balance;
                account.updated_at = now;
            }
        }
        let entries = std::mem::take(&mut self.entries);
        self.state.entries.extend(entries);

        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}
