//! Ledger entry models.
//!
//! A ledger entry records one committed balance mutation. Entries are never
//! updated or deleted; reading them back in order reconstructs the balance.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::rate::ServiceCode;

/// What a ledger entry did to the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Recharge,
    Payment(ServiceCode),
}

impl EntryKind {
    /// Code stored in `ledger_entries.kind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Recharge => "recharge",
            EntryKind::Payment(service) => service.payment_code(),
        }
    }

    /// Signed effect of `amount` on the balance.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            EntryKind::Recharge => amount,
            EntryKind::Payment(_) => -amount,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown ledger entry kind: {0}")]
pub struct UnknownEntryKind(pub String);

impl FromStr for EntryKind {
    type Err = UnknownEntryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "recharge" {
            return Ok(EntryKind::Recharge);
        }
        ServiceCode::from_payment_code(s)
            .map(EntryKind::Payment)
            .ok_or_else(|| UnknownEntryKind(s.to_string()))
    }
}

impl TryFrom<String> for EntryKind {
    type Error = UnknownEntryKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents a row of the `ledger_entries` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,

    pub account_id: i64,

    #[sqlx(try_from = "String")]
    pub kind: EntryKind,

    /// Always positive; `kind` gives the direction.
    pub amount: Decimal,

    pub balance_before: Decimal,

    pub balance_after: Decimal,

    /// Free-form detail supplied with a payment (route, station, bay).
    pub service_details: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// An entry about to be appended. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub service_details: Option<String>,
}

/// Ledger entry as returned to clients.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "transaction_type": "pago_bicicleta",
///   "amount": "1000.00",
///   "balance_before": "3000.00",
///   "balance_after": "2000.00",
///   "service_details": "Station 12",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub transaction_type: &'static str,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub service_details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            transaction_type: entry.kind.as_str(),
            amount: entry.amount,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            service_details: entry.service_details,
            created_at: entry.created_at,
        }
    }
}

/// Response body for `GET /api/v1/transactions`.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub transactions: Vec<LedgerEntryResponse>,
}
