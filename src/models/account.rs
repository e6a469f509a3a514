//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity representing a card holder's stored-value account
//! - `UserClass`: The fare category an account belongs to
//! - `CreateAccountRequest`: Request body for creating accounts
//! - `AccountResponse`: Response body returned to clients

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Fare category of an account holder.
///
/// Only `Subsidized` changes pricing; the operator classes exist so staff
/// cards can be issued from the same table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserClass {
    Normal,
    #[serde(alias = "subsidiado")]
    Subsidized,
    #[serde(alias = "operador")]
    Operator,
    #[serde(alias = "bicicleta")]
    BikeOperator,
    #[serde(alias = "parqueadero")]
    ParkingOperator,
}

impl UserClass {
    /// Code stored in the `accounts.user_class` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserClass::Normal => "normal",
            UserClass::Subsidized => "subsidized",
            UserClass::Operator => "operator",
            UserClass::BikeOperator => "bike_operator",
            UserClass::ParkingOperator => "parking_operator",
        }
    }
}

impl fmt::Display for UserClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user class code that is not one of the known categories.
#[derive(Debug, thiserror::Error)]
#[error("unknown user class: {0}")]
pub struct UnknownUserClass(pub String);

impl FromStr for UserClass {
    type Err = UnknownUserClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(UserClass::Normal),
            "subsidized" | "subsidiado" => Ok(UserClass::Subsidized),
            "operator" | "operador" => Ok(UserClass::Operator),
            "bike_operator" | "bicicleta" => Ok(UserClass::BikeOperator),
            "parking_operator" | "parqueadero" => Ok(UserClass::ParkingOperator),
            other => Err(UnknownUserClass(other.to_string())),
        }
    }
}

impl TryFrom<String> for UserClass {
    type Error = UnknownUserClass;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Is reachable by `id` (token path) or by `card_number` (card path)
/// - Holds a NUMERIC(12,2) balance that never goes below zero
/// - Is soft-deactivated through `is_active`, never deleted
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Account {
    pub id: i64,

    /// Card number derived from `id` at creation, see [`card_number_for`].
    pub card_number: String,

    pub full_name: String,

    pub email: String,

    #[sqlx(try_from = "String")]
    pub user_class: UserClass,

    /// Current balance with two decimal places.
    pub balance: Decimal,

    /// Deactivated cards are rejected on the card path.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Derive the card number printed on a new account's card.
///
/// The prefix `1000` is followed by the account id zero-padded to six digits,
/// so id 42 becomes `1000000042`.
pub fn card_number_for(id: i64) -> String {
    format!("1000{id:06}")
}

/// Request body for creating a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "full_name": "Ana Rojas",
///   "email": "ana@example.com",
///   "user_class": "subsidized"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub full_name: Option<String>,

    pub email: Option<String>,

    /// Accepts the legacy `user_type` field name as well.
    #[serde(alias = "user_type")]
    pub user_class: Option<String>,
}

/// Validated input for account creation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub user_class: UserClass,
}

impl TryFrom<CreateAccountRequest> for NewAccount {
    type Error = AppError;

    fn try_from(request: CreateAccountRequest) -> Result<Self, Self::Error> {
        let full_name = request
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(AppError::MissingField("full_name"))?;

        let email = request
            .email
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .ok_or(AppError::MissingField("email"))?;
        if !is_valid_email(&email) {
            return Err(AppError::InvalidRequest("Invalid email format".to_string()));
        }

        let user_class = request
            .user_class
            .ok_or(AppError::MissingField("user_class"))?
            .parse::<UserClass>()
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            full_name,
            email,
            user_class,
        })
    }
}

/// Accepts `local@domain.tld` with no whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Response body for account endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 7,
///   "card_number": "1000000007",
///   "full_name": "Ana Rojas",
///   "email": "ana@example.com",
///   "user_class": "subsidized",
///   "balance": "0.00",
///   "is_active": true,
///   "created_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub card_number: String,
    pub full_name: String,
    pub email: String,
    pub user_class: UserClass,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            card_number: account.card_number,
            full_name: account.full_name,
            email: account.email,
            user_class: account.user_class,
            balance: account.balance,
            is_active: account.is_active,
            created_at: account.created_at,
        }
    }
}
