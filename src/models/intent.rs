//! Balance intents: request bodies, their validated forms, and receipts.
//!
//! Request bodies are loose (every field optional, amounts as raw JSON) so that
//! missing fields and bad amounts get their own error codes. Bodies that do not
//! deserialize at all are rejected by [`crate::extract::AppJson`] as
//! `invalid_request`. Each body converts once into a typed intent; the engine
//! only ever sees the typed form.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AppError,
    models::{
        ledger::{LedgerEntry, LedgerEntryResponse},
        rate::ServiceCode,
    },
    services::pricing::{MAX_MONEY, round_money},
};

/// Who is moving money.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Resolved from a bearer token.
    User { user_id: i64 },
    /// Anonymous card swipe.
    Card { card_number: String },
}

impl Actor {
    /// Card number to echo back in receipts, if the actor came in by card.
    pub fn card_number(&self) -> Option<&str> {
        match self {
            Actor::Card { card_number } => Some(card_number),
            Actor::User { .. } => None,
        }
    }
}

/// Validated recharge: `amount` is positive with two decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct RechargeIntent {
    pub amount: Decimal,
}

/// Validated payment for one service.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub service: ServiceCode,
    pub service_details: Option<String>,
}

/// `POST /api/v1/balance/recharge` body.
#[derive(Debug, Default, Deserialize)]
pub struct RechargeRequest {
    pub amount: Option<Value>,
}

/// `POST /api/v1/transactions/pay` body.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    #[serde(alias = "service_code")]
    pub service_type: Option<String>,
    pub service_details: Option<String>,
}

/// `POST /api/v1/cards/recharge` body.
#[derive(Debug, Default, Deserialize)]
pub struct CardRechargeRequest {
    pub card_number: Option<String>,
    pub amount: Option<Value>,
}

/// `POST /api/v1/cards/pay` body.
#[derive(Debug, Default, Deserialize)]
pub struct CardPaymentRequest {
    pub card_number: Option<String>,
    #[serde(alias = "service_code")]
    pub service_type: Option<String>,
    pub service_details: Option<String>,
}

impl TryFrom<RechargeRequest> for RechargeIntent {
    type Error = AppError;

    fn try_from(request: RechargeRequest) -> Result<Self, Self::Error> {
        let raw = request.amount.ok_or(AppError::MissingField("amount"))?;
        Ok(Self {
            amount: parse_amount(&raw)?,
        })
    }
}

impl TryFrom<PaymentRequest> for PaymentIntent {
    type Error = AppError;

    fn try_from(request: PaymentRequest) -> Result<Self, Self::Error> {
        let service = request
            .service_type
            .as_deref()
            .and_then(ServiceCode::from_payment_code)
            .ok_or(AppError::InvalidService)?;

        Ok(Self {
            service,
            service_details: request
                .service_details
                .map(|details| details.trim().to_string())
                .filter(|details| !details.is_empty()),
        })
    }
}

impl CardRechargeRequest {
    /// Split into the card actor and the validated recharge.
    pub fn into_parts(self) -> Result<(Actor, RechargeIntent), AppError> {
        let actor = card_actor(self.card_number)?;
        let intent = RechargeIntent::try_from(RechargeRequest {
            amount: self.amount,
        })?;
        Ok((actor, intent))
    }
}

impl CardPaymentRequest {
    /// Split into the card actor and the validated payment.
    pub fn into_parts(self) -> Result<(Actor, PaymentIntent), AppError> {
        let actor = card_actor(self.card_number)?;
        let intent = PaymentIntent::try_from(PaymentRequest {
            service_type: self.service_type,
            service_details: self.service_details,
        })?;
        Ok((actor, intent))
    }
}

fn card_actor(card_number: Option<String>) -> Result<Actor, AppError> {
    let card_number = card_number
        .map(|card| card.trim().to_string())
        .filter(|card| !card.is_empty())
        .ok_or(AppError::MissingField("card_number"))?;
    Ok(Actor::Card { card_number })
}

/// Parse a JSON number or numeric string into a positive money amount.
///
/// Extra decimal places are rounded half-up; the rounded value must still be
/// greater than zero and no larger than [`MAX_MONEY`].
pub fn parse_amount(raw: &Value) -> Result<Decimal, AppError> {
    let parsed = match raw {
        Value::Number(number) => decimal_from_str(&number.to_string()),
        Value::String(text) => decimal_from_str(text.trim()),
        _ => None,
    }
    .ok_or_else(|| AppError::InvalidAmount(format!("'{raw}' is not a number")))?;

    let amount = round_money(parsed);
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(
            "Amount must be greater than 0".to_string(),
        ));
    }
    if amount > MAX_MONEY {
        return Err(AppError::InvalidAmount(format!(
            "Amount must not exceed {MAX_MONEY}"
        )));
    }
    Ok(amount)
}

fn decimal_from_str(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Successful recharge.
///
/// # JSON Example
///
/// ```json
/// {
///   "message": "Recharge successful",
///   "card_number": "1000000007",
///   "balance": "12000.00",
///   "transaction": { "transaction_type": "recharge", "amount": "10000.00", ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct RechargeReceipt {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    pub balance: Decimal,
    pub transaction: LedgerEntryResponse,
}

impl RechargeReceipt {
    pub fn new(actor: &Actor, entry: LedgerEntry) -> Self {
        Self {
            message: "Recharge successful",
            card_number: actor.card_number().map(str::to_string),
            balance: entry.balance_after,
            transaction: entry.into(),
        }
    }
}

/// Successful payment.
///
/// # JSON Example
///
/// ```json
/// {
///   "message": "Payment successful",
///   "amount_paid": "1000.00",
///   "new_balance": "2000.00",
///   "service": "bicicleta",
///   "transaction": { "transaction_type": "pago_bicicleta", ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    pub amount_paid: Decimal,
    pub new_balance: Decimal,
    pub service: ServiceCode,
    pub transaction: LedgerEntryResponse,
}

impl PaymentReceipt {
    pub fn new(actor: &Actor, service: ServiceCode, entry: LedgerEntry) -> Self {
        Self {
            message: "Payment successful",
            card_number: actor.card_number().map(str::to_string),
            amount_paid: entry.amount,
            new_balance: entry.balance_after,
            service,
            transaction: entry.into(),
        }
    }
}

/// Response body for `GET /api/v1/balance`.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[rstest]
    #[case(json!(5000), dec!(5000.00))]
    #[case(json!(12.5), dec!(12.50))]
    #[case(json!("2700"), dec!(2700.00))]
    #[case(json!(" 10.005 "), dec!(10.01))]
    #[case(json!("9999999999.99"), dec!(9999999999.99))]
    fn test_parse_amount(#[case] raw: Value, #[case] expected: Decimal) {
        let amount = parse_amount(&raw).unwrap();
        assert_eq!(amount, expected);
        assert_eq!(amount.scale(), 2);
    }

    #[rstest]
    #[case(json!(0))]
    #[case(json!(-10))]
    #[case(json!(0.004))]
    #[case(json!("abc"))]
    #[case(json!(""))]
    #[case(json!(true))]
    #[case(json!(null))]
    #[case(json!([1]))]
    #[case(json!("10000000000"))]
    #[case(json!("99999999999999999999"))]
    #[case(json!(1e11))]
    fn test_parse_amount_rejects(#[case] raw: Value) {
        assert!(matches!(parse_amount(&raw), Err(AppError::InvalidAmount(_))));
    }

    #[test]
    fn test_recharge_request_requires_amount() {
        let result = RechargeIntent::try_from(RechargeRequest::default());
        assert!(matches!(result, Err(AppError::MissingField("amount"))));
    }

    #[rstest]
    #[case(None)]
    #[case(Some("pago_avion"))]
    #[case(Some("bicicleta"))]
    fn test_payment_request_rejects_unknown_service(#[case] service: Option<&str>) {
        let request = PaymentRequest {
            service_type: service.map(str::to_string),
            service_details: None,
        };
        assert!(matches!(
            PaymentIntent::try_from(request),
            Err(AppError::InvalidService)
        ));
    }

    #[test]
    fn test_payment_request_drops_blank_details() {
        let request = PaymentRequest {
            service_type: Some("pago_parqueadero".to_string()),
            service_details: Some("   ".to_string()),
        };
        let intent = PaymentIntent::try_from(request).unwrap();
        assert_eq!(intent.service, ServiceCode::Parqueadero);
        assert_eq!(intent.service_details, None);
    }

    #[test]
    fn test_card_request_requires_card_number() {
        let request = CardRechargeRequest {
            card_number: Some("  ".to_string()),
            amount: Some(json!(100)),
        };
        let result = request.into_parts();
        assert!(matches!(result, Err(AppError::MissingField("card_number"))));
    }

    #[test]
    fn test_card_payment_request_builds_card_actor() {
        let request = CardPaymentRequest {
            card_number: Some("1000000001".to_string()),
            service_type: Some("pago_transmilenio".to_string()),
            service_details: Some("Portal Norte".to_string()),
        };
        let (actor, intent) = request.into_parts().unwrap();
        assert_eq!(actor.card_number(), Some("1000000001"));
        assert_eq!(intent.service, ServiceCode::Transmilenio);
        assert_eq!(intent.service_details.as_deref(), Some("Portal Norte"));
    }
}
