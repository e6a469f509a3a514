//! Card HTTP handlers for anonymous card swipes.
//!
//! - POST /api/v1/cards/recharge - Recharge by card number
//! - POST /api/v1/cards/pay - Pay for a service by card number
//!
//! These routes carry no token; the card number identifies the account, and
//! only active cards are accepted.

use crate::{
    error::AppError,
    extract::AppJson,
    models::intent::{CardPaymentRequest, CardRechargeRequest, PaymentReceipt, RechargeReceipt},
    services::balance_service,
    store::Store,
};
use axum::{Json, extract::State};

/// Recharge the account behind a card.
///
/// # Request Body
///
/// ```json
/// { "card_number": "1000000007", "amount": 20000 }
/// ```
pub async fn recharge<S: Store>(
    State(store): State<S>,
    AppJson(request): AppJson<CardRechargeRequest>,
) -> Result<Json<RechargeReceipt>, AppError> {
    let (actor, intent) = request.into_parts()?;

    let receipt = balance_service::execute_recharge(&store, &actor, intent).await?;

    Ok(Json(receipt))
}

/// Pay for a service with the balance behind a card.
///
/// # Request Body
///
/// ```json
/// {
///   "card_number": "1000000007",
///   "service_type": "pago_transmilenio",
///   "service_details": "Portal Norte"
/// }
/// ```
pub async fn pay<S: Store>(
    State(store): State<S>,
    AppJson(request): AppJson<CardPaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let (actor, intent) = request.into_parts()?;

    let receipt = balance_service::execute_payment(&store, &actor, intent).await?;

    Ok(Json(receipt))
}
