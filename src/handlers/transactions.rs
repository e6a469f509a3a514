//! Transaction HTTP handlers for the authenticated (token) path.
//!
//! - POST /api/v1/transactions/pay - Pay for a service
//! - GET /api/v1/transactions - Ledger of the authenticated user, newest first

use crate::{
    error::AppError,
    extract::AppJson,
    middleware::auth::AuthContext,
    models::{
        intent::{Actor, PaymentIntent, PaymentReceipt, PaymentRequest},
        ledger::HistoryResponse,
    },
    services::balance_service,
    store::Store,
};
use axum::{Extension, Json, extract::State};

/// Pay for a service with the authenticated user's balance.
///
/// # Request Body
///
/// ```json
/// {
///   "service_type": "pago_bicicleta",
///   "service_details": "Estación Calle 26"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Payment successful",
///   "amount_paid": "1000.00",
///   "new_balance": "2000.00",
///   "service": "bicicleta",
///   "transaction": { ... }
/// }
/// ```
///
/// # Errors
///
/// - 400 `invalid_service`: Unknown service code (checked before any storage access)
/// - 400 `insufficient_balance`: Balance lower than the fare
/// - 404 `account_not_found` / `rate_not_found`
pub async fn pay<S: Store>(
    State(store): State<S>,
    Extension(auth): Extension<AuthContext>,
    AppJson(request): AppJson<PaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let intent = PaymentIntent::try_from(request)?;
    let actor = Actor::User {
        user_id: auth.user_id,
    };

    let receipt = balance_service::execute_payment(&store, &actor, intent).await?;

    Ok(Json(receipt))
}

/// List the authenticated user's ledger entries, newest first.
pub async fn list_transactions<S: Store>(
    State(store): State<S>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<HistoryResponse>, AppError> {
    // Distinguish "no such account" from "no entries yet"
    store
        .find_account(auth.user_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    let entries = store.list_entries(auth.user_id).await?;

    Ok(Json(HistoryResponse {
        transactions: entries.into_iter().map(Into::into).collect(),
    }))
}
