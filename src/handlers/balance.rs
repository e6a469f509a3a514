//! Balance HTTP handlers for the authenticated (token) path.
//!
//! - GET /api/v1/balance - Current balance
//! - POST /api/v1/balance/recharge - Add money to the balance

use crate::{
    error::AppError,
    extract::AppJson,
    middleware::auth::AuthContext,
    models::intent::{Actor, BalanceResponse, RechargeIntent, RechargeReceipt, RechargeRequest},
    services::balance_service,
    store::Store,
};
use axum::{Extension, Json, extract::State};

/// Current balance of the authenticated user.
///
/// # Response (200)
///
/// ```json
/// { "balance": "12000.00" }
/// ```
pub async fn get_balance<S: Store>(
    State(store): State<S>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<BalanceResponse>, AppError> {
    let account = store
        .find_account(auth.user_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    Ok(Json(BalanceResponse {
        balance: account.balance,
    }))
}

/// Recharge the authenticated user's balance.
///
/// # Request Body
///
/// ```json
/// { "amount": 10000 }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "message": "Recharge successful",
///   "balance": "12000.00",
///   "transaction": { "transaction_type": "recharge", "amount": "10000.00", ... }
/// }
/// ```
pub async fn recharge<S: Store>(
    State(store): State<S>,
    Extension(auth): Extension<AuthContext>,
    AppJson(request): AppJson<RechargeRequest>,
) -> Result<Json<RechargeReceipt>, AppError> {
    // Validate before touching storage
    let intent = RechargeIntent::try_from(request)?;
    let actor = Actor::User {
        user_id: auth.user_id,
    };

    let receipt = balance_service::execute_recharge(&store, &actor, intent).await?;

    Ok(Json(receipt))
}
