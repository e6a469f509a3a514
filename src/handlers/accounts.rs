//! Account creation handler.
//!
//! - POST /api/v1/accounts - Create a new stored-value account

use crate::{
    error::AppError,
    extract::AppJson,
    models::account::{AccountResponse, CreateAccountRequest, NewAccount},
    store::Store,
};
use axum::{Json, extract::State, http::StatusCode};

/// Create a new account.
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Ana Rojas",
///   "email": "ana@example.com",
///   "user_class": "subsidized"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: The account, with balance `0.00` and its card number
/// - **400**: Missing field, bad email, or unknown user class
/// - **409**: Email already registered
pub async fn create_account<S: Store>(
    State(store): State<S>,
    AppJson(request): AppJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let new_account = NewAccount::try_from(request)?;

    let account = store.create_account(new_account).await?;
    tracing::info!(
        account_id = account.id,
        card_number = %account.card_number,
        user_class = %account.user_class,
        "account created"
    );

    Ok((StatusCode::CREATED, Json(account.into())))
}
