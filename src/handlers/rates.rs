//! Rate table endpoint.

use crate::{error::AppError, models::rate::RatesResponse, store::Store};
use axum::{Json, extract::State};

/// List every service rate.
///
/// # Response (200)
///
/// ```json
/// {
///   "rates": [
///     { "service_name": "bicicleta", "base_rate": "2000.00", "subsidized_discount": "0.5000" }
///   ]
/// }
/// ```
pub async fn list_rates<S: Store>(State(store): State<S>) -> Result<Json<RatesResponse>, AppError> {
    let rates = store.list_rates().await?;

    Ok(Json(RatesResponse { rates }))
}
