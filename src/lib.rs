//! Transit card balance service.
//!
//! A REST API for stored-value transit cards: account holders recharge their
//! balance and spend it on transit, bike and parking fares, either with a
//! bearer token or by swiping their card.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries), or the in-memory store
//! - **Authentication**: Bearer tokens stored as SHA-256 hashes
//! - **Money**: `rust_decimal` with two decimal places, rounded half-up
//!
//! Every balance change runs through [`services::balance_service`], which
//! updates the balance and appends the ledger entry in one unit of work.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::store::Store;

/// Build the HTTP router over a storage backend.
///
/// Card routes and the rate table are public; balance and transaction routes
/// require a bearer token.
pub fn router<S: Store>(store: S) -> Router {
    let authenticated_routes = Router::new()
        .route("/api/v1/balance", get(handlers::balance::get_balance::<S>))
        .route(
            "/api/v1/balance/recharge",
            post(handlers::balance::recharge::<S>),
        )
        .route(
            "/api/v1/transactions",
            get(handlers::transactions::list_transactions::<S>),
        )
        .route(
            "/api/v1/transactions/pay",
            post(handlers::transactions::pay::<S>),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            store.clone(),
            middleware::auth::auth_middleware::<S>,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check::<S>))
        .route("/api/v1/rates", get(handlers::rates::list_rates::<S>))
        .route(
            "/api/v1/accounts",
            post(handlers::accounts::create_account::<S>),
        )
        .route("/api/v1/cards/recharge", post(handlers::cards::recharge::<S>))
        .route("/api/v1/cards/pay", post(handlers::cards::pay::<S>))
        .merge(authenticated_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // The web front-end is served from a different origin
                .layer(CorsLayer::permissive()),
        )
        .with_state(store)
}
