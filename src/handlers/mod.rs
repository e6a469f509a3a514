//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, auth context)
//! 2. Validates the body into a typed intent and calls the service layer
//! 3. Returns HTTP response (JSON, status code)
//!
//! Handlers are generic over [`Store`](crate::store::Store) so the same
//! router serves PostgreSQL in production and the in-memory store in tests.

/// Account creation endpoint
pub mod accounts;
/// Token-path balance endpoints
pub mod balance;
/// Card-path endpoints
pub mod cards;
/// Health check endpoint
pub mod health;
/// Rate table endpoint
pub mod rates;
/// Token-path payment and history endpoints
pub mod transactions;
