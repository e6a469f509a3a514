//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.

/// Bearer token authentication middleware
pub mod auth;
