//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle units of work, pricing, and balance validation.

pub mod balance_service;
pub mod pricing;
