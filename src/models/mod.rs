//! Data models representing database entities and API payloads.

/// Stored-value account model
pub mod account;
/// Recharge and payment intents, request bodies and receipts
pub mod intent;
/// Append-only ledger model
pub mod ledger;
/// Service rate model
pub mod rate;
