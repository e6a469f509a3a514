//! Request extractors.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections are reported as [`AppError::InvalidRequest`].
///
/// A body that is not JSON, or whose fields have the wrong type, gets the
/// same 400 error body as every other invalid input.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
