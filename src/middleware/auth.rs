//! Bearer token authentication middleware.
//!
//! Tokens are issued by the external auth system. This middleware only
//! resolves them:
//! 1. Extract the token from the Authorization header
//! 2. Hash it and look the hash up in the store
//! 3. Inject the resolved user into the request
//! 4. Reject unknown or revoked tokens with HTTP 401

use crate::{error::AppError, store::Store};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

/// Authentication context attached to authenticated requests.
///
/// Route handlers extract it with `Extension<AuthContext>` to build the
/// token-path actor.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Id of the account the token belongs to
    pub user_id: i64,
}

/// SHA-256 hex digest under which a token is stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the `<token>` using SHA-256
/// 3. Look up an active token with that hash
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware<S: Store>(
    State(store): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::InvalidToken)?;
    let token_hash = hash_token(token);

    let user_id = store
        .resolve_token(&token_hash)
        .await?
        .ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(AuthContext { user_id });

    Ok(next.run(request).await)
}
