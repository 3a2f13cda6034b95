//! Admin token authentication

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Extract the bearer token from a request
pub fn extract_token(req: &Request) -> Option<&str> {
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim());
            }
        }
    }

    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str.trim());
        }
    }

    None
}

/// Hash a token for comparison
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of two digests
fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Authentication middleware. Open when no admin token is configured.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_token_hash.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = extract_token(&request).ok_or_else(|| {
        warn!("Missing admin token in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    if !digests_match(&hash_token(token), expected) {
        warn!("Invalid admin token in request to {}", request.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_sha256_hex() {
        assert_eq!(
            hash_token("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn test_digests_match() {
        let digest = hash_token("secret");
        assert!(digests_match(&digest, &hash_token("secret")));
        assert!(!digests_match(&digest, &hash_token("Secret")));
        assert!(!digests_match(&digest, "short"));
    }
}
