//! Internal service-to-service auth for the token request route.
//!
//! The client-facing API authenticates the user's access token and then calls
//! this service with the shared `AUTH_SERVICE_SECRET`.

use axum::http::HeaderMap;

use crate::error::OpenIdError;

pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// Verify an internal service call using the shared secret.
pub fn verify_internal(provided_secret: &str, expected_secret: &str) -> Result<(), OpenIdError> {
    if provided_secret != expected_secret || expected_secret.is_empty() {
        return Err(OpenIdError::Unauthorized);
    }
    Ok(())
}

/// Pull the internal secret out of the request headers and check it.
pub fn require_internal(headers: &HeaderMap, expected_secret: &str) -> Result<(), OpenIdError> {
    let provided = headers
        .get(INTERNAL_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(OpenIdError::Unauthorized)?;

    verify_internal(provided, expected_secret)
}
