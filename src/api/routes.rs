//! Route handlers.
//!
//! These handlers are the token store's caller: they pick token values and
//! lifetimes on issue, and they enforce expiry on verification.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{generate_token, require_internal};
use crate::error::OpenIdError;
use crate::store::{NewOpenIdToken, TokenRepository};
use crate::SharedState;

/// Fresh token values to try before giving up on a request.
const MAX_ISSUE_ATTEMPTS: usize = 3;

pub fn openid_router<R: TokenRepository>(state: SharedState<R>) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/v1/status", get(status))
        // ── OpenID ───────────────────────────────────────────────────────
        .route(
            "/_matrix/client/v3/user/{user_id}/openid/request_token",
            post(request_token::<R>),
        )
        .route(
            "/_matrix/federation/v1/openid/userinfo",
            get(userinfo::<R>),
        )
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "openid-token-store",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Token request
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct RequestTokenBody {
    /// Service the token is meant for. Omitted or empty means unscoped.
    #[serde(default)]
    relying_party: Option<String>,
}

/// POST /_matrix/client/v3/user/{user_id}/openid/request_token
///
/// Called by the client API after it has authenticated `user_id`.
async fn request_token<R: TokenRepository>(
    State(state): State<SharedState<R>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, OpenIdError> {
    require_internal(&headers, &state.config.auth_service_secret)?;

    let body: RequestTokenBody = if body.iter().all(u8::is_ascii_whitespace) {
        RequestTokenBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| OpenIdError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let server_name = state.store.server_name();
    let localpart = server_name
        .localpart_of(&user_id)
        .ok_or_else(|| OpenIdError::Forbidden(format!("{user_id} is not a local user")))?;

    let lifetime_ms = state.config.openid_token_lifetime_ms;
    let created_at_ms = Utc::now().timestamp_millis();
    let expires_at_ms = created_at_ms
        .checked_add(lifetime_ms)
        .ok_or_else(|| OpenIdError::Internal("OpenID token lifetime overflows expiry".into()))?;

    for attempt in 1..=MAX_ISSUE_ATTEMPTS {
        let token = generate_token();
        let new = NewOpenIdToken {
            token: token.clone(),
            localpart: localpart.to_string(),
            created_at_ms,
            expires_at_ms,
            relying_party: body.relying_party.clone(),
        };

        match state.store.issue(new).await {
            Ok(()) => {
                info!(%user_id, "Issued OpenID token");
                return Ok(Json(json!({
                    "access_token": token,
                    "token_type": "Bearer",
                    "matrix_server_name": server_name.as_str(),
                    "expires_in": lifetime_ms / 1000,
                })));
            }
            Err(OpenIdError::DuplicateToken) => {
                warn!(attempt, "Generated OpenID token collided, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(OpenIdError::Internal(
        "could not allocate a unique OpenID token".into(),
    ))
}

// =============================================================================
// Federation userinfo
// =============================================================================

#[derive(Deserialize)]
struct UserInfoQuery {
    access_token: Option<String>,
}

/// GET /_matrix/federation/v1/openid/userinfo: resolve a token to its user.
///
/// The store reports expiry without enforcing it, so the check happens here.
async fn userinfo<R: TokenRepository>(
    State(state): State<SharedState<R>>,
    Query(q): Query<UserInfoQuery>,
) -> Result<Json<serde_json::Value>, OpenIdError> {
    let access_token = q.access_token.ok_or(OpenIdError::Unauthorized)?;

    let view = match state.store.lookup(&access_token).await {
        Ok(view) => view,
        Err(OpenIdError::NotFound | OpenIdError::InvalidInput(_)) => {
            return Err(OpenIdError::UnknownToken)
        }
        Err(e) => return Err(e),
    };

    if view.is_expired_at(Utc::now().timestamp_millis()) {
        return Err(OpenIdError::UnknownToken);
    }

    Ok(Json(json!({ "sub": view.user_id })))
}
