//! HTTP surface for the OpenID token service.
//!
//! - /v1/status: health check
//! - /_matrix/client/v3/user/{user_id}/openid/request_token: issue (internal callers)
//! - /_matrix/federation/v1/openid/userinfo: verification for third parties

pub mod routes;

use crate::store::TokenRepository;
use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router<R: TokenRepository>(state: SharedState<R>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::openid_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
