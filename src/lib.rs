pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use config::Config;
pub use error::OpenIdError;
pub use store::{OpenIdTokenStore, PgTokenRepository};

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState<R: store::TokenRepository = PgTokenRepository> {
    pub config: Config,
    pub store: OpenIdTokenStore<R>,
}

pub type SharedState<R = PgTokenRepository> = Arc<AppState<R>>;
