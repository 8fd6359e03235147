use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use openid_token_store::store::{OpenIdTokenStore, PgTokenRepository, ServerName};
use openid_token_store::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openid_token_store=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    config.verify()?;
    info!("openid-token-store v{}", env!("CARGO_PKG_VERSION"));

    let server_name = ServerName::new(config.server_name.clone())?;
    let repo =
        PgTokenRepository::connect(&config.database_url, config.database_max_connections).await?;
    let store = OpenIdTokenStore::new(repo, server_name).await?;
    info!("Database connected, account_openid ready");

    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        store,
    });

    let app = api::router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
