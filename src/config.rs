use anyhow::{Context, Result};

/// Default lifetime of an issued OpenID token (one hour).
pub const DEFAULT_TOKEN_LIFETIME_MS: i64 = 3_600_000;

/// Longest accepted token lifetime (seven days).
pub const MAX_TOKEN_LIFETIME_MS: i64 = 7 * 24 * 3_600_000;

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,
    pub database_max_connections: u32,

    // ── Homeserver identity ─────────────────────────────────────────────
    /// Domain rendered into user IDs (`@localpart:server_name`).
    pub server_name: String,

    // ── Service-to-service auth ─────────────────────────────────────────
    /// Shared secret the client API presents when requesting tokens.
    pub auth_service_secret: String,

    // ── OpenID ──────────────────────────────────────────────────────────
    pub openid_token_lifetime_ms: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8090".into())
                .parse()
                .context("Invalid PORT")?,

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            server_name: std::env::var("SERVER_NAME")
                .context("SERVER_NAME is required (homeserver domain)")?,

            auth_service_secret: std::env::var("AUTH_SERVICE_SECRET")
                .context("AUTH_SERVICE_SECRET is required for service-to-service auth")?,

            openid_token_lifetime_ms: std::env::var("OPENID_TOKEN_LIFETIME_MS")
                .ok()
                .map(|v| v.parse::<i64>())
                .transpose()
                .context("Invalid OPENID_TOKEN_LIFETIME_MS")?
                .unwrap_or(DEFAULT_TOKEN_LIFETIME_MS),
        })
    }

    /// Check every field and report all problems at once.
    pub fn verify(&self) -> Result<(), ConfigErrors> {
        let mut errs = ConfigErrors::default();
        check_not_empty(&mut errs, "HOST", &self.host);
        check_not_empty(&mut errs, "DATABASE_URL", &self.database_url);
        check_not_empty(&mut errs, "SERVER_NAME", &self.server_name);
        check_not_empty(&mut errs, "AUTH_SERVICE_SECRET", &self.auth_service_secret);

        if self.database_max_connections == 0 {
            errs.add("DATABASE_MAX_CONNECTIONS must be at least 1".into());
        }
        if self.openid_token_lifetime_ms <= 0 {
            errs.add(format!(
                "OPENID_TOKEN_LIFETIME_MS must be positive, got {}",
                self.openid_token_lifetime_ms
            ));
        } else if self.openid_token_lifetime_ms > MAX_TOKEN_LIFETIME_MS {
            errs.add(format!(
                "OPENID_TOKEN_LIFETIME_MS must be at most {MAX_TOKEN_LIFETIME_MS}, got {}",
                self.openid_token_lifetime_ms
            ));
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Accumulated configuration problems.
#[derive(Debug, Default, thiserror::Error)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ConfigErrors(Vec<String>);

impl ConfigErrors {
    fn add(&mut self, msg: String) {
        self.0.push(msg);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

fn check_not_empty(errs: &mut ConfigErrors, key: &str, value: &str) {
    if value.trim().is_empty() {
        errs.add(format!("missing config key {key:?}"));
    }
}
