//! Token record shapes shared by every repository backend.

use serde::Serialize;
use std::fmt;

use crate::error::OpenIdError;

/// The homeserver's own domain, used to render localparts into user IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerName(String);

impl ServerName {
    pub fn new(name: impl Into<String>) -> Result<Self, OpenIdError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OpenIdError::InvalidInput("server name must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render `@localpart:server`.
    pub fn user_id(&self, localpart: &str) -> String {
        format!("@{}:{}", localpart, self.0)
    }

    /// Extract the localpart of a user ID, provided it belongs to this server.
    pub fn localpart_of<'a>(&self, user_id: &'a str) -> Option<&'a str> {
        let rest = user_id.strip_prefix('@')?;
        let (localpart, server) = rest.split_once(':')?;
        if server != self.0 || localpart.is_empty() {
            return None;
        }
        Some(localpart)
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Input to an issue: the caller picks the token value, lifetime and relying party.
#[derive(Debug, Clone)]
pub struct NewOpenIdToken {
    pub token: String,
    pub localpart: String,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    /// An empty string is treated the same as `None` (unscoped).
    pub relying_party: Option<String>,
}

/// One row of `account_openid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenIdTokenRecord {
    pub token: String,
    pub localpart: String,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    pub relying_party: Option<String>,
}

impl OpenIdTokenRecord {
    /// Validate caller input and normalize it into a storable record.
    pub fn from_new(new: NewOpenIdToken) -> Result<Self, OpenIdError> {
        if new.token.is_empty() {
            return Err(OpenIdError::InvalidInput("token must not be empty".into()));
        }
        if new.localpart.is_empty() {
            return Err(OpenIdError::InvalidInput("localpart must not be empty".into()));
        }
        if new.created_at_ms < 0 {
            return Err(OpenIdError::InvalidInput(format!(
                "created_at_ms must be non-negative, got {}",
                new.created_at_ms
            )));
        }
        if new.expires_at_ms < 0 {
            return Err(OpenIdError::InvalidInput(format!(
                "expires_at_ms must be non-negative, got {}",
                new.expires_at_ms
            )));
        }

        Ok(Self {
            token: new.token,
            localpart: new.localpart,
            created_at_ms: new.created_at_ms,
            expires_at_ms: new.expires_at_ms,
            relying_party: new.relying_party.filter(|rp| !rp.is_empty()),
        })
    }

    /// Reject rows that could never have been written through `from_new`.
    pub(crate) fn check_stored_shape(&self) -> Result<(), OpenIdError> {
        let problem = if self.token.is_empty() {
            Some("empty token")
        } else if self.localpart.is_empty() {
            Some("empty localpart")
        } else if self.created_at_ms < 0 {
            Some("negative token_created_ts")
        } else if self.expires_at_ms < 0 {
            Some("negative token_expires_ts")
        } else if matches!(self.relying_party.as_deref(), Some("")) {
            Some("empty token_rp")
        } else {
            None
        };

        match problem {
            Some(p) => Err(OpenIdError::CorruptRecord(p.into())),
            None => Ok(()),
        }
    }
}

/// Lookup result: the stored record plus the fully-qualified user ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenIdTokenView {
    pub token: String,
    pub user_id: String,
    pub localpart: String,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    pub relying_party: Option<String>,
}

impl OpenIdTokenView {
    pub fn new(record: OpenIdTokenRecord, server_name: &ServerName) -> Self {
        Self {
            user_id: server_name.user_id(&record.localpart),
            token: record.token,
            localpart: record.localpart,
            created_at_ms: record.created_at_ms,
            expires_at_ms: record.expires_at_ms,
            relying_party: record.relying_party,
        }
    }

    /// Whether the token is past its expiry at `now_ms`. The store never calls this.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}
