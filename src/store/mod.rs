//! OpenID token store.
//!
//! Issues and looks up the short-lived tokens a client hands to a third party
//! to prove it controls a local account. The store records expiry but never
//! enforces it; callers compare `expires_at_ms` against their own clock.

pub mod memory;
pub mod postgres;
pub mod repository;
pub mod types;

pub use memory::MemoryTokenRepository;
pub use postgres::PgTokenRepository;
pub use repository::TokenRepository;
pub use types::{NewOpenIdToken, OpenIdTokenRecord, OpenIdTokenView, ServerName};

use crate::error::OpenIdError;
use tracing::{debug, warn};

/// Token store over any [`TokenRepository`].
pub struct OpenIdTokenStore<R: TokenRepository> {
    repo: R,
    server_name: ServerName,
}

impl<R: TokenRepository> OpenIdTokenStore<R> {
    /// Ensure the schema exists and return a ready store.
    ///
    /// Any failure here is reported as `OpenIdError::Initialization`; no store
    /// is returned in that case.
    pub async fn new(repo: R, server_name: ServerName) -> Result<Self, OpenIdError> {
        repo.ensure_schema().await.map_err(|e| match e {
            OpenIdError::Initialization(_) => e,
            other => OpenIdError::Initialization(other.to_string()),
        })?;

        Ok(Self { repo, server_name })
    }

    pub fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Open a unit of work the caller can pass to [`Self::issue_in`].
    pub async fn begin(&self) -> Result<R::Txn, OpenIdError> {
        self.repo.begin().await
    }

    pub async fn commit(&self, txn: R::Txn) -> Result<(), OpenIdError> {
        self.repo.commit(txn).await
    }

    /// Insert a new token record in its own implicit transaction.
    pub async fn issue(&self, new: NewOpenIdToken) -> Result<(), OpenIdError> {
        self.put(None, new).await
    }

    /// Insert a new token record as part of the caller's unit of work.
    ///
    /// The record becomes visible to lookups once the caller commits `txn`.
    pub async fn issue_in(&self, txn: &mut R::Txn, new: NewOpenIdToken) -> Result<(), OpenIdError> {
        self.put(Some(txn), new).await
    }

    async fn put(&self, txn: Option<&mut R::Txn>, new: NewOpenIdToken) -> Result<(), OpenIdError> {
        let record = OpenIdTokenRecord::from_new(new)?;
        self.repo.put(txn, &record).await?;

        debug!(
            localpart = %record.localpart,
            expires_at_ms = record.expires_at_ms,
            scoped = record.relying_party.is_some(),
            "Issued OpenID token"
        );
        Ok(())
    }

    /// Look up a token by exact value. Expired tokens are still returned.
    pub async fn lookup(&self, token: &str) -> Result<OpenIdTokenView, OpenIdError> {
        if token.is_empty() {
            return Err(OpenIdError::InvalidInput("token must not be empty".into()));
        }

        let record = self
            .repo
            .get_by_key(token)
            .await?
            .ok_or(OpenIdError::NotFound)?;

        if let Err(e) = record.check_stored_shape() {
            warn!(localpart = %record.localpart, "Rejecting stored OpenID token: {e}");
            return Err(e);
        }

        Ok(OpenIdTokenView::new(record, &self.server_name))
    }
}
