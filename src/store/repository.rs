use async_trait::async_trait;

use super::types::OpenIdTokenRecord;
use crate::error::OpenIdError;

/// Keyed record storage behind the token store.
///
/// Implementations must enforce uniqueness of `token` themselves: a `put` for
/// an existing key fails with `OpenIdError::DuplicateToken` and leaves the
/// stored row untouched.
#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    /// A caller-owned unit of work. Dropping it without `commit` discards
    /// every write made through it.
    type Txn: Send;

    /// Create the backing table if absent and check the read/write paths.
    async fn ensure_schema(&self) -> Result<(), OpenIdError>;

    async fn begin(&self) -> Result<Self::Txn, OpenIdError>;

    async fn commit(&self, txn: Self::Txn) -> Result<(), OpenIdError>;

    /// Insert one record, inside `txn` when given.
    async fn put(
        &self,
        txn: Option<&mut Self::Txn>,
        record: &OpenIdTokenRecord,
    ) -> Result<(), OpenIdError>;

    /// Fetch the record stored under exactly `token`.
    async fn get_by_key(&self, token: &str) -> Result<Option<OpenIdTokenRecord>, OpenIdError>;
}
