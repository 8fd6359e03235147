//! In-memory repository with the same uniqueness and unit-of-work rules as
//! the PostgreSQL backend. Used by tests and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::repository::TokenRepository;
use super::types::OpenIdTokenRecord;
use crate::error::OpenIdError;

#[derive(Clone, Default)]
pub struct MemoryTokenRepository {
    rows: Arc<Mutex<HashMap<String, OpenIdTokenRecord>>>,
    unavailable: Arc<AtomicBool>,
}

/// Writes buffered until `commit`.
#[derive(Debug, Default)]
pub struct MemoryTxn {
    pending: Vec<OpenIdTokenRecord>,
}

impl MemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend outage: every call fails with `StorageUnavailable`
    /// until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> Result<usize, OpenIdError> {
        Ok(self.rows()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, OpenIdError> {
        Ok(self.len()? == 0)
    }

    fn check_available(&self) -> Result<(), OpenIdError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OpenIdError::StorageUnavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<String, OpenIdTokenRecord>>, OpenIdError> {
        self.rows
            .lock()
            .map_err(|_| OpenIdError::StorageUnavailable("memory store lock poisoned".into()))
    }

    /// Store a row without any validation, standing in for a damaged table.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, record: OpenIdTokenRecord) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(record.token.clone(), record);
        }
    }
}

#[async_trait]
impl TokenRepository for MemoryTokenRepository {
    type Txn = MemoryTxn;

    async fn ensure_schema(&self) -> Result<(), OpenIdError> {
        self.check_available()
            .map_err(|e| OpenIdError::Initialization(e.to_string()))
    }

    async fn begin(&self) -> Result<Self::Txn, OpenIdError> {
        self.check_available()?;
        Ok(MemoryTxn::default())
    }

    async fn commit(&self, txn: Self::Txn) -> Result<(), OpenIdError> {
        self.check_available()?;
        let mut rows = self.rows()?;

        // All or nothing: a key committed by someone else since `put` aborts
        // the whole unit of work.
        if txn.pending.iter().any(|r| rows.contains_key(&r.token)) {
            return Err(OpenIdError::DuplicateToken);
        }
        for record in txn.pending {
            rows.insert(record.token.clone(), record);
        }
        Ok(())
    }

    async fn put(
        &self,
        txn: Option<&mut Self::Txn>,
        record: &OpenIdTokenRecord,
    ) -> Result<(), OpenIdError> {
        self.check_available()?;
        let mut rows = self.rows()?;

        if rows.contains_key(&record.token) {
            return Err(OpenIdError::DuplicateToken);
        }

        match txn {
            Some(txn) => {
                if txn.pending.iter().any(|r| r.token == record.token) {
                    return Err(OpenIdError::DuplicateToken);
                }
                txn.pending.push(record.clone());
            }
            None => {
                rows.insert(record.token.clone(), record.clone());
            }
        }
        Ok(())
    }

    async fn get_by_key(&self, token: &str) -> Result<Option<OpenIdTokenRecord>, OpenIdError> {
        self.check_available()?;
        Ok(self.rows()?.get(token).cloned())
    }
}
