//! PostgreSQL-backed repository for OpenID tokens.
//!
//! Table:
//! - `account_openid`: one row per issued token, keyed by the token value

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Postgres, Row, Transaction};

use super::repository::TokenRepository;
use super::types::OpenIdTokenRecord;
use crate::error::OpenIdError;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS account_openid (
    token            TEXT NOT NULL PRIMARY KEY,
    localpart        TEXT NOT NULL,
    token_created_ts BIGINT NOT NULL,
    token_expires_ts BIGINT NOT NULL,
    token_rp         TEXT
)
"#;

const INSERT_TOKEN_SQL: &str = "INSERT INTO account_openid \
     (token, localpart, token_created_ts, token_expires_ts, token_rp) \
     VALUES ($1, $2, $3, $4, $5)";

const SELECT_TOKEN_SQL: &str = "SELECT token, localpart, token_created_ts, token_expires_ts, token_rp \
     FROM account_openid WHERE token = $1";

/// Token repository backed by PostgreSQL.
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, OpenIdError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(|e| {
                OpenIdError::StorageUnavailable(format!("Failed to connect to PostgreSQL: {e}"))
            })?;

        Ok(Self { pool })
    }

    fn decode_row(row: &PgRow) -> Result<OpenIdTokenRecord, sqlx::Error> {
        Ok(OpenIdTokenRecord {
            token: row.try_get(0)?,
            localpart: row.try_get(1)?,
            created_at_ms: row.try_get(2)?,
            expires_at_ms: row.try_get(3)?,
            relying_party: row.try_get(4)?,
        })
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    type Txn = Transaction<'static, Postgres>;

    async fn ensure_schema(&self) -> Result<(), OpenIdError> {
        let init = |e: sqlx::Error| OpenIdError::Initialization(e.to_string());

        sqlx::query(SCHEMA_SQL).execute(&self.pool).await.map_err(init)?;

        // Preparing both statements up front surfaces schema drift at startup
        // instead of on the first request.
        let mut conn = self.pool.acquire().await.map_err(init)?;
        (&mut *conn).prepare(INSERT_TOKEN_SQL).await.map_err(init)?;
        (&mut *conn).prepare(SELECT_TOKEN_SQL).await.map_err(init)?;

        Ok(())
    }

    async fn begin(&self) -> Result<Self::Txn, OpenIdError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, txn: Self::Txn) -> Result<(), OpenIdError> {
        txn.commit().await?;
        Ok(())
    }

    async fn put(
        &self,
        txn: Option<&mut Self::Txn>,
        record: &OpenIdTokenRecord,
    ) -> Result<(), OpenIdError> {
        let query = sqlx::query(INSERT_TOKEN_SQL)
            .bind(&record.token)
            .bind(&record.localpart)
            .bind(record.created_at_ms)
            .bind(record.expires_at_ms)
            .bind(record.relying_party.as_deref());

        match txn {
            Some(txn) => query.execute(&mut **txn).await?,
            None => query.execute(&self.pool).await?,
        };

        Ok(())
    }

    async fn get_by_key(&self, token: &str) -> Result<Option<OpenIdTokenRecord>, OpenIdError> {
        let row = sqlx::query(SELECT_TOKEN_SQL)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::decode_row(&row)
                .map(Some)
                .map_err(OpenIdError::from_read),
            None => Ok(None),
        }
    }
}
