use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the OpenID token service.
#[derive(Debug, thiserror::Error)]
pub enum OpenIdError {
    // ── Store Errors ────────────────────────────────────────────────────
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Token already exists")]
    DuplicateToken,

    #[error("Token not found")]
    NotFound,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Corrupt token record: {0}")]
    CorruptRecord(String),

    #[error("Token store initialization failed: {0}")]
    Initialization(String),

    // ── Request Errors ──────────────────────────────────────────────────
    #[error("Authentication required")]
    Unauthorized,

    #[error("Unknown or expired OpenID token")]
    UnknownToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OpenIdError {
    /// Map a driver error raised while decoding a fetched row.
    ///
    /// A row that exists but cannot be read back is a data-integrity problem,
    /// so decode failures become `CorruptRecord`; everything else stays a
    /// storage failure.
    pub fn from_read(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. } => {
                tracing::warn!("Undecodable token row: {e}");
                OpenIdError::CorruptRecord(e.to_string())
            }
            other => other.into(),
        }
    }
}

impl From<sqlx::Error> for OpenIdError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return OpenIdError::DuplicateToken;
            }
        }
        tracing::error!("Database error: {e}");
        OpenIdError::StorageUnavailable(e.to_string())
    }
}

impl IntoResponse for OpenIdError {
    fn into_response(self) -> Response {
        let (status, errcode) = match &self {
            OpenIdError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "M_INVALID_PARAM"),
            OpenIdError::BadRequest(_) => (StatusCode::BAD_REQUEST, "M_BAD_JSON"),
            OpenIdError::Unauthorized => (StatusCode::UNAUTHORIZED, "M_MISSING_TOKEN"),
            OpenIdError::UnknownToken | OpenIdError::NotFound => {
                (StatusCode::UNAUTHORIZED, "M_UNKNOWN_TOKEN")
            }
            OpenIdError::Forbidden(_) => (StatusCode::FORBIDDEN, "M_FORBIDDEN"),
            OpenIdError::DuplicateToken => (StatusCode::CONFLICT, "M_UNKNOWN"),
            OpenIdError::StorageUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "M_UNKNOWN")
            }
            OpenIdError::CorruptRecord(_)
            | OpenIdError::Initialization(_)
            | OpenIdError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "M_UNKNOWN"),
        };

        // Storage details stay in the logs.
        let message = match &self {
            OpenIdError::StorageUnavailable(_)
            | OpenIdError::CorruptRecord(_)
            | OpenIdError::Initialization(_)
            | OpenIdError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = json!({
            "errcode": errcode,
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_storage_failure() {
        let err: OpenIdError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, OpenIdError::StorageUnavailable(_)));
    }

    #[test]
    fn test_decode_error_is_corrupt_record() {
        let err = OpenIdError::from_read(sqlx::Error::ColumnNotFound("token_rp".into()));
        assert!(matches!(err, OpenIdError::CorruptRecord(_)));
    }

    #[test]
    fn test_read_path_keeps_io_errors_as_storage_failures() {
        let err = OpenIdError::from_read(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, OpenIdError::StorageUnavailable(_)));
    }

    #[test]
    fn test_unknown_token_status() {
        let resp = OpenIdError::UnknownToken.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_storage_failure_status() {
        let resp = OpenIdError::StorageUnavailable("connection reset".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
