//! Error types for pcbuilder storage operations.

use axum::http::StatusCode;

/// Errors that can occur during data store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataStoreError {
    /// The requested item was not found in the data store.
    #[error("item not found in data store")]
    NotFound,
    /// An item with the same identifier already exists.
    #[error("item already exists in data store")]
    AlreadyExists,
    /// The request referenced something that cannot be stored as given.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// An I/O or transport operation failed.
    #[error("IO error: {0}")]
    IoError(String),
    /// An internal storage system error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DataStoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DataStoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DataStoreError::AlreadyExists
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DataStoreError::InvalidInput(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                DataStoreError::InvalidInput(db_err.message().to_string())
            }
            _ => DataStoreError::Internal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataStoreError {
    fn from(e: serde_json::Error) -> Self {
        DataStoreError::SerializationError(e.to_string())
    }
}

/// Maps a store error onto the HTTP status and message returned by the API routers.
pub fn http_error(err: DataStoreError) -> (StatusCode, String) {
    match err {
        DataStoreError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        DataStoreError::AlreadyExists => (StatusCode::CONFLICT, err.to_string()),
        DataStoreError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        err => {
            tracing::error!(error = %err, "data store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
