//! Error types for the PostgreSQL storage backend.

use sqlx_core::error::Error as SqlxError;
use storefront_storage::StorageError;

/// PostgreSQL error code for unique constraint violation (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for check constraint violation (23514).
pub const PG_CHECK_VIOLATION: &str = "23514";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is a unique violation (23505).
pub fn is_unique_violation(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNIQUE_VIOLATION)
}

/// Maps a query failure to a storage error, turning constraint violations
/// into their typed counterparts.
pub(crate) fn query_error(
    entity: &str,
    id: impl ToString,
    action: &str,
) -> impl FnOnce(SqlxError) -> StorageError {
    let entity = entity.to_string();
    let id = id.to_string();
    let action = action.to_string();
    move |e| {
        if is_unique_violation(&e) {
            StorageError::already_exists(entity, id)
        } else if has_pg_error_code(&e, PG_CHECK_VIOLATION) {
            StorageError::invalid_entity(format!("{entity} {id}: {e}"))
        } else if matches!(e, SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_)) {
            StorageError::connection_error(e.to_string())
        } else {
            StorageError::internal(format!("Failed to {action} {entity} {id}: {e}"))
        }
    }
}

/// Errors specific to the PostgreSQL storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::Migration("boom".into());
        assert_eq!(err.to_string(), "Migration error: boom");
    }

    #[test]
    fn test_conversion_to_storage_error() {
        let storage_err: StorageError = PostgresError::config("test error").into();
        assert!(matches!(storage_err, StorageError::Internal { .. }));

        let storage_err: StorageError = PostgresError::Connection(SqlxError::PoolTimedOut).into();
        assert!(matches!(storage_err, StorageError::ConnectionError { .. }));
    }

    #[test]
    fn test_query_error_maps_pool_failures() {
        let map = query_error("voucher_order", 1, "insert");
        assert!(matches!(
            map(SqlxError::PoolTimedOut),
            StorageError::ConnectionError { .. }
        ));

        let map = query_error("voucher_order", 1, "insert");
        assert!(matches!(
            map(SqlxError::RowNotFound),
            StorageError::Internal { .. }
        ));
    }
}
