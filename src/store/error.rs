//! Store Errors
//!
//! Error types for store operations.

/// PostgreSQL `lock_not_available`, raised when `lock_timeout` expires
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

/// PostgreSQL `check_violation`
const PG_CHECK_VIOLATION: &str = "23514";

/// PostgreSQL `numeric_value_out_of_range`, raised when a BIGINT overflows
const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row lock or a pooled connection was not obtained in time
    #[error("Timed out waiting for a lock")]
    Timeout,

    /// A mutation targeted a row that does not exist
    #[error("Row not found: {0}")]
    MissingRow(String),

    /// A table constraint rejected the unit
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Persisted data failed domain validation
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Backend is unusable (poisoned lock, closed pool)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => return StoreError::Timeout,
            sqlx::Error::PoolClosed => {
                return StoreError::Unavailable("connection pool closed".to_string())
            }
            _ => {}
        }

        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                Some(PG_LOCK_NOT_AVAILABLE) => return StoreError::Timeout,
                Some(PG_CHECK_VIOLATION | PG_NUMERIC_OUT_OF_RANGE) => {
                    return StoreError::Constraint(db_err.message().to_string())
                }
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Timeout));
    }

    #[test]
    fn test_pool_closed_maps_to_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_other_errors_stay_database() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
