//! Driver and pool error mapping.
//!
//! Raw driver errors are logged in full here and reduced to a `StoreError`
//! that carries no connection details.

use chatdesk_core::StoreError;
use deadpool_postgres::PoolError;
use tokio_postgres::error::SqlState;

/// SQLSTATE class for integrity constraint violations.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Map a `tokio_postgres::Error` to a `StoreError`.
pub fn map_pg_error(err: tokio_postgres::Error) -> StoreError {
    tracing::error!("Database error: {:?}", err);

    if err.is_closed() {
        return StoreError::Connection {
            reason: "connection closed".to_string(),
        };
    }

    let Some(db) = err.as_db_error() else {
        return StoreError::Connection {
            reason: "database connection failed".to_string(),
        };
    };

    if *db.code() == SqlState::QUERY_CANCELED {
        return StoreError::Cancelled;
    }
    if db.code().code().starts_with(INTEGRITY_CONSTRAINT_CLASS) {
        return StoreError::Constraint {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
            reason: db.message().to_string(),
        };
    }
    StoreError::Execution {
        reason: format!("{} ({})", db.message(), db.code().code()),
    }
}

/// Map a pool checkout failure to a `StoreError`.
pub fn map_pool_error(err: PoolError) -> StoreError {
    tracing::error!("Connection pool error: {:?}", err);

    match err {
        PoolError::Timeout(_) => StoreError::PoolExhausted,
        PoolError::Closed => StoreError::Unavailable {
            reason: "Database connection pool is closed".to_string(),
        },
        PoolError::Backend(e) => map_pg_error(e),
        _ => StoreError::Connection {
            reason: "Failed to acquire database connection".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool_postgres::TimeoutType;

    #[test]
    fn test_pool_timeout_is_exhaustion() {
        assert_eq!(
            map_pool_error(PoolError::Timeout(TimeoutType::Wait)),
            StoreError::PoolExhausted
        );
    }

    #[test]
    fn test_closed_pool_is_unavailable() {
        assert!(matches!(
            map_pool_error(PoolError::Closed),
            StoreError::Unavailable { .. }
        ));
    }
}
