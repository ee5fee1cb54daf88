//! Error types for chatdesk query operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Stable error codes handed to the transport layer.
///
/// The query layer never builds HTTP responses itself; callers map these
/// codes onto whatever envelope they use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Required field is missing from the request
    MissingField,

    /// Partial update carried no fields
    EmptyUpdate,

    /// Tenant identifier cannot be turned into a schema name
    InvalidTenant,

    /// Configuration value is invalid
    InvalidConfig,

    /// Unique or foreign key constraint rejected a write
    ConstraintViolation,

    /// Database operation failed
    DatabaseError,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Database is unreachable or the pool is closed
    ServiceUnavailable,

    /// Stored row could not be decoded
    DecodeFailed,

    /// Caller cancelled the request or its deadline passed
    Cancelled,
}

impl ErrorCode {
    /// Whether the code describes a problem with the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::MissingField
                | ErrorCode::EmptyUpdate
                | ErrorCode::InvalidTenant
                | ErrorCode::ConstraintViolation
        )
    }
}

// ============================================================================
// LAYERED ERRORS
// ============================================================================

/// Validation errors. Raised before any store round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Update for {entity} carries no fields")]
    EmptyUpdate { entity: String },
}

/// Configuration errors, including tenant identifiers that cannot name a schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid tenant identifier {tenant:?}: {reason}")]
    InvalidTenant { tenant: String, reason: String },
}

/// Store layer errors. Produced by `Store` implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Constraint {constraint} violated: {reason}")]
    Constraint { constraint: String, reason: String },

    #[error("Statement failed: {reason}")]
    Execution { reason: String },

    #[error("Failed to decode {entity}: {reason}")]
    Decode { entity: String, reason: String },

    #[error("Statement cancelled by the server")]
    Cancelled,
}

/// Master error type for query layer operations.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error during {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Operation {operation} cancelled")]
    Cancelled { operation: &'static str },
}

impl QueryError {
    /// Wrap a store error with the operation it interrupted.
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        QueryError::Store { operation, source }
    }

    /// Shorthand for a missing required field.
    pub fn missing_field(field: &str) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }
        .into()
    }

    /// Map this error onto a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryError::Validation(ValidationError::RequiredFieldMissing { .. }) => {
                ErrorCode::MissingField
            }
            QueryError::Validation(ValidationError::EmptyUpdate { .. }) => ErrorCode::EmptyUpdate,
            QueryError::Config(ConfigError::InvalidTenant { .. }) => ErrorCode::InvalidTenant,
            QueryError::Config(_) => ErrorCode::InvalidConfig,
            QueryError::Store { source, .. } => match source {
                StoreError::PoolExhausted => ErrorCode::ConnectionPoolExhausted,
                StoreError::Connection { .. } | StoreError::Unavailable { .. } => {
                    ErrorCode::ServiceUnavailable
                }
                StoreError::Constraint { .. } => ErrorCode::ConstraintViolation,
                StoreError::Decode { .. } => ErrorCode::DecodeFailed,
                StoreError::Cancelled => ErrorCode::Cancelled,
                StoreError::Execution { .. } => ErrorCode::DatabaseError,
            },
            QueryError::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }
}

/// Result type alias for query layer operations.
pub type QueryResult<T> = Result<T, QueryError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_constraint() {
        let err = StoreError::Constraint {
            constraint: "contacts_phone_agent_key".to_string(),
            reason: "duplicate key".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("contacts_phone_agent_key"));
        assert!(msg.contains("duplicate key"));
    }

    #[test]
    fn test_query_error_store_carries_operation() {
        let err = QueryError::store("fetch_chats", StoreError::PoolExhausted);
        let msg = format!("{}", err);
        assert!(msg.contains("fetch_chats"));
        assert!(msg.contains("pool exhausted"));
        assert_eq!(err.code(), ErrorCode::ConnectionPoolExhausted);
    }

    #[test]
    fn test_config_error_display_invalid_tenant() {
        let err = ConfigError::InvalidTenant {
            tenant: "a;b".to_string(),
            reason: "unexpected character".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("a;b"));
        assert!(msg.contains("unexpected character"));
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            QueryError::missing_field("agent_id").code(),
            ErrorCode::MissingField
        );
        assert_eq!(
            QueryError::from(ValidationError::EmptyUpdate {
                entity: "contact".to_string()
            })
            .code(),
            ErrorCode::EmptyUpdate
        );
        assert_eq!(
            QueryError::from(ConfigError::InvalidTenant {
                tenant: String::new(),
                reason: "empty".to_string()
            })
            .code(),
            ErrorCode::InvalidTenant
        );
        assert_eq!(
            QueryError::Cancelled { operation: "get_chat" }.code(),
            ErrorCode::Cancelled
        );
        assert_eq!(
            QueryError::store(
                "update_contact",
                StoreError::Unavailable {
                    reason: "closed".to_string()
                }
            )
            .code(),
            ErrorCode::ServiceUnavailable
        );
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::ConnectionPoolExhausted).unwrap();
        assert_eq!(json, "\"CONNECTION_POOL_EXHAUSTED\"");
        assert!(ErrorCode::EmptyUpdate.is_client_error());
        assert!(!ErrorCode::DatabaseError.is_client_error());
    }
}
