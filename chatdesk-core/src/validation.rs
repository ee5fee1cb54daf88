//! Validation Traits
//!
//! Hard input checks that run before any store round trip.

use crate::error::{QueryError, QueryResult, ValidationError};

/// Trait for validating non-empty strings.
///
/// # Example
/// ```
/// use chatdesk_core::validation::ValidateNonEmpty;
///
/// assert!("agent-1".validate_non_empty("agent_id").is_ok());
/// assert!("  ".validate_non_empty("agent_id").is_err());
/// ```
pub trait ValidateNonEmpty {
    /// Validate that the value is non-empty.
    ///
    /// # Errors
    /// Returns a missing-field validation error if the value is empty or
    /// whitespace-only.
    fn validate_non_empty(&self, field_name: &str) -> QueryResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> QueryResult<()> {
        if self.trim().is_empty() {
            return Err(QueryError::missing_field(field_name));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for &str {
    fn validate_non_empty(&self, field_name: &str) -> QueryResult<()> {
        (*self).validate_non_empty(field_name)
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> QueryResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

impl<T: ValidateNonEmpty> ValidateNonEmpty for Option<T> {
    fn validate_non_empty(&self, field_name: &str) -> QueryResult<()> {
        match self {
            Some(value) => value.validate_non_empty(field_name),
            None => Err(QueryError::missing_field(field_name)),
        }
    }
}

/// Trait for partial update payloads.
///
/// # Example
/// ```
/// use chatdesk_core::validation::HasUpdates;
/// use chatdesk_core::ContactUpdate;
///
/// let update = ContactUpdate::default();
/// assert!(update.validate_has_updates().is_err());
/// ```
pub trait HasUpdates {
    /// Entity name used in the error.
    const ENTITY: &'static str;

    /// Check if any update fields are set.
    fn has_any_updates(&self) -> bool;

    /// Validate that at least one update field is set.
    fn validate_has_updates(&self) -> QueryResult<()> {
        if !self.has_any_updates() {
            return Err(ValidationError::EmptyUpdate {
                entity: Self::ENTITY.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
