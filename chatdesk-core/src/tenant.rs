//! Tenant identifiers.
//!
//! A tenant id ends up inside a quoted SQL identifier, so it is checked
//! against a strict allow-list before any query is built.

use crate::error::{ConfigError, QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns true when `raw` is non-empty and only uses `[A-Za-z0-9_-]`.
pub fn is_identifier_safe(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validated tenant identifier (the company id of the caller).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse a raw tenant id.
    ///
    /// An empty id is a missing field; anything outside `[A-Za-z0-9_-]` is a
    /// configuration error since it can never name a schema.
    pub fn parse(raw: impl AsRef<str>) -> QueryResult<Self> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(QueryError::missing_field("tenant_id"));
        }
        if !is_identifier_safe(raw) {
            return Err(ConfigError::InvalidTenant {
                tenant: raw.to_string(),
                reason: "only ASCII letters, digits, '_' and '-' are allowed".to_string(),
            }
            .into());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantId::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
