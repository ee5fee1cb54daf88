//! Query layer configuration.

use crate::constants::{
    DEFAULT_CONTACT_SEARCH_LIMIT, DEFAULT_SCHEMA_PREFIX, MAX_IDENTIFIER_LEN, MAX_PAGE_LIMIT,
};
use crate::error::ConfigError;
use crate::tenant::is_identifier_safe;

/// Process-wide settings consulted while composing queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Prefix joined to the tenant id to name its schema.
    pub schema_prefix: String,
    /// Row cap for contact search.
    pub contact_search_limit: i64,
    /// Run an uncapped count alongside search instead of reporting the row count.
    pub exact_search_totals: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            schema_prefix: DEFAULT_SCHEMA_PREFIX.to_string(),
            contact_search_limit: DEFAULT_CONTACT_SEARCH_LIMIT,
            exact_search_totals: false,
        }
    }
}

impl QueryConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            schema_prefix: std::env::var("CHATDESK_SCHEMA_PREFIX")
                .unwrap_or(defaults.schema_prefix),
            contact_search_limit: std::env::var("CHATDESK_CONTACT_SEARCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.contact_search_limit),
            exact_search_totals: std::env::var("CHATDESK_EXACT_SEARCH_TOTALS")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.exact_search_totals),
        }
    }

    /// Check values that would otherwise surface as broken SQL later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.schema_prefix.is_empty() && !is_identifier_safe(&self.schema_prefix) {
            return Err(ConfigError::InvalidValue {
                field: "schema_prefix".to_string(),
                value: self.schema_prefix.clone(),
                reason: "only ASCII letters, digits, '_' and '-' are allowed".to_string(),
            });
        }
        if self.schema_prefix.len() >= MAX_IDENTIFIER_LEN {
            return Err(ConfigError::InvalidValue {
                field: "schema_prefix".to_string(),
                value: self.schema_prefix.clone(),
                reason: format!("must be shorter than {} bytes", MAX_IDENTIFIER_LEN),
            });
        }
        if self.contact_search_limit <= 0 || self.contact_search_limit > MAX_PAGE_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "contact_search_limit".to_string(),
                value: self.contact_search_limit.to_string(),
                reason: format!("must be between 1 and {}", MAX_PAGE_LIMIT),
            });
        }
        Ok(())
    }

    pub fn with_schema_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.schema_prefix = prefix.into();
        self
    }

    pub fn with_exact_search_totals(mut self, exact: bool) -> Self {
        self.exact_search_totals = exact;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = QueryConfig::default();
        assert_eq!(config.schema_prefix, "daisi_");
        assert_eq!(config.contact_search_limit, 50);
        assert!(!config.exact_search_totals);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_quoted_prefix() {
        let config = QueryConfig::default().with_schema_prefix("bad\"prefix");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "schema_prefix"
        ));
    }

    #[test]
    fn test_validate_allows_empty_prefix() {
        let config = QueryConfig::default().with_schema_prefix("");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_search_limit_out_of_range() {
        let mut config = QueryConfig::default();
        config.contact_search_limit = 0;
        assert!(config.validate().is_err());
        config.contact_search_limit = 101;
        assert!(config.validate().is_err());
        config.contact_search_limit = 100;
        assert!(config.validate().is_ok());
    }
}
