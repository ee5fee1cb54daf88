//! Connection pool configuration.

use chatdesk_core::{ConfigError, QueryError, QueryResult, StoreError};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use std::time::Duration;
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Full connection string; overrides the discrete fields when set.
    pub dsn: Option<String>,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait, connect and recycle timeout
    pub timeout: Duration,
    /// Connections older than this are dropped at checkout.
    pub max_lifetime: Duration,
    /// Connections idle longer than this are dropped at checkout.
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "chatdesk".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            dsn: None,
            max_size: 50,
            timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CHATDESK_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("CHATDESK_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("CHATDESK_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("CHATDESK_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("CHATDESK_DB_PASSWORD").unwrap_or_default(),
            dsn: std::env::var("CHATDESK_PG_DSN").ok().filter(|s| !s.trim().is_empty()),
            max_size: std::env::var("CHATDESK_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: env_secs("CHATDESK_DB_TIMEOUT", defaults.timeout),
            max_lifetime: env_secs("CHATDESK_DB_MAX_LIFETIME", defaults.max_lifetime),
            idle_timeout: env_secs("CHATDESK_DB_IDLE_TIMEOUT", defaults.idle_timeout),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_size".to_string(),
                value: "0".to_string(),
                reason: "pool needs at least one connection".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.dsn.is_none() && self.host.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "host".to_string(),
            });
        }
        Ok(())
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; the first checkout connects.
    pub fn create_pool(&self) -> QueryResult<Pool> {
        self.validate()?;

        let mut cfg = Config::new();
        match &self.dsn {
            Some(dsn) => cfg.url = Some(dsn.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = PoolConfig::new(self.max_size);
        pool.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                QueryError::store(
                    "create_pool",
                    StoreError::Connection {
                        reason: format!("Failed to create pool: {}", e),
                    },
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_size, 50);
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_overrides_and_ignores_garbage() {
        let _size = EnvVarGuard::set("CHATDESK_DB_POOL_SIZE", Some("8"));
        let _idle = EnvVarGuard::set("CHATDESK_DB_IDLE_TIMEOUT", Some("not-a-number"));
        let _dsn = EnvVarGuard::set("CHATDESK_PG_DSN", Some("  "));
        let config = DbConfig::from_env();
        assert_eq!(config.max_size, 8);
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert!(config.dsn.is_none());
    }

    #[test]
    fn test_zero_pool_is_invalid() {
        let config = DbConfig {
            max_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "max_size"
        ));
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        let config = DbConfig {
            host: "db.invalid".to_string(),
            max_size: 4,
            ..Default::default()
        };
        let pool = config.create_pool().unwrap();
        assert_eq!(pool.status().max_size, 4);
        assert_eq!(pool.status().size, 0);
    }
}
