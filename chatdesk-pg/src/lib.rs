//! Chatdesk PG - PostgreSQL Store
//!
//! Connection pooling with deadpool-postgres, SQL execution for the
//! structured queries built by `chatdesk-query`, driver error mapping, and
//! tracing subscriber setup.

pub mod config;
pub mod error;
pub mod store;
pub mod telemetry;

pub use config::DbConfig;
pub use error::{map_pg_error, map_pool_error};
pub use store::PgStore;
pub use telemetry::{init_tracing, TelemetryConfig};

use chatdesk_core::{QueryConfig, QueryResult};
use chatdesk_query::Repositories;
use std::sync::Arc;

/// Validate both configurations, build the pool, and wire the repositories.
pub fn connect(db: &DbConfig, query: QueryConfig) -> QueryResult<Repositories<PgStore>> {
    query.validate()?;
    let store = PgStore::from_config(db)?;
    tracing::info!(
        max_size = db.max_size,
        schema_prefix = %query.schema_prefix,
        "chatdesk store ready"
    );
    Ok(Repositories::new(Arc::new(store), query))
}
