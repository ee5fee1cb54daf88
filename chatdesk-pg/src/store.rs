//! PostgreSQL `Store`.
//!
//! Renders the structured queries to SQL with `$n` placeholders and runs
//! them on a pooled connection. Each data row comes back as a single `jsonb`
//! column named `data`.

use crate::config::DbConfig;
use crate::error::{map_pg_error, map_pool_error};
use async_trait::async_trait;
use chatdesk_core::{QueryResult, StoreError};
use chatdesk_query::{
    CountQuery, DeleteStatement, InsertStatement, Rendered, SelectQuery, SqlParam, Store,
    StoreResult, UpdateStatement,
};
use deadpool_postgres::{Object, Pool, Status};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::debug;

/// Store backed by a deadpool connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    max_lifetime: Duration,
    idle_timeout: Duration,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("status", &self.pool.status())
            .field("max_lifetime", &self.max_lifetime)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Borrow a parameter as a driver value.
fn bind(param: &SqlParam) -> &(dyn ToSql + Sync) {
    match param {
        SqlParam::String(v) => v,
        SqlParam::OptString(v) => v,
        SqlParam::Int(v) => v,
        SqlParam::Long(v) => v,
        SqlParam::Bool(v) => v,
        SqlParam::Timestamp(v) => v,
        SqlParam::StringArray(v) => v,
    }
}

fn decode(row: &Row, column: &str) -> StoreResult<JsonValue> {
    row.try_get::<_, JsonValue>(column)
        .map_err(|e| StoreError::Decode {
            entity: "row".to_string(),
            reason: e.to_string(),
        })
}

impl PgStore {
    pub fn new(pool: Pool, max_lifetime: Duration, idle_timeout: Duration) -> Self {
        Self {
            pool,
            max_lifetime,
            idle_timeout,
        }
    }

    /// Build the pool from configuration.
    pub fn from_config(config: &DbConfig) -> QueryResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool, config.max_lifetime, config.idle_timeout))
    }

    /// Pool status for observability.
    pub fn status(&self) -> Status {
        self.pool.status()
    }

    /// Round trip a trivial query.
    pub async fn ping(&self) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1").await.map_err(map_pg_error)?;
        Ok(())
    }

    /// Drop stale idle connections, then check one out.
    async fn get_conn(&self) -> StoreResult<Object> {
        let max_lifetime = self.max_lifetime;
        let idle_timeout = self.idle_timeout;
        let pruned = self
            .pool
            .retain(|_, metrics| metrics.age() < max_lifetime && metrics.last_used() < idle_timeout);
        if !pruned.removed.is_empty() {
            debug!(removed = pruned.removed.len(), "pruned stale connections");
        }
        self.pool.get().await.map_err(map_pool_error)
    }

    async fn query(&self, rendered: &Rendered) -> StoreResult<Vec<Row>> {
        debug!(sql = %rendered.sql, params = rendered.params.len(), "query");
        let conn = self.get_conn().await?;
        let params: Vec<&(dyn ToSql + Sync)> = rendered.params.iter().map(bind).collect();
        conn.query(rendered.sql.as_str(), &params)
            .await
            .map_err(map_pg_error)
    }

    async fn execute(&self, rendered: &Rendered) -> StoreResult<u64> {
        debug!(sql = %rendered.sql, params = rendered.params.len(), "execute");
        let conn = self.get_conn().await?;
        let params: Vec<&(dyn ToSql + Sync)> = rendered.params.iter().map(bind).collect();
        conn.execute(rendered.sql.as_str(), &params)
            .await
            .map_err(map_pg_error)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, query: &CountQuery) -> StoreResult<i64> {
        let rows = self.query(&query.render()).await?;
        let row = rows.first().ok_or_else(|| StoreError::Execution {
            reason: "count returned no rows".to_string(),
        })?;
        row.try_get::<_, i64>(0).map_err(|e| StoreError::Decode {
            entity: "count".to_string(),
            reason: e.to_string(),
        })
    }

    async fn fetch(&self, query: &SelectQuery) -> StoreResult<Vec<JsonValue>> {
        let rows = self.query(&query.render()).await?;
        rows.iter().map(|row| decode(row, "data")).collect()
    }

    async fn insert(&self, statement: &InsertStatement) -> StoreResult<JsonValue> {
        let rows = self.query(&statement.render()).await?;
        let row = rows.first().ok_or_else(|| StoreError::Execution {
            reason: "insert returned no rows".to_string(),
        })?;
        decode(row, "data")
    }

    async fn update(&self, statement: &UpdateStatement) -> StoreResult<u64> {
        self.execute(&statement.render()).await
    }

    async fn delete(&self, statement: &DeleteStatement) -> StoreResult<u64> {
        self.execute(&statement.render()).await
    }
}
