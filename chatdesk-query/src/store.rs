//! Store port.
//!
//! Repositories never talk to a database directly; they hand structured
//! queries to a `Store`. `chatdesk-pg` renders them for PostgreSQL and
//! `chatdesk-test-utils` evaluates them in memory.

use crate::sql::{CountQuery, DeleteStatement, InsertStatement, SelectQuery, UpdateStatement};
use async_trait::async_trait;
use chatdesk_core::StoreError;
use serde_json::Value as JsonValue;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Number of rows matching a count query.
    async fn count(&self, query: &CountQuery) -> StoreResult<i64>;

    /// Rows of a data query, one JSON object each.
    async fn fetch(&self, query: &SelectQuery) -> StoreResult<Vec<JsonValue>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, statement: &InsertStatement) -> StoreResult<JsonValue>;

    /// Number of rows updated.
    async fn update(&self, statement: &UpdateStatement) -> StoreResult<u64>;

    /// Number of rows deleted.
    async fn delete(&self, statement: &DeleteStatement) -> StoreResult<u64>;
}
