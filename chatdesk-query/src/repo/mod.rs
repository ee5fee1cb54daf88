//! Entity repositories.
//!
//! Each repository resolves the tenant schema, composes structured queries
//! and executes them through the shared `Store`. Every store round trip is
//! raced against the request's cancellation and wrapped with the operation
//! name on failure.

mod agent;
mod chat;
mod contact;
mod message;

pub use agent::AgentRepository;
pub use chat::ChatRepository;
pub use contact::ContactRepository;
pub use message::MessageRepository;

use crate::context::RequestContext;
use crate::pagination::{ListPlan, Slice};
use crate::schema::TenantSchema;
use crate::sql::{CountQuery, DeleteStatement, InsertStatement, SelectQuery, UpdateStatement};
use crate::store::Store;
use chatdesk_core::{Page, QueryConfig, QueryError, QueryResult, Record};
use std::sync::Arc;
use tracing::debug;

/// All four repositories over one store.
pub struct Repositories<S: ?Sized> {
    pub agents: AgentRepository<S>,
    pub chats: ChatRepository<S>,
    pub contacts: ContactRepository<S>,
    pub messages: MessageRepository<S>,
}

impl<S: Store + ?Sized> Repositories<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        let base = Base::new(store, Arc::new(config));
        Self {
            agents: AgentRepository::from_base(base.clone()),
            chats: ChatRepository::from_base(base.clone()),
            contacts: ContactRepository::from_base(base.clone()),
            messages: MessageRepository::from_base(base),
        }
    }
}

impl<S: ?Sized> Clone for Repositories<S> {
    fn clone(&self) -> Self {
        Self {
            agents: self.agents.clone(),
            chats: self.chats.clone(),
            contacts: self.contacts.clone(),
            messages: self.messages.clone(),
        }
    }
}

// ============================================================================
// SHARED EXECUTION
// ============================================================================

pub(crate) struct Base<S: ?Sized> {
    store: Arc<S>,
    config: Arc<QueryConfig>,
}

impl<S: ?Sized> Clone for Base<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: Store + ?Sized> Base<S> {
    pub(crate) fn new(store: Arc<S>, config: Arc<QueryConfig>) -> Self {
        Self { store, config }
    }

    pub(crate) fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub(crate) fn schema(&self, ctx: &RequestContext) -> QueryResult<TenantSchema> {
        TenantSchema::resolve(&self.config, ctx.tenant())
    }

    pub(crate) async fn count(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        query: &CountQuery,
    ) -> QueryResult<i64> {
        ctx.run(operation, async {
            self.store
                .count(query)
                .await
                .map_err(|e| QueryError::store(operation, e))
        })
        .await
    }

    pub(crate) async fn fetch<T: Record>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        query: &SelectQuery,
    ) -> QueryResult<Vec<T>> {
        let rows = ctx
            .run(operation, async {
                self.store
                    .fetch(query)
                    .await
                    .map_err(|e| QueryError::store(operation, e))
            })
            .await?;
        rows.into_iter()
            .map(|row| T::from_json(row).map_err(|e| QueryError::store(operation, e)))
            .collect()
    }

    /// First row of `plan`, if any.
    pub(crate) async fn fetch_one<T: Record>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        plan: &ListPlan,
    ) -> QueryResult<Option<T>> {
        let query = plan.select_query(Some(Slice {
            limit: 1,
            offset: 0,
        }));
        let mut rows = self.fetch::<T>(ctx, operation, &query).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// Count then data. A failed count aborts before the data query runs;
    /// an empty window returns an empty page without touching the store.
    pub(crate) async fn page<T: Record>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        plan: &ListPlan,
        slice: Option<Slice>,
    ) -> QueryResult<Page<T>> {
        let Some(slice) = slice else {
            debug!(operation, "empty window, skipping store");
            return Ok(Page::empty());
        };
        debug!(
            operation,
            predicates = plan.predicates.len(),
            limit = slice.limit,
            offset = slice.offset,
            "running page queries"
        );

        let total = self.count(ctx, operation, &plan.count_query()).await?;
        let items = self
            .fetch::<T>(ctx, operation, &plan.select_query(Some(slice)))
            .await?;
        Ok(Page::new(items, total))
    }

    pub(crate) async fn insert<T: Record>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        statement: &InsertStatement,
    ) -> QueryResult<T> {
        let row = ctx
            .run(operation, async {
                self.store
                    .insert(statement)
                    .await
                    .map_err(|e| QueryError::store(operation, e))
            })
            .await?;
        T::from_json(row).map_err(|e| QueryError::store(operation, e))
    }

    pub(crate) async fn update(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        statement: &UpdateStatement,
    ) -> QueryResult<u64> {
        ctx.run(operation, async {
            self.store
                .update(statement)
                .await
                .map_err(|e| QueryError::store(operation, e))
        })
        .await
    }

    pub(crate) async fn delete(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        statement: &DeleteStatement,
    ) -> QueryResult<u64> {
        ctx.run(operation, async {
            self.store
                .delete(statement)
                .await
                .map_err(|e| QueryError::store(operation, e))
        })
        .await
    }
}
