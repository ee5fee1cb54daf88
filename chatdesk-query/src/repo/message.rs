use super::Base;
use crate::context::RequestContext;
use crate::pagination::{ListPlan, OffsetWindow, RangeWindow, Slice};
use crate::schema::TenantSchema;
use crate::sort::{MessageSort, Sort, SortRequest};
use crate::sql::{ColumnRef, Predicate, SqlParam};
use crate::store::Store;
use chatdesk_core::{Message, Page, QueryConfig, QueryResult, ValidateNonEmpty};
use std::sync::Arc;
use tracing::instrument;

/// Messages of one chat. Every call is scoped by agent and chat.
pub struct MessageRepository<S: ?Sized> {
    base: Base<S>,
}

impl<S: ?Sized> Clone for MessageRepository<S> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
        }
    }
}

impl<S: Store + ?Sized> MessageRepository<S> {
    pub fn new(store: Arc<S>, config: Arc<QueryConfig>) -> Self {
        Self::from_base(Base::new(store, config))
    }

    pub(crate) fn from_base(base: Base<S>) -> Self {
        Self { base }
    }

    fn scoped_plan(
        schema: &TenantSchema,
        agent_id: &str,
        chat_id: &str,
    ) -> QueryResult<ListPlan> {
        agent_id.validate_non_empty("agent_id")?;
        chat_id.validate_non_empty("chat_id")?;
        Ok(ListPlan::new(schema.messages()).filter([
            Predicate::Eq(
                ColumnRef::primary("agent_id"),
                SqlParam::String(agent_id.to_string()),
            ),
            Predicate::Eq(
                ColumnRef::primary("chat_id"),
                SqlParam::String(chat_id.to_string()),
            ),
        ]))
    }

    /// Offset-paginated messages of a chat. Rows without a protocol key are
    /// skipped.
    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent_id, chat_id = %chat_id))]
    pub async fn fetch_messages(
        &self,
        ctx: &RequestContext,
        agent_id: &str,
        chat_id: &str,
        sort: &SortRequest,
        window: OffsetWindow,
    ) -> QueryResult<Page<Message>> {
        self.list(ctx, "fetch_messages", agent_id, chat_id, sort, Some(window.slice()))
            .await
    }

    /// Range-paginated messages of a chat.
    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent_id, chat_id = %chat_id))]
    pub async fn fetch_range_messages(
        &self,
        ctx: &RequestContext,
        agent_id: &str,
        chat_id: &str,
        sort: &SortRequest,
        window: RangeWindow,
    ) -> QueryResult<Page<Message>> {
        self.list(ctx, "fetch_range_messages", agent_id, chat_id, sort, window.slice())
            .await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        agent_id: &str,
        chat_id: &str,
        sort: &SortRequest,
        slice: Option<Slice>,
    ) -> QueryResult<Page<Message>> {
        let schema = self.base.schema(ctx)?;
        let plan = Self::scoped_plan(&schema, agent_id, chat_id)?
            .filter([Predicate::IsNotNull(ColumnRef::primary("key"))])
            .order(Sort::<MessageSort>::resolve(sort).order_by());
        self.base.page(ctx, operation, &plan, slice).await
    }

    #[instrument(skip_all, fields(tenant = %ctx.tenant(), message_id = %message_id))]
    pub async fn get_message(
        &self,
        ctx: &RequestContext,
        agent_id: &str,
        chat_id: &str,
        message_id: &str,
    ) -> QueryResult<Option<Message>> {
        message_id.validate_non_empty("message_id")?;
        let schema = self.base.schema(ctx)?;
        let plan = Self::scoped_plan(&schema, agent_id, chat_id)?.filter([Predicate::Eq(
            ColumnRef::primary("message_id"),
            SqlParam::String(message_id.to_string()),
        )]);
        self.base.fetch_one(ctx, "get_message", &plan).await
    }
}
