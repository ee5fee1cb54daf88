use super::Base;
use crate::context::RequestContext;
use crate::filter::{ChatFilter, RawParams};
use crate::join::CHAT_CONTACT;
use crate::pagination::{ListPlan, OffsetWindow, RangeWindow, Slice};
use crate::schema::TenantSchema;
use crate::search::SearchTerm;
use crate::sort::{ChatSort, Sort, SortRequest};
use crate::sql::{ColumnRef, Predicate, SqlParam};
use crate::store::Store;
use chatdesk_core::constants::CHAT_SEARCH_LIMIT;
use chatdesk_core::{ChatView, Page, QueryConfig, QueryResult, ValidateNonEmpty};
use std::sync::Arc;
use tracing::instrument;

/// Chats, each enriched with its contact.
pub struct ChatRepository<S: ?Sized> {
    base: Base<S>,
}

impl<S: ?Sized> Clone for ChatRepository<S> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
        }
    }
}

impl<S: Store + ?Sized> ChatRepository<S> {
    pub fn new(store: Arc<S>, config: Arc<QueryConfig>) -> Self {
        Self::from_base(Base::new(store, config))
    }

    pub(crate) fn from_base(base: Base<S>) -> Self {
        Self { base }
    }

    fn plan(schema: &TenantSchema) -> ListPlan {
        ListPlan::new(schema.chats()).join(CHAT_CONTACT.join(schema))
    }

    /// Offset-paginated chat list.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn fetch_chats(
        &self,
        ctx: &RequestContext,
        params: &RawParams,
        sort: &SortRequest,
        window: OffsetWindow,
    ) -> QueryResult<Page<ChatView>> {
        self.list(ctx, "fetch_chats", params, sort, Some(window.slice()))
            .await
    }

    /// Range-paginated chat list.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn fetch_range_chats(
        &self,
        ctx: &RequestContext,
        params: &RawParams,
        sort: &SortRequest,
        window: RangeWindow,
    ) -> QueryResult<Page<ChatView>> {
        self.list(ctx, "fetch_range_chats", params, sort, window.slice())
            .await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        params: &RawParams,
        sort: &SortRequest,
        slice: Option<Slice>,
    ) -> QueryResult<Page<ChatView>> {
        let schema = self.base.schema(ctx)?;
        let filter = ChatFilter::from_params(params);
        let plan = Self::plan(&schema)
            .filter(filter.predicates(&schema))
            .order(Sort::<ChatSort>::resolve(sort).order_by());
        self.base.page(ctx, operation, &plan, slice).await
    }

    #[instrument(skip_all, fields(tenant = %ctx.tenant(), chat_id = %chat_id))]
    pub async fn get_chat(
        &self,
        ctx: &RequestContext,
        chat_id: &str,
    ) -> QueryResult<Option<ChatView>> {
        chat_id.validate_non_empty("chat_id")?;
        let schema = self.base.schema(ctx)?;
        let plan = Self::plan(&schema).filter([Predicate::Eq(
            ColumnRef::primary("chat_id"),
            SqlParam::String(chat_id.to_string()),
        )]);
        self.base.fetch_one(ctx, "get_chat", &plan).await
    }

    /// Case-insensitive substring search over phone, push name, group name
    /// and the contact's custom name. Capped at 100 rows.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn search_chats(
        &self,
        ctx: &RequestContext,
        query: &str,
        agent_id: Option<&str>,
    ) -> QueryResult<Page<ChatView>> {
        let Some(term) = SearchTerm::parse(query) else {
            return Ok(Page::empty());
        };
        let schema = self.base.schema(ctx)?;

        let mut matches = term.matches(&[
            ColumnRef::primary("phone_number"),
            ColumnRef::primary("push_name"),
            ColumnRef::primary("group_name"),
        ]);
        matches.push(CHAT_CONTACT.exists(&schema, term.matches(&[ColumnRef::probe("custom_name")])));

        let mut plan = Self::plan(&schema)
            .filter([Predicate::Or(matches)])
            .order(Sort::<ChatSort>::default().order_by());
        if let Some(agent_id) = agent_id.map(str::trim).filter(|a| !a.is_empty()) {
            plan = plan.filter([Predicate::Eq(
                ColumnRef::primary("agent_id"),
                SqlParam::String(agent_id.to_string()),
            )]);
        }

        let exact_total = if self.base.config().exact_search_totals {
            Some(
                self.base
                    .count(ctx, "search_chats", &plan.count_query())
                    .await?,
            )
        } else {
            None
        };
        let items: Vec<ChatView> = self
            .base
            .fetch(
                ctx,
                "search_chats",
                &plan.select_query(Some(Slice {
                    limit: CHAT_SEARCH_LIMIT,
                    offset: 0,
                })),
            )
            .await?;
        let total = exact_total.unwrap_or(items.len() as i64);
        Ok(Page::new(items, total))
    }
}
