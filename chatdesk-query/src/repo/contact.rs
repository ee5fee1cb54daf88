use super::Base;
use crate::context::RequestContext;
use crate::filter::{ContactFilter, RawParams};
use crate::join::CONTACT_CHAT;
use crate::pagination::{ListPlan, OffsetWindow, RangeWindow, Slice};
use crate::schema::TenantSchema;
use crate::search::SearchTerm;
use crate::sort::{ContactSort, Sort, SortRequest};
use crate::sql::{ColumnRef, Predicate, SqlParam, UpdateStatement};
use crate::store::Store;
use chatdesk_core::constants::MAX_PAGE_LIMIT;
use chatdesk_core::{
    ContactUpdate, ContactView, HasUpdates, Page, QueryConfig, QueryResult, ValidateNonEmpty,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Contacts, each enriched with its chat.
pub struct ContactRepository<S: ?Sized> {
    base: Base<S>,
}

impl<S: ?Sized> Clone for ContactRepository<S> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
        }
    }
}

impl<S: Store + ?Sized> ContactRepository<S> {
    pub fn new(store: Arc<S>, config: Arc<QueryConfig>) -> Self {
        Self::from_base(Base::new(store, config))
    }

    pub(crate) fn from_base(base: Base<S>) -> Self {
        Self { base }
    }

    fn plan(schema: &TenantSchema) -> ListPlan {
        ListPlan::new(schema.contacts()).join(CONTACT_CHAT.join(schema))
    }

    /// Offset-paginated contact list.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn fetch_contacts(
        &self,
        ctx: &RequestContext,
        params: &RawParams,
        sort: &SortRequest,
        window: OffsetWindow,
    ) -> QueryResult<Page<ContactView>> {
        self.list(ctx, "fetch_contacts", params, sort, Some(window.slice()))
            .await
    }

    /// Range-paginated contact list.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn fetch_range_contacts(
        &self,
        ctx: &RequestContext,
        params: &RawParams,
        sort: &SortRequest,
        window: RangeWindow,
    ) -> QueryResult<Page<ContactView>> {
        self.list(ctx, "fetch_range_contacts", params, sort, window.slice())
            .await
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        params: &RawParams,
        sort: &SortRequest,
        slice: Option<Slice>,
    ) -> QueryResult<Page<ContactView>> {
        let schema = self.base.schema(ctx)?;
        let filter = ContactFilter::from_params(params);
        let plan = Self::plan(&schema)
            .filter(filter.predicates(&schema))
            .order(Sort::<ContactSort>::resolve(sort).order_by());
        self.base.page(ctx, operation, &plan, slice).await
    }

    #[instrument(skip_all, fields(tenant = %ctx.tenant(), contact_id = %id))]
    pub async fn get_contact(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> QueryResult<Option<ContactView>> {
        id.validate_non_empty("id")?;
        let schema = self.base.schema(ctx)?;
        let plan = Self::plan(&schema).filter([Predicate::Eq(
            ColumnRef::primary("id"),
            SqlParam::String(id.to_string()),
        )]);
        self.base.fetch_one(ctx, "get_contact", &plan).await
    }

    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent_id))]
    pub async fn get_contact_by_phone_and_agent(
        &self,
        ctx: &RequestContext,
        phone_number: &str,
        agent_id: &str,
    ) -> QueryResult<Option<ContactView>> {
        phone_number.validate_non_empty("phone_number")?;
        agent_id.validate_non_empty("agent_id")?;
        let schema = self.base.schema(ctx)?;
        let plan = Self::plan(&schema).filter([
            Predicate::Eq(
                ColumnRef::primary("phone_number"),
                SqlParam::String(phone_number.to_string()),
            ),
            Predicate::Eq(
                ColumnRef::primary("agent_id"),
                SqlParam::String(agent_id.to_string()),
            ),
        ]);
        self.base
            .fetch_one(ctx, "get_contact_by_phone_and_agent", &plan)
            .await
    }

    /// Partial update: read, write the present fields, read back.
    ///
    /// Not transactional; concurrent writers are last-write-wins.
    #[instrument(skip_all, fields(tenant = %ctx.tenant(), contact_id = %id))]
    pub async fn update_contact(
        &self,
        ctx: &RequestContext,
        id: &str,
        update: &ContactUpdate,
    ) -> QueryResult<Option<ContactView>> {
        update.validate_has_updates()?;
        id.validate_non_empty("id")?;
        let schema = self.base.schema(ctx)?;

        if self.get_contact(ctx, id).await?.is_none() {
            return Ok(None);
        }

        let mut assignments: Vec<(&'static str, SqlParam)> = update
            .present_fields()
            .into_iter()
            .map(|(column, value)| (column, SqlParam::String(value.to_string())))
            .collect();
        let fields: Vec<&'static str> = assignments.iter().map(|(column, _)| *column).collect();
        assignments.push(("updated_at", SqlParam::Timestamp(Utc::now())));

        let statement = UpdateStatement {
            table: schema.contacts(),
            assignments,
            predicates: vec![Predicate::Eq(
                ColumnRef::primary("id"),
                SqlParam::String(id.to_string()),
            )],
        };
        let updated = self.base.update(ctx, "update_contact", &statement).await?;
        info!(contact_id = %id, ?fields, updated, "contact updated");
        if updated == 0 {
            return Ok(None);
        }

        self.get_contact(ctx, id).await
    }

    /// Case-insensitive substring search over phone, custom name and the
    /// chat's push name. Capped by `contact_search_limit`.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn search_contacts(
        &self,
        ctx: &RequestContext,
        query: &str,
        agent_id: Option<&str>,
    ) -> QueryResult<Page<ContactView>> {
        let Some(term) = SearchTerm::parse(query) else {
            return Ok(Page::empty());
        };
        let schema = self.base.schema(ctx)?;

        let mut matches = term.matches(&[
            ColumnRef::primary("phone_number"),
            ColumnRef::primary("custom_name"),
        ]);
        matches.push(CONTACT_CHAT.exists(&schema, term.matches(&[ColumnRef::probe("push_name")])));

        let mut plan = Self::plan(&schema)
            .filter([Predicate::Or(matches)])
            .order(Sort::<ContactSort>::default().order_by());
        if let Some(agent_id) = agent_id.map(str::trim).filter(|a| !a.is_empty()) {
            plan = plan.filter([Predicate::Eq(
                ColumnRef::primary("agent_id"),
                SqlParam::String(agent_id.to_string()),
            )]);
        }

        let exact_total = if self.base.config().exact_search_totals {
            Some(
                self.base
                    .count(ctx, "search_contacts", &plan.count_query())
                    .await?,
            )
        } else {
            None
        };
        let limit = self
            .base
            .config()
            .contact_search_limit
            .clamp(1, MAX_PAGE_LIMIT);
        let items: Vec<ContactView> = self
            .base
            .fetch(
                ctx,
                "search_contacts",
                &plan.select_query(Some(Slice { limit, offset: 0 })),
            )
            .await?;
        let total = exact_total.unwrap_or(items.len() as i64);
        Ok(Page::new(items, total))
    }
}
