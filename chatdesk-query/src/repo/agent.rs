use super::Base;
use crate::context::RequestContext;
use crate::pagination::ListPlan;
use crate::schema::TenantSchema;
use crate::sort::{AgentSort, Sort, SortDirection};
use crate::sql::{ColumnRef, DeleteStatement, InsertStatement, Predicate, SqlParam, UpdateStatement};
use crate::store::Store;
use chatdesk_core::{Agent, NewAgent, QueryConfig, QueryResult, ValidateNonEmpty};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Agent registry of a tenant.
pub struct AgentRepository<S: ?Sized> {
    base: Base<S>,
}

impl<S: ?Sized> Clone for AgentRepository<S> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
        }
    }
}

fn by_agent_id(agent_id: &str) -> Predicate {
    Predicate::Eq(
        ColumnRef::primary("agent_id"),
        SqlParam::String(agent_id.to_string()),
    )
}

impl<S: Store + ?Sized> AgentRepository<S> {
    pub fn new(store: Arc<S>, config: Arc<QueryConfig>) -> Self {
        Self::from_base(Base::new(store, config))
    }

    pub(crate) fn from_base(base: Base<S>) -> Self {
        Self { base }
    }

    fn plan(schema: &TenantSchema) -> ListPlan {
        let sort = Sort {
            column: AgentSort::Id,
            direction: SortDirection::Asc,
        };
        ListPlan::new(schema.agents()).order(sort.order_by())
    }

    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent_id))]
    pub async fn get_by_agent_id(
        &self,
        ctx: &RequestContext,
        agent_id: &str,
    ) -> QueryResult<Option<Agent>> {
        agent_id.validate_non_empty("agent_id")?;
        let schema = self.base.schema(ctx)?;
        let plan = Self::plan(&schema).filter([by_agent_id(agent_id)]);
        self.base.fetch_one(ctx, "get_agent", &plan).await
    }

    /// Every agent registered under the tenant's company, oldest first.
    #[instrument(skip_all, fields(tenant = %ctx.tenant()))]
    pub async fn list(&self, ctx: &RequestContext) -> QueryResult<Vec<Agent>> {
        let schema = self.base.schema(ctx)?;
        let plan = Self::plan(&schema).filter([Predicate::Eq(
            ColumnRef::primary("company_id"),
            SqlParam::String(ctx.tenant().to_string()),
        )]);
        self.base
            .fetch(ctx, "list_agents", &plan.select_query(None))
            .await
    }

    #[instrument(skip_all, fields(tenant = %ctx.tenant(), requested = agent_ids.len()))]
    pub async fn list_by_agent_ids(
        &self,
        ctx: &RequestContext,
        agent_ids: &[String],
    ) -> QueryResult<Vec<Agent>> {
        let ids: Vec<String> = agent_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        let schema = self.base.schema(ctx)?;
        let mut plan = Self::plan(&schema);
        // No ids means no narrowing: every agent in the tenant.
        if !ids.is_empty() {
            plan = plan.filter([Predicate::AnyOf(
                ColumnRef::primary("agent_id"),
                SqlParam::StringArray(ids),
            )]);
        }
        self.base
            .fetch(ctx, "list_agents_by_id", &plan.select_query(None))
            .await
    }

    /// Register an agent under the tenant's company.
    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent.agent_id))]
    pub async fn create(&self, ctx: &RequestContext, agent: &NewAgent) -> QueryResult<Agent> {
        agent.agent_id.validate_non_empty("agent_id")?;
        let schema = self.base.schema(ctx)?;
        let now = Utc::now();
        let statement = InsertStatement {
            into: schema.agents(),
            values: vec![
                ("agent_id", SqlParam::String(agent.agent_id.trim().to_string())),
                ("qr_code", SqlParam::OptString(agent.qr_code.clone())),
                ("status", SqlParam::OptString(agent.status.clone())),
                ("agent_name", SqlParam::OptString(agent.agent_name.clone())),
                ("host_name", SqlParam::OptString(agent.host_name.clone())),
                ("version", SqlParam::OptString(agent.version.clone())),
                ("company_id", SqlParam::String(ctx.tenant().to_string())),
                ("created_at", SqlParam::Timestamp(now)),
                ("updated_at", SqlParam::Timestamp(now)),
            ],
        };
        let created: Agent = self.base.insert(ctx, "create_agent", &statement).await?;
        info!(agent_id = %created.agent_id, id = created.id, "agent created");
        Ok(created)
    }

    /// Rename an agent. `None` when no such agent exists.
    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent_id))]
    pub async fn update_name(
        &self,
        ctx: &RequestContext,
        agent_id: &str,
        name: &str,
    ) -> QueryResult<Option<Agent>> {
        agent_id.validate_non_empty("agent_id")?;
        name.validate_non_empty("agent_name")?;
        let schema = self.base.schema(ctx)?;

        if self.get_by_agent_id(ctx, agent_id).await?.is_none() {
            return Ok(None);
        }

        let statement = UpdateStatement {
            table: schema.agents(),
            assignments: vec![
                ("agent_name", SqlParam::String(name.trim().to_string())),
                ("updated_at", SqlParam::Timestamp(Utc::now())),
            ],
            predicates: vec![by_agent_id(agent_id)],
        };
        let updated = self.base.update(ctx, "update_agent_name", &statement).await?;
        info!(updated, "agent renamed");
        if updated == 0 {
            return Ok(None);
        }
        self.get_by_agent_id(ctx, agent_id).await
    }

    /// Remove an agent by its external id. `false` when nothing matched.
    #[instrument(skip_all, fields(tenant = %ctx.tenant(), agent_id = %agent_id))]
    pub async fn delete(&self, ctx: &RequestContext, agent_id: &str) -> QueryResult<bool> {
        agent_id.validate_non_empty("agent_id")?;
        let schema = self.base.schema(ctx)?;
        let statement = DeleteStatement {
            from: schema.agents(),
            predicates: vec![by_agent_id(agent_id)],
        };
        let deleted = self.base.delete(ctx, "delete_agent", &statement).await?;
        info!(deleted, "agent delete");
        Ok(deleted > 0)
    }
}
