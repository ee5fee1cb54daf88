//! Chatdesk Query - Tenant-Scoped Query Composition
//!
//! Builds filtered, sorted, paginated and optionally joined queries over the
//! agents, chats, contacts and messages tables of one tenant schema, and runs
//! them through a pluggable [`Store`].
//!
//! Untrusted input only ever reaches SQL as bound parameters. Identifiers
//! (schema, table, column, sort key) come from fixed whitelists or pass the
//! tenant allow-list first.

pub mod context;
pub mod filter;
pub mod join;
pub mod pagination;
pub mod repo;
pub mod schema;
pub mod search;
pub mod sort;
pub mod sql;
pub mod store;

pub use context::RequestContext;
pub use filter::{ChatFilter, ContactFilter, RawParams};
pub use join::{Relation, CHAT_CONTACT, CONTACT_CHAT};
pub use pagination::{ListPlan, OffsetWindow, RangeWindow, Slice};
pub use repo::{
    AgentRepository, ChatRepository, ContactRepository, MessageRepository, Repositories,
};
pub use schema::{QualifiedTable, Table, TenantSchema};
pub use search::{like_escape, SearchTerm};
pub use sort::{AgentSort, ChatSort, ContactSort, MessageSort, Sort, SortColumn, SortRequest};
pub use sql::{
    ColumnRef, CountQuery, DeleteStatement, InsertStatement, OrderBy, Predicate, Probe,
    RelatedJoin, Rendered, SelectQuery, SortDirection, SqlParam, UpdateStatement,
};
pub use store::{Store, StoreResult};
