//! Chatdesk Core - Entity Types
//!
//! Entities, payloads, errors, and configuration shared by the query engine
//! and its store backends. No I/O happens in this crate.

pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod tenant;
pub mod validation;

pub use config::QueryConfig;
pub use entities::{
    parse_timestamp, Agent, Chat, ChatView, Contact, ContactUpdate, ContactView, Message,
    NewAgent, Page, Record, Timestamp,
};
pub use error::{
    ConfigError, ErrorCode, QueryError, QueryResult, StoreError, ValidationError,
};
pub use tenant::TenantId;
pub use validation::{HasUpdates, ValidateNonEmpty};
