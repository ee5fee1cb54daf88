//! Centralized constants for the query layer.

/// Default schema prefix; a tenant `acme` lives in schema `daisi_acme`.
pub const DEFAULT_SCHEMA_PREFIX: &str = "daisi_";

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Page size used when the caller gives none (or a non-positive one).
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Largest page any list operation returns.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Largest inclusive range window (`end - start + 1`).
pub const MAX_RANGE_WINDOW: i64 = 100;

/// Search text is cut to this many characters before matching.
pub const MAX_SEARCH_QUERY_CHARS: usize = 100;

/// Row cap for chat search.
pub const CHAT_SEARCH_LIMIT: i64 = 100;

/// Default row cap for contact search.
pub const DEFAULT_CONTACT_SEARCH_LIMIT: i64 = 50;

/// Table names inside every tenant schema.
pub const AGENTS_TABLE: &str = "agents";
pub const CHATS_TABLE: &str = "chats";
pub const CONTACTS_TABLE: &str = "contacts";
pub const MESSAGES_TABLE: &str = "messages";
