//! Filter translation.
//!
//! Raw request parameters are narrowed into a closed, typed filter per entity
//! before anything touches SQL. Unknown keys are ignored, empty text is
//! dropped, and booleans that do not parse are dropped rather than defaulted.

use crate::join::{CHAT_CONTACT, CONTACT_CHAT};
use crate::schema::TenantSchema;
use crate::sql::{ColumnRef, Predicate, SqlParam};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

// ============================================================================
// RAW PARAMETERS
// ============================================================================

/// Untyped parameter map handed over by the transport layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParams(BTreeMap<String, JsonValue>);

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from query-string pairs. Later duplicates win.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), JsonValue::String(v.into())))
                .collect(),
        )
    }

    /// Build from a JSON object; any other JSON value yields an empty map.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self(map.into_iter().collect()),
            _ => Self::default(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Non-empty text for `key`. Numbers and booleans are read as their text.
    pub fn text(&self, key: &str) -> Option<String> {
        let text = match self.0.get(key)? {
            JsonValue::String(s) => s.trim().to_string(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Lenient boolean for `key`; `None` when absent or unparseable.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(parse_flag)
    }
}

/// Parse a boolean the way query strings tend to spell them.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "t" | "on" => Some(true),
        "false" | "0" | "no" | "f" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => parse_bool(s),
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// CHAT FILTER
// ============================================================================

/// Recognized chat filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatFilter {
    pub agent_id: Option<String>,
    /// Applies to the chat's contact.
    pub assigned_to: Option<String>,
    pub has_unread: Option<bool>,
    pub is_group: Option<bool>,
}

impl ChatFilter {
    pub fn from_params(params: &RawParams) -> Self {
        Self {
            agent_id: params.text("agent_id"),
            assigned_to: params.text("assigned_to"),
            has_unread: params.flag("has_unread"),
            is_group: params.flag("is_group"),
        }
    }

    /// Predicates over the chat alias. The contact-side filter becomes an
    /// `EXISTS` probe so the same list serves both count and data queries.
    pub fn predicates(&self, schema: &TenantSchema) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        if let Some(agent_id) = &self.agent_id {
            predicates.push(Predicate::Eq(
                ColumnRef::primary("agent_id"),
                SqlParam::String(agent_id.clone()),
            ));
        }

        match self.has_unread {
            Some(true) => predicates.push(Predicate::Gt(
                ColumnRef::primary("unread_count"),
                SqlParam::Int(0),
            )),
            Some(false) => predicates.push(Predicate::Eq(
                ColumnRef::primary("unread_count"),
                SqlParam::Int(0),
            )),
            None => {}
        }

        if let Some(is_group) = self.is_group {
            predicates.push(Predicate::Eq(
                ColumnRef::primary("is_group"),
                SqlParam::Bool(is_group),
            ));
        }

        if let Some(assigned_to) = &self.assigned_to {
            predicates.push(CHAT_CONTACT.exists(
                schema,
                vec![Predicate::Eq(
                    ColumnRef::probe("assigned_to"),
                    SqlParam::String(assigned_to.clone()),
                )],
            ));
        }

        predicates
    }
}

// ============================================================================
// CONTACT FILTER
// ============================================================================

/// Recognized contact filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    pub phone_number: Option<String>,
    pub agent_id: Option<String>,
    pub assigned_to: Option<String>,
    /// Exact member of the comma-delimited tag list.
    pub tag: Option<String>,
    pub status: Option<String>,
    pub origin: Option<String>,
    /// Applies to the contact's chat.
    pub has_chat: Option<bool>,
}

/// Anchored pattern matching `tag` as a whole element of a comma list.
pub fn tag_pattern(tag: &str) -> String {
    format!("(^|,){}(,|$)", regex::escape(tag))
}

impl ContactFilter {
    pub fn from_params(params: &RawParams) -> Self {
        Self {
            phone_number: params.text("phone_number"),
            agent_id: params.text("agent_id"),
            assigned_to: params.text("assigned_to"),
            tag: params.text("tags"),
            status: params.text("status"),
            origin: params.text("origin"),
            has_chat: params.flag("has_chat"),
        }
    }

    pub fn predicates(&self, schema: &TenantSchema) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        let equalities = [
            ("phone_number", &self.phone_number),
            ("agent_id", &self.agent_id),
            ("assigned_to", &self.assigned_to),
            ("status", &self.status),
            ("origin", &self.origin),
        ];
        for (column, value) in equalities {
            if let Some(value) = value {
                predicates.push(Predicate::Eq(
                    ColumnRef::primary(column),
                    SqlParam::String(value.clone()),
                ));
            }
        }

        if let Some(tag) = &self.tag {
            predicates.push(Predicate::Regex(
                ColumnRef::primary("tags"),
                SqlParam::String(tag_pattern(tag)),
            ));
        }

        if let Some(has_chat) = self.has_chat {
            predicates.push(CONTACT_CHAT.presence_filter(schema, has_chat));
        }

        predicates
    }
}
