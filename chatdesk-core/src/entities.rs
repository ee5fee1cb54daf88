//! Tenant-scoped entities and the enriched read views built on them.
//!
//! Field names match the column names of the tenant tables so rows decode
//! straight from their JSON form. Internal serial ids are read but never
//! serialized back out.

use crate::error::StoreError;
use crate::validation::HasUpdates;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// A type decoded from one JSON row returned by a `Store`.
pub trait Record: Sized + DeserializeOwned + Send {
    /// Entity name used in decode errors and log fields.
    const ENTITY: &'static str;

    /// Parse a JSON row into this record type.
    fn from_json(value: JsonValue) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Decode {
            entity: Self::ENTITY.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Parse a timestamp rendered by `to_jsonb`.
///
/// `timestamptz` columns carry an offset; `timestamp` columns do not and are
/// read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}

// ============================================================================
// AGENT
// ============================================================================

/// A messaging agent (one connected phone session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(default, skip_serializing)]
    pub id: i64,
    pub agent_id: String,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<Timestamp>,
}

impl Record for Agent {
    const ENTITY: &'static str = "agent";
}

/// Payload for registering an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgent {
    pub agent_id: String,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

// ============================================================================
// CHAT
// ============================================================================

/// A conversation thread owned by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default, skip_serializing)]
    pub id: i64,
    pub chat_id: String,
    #[serde(default)]
    pub jid: Option<String>,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub unread_count: i32,
    #[serde(default)]
    pub last_message: Option<JsonValue>,
    #[serde(default)]
    pub conversation_timestamp: Option<i64>,
    #[serde(default)]
    pub not_spam: bool,
    pub agent_id: String,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<Timestamp>,
}

/// Chat row enriched with its contact, if one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatView {
    #[serde(flatten)]
    pub chat: Chat,
    #[serde(default)]
    pub contact_custom_name: Option<String>,
    #[serde(default)]
    pub contact_assigned_to: Option<String>,
    #[serde(default)]
    pub contact_tags: Option<String>,
    #[serde(default)]
    pub contact_avatar: Option<String>,
    #[serde(default)]
    pub contact_origin: Option<String>,
    #[serde(default)]
    pub has_contact: bool,
}

impl Record for ChatView {
    const ENTITY: &'static str = "chat";
}

// ============================================================================
// CONTACT
// ============================================================================

/// A person an agent talks to. Unique per `(phone_number, agent_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub phone_number: String,
    pub agent_id: String,
    #[serde(rename = "type", default)]
    pub contact_type: Option<String>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Comma-delimited tag list.
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub pob: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub first_message_id: Option<String>,
    #[serde(default)]
    pub first_message_timestamp: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<Timestamp>,
}

impl Contact {
    /// Tags split out of the comma-delimited column.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Record for Contact {
    const ENTITY: &'static str = "contact";
}

/// Contact row enriched with its chat, if one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactView {
    #[serde(flatten)]
    pub contact: Contact,
    #[serde(default)]
    pub chat_push_name: Option<String>,
    #[serde(default)]
    pub chat_group_name: Option<String>,
    #[serde(default)]
    pub chat_is_group: Option<bool>,
    #[serde(default)]
    pub last_conversation_timestamp: Option<i64>,
    #[serde(default)]
    pub has_chat: bool,
}

impl Record for ContactView {
    const ENTITY: &'static str = "contact";
}

/// Partial contact update. Only fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ContactUpdate {
    /// Column/value pairs for the fields that are present.
    pub fn present_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("custom_name", &self.custom_name),
            ("assigned_to", &self.assigned_to),
            ("tags", &self.tags),
            ("avatar", &self.avatar),
            ("notes", &self.notes),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }
}

impl HasUpdates for ContactUpdate {
    const ENTITY: &'static str = "contact";

    fn has_any_updates(&self) -> bool {
        self.custom_name.is_some()
            || self.assigned_to.is_some()
            || self.tags.is_some()
            || self.avatar.is_some()
            || self.notes.is_some()
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// A single message inside a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing)]
    pub id: i64,
    pub message_id: String,
    #[serde(default)]
    pub from_phone: Option<String>,
    #[serde(default)]
    pub to_phone: Option<String>,
    pub chat_id: String,
    #[serde(default)]
    pub jid: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,
    #[serde(default)]
    pub message_text: Option<String>,
    #[serde(default)]
    pub message_url: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    pub agent_id: String,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub message_obj: Option<JsonValue>,
    #[serde(default)]
    pub edited_message_obj: Option<JsonValue>,
    /// Protocol key blob; rows without one are never listed.
    #[serde(default)]
    pub key: Option<JsonValue>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub message_timestamp: Option<i64>,
    #[serde(default)]
    pub message_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<Timestamp>,
}

impl Record for Message {
    const ENTITY: &'static str = "message";
}

// ============================================================================
// PAGE
// ============================================================================

/// One page of results plus the exact total of the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}
