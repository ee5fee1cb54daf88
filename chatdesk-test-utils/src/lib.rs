//! Chatdesk Test Utilities
//!
//! Shared test infrastructure for the chatdesk workspace:
//! - An in-memory `Store` that evaluates structured queries
//! - Proptest generators for entities and request inputs
//! - Fixtures for a seeded tenant
//! - Assertions over `QueryResult`

pub mod memory;

pub use memory::{CallKind, MemoryStore, StoreCall};

pub use chatdesk_core::{
    Agent, Chat, ChatView, Contact, ContactUpdate, ContactView, ErrorCode, Message, NewAgent,
    Page, QueryConfig, QueryError, QueryResult, StoreError, TenantId, Timestamp, ValidationError,
};
pub use chatdesk_query::{RequestContext, Table, TenantSchema};

use chrono::{TimeZone, Utc};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for chatdesk entities and request inputs.

    use super::*;
    use proptest::prelude::*;

    /// A tenant id that passes the allow-list.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        "[a-z][a-z0-9_-]{0,15}".prop_filter_map("valid tenant", |raw| TenantId::parse(&raw).ok())
    }

    /// A raw tenant id that must be rejected.
    pub fn arb_unsafe_tenant() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("acme; DROP TABLE chats".to_string()),
            Just("acme\".\"chats".to_string()),
            "[a-z]{1,8}[.;'\"/]{1,3}[a-z]{0,8}",
        ]
    }

    pub fn arb_phone_number() -> impl Strategy<Value = String> {
        "62[0-9]{9,11}"
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// A chat owned by `agent_id` with random counters.
    pub fn arb_chat(agent_id: String) -> impl Strategy<Value = Chat> {
        (
            "[a-z0-9]{6,12}",
            arb_phone_number(),
            0i32..20,
            proptest::option::of(1_600_000_000i64..1_900_000_000),
            any::<bool>(),
        )
            .prop_map(move |(chat_id, phone, unread, ts, is_group)| {
                let mut chat = fixtures::chat(&chat_id, &agent_id);
                chat.phone_number = Some(phone);
                chat.unread_count = unread;
                chat.conversation_timestamp = ts;
                chat.is_group = is_group;
                chat
            })
    }

    /// A comma-delimited tag list.
    pub fn arb_tags() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(
            prop::collection::vec("[a-z]{2,6}", 1..4).prop_map(|tags| tags.join(",")),
        )
    }

    /// A contact owned by `agent_id`.
    pub fn arb_contact(agent_id: String) -> impl Strategy<Value = Contact> {
        (
            arb_phone_number(),
            proptest::option::of("[A-Za-z ]{2,16}"),
            arb_tags(),
            proptest::option::of(prop_oneof![Just("agent-a"), Just("agent-b")]),
        )
            .prop_map(move |(phone, name, tags, assigned)| {
                let mut contact = fixtures::contact(&phone, &agent_id);
                contact.custom_name = name;
                contact.tags = tags;
                contact.assigned_to = assigned.map(str::to_string);
                contact
            })
    }

    /// Sort columns, known and unknown.
    pub fn arb_sort_by() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(prop_oneof![
            Just("conversation_timestamp".to_string()),
            Just("unread_count".to_string()),
            Just("created_at".to_string()),
            Just("custom_name".to_string()),
            "[a-z_;]{1,20}",
        ])
    }

    pub fn arb_sort_order() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(prop_oneof![
            Just("asc".to_string()),
            Just("ASC".to_string()),
            Just("desc".to_string()),
            "[a-z]{0,6}",
        ])
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities and a ready-made tenant.

    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    pub const TENANT: &str = "acme";
    pub const AGENT: &str = "agent-1";

    /// Fixed instant so ordering by timestamps is deterministic.
    pub fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn context() -> RequestContext {
        RequestContext::for_tenant(TENANT).unwrap()
    }

    pub fn schema() -> TenantSchema {
        TenantSchema::resolve(&QueryConfig::default(), &TenantId::parse(TENANT).unwrap()).unwrap()
    }

    pub fn schema_for(tenant: &str) -> TenantSchema {
        TenantSchema::resolve(&QueryConfig::default(), &TenantId::parse(tenant).unwrap()).unwrap()
    }

    /// An empty store shared the way repositories hold it.
    pub fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    pub fn agent(agent_id: &str) -> Agent {
        Agent {
            id: 0,
            agent_id: agent_id.to_string(),
            qr_code: None,
            status: Some("connected".to_string()),
            agent_name: Some(format!("Agent {agent_id}")),
            host_name: Some("wa-host-1".to_string()),
            version: Some("2.3.0".to_string()),
            company_id: Some(TENANT.to_string()),
            created_at: Some(at(0)),
            updated_at: Some(at(0)),
        }
    }

    pub fn chat(chat_id: &str, agent_id: &str) -> Chat {
        Chat {
            id: 0,
            chat_id: chat_id.to_string(),
            jid: Some(format!("{chat_id}@s.whatsapp.net")),
            push_name: None,
            is_group: false,
            group_name: None,
            unread_count: 0,
            last_message: None,
            conversation_timestamp: None,
            not_spam: true,
            agent_id: agent_id.to_string(),
            company_id: Some(TENANT.to_string()),
            phone_number: None,
            created_at: Some(at(0)),
            updated_at: Some(at(0)),
        }
    }

    /// A one-to-one chat with a phone number and activity time.
    pub fn chat_with(phone: &str, agent_id: &str, unread: i32, ts: i64) -> Chat {
        let mut chat = chat(&format!("chat-{phone}"), agent_id);
        chat.phone_number = Some(phone.to_string());
        chat.unread_count = unread;
        chat.conversation_timestamp = Some(ts);
        chat
    }

    pub fn contact(phone: &str, agent_id: &str) -> Contact {
        Contact {
            id: Uuid::now_v7().to_string(),
            phone_number: phone.to_string(),
            agent_id: agent_id.to_string(),
            contact_type: Some("PERSONAL".to_string()),
            custom_name: None,
            notes: None,
            tags: None,
            company_id: Some(TENANT.to_string()),
            avatar: None,
            assigned_to: None,
            pob: None,
            dob: None,
            gender: None,
            origin: None,
            push_name: None,
            status: Some("ACTIVE".to_string()),
            first_message_id: None,
            first_message_timestamp: None,
            created_at: Some(at(0)),
            updated_at: Some(at(0)),
        }
    }

    pub fn message(message_id: &str, chat_id: &str, agent_id: &str, ts: i64) -> Message {
        Message {
            id: 0,
            message_id: message_id.to_string(),
            from_phone: None,
            to_phone: None,
            chat_id: chat_id.to_string(),
            jid: None,
            flow: Some("IN".to_string()),
            message_text: Some(format!("text of {message_id}")),
            message_url: None,
            message_type: Some("text".to_string()),
            agent_id: agent_id.to_string(),
            company_id: Some(TENANT.to_string()),
            message_obj: None,
            edited_message_obj: None,
            key: Some(serde_json::json!({ "id": message_id, "fromMe": false })),
            status: Some("delivered".to_string()),
            is_deleted: false,
            message_timestamp: Some(ts),
            message_date: None,
            created_at: Some(at(ts)),
            updated_at: Some(at(ts)),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over repository results.

    use super::*;

    /// Assert that a result failed with the given error code.
    #[track_caller]
    pub fn assert_code<T: std::fmt::Debug>(result: &QueryResult<T>, code: ErrorCode) {
        match result {
            Err(e) => assert_eq!(e.code(), code, "wrong error code for {e:?}"),
            Ok(v) => panic!("Expected {code:?}, got Ok: {v:?}"),
        }
    }

    /// Assert a validation failure naming `field`.
    #[track_caller]
    pub fn assert_missing_field<T: std::fmt::Debug>(result: &QueryResult<T>, field: &str) {
        match result {
            Err(QueryError::Validation(ValidationError::RequiredFieldMissing { field: f })) => {
                assert_eq!(f, field, "wrong missing field");
            }
            other => panic!("Expected missing field {field}, got: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &QueryResult<T>) {
        match result {
            Err(QueryError::Cancelled { .. }) => {}
            other => panic!("Expected Cancelled, got: {other:?}"),
        }
    }

    /// Assert a store failure wrapped with `operation`.
    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(
        result: &QueryResult<T>,
        operation: &str,
        expected: &StoreError,
    ) {
        match result {
            Err(QueryError::Store {
                operation: op,
                source,
            }) => {
                assert_eq!(*op, operation, "wrong operation");
                assert_eq!(source, expected, "wrong store error");
            }
            other => panic!("Expected store error in {operation}, got: {other:?}"),
        }
    }

    /// Assert that a page holds exactly `ids` in order, read by `key`.
    #[track_caller]
    pub fn assert_page_order<T, F>(page: &Page<T>, key: F, ids: &[&str])
    where
        F: Fn(&T) -> &str,
    {
        let actual: Vec<&str> = page.items.iter().map(key).collect();
        assert_eq!(actual, ids, "page order mismatch");
    }
}

// ============================================================================
// TESTS
// ============================================================================
