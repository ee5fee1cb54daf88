//! Chat Repository Tests
//!
//! Listing, filtering, enrichment, and search over the chats of one tenant,
//! run against the in-memory store.

use chatdesk_core::{QueryConfig, StoreError};
use chatdesk_query::{
    ChatRepository, OffsetWindow, RangeWindow, RawParams, SortRequest, Table,
};
use chatdesk_test_utils::assertions::{assert_page_order, assert_store_error};
use chatdesk_test_utils::fixtures::{self, AGENT};
use chatdesk_test_utils::generators::{arb_chat, arb_sort_by, arb_sort_order};
use chatdesk_test_utils::{CallKind, ChatView, MemoryStore};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::runtime::Runtime;

// ============================================================================
// HELPERS
// ============================================================================

fn repo(store: &Arc<MemoryStore>) -> ChatRepository<MemoryStore> {
    ChatRepository::new(Arc::clone(store), Arc::new(QueryConfig::default()))
}

fn chat_id(view: &ChatView) -> &str {
    &view.chat.chat_id
}

/// Three chats with unread counts 0, 5 and 2.
fn seeded() -> Arc<MemoryStore> {
    let store = fixtures::store();
    let schema = fixtures::schema();
    for (phone, unread, ts) in [("62811", 0, 100), ("62812", 5, 300), ("62813", 2, 200)] {
        store.seed(&schema, Table::Chats, &fixtures::chat_with(phone, AGENT, unread, ts));
    }
    store
}

// ============================================================================
// LISTING
// ============================================================================

#[tokio::test]
async fn test_has_unread_filters_and_counts() {
    let store = seeded();
    let params = RawParams::new().with("has_unread", "true");
    let page = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &params,
            &SortRequest::default(),
            OffsetWindow::new(20, 0),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_page_order(&page, chat_id, &["chat-62812", "chat-62813"]);
    assert_eq!(store.call_kinds(), vec![CallKind::Count, CallKind::Fetch]);
}

#[tokio::test]
async fn test_has_unread_false_keeps_read_chats() {
    let store = seeded();
    let params = RawParams::new().with("has_unread", "0");
    let page = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &params,
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_page_order(&page, chat_id, &["chat-62811"]);
}

#[tokio::test]
async fn test_sort_ascending_by_unread() {
    let store = seeded();
    let page = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::new("unread_count", "ASC"),
            OffsetWindow::new(20, 0),
        )
        .await
        .unwrap();
    assert_page_order(&page, chat_id, &["chat-62811", "chat-62813", "chat-62812"]);
}

#[tokio::test]
async fn test_unknown_sort_column_falls_back_to_default() {
    let store = seeded();
    let page = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::new("unread_count; DROP TABLE chats", "asc"),
            OffsetWindow::new(20, 0),
        )
        .await
        .unwrap();
    // conversation_timestamp DESC
    assert_page_order(&page, chat_id, &["chat-62812", "chat-62813", "chat-62811"]);
    let sql = &store.calls()[1].sql;
    assert!(!sql.contains("DROP"));
    assert!(sql.contains("ORDER BY p.\"conversation_timestamp\" DESC NULLS LAST"));
}

#[tokio::test]
async fn test_null_timestamps_sort_last() {
    let store = seeded();
    let mut quiet = fixtures::chat("no-activity", AGENT);
    quiet.conversation_timestamp = None;
    store.seed(&fixtures::schema(), Table::Chats, &quiet);

    for order in ["asc", "desc"] {
        let page = repo(&store)
            .fetch_chats(
                &fixtures::context(),
                &RawParams::new(),
                &SortRequest::new("conversation_timestamp", order),
                OffsetWindow::new(20, 0),
            )
            .await
            .unwrap();
        assert_eq!(page.items.last().map(chat_id), Some("no-activity"), "{order}");
    }
}

#[tokio::test]
async fn test_offset_window_pages_through() {
    let store = seeded();
    let repo = repo(&store);
    let ctx = fixtures::context();
    let first = repo
        .fetch_chats(&ctx, &RawParams::new(), &SortRequest::default(), OffsetWindow::new(2, 0))
        .await
        .unwrap();
    let second = repo
        .fetch_chats(&ctx, &RawParams::new(), &SortRequest::default(), OffsetWindow::new(2, 2))
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(second.total, 3);
    assert_page_order(&first, chat_id, &["chat-62812", "chat-62813"]);
    assert_page_order(&second, chat_id, &["chat-62811"]);
}

#[tokio::test]
async fn test_range_window_is_inclusive() {
    let store = seeded();
    let page = repo(&store)
        .fetch_range_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::default(),
            RangeWindow::new(1, 2),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_page_order(&page, chat_id, &["chat-62813", "chat-62811"]);
}

#[tokio::test]
async fn test_inverted_range_skips_the_store() {
    let store = seeded();
    let page = repo(&store)
        .fetch_range_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::default(),
            RangeWindow::new(5, 2),
        )
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, 0);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_count_failure_aborts_before_data_query() {
    let store = seeded();
    store.fail(CallKind::Count, StoreError::PoolExhausted);
    let result = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await;
    assert_store_error(&result, "fetch_chats", &StoreError::PoolExhausted);
    assert_eq!(store.call_kinds(), vec![CallKind::Count]);
}

#[tokio::test]
async fn test_data_failure_after_count_aborts_the_page() {
    let store = seeded();
    store.fail(CallKind::Fetch, StoreError::Execution {
        reason: "relation does not exist".to_string(),
    });
    let result = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await;
    assert_store_error(
        &result,
        "fetch_chats",
        &StoreError::Execution {
            reason: "relation does not exist".to_string(),
        },
    );
    assert_eq!(store.call_kinds(), vec![CallKind::Count, CallKind::Fetch]);
}

// ============================================================================
// CONTACT ENRICHMENT
// ============================================================================

#[tokio::test]
async fn test_chat_carries_contact_columns() {
    let store = seeded();
    let schema = fixtures::schema();
    let mut contact = fixtures::contact("62812", AGENT);
    contact.custom_name = Some("Budi".to_string());
    contact.assigned_to = Some("cs-1".to_string());
    contact.tags = Some("vip,jakarta".to_string());
    store.seed(&schema, Table::Contacts, &contact);

    let ctx = fixtures::context();
    let with_contact = repo(&store).get_chat(&ctx, "chat-62812").await.unwrap().unwrap();
    assert!(with_contact.has_contact);
    assert_eq!(with_contact.contact_custom_name.as_deref(), Some("Budi"));
    assert_eq!(with_contact.contact_assigned_to.as_deref(), Some("cs-1"));
    assert_eq!(with_contact.contact_tags.as_deref(), Some("vip,jakarta"));

    let without = repo(&store).get_chat(&ctx, "chat-62811").await.unwrap().unwrap();
    assert!(!without.has_contact);
    assert!(without.contact_custom_name.is_none());
}

#[tokio::test]
async fn test_contact_of_another_agent_is_not_joined() {
    let store = seeded();
    let mut contact = fixtures::contact("62812", "agent-2");
    contact.custom_name = Some("Elsewhere".to_string());
    store.seed(&fixtures::schema(), Table::Contacts, &contact);

    let view = repo(&store)
        .get_chat(&fixtures::context(), "chat-62812")
        .await
        .unwrap()
        .unwrap();
    assert!(!view.has_contact);
}

#[tokio::test]
async fn test_assigned_to_filter_goes_through_contact() {
    let store = seeded();
    let schema = fixtures::schema();
    for (phone, assignee) in [("62811", "cs-1"), ("62813", "cs-2")] {
        let mut contact = fixtures::contact(phone, AGENT);
        contact.assigned_to = Some(assignee.to_string());
        store.seed(&schema, Table::Contacts, &contact);
    }

    let params = RawParams::new().with("assigned_to", "cs-1");
    let page = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &params,
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_page_order(&page, chat_id, &["chat-62811"]);
    assert!(store.calls()[0].sql.contains("EXISTS"));
}

#[tokio::test]
async fn test_duplicate_contacts_never_duplicate_chats() {
    let store = seeded();
    let schema = fixtures::schema();
    store.seed(&schema, Table::Contacts, &fixtures::contact("62812", AGENT));
    store.seed(&schema, Table::Contacts, &fixtures::contact("62812", AGENT));

    let page = repo(&store)
        .fetch_chats(
            &fixtures::context(),
            &RawParams::new(),
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.len(), 3);
}

#[tokio::test]
async fn test_get_chat_missing_is_none() {
    let store = seeded();
    let found = repo(&store)
        .get_chat(&fixtures::context(), "nope")
        .await
        .unwrap();
    assert!(found.is_none());
}

// ============================================================================
// SEARCH
// ============================================================================

#[tokio::test]
async fn test_empty_search_returns_nothing_without_queries() {
    let store = seeded();
    for query in ["", "   "] {
        let page = repo(&store)
            .search_chats(&fixtures::context(), query, None)
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_search_matches_contact_name_case_insensitively() {
    let store = seeded();
    let mut contact = fixtures::contact("62813", AGENT);
    contact.custom_name = Some("Siti Rahma".to_string());
    store.seed(&fixtures::schema(), Table::Contacts, &contact);

    let page = repo(&store)
        .search_chats(&fixtures::context(), "  rahma ", None)
        .await
        .unwrap();
    assert_page_order(&page, chat_id, &["chat-62813"]);
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_search_wildcards_match_literally() {
    let store = seeded();
    let schema = fixtures::schema();
    let mut promo = fixtures::chat("promo", AGENT);
    promo.push_name = Some("50% off".to_string());
    store.seed(&schema, Table::Chats, &promo);
    let mut other = fixtures::chat("other", AGENT);
    other.push_name = Some("500 off".to_string());
    store.seed(&schema, Table::Chats, &other);

    let page = repo(&store)
        .search_chats(&fixtures::context(), "50%", None)
        .await
        .unwrap();
    assert_page_order(&page, chat_id, &["promo"]);
}

#[tokio::test]
async fn test_search_scoped_to_agent() {
    let store = seeded();
    store.seed(
        &fixtures::schema(),
        Table::Chats,
        &fixtures::chat_with("62819", "agent-2", 0, 50),
    );

    let page = repo(&store)
        .search_chats(&fixtures::context(), "6281", Some("agent-2"))
        .await
        .unwrap();
    assert_page_order(&page, chat_id, &["chat-62819"]);
}

#[tokio::test]
async fn test_exact_search_totals_counts_first() {
    let store = seeded();
    let config = QueryConfig::default().with_exact_search_totals(true);
    let repo = ChatRepository::new(Arc::clone(&store), Arc::new(config));
    let page = repo
        .search_chats(&fixtures::context(), "6281", None)
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(store.call_kinds(), vec![CallKind::Count, CallKind::Fetch]);
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The enrichment join never changes the total and the page is bounded.
    #[test]
    fn prop_total_matches_filtered_rows(
        chats in prop::collection::vec(arb_chat(AGENT.to_string()), 0..25),
        with_contact in prop::collection::vec(any::<bool>(), 25),
        limit in 1i64..30,
        offset in 0i64..30,
        has_unread in proptest::option::of(any::<bool>()),
    ) {
        let rt = test_runtime()?;
        let store = fixtures::store();
        let schema = fixtures::schema();
        for (chat, joined) in chats.iter().zip(&with_contact) {
            store.seed(&schema, Table::Chats, chat);
            if *joined {
                if let Some(phone) = &chat.phone_number {
                    store.seed(&schema, Table::Contacts, &fixtures::contact(phone, AGENT));
                }
            }
        }

        let mut params = RawParams::new();
        if let Some(flag) = has_unread {
            params = params.with("has_unread", flag);
        }
        let expected = chats
            .iter()
            .filter(|c| match has_unread {
                Some(true) => c.unread_count > 0,
                Some(false) => c.unread_count == 0,
                None => true,
            })
            .count() as i64;

        let page = rt.block_on(repo(&store).fetch_chats(
            &fixtures::context(),
            &params,
            &SortRequest::default(),
            OffsetWindow::new(limit, offset),
        ));
        let page = page.map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(page.total, expected);
        prop_assert!(page.len() as i64 <= limit);
        prop_assert_eq!(page.len() as i64, (expected - offset).clamp(0, limit));
    }

    /// Any sort input lists the same rows and only whitelisted columns reach SQL.
    #[test]
    fn prop_any_sort_input_is_accepted(
        sort_by in arb_sort_by(),
        sort_order in arb_sort_order(),
    ) {
        let rt = test_runtime()?;
        let store = seeded();
        let sort = SortRequest { sort_by, sort_order };

        let page = rt.block_on(repo(&store).fetch_chats(
            &fixtures::context(),
            &RawParams::new(),
            &sort,
            OffsetWindow::default(),
        ));
        let page = page.map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(page.total, 3);
        prop_assert_eq!(page.len(), 3);
        let calls = store.calls();
        prop_assert!(calls[1].sql.contains("NULLS LAST"));
        prop_assert!(!calls[1].sql.contains(';'));
    }
}
