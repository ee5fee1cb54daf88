//! Property-Based Tests for Tenant Isolation and Cancellation
//!
//! Every query a repository issues names only the calling tenant's schema,
//! unsafe tenant ids never reach the store, and a cancelled or expired
//! request stops at the next store round trip.

use chatdesk_core::{ContactUpdate, ErrorCode, QueryConfig, TenantId};
use chatdesk_query::{
    ChatRepository, OffsetWindow, RawParams, Repositories, RequestContext, SortRequest, Table,
};
use chatdesk_test_utils::assertions::{assert_cancelled, assert_code};
use chatdesk_test_utils::fixtures::{self, AGENT};
use chatdesk_test_utils::generators::{arb_tenant_id, arb_unsafe_tenant};
use chatdesk_test_utils::{CallKind, MemoryStore};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn repos(store: &Arc<MemoryStore>) -> Repositories<MemoryStore> {
    Repositories::new(Arc::clone(store), QueryConfig::default())
}

// ============================================================================
// ISOLATION
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Rows seeded for one tenant are invisible to every other tenant, and
    /// all SQL issued names only the caller's schema.
    #[test]
    fn prop_tenants_see_only_their_schema(
        owner in arb_tenant_id(),
        caller in arb_tenant_id(),
        chats in 1usize..6,
    ) {
        let rt = test_runtime()?;
        let store = fixtures::store();
        let owner_schema = fixtures::schema_for(owner.as_str());
        for n in 0..chats {
            let chat = fixtures::chat_with(&format!("6281{n}"), AGENT, 0, n as i64);
            store.seed(&owner_schema, Table::Chats, &chat);
        }

        let ctx = RequestContext::new(caller.clone());
        let page = rt.block_on(repos(&store).chats.fetch_chats(
            &ctx,
            &RawParams::new(),
            &SortRequest::default(),
            OffsetWindow::default(),
        ));
        let page = page.map_err(|e| TestCaseError::fail(e.to_string()))?;

        let expected = if owner == caller { chats as i64 } else { 0 };
        prop_assert_eq!(page.total, expected);

        let caller_schema = format!("\"daisi_{}\".", caller.as_str());
        for call in store.calls() {
            prop_assert!(call.sql.contains(&caller_schema), "{}", call.sql);
            if owner != caller {
                let owner_schema = format!("\"daisi_{}\".", owner.as_str());
                prop_assert!(!call.sql.contains(&owner_schema), "{}", call.sql);
            }
        }
    }

    /// Unsafe tenant ids are refused before any context exists.
    #[test]
    fn prop_unsafe_tenant_rejected(raw in arb_unsafe_tenant()) {
        let result = RequestContext::for_tenant(&raw);
        prop_assert!(result.is_err());
        if let Err(e) = result {
            prop_assert_eq!(e.code(), ErrorCode::InvalidTenant);
        }
    }
}

#[test]
fn test_blank_tenant_is_a_missing_field() {
    let result = RequestContext::for_tenant("   ");
    assert_code(&result.map(|_| ()), ErrorCode::MissingField);
}

#[tokio::test]
async fn test_overlong_schema_name_is_rejected_before_the_store() {
    let store = fixtures::store();
    let tenant = TenantId::parse(&"t".repeat(60)).unwrap();
    let result = repos(&store)
        .chats
        .get_chat(&RequestContext::new(tenant), "c1")
        .await;
    assert_code(&result, ErrorCode::InvalidTenant);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_unsafe_prefix_is_a_config_error() {
    let store = fixtures::store();
    let config = QueryConfig::default().with_schema_prefix("bad\"prefix");
    let repo = ChatRepository::new(Arc::clone(&store), Arc::new(config));
    let result = repo.get_chat(&fixtures::context(), "c1").await;
    assert_code(&result, ErrorCode::InvalidConfig);
    assert!(store.calls().is_empty());
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_cancelled_request_issues_no_queries() {
    let store = fixtures::store();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = fixtures::context().with_cancellation(token);

    let result = repos(&store)
        .chats
        .fetch_chats(
            &ctx,
            &RawParams::new(),
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await;
    assert_cancelled(&result);
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_slow_count() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(5)));
    let ctx = fixtures::context().with_timeout(Duration::from_secs(1));

    let result = repos(&store)
        .contacts
        .fetch_contacts(
            &ctx,
            &RawParams::new(),
            &SortRequest::default(),
            OffsetWindow::default(),
        )
        .await;
    assert_cancelled(&result);
    assert_eq!(store.call_kinds(), vec![CallKind::Count]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_round_trips() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(10)));
    let token = CancellationToken::new();
    let ctx = fixtures::context().with_cancellation(token.clone());
    let repos = repos(&store);

    let call = tokio::spawn({
        let ctx = ctx.clone();
        let repos = repos.clone();
        async move {
            repos
                .messages
                .fetch_messages(
                    &ctx,
                    AGENT,
                    "c1",
                    &SortRequest::default(),
                    OffsetWindow::default(),
                )
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(15)).await;
    token.cancel();

    let result = call.await.unwrap();
    assert_cancelled(&result);
    assert_eq!(store.call_kinds(), vec![CallKind::Count, CallKind::Fetch]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_update_never_writes() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(10)));
    let contact = fixtures::contact("62811", AGENT);
    store.seed(&fixtures::schema(), Table::Contacts, &contact);
    let token = CancellationToken::new();
    let ctx = fixtures::context().with_cancellation(token.clone());
    let repos = repos(&store);

    let call = tokio::spawn({
        let repos = repos.clone();
        let id = contact.id.clone();
        async move {
            let update = ContactUpdate {
                tags: Some("vip".to_string()),
                ..Default::default()
            };
            repos.contacts.update_contact(&ctx, &id, &update).await
        }
    });
    // Lands while the existence read is still in flight.
    tokio::time::sleep(Duration::from_millis(5)).await;
    token.cancel();

    let result = call.await.unwrap();
    assert_cancelled(&result);
    assert_eq!(store.call_kinds(), vec![CallKind::Fetch]);
    let rows = store.rows(&fixtures::schema(), Table::Contacts);
    assert!(rows[0]["tags"].is_null());
}
