//! End-to-end turn flow against in-memory fakes: keyword classifier,
//! catalog-match extractor, faked catalog/ordering backend, in-memory
//! state store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use orderly_agent::{CatalogMatchExtractor, KeywordClassifier, OrderWorkflow};
use orderly_catalog::{
    CatalogApi, CatalogApiError, CatalogGateway, CreateOrderRequest, Location, OrderId,
    OrderSubmitter,
};
use orderly_core::{CatalogItem, CatalogVariant, Stage, VariantId, CUSTOMER_NAME_FIELD};
use orderly_db::{ConversationStore, InMemoryConversationStore};

/// Faked remote backend covering both catalog reads and order creation.
/// Orders deduplicate by idempotency key; `fail_next_orders` makes the
/// next N submissions fail with an upstream detail.
struct FakeBackend {
    catalog_down: bool,
    hide_burger: AtomicBool,
    fail_next_orders: AtomicUsize,
    orders_by_key: Mutex<HashMap<String, OrderId>>,
    recorded_keys: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            catalog_down: false,
            hide_burger: AtomicBool::new(false),
            fail_next_orders: AtomicUsize::new(0),
            orders_by_key: Mutex::new(HashMap::new()),
            recorded_keys: Mutex::new(Vec::new()),
        }
    }

    fn with_catalog_down() -> Self {
        Self { catalog_down: true, ..Self::new() }
    }

    async fn recorded_keys(&self) -> Vec<String> {
        self.recorded_keys.lock().await.clone()
    }
}

#[async_trait]
impl CatalogApi for FakeBackend {
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, CatalogApiError> {
        if self.catalog_down {
            return Err(CatalogApiError::Transport("connection refused".to_string()));
        }
        let mut items = vec![
            CatalogItem {
                id: "item-burger".to_string(),
                name: "Burger".to_string(),
                description: None,
                variants: vec![CatalogVariant {
                    id: VariantId("var-burger".to_string()),
                    name: "Classic".to_string(),
                    price_minor_units: 899,
                }],
            },
            CatalogItem {
                id: "item-soda".to_string(),
                name: "Soda".to_string(),
                description: None,
                variants: vec![CatalogVariant {
                    id: VariantId("var-soda".to_string()),
                    name: "Regular".to_string(),
                    price_minor_units: 299,
                }],
            },
        ];
        if self.hide_burger.load(Ordering::SeqCst) {
            items.retain(|item| item.name != "Burger");
        }
        Ok(items)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, CatalogApiError> {
        Ok(vec![Location { id: "loc-1".to_string(), name: "Counter".to_string(), active: true }])
    }

    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderId, CatalogApiError> {
        self.recorded_keys.lock().await.push(request.idempotency_key.clone());

        let failures = self.fail_next_orders.load(Ordering::SeqCst);
        if failures > 0 {
            self.fail_next_orders.store(failures - 1, Ordering::SeqCst);
            return Err(CatalogApiError::Rejected("LOCATION_CLOSED".to_string()));
        }

        let mut orders = self.orders_by_key.lock().await;
        let next_id = format!("order-{}", orders.len() + 1);
        Ok(orders.entry(request.idempotency_key).or_insert(OrderId(next_id)).clone())
    }
}

fn build_workflow(
    backend: Arc<FakeBackend>,
) -> (Arc<OrderWorkflow>, Arc<InMemoryConversationStore>) {
    let store = Arc::new(InMemoryConversationStore::default());
    let workflow = OrderWorkflow::new(
        Arc::new(KeywordClassifier::new()),
        Arc::new(CatalogMatchExtractor::new()),
        Arc::new(CatalogGateway::new(backend.clone(), &[])),
        Arc::new(OrderSubmitter::new(backend, None)),
        store.clone(),
    );
    (Arc::new(workflow), store)
}

async fn stored_state(store: &InMemoryConversationStore, thread_id: &str) -> orderly_core::ConversationState {
    store.load(thread_id).await.expect("load state").expect("state exists")
}

#[tokio::test]
async fn end_to_end_order_flow_from_menu_to_order_id() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend.clone());
    let thread = "thread-e2e";

    let menu = workflow.handle_turn(thread, "menu").await.expect("menu turn");
    assert!(menu.response_text.contains("Burger - Classic: $8.99"));
    assert_eq!(menu.cart_item_count, 0);
    assert_eq!(stored_state(&store, thread).await.stage, Stage::Browsing);

    let add = workflow.handle_turn(thread, "I'll have the burger").await.expect("add turn");
    assert_eq!(add.cart_item_count, 1);
    let state = stored_state(&store, thread).await;
    assert_eq!(state.stage, Stage::Ordering);
    assert_eq!(state.cart[0].display_name, "Burger - Classic");

    let confirm = workflow.handle_turn(thread, "confirm").await.expect("confirm turn");
    assert!(confirm.response_text.contains("What name should we put on the order?"));
    assert_eq!(stored_state(&store, thread).await.stage, Stage::AwaitingName);

    let placed = workflow.handle_turn(thread, "Alex").await.expect("name turn");
    assert!(placed.response_text.contains("order-1"), "response should carry the order id");
    assert!(placed.response_text.contains("Thank you, Alex"));
    assert_eq!(placed.cart_item_count, 0);

    let state = stored_state(&store, thread).await;
    assert!(state.cart.is_empty());
    assert_eq!(state.stage, Stage::Idle);
    assert_eq!(state.collected_fields.get(CUSTOMER_NAME_FIELD).map(String::as_str), Some("Alex"));
    assert!(state.order_token().is_none(), "token is spent on success");
}

#[tokio::test]
async fn warn_and_preserve_fires_for_leaving_intents_and_clears_otherwise() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-warn";

    workflow.handle_turn(thread, "add a burger").await.expect("first add");
    workflow.handle_turn(thread, "add a soda").await.expect("second add");

    let menu = workflow.handle_turn(thread, "menu").await.expect("menu turn");
    assert!(menu.response_text.starts_with("Note: You have 2 item(s) in your cart."));
    assert_eq!(
        stored_state(&store, thread).await.pending_warning.as_deref(),
        Some("Note: You have 2 item(s) in your cart.")
    );

    let help = workflow.handle_turn(thread, "help").await.expect("help turn");
    assert!(help.response_text.starts_with("Note: You have 2 item(s) in your cart."));
    assert_eq!(help.cart_item_count, 2, "leaving intents preserve the cart");

    let cart = workflow.handle_turn(thread, "what's in my cart?").await.expect("cart turn");
    assert!(!cart.response_text.contains("Note: You have"));
    assert_eq!(stored_state(&store, thread).await.pending_warning, None);
}

#[tokio::test]
async fn adds_accumulate_in_order_without_dedup() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-accumulate";

    let both =
        workflow.handle_turn(thread, "add a burger and a soda please").await.expect("add both");
    assert_eq!(both.cart_item_count, 2);

    let again = workflow.handle_turn(thread, "add another burger").await.expect("add again");
    assert_eq!(again.cart_item_count, 3);

    let names: Vec<_> = stored_state(&store, thread)
        .await
        .cart
        .iter()
        .map(|entry| entry.display_name.clone())
        .collect();
    assert_eq!(names, vec!["Burger - Classic", "Soda - Regular", "Burger - Classic"]);
}

#[tokio::test]
async fn cancel_clears_cart_and_returns_to_idle() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-cancel";

    workflow.handle_turn(thread, "add a burger").await.expect("add");
    let cancel = workflow.handle_turn(thread, "cancel").await.expect("cancel");

    assert!(cancel.response_text.contains("Order cancelled"));
    assert_eq!(cancel.cart_item_count, 0);

    let state = stored_state(&store, thread).await;
    assert!(state.cart.is_empty());
    assert_eq!(state.stage, Stage::Idle);
    assert!(state.collected_fields.is_empty());
}

#[tokio::test]
async fn confirm_with_empty_cart_short_circuits_to_idle() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-empty-confirm";

    let reply = workflow.handle_turn(thread, "confirm").await.expect("confirm");

    assert!(reply.response_text.contains("cart is empty"));
    let state = stored_state(&store, thread).await;
    assert_eq!(state.stage, Stage::Idle, "must not enter the name-collection stage");
}

#[tokio::test]
async fn unmatched_add_keeps_cart_unchanged() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, _store) = build_workflow(backend);
    let thread = "thread-nomatch";

    let reply = workflow.handle_turn(thread, "I want a milkshake").await.expect("add");

    assert!(reply.response_text.contains("couldn't find that item"));
    assert_eq!(reply.cart_item_count, 0);
}

#[tokio::test]
async fn unknown_input_reprompts_without_touching_state() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-unknown";

    workflow.handle_turn(thread, "add a burger").await.expect("add");
    let reply = workflow.handle_turn(thread, "blorp").await.expect("unknown");

    assert!(reply.response_text.contains("didn't quite understand"));
    assert_eq!(reply.cart_item_count, 1);
    assert_eq!(stored_state(&store, thread).await.stage, Stage::Ordering);
}

#[tokio::test]
async fn failed_submission_preserves_cart_and_reuses_the_token_on_retry() {
    let backend = Arc::new(FakeBackend::new());
    backend.fail_next_orders.store(1, Ordering::SeqCst);
    let (workflow, store) = build_workflow(backend.clone());
    let thread = "thread-retry";

    workflow.handle_turn(thread, "add a burger").await.expect("add");
    workflow.handle_turn(thread, "confirm").await.expect("confirm");

    let failed = workflow.handle_turn(thread, "Alex").await.expect("name turn");
    assert!(failed.response_text.contains("LOCATION_CLOSED"), "upstream detail is surfaced");
    assert!(failed.response_text.contains("try again"));
    assert_eq!(failed.cart_item_count, 1, "cart survives the failure");

    let state = stored_state(&store, thread).await;
    assert_eq!(state.stage, Stage::Confirming);
    let stashed_token = state.order_token().expect("token survives the failure").to_string();

    let retried = workflow.handle_turn(thread, "confirm").await.expect("retry");
    assert!(retried.response_text.contains("order-1"));
    assert_eq!(retried.cart_item_count, 0);

    let keys = backend.recorded_keys().await;
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0], keys[1], "retry must reuse the same idempotency token");
    assert_eq!(keys[0], stashed_token);
}

#[tokio::test]
async fn repeat_order_skips_the_name_prompt_and_mints_a_fresh_token() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, _store) = build_workflow(backend.clone());
    let thread = "thread-repeat";

    workflow.handle_turn(thread, "add a burger").await.expect("first add");
    workflow.handle_turn(thread, "confirm").await.expect("first confirm");
    workflow.handle_turn(thread, "Alex").await.expect("first name");

    workflow.handle_turn(thread, "add a soda").await.expect("second add");
    let placed = workflow.handle_turn(thread, "confirm").await.expect("second confirm");
    assert!(
        placed.response_text.contains("order-2"),
        "known name places directly without re-prompting"
    );

    let keys = backend.recorded_keys().await;
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1], "each confirm action gets its own token");
}

#[tokio::test]
async fn whitespace_name_is_reprompted_while_staying_in_awaiting_name() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-blank-name";

    workflow.handle_turn(thread, "add a burger").await.expect("add");
    workflow.handle_turn(thread, "confirm").await.expect("confirm");

    let reply = workflow.handle_turn(thread, "   ").await.expect("blank name");
    assert!(reply.response_text.contains("didn't catch a name"));
    assert_eq!(stored_state(&store, thread).await.stage, Stage::AwaitingName);
}

#[tokio::test]
async fn stale_cart_entries_are_pruned_at_confirmation_time() {
    let backend = Arc::new(FakeBackend::new());
    let store = Arc::new(InMemoryConversationStore::default());
    let gateway = Arc::new(CatalogGateway::new(backend.clone(), &[]));
    let workflow = Arc::new(OrderWorkflow::new(
        Arc::new(KeywordClassifier::new()),
        Arc::new(CatalogMatchExtractor::new()),
        gateway.clone(),
        Arc::new(OrderSubmitter::new(backend.clone(), None)),
        store.clone(),
    ));
    let thread = "thread-stale";

    workflow.handle_turn(thread, "add a burger and a soda").await.expect("add both");

    // The burger disappears from the catalog between add and confirm.
    backend.hide_burger.store(true, Ordering::SeqCst);
    gateway.refresh().await.expect("refresh");

    workflow.handle_turn(thread, "confirm").await.expect("confirm");
    let pruned = workflow.handle_turn(thread, "Alex").await.expect("name turn");

    assert!(pruned.response_text.contains("no longer available"));
    assert_eq!(pruned.cart_item_count, 1, "only the stale entry is removed");

    let state = stored_state(&store, thread).await;
    assert_eq!(state.stage, Stage::Ordering);
    assert_eq!(state.cart[0].display_name, "Soda - Regular");

    let placed = workflow.handle_turn(thread, "confirm").await.expect("re-confirm");
    assert!(placed.response_text.contains("order-1"));
    assert_eq!(placed.cart_item_count, 0);
}

#[tokio::test]
async fn catalog_outage_degrades_menu_and_add_turns() {
    let backend = Arc::new(FakeBackend::with_catalog_down());
    let (workflow, _store) = build_workflow(backend);
    let thread = "thread-outage";

    let menu = workflow.handle_turn(thread, "menu").await.expect("menu turn");
    assert!(menu.response_text.contains("menu is unavailable"));

    let add = workflow.handle_turn(thread, "add a burger").await.expect("add turn");
    assert!(add.response_text.contains("menu is unavailable"));
    assert_eq!(add.cart_item_count, 0);
}

#[tokio::test]
async fn concurrent_turns_on_one_thread_never_lose_cart_updates() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, store) = build_workflow(backend);
    let thread = "thread-parallel";

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let workflow = workflow.clone();
        tasks.push(tokio::spawn(async move {
            workflow.handle_turn(thread, "add a burger").await.expect("add turn")
        }));
    }
    for task in tasks {
        task.await.expect("task joins");
    }

    assert_eq!(stored_state(&store, thread).await.cart.len(), 8, "no lost updates");
}

#[tokio::test]
async fn distinct_threads_are_isolated() {
    let backend = Arc::new(FakeBackend::new());
    let (workflow, _store) = build_workflow(backend);

    workflow.handle_turn("thread-one", "add a burger").await.expect("add");
    let other = workflow.handle_turn("thread-two", "what's in my cart?").await.expect("cart");

    assert!(other.response_text.contains("cart is empty"));
    assert_eq!(other.cart_item_count, 0);
}
