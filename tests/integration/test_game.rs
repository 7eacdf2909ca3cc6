//! End-to-end tests for a kitchen session driven through the runtime.
//!
//! These tests play whole games against the bundled catalog and a fixture
//! catalog, with real (zero-length) timers between orders.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pykitchen_core::{
    Catalog, Config, EventBroadcaster, EventKind, HintAdvisor, HintDispatch, HintProvider,
    KitchenEvent, KitchenRuntime, PacingConfig, Phase, Session, Verdict, ORDER_AWARD,
};
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Tool and ingredients solving each order of the bundled catalog.
const SOLUTIONS: [(&str, &[&str]); 6] = [
    ("tool_add", &["price_a", "price_b"]),
    ("tool_len", &["cart_items"]),
    ("tool_sum", &["cart_items"]),
    ("tool_max", &["mixed_bag"]),
    ("tool_add", &["greeting", "user_name"]),
    ("tool_first", &["cart_items"]),
];

/// Path to the fixture directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Runtime over the bundled catalog with an offline advisor and no pauses.
fn immediate_runtime() -> KitchenRuntime {
    let catalog = Arc::new(Catalog::builtin().expect("bundled catalog loads"));
    let session = Session::new(catalog, PacingConfig::immediate()).expect("session starts");
    KitchenRuntime::new(session, HintAdvisor::offline(), EventBroadcaster::default())
}

/// Fills every slot of `tool` with `ingredients`, in order.
async fn prepare(runtime: &KitchenRuntime, tool: &str, ingredients: &[&str]) {
    runtime.select_tool(tool).await.expect("tool exists");
    for (slot, ingredient) in ingredients.iter().enumerate() {
        runtime
            .select_ingredient(ingredient)
            .await
            .expect("ingredient exists");
        runtime.place(slot).await.expect("slot exists");
    }
}

/// Waits for a state event matching `predicate`.
async fn wait_for_state(
    events: &mut broadcast::Receiver<KitchenEvent>,
    predicate: impl Fn(usize, Phase) -> bool,
) {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.expect("broadcaster open") {
                KitchenEvent::State(state) if predicate(state.level, state.phase) => return,
                _ => {}
            }
        }
    })
    .await
    .expect("Timeout waiting for state event");
}

/// Waits for a log entry with exactly `message`.
async fn wait_for_log(events: &mut broadcast::Receiver<KitchenEvent>, message: &str) -> EventKind {
    timeout(Duration::from_secs(5), async {
        loop {
            if let KitchenEvent::Log(payload) = events.recv().await.expect("broadcaster open") {
                if payload.entry.message == message {
                    return payload.entry.kind;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timeout waiting for log '{message}'"))
}

// ============================================================================
// Full games
// ============================================================================

/// Plays every order of the bundled catalog to the end.
#[tokio::test]
async fn test_full_game_with_bundled_catalog() {
    let runtime = immediate_runtime();
    let mut events = runtime.subscribe();

    for (level, (tool, ingredients)) in SOLUTIONS.iter().enumerate() {
        assert_eq!(runtime.snapshot().await.level, level);

        prepare(&runtime, tool, ingredients).await;
        assert_eq!(runtime.snapshot().await.phase, Phase::Ready);

        let transition = runtime.run().await;
        assert!(
            matches!(transition.verdict, Some(Verdict::Success { .. })),
            "order {level} should succeed, got {:?}",
            transition.verdict
        );

        wait_for_state(&mut events, |l, phase| {
            l == level + 1 || phase == Phase::AllOrdersComplete
        })
        .await;
    }

    let snapshot = runtime.snapshot().await;
    assert_eq!(snapshot.phase, Phase::AllOrdersComplete);
    assert_eq!(snapshot.score, ORDER_AWARD * 6);
    assert_eq!(
        snapshot.log[0].message,
        "ALL ORDERS COMPLETE! You are a true Python chef!"
    );

    // Nothing moves once the game is over
    let transition = runtime.run().await;
    assert!(transition.is_empty());
    assert_eq!(runtime.request_hint().await, HintDispatch::Finished);
    assert_eq!(runtime.pending_timers().await, 0);
}

/// Plays the fixture catalog loaded through the config file.
#[tokio::test]
async fn test_game_from_fixture_config() {
    let dir = fixture_path();
    let config = Config::load_from_dir(&dir).expect("fixture config loads");
    assert_eq!(config.hint.provider, HintProvider::Offline);
    assert_eq!(config.pacing, PacingConfig::immediate());

    let catalog = config.load_catalog(&dir).expect("fixture catalog loads");
    assert_eq!(catalog.orders.len(), 2);
    assert_eq!(catalog.ingredients[0].display_value, "3");

    let runtime = KitchenRuntime::from_config(&config, catalog).expect("runtime builds");
    let mut events = runtime.subscribe();

    prepare(&runtime, "add", &["flour_bags", "sugar_bags"]).await;
    let transition = runtime.run().await;
    assert_eq!(
        transition.events[0].message,
        "Execution: add(3, 4) returned 7"
    );
    wait_for_state(&mut events, |level, _| level == 1).await;

    prepare(&runtime, "max", &["trays"]).await;
    runtime.run().await;
    wait_for_state(&mut events, |_, phase| phase == Phase::AllOrdersComplete).await;

    assert_eq!(runtime.snapshot().await.score, ORDER_AWARD * 2);
}

// ============================================================================
// Failures and hints
// ============================================================================

/// Wrong answers count up, nudge once, and reset on the next order.
#[tokio::test]
async fn test_failures_nudge_and_reset() {
    let runtime = immediate_runtime();
    let mut events = runtime.subscribe();

    // add(price_a, price_a) = 20, not 35
    prepare(&runtime, "tool_add", &["price_a", "price_a"]).await;
    for attempt in 1..=3 {
        let transition = runtime.run().await;
        assert!(matches!(
            transition.verdict,
            Some(Verdict::Mismatch { .. })
        ));
        assert_eq!(runtime.snapshot().await.failures, attempt);
    }

    let kind = wait_for_log(&mut events, "Chef: Stuck? Press 'hint' for a tip!").await;
    assert_eq!(kind, EventKind::Advisory);

    prepare(&runtime, "tool_add", &["price_a", "price_b"]).await;
    runtime.run().await;
    wait_for_state(&mut events, |level, _| level == 1).await;

    let snapshot = runtime.snapshot().await;
    assert_eq!(snapshot.failures, 0);
    assert_eq!(snapshot.log.len(), 1);
    assert_eq!(snapshot.log[0].message, "New order received!");
}

/// An offline hint answers with the order's static hint.
#[tokio::test]
async fn test_offline_hint_is_logged() {
    let runtime = immediate_runtime();
    let mut events = runtime.subscribe();

    assert_eq!(runtime.request_hint().await, HintDispatch::Started);
    wait_for_log(&mut events, "Asking the chef...").await;
    let kind = wait_for_log(
        &mut events,
        "Chef: Use the add() function to add two numbers.",
    )
    .await;
    assert_eq!(kind, EventKind::Advisory);
    assert!(!runtime.snapshot().await.hint_busy);
}

/// A type mismatch is rejected without touching the slot.
#[tokio::test]
async fn test_type_mismatch_keeps_slot_empty() {
    let runtime = immediate_runtime();

    runtime.select_tool("tool_len").await.expect("tool exists");
    runtime
        .select_ingredient("price_a")
        .await
        .expect("ingredient exists");
    let transition = runtime.place(0).await.expect("slot exists");

    assert_eq!(transition.events.len(), 1);
    assert_eq!(transition.events[0].kind, EventKind::Error);
    assert!(transition.events[0].message.starts_with("Type error:"));

    let snapshot = runtime.snapshot().await;
    assert_eq!(snapshot.slots, vec![None]);
    assert_eq!(snapshot.pending_ingredient.as_deref(), Some("price_a"));
    assert_eq!(snapshot.phase, Phase::AwaitingArguments);
}
