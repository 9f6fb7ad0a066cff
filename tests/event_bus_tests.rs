//! Tests for the event bus: dispatch ordering, one-shot semantics,
//! wait-for-next, and strict removal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use colloquy::bus::{EventBus, ListenerFuture};
use colloquy::error::ColloquyError;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

type Recorded = Arc<Mutex<Vec<Value>>>;

fn recorder(events: Recorded) -> impl Fn(Value) -> ListenerFuture + Send + Sync + 'static {
    move |event| {
        let events = Arc::clone(&events);
        Box::pin(async move {
            events
                .lock()
                .expect("recorder lock should not poison")
                .push(event);
            Ok(())
        })
    }
}

fn recorded(events: &Recorded) -> Vec<Value> {
    events
        .lock()
        .expect("recorder lock should not poison")
        .clone()
}

#[tokio::test]
async fn dispatch_invokes_registered_listener() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on("test_event", recorder(Arc::clone(&received)));

    bus.dispatch("test_event", json!({"data": 123}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&received), vec![json!({"data": 123})]);
}

#[tokio::test]
async fn durable_listener_fires_on_every_dispatch() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on("test_event", recorder(Arc::clone(&received)));

    for index in 0..3 {
        bus.dispatch("test_event", json!({ "seq": index }))
            .await
            .expect("dispatch should succeed");
    }

    assert_eq!(
        recorded(&received),
        vec![json!({"seq": 0}), json!({"seq": 1}), json!({"seq": 2})]
    );
}

#[tokio::test(start_paused = true)]
async fn listeners_run_sequentially_in_registration_order() {
    let bus: EventBus<Value> = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let slow_order = Arc::clone(&order);
    bus.on("test_event", move |_event| {
        let order = Arc::clone(&slow_order);
        Box::pin(async move {
            // Suspend mid-listener; the second listener must still wait.
            tokio::time::sleep(Duration::from_millis(50)).await;
            order.lock().expect("order lock").push("first");
            Ok(())
        })
    });
    let fast_order = Arc::clone(&order);
    bus.on("test_event", move |_event| {
        let order = Arc::clone(&fast_order);
        Box::pin(async move {
            order.lock().expect("order lock").push("second");
            Ok(())
        })
    });

    bus.dispatch("test_event", json!({}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(*order.lock().expect("order lock"), vec!["first", "second"]);
}

#[tokio::test]
async fn durable_listeners_run_before_one_shot_listeners() {
    let bus: EventBus<Value> = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let once_order = Arc::clone(&order);
    bus.on_next("test_event", move |_event| {
        let order = Arc::clone(&once_order);
        Box::pin(async move {
            order.lock().expect("order lock").push("one-shot");
            Ok(())
        })
    });
    let durable_order = Arc::clone(&order);
    bus.on("test_event", move |_event| {
        let order = Arc::clone(&durable_order);
        Box::pin(async move {
            order.lock().expect("order lock").push("durable");
            Ok(())
        })
    });

    bus.dispatch("test_event", json!({}))
        .await
        .expect("dispatch should succeed");

    // Durable listeners are invoked first even when registered later.
    assert_eq!(
        *order.lock().expect("order lock"),
        vec!["durable", "one-shot"]
    );
}

#[tokio::test]
async fn one_shot_listener_fires_exactly_once() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on_next("test_event", recorder(Arc::clone(&received)));

    bus.dispatch("test_event", json!({"data": 1}))
        .await
        .expect("dispatch should succeed");
    bus.dispatch("test_event", json!({"data": 2}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&received), vec![json!({"data": 1})]);
}

#[tokio::test]
async fn one_shot_registered_during_dispatch_fires_on_next_dispatch() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));

    let registrar_bus = bus.clone();
    let registrar_received = Arc::clone(&received);
    bus.on("test_event", move |_event| {
        let bus = registrar_bus.clone();
        let received = Arc::clone(&registrar_received);
        Box::pin(async move {
            bus.on_next("test_event", recorder(received));
            Ok(())
        })
    });

    bus.dispatch("test_event", json!({"round": 1}))
        .await
        .expect("dispatch should succeed");
    assert_eq!(recorded(&received), Vec::<Value>::new());

    bus.dispatch("test_event", json!({"round": 2}))
        .await
        .expect("dispatch should succeed");
    assert_eq!(recorded(&received), vec![json!({"round": 2})]);
}

#[tokio::test]
async fn multiple_listeners_each_receive_the_event() {
    let bus: EventBus<Value> = EventBus::new();
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    bus.on("test_event", recorder(Arc::clone(&first)));
    bus.on("test_event", recorder(Arc::clone(&second)));

    bus.dispatch("test_event", json!({"data": "multi"}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&first), vec![json!({"data": "multi"})]);
    assert_eq!(recorded(&second), vec![json!({"data": "multi"})]);
}

#[tokio::test]
async fn dispatch_with_no_listeners_succeeds() {
    let bus: EventBus<Value> = EventBus::new();
    let delivered = bus
        .dispatch("no_handler_event", json!({"data": "no handlers"}))
        .await
        .expect("dispatch should succeed");
    assert!(delivered);
}

#[tokio::test]
async fn off_removes_a_specific_listener() {
    let bus: EventBus<Value> = EventBus::new();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let kept = Arc::new(Mutex::new(Vec::new()));
    let removed_id = bus.on("test_event", recorder(Arc::clone(&removed)));
    bus.on("test_event", recorder(Arc::clone(&kept)));

    bus.off("test_event", Some(removed_id))
        .expect("off should succeed");
    bus.dispatch("test_event", json!({"data": 789}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&removed), Vec::<Value>::new());
    assert_eq!(recorded(&kept), vec![json!({"data": 789})]);
}

#[tokio::test]
async fn off_without_id_clears_all_listeners() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on("test_event", recorder(Arc::clone(&received)));
    bus.on("test_event", recorder(Arc::clone(&received)));

    bus.off("test_event", None).expect("off should succeed");
    bus.dispatch("test_event", json!({"data": 101112}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&received), Vec::<Value>::new());
}

#[tokio::test]
async fn off_fails_when_no_listeners_are_registered() {
    let bus: EventBus<Value> = EventBus::new();
    let error = bus
        .off("never-registered", None)
        .expect_err("off should fail");
    assert!(matches!(error, ColloquyError::NoListeners(name) if name == "never-registered"));
}

#[tokio::test]
async fn off_next_fails_when_no_listeners_are_registered() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on("test_event", recorder(Arc::clone(&received)));

    // A durable listener does not satisfy the one-shot table.
    let error = bus
        .off_next("test_event", None)
        .expect_err("off_next should fail");
    assert!(matches!(error, ColloquyError::NoListeners(_)));
}

#[tokio::test]
async fn off_next_removes_a_one_shot_listener() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let id = bus.on_next("test_event", recorder(Arc::clone(&received)));

    bus.off_next("test_event", Some(id))
        .expect("off_next should succeed");
    bus.dispatch("test_event", json!({}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&received), Vec::<Value>::new());
}

#[tokio::test(start_paused = true)]
async fn wait_for_next_returns_the_dispatched_payload() {
    let bus: EventBus<Value> = EventBus::new();

    let dispatcher = bus.clone();
    let emit = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        dispatcher
            .dispatch("test_event", json!({"data": 456}))
            .await
            .expect("dispatch should succeed");
    });

    let event = bus
        .wait_for_next("test_event", Some(Duration::from_secs(1)))
        .await;
    assert_eq!(event, Some(json!({"data": 456})));

    emit.await.expect("emit task should complete");
}

#[tokio::test(start_paused = true)]
async fn wait_for_next_times_out_and_later_dispatch_is_inert() {
    let bus: EventBus<Value> = EventBus::new();

    let event = bus
        .wait_for_next("nonexistent_event", Some(Duration::from_millis(500)))
        .await;
    assert_eq!(event, None);

    // The abandoned slot must not resolve anything or fail the dispatch.
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on("nonexistent_event", recorder(Arc::clone(&received)));
    bus.dispatch("nonexistent_event", json!({"data": "late"}))
        .await
        .expect("dispatch should succeed");
    assert_eq!(recorded(&received), vec![json!({"data": "late"})]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_waits_on_the_same_name_each_resolve() {
    let bus: EventBus<Value> = EventBus::new();

    let first_bus = bus.clone();
    let second_bus = bus.clone();
    let dispatcher = bus.clone();
    let (first, second, _) = tokio::join!(
        first_bus.wait_for_next("test_event", Some(Duration::from_secs(1))),
        second_bus.wait_for_next("test_event", Some(Duration::from_secs(1))),
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            dispatcher
                .dispatch("test_event", json!({"data": "shared"}))
                .await
                .expect("dispatch should succeed");
        }
    );

    assert_eq!(first, Some(json!({"data": "shared"})));
    assert_eq!(second, Some(json!({"data": "shared"})));
}

#[tokio::test]
async fn listener_error_aborts_the_rest_of_the_batch() {
    let bus: EventBus<Value> = EventBus::new();
    let before = Arc::new(Mutex::new(Vec::new()));
    let after = Arc::new(Mutex::new(Vec::new()));

    bus.on("test_event", recorder(Arc::clone(&before)));
    bus.on("test_event", |_event| {
        Box::pin(async { Err(ColloquyError::Listener("boom".into())) })
    });
    bus.on("test_event", recorder(Arc::clone(&after)));

    let error = bus
        .dispatch("test_event", json!({}))
        .await
        .expect_err("dispatch should fail");
    assert!(matches!(error, ColloquyError::Listener(message) if message == "boom"));
    assert_eq!(recorded(&before), vec![json!({})]);
    assert_eq!(recorded(&after), Vec::<Value>::new());
}

#[tokio::test]
async fn clear_drops_both_tables() {
    let bus: EventBus<Value> = EventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    bus.on("test_event", recorder(Arc::clone(&received)));
    bus.on_next("test_event", recorder(Arc::clone(&received)));

    bus.clear();
    bus.dispatch("test_event", json!({}))
        .await
        .expect("dispatch should succeed");

    assert_eq!(recorded(&received), Vec::<Value>::new());
    assert!(bus.off("test_event", None).is_err());
}
