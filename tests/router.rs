use serde_json::json;

use stepweave::events::{EventOrigin, ProcessEvent};
use stepweave::graphs::{ProcessBuilder, ProcessGraph};
use stepweave::router::EventRouter;

mod common;
use common::*;

fn wired_graph(log: &ExecutionLog) -> ProcessGraph {
    ProcessBuilder::new("routing")
        .add_step(relay("a", "run", log))
        .unwrap()
        .add_step(relay("b", "run", log))
        .unwrap()
        .add_step(sink("c", "finish", log))
        .unwrap()
        .on_input_event("Start")
        .send_event_to("a", "run")
        .unwrap()
        .on_handler_result("a", "run")
        .send_event_to("b", "run")
        .unwrap()
        .on_step_event("b", "Partial")
        .send_event_to("c", "finish")
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn external_event_matches_process_input_subscriptions() {
    let log = new_log();
    let graph = wired_graph(&log);
    let router = EventRouter::new(&graph);

    let deliveries = router.route(&ProcessEvent::external("Start", json!({"k": 1})));
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].step, "a");
    assert_eq!(deliveries[0].handler, "run");
    assert_eq!(deliveries[0].payload, json!({"k": 1}));
    assert_eq!(deliveries[0].event, "Start");
}

#[test]
fn handler_result_matches_on_step_and_handler_not_name() {
    let log = new_log();
    let graph = wired_graph(&log);
    let router = EventRouter::new(&graph);

    // The event name is irrelevant for result routing; the origin tuple decides.
    let event = ProcessEvent {
        name: "ArbitraryName".to_string(),
        payload: json!(2),
        origin: EventOrigin::HandlerResult {
            step: "a".to_string(),
            handler: "run".to_string(),
        },
    };
    let deliveries = router.route(&event);
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].step, "b");
}

#[test]
fn emitted_event_matches_on_step_and_name() {
    let log = new_log();
    let graph = wired_graph(&log);
    let router = EventRouter::new(&graph);

    let matching = ProcessEvent {
        name: "Partial".to_string(),
        payload: json!(null),
        origin: EventOrigin::Emitted {
            step: "b".to_string(),
        },
    };
    assert_eq!(router.route(&matching).len(), 1);

    // Same name from a different step does not match.
    let wrong_step = ProcessEvent {
        name: "Partial".to_string(),
        payload: json!(null),
        origin: EventOrigin::Emitted {
            step: "a".to_string(),
        },
    };
    assert!(router.route(&wrong_step).is_empty());
}

#[test]
fn origins_do_not_cross_match() {
    let log = new_log();
    let graph = wired_graph(&log);
    let router = EventRouter::new(&graph);

    // An external event named like an emitted one must not hit step-event wiring.
    let external = ProcessEvent::external("Partial", json!(null));
    assert!(router.route(&external).is_empty());

    // An emitted event named "Start" must not hit the process-input wiring.
    let emitted = ProcessEvent {
        name: "Start".to_string(),
        payload: json!(null),
        origin: EventOrigin::Emitted {
            step: "a".to_string(),
        },
    };
    assert!(router.route(&emitted).is_empty());
}

#[test]
fn unmatched_events_route_to_nothing() {
    let log = new_log();
    let graph = wired_graph(&log);
    let router = EventRouter::new(&graph);
    assert!(
        router
            .route(&ProcessEvent::external("Nobody", json!(null)))
            .is_empty()
    );
}

#[test]
fn fan_out_preserves_subscription_order_and_clones_payload() {
    let log = new_log();
    let graph = ProcessBuilder::new("fanout")
        .add_step(sink("x", "take", &log))
        .unwrap()
        .add_step(sink("y", "take", &log))
        .unwrap()
        .add_step(sink("z", "take", &log))
        .unwrap()
        .on_input_event("Broadcast")
        .send_event_to("y", "take")
        .unwrap()
        .on_input_event("Broadcast")
        .send_event_to("z", "take")
        .unwrap()
        .on_input_event("Broadcast")
        .send_event_to("x", "take")
        .unwrap()
        .build()
        .unwrap();

    let router = EventRouter::new(&graph);
    let deliveries = router.route(&ProcessEvent::external("Broadcast", json!({"n": 9})));

    let order: Vec<&str> = deliveries.iter().map(|d| d.step.as_str()).collect();
    assert_eq!(order, vec!["y", "z", "x"]);
    assert!(deliveries.iter().all(|d| d.payload == json!({"n": 9})));
}
