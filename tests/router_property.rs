#[macro_use]
extern crate proptest;

use proptest::prelude::{Strategy, prop};
use serde_json::json;

use stepweave::events::ProcessEvent;
use stepweave::graphs::{ProcessBuilder, ProcessGraph};
use stepweave::router::EventRouter;

mod common;
use common::*;

/// Generate valid step / event identifiers.
///
/// Constraints:
/// - Starts with a letter
/// - Followed by 0..12 of [A-Za-z0-9_]
fn ident_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,12}").unwrap()
}

/// Build a graph with `targets` sinks all subscribed to one input event.
fn fan_out_graph(event: &str, targets: &[String]) -> ProcessGraph {
    let log = new_log();
    let mut builder = ProcessBuilder::new("prop");
    for target in targets {
        builder = builder.add_step(sink(target, "take", &log)).unwrap();
    }
    for target in targets {
        builder = builder
            .on_input_event(event)
            .send_event_to(target, "take")
            .unwrap();
    }
    builder.build().unwrap()
}

proptest! {
    /// Routing the same event twice against the same graph yields identical
    /// delivery sets, element for element.
    #[test]
    fn prop_routing_is_deterministic(
        event in ident_strategy(),
        mut targets in prop::collection::vec(ident_strategy(), 1..6),
    ) {
        targets.sort();
        targets.dedup();

        let graph = fan_out_graph(&event, &targets);
        let router = EventRouter::new(&graph);
        let probe = ProcessEvent::external(&event, json!({"n": 1}));

        let first = router.route(&probe);
        let second = router.route(&probe);
        prop_assert_eq!(first, second);
    }

    /// Fan-out order equals subscription registration order, regardless of
    /// the identifiers involved.
    #[test]
    fn prop_fan_out_preserves_registration_order(
        event in ident_strategy(),
        mut targets in prop::collection::vec(ident_strategy(), 1..6),
    ) {
        targets.sort();
        targets.dedup();

        let graph = fan_out_graph(&event, &targets);
        let router = EventRouter::new(&graph);
        let deliveries = router.route(&ProcessEvent::external(&event, json!(null)));

        let routed: Vec<String> = deliveries.into_iter().map(|d| d.step).collect();
        prop_assert_eq!(routed, targets);
    }

    /// Events with no subscription never produce deliveries.
    #[test]
    fn prop_unmatched_names_route_to_nothing(
        event in ident_strategy(),
        other in ident_strategy(),
        mut targets in prop::collection::vec(ident_strategy(), 1..4),
    ) {
        prop_assume!(event != other);
        targets.sort();
        targets.dedup();

        let graph = fan_out_graph(&event, &targets);
        let router = EventRouter::new(&graph);
        let deliveries = router.route(&ProcessEvent::external(&other, json!(null)));
        prop_assert!(deliveries.is_empty());
    }
}
