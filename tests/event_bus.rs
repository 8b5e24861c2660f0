use futures_util::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use stepweave::event_bus::{ChannelSink, Event, EventBus, MemorySink, RUN_END_SCOPE};
use stepweave::events::ProcessEvent;
use stepweave::graphs::ProcessBuilder;
use stepweave::runtimes::{InMemoryStateStore, ProcessRunner, RunConfig};

mod common;
use common::*;

#[tokio::test]
async fn stop_listener_flushes_pending_events() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);

    bus.listen_for_events();

    bus.sender()
        .send(Event::step_trace("step", "handler", 1, "scope", "payload"))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.stop_listener().await;

    let entries = sink_snapshot.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message(), "payload");
}

#[tokio::test]
async fn stopping_without_events_is_noop() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen_for_events();
    bus.stop_listener().await;
}

#[tokio::test]
async fn memory_sink_captures_scope_and_message() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();

    let sender = bus.sender();
    sender
        .send(Event::step_trace("a", "run", 1, "emit", "first"))
        .unwrap();
    sender.send(Event::diagnostic("runner", "second")).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.stop_listener().await;

    let entries = sink_snapshot.snapshot();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].scope_label(), "emit");
    assert_eq!(entries[0].message(), "first");
    assert_eq!(entries[1].scope_label(), "runner");
    assert_eq!(entries[1].message(), "second");
}

#[tokio::test]
async fn listener_start_is_idempotent() {
    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);

    bus.listen_for_events();
    bus.listen_for_events();

    bus.sender()
        .send(Event::diagnostic("scope", "once"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    bus.stop_listener().await;

    // Two listener starts must not duplicate delivery.
    assert_eq!(sink_snapshot.snapshot().len(), 1);
}

#[tokio::test]
async fn channel_sink_streams_events_to_consumers() {
    let (sink, mut events) = ChannelSink::stream_pair();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();

    bus.sender()
        .send(Event::diagnostic("stream", "hello"))
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .expect("event should arrive promptly")
        .expect("stream should be open");
    assert_eq!(received.message(), "hello");
}

#[tokio::test]
async fn handler_emissions_reach_the_bus_as_step_traces() {
    use async_trait::async_trait;
    use serde_json::Value;
    use stepweave::descriptors::{HandlerDescriptor, StepDescriptor};
    use stepweave::step::{Step, StepContext, StepError};

    struct Emitter;

    #[async_trait]
    impl Step for Emitter {
        async fn handle(
            &mut self,
            _handler: &str,
            _payload: Value,
            ctx: &StepContext,
        ) -> Result<Option<Value>, StepError> {
            ctx.emit("Progress", json!(1));
            Ok(None)
        }
    }

    let graph = ProcessBuilder::new("observed")
        .add_step(
            StepDescriptor::new("a", || Box::new(Emitter) as Box<dyn Step>)
                .with_handler(HandlerDescriptor::new("run")),
        )
        .unwrap()
        .on_input_event("Start")
        .send_event_to("a", "run")
        .unwrap()
        .build()
        .unwrap();

    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    let mut runner = runner_with_bus(graph, bus);

    runner
        .run(ProcessEvent::external("Start", json!(null)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    runner.event_bus().stop_listener().await;

    let entries = sink_snapshot.snapshot();
    // The explicit emission surfaced as a step trace...
    assert!(entries.iter().any(|e| {
        matches!(e, Event::Step(step) if step.step_id == "a" && step.message.contains("Progress"))
    }));
    // ...and the run-end diagnostic followed it.
    assert!(
        entries
            .iter()
            .any(|e| e.scope_label() == RUN_END_SCOPE && e.message().contains("status=completed"))
    );
}

#[tokio::test]
async fn run_end_event_reports_error_status_on_step_fault() {
    use stepweave::descriptors::{HandlerDescriptor, StepDescriptor};
    use stepweave::step::Step;

    let graph = ProcessBuilder::new("faulting")
        .add_step(
            StepDescriptor::new("a", || Box::new(FaultyStep) as Box<dyn Step>)
                .with_handler(HandlerDescriptor::new("run")),
        )
        .unwrap()
        .on_input_event("Start")
        .send_event_to("a", "run")
        .unwrap()
        .build()
        .unwrap();

    let sink = MemorySink::new();
    let sink_snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    let mut runner = runner_with_bus(graph, bus);

    let result = runner.run(ProcessEvent::external("Start", json!(null))).await;
    assert!(result.is_err());
    tokio::time::sleep(Duration::from_millis(10)).await;
    runner.event_bus().stop_listener().await;

    let entries = sink_snapshot.snapshot();
    assert!(
        entries
            .iter()
            .any(|e| e.scope_label() == RUN_END_SCOPE && e.message().contains("status=error"))
    );
}

fn runner_with_bus(graph: stepweave::graphs::ProcessGraph, bus: EventBus) -> ProcessRunner {
    ProcessRunner::with_bus(
        graph,
        Arc::new(InMemoryStateStore::new()),
        RunConfig::default(),
        bus,
    )
}
