use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::instrument;

use crate::descriptors::PayloadShape;
use crate::event_bus::{Event, EventBus, RUN_END_SCOPE};
use crate::events::{Delivery, EmittedEvent, ProcessEvent};
use crate::graphs::ProcessGraph;
use crate::router::EventRouter;
use crate::runtimes::run_config::{EmissionOrder, RunConfig};
use crate::runtimes::state_store::{StateStore, StateStoreError};
use crate::step::{Step, StepContext, StepError};

/// Cooperative cancellation handle for an in-flight run.
///
/// Cloning shares the flag. The runner checks it before dequeuing each
/// delivery; a delivery whose handler is already executing runs to
/// completion before the run terminates.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How a run ended, when it ended without a step fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// The delivery queue drained with no event producing further deliveries.
    Completed,
    /// A [`CancelToken`] fired between deliveries.
    Cancelled,
    /// The dispatch budget was exhausted with deliveries still pending.
    /// Almost always a cyclic subscription with no terminating condition.
    BudgetExceeded,
}

/// One dispatched delivery, as recorded in the run trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub step: String,
    pub handler: String,
    /// Name of the event that triggered the delivery.
    pub event: String,
}

/// Result of executing one process run end to end.
///
/// `trace` lists every dispatched delivery in dispatch order, which is the
/// canonical record of what the run did; `dispatched` is its length as a
/// count for quick assertions and logging.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub dispatched: u64,
    pub trace: Vec<DeliveryRecord>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("step activation failed: {step}")]
    #[diagnostic(code(stepweave::runner::activation))]
    Activation {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("handler failed: {step}.{handler}")]
    #[diagnostic(code(stepweave::runner::handler))]
    Handler {
        step: String,
        handler: String,
        #[source]
        source: StepError,
    },

    #[error("payload shape mismatch for {step}.{handler}: expected {expected}, got {got}")]
    #[diagnostic(
        code(stepweave::runner::payload_mismatch),
        help("Align the handler's declared shape with the payloads its subscriptions carry.")
    )]
    PayloadMismatch {
        step: String,
        handler: String,
        expected: PayloadShape,
        got: PayloadShape,
    },

    #[error("state store failed for step: {step}")]
    #[diagnostic(code(stepweave::runner::store))]
    Store {
        step: String,
        #[source]
        source: StateStoreError,
    },

    /// A delivery routed to a step id the graph does not know.
    ///
    /// The builder rejects dangling subscriptions, so reaching this from a
    /// built graph indicates internal corruption.
    #[error("delivery targets unknown step: {step}")]
    #[diagnostic(code(stepweave::runner::unknown_target))]
    UnknownDeliveryTarget { step: String },
}

/// Live instance bookkeeping for one step within one run.
struct ActiveStep {
    instance: Box<dyn Step>,
    /// Whether [`Step::snapshot_state`] returned `Some` at least once; only
    /// then does the runner keep persisting after each delivery.
    stateful: bool,
}

/// Executes one process graph run at a time: FIFO dispatch, lazy step
/// activation, fail-fast faults, and state persistence through a pluggable
/// [`StateStore`].
///
/// # Architecture: graph vs runner
///
/// - [`ProcessGraph`]: immutable wiring (steps, subscriptions, routes)
/// - [`ProcessRunner`]: the runtime environment (instances, queue, bus, store)
///
/// A graph can back any number of runners; each run owns a fresh instance
/// table, so runs never share step state except through the store.
///
/// # Execution model
///
/// The initial external event is routed into a FIFO queue of deliveries.
/// Each iteration pops one delivery, invokes the handler, then routes what
/// the handler produced (automatic result event, explicit emissions) back
/// into the queue. Deliveries are processed strictly one at a time, so a
/// step instance never observes concurrent access to its own state.
///
/// ```rust,no_run
/// # use stepweave::graphs::ProcessGraph;
/// use serde_json::json;
/// use std::sync::Arc;
/// use stepweave::events::ProcessEvent;
/// use stepweave::runtimes::{InMemoryStateStore, ProcessRunner, RunConfig};
/// # async fn example(graph: ProcessGraph) -> Result<(), Box<dyn std::error::Error>> {
/// let mut runner = ProcessRunner::new(
///     graph,
///     Arc::new(InMemoryStateStore::new()),
///     RunConfig::default(),
/// );
/// let report = runner
///     .run(ProcessEvent::external("StartDocumentation", json!({"product": "Contoso GlowBrew"})))
///     .await?;
/// println!("dispatched {} deliveries", report.dispatched);
/// # Ok(())
/// # }
/// ```
pub struct ProcessRunner {
    graph: ProcessGraph,
    store: Arc<dyn StateStore>,
    config: RunConfig,
    event_bus: EventBus,
}

impl ProcessRunner {
    /// Create a runner with the bus described by `config.event_bus`.
    #[must_use]
    pub fn new(graph: ProcessGraph, store: Arc<dyn StateStore>, config: RunConfig) -> Self {
        let event_bus = config.event_bus.build_event_bus();
        Self::with_bus(graph, store, config, event_bus)
    }

    /// Create a runner around a preconfigured [`EventBus`], for callers that
    /// attach their own sinks (per-client streaming and the like).
    #[must_use]
    pub fn with_bus(
        graph: ProcessGraph,
        store: Arc<dyn StateStore>,
        config: RunConfig,
        event_bus: EventBus,
    ) -> Self {
        event_bus.listen_for_events();
        Self {
            graph,
            store,
            config,
            event_bus,
        }
    }

    #[must_use]
    pub fn graph(&self) -> &ProcessGraph {
        &self.graph
    }

    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Execute a full run seeded with one external event.
    pub async fn run(&mut self, initial: ProcessEvent) -> Result<RunReport, RunnerError> {
        self.run_with_cancel(initial, CancelToken::new()).await
    }

    /// Execute a full run, checking `cancel` before each delivery.
    #[instrument(skip(self, initial, cancel), fields(process = %self.graph.name()), err)]
    pub async fn run_with_cancel(
        &mut self,
        initial: ProcessEvent,
        cancel: CancelToken,
    ) -> Result<RunReport, RunnerError> {
        let run_id = self.config.next_run_id();
        tracing::info!(run_id = %run_id, event = %initial, "process run started");

        let router = EventRouter::new(&self.graph);
        let mut queue: VecDeque<Delivery> = router.route(&initial).into();
        let mut active: FxHashMap<String, ActiveStep> = FxHashMap::default();
        let mut trace: Vec<DeliveryRecord> = Vec::new();
        let mut dispatched: u64 = 0;

        let outcome = loop {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, dispatched, "run cancelled");
                break RunStatus::Cancelled;
            }

            let Some(delivery) = queue.pop_front() else {
                break RunStatus::Completed;
            };

            if dispatched >= self.config.max_steps {
                tracing::warn!(
                    run_id = %run_id,
                    budget = self.config.max_steps,
                    pending = queue.len() + 1,
                    "dispatch budget exhausted"
                );
                break RunStatus::BudgetExceeded;
            }
            dispatched += 1;

            let events = match self.dispatch(&delivery, dispatched, &mut active).await {
                Ok(events) => events,
                Err(err) => {
                    self.finish(&run_id, "error", dispatched).await;
                    return Err(err);
                }
            };

            trace.push(DeliveryRecord {
                step: delivery.step,
                handler: delivery.handler,
                event: delivery.event,
            });

            for event in &events {
                queue.extend(router.route(event));
            }
        };

        let status_label = match outcome {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::BudgetExceeded => "budget_exceeded",
        };
        self.finish(&run_id, status_label, dispatched).await;
        tracing::info!(run_id = %run_id, status = status_label, dispatched, "process run ended");

        Ok(RunReport {
            run_id,
            status: outcome,
            dispatched,
            trace,
        })
    }

    /// Invoke one delivery against its (lazily activated) step instance and
    /// collect the process events it produced, in configured emission order.
    async fn dispatch(
        &self,
        delivery: &Delivery,
        dispatch_seq: u64,
        active: &mut FxHashMap<String, ActiveStep>,
    ) -> Result<Vec<ProcessEvent>, RunnerError> {
        let descriptor =
            self.graph
                .step(&delivery.step)
                .ok_or_else(|| RunnerError::UnknownDeliveryTarget {
                    step: delivery.step.clone(),
                })?;

        // The builder guarantees the handler exists on the descriptor.
        let declared_shape = descriptor
            .handler(&delivery.handler)
            .map(|h| h.accepted_shape())
            .unwrap_or_default();
        if !declared_shape.matches(&delivery.payload) {
            return Err(RunnerError::PayloadMismatch {
                step: delivery.step.clone(),
                handler: delivery.handler.clone(),
                expected: declared_shape,
                got: PayloadShape::of(&delivery.payload),
            });
        }

        let result_event = descriptor
            .handler(&delivery.handler)
            .and_then(|h| h.result_event())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.{}", delivery.step, delivery.handler));

        if !active.contains_key(&delivery.step) {
            let entry = self.activate(descriptor.instantiate(), &delivery.step).await?;
            active.insert(delivery.step.clone(), entry);
        }
        let entry = active
            .get_mut(&delivery.step)
            .ok_or_else(|| RunnerError::UnknownDeliveryTarget {
                step: delivery.step.clone(),
            })?;

        let ctx = StepContext::new(
            &delivery.step,
            &delivery.handler,
            dispatch_seq,
            self.event_bus.sender(),
        );

        tracing::debug!(
            step = %delivery.step,
            handler = %delivery.handler,
            event = %delivery.event,
            dispatch_seq,
            "dispatching delivery"
        );

        let result = entry
            .instance
            .handle(&delivery.handler, delivery.payload.clone(), &ctx)
            .await
            .map_err(|source| RunnerError::Handler {
                step: delivery.step.clone(),
                handler: delivery.handler.clone(),
                source,
            })?;

        self.persist(entry, &delivery.step).await?;

        let emitted: Vec<ProcessEvent> = ctx
            .take_emitted()
            .into_iter()
            .map(|EmittedEvent { name, payload }| {
                ProcessEvent::emitted(&delivery.step, name, payload)
            })
            .collect();
        let result_event = result.map(|payload| {
            ProcessEvent::handler_result(&delivery.step, &delivery.handler, result_event, payload)
        });

        let mut events = Vec::with_capacity(emitted.len() + 1);
        match self.config.emission_order {
            EmissionOrder::ResultFirst => {
                events.extend(result_event);
                events.extend(emitted);
            }
            EmissionOrder::EmittedFirst => {
                events.extend(emitted);
                events.extend(result_event);
            }
        }
        Ok(events)
    }

    /// Construct and activate a step instance, feeding it persisted state
    /// when the store has any for its id.
    async fn activate(
        &self,
        mut instance: Box<dyn Step>,
        step_id: &str,
    ) -> Result<ActiveStep, RunnerError> {
        let prior = self
            .store
            .load(step_id)
            .await
            .map_err(|source| RunnerError::Store {
                step: step_id.to_string(),
                source,
            })?;
        let resumed = prior.is_some();

        instance
            .on_activate(prior)
            .await
            .map_err(|source| RunnerError::Activation {
                step: step_id.to_string(),
                source,
            })?;

        tracing::debug!(step = %step_id, resumed, "step activated");
        Ok(ActiveStep {
            instance,
            stateful: false,
        })
    }

    /// Persist the step's state snapshot after a completed delivery.
    async fn persist(&self, entry: &mut ActiveStep, step_id: &str) -> Result<(), RunnerError> {
        let Some(snapshot) = entry.instance.snapshot_state() else {
            if entry.stateful {
                tracing::warn!(step = %step_id, "stateful step stopped producing snapshots");
            }
            return Ok(());
        };
        entry.stateful = true;
        self.store
            .save(step_id, snapshot)
            .await
            .map_err(|source| RunnerError::Store {
                step: step_id.to_string(),
                source,
            })
    }

    /// Publish the run-terminated diagnostic so stream consumers can stop.
    async fn finish(&self, run_id: &str, status: &str, dispatched: u64) {
        let message = format!("run={run_id} status={status} dispatched={dispatched}");
        if self
            .event_bus
            .sender()
            .send(Event::diagnostic(RUN_END_SCOPE, message))
            .is_err()
        {
            tracing::debug!(run_id = %run_id, "event bus closed before run end event");
        }
        // Give the listener a chance to drain before sinks are inspected.
        tokio::task::yield_now().await;
    }
}
