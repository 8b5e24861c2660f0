//! Run-level configuration: budgets, emission ordering, and bus wiring.

use uuid::Uuid;

use crate::event_bus::{EventBus, MemorySink, StdOutSink};

/// Ceiling on dispatched deliveries per run, unless configured otherwise.
pub const DEFAULT_MAX_STEPS: u64 = 1024;

/// Relative order in which a handler's automatic result event and its
/// explicitly emitted events are routed after the handler returns.
///
/// Neither order is inherently correct, so the choice is explicit and
/// configurable rather than an accident of implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmissionOrder {
    /// Route the automatic result event first, then emitted events in
    /// emission order.
    #[default]
    ResultFirst,
    /// Route emitted events in emission order, then the automatic result.
    EmittedFirst,
}

/// Configuration for one [`ProcessRunner`](super::ProcessRunner).
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Budget of dispatched deliveries before the run terminates with
    /// [`RunStatus::BudgetExceeded`](super::RunStatus::BudgetExceeded).
    /// Circuit breaker against cyclic event wiring.
    pub max_steps: u64,
    pub emission_order: EmissionOrder,
    /// Explicit run id; a v4 UUID is generated when absent.
    pub run_id: Option<String>,
    pub event_bus: EventBusConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            emission_order: EmissionOrder::default(),
            run_id: None,
            event_bus: EventBusConfig::default(),
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn with_emission_order(mut self, order: EmissionOrder) -> Self {
        self.emission_order = order;
        self
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// The configured run id, or a freshly generated one.
    pub(crate) fn next_run_id(&self) -> String {
        self.run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Declarative sink selection for the runner-owned event bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}

#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    #[must_use]
    pub fn new(sinks: Vec<SinkConfig>) -> Self {
        Self { sinks }
    }

    #[must_use]
    pub fn with_stdout_only() -> Self {
        Self::new(vec![SinkConfig::StdOut])
    }

    #[must_use]
    pub fn with_memory_sink() -> Self {
        Self::new(vec![SinkConfig::StdOut, SinkConfig::Memory])
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    /// Materialize an [`EventBus`] with the configured sinks.
    pub fn build_event_bus(&self) -> EventBus {
        let sinks = self
            .sinks
            .iter()
            .map(|sink| match sink {
                SinkConfig::StdOut => {
                    Box::new(StdOutSink::default()) as Box<dyn crate::event_bus::EventSink>
                }
                SinkConfig::Memory => Box::new(MemorySink::new()),
            })
            .collect();
        EventBus::with_sinks(sinks)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::with_stdout_only()
    }
}
