//! Observability bus: structured runtime events fanned out to sinks.
//!
//! The runner and step contexts emit [`Event`]s describing deliveries,
//! emissions, and run termination; an [`EventBus`] broadcasts them to
//! pluggable [`EventSink`]s (stdout, memory, channels).

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::{DiagnosticEvent, Event, RUN_END_SCOPE, StepTraceEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
