//! Event and delivery value types shared by the router and the runner.
//!
//! A [`ProcessEvent`] is a named occurrence with a JSON payload: either
//! external input injected by the caller, the automatic result of a handler
//! completing, or an event a handler explicitly emitted. Events are
//! transient; the router turns them into [`Delivery`] instructions and the
//! scheduler consumes each delivery exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Where a [`ProcessEvent`] came from.
///
/// Routing matches on this origin exactly: external input matches
/// process-input subscriptions, handler results match handler-result
/// subscriptions, and emitted events match named step-event subscriptions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOrigin {
    /// Injected from outside the process (the initial event of a run).
    External,
    /// Produced automatically when a handler returned a non-empty result.
    HandlerResult { step: String, handler: String },
    /// Explicitly emitted by a handler via [`StepContext::emit`](crate::step::StepContext::emit).
    Emitted { step: String },
}

/// A named occurrence with a payload, routed through the process graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub name: String,
    pub payload: Value,
    pub origin: EventOrigin,
}

impl ProcessEvent {
    /// Create an external input event, the starting point of a run.
    pub fn external(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            origin: EventOrigin::External,
        }
    }

    /// Event produced by a handler completing with a non-empty result.
    pub(crate) fn handler_result(
        step: impl Into<String>,
        handler: impl Into<String>,
        name: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            name: name.into(),
            payload,
            origin: EventOrigin::HandlerResult {
                step: step.into(),
                handler: handler.into(),
            },
        }
    }

    /// Event explicitly emitted by a handler during its execution.
    pub(crate) fn emitted(step: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            origin: EventOrigin::Emitted { step: step.into() },
        }
    }
}

impl fmt::Display for ProcessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            EventOrigin::External => write!(f, "{} (external)", self.name),
            EventOrigin::HandlerResult { step, handler } => {
                write!(f, "{} (result of {step}.{handler})", self.name)
            }
            EventOrigin::Emitted { step } => write!(f, "{} (emitted by {step})", self.name),
        }
    }
}

/// An event queued inside a handler invocation, drained when it returns.
#[derive(Clone, Debug, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Value,
}

/// A concrete instruction to invoke one handler with one payload.
///
/// Produced by the router from a matched subscription; consumed exactly once
/// by the scheduler. `event` records the triggering event name for the run
/// trace.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub step: String,
    pub handler: String,
    pub payload: Value,
    pub event: String,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}.{}", self.event, self.step, self.handler)
    }
}
