use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Scope of the diagnostic event emitted when a run terminates, whatever the
/// terminal state. Stream consumers can key on it to know no further events
/// for that run will arrive.
pub const RUN_END_SCOPE: &str = "__stepweave_run_end__";

/// Structured observability event carried by the [`EventBus`](super::EventBus).
///
/// Distinct from [`ProcessEvent`](crate::events::ProcessEvent): process
/// events drive routing; bus events describe what the runtime did, for
/// sinks, dashboards, and tests.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    Step(StepTraceEvent),
    Diagnostic(DiagnosticEvent),
}

impl Event {
    /// Trace entry scoped to one step handler invocation.
    pub fn step_trace(
        step_id: impl Into<String>,
        handler: impl Into<String>,
        dispatch_seq: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Step(StepTraceEvent {
            step_id: step_id.into(),
            handler: handler.into(),
            dispatch_seq,
            scope: scope.into(),
            message: message.into(),
        })
    }

    /// Run-level diagnostic not tied to a particular step.
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> &str {
        match self {
            Event::Step(step) => &step.scope,
            Event::Diagnostic(diag) => &diag.scope,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Step(step) => &step.message,
            Event::Diagnostic(diag) => &diag.message,
        }
    }

    /// Project the event into a normalized JSON object:
    /// `{ "type", "scope", "message", "timestamp", "metadata" }`.
    pub fn to_json_value(&self) -> Value {
        let (event_type, metadata) = match self {
            Event::Step(step) => (
                "step",
                json!({
                    "step_id": step.step_id,
                    "handler": step.handler,
                    "dispatch_seq": step.dispatch_seq,
                }),
            ),
            Event::Diagnostic(_) => ("diagnostic", json!({})),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": Utc::now().to_rfc3339(),
            "metadata": metadata,
        })
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Step(step) => write!(
                f,
                "[{}.{}@{}] {}",
                step.step_id, step.handler, step.dispatch_seq, step.message
            ),
            Event::Diagnostic(diag) => write!(f, "{}", diag.message),
        }
    }
}

/// Trace of one step handler invocation or an action inside it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepTraceEvent {
    pub step_id: String,
    pub handler: String,
    /// Position of the enclosing delivery in dispatch order (1-based).
    pub dispatch_seq: u64,
    pub scope: String,
    pub message: String,
}

/// Run-level diagnostic message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}
