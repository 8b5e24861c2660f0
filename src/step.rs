//! Live step instances: the [`Step`] trait, execution context, and errors.
//!
//! A step is a named unit of work with one or more handlers and optional
//! private state that survives across deliveries within a run (and across
//! runs, through the [`StateStore`](crate::runtimes::StateStore) contract).
//! The runner constructs instances lazily on first delivery, activates them
//! with fresh-or-persisted state, and serializes all deliveries to the same
//! instance — handlers never observe concurrent access to their own state.

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::event_bus::Event;
use crate::events::EmittedEvent;

/// A constructed, stateful step bound to one descriptor.
///
/// Handlers are dispatched by name: the runner calls [`handle`](Self::handle)
/// with the handler name from the matched subscription, and the step matches
/// on it internally. Unknown names cannot reach a step — the builder rejects
/// subscriptions to handlers the descriptor does not declare.
///
/// # Lifecycle
///
/// `Uninitialized → Activated → Ready ⇄ Handling`. [`on_activate`](Self::on_activate)
/// runs exactly once per run, before any delivery, with previously persisted
/// state when the store has any. A step declares itself stateful by
/// returning `Some` from [`snapshot_state`](Self::snapshot_state); the
/// runner then persists the snapshot after every completed delivery.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use stepweave::step::{Step, StepContext, StepError};
///
/// struct GenerateDocs {
///     drafts: u64,
/// }
///
/// #[async_trait]
/// impl Step for GenerateDocs {
///     async fn on_activate(&mut self, state: Option<Value>) -> Result<(), StepError> {
///         if let Some(state) = state {
///             self.drafts = state["drafts"].as_u64().unwrap_or(0);
///         }
///         Ok(())
///     }
///
///     async fn handle(
///         &mut self,
///         handler: &str,
///         payload: Value,
///         ctx: &StepContext,
///     ) -> Result<Option<Value>, StepError> {
///         match handler {
///             "generate" => {
///                 self.drafts += 1;
///                 ctx.emit("DocumentationGenerated", payload);
///                 Ok(None)
///             }
///             other => Err(StepError::UnknownHandler(other.to_string())),
///         }
///     }
///
///     fn snapshot_state(&self) -> Option<Value> {
///         Some(json!({ "drafts": self.drafts }))
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + Sync {
    /// Activation hook, called once per run before any delivery.
    ///
    /// `state` is the previously persisted state for this step id, or `None`
    /// on first activation. The default implementation ignores it.
    async fn on_activate(&mut self, state: Option<Value>) -> Result<(), StepError> {
        let _ = state;
        Ok(())
    }

    /// Invoke the named handler with the delivered payload.
    ///
    /// Returning `Ok(Some(payload))` produces the handler's automatic result
    /// event; `Ok(None)` produces nothing beyond explicitly emitted events.
    async fn handle(
        &mut self,
        handler: &str,
        payload: Value,
        ctx: &StepContext,
    ) -> Result<Option<Value>, StepError>;

    /// Snapshot of the step's persisted state, or `None` for stateless steps.
    fn snapshot_state(&self) -> Option<Value> {
        None
    }
}

/// Execution context handed to a handler for one delivery.
///
/// Exposes the step's identity and the `emit` callback. Emitted events are
/// collected in emission order and routed by the scheduler after the handler
/// returns; emission itself never suspends or fails.
#[derive(Clone, Debug)]
pub struct StepContext {
    step_id: String,
    handler: String,
    dispatch_seq: u64,
    emitted: Arc<Mutex<Vec<EmittedEvent>>>,
    bus_sender: flume::Sender<Event>,
}

impl StepContext {
    pub(crate) fn new(
        step_id: impl Into<String>,
        handler: impl Into<String>,
        dispatch_seq: u64,
        bus_sender: flume::Sender<Event>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            handler: handler.into(),
            dispatch_seq,
            emitted: Arc::new(Mutex::new(Vec::new())),
            bus_sender,
        }
    }

    /// The id of the step this delivery targets.
    #[must_use]
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// The handler name this delivery invokes.
    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Position of this delivery in the run's dispatch order (1-based).
    #[must_use]
    pub fn dispatch_seq(&self) -> u64 {
        self.dispatch_seq
    }

    /// Emit a named event from inside the handler.
    ///
    /// The event is queued in emission order and routed to subscribers once
    /// the handler returns. A trace entry is forwarded to the event bus;
    /// bus disconnection is logged and otherwise ignored.
    pub fn emit(&self, name: impl Into<String>, payload: Value) {
        let name = name.into();
        if self
            .bus_sender
            .send(Event::step_trace(
                &self.step_id,
                &self.handler,
                self.dispatch_seq,
                "emit",
                format!("emitted event {name}"),
            ))
            .is_err()
        {
            tracing::debug!(step = %self.step_id, event = %name, "event bus closed; emit trace dropped");
        }
        self.emitted.lock().push(EmittedEvent { name, payload });
    }

    /// Drain events emitted during the handler invocation, in order.
    pub(crate) fn take_emitted(&self) -> Vec<EmittedEvent> {
        std::mem::take(&mut *self.emitted.lock())
    }
}

/// Fatal errors raised by step activation or handler bodies.
///
/// Any `StepError` surfacing from a handler aborts the whole run (fail-fast);
/// retry policy, if any, belongs to the external collaborator the handler
/// wraps, not to the orchestration core.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// Expected input data is missing from the delivered payload.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(stepweave::step::missing_input),
        help("Check that the upstream step produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// The step was asked for a handler it does not implement.
    ///
    /// Reaching this from the runner indicates a descriptor whose declared
    /// handlers diverge from the step implementation.
    #[error("step does not implement handler: {0}")]
    #[diagnostic(
        code(stepweave::step::unknown_handler),
        help("Keep the descriptor's handler list in sync with the Step impl.")
    )]
    UnknownHandler(String),

    /// External collaborator (completion service, tool, store) failed.
    #[error("collaborator error ({collaborator}): {message}")]
    #[diagnostic(code(stepweave::step::collaborator))]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// JSON (de)serialization of payload or state failed.
    #[error(transparent)]
    #[diagnostic(code(stepweave::step::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Handler-specific fault with no finer classification.
    #[error("step failed: {0}")]
    #[diagnostic(code(stepweave::step::failed))]
    Failed(String),
}
