//! ProcessBuilder: fluent accumulation of steps and subscriptions.
//!
//! The builder fails fast: duplicate step ids, duplicate handler names, and
//! subscriptions naming an unknown step or handler are rejected at
//! registration time, so no partially valid graph ever escapes `build()`.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::graph::{EventSource, ProcessGraph, Subscription, SubscriptionTarget};
use crate::descriptors::StepDescriptor;

/// Graph-construction errors. Always fatal to the operation that raised
/// them; no partial graph is ever returned.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("duplicate step id: {id}")]
    #[diagnostic(
        code(stepweave::build::duplicate_step),
        help("Step ids must be unique within a process graph.")
    )]
    DuplicateStep { id: String },

    #[error("duplicate handler {handler:?} on step {step:?}")]
    #[diagnostic(
        code(stepweave::build::duplicate_handler),
        help("Handler names must be unique within a step.")
    )]
    DuplicateHandler { step: String, handler: String },

    #[error("unknown step: {id}")]
    #[diagnostic(
        code(stepweave::build::unknown_step),
        help("Register the step with add_step before subscribing to or from it.")
    )]
    UnknownStep { id: String },

    #[error("unknown handler {handler:?} on step {step:?}")]
    #[diagnostic(
        code(stepweave::build::unknown_handler),
        help("Declare the handler on the step's descriptor before wiring it.")
    )]
    UnknownHandler { step: String, handler: String },

    #[error("dangling subscription: {source_desc} references missing step {step:?}")]
    #[diagnostic(code(stepweave::build::dangling_subscription))]
    DanglingSubscription { source_desc: String, step: String },
}

/// Accumulates step descriptors and subscriptions, then produces immutable
/// [`ProcessGraph`] values.
///
/// # Examples
///
/// Wiring a documentation pipeline: external input starts the gather step,
/// its handler result feeds generation, and a named emitted event triggers
/// publishing.
///
/// ```
/// use stepweave::descriptors::{HandlerDescriptor, StepDescriptor};
/// use stepweave::graphs::ProcessBuilder;
/// # use stepweave::step::{Step, StepContext, StepError};
/// # use async_trait::async_trait;
/// # struct Noop;
/// # #[async_trait]
/// # impl Step for Noop {
/// #     async fn handle(&mut self, _: &str, p: serde_json::Value, _: &StepContext)
/// #         -> Result<Option<serde_json::Value>, StepError> { Ok(Some(p)) }
/// # }
/// # fn descriptor(id: &str, handler: &str) -> StepDescriptor {
/// #     StepDescriptor::new(id, || Box::new(Noop) as Box<dyn Step>)
/// #         .with_handler(HandlerDescriptor::new(handler))
/// # }
///
/// # fn main() -> Result<(), stepweave::graphs::BuildError> {
/// let graph = ProcessBuilder::new("documentation")
///     .add_step(descriptor("gather", "gather_product_info"))?
///     .add_step(descriptor("generate", "generate_docs"))?
///     .add_step(descriptor("publish", "publish_docs"))?
///     .on_input_event("Start")
///     .send_event_to("gather", "gather_product_info")?
///     .on_handler_result("gather", "gather_product_info")
///     .send_event_to("generate", "generate_docs")?
///     .on_step_event("generate", "DocumentationGenerated")
///     .send_event_to("publish", "publish_docs")?
///     .build()?;
///
/// assert_eq!(graph.subscriptions().len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProcessBuilder {
    name: String,
    steps: FxHashMap<String, StepDescriptor>,
    subscriptions: Vec<Subscription>,
}

impl ProcessBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: FxHashMap::default(),
            subscriptions: Vec::new(),
        }
    }

    /// Register a step descriptor.
    ///
    /// Fails with [`BuildError::DuplicateStep`] if the id is already taken,
    /// or [`BuildError::DuplicateHandler`] if the descriptor declares two
    /// handlers with the same name.
    pub fn add_step(mut self, descriptor: StepDescriptor) -> Result<Self, BuildError> {
        let id = descriptor.id().to_string();
        if self.steps.contains_key(&id) {
            return Err(BuildError::DuplicateStep { id });
        }
        for (i, handler) in descriptor.handlers().iter().enumerate() {
            if descriptor.handlers()[..i]
                .iter()
                .any(|h| h.name() == handler.name())
            {
                return Err(BuildError::DuplicateHandler {
                    step: id,
                    handler: handler.name().to_string(),
                });
            }
        }
        self.steps.insert(id, descriptor);
        Ok(self)
    }

    /// Register a routing edge from `source` to `(step, handler)`.
    ///
    /// Both endpoints are validated eagerly: the target step and handler
    /// must exist, and sources naming a step (handler results, step events)
    /// must name a registered one. Multiple subscriptions may share a source
    /// (fan-out) and a target may be reached by several sources (fan-in,
    /// each delivered independently).
    pub fn subscribe(
        mut self,
        source: EventSource,
        step: impl Into<String>,
        handler: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let step = step.into();
        let handler = handler.into();

        self.require_handler(&step, &handler)?;
        match &source {
            EventSource::ProcessInput { .. } => {}
            EventSource::HandlerResult {
                step: source_step,
                handler: source_handler,
            } => {
                self.require_handler(source_step, source_handler)?;
            }
            EventSource::StepEvent {
                step: source_step, ..
            } => {
                if !self.steps.contains_key(source_step) {
                    return Err(BuildError::UnknownStep {
                        id: source_step.clone(),
                    });
                }
            }
        }

        self.subscriptions.push(Subscription {
            source,
            target: SubscriptionTarget { step, handler },
        });
        Ok(self)
    }

    /// Start wiring an external input event.
    #[must_use]
    pub fn on_input_event(self, event: impl Into<String>) -> SubscriptionBuilder {
        SubscriptionBuilder {
            builder: self,
            source: EventSource::ProcessInput {
                event: event.into(),
            },
        }
    }

    /// Start wiring the automatic result of a step's handler.
    #[must_use]
    pub fn on_handler_result(
        self,
        step: impl Into<String>,
        handler: impl Into<String>,
    ) -> SubscriptionBuilder {
        SubscriptionBuilder {
            builder: self,
            source: EventSource::HandlerResult {
                step: step.into(),
                handler: handler.into(),
            },
        }
    }

    /// Start wiring a named event emitted by a step.
    #[must_use]
    pub fn on_step_event(
        self,
        step: impl Into<String>,
        event: impl Into<String>,
    ) -> SubscriptionBuilder {
        SubscriptionBuilder {
            builder: self,
            source: EventSource::StepEvent {
                step: step.into(),
                event: event.into(),
            },
        }
    }

    /// Produce an immutable graph from the accumulated topology.
    ///
    /// Repeatable: each call clones the metadata into an independent value
    /// object, so two builds share topology but nothing at runtime. Every
    /// subscription is re-validated; a subscription whose step vanished
    /// (impossible through this API, which has no removal) would surface as
    /// [`BuildError::DanglingSubscription`].
    pub fn build(&self) -> Result<ProcessGraph, BuildError> {
        for sub in &self.subscriptions {
            let source_step = match &sub.source {
                EventSource::ProcessInput { .. } => None,
                EventSource::HandlerResult { step, .. } | EventSource::StepEvent { step, .. } => {
                    Some(step)
                }
            };
            for step in source_step.into_iter().chain(Some(&sub.target.step)) {
                if !self.steps.contains_key(step) {
                    return Err(BuildError::DanglingSubscription {
                        source_desc: sub.source.to_string(),
                        step: step.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            process = %self.name,
            steps = self.steps.len(),
            subscriptions = self.subscriptions.len(),
            "process graph built"
        );

        Ok(ProcessGraph::new(
            self.name.clone(),
            self.steps.clone(),
            self.subscriptions.clone(),
        ))
    }

    fn require_handler(&self, step: &str, handler: &str) -> Result<(), BuildError> {
        let descriptor = self
            .steps
            .get(step)
            .ok_or_else(|| BuildError::UnknownStep {
                id: step.to_string(),
            })?;
        if descriptor.handler(handler).is_none() {
            return Err(BuildError::UnknownHandler {
                step: step.to_string(),
                handler: handler.to_string(),
            });
        }
        Ok(())
    }
}

/// Half-built subscription returned by the `on_*` wiring helpers.
#[must_use]
pub struct SubscriptionBuilder {
    builder: ProcessBuilder,
    source: EventSource,
}

impl SubscriptionBuilder {
    /// Complete the subscription, returning the process builder.
    pub fn send_event_to(
        self,
        step: impl Into<String>,
        handler: impl Into<String>,
    ) -> Result<ProcessBuilder, BuildError> {
        self.builder.subscribe(self.source, step, handler)
    }
}
