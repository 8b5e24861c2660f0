//! Static step metadata: descriptors, handler declarations, and factories.
//!
//! A [`StepDescriptor`] is what the builder registers: a unique step id, the
//! set of named handlers the step exposes, and a [`StepFactory`] that the
//! runner uses to construct the live instance lazily on first delivery.
//! Handlers are declared explicitly rather than discovered; dispatch goes
//! through a lookup table keyed by handler name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::step::Step;

/// Structural shape a handler accepts for its delivered payload.
///
/// `Any` opts out of shape checking. The other variants mirror the JSON
/// value kinds, checked at dispatch time before the handler runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadShape {
    #[default]
    Any,
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl PayloadShape {
    /// Shape of a concrete JSON value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Whether `value` satisfies this declared shape.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        *self == Self::Any || *self == Self::of(value)
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Any => "any",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        write!(f, "{label}")
    }
}

/// Declaration of one named operation a step exposes.
///
/// `result_event`, when set, names the event automatically produced when the
/// handler completes with a non-empty result. Handler-result subscriptions
/// match on the `(step, handler)` tuple, so the name is optional; without it
/// the result event carries the implicit `"<step>.<handler>"` name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerDescriptor {
    name: String,
    accepts: PayloadShape,
    result_event: Option<String>,
}

impl HandlerDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accepts: PayloadShape::Any,
            result_event: None,
        }
    }

    /// Declare the payload shape this handler accepts.
    #[must_use]
    pub fn accepts(mut self, shape: PayloadShape) -> Self {
        self.accepts = shape;
        self
    }

    /// Name the event automatically emitted when this handler completes
    /// with a non-empty result.
    #[must_use]
    pub fn with_result_event(mut self, event: impl Into<String>) -> Self {
        self.result_event = Some(event.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn accepted_shape(&self) -> PayloadShape {
        self.accepts
    }

    #[must_use]
    pub fn result_event(&self) -> Option<&str> {
        self.result_event.as_deref()
    }
}

/// Constructs live step instances for the runner.
///
/// Implemented for any `Fn() -> Box<dyn Step>` closure, so registration
/// stays terse:
///
/// ```
/// use stepweave::descriptors::{HandlerDescriptor, StepDescriptor};
/// # use stepweave::step::{Step, StepContext, StepError};
/// # use async_trait::async_trait;
/// # struct Gather;
/// # #[async_trait]
/// # impl Step for Gather {
/// #     async fn handle(&mut self, _: &str, _: serde_json::Value, _: &StepContext)
/// #         -> Result<Option<serde_json::Value>, StepError> { Ok(None) }
/// # }
///
/// let descriptor = StepDescriptor::new("gather", || Box::new(Gather))
///     .with_handler(HandlerDescriptor::new("gather_product_info"));
/// ```
pub trait StepFactory: Send + Sync {
    fn create(&self) -> Box<dyn Step>;
}

impl<F> StepFactory for F
where
    F: Fn() -> Box<dyn Step> + Send + Sync,
{
    fn create(&self) -> Box<dyn Step> {
        self()
    }
}

/// Static metadata for one step: identity, handlers, and instance factory.
#[derive(Clone)]
pub struct StepDescriptor {
    id: String,
    handlers: Vec<HandlerDescriptor>,
    factory: Arc<dyn StepFactory>,
}

impl StepDescriptor {
    pub fn new<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Step> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            handlers: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Construct from a non-closure [`StepFactory`] implementation.
    pub fn with_factory(id: impl Into<String>, factory: impl StepFactory + 'static) -> Self {
        Self {
            id: id.into(),
            handlers: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Add a handler declaration. Handler-name uniqueness is enforced when
    /// the descriptor is registered with the builder.
    #[must_use]
    pub fn with_handler(mut self, handler: HandlerDescriptor) -> Self {
        self.handlers.push(handler);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    /// Look up a handler declaration by name.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<&HandlerDescriptor> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    /// Construct a fresh, unactivated instance of this step.
    pub(crate) fn instantiate(&self) -> Box<dyn Step> {
        self.factory.create()
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("id", &self.id)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}
