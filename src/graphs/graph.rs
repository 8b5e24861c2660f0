//! Immutable process graph: steps, subscriptions, and the routing index.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::descriptors::StepDescriptor;
use crate::events::Delivery;

/// The origin side of a subscription: what triggers a delivery.
///
/// Matching is exact on these identity tuples; there is no wildcard or
/// pattern matching.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    /// An external input event with the given id.
    ProcessInput { event: String },
    /// The automatic completion result of a specific handler.
    HandlerResult { step: String, handler: String },
    /// An event a specific step's handler explicitly emitted by name.
    StepEvent { step: String, event: String },
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessInput { event } => write!(f, "input:{event}"),
            Self::HandlerResult { step, handler } => write!(f, "result:{step}.{handler}"),
            Self::StepEvent { step, event } => write!(f, "event:{step}/{event}"),
        }
    }
}

/// The target side of a subscription: which handler receives the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTarget {
    pub step: String,
    pub handler: String,
}

/// A static routing edge from an event source to a step handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub source: EventSource,
    pub target: SubscriptionTarget,
}

/// Immutable wiring of a process: step descriptors plus subscriptions.
///
/// Graphs are pure value objects produced by
/// [`ProcessBuilder::build`](crate::graphs::ProcessBuilder::build); they own
/// topology only. Live instances and the delivery queue belong to a
/// [`ProcessRunner`](crate::runtimes::ProcessRunner) run, so executing the
/// same graph twice yields independent instance tables.
#[derive(Clone)]
pub struct ProcessGraph {
    name: String,
    steps: FxHashMap<String, StepDescriptor>,
    subscriptions: Vec<Subscription>,
    // Derived at build time: targets per source, in registration order.
    routes: FxHashMap<EventSource, Vec<SubscriptionTarget>>,
}

impl ProcessGraph {
    pub(crate) fn new(
        name: String,
        steps: FxHashMap<String, StepDescriptor>,
        subscriptions: Vec<Subscription>,
    ) -> Self {
        let mut routes: FxHashMap<EventSource, Vec<SubscriptionTarget>> = FxHashMap::default();
        for sub in &subscriptions {
            routes
                .entry(sub.source.clone())
                .or_default()
                .push(sub.target.clone());
        }
        Self {
            name,
            steps,
            subscriptions,
            routes,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a step descriptor by id.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&StepDescriptor> {
        self.steps.get(id)
    }

    /// All registered step descriptors, keyed by id.
    #[must_use]
    pub fn steps(&self) -> &FxHashMap<String, StepDescriptor> {
        &self.steps
    }

    /// All subscriptions, in registration order.
    #[must_use]
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Subscription targets for one exact source, in registration order.
    pub(crate) fn targets(&self, source: &EventSource) -> &[SubscriptionTarget] {
        self.routes.get(source).map_or(&[], Vec::as_slice)
    }

    /// Fan a payload out to every target of `source`, preserving order.
    pub(crate) fn deliveries_for(
        &self,
        source: &EventSource,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Vec<Delivery> {
        self.targets(source)
            .iter()
            .map(|target| Delivery {
                step: target.step.clone(),
                handler: target.handler.clone(),
                payload: payload.clone(),
                event: event_name.to_string(),
            })
            .collect()
    }
}

impl fmt::Debug for ProcessGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessGraph")
            .field("name", &self.name)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
