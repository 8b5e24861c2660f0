//! Pure event routing: from one event to its ordered deliveries.
//!
//! The router is a side-effect-free function of `(graph, event)`. An event's
//! origin determines which subscription source it can match, matching is
//! exact on identity tuples, and the produced deliveries preserve the order
//! in which the matching subscriptions were registered. That determinism is
//! what makes replaying an event trace against the same graph reproducible.

use crate::events::{Delivery, EventOrigin, ProcessEvent};
use crate::graphs::{EventSource, ProcessGraph};

/// Routes events against one process graph.
///
/// Borrowing rather than owning keeps routing trivially pure: the router
/// holds no queue, no instances, no state of any kind.
#[derive(Clone, Copy, Debug)]
pub struct EventRouter<'g> {
    graph: &'g ProcessGraph,
}

impl<'g> EventRouter<'g> {
    #[must_use]
    pub fn new(graph: &'g ProcessGraph) -> Self {
        Self { graph }
    }

    /// Produce one delivery per subscription matching the event's origin,
    /// in subscription registration order. Unmatched events route to an
    /// empty set; they are simply dropped.
    #[must_use]
    pub fn route(&self, event: &ProcessEvent) -> Vec<Delivery> {
        let source = match &event.origin {
            EventOrigin::External => EventSource::ProcessInput {
                event: event.name.clone(),
            },
            EventOrigin::HandlerResult { step, handler } => EventSource::HandlerResult {
                step: step.clone(),
                handler: handler.clone(),
            },
            EventOrigin::Emitted { step } => EventSource::StepEvent {
                step: step.clone(),
                event: event.name.clone(),
            },
        };

        let deliveries = self
            .graph
            .deliveries_for(&source, &event.name, &event.payload);

        tracing::trace!(
            event = %event.name,
            source = %source,
            fan_out = deliveries.len(),
            "routed event"
        );

        deliveries
    }
}
