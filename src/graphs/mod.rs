//! Process graph definition: builder, subscriptions, and the compiled graph.
//!
//! [`ProcessBuilder`] accumulates step descriptors and subscriptions with
//! fail-fast validation; [`ProcessBuilder::build`] produces an immutable
//! [`ProcessGraph`] value object that the router and runner consume.

pub mod builder;
pub mod graph;


pub use builder::{BuildError, ProcessBuilder, SubscriptionBuilder};
pub use graph::{EventSource, ProcessGraph, Subscription, SubscriptionTarget};
