//! # Stepweave: Event-driven Step Orchestration Runtime
//!
//! Stepweave executes processes defined as immutable graphs of steps wired
//! together by typed event subscriptions. Control flow is not a call chain:
//! steps never invoke each other. A step's handler finishes, the runtime
//! turns what it produced into events, and subscriptions decide which
//! handlers run next.
//!
//! ## Core Concepts
//!
//! - **Steps**: Stateful units of work exposing named handlers
//! - **Descriptors**: Static step metadata registered with the builder
//! - **Events**: Named occurrences with JSON payloads and typed origins
//! - **Subscriptions**: Exact-match routing edges from event sources to handlers
//! - **Runner**: FIFO dispatch with budgets, cancellation, and persistence
//!
//! ## Quick Start
//!
//! ```
//! use async_trait::async_trait;
//! use serde_json::{Value, json};
//! use stepweave::descriptors::{HandlerDescriptor, StepDescriptor};
//! use stepweave::graphs::ProcessBuilder;
//! use stepweave::step::{Step, StepContext, StepError};
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Step for Greeter {
//!     async fn handle(
//!         &mut self,
//!         handler: &str,
//!         payload: Value,
//!         _ctx: &StepContext,
//!     ) -> Result<Option<Value>, StepError> {
//!         match handler {
//!             "greet" => Ok(Some(json!({"greeting": format!("hello, {payload}")}))),
//!             other => Err(StepError::UnknownHandler(other.to_string())),
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<(), stepweave::graphs::BuildError> {
//! let graph = ProcessBuilder::new("greeting")
//!     .add_step(
//!         StepDescriptor::new("greeter", || Box::new(Greeter))
//!             .with_handler(HandlerDescriptor::new("greet")),
//!     )?
//!     .on_input_event("Start")
//!     .send_event_to("greeter", "greet")?
//!     .build()?;
//!
//! assert_eq!(graph.subscriptions().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Execution lives in [`runtimes::ProcessRunner`]: seed it with an external
//! [`events::ProcessEvent`] and it dispatches deliveries one at a time until
//! the queue drains, the budget runs out, or a
//! [`runtimes::CancelToken`] fires.
//!
//! ## Module Guide
//!
//! - [`descriptors`] - Step metadata, handler declarations, payload shapes
//! - [`step`] - The [`Step`](step::Step) trait, context, and step errors
//! - [`events`] - Process events, origins, and deliveries
//! - [`graphs`] - Process definition, validation, and the routing index
//! - [`router`] - Pure event-to-deliveries routing
//! - [`runtimes`] - The runner, run configuration, and state stores
//! - [`event_bus`] - Observability events and pluggable sinks
//! - [`telemetry`] - Tracing setup and event formatting

pub mod descriptors;
pub mod event_bus;
pub mod events;
pub mod graphs;
pub mod router;
pub mod runtimes;
pub mod step;
pub mod telemetry;
