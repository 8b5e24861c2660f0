//! Process runtime: the scheduler, run configuration, and state persistence.
//!
//! The runtime layer executes an immutable [`ProcessGraph`](crate::graphs::ProcessGraph)
//! while abstracting over persistence backends behind a consistent API.
//!
//! # Architecture
//!
//! - **[`ProcessRunner`]** - FIFO dispatch loop with lazy step activation
//! - **[`StateStore`]** - Trait for pluggable step-state persistence
//! - **[`RunConfig`]** - Dispatch budget, emission ordering, bus wiring
//! - **[`CancelToken`]** - Cooperative cancellation between deliveries
//!
//! # Persistence backends
//!
//! - **[`InMemoryStateStore`]** - Volatile storage for testing and development
//! - **`SqliteStateStore`** - Durable SQLite-backed persistence (feature `sqlite`)
//!
//! # Usage example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use std::sync::Arc;
//! use stepweave::events::ProcessEvent;
//! use stepweave::runtimes::{InMemoryStateStore, ProcessRunner, RunConfig};
//! # use stepweave::graphs::ProcessGraph;
//! # async fn example(graph: ProcessGraph) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let mut runner = ProcessRunner::new(
//!     graph,
//!     Arc::new(InMemoryStateStore::new()),
//!     RunConfig::default(),
//! );
//! let report = runner
//!     .run(ProcessEvent::external("StartProcess", json!({})))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod run_config;
pub mod runner;
pub mod state_store;
#[cfg(feature = "sqlite")]
pub mod state_store_sqlite;

pub use run_config::{DEFAULT_MAX_STEPS, EmissionOrder, EventBusConfig, RunConfig, SinkConfig};
pub use runner::{
    CancelToken, DeliveryRecord, ProcessRunner, RunReport, RunStatus, RunnerError,
};
pub use state_store::{InMemoryStateStore, StateStore, StateStoreError};
#[cfg(feature = "sqlite")]
pub use state_store_sqlite::{SqliteStateStore, SqliteStateStoreError};
