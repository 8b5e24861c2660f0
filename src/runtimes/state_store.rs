//! Abstract step-state persistence: the save/load contract and the
//! in-memory backend.
//!
//! The orchestration core never owns a storage format; it hands each
//! stateful step's opaque JSON state to a [`StateStore`] after every
//! completed delivery and asks it back at activation. The contract is not
//! transactional: concurrent runs sharing one store race at the caller's
//! own risk.

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by persistence backends.
#[derive(Debug, Error, Diagnostic)]
pub enum StateStoreError {
    #[error("state backend error: {0}")]
    #[diagnostic(code(stepweave::state_store::backend))]
    Backend(String),

    #[error("state (de)serialization failed: {source}")]
    #[diagnostic(code(stepweave::state_store::serde))]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

/// Pluggable persistence for per-step state, keyed by step id.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Previously saved state for the step, or `None` if absent.
    async fn load(&self, step_id: &str) -> Result<Option<Value>, StateStoreError>;

    /// Persist the step's state, replacing any prior value.
    async fn save(&self, step_id: &str, state: Value) -> Result<(), StateStoreError>;
}

/// Volatile in-process store for tests and single-shot executions.
///
/// Clones share the same underlying map, so a cloned handle can be given to
/// a runner and inspected afterwards.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    entries: Arc<Mutex<FxHashMap<String, Value>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted step states.
    pub fn snapshot(&self) -> FxHashMap<String, Value> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, step_id: &str) -> Result<Option<Value>, StateStoreError> {
        Ok(self.entries.lock().get(step_id).cloned())
    }

    async fn save(&self, step_id: &str, state: Value) -> Result<(), StateStoreError> {
        self.entries.lock().insert(step_id.to_string(), state);
        Ok(())
    }
}
