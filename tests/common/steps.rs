#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

use stepweave::descriptors::{HandlerDescriptor, StepDescriptor};
use stepweave::step::{Step, StepContext, StepError};

/// Shared log of `(step, handler, event)` tuples, appended as handlers run.
/// Lets tests assert on actual execution order, not just the run report.
pub type ExecutionLog = Arc<Mutex<Vec<(String, String, String)>>>;

pub fn new_log() -> ExecutionLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Passes its payload through as the handler result, recording the call.
pub struct RelayStep {
    pub log: ExecutionLog,
}

#[async_trait]
impl Step for RelayStep {
    async fn handle(
        &mut self,
        handler: &str,
        payload: Value,
        ctx: &StepContext,
    ) -> Result<Option<Value>, StepError> {
        self.log.lock().push((
            ctx.step_id().to_string(),
            handler.to_string(),
            payload.to_string(),
        ));
        Ok(Some(payload))
    }
}

/// Consumes its payload without producing a result event.
pub struct SinkStep {
    pub log: ExecutionLog,
}

#[async_trait]
impl Step for SinkStep {
    async fn handle(
        &mut self,
        handler: &str,
        payload: Value,
        ctx: &StepContext,
    ) -> Result<Option<Value>, StepError> {
        self.log.lock().push((
            ctx.step_id().to_string(),
            handler.to_string(),
            payload.to_string(),
        ));
        Ok(None)
    }
}

/// Fails every delivery with [`StepError::Failed`].
pub struct FaultyStep;

#[async_trait]
impl Step for FaultyStep {
    async fn handle(
        &mut self,
        _handler: &str,
        _payload: Value,
        _ctx: &StepContext,
    ) -> Result<Option<Value>, StepError> {
        Err(StepError::Failed("induced fault".to_string()))
    }
}

/// Counts deliveries in private state, persisting the count as a snapshot.
pub struct CountingStep {
    pub count: u64,
}

impl CountingStep {
    pub fn new() -> Self {
        Self { count: 0 }
    }
}

#[async_trait]
impl Step for CountingStep {
    async fn on_activate(&mut self, state: Option<Value>) -> Result<(), StepError> {
        if let Some(state) = state {
            self.count = state["count"].as_u64().unwrap_or(0);
        }
        Ok(())
    }

    async fn handle(
        &mut self,
        handler: &str,
        _payload: Value,
        _ctx: &StepContext,
    ) -> Result<Option<Value>, StepError> {
        match handler {
            "count" => {
                self.count += 1;
                Ok(Some(json!({"count": self.count})))
            }
            other => Err(StepError::UnknownHandler(other.to_string())),
        }
    }

    fn snapshot_state(&self) -> Option<Value> {
        Some(json!({"count": self.count}))
    }
}

/// Relay descriptor with a single pass-through handler.
pub fn relay(id: &str, handler: &str, log: &ExecutionLog) -> StepDescriptor {
    let log = Arc::clone(log);
    StepDescriptor::new(id, move || {
        Box::new(RelayStep {
            log: Arc::clone(&log),
        }) as Box<dyn Step>
    })
    .with_handler(HandlerDescriptor::new(handler))
}

/// Terminal descriptor that swallows payloads.
pub fn sink(id: &str, handler: &str, log: &ExecutionLog) -> StepDescriptor {
    let log = Arc::clone(log);
    StepDescriptor::new(id, move || {
        Box::new(SinkStep {
            log: Arc::clone(&log),
        }) as Box<dyn Step>
    })
    .with_handler(HandlerDescriptor::new(handler))
}
