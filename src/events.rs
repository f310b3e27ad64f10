//! Form Event Bus
//!
//! Per-form pub/sub of lifecycle notifications, so owners can observe the
//! engine without polling it.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::readiness::ReadyStep;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum FormEvent {
    /// The readiness step changed
    StepChanged { from: ReadyStep, to: ReadyStep },
    /// A synchronization pass committed a new schema
    SchemaUpdated { added: usize, updated: usize, removed: usize },
    /// An entity was written into the schema
    ValuesApplied,
    /// A user edit changed a field
    ValueChanged { field: String },
    /// Non-fatal failure, readable later through `last_error()`
    Error(String),
}

#[derive(Debug)]
pub struct FormEventBus {
    tx: broadcast::Sender<FormEvent>,
}

impl FormEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: FormEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FormEvent> {
        self.tx.subscribe()
    }
}

impl Default for FormEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
