//! Readiness State Machine
//!
//! Ordered progress steps gating every read and write of the field schema.
//! Observers subscribe to step changes; `wait_until` suspends until a step is
//! reached or the owner's cancellation fires.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

use crate::cancel::CancelSignal;
use crate::error::FormError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadyStep {
    Starting = 0,
    LoadingParameters = 1,
    SettingParameters = 2,
    UpdatingSchema = 3,
    SchemaReady = 4,
}

impl fmt::Display for ReadyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyStep::Starting => "STARTING",
            ReadyStep::LoadingParameters => "LOADING_PARAMETERS",
            ReadyStep::SettingParameters => "SETTING_PARAMETERS",
            ReadyStep::UpdatingSchema => "UPDATING_SCHEMA",
            ReadyStep::SchemaReady => "SCHEMA_READY",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct ReadinessStateMachine {
    tx: watch::Sender<ReadyStep>,
}

impl ReadinessStateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReadyStep::Starting);
        Self { tx }
    }

    pub fn current(&self) -> ReadyStep {
        *self.tx.borrow()
    }

    /// Derived from the step, never set on its own.
    pub fn is_ready(&self) -> bool {
        self.current() >= ReadyStep::SchemaReady
    }

    /// Moves forward to `step`. Returns false (and changes nothing) when
    /// `step` is behind or equal to the current step.
    pub fn advance_to(&self, step: ReadyStep) -> bool {
        self.tx.send_if_modified(|current| {
            if step > *current {
                *current = step;
                true
            } else {
                false
            }
        })
    }

    /// Explicit step-down, used when a new loading cycle starts on an engine
    /// that already went further (e.g. the catalog context changed).
    pub fn rewind_to(&self, step: ReadyStep) -> bool {
        self.tx.send_if_modified(|current| {
            if step < *current {
                *current = step;
                true
            } else {
                false
            }
        })
    }

    /// Forces the machine back to `Starting`.
    pub fn reset(&self) -> bool {
        self.rewind_to(ReadyStep::Starting)
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadyStep> {
        self.tx.subscribe()
    }

    /// Suspends until the machine reaches at least `step`.
    pub async fn wait_until(&self, step: ReadyStep, cancel: &CancelSignal) -> Result<(), FormError> {
        let mut rx = self.tx.subscribe();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FormError::Cancelled),
            reached = rx.wait_for(|current| *current >= step) => {
                reached.map(|_| ()).map_err(|_| FormError::Cancelled)
            }
        }
    }
}

impl Default for ReadinessStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
