//! Measurement Forms
//!
//! Engine for entity editors whose fields come from a parameter catalog
//! (Parameter / Method / Fraction / Matrix):
//! - Readiness state machine gating schema reads and writes
//! - Parameter resolution from ready lists or async sources
//! - Schema synchronization that never drops in-progress edits
//! - Entity <-> form value conversion with skip rules
//! - Last-caller-wins value application

pub mod bridge;
pub mod cancel;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod form;
pub mod hooks;
pub mod readiness;
pub mod resolver;
pub mod schema;
pub mod utils;
pub mod validator;

// Re-exports for convenience
pub use bridge::{EntityBridge, SkipRules};
pub use cancel::CancelSignal;
pub use config::{CatalogContext, EngineConfig, FormOptions};
pub use entities::{Landing, ObservedLocation, ProgramRef, Sample};
pub use error::FormError;
pub use events::{FormEvent, FormEventBus};
pub use form::{ApplyOutcome, MeasurementValuesForm, SyncOutcome};
pub use hooks::{DefaultHooks, FormHooks};
pub use readiness::{ReadinessStateMachine, ReadyStep};
pub use resolver::parameter_channel;
pub use schema::{FieldKey, FieldSchema, FieldValue, SyncReport};
pub use validator::{FieldRule, PmfmValidators, ValidationError, ValidatorFactory};

pub use pmfm_core;
