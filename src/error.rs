//! Form engine errors
//!
//! Catalog failures are recovered locally (reset to an empty schema), stale
//! applies are not errors at all, and invariant violations are surfaced
//! loudly since they mean the schema diff itself is broken.

use thiserror::Error;

use pmfm_core::CoreError;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("parameter catalog failed to load: {0}")]
    CatalogLoad(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("schema invariant violated: {0}")]
    InvariantViolation(String),

    #[error("owner hook failed: {0}")]
    Hook(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl FormError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FormError::Cancelled)
    }
}
