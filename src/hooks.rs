//! Owner hooks
//!
//! Points where the owning editor plugs into the form lifecycle. Every hook
//! has a default, so owners only override what they need.

use async_trait::async_trait;

use pmfm_core::{MeasurementEntity, ParameterList};

use crate::config::CatalogContext;
use crate::schema::FieldSchema;

#[async_trait]
pub trait FormHooks<E: MeasurementEntity>: Send + Sync {
    /// Called when `apply` starts, before waiting for the schema. May derive
    /// catalog context from the entity; a changed context reloads parameters.
    fn on_applying_entity(&self, entity: &E, context: &mut CatalogContext) -> anyhow::Result<()> {
        if let Some(label) = entity.program_label().filter(|label| !label.is_empty()) {
            context.program_label = Some(label.to_string());
        }
        Ok(())
    }

    /// Final transformation of the parameter list, after force-optional.
    async fn map_parameters(&self, parameters: ParameterList) -> anyhow::Result<ParameterList> {
        Ok(parameters)
    }

    /// Called after each synchronization pass, before the schema is committed.
    async fn on_schema_updated(&self, _schema: &mut FieldSchema) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl<E: MeasurementEntity> FormHooks<E> for DefaultHooks {}
