//! Schema synchronization
//!
//! Adds, updates and removes fields so the schema matches a parameter list.
//! Values of fields that survive a pass are never touched.

use std::collections::HashSet;
use std::sync::Arc;

use pmfm_core::value::from_model_value;
use pmfm_core::{FormValue, ParameterSpec, PmfmId};
use serde::Serialize;
use tracing::debug;

use super::{Field, FieldKey, FieldSchema};
use crate::validator::ValidatorFactory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct SchemaSynchronizer {
    validators: Arc<dyn ValidatorFactory>,
    protected: HashSet<String>,
    with_discriminator: bool,
}

impl SchemaSynchronizer {
    pub fn new(validators: Arc<dyn ValidatorFactory>, protected: &[String], with_discriminator: bool) -> Self {
        Self {
            validators,
            protected: protected.iter().cloned().collect(),
            with_discriminator,
        }
    }

    pub fn synchronize(&self, schema: &mut FieldSchema, parameters: &[Arc<ParameterSpec>]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut wanted: HashSet<PmfmId> = HashSet::with_capacity(parameters.len());

        for spec in parameters {
            let id = spec.id();
            wanted.insert(id);
            let key = FieldKey::Pmfm(id);
            let default_value = from_model_value(None, spec);
            let rule = self.validators.create(spec, Some(&default_value));

            match schema.get(&key).map(Field::is_array) {
                Some(is_array) if is_array == spec.is_multiple => {
                    if let Some(field) = schema.get_mut(&key) {
                        field.set_rule(rule);
                    }
                    report.updated += 1;
                }
                Some(_) => {
                    // Multiplicity changed: the old value has no meaning anymore.
                    schema.insert(key, new_field(spec, default_value, rule));
                    report.updated += 1;
                }
                None => {
                    schema.insert(key, new_field(spec, default_value, rule));
                    report.added += 1;
                }
            }
        }

        let stale: Vec<FieldKey> = schema
            .keys()
            .into_iter()
            .filter(|key| match key {
                FieldKey::Pmfm(id) => !wanted.contains(id),
                FieldKey::Attribute(name) => !self.protected.contains(name),
                FieldKey::Discriminator => false,
            })
            .collect();
        for key in stale {
            schema.remove(&key);
            report.removed += 1;
        }

        let want_discriminator = self.with_discriminator && !parameters.is_empty();
        if want_discriminator && !schema.contains(&FieldKey::Discriminator) {
            schema.insert(FieldKey::Discriminator, Field::discriminator());
        } else if !want_discriminator {
            schema.remove(&FieldKey::Discriminator);
        }

        debug!(
            "Schema synchronized: {} added, {} updated, {} removed",
            report.added, report.updated, report.removed
        );
        report
    }
}

fn new_field(spec: &ParameterSpec, default_value: FormValue, rule: crate::validator::FieldRule) -> Field {
    if spec.is_multiple {
        let mut field = Field::array(rule);
        field.patch(&default_value);
        field
    } else {
        let value = match default_value {
            FormValue::Single(v) => v,
            FormValue::Multiple(items) => items.into_iter().flatten().next(),
        };
        Field::scalar(value, rule)
    }
}
