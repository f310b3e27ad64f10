//! Field validation rules
//!
//! `ValidatorFactory` turns one parameter spec into the rule of its field.
//! The default factory, `PmfmValidators`, derives the rule from the spec's
//! flags and bounds; owners may plug their own.

use std::fmt;
use thiserror::Error;

use pmfm_core::value::is_empty_value;
use pmfm_core::{FormValue, ParameterSpec, PmfmValue, ValueType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("value is required")]
    Required,
    #[error("value must be greater than or equal to {0}")]
    Min(f64),
    #[error("value must be less than or equal to {0}")]
    Max(f64),
    #[error("value must have at most {0} decimals")]
    Decimals(u32),
    #[error("value must be an integer")]
    Integer,
    #[error("unknown qualitative value {0}")]
    UnknownQualitativeValue(i32),
    #[error("expected a {0} value")]
    TypeMismatch(ValueType),
}

/// Validation rule of one field. Opaque to the schema: it only asks for errors.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub required: bool,
    pub value_type: ValueType,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_decimals: Option<u32>,
    pub qualitative_ids: Vec<i32>,
}

impl FieldRule {
    pub fn optional(value_type: ValueType) -> Self {
        Self {
            required: false,
            value_type,
            min: None,
            max: None,
            max_decimals: None,
            qualitative_ids: Vec::new(),
        }
    }

    pub fn validate(&self, value: &FormValue) -> Vec<ValidationError> {
        match value {
            FormValue::Single(v) => self.validate_single(v.as_ref()),
            FormValue::Multiple(items) => self.validate_items(items),
        }
    }

    pub fn validate_single(&self, value: Option<&PmfmValue>) -> Vec<ValidationError> {
        if is_empty_value(value) {
            return if self.required {
                vec![ValidationError::Required]
            } else {
                Vec::new()
            };
        }
        value.map(|v| self.check_value(v)).unwrap_or_default()
    }

    /// A required multiple field needs at least one non-empty item; every
    /// filled item is checked on its own.
    pub fn validate_items(&self, items: &[Option<PmfmValue>]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.required && items.iter().all(|v| is_empty_value(v.as_ref())) {
            errors.push(ValidationError::Required);
        }
        for item in items.iter().flatten() {
            for error in self.check_value(item) {
                if !errors.contains(&error) {
                    errors.push(error);
                }
            }
        }
        errors
    }

    fn check_value(&self, value: &PmfmValue) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        match self.value_type {
            ValueType::Integer | ValueType::Double => {
                let Some(n) = value.as_f64() else {
                    return vec![ValidationError::TypeMismatch(self.value_type)];
                };
                if self.value_type == ValueType::Integer && matches!(value, PmfmValue::Text(_)) && n.fract() != 0.0 {
                    errors.push(ValidationError::Integer);
                }
                if let Some(min) = self.min.filter(|min| n < *min) {
                    errors.push(ValidationError::Min(min));
                }
                if let Some(max) = self.max.filter(|max| n > *max) {
                    errors.push(ValidationError::Max(max));
                }
                if let Some(decimals) = self.max_decimals {
                    if decimal_count(n) > decimals as usize {
                        errors.push(ValidationError::Decimals(decimals));
                    }
                }
            }
            ValueType::Boolean => {
                if value.as_bool().is_none() {
                    errors.push(ValidationError::TypeMismatch(ValueType::Boolean));
                }
            }
            ValueType::Date => {
                if !matches!(value, PmfmValue::Date(_)) {
                    errors.push(ValidationError::TypeMismatch(ValueType::Date));
                }
            }
            ValueType::QualitativeValue => match value {
                PmfmValue::Qualitative(qv) => {
                    if !self.qualitative_ids.is_empty() && !self.qualitative_ids.contains(&qv.id) {
                        errors.push(ValidationError::UnknownQualitativeValue(qv.id));
                    }
                }
                _ => errors.push(ValidationError::TypeMismatch(ValueType::QualitativeValue)),
            },
            ValueType::String => {}
        }
        errors
    }
}

fn decimal_count(n: f64) -> usize {
    let text = n.to_string();
    text.split_once('.').map_or(0, |(_, decimals)| decimals.len())
}

/// Builds the rule of a field. Must be pure: same spec, same rule.
pub trait ValidatorFactory: Send + Sync + fmt::Debug {
    fn create(&self, spec: &ParameterSpec, default_value: Option<&FormValue>) -> FieldRule;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PmfmValidators;

impl ValidatorFactory for PmfmValidators {
    fn create(&self, spec: &ParameterSpec, _default_value: Option<&FormValue>) -> FieldRule {
        FieldRule {
            required: spec.required,
            value_type: spec.value_type,
            min: spec.min_value,
            max: spec.max_value,
            max_decimals: spec.maximum_number_decimals,
            qualitative_ids: spec.qualitative_values.iter().map(|qv| qv.id).collect(),
        }
    }
}
