//! Measurement maps
//!
//! An entity carries its measurements either in model representation (raw
//! strings keyed by parameter id) or in form representation (typed values).
//! The enum variant is the record-kind discriminator; it serializes under the
//! historical type names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::spec::PmfmId;
use crate::value::FormValue;

pub type ModelValues = BTreeMap<PmfmId, String>;
pub type FormValues = BTreeMap<PmfmId, FormValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValuesKind {
    #[serde(rename = "MeasurementModelValues")]
    Model,
    #[serde(rename = "MeasurementFormValue")]
    Form,
}

impl ValuesKind {
    pub fn typename(self) -> &'static str {
        match self {
            ValuesKind::Model => "MeasurementModelValues",
            ValuesKind::Form => "MeasurementFormValue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasurementValues {
    #[serde(rename = "MeasurementModelValues")]
    Model(ModelValues),
    #[serde(rename = "MeasurementFormValue")]
    Form(FormValues),
}

impl Default for MeasurementValues {
    fn default() -> Self {
        MeasurementValues::Model(ModelValues::new())
    }
}

impl MeasurementValues {
    pub fn kind(&self) -> ValuesKind {
        match self {
            MeasurementValues::Model(_) => ValuesKind::Model,
            MeasurementValues::Form(_) => ValuesKind::Form,
        }
    }

    pub fn as_model(&self) -> Option<&ModelValues> {
        match self {
            MeasurementValues::Model(values) => Some(values),
            MeasurementValues::Form(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MeasurementValues::Model(values) => values.values().all(|v| v.trim().is_empty()),
            MeasurementValues::Form(values) => values.values().all(FormValue::is_empty),
        }
    }
}

impl From<ModelValues> for MeasurementValues {
    fn from(values: ModelValues) -> Self {
        MeasurementValues::Model(values)
    }
}

impl From<FormValues> for MeasurementValues {
    fn from(values: FormValues) -> Self {
        MeasurementValues::Form(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keeps_typename() {
        let mut values = ModelValues::new();
        values.insert(7, "x".to_string());
        let json = serde_json::to_value(MeasurementValues::Model(values.clone())).unwrap();
        assert_eq!(json, serde_json::json!({"MeasurementModelValues": {"7": "x"}}));

        let back: MeasurementValues = serde_json::from_value(json).unwrap();
        assert_eq!(back.as_model(), Some(&values));
        assert_eq!(back.kind().typename(), "MeasurementModelValues");
    }
}
