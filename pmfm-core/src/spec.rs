//! Parameter definitions (PMFM)
//!
//! A `ParameterSpec` describes one dynamic field of a measurement form.
//! Specs coming from the catalog are shared behind `Arc` and never mutated;
//! a form that needs a variant (e.g. relaxed `required`) clones first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::CoreError;

/// Identifier of a parameter, stable across catalog reloads.
pub type PmfmId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Double,
    String,
    Boolean,
    Date,
    /// Single choice among the spec's qualitative values.
    QualitativeValue,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::QualitativeValue => "qualitative_value",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(ValueType::Integer),
            "double" => Ok(ValueType::Double),
            "string" => Ok(ValueType::String),
            "boolean" => Ok(ValueType::Boolean),
            "date" => Ok(ValueType::Date),
            "qualitative_value" => Ok(ValueType::QualitativeValue),
            other => Err(CoreError::UnknownValueType(other.to_string())),
        }
    }
}

/// One allowed answer of a qualitative parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeValue {
    pub id: i32,
    pub label: String,
    #[serde(default)]
    pub name: String,
}

impl QualitativeValue {
    pub fn new(id: i32, label: &str, name: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            name: name.to_string(),
        }
    }
}

/// Display unit conversion: the form shows `model * conversion_coefficient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConversion {
    pub from_unit: String,
    pub to_unit: String,
    pub conversion_coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    id: PmfmId,
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub is_multiple: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub is_computed: bool,
    /// Pre-filled value, in model (raw) representation.
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub maximum_number_decimals: Option<u32>,
    #[serde(default)]
    pub qualitative_values: Vec<QualitativeValue>,
    #[serde(default)]
    pub unit_label: Option<String>,
    #[serde(default)]
    pub display_conversion: Option<UnitConversion>,
}

impl ParameterSpec {
    pub fn new(id: PmfmId, label: &str, value_type: ValueType) -> Self {
        Self {
            id,
            label: label.to_string(),
            name: None,
            value_type,
            is_multiple: false,
            required: false,
            hidden: false,
            is_computed: false,
            default_value: None,
            min_value: None,
            max_value: None,
            maximum_number_decimals: None,
            qualitative_values: Vec::new(),
            unit_label: None,
            display_conversion: None,
        }
    }

    pub fn id(&self) -> PmfmId {
        self.id
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_computed(mut self, is_computed: bool) -> Self {
        self.is_computed = is_computed;
        self
    }

    pub fn with_multiple(mut self, is_multiple: bool) -> Self {
        self.is_multiple = is_multiple;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.maximum_number_decimals = Some(decimals);
        self
    }

    pub fn with_qualitative_values(mut self, values: Vec<QualitativeValue>) -> Self {
        self.qualitative_values = values;
        self
    }

    pub fn with_conversion(mut self, conversion: UnitConversion) -> Self {
        self.display_conversion = Some(conversion);
        self
    }

    /// Name shown to the user (falls back to the label).
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.label)
    }

    pub fn qualitative_value(&self, id: i32) -> Option<&QualitativeValue> {
        self.qualitative_values.iter().find(|qv| qv.id == id)
    }

    /// Compares the properties that shape a form field. Reference identity is
    /// irrelevant: a clone with the same flags is equal.
    pub fn structurally_equals(&self, other: &ParameterSpec) -> bool {
        self.id == other.id
            && self.required == other.required
            && self.hidden == other.hidden
            && self.is_computed == other.is_computed
            && self.is_multiple == other.is_multiple
            && self.value_type == other.value_type
            && self.default_value == other.default_value
    }
}

/// Pointwise structural comparison of two parameter lists.
pub fn parameters_equal(a: &[Arc<ParameterSpec>], b: &[Arc<ParameterSpec>]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(p1, p2)| Arc::ptr_eq(p1, p2) || p1.structurally_equals(p2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_independent() {
        let shared = Arc::new(ParameterSpec::new(7, "WEIGHT", ValueType::Double).with_required(true));
        let mut copy = (*shared).clone();
        copy.required = false;

        assert!(shared.required);
        assert_eq!(copy.id(), 7);
        assert!(!shared.structurally_equals(&copy));
    }

    #[test]
    fn test_parameters_equal_ignores_identity() {
        let a = vec![Arc::new(ParameterSpec::new(1, "A", ValueType::String))];
        let b = vec![Arc::new(ParameterSpec::new(1, "A renamed", ValueType::String))];
        assert!(parameters_equal(&a, &b));

        let c = vec![Arc::new(ParameterSpec::new(1, "A", ValueType::String).with_hidden(true))];
        assert!(!parameters_equal(&a, &c));
        assert!(!parameters_equal(&a, &[]));
    }

    #[test]
    fn test_value_type_parse() {
        assert_eq!("qualitative_value".parse::<ValueType>().unwrap(), ValueType::QualitativeValue);
        assert!("latitude".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_deserialize_catalog_entry() {
        let json = r#"{"id": 12, "label": "SEX", "type": "qualitative_value", "required": true,
            "qualitativeValues": [{"id": 1, "label": "M", "name": "Male"}]}"#;
        let spec: ParameterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.id(), 12);
        assert!(spec.required);
        assert!(!spec.is_multiple);
        assert_eq!(spec.qualitative_value(1).map(|qv| qv.name.as_str()), Some("Male"));
    }
}
