//! Entity Bridge
//!
//! Converts an entity's measurement map into form values for the active
//! parameters, and form values back into model values merged over what the
//! entity already carried.

use std::sync::Arc;

use pmfm_core::value::{from_model_value, is_empty_value, to_model_value};
use pmfm_core::{
    FormValue, FormValues, MeasurementValues, ModelValues, ParameterList, ParameterSpec, PmfmValue,
    PMFM_VALUE_SEPARATOR,
};

use crate::schema::{FieldKey, FieldSchema};

/// Caller-supplied emptiness predicate.
pub type EmptinessFn = fn(Option<&PmfmValue>) -> bool;

/// Which fields `from_form` leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRules {
    pub skip_disabled: bool,
    pub skip_computed: bool,
}

impl Default for SkipRules {
    fn default() -> Self {
        Self {
            skip_disabled: true,
            skip_computed: true,
        }
    }
}

#[derive(Clone, Copy)]
pub struct EntityBridge {
    is_empty: EmptinessFn,
    keep_unknown: bool,
}

impl std::fmt::Debug for EntityBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityBridge")
            .field("keep_unknown", &self.keep_unknown)
            .finish_non_exhaustive()
    }
}

impl Default for EntityBridge {
    fn default() -> Self {
        Self {
            is_empty: is_empty_value,
            keep_unknown: false,
        }
    }
}

impl EntityBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_emptiness(mut self, is_empty: EmptinessFn) -> Self {
        self.is_empty = is_empty;
        self
    }

    pub fn with_keep_unknown(mut self, keep_unknown: bool) -> Self {
        self.keep_unknown = keep_unknown;
        self
    }

    pub fn is_empty(&self, value: Option<&PmfmValue>) -> bool {
        (self.is_empty)(value)
    }

    /// Form values of every active parameter. Missing values fall back to
    /// the parameter's default; keys without an active parameter are dropped
    /// unless unknown values are kept.
    pub fn to_form(&self, values: &MeasurementValues, parameters: &[Arc<ParameterSpec>]) -> FormValues {
        let mut result = FormValues::new();
        match values {
            MeasurementValues::Model(model) => {
                for spec in parameters {
                    let raw = model.get(&spec.id()).map(String::as_str);
                    result.insert(spec.id(), from_model_value(raw, spec));
                }
                if self.keep_unknown {
                    for (id, raw) in model {
                        result
                            .entry(*id)
                            .or_insert_with(|| FormValue::single(PmfmValue::Text(raw.clone())));
                    }
                }
            }
            MeasurementValues::Form(form) => {
                for spec in parameters {
                    let value = match form.get(&spec.id()) {
                        Some(value) => normalize_multiplicity(value.clone(), spec),
                        None => from_model_value(None, spec),
                    };
                    result.insert(spec.id(), value);
                }
                if self.keep_unknown {
                    for (id, value) in form {
                        result.entry(*id).or_insert_with(|| value.clone());
                    }
                }
            }
        }
        result
    }

    /// Model values of `parameters` taken from `form`, merged over `prior`.
    /// A cleared value removes its key; parameters absent from `form` keep
    /// their prior value.
    pub fn from_form(&self, form: &FormValues, parameters: &[Arc<ParameterSpec>], prior: &ModelValues) -> ModelValues {
        let mut result = prior.clone();
        for spec in parameters {
            let Some(value) = form.get(&spec.id()) else { continue };
            match self.to_model(value, spec) {
                Some(raw) => {
                    result.insert(spec.id(), raw);
                }
                None => {
                    result.remove(&spec.id());
                }
            }
        }
        result
    }

    fn to_model(&self, value: &FormValue, spec: &ParameterSpec) -> Option<String> {
        match value {
            FormValue::Single(v) if self.is_empty(v.as_ref()) => None,
            FormValue::Single(v) => v.as_ref().and_then(|v| to_model_value(v, spec)),
            FormValue::Multiple(items) => {
                let collapsed = items.is_empty() || (items.len() == 1 && self.is_empty(items[0].as_ref()));
                if collapsed {
                    return None;
                }
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Some(v) if !self.is_empty(Some(v)) => to_model_value(v, spec).unwrap_or_default(),
                        _ => String::new(),
                    })
                    .collect();
                Some(parts.join(PMFM_VALUE_SEPARATOR.to_string().as_str()))
            }
        }
    }
}

fn normalize_multiplicity(value: FormValue, spec: &ParameterSpec) -> FormValue {
    match value {
        FormValue::Single(v) if spec.is_multiple => FormValue::Multiple(vec![v]),
        FormValue::Multiple(items) if !spec.is_multiple => FormValue::Single(items.into_iter().flatten().next()),
        other => other,
    }
}

/// Parameters whose value is written back on save.
pub fn select_persistable(parameters: &[Arc<ParameterSpec>], schema: &FieldSchema, rules: SkipRules) -> ParameterList {
    parameters
        .iter()
        .filter(|spec| !rules.skip_computed || !spec.is_computed)
        .filter(|spec| !rules.skip_disabled || schema.is_field_enabled(&FieldKey::Pmfm(spec.id())))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmfm_core::{QualitativeValue, ValueType};

    fn params() -> ParameterList {
        vec![
            Arc::new(ParameterSpec::new(1, "WEIGHT", ValueType::Double)),
            Arc::new(
                ParameterSpec::new(2, "SEX", ValueType::QualitativeValue)
                    .with_qualitative_values(vec![QualitativeValue::new(10, "M", "Male")]),
            ),
            Arc::new(ParameterSpec::new(7, "TAGS", ValueType::Integer).with_multiple(true)),
        ]
    }

    fn model(entries: &[(i32, &str)]) -> ModelValues {
        entries.iter().map(|(id, v)| (*id, v.to_string())).collect()
    }

    #[test]
    fn test_round_trip_preserves_model() {
        let bridge = EntityBridge::new();
        let params = params();
        let prior = model(&[(1, "2.5"), (2, "10"), (7, "1|2")]);

        let form = bridge.to_form(&MeasurementValues::Model(prior.clone()), &params);
        assert_eq!(
            form[&7],
            FormValue::Multiple(vec![Some(PmfmValue::Integer(1)), Some(PmfmValue::Integer(2))])
        );
        assert_eq!(bridge.from_form(&form, &params, &prior), prior);
    }

    #[test]
    fn test_unknown_keys() {
        let values = MeasurementValues::Model(model(&[(1, "3"), (99, "x")]));
        let params = params();

        let dropped = EntityBridge::new().to_form(&values, &params);
        assert!(!dropped.contains_key(&99));

        let kept = EntityBridge::new().with_keep_unknown(true).to_form(&values, &params);
        assert_eq!(kept[&99], FormValue::single(PmfmValue::Text("x".into())));
    }

    #[test]
    fn test_from_form_merges_over_prior() {
        let bridge = EntityBridge::new();
        let prior = model(&[(1, "2.5"), (42, "outside")]);
        let mut form = FormValues::new();
        form.insert(1, FormValue::Single(None));
        form.insert(2, FormValue::single(PmfmValue::Qualitative(QualitativeValue::new(10, "M", ""))));

        let saved = bridge.from_form(&form, &params(), &prior);
        assert_eq!(saved, model(&[(2, "10"), (42, "outside")]));
    }

    #[test]
    fn test_multiple_collapse_and_positions() {
        let bridge = EntityBridge::new();
        let params = params();
        let prior = ModelValues::new();

        let mut form = FormValues::new();
        form.insert(
            7,
            FormValue::Multiple(vec![Some(PmfmValue::Integer(1)), Some(PmfmValue::Integer(2)), None]),
        );
        assert_eq!(bridge.from_form(&form, &params, &prior)[&7], "1|2|");

        form.insert(7, FormValue::Multiple(vec![None]));
        assert!(!bridge.from_form(&form, &params, &prior).contains_key(&7));
    }

    #[test]
    fn test_form_source_is_normalized() {
        let mut form = FormValues::new();
        form.insert(7, FormValue::single(PmfmValue::Integer(4)));
        let result = EntityBridge::new().to_form(&MeasurementValues::Form(form), &params());
        assert_eq!(result[&7], FormValue::Multiple(vec![Some(PmfmValue::Integer(4))]));
        assert_eq!(result[&1], FormValue::Single(None));
    }

    #[test]
    fn test_custom_emptiness() {
        fn zero_is_empty(value: Option<&PmfmValue>) -> bool {
            matches!(value, None | Some(PmfmValue::Integer(0)))
        }
        let bridge = EntityBridge::new().with_emptiness(zero_is_empty);

        let mut form = FormValues::new();
        form.insert(7, FormValue::Multiple(vec![Some(PmfmValue::Integer(0)), Some(PmfmValue::Integer(3))]));
        assert_eq!(bridge.from_form(&form, &params(), &ModelValues::new())[&7], "|3");

        form.insert(7, FormValue::Multiple(vec![Some(PmfmValue::Integer(0))]));
        assert!(bridge.from_form(&form, &params(), &ModelValues::new()).is_empty());
    }
}
