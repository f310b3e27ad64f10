//! Field Schema
//!
//! The live, validated field set of a measurement form: one field per active
//! parameter (scalar or array), the reserved record-kind discriminator, and
//! any protected attribute fields an owner adds.

pub mod synchronizer;

pub use synchronizer::{SchemaSynchronizer, SyncReport};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pmfm_core::{FormValue, FormValues, ParameterSpec, PmfmId, PmfmValue, ValuesKind};

use crate::error::FormError;
use crate::validator::{FieldRule, ValidationError};

pub const DISCRIMINATOR_KEY: &str = "__typename";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Pmfm(PmfmId),
    Discriminator,
    /// Non-parameter field added by the owner (e.g. `comments`).
    Attribute(String),
}

impl FieldKey {
    pub fn parse(name: &str) -> Self {
        if name == DISCRIMINATOR_KEY {
            return FieldKey::Discriminator;
        }
        match name.parse::<PmfmId>() {
            Ok(id) => FieldKey::Pmfm(id),
            Err(_) => FieldKey::Attribute(name.to_string()),
        }
    }

    pub fn pmfm_id(&self) -> Option<PmfmId> {
        match self {
            FieldKey::Pmfm(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Pmfm(id) => write!(f, "{}", id),
            FieldKey::Discriminator => f.write_str(DISCRIMINATOR_KEY),
            FieldKey::Attribute(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Option<PmfmValue>),
    /// Variable-length list of independent values.
    Array(Vec<Option<PmfmValue>>),
    Discriminator(ValuesKind),
    Attribute(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct Field {
    value: FieldValue,
    rule: Option<FieldRule>,
    enabled: bool,
    dirty: bool,
}

impl Field {
    pub fn scalar(value: Option<PmfmValue>, rule: FieldRule) -> Self {
        Self::with_value(FieldValue::Scalar(value), Some(rule))
    }

    pub fn array(rule: FieldRule) -> Self {
        Self::with_value(FieldValue::Array(Vec::new()), Some(rule))
    }

    pub fn discriminator() -> Self {
        Self::with_value(FieldValue::Discriminator(ValuesKind::Form), None)
    }

    pub fn attribute(value: serde_json::Value) -> Self {
        Self::with_value(FieldValue::Attribute(value), None)
    }

    fn with_value(value: FieldValue, rule: Option<FieldRule>) -> Self {
        Self {
            value,
            rule,
            enabled: true,
            dirty: false,
        }
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn rule(&self) -> Option<&FieldRule> {
        self.rule.as_ref()
    }

    /// Replaces the rule only; the value is kept.
    pub fn set_rule(&mut self, rule: FieldRule) {
        self.rule = Some(rule);
    }

    pub fn is_array(&self) -> bool {
        matches!(self.value, FieldValue::Array(_))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes a value without marking the field as edited.
    pub fn patch(&mut self, value: &FormValue) {
        match (&mut self.value, value) {
            (FieldValue::Scalar(current), FormValue::Single(v)) => *current = v.clone(),
            (FieldValue::Scalar(current), FormValue::Multiple(items)) => {
                *current = items.iter().flatten().next().cloned();
            }
            (FieldValue::Array(current), FormValue::Multiple(items)) => {
                *current = if items.is_empty() { vec![None] } else { items.clone() };
            }
            (FieldValue::Array(current), FormValue::Single(v)) => *current = vec![v.clone()],
            _ => {}
        }
    }

    /// User edit: writes the value and marks the field dirty.
    pub fn edit(&mut self, value: &FormValue) {
        self.patch(value);
        self.dirty = true;
    }

    pub fn push_item(&mut self, value: Option<PmfmValue>) -> bool {
        match &mut self.value {
            FieldValue::Array(items) => {
                items.push(value);
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Removes one item; the last item is never removed, only emptied.
    pub fn remove_item(&mut self, index: usize) -> bool {
        match &mut self.value {
            FieldValue::Array(items) if index < items.len() => {
                if items.len() == 1 {
                    items[0] = None;
                } else {
                    items.remove(index);
                }
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    pub fn form_value(&self) -> Option<FormValue> {
        match &self.value {
            FieldValue::Scalar(v) => Some(FormValue::Single(v.clone())),
            FieldValue::Array(items) => Some(FormValue::Multiple(items.clone())),
            _ => None,
        }
    }

    pub fn errors(&self) -> Vec<ValidationError> {
        match (&self.value, &self.rule) {
            (FieldValue::Scalar(v), Some(rule)) => rule.validate_single(v.as_ref()),
            (FieldValue::Array(items), Some(rule)) => rule.validate_items(items),
            _ => Vec::new(),
        }
    }

    fn reset(&mut self) {
        match &mut self.value {
            FieldValue::Scalar(v) => *v = None,
            FieldValue::Array(items) => items.clear(),
            _ => {}
        }
        self.dirty = false;
    }
}

pub type ValidationReport = BTreeMap<FieldKey, Vec<ValidationError>>;

/// Ordered mapping of field key to field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    fields: Vec<(FieldKey, Field)>,
    enabled: bool,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            enabled: true,
        }
    }
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<FieldKey> {
        self.fields.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Parameter and discriminator keys: the set covered by the key-set invariant.
    pub fn managed_keys(&self) -> BTreeSet<FieldKey> {
        self.fields
            .iter()
            .map(|(key, _)| key)
            .filter(|key| !matches!(key, FieldKey::Attribute(_)))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &FieldKey) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, field)| field)
    }

    pub fn get_mut(&mut self, key: &FieldKey) -> Option<&mut Field> {
        self.fields.iter_mut().find(|(k, _)| k == key).map(|(_, field)| field)
    }

    pub fn pmfm(&self, id: PmfmId) -> Option<&Field> {
        self.get(&FieldKey::Pmfm(id))
    }

    /// Appends the field, or replaces it in place when the key exists.
    pub fn insert(&mut self, key: FieldKey, field: Field) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((key, field)),
        }
    }

    pub fn remove(&mut self, key: &FieldKey) -> Option<Field> {
        let index = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(index).1)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// A field is effectively enabled only when the whole schema is.
    pub fn is_field_enabled(&self, key: &FieldKey) -> bool {
        self.enabled && self.get(key).map_or(false, Field::is_enabled)
    }

    pub fn is_dirty(&self) -> bool {
        self.fields.iter().any(|(_, field)| field.is_dirty())
    }

    pub fn mark_pristine(&mut self) {
        for (_, field) in &mut self.fields {
            field.dirty = false;
        }
    }

    /// Values of every parameter field, in form representation.
    pub fn form_values(&self) -> FormValues {
        self.fields
            .iter()
            .filter_map(|(key, field)| Some((key.pmfm_id()?, field.form_value()?)))
            .collect()
    }

    /// Writes `values` into the parameter fields. Fields without a value are
    /// cleared, so nothing from a previous entity leaks into the next one.
    pub fn patch_values(&mut self, values: &FormValues) {
        for (key, field) in &mut self.fields {
            let Some(id) = key.pmfm_id() else { continue };
            match values.get(&id) {
                Some(value) => field.patch(value),
                None => {
                    field.reset();
                    if field.is_array() {
                        field.patch(&FormValue::Multiple(vec![None]));
                    }
                }
            }
        }
    }

    /// Per-field errors of enabled fields. One invalid field never hides the others.
    pub fn validate(&self) -> ValidationReport {
        if !self.enabled {
            return ValidationReport::new();
        }
        self.fields
            .iter()
            .filter(|(_, field)| field.is_enabled())
            .filter_map(|(key, field)| {
                let errors = field.errors();
                (!errors.is_empty()).then(|| (key.clone(), errors))
            })
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Checks that the managed keys are exactly the parameter ids, plus the
/// discriminator when it is enabled and the parameter set is non-empty.
pub fn check_key_invariant(
    schema: &FieldSchema,
    parameters: &[std::sync::Arc<ParameterSpec>],
    with_discriminator: bool,
) -> Result<(), FormError> {
    let mut expected: BTreeSet<FieldKey> = parameters.iter().map(|p| FieldKey::Pmfm(p.id())).collect();
    if with_discriminator && !parameters.is_empty() {
        expected.insert(FieldKey::Discriminator);
    }
    let actual = schema.managed_keys();
    if actual == expected {
        return Ok(());
    }

    let missing: Vec<String> = expected.difference(&actual).map(ToString::to_string).collect();
    let orphans: Vec<String> = actual.difference(&expected).map(ToString::to_string).collect();
    Err(FormError::InvariantViolation(format!(
        "missing keys [{}], orphan keys [{}]",
        missing.join(", "),
        orphans.join(", ")
    )))
}
