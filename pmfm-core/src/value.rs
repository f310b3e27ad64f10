//! Parameter values
//!
//! Model representation is a raw string (what gets persisted); form
//! representation is a typed `PmfmValue`. Multiple values are stored in the
//! model as one string joined with `PMFM_VALUE_SEPARATOR`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::spec::{ParameterSpec, QualitativeValue, ValueType};

pub const PMFM_VALUE_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PmfmValue {
    Integer(i64),
    Double(f64),
    Text(String),
    Boolean(bool),
    Date(DateTime<Utc>),
    Qualitative(QualitativeValue),
}

impl PmfmValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PmfmValue::Integer(v) => Some(*v as f64),
            PmfmValue::Double(v) => Some(*v),
            PmfmValue::Text(s) => s.trim().parse().ok(),
            PmfmValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            PmfmValue::Qualitative(qv) => Some(qv.id as f64),
            PmfmValue::Date(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PmfmValue::Boolean(b) => Some(*b),
            PmfmValue::Integer(1) => Some(true),
            PmfmValue::Integer(0) => Some(false),
            PmfmValue::Text(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Identifier used when comparing values: qualitative values compare by id.
    fn comparable(&self) -> Comparable<'_> {
        match self {
            PmfmValue::Qualitative(qv) => Comparable::Number(qv.id as f64),
            PmfmValue::Date(d) => Comparable::Date(*d),
            PmfmValue::Boolean(b) => Comparable::Bool(*b),
            other => match other.as_f64() {
                Some(n) => Comparable::Number(n),
                None => match other {
                    PmfmValue::Text(s) => Comparable::Text(s),
                    _ => Comparable::Text(""),
                },
            },
        }
    }

    /// Human readable rendering, as shown in tables and summaries.
    pub fn display(&self) -> String {
        match self {
            PmfmValue::Integer(v) => v.to_string(),
            PmfmValue::Double(v) => v.to_string(),
            PmfmValue::Text(s) => s.clone(),
            PmfmValue::Boolean(true) => "\u{2714}".to_string(),
            PmfmValue::Boolean(false) => "\u{2718}".to_string(),
            PmfmValue::Date(d) => format_date(d),
            PmfmValue::Qualitative(qv) => {
                if qv.name.is_empty() {
                    qv.label.clone()
                } else {
                    qv.name.clone()
                }
            }
        }
    }
}

impl fmt::Display for PmfmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

enum Comparable<'a> {
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Text(&'a str),
}

/// Value of one form field: a single value, or N independent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Multiple(Vec<Option<PmfmValue>>),
    Single(Option<PmfmValue>),
}

impl FormValue {
    pub fn empty() -> Self {
        FormValue::Single(None)
    }

    pub fn single(value: PmfmValue) -> Self {
        FormValue::Single(Some(value))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FormValue::Single(v) => is_empty_value(v.as_ref()),
            FormValue::Multiple(items) => items.iter().all(|v| is_empty_value(v.as_ref())),
        }
    }

    pub fn equals(&self, other: &FormValue) -> bool {
        match (self, other) {
            (FormValue::Single(a), FormValue::Single(b)) => values_equal(a.as_ref(), b.as_ref()),
            (FormValue::Multiple(a), FormValue::Multiple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x.as_ref(), y.as_ref()))
            }
            _ => self.is_empty() && other.is_empty(),
        }
    }
}

/// Default emptiness predicate: missing, or blank text.
pub fn is_empty_value(value: Option<&PmfmValue>) -> bool {
    match value {
        None => true,
        Some(PmfmValue::Text(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Loose equality: `1`, `1.0` and `"1"` are equal; qualitative values compare by id.
pub fn values_equal(a: Option<&PmfmValue>, b: Option<&PmfmValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => match (x.comparable(), y.comparable()) {
            (Comparable::Number(n1), Comparable::Number(n2)) => n1 == n2,
            (Comparable::Bool(b1), Comparable::Bool(b2)) => b1 == b2,
            (Comparable::Number(n), Comparable::Bool(b)) | (Comparable::Bool(b), Comparable::Number(n)) => {
                n == if b { 1.0 } else { 0.0 }
            }
            (Comparable::Date(d1), Comparable::Date(d2)) => d1 == d2,
            (Comparable::Text(t1), Comparable::Text(t2)) => t1 == t2,
            _ => false,
        },
        _ => false,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_coefficient(spec: &ParameterSpec) -> Option<f64> {
    spec.display_conversion
        .as_ref()
        .map(|c| c.conversion_coefficient)
        .filter(|c| c.is_finite() && *c != 0.0)
}

/// Converts one raw model value into its form representation.
/// An absent value falls back to the spec's default value.
pub fn from_model_value(raw: Option<&str>, spec: &ParameterSpec) -> FormValue {
    let raw = raw.or(spec.default_value.as_deref());
    let Some(raw) = raw else {
        return if spec.is_multiple {
            FormValue::Multiple(vec![None])
        } else {
            FormValue::Single(None)
        };
    };

    if spec.is_multiple || raw.contains(PMFM_VALUE_SEPARATOR) {
        let items = raw
            .split(PMFM_VALUE_SEPARATOR)
            .map(|part| parse_model_item(part, spec))
            .collect();
        return FormValue::Multiple(items);
    }
    FormValue::Single(parse_model_item(raw, spec))
}

fn parse_model_item(raw: &str, spec: &ParameterSpec) -> Option<PmfmValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match spec.value_type {
        ValueType::Integer => {
            let n: f64 = raw.parse().ok()?;
            match conversion_coefficient(spec) {
                Some(coef) => Some(PmfmValue::Double(n * coef)),
                None => Some(PmfmValue::Integer(n.trunc() as i64)),
            }
        }
        ValueType::Double => {
            let n: f64 = raw.parse().ok()?;
            match conversion_coefficient(spec) {
                Some(coef) => Some(PmfmValue::Double(n * coef)),
                None => Some(PmfmValue::Double(n)),
            }
        }
        ValueType::String => Some(PmfmValue::Text(raw.to_string())),
        ValueType::Boolean => parse_bool(raw).map(PmfmValue::Boolean),
        ValueType::Date => parse_date(raw).map(PmfmValue::Date),
        ValueType::QualitativeValue => {
            let id: i32 = raw.parse().ok()?;
            spec.qualitative_value(id).cloned().map(PmfmValue::Qualitative)
        }
    }
}

/// Converts one typed value back into the raw model representation.
pub fn to_model_value(value: &PmfmValue, spec: &ParameterSpec) -> Option<String> {
    match spec.value_type {
        ValueType::Integer | ValueType::Double => {
            let n = value.as_f64()?;
            let n = match conversion_coefficient(spec) {
                Some(coef) => n / coef,
                None => n,
            };
            Some(n.to_string())
        }
        ValueType::String => match value {
            PmfmValue::Text(s) if s.is_empty() => None,
            PmfmValue::Text(s) => Some(s.clone()),
            PmfmValue::Date(d) => Some(format_date(d)),
            PmfmValue::Qualitative(qv) => Some(qv.label.clone()),
            other => Some(other.display()),
        },
        ValueType::Boolean => value.as_bool().map(|b| b.to_string()),
        ValueType::Date => match value {
            PmfmValue::Date(d) => Some(format_date(d)),
            PmfmValue::Text(s) => parse_date(s).map(|d| format_date(&d)),
            _ => None,
        },
        ValueType::QualitativeValue => match value {
            PmfmValue::Qualitative(qv) => Some(qv.id.to_string()),
            PmfmValue::Integer(id) => Some(id.to_string()),
            PmfmValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        },
    }
}
