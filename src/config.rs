//! Engine configuration
//!
//! Form options, the catalog context a form loads its parameters for, and
//! the YAML file both can be read from.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use pmfm_core::{CatalogQuery, PmfmId};

use crate::bridge::SkipRules;
use crate::error::FormError;

pub const CONFIG_ENV_VAR: &str = "MEASUREMENT_FORMS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormOptions {
    /// Leave disabled fields out of saved values
    pub skip_disabled_fields: bool,
    /// Leave computed parameters out of saved values
    pub skip_computed_fields: bool,
    /// Keep the record-kind discriminator field in the schema
    pub with_discriminator: bool,
    /// Attribute fields never removed by a synchronization pass
    pub protected_attributes: Vec<String>,
    pub force_optional: bool,
    pub force_optional_excluded_ids: Vec<PmfmId>,
    pub keep_unknown_values: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            skip_disabled_fields: true,
            skip_computed_fields: true,
            with_discriminator: true,
            protected_attributes: ["id", "rankOrder", "comments", "updateDate", "__typename"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            force_optional: false,
            force_optional_excluded_ids: Vec::new(),
            keep_unknown_values: false,
        }
    }
}

impl FormOptions {
    pub fn skip_rules(&self) -> SkipRules {
        SkipRules {
            skip_disabled: self.skip_disabled_fields,
            skip_computed: self.skip_computed_fields,
        }
    }

    pub fn excluded_ids(&self) -> HashSet<PmfmId> {
        self.force_optional_excluded_ids.iter().copied().collect()
    }
}

/// Identifies which parameters a form shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogContext {
    pub program_label: Option<String>,
    pub acquisition_level: Option<String>,
    pub strategy_id: Option<i32>,
    pub strategy_label: Option<String>,
    pub gear_id: Option<i32>,
    /// When set, no parameter is loaded until a strategy is known
    pub required_strategy: bool,
    /// When set, no parameter is loaded until a gear is known
    pub required_gear: bool,
}

impl CatalogContext {
    pub fn new(program_label: &str, acquisition_level: &str) -> Self {
        Self {
            program_label: Some(program_label.to_string()),
            acquisition_level: Some(acquisition_level.to_string()),
            ..Default::default()
        }
    }

    pub fn can_load(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.is_empty());
        filled(&self.program_label)
            && filled(&self.acquisition_level)
            && (!self.required_strategy || self.strategy_id.is_some() || filled(&self.strategy_label))
            && (!self.required_gear || self.gear_id.is_some())
    }

    pub fn to_query(&self) -> Option<CatalogQuery> {
        if !self.can_load() {
            return None;
        }
        Some(CatalogQuery {
            program_label: self.program_label.clone().unwrap_or_default(),
            acquisition_level: self.acquisition_level.clone().unwrap_or_default(),
            strategy_id: self.strategy_id,
            strategy_label: self.strategy_label.clone(),
            gear_id: self.gear_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub options: FormOptions,
    pub context: CatalogContext,
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FormError> {
        serde_yaml::from_str(yaml).map_err(|e| FormError::Config(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, FormError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| FormError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reads the file named by `MEASUREMENT_FORMS_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self, FormError> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = FormOptions::default();
        assert!(options.skip_disabled_fields && options.skip_computed_fields);
        assert!(options.protected_attributes.contains(&"comments".to_string()));
        assert!(!options.force_optional);
    }

    #[test]
    fn test_can_load() {
        let mut context = CatalogContext::new("SIH", "SAMPLE");
        assert!(context.can_load());

        context.required_gear = true;
        assert!(!context.can_load());
        context.gear_id = Some(3);
        assert!(context.can_load());

        context.required_strategy = true;
        assert!(context.to_query().is_none());
        context.strategy_label = Some("S1".into());
        assert_eq!(context.to_query().unwrap().gear_id, Some(3));

        assert!(!CatalogContext::default().can_load());
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "options:\n  forceOptional: true\n  forceOptionalExcludedIds: [4]\ncontext:\n  programLabel: SIH\n  acquisitionLevel: LANDING"
        )
        .unwrap();

        let config = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.options.force_optional);
        assert!(config.options.with_discriminator);
        assert_eq!(config.options.excluded_ids(), [4].into_iter().collect());
        assert!(config.context.can_load());

        assert!(matches!(EngineConfig::from_yaml_str("options: ["), Err(FormError::Config(_))));
    }
}
