//! Parameter Catalog
//!
//! Arena of immutable parameter specs, stored once and referenced by id, plus
//! the provider interface forms use to select the parameters of a context
//! (program, acquisition level, strategy, gear).

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::CoreError;
use crate::spec::{ParameterSpec, PmfmId};

pub type ParameterList = Vec<Arc<ParameterSpec>>;
pub type ParameterStream = BoxStream<'static, Result<ParameterList, CoreError>>;

/// Well known acquisition levels.
pub mod acquisition_level {
    pub const OBSERVED_LOCATION: &str = "OBSERVED_LOCATION";
    pub const LANDING: &str = "LANDING";
    pub const SAMPLE: &str = "SAMPLE";
    pub const INDIVIDUAL_MONITORING: &str = "INDIVIDUAL_MONITORING";
    pub const SORTING_BATCH: &str = "SORTING_BATCH";
}

/// A parameter list, either materialized or still in flight.
pub enum ParameterSource {
    Ready(ParameterList),
    Pending(ParameterStream),
}

impl std::fmt::Debug for ParameterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterSource::Ready(list) => f.debug_tuple("Ready").field(&list.len()).finish(),
            ParameterSource::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<ParameterList> for ParameterSource {
    fn from(list: ParameterList) -> Self {
        ParameterSource::Ready(list)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub program_label: String,
    pub acquisition_level: String,
    #[serde(default)]
    pub strategy_id: Option<i32>,
    #[serde(default)]
    pub strategy_label: Option<String>,
    #[serde(default)]
    pub gear_id: Option<i32>,
}

#[async_trait]
pub trait ParameterCatalogProvider: Send + Sync {
    async fn watch_parameters(&self, query: &CatalogQuery) -> Result<ParameterSource, CoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    specs: HashMap<PmfmId, Arc<ParameterSpec>>,
}

impl ParameterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ParameterSpec>) -> Self {
        let mut catalog = Self::new();
        for spec in specs {
            catalog.insert(spec);
        }
        catalog
    }

    /// Stores a spec; a later insert with the same id replaces the entry but
    /// leaves previously handed out `Arc`s untouched.
    pub fn insert(&mut self, spec: ParameterSpec) -> Arc<ParameterSpec> {
        let spec = Arc::new(spec);
        self.specs.insert(spec.id(), Arc::clone(&spec));
        spec
    }

    pub fn get(&self, id: PmfmId) -> Option<Arc<ParameterSpec>> {
        self.specs.get(&id).cloned()
    }

    pub fn resolve(&self, ids: &[PmfmId]) -> Result<ParameterList, CoreError> {
        ids.iter()
            .map(|id| self.get(*id).ok_or(CoreError::UnknownParameter(*id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Links a parameter to a program strategy, for one acquisition level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PmfmStrategy {
    pub program_label: String,
    pub acquisition_level: String,
    #[serde(default)]
    pub strategy_id: Option<i32>,
    #[serde(default)]
    pub strategy_label: Option<String>,
    /// Empty means "any gear".
    #[serde(default)]
    pub gear_ids: Vec<i32>,
    pub pmfm_id: PmfmId,
    #[serde(default)]
    pub rank_order: i32,
}

impl PmfmStrategy {
    fn matches(&self, query: &CatalogQuery) -> bool {
        self.program_label == query.program_label
            && self.acquisition_level == query.acquisition_level
            && query.strategy_id.map_or(true, |id| self.strategy_id == Some(id))
            && query
                .strategy_label
                .as_ref()
                .map_or(true, |label| self.strategy_label.as_ref() == Some(label))
            && query
                .gear_id
                .map_or(true, |gear| self.gear_ids.is_empty() || self.gear_ids.contains(&gear))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    pmfms: Vec<ParameterSpec>,
    #[serde(default)]
    strategies: Vec<PmfmStrategy>,
}

/// Provider backed by an in-memory catalog and a strategy table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    catalog: ParameterCatalog,
    strategies: Vec<PmfmStrategy>,
}

impl InMemoryCatalog {
    pub fn new(catalog: ParameterCatalog, strategies: Vec<PmfmStrategy>) -> Self {
        Self { catalog, strategies }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        let doc: CatalogDocument = serde_yaml::from_str(yaml)?;
        Ok(Self::new(ParameterCatalog::from_specs(doc.pmfms), doc.strategies))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    /// Parameters of the query, unique by id, sorted by rank order.
    pub fn select(&self, query: &CatalogQuery) -> Result<ParameterList, CoreError> {
        let mut entries: Vec<&PmfmStrategy> = self.strategies.iter().filter(|s| s.matches(query)).collect();
        entries.sort_by_key(|s| s.rank_order);

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for entry in entries {
            if seen.insert(entry.pmfm_id) {
                let spec = self
                    .catalog
                    .get(entry.pmfm_id)
                    .ok_or(CoreError::UnknownParameter(entry.pmfm_id))?;
                result.push(spec);
            }
        }

        if result.is_empty() {
            debug!(
                "No parameter found for program '{}', acquisition level '{}'",
                query.program_label, query.acquisition_level
            );
        }
        Ok(result)
    }
}

#[async_trait]
impl ParameterCatalogProvider for InMemoryCatalog {
    async fn watch_parameters(&self, query: &CatalogQuery) -> Result<ParameterSource, CoreError> {
        self.select(query).map(ParameterSource::Ready)
    }
}
