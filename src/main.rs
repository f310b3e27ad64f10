//! Measurement Forms CLI
//!
//! Loads a parameter catalog (YAML) and an entity (JSON), runs the form
//! engine on it and prints the resulting form values, the validation report
//! and the values that would be saved.
//!
//! Usage: measurement-forms <catalog.yaml> <entity.json> [sample|landing|observed-location]

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use measurement_forms::pmfm_core::{InMemoryCatalog, MeasurementEntity};
use measurement_forms::utils::init_tracing;
use measurement_forms::{ApplyOutcome, EngineConfig, Landing, MeasurementValuesForm, ObservedLocation, Sample};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (catalog_path, entity_path) = match (args.first(), args.get(1)) {
        (Some(catalog), Some(entity)) => (catalog.as_str(), entity.as_str()),
        _ => bail!("usage: measurement-forms <catalog.yaml> <entity.json> [sample|landing|observed-location]"),
    };
    let kind = args.get(2).map(String::as_str).unwrap_or("sample");

    let config = EngineConfig::from_env().context("Failed to load engine configuration")?;
    let catalog = InMemoryCatalog::from_yaml_file(catalog_path)
        .with_context(|| format!("Failed to load catalog from {}", catalog_path))?;
    let entity = std::fs::read_to_string(entity_path)
        .with_context(|| format!("Failed to read entity from {}", entity_path))?;
    info!("Loaded {} parameter(s) from {}", catalog.catalog().len(), catalog_path);

    let report = match kind {
        "sample" => run::<Sample>(config, catalog, &entity).await?,
        "landing" => run::<Landing>(config, catalog, &entity).await?,
        "observed-location" => run::<ObservedLocation>(config, catalog, &entity).await?,
        other => bail!("unknown entity kind '{}'", other),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run<E: MeasurementEntity>(config: EngineConfig, catalog: InMemoryCatalog, entity: &str) -> Result<serde_json::Value> {
    let entity: E = E::from_object(serde_json::from_str(entity)?)?;

    let form = MeasurementValuesForm::<E>::new(config.options)
        .with_context(config.context)
        .with_catalog(Arc::new(catalog));

    form.mark_ready().await?;
    let outcome = form.apply(entity).await;
    if let ApplyOutcome::Failed(message) = &outcome {
        bail!("Failed to apply entity: {}", message);
    }
    if let Some(error) = form.last_error() {
        bail!("Form engine error: {}", error);
    }

    let saved = match form.get_value() {
        Some(value) => value.as_object()?,
        None => serde_json::Value::Null,
    };
    Ok(json!({
        "readyStep": form.ready_step(),
        "outcome": outcome,
        "parameters": form.parameters().iter().map(|p| p.label.clone()).collect::<Vec<_>>(),
        "formValues": form.with_schema(|schema| schema.form_values()),
        "errors": form.error_summary(),
        "saved": saved,
    }))
}
