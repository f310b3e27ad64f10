//! Form Engine Suite
//!
//! End-to-end behaviour of `MeasurementValuesForm`: schema synchronization,
//! value round trips, skip rules and overlapping applies.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use measurement_forms::{
    parameter_channel, ApplyOutcome, CatalogContext, FieldKey, FieldValue, FormError, FormEvent, FormHooks, FormOptions,
    MeasurementValuesForm, ProgramRef, ReadyStep, Sample, SyncOutcome,
};
use measurement_forms::schema::FieldSchema;
use pmfm_core::{
    CoreError, FormValue, MeasurementEntity, MeasurementValues, ModelValues, ParameterList, ParameterSpec,
    PmfmId, PmfmValue, QualitativeValue, ValueType,
};

fn spec(id: PmfmId, label: &str, value_type: ValueType) -> ParameterSpec {
    ParameterSpec::new(id, label, value_type)
}

fn list(specs: Vec<ParameterSpec>) -> ParameterList {
    specs.into_iter().map(Arc::new).collect()
}

fn model(entries: &[(PmfmId, &str)]) -> ModelValues {
    entries.iter().map(|(id, v)| (*id, v.to_string())).collect()
}

fn sample(entries: &[(PmfmId, &str)]) -> Sample {
    Sample {
        id: Some(1),
        measurement_values: MeasurementValues::Model(model(entries)),
        ..Default::default()
    }
}

fn saved_model(form: &MeasurementValuesForm<Sample>) -> ModelValues {
    form.get_value()
        .and_then(|s| s.measurement_values().as_model().cloned())
        .unwrap_or_default()
}

fn field_value(form: &MeasurementValuesForm<Sample>, id: PmfmId) -> Option<FieldValue> {
    form.with_schema(|schema| schema.pmfm(id).map(|f| f.value().clone()))
}

fn managed_keys(form: &MeasurementValuesForm<Sample>) -> BTreeSet<FieldKey> {
    form.with_schema(FieldSchema::managed_keys)
}

#[tokio::test]
async fn test_structurally_equal_parameters_sync_once() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let build = || list(vec![spec(1, "WEIGHT", ValueType::Double), spec(2, "SEX", ValueType::String)]);

    let first = form.set_parameters(Some(build().into())).await?;
    assert!(matches!(first, SyncOutcome::Synchronized(_)));

    // Fresh instances, same structure
    let second = form.set_parameters(Some(build().into())).await?;
    assert_eq!(second, SyncOutcome::Unchanged);
    assert_eq!(form.sync_passes(), 1);
    assert!(form.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_schema_keys_match_parameters() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());

    for ids in [vec![1, 2, 3], vec![2, 4], vec![]] {
        let params = list(ids.iter().map(|id| spec(*id, "P", ValueType::Integer)).collect());
        form.set_parameters(Some(params.into())).await?;

        let mut expected: BTreeSet<FieldKey> = ids.iter().map(|id| FieldKey::Pmfm(*id)).collect();
        if !ids.is_empty() {
            expected.insert(FieldKey::Discriminator);
        }
        assert_eq!(managed_keys(&form), expected);
    }

    let options = FormOptions {
        with_discriminator: false,
        ..Default::default()
    };
    let plain = MeasurementValuesForm::<Sample>::new(options);
    plain.set_parameters(Some(list(vec![spec(5, "P", ValueType::Integer)]).into())).await?;
    assert_eq!(managed_keys(&plain), [FieldKey::Pmfm(5)].into_iter().collect());
    Ok(())
}

#[tokio::test]
async fn test_round_trip_keeps_model_values() -> Result<()> {
    let params = list(vec![
        spec(1, "WEIGHT", ValueType::Double),
        spec(2, "COUNT", ValueType::Integer),
        spec(3, "SEX", ValueType::QualitativeValue).with_qualitative_values(vec![
            QualitativeValue::new(20, "M", "Male"),
            QualitativeValue::new(21, "F", "Female"),
        ]),
        spec(4, "IS_DEAD", ValueType::Boolean),
        spec(5, "CAPTURE_DATE", ValueType::Date),
        spec(6, "NOTE", ValueType::String),
        spec(7, "TAGS", ValueType::Integer).with_multiple(true),
    ]);
    let entries = [
        (1, "12.5"),
        (2, "3"),
        (3, "20"),
        (4, "true"),
        (5, "2024-03-01T00:00:00.000Z"),
        (6, "note"),
        (7, "1|2"),
    ];

    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.set_parameters(Some(params.into())).await?;
    assert_eq!(form.apply(sample(&entries)).await, ApplyOutcome::Applied);

    assert_eq!(saved_model(&form), model(&entries));
    assert!(!form.is_dirty());
    Ok(())
}

#[tokio::test]
async fn test_skip_rules_are_toggleable() -> Result<()> {
    let params = || {
        list(vec![
            spec(1, "LENGTH", ValueType::Integer),
            spec(2, "WEIGHT_COMPUTED", ValueType::Integer).with_computed(true),
        ])
    };

    async fn edited(options: FormOptions, params: ParameterList) -> Result<ModelValues> {
        let form = MeasurementValuesForm::<Sample>::new(options);
        form.set_parameters(Some(params.into())).await?;
        form.apply(sample(&[(1, "1"), (2, "5")])).await;
        form.set_field_value(&FieldKey::Pmfm(1), FormValue::single(PmfmValue::Integer(4)))?;
        form.set_field_value(&FieldKey::Pmfm(2), FormValue::single(PmfmValue::Integer(9)))?;
        form.disable_field(&FieldKey::Pmfm(1))?;
        Ok(saved_model(&form))
    }

    let defaults = edited(FormOptions::default(), params()).await?;
    assert_eq!(defaults, model(&[(1, "1"), (2, "5")]));

    let keep_computed = FormOptions {
        skip_computed_fields: false,
        ..Default::default()
    };
    assert_eq!(edited(keep_computed, params()).await?, model(&[(1, "1"), (2, "9")]));

    let keep_disabled = FormOptions {
        skip_disabled_fields: false,
        ..Default::default()
    };
    assert_eq!(edited(keep_disabled, params()).await?, model(&[(1, "4"), (2, "5")]));
    Ok(())
}

#[tokio::test]
async fn test_force_optional_never_mutates_catalog_specs() -> Result<()> {
    let upstream = list(vec![
        spec(1, "A", ValueType::Integer).with_required(true),
        spec(2, "B", ValueType::Integer).with_required(true),
        spec(3, "C", ValueType::Integer),
    ]);
    let options = FormOptions {
        force_optional: true,
        force_optional_excluded_ids: vec![2],
        ..Default::default()
    };
    let form = MeasurementValuesForm::<Sample>::new(options);
    form.set_parameters(Some(upstream.clone().into())).await?;

    let active = form.parameters();
    assert!(!active[0].required);
    assert!(active[1].required);
    assert!(Arc::ptr_eq(&active[1], &upstream[1]));
    assert!(Arc::ptr_eq(&active[2], &upstream[2]));
    assert!(upstream[0].required && upstream[1].required);

    let report = form.validate();
    assert!(!report.contains_key(&FieldKey::Pmfm(1)));
    assert!(report.contains_key(&FieldKey::Pmfm(2)));

    // Switching the mode off re-runs the resolution on the upstream list
    let outcome = form.set_force_optional(false).await?;
    assert!(matches!(outcome, SyncOutcome::Synchronized(_)));
    assert!(form.parameters()[0].required);
    assert_eq!(form.sync_passes(), 2);
    Ok(())
}

#[tokio::test]
async fn test_newest_apply_wins() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let params = list(vec![spec(1, "COUNT", ValueType::Integer)]);

    let (first, second, synced) = tokio::join!(
        form.apply(sample(&[(1, "10")])),
        form.apply(sample(&[(1, "20")])),
        async {
            tokio::task::yield_now().await;
            form.set_parameters(Some(params.into())).await
        }
    );

    assert!(matches!(synced?, SyncOutcome::Synchronized(_)));
    assert_eq!(first, ApplyOutcome::Superseded);
    assert_eq!(second, ApplyOutcome::Applied);
    assert_eq!(field_value(&form, 1), Some(FieldValue::Scalar(Some(PmfmValue::Integer(20)))));
    assert!(form.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn test_value_is_returned_unmodified_while_loading() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let entity = sample(&[(1, "7"), (99, "outside")]);

    let (outcome, while_loading) = tokio::join!(form.apply(entity.clone()), async {
        tokio::task::yield_now().await;
        let value = form.get_value();
        form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into()))
            .await
            .map(|_| value)
    });

    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(while_loading?, Some(entity));
    assert_eq!(saved_model(&form), model(&[(1, "7"), (99, "outside")]));
    Ok(())
}

#[tokio::test]
async fn test_empty_parameter_list_preserves_measurements() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.set_parameters(Some(ParameterList::new().into())).await?;
    assert!(form.is_ready());

    assert_eq!(form.apply(sample(&[(7, "x")])).await, ApplyOutcome::Applied);
    assert!(managed_keys(&form).is_empty());
    assert_eq!(saved_model(&form), model(&[(7, "x")]));
    Ok(())
}

#[tokio::test]
async fn test_multiple_values_keep_empty_positions() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let params = list(vec![spec(7, "TAGS", ValueType::Integer).with_multiple(true)]);
    form.set_parameters(Some(params.into())).await?;
    form.apply(sample(&[(7, "1|2")])).await;

    assert_eq!(
        field_value(&form, 7),
        Some(FieldValue::Array(vec![Some(PmfmValue::Integer(1)), Some(PmfmValue::Integer(2))]))
    );

    form.push_item(7, None)?;
    assert_eq!(saved_model(&form)[&7], "1|2|");

    form.set_field_value(&FieldKey::Pmfm(7), FormValue::Multiple(vec![None]))?;
    assert!(!saved_model(&form).contains_key(&7));
    Ok(())
}

#[tokio::test]
async fn test_rule_update_keeps_user_edit() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let required = list(vec![spec(2, "COUNT", ValueType::Integer).with_required(true)]);
    form.set_parameters(Some(required.into())).await?;
    form.apply(sample(&[])).await;
    form.set_field_value(&FieldKey::Pmfm(2), FormValue::single(PmfmValue::Integer(5)))?;

    let optional = list(vec![spec(2, "COUNT", ValueType::Integer)]);
    let outcome = form.set_parameters(Some(optional.into())).await?;

    assert!(matches!(outcome, SyncOutcome::Synchronized(report) if report.updated == 1));
    assert_eq!(field_value(&form, 2), Some(FieldValue::Scalar(Some(PmfmValue::Integer(5)))));
    assert_eq!(saved_model(&form), model(&[(2, "5")]));
    Ok(())
}

#[tokio::test]
async fn test_source_failure_resets_to_empty_schema() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into())).await?;
    assert!(form.is_ready());

    let (tx, source) = parameter_channel(1);
    tx.send(Err(CoreError::Source("catalog offline".into()))).await?;
    assert_eq!(form.set_parameters(Some(source)).await?, SyncOutcome::Reset);

    assert_eq!(form.ready_step(), ReadyStep::SchemaReady);
    assert!(managed_keys(&form).is_empty());
    assert!(form.parameters().is_empty());
    assert!(form.last_error().unwrap_or_default().contains("catalog offline"));

    // Still usable afterwards
    let outcome = form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into())).await?;
    assert!(matches!(outcome, SyncOutcome::Synchronized(_)));
    assert!(form.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_first_load_failure_does_not_block_apply() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let (tx, source) = parameter_channel(1);
    tx.send(Err(CoreError::Source("catalog offline".into()))).await?;
    assert_eq!(form.set_parameters(Some(source)).await?, SyncOutcome::Reset);
    assert_eq!(form.ready_step(), ReadyStep::SchemaReady);

    let outcome = tokio::time::timeout(Duration::from_secs(1), form.apply(sample(&[(1, "5")]))).await?;
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(saved_model(&form), model(&[(1, "5")]));
    Ok(())
}

#[tokio::test]
async fn test_pending_apply_completes_after_load_failure() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let (tx, source) = parameter_channel(1);

    let (applied, synced) = tokio::join!(form.apply(sample(&[(9, "x")])), async {
        tokio::task::yield_now().await;
        tx.send(Err(CoreError::Source("catalog offline".into())))
            .await
            .expect("channel open");
        form.set_parameters(Some(source)).await
    });

    assert_eq!(synced?, SyncOutcome::Reset);
    assert_eq!(applied, ApplyOutcome::Applied);
    assert!(!form.is_loading());
    assert_eq!(saved_model(&form), model(&[(9, "x")]));
    Ok(())
}

#[tokio::test]
async fn test_absent_parameters_reset() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into())).await?;

    assert_eq!(form.set_parameters(None).await?, SyncOutcome::Reset);
    assert_eq!(form.ready_step(), ReadyStep::Starting);
    assert!(form.parameters().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_destroy_cancels_pending_work() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let (_tx, source) = parameter_channel(1);

    let (applied, synced, _) = tokio::join!(form.apply(sample(&[(1, "1")])), form.set_parameters(Some(source)), async {
        tokio::task::yield_now().await;
        form.destroy();
    });

    assert_eq!(applied, ApplyOutcome::Cancelled);
    assert_eq!(synced?, SyncOutcome::Cancelled);
    assert_eq!(form.sync_passes(), 0);
    assert!(managed_keys(&form).is_empty());
    assert!(matches!(form.wait_ready().await, Err(FormError::Cancelled)));
    Ok(())
}

#[tokio::test]
async fn test_destroyed_form_keeps_its_step() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into())).await?;
    form.apply(sample(&[(1, "2")])).await;
    form.set_field_value(&FieldKey::Pmfm(1), FormValue::single(PmfmValue::Integer(3)))?;
    form.destroy();

    assert_eq!(form.set_gear_id(Some(3)).await?, SyncOutcome::Cancelled);
    assert_eq!(form.ready_step(), ReadyStep::SchemaReady);
    assert!(!form.is_loading());
    assert!(form.is_dirty());

    let fresh = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    fresh.destroy();
    assert_eq!(fresh.mark_ready().await?, SyncOutcome::Cancelled);
    assert_eq!(fresh.ready_step(), ReadyStep::Starting);
    Ok(())
}

struct FailingContextHooks;

#[async_trait]
impl FormHooks<Sample> for FailingContextHooks {
    fn on_applying_entity(&self, _entity: &Sample, _context: &mut CatalogContext) -> Result<()> {
        Err(anyhow!("cannot derive context"))
    }
}

#[tokio::test]
async fn test_failed_apply_keeps_entity_measurements() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default()).with_hooks(FailingContextHooks);
    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into())).await?;

    let outcome = form.apply(sample(&[(1, "5"), (9, "x")])).await;
    assert!(matches!(outcome, ApplyOutcome::Failed(message) if message.contains("cannot derive context")));
    assert!(form.is_loading());
    assert_eq!(saved_model(&form), model(&[(1, "5"), (9, "x")]));

    // The entity is written once the schema is refreshed
    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Double)]).into())).await?;
    assert!(!form.is_loading());
    assert_eq!(field_value(&form, 1), Some(FieldValue::Scalar(Some(PmfmValue::Double(5.0)))));
    assert_eq!(saved_model(&form), model(&[(1, "5"), (9, "x")]));
    Ok(())
}

#[tokio::test]
async fn test_equal_value_is_not_an_edit() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.set_parameters(Some(list(vec![spec(1, "WEIGHT", ValueType::Double)]).into())).await?;
    form.apply(sample(&[(1, "2")])).await;

    let mut events = form.subscribe_events();
    form.set_field_value(&FieldKey::Pmfm(1), FormValue::single(PmfmValue::Integer(2)))?;
    assert!(!form.is_dirty());
    assert!(events.try_recv().is_err());

    form.set_field_value(&FieldKey::Pmfm(1), FormValue::single(PmfmValue::Double(2.5)))?;
    assert!(form.is_dirty());
    assert_eq!(events.try_recv()?, FormEvent::ValueChanged { field: "1".into() });
    Ok(())
}

struct OrphanFieldHooks;

#[async_trait]
impl FormHooks<Sample> for OrphanFieldHooks {
    async fn on_schema_updated(&self, schema: &mut FieldSchema) -> Result<()> {
        let rule = measurement_forms::FieldRule::optional(ValueType::String);
        schema.insert(FieldKey::Pmfm(999), measurement_forms::schema::Field::scalar(None, rule));
        Ok(())
    }
}

#[tokio::test]
async fn test_broken_schema_is_reported_loudly() {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default()).with_hooks(OrphanFieldHooks);
    let result = form
        .set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into()))
        .await;

    match result {
        Err(FormError::InvariantViolation(message)) => assert!(message.contains("999")),
        other => panic!("expected an invariant violation, got {:?}", other),
    }
    assert!(form.last_error().is_some());
    assert!(managed_keys(&form).is_empty());
}

struct VisibleOnly;

#[async_trait]
impl FormHooks<Sample> for VisibleOnly {
    async fn map_parameters(&self, parameters: ParameterList) -> Result<ParameterList> {
        Ok(parameters.into_iter().filter(|p| !p.hidden).collect())
    }
}

#[tokio::test]
async fn test_map_hook_shapes_schema() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default()).with_hooks(VisibleOnly);
    let params = list(vec![
        spec(1, "SHOWN", ValueType::Integer),
        spec(2, "HIDDEN", ValueType::Integer).with_hidden(true),
    ]);
    form.set_parameters(Some(params.into())).await?;

    assert_eq!(
        managed_keys(&form),
        [FieldKey::Pmfm(1), FieldKey::Discriminator].into_iter().collect()
    );
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_events() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    let mut events = form.subscribe_events();

    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer)]).into())).await?;
    form.apply(sample(&[(1, "3")])).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            FormEvent::StepChanged {
                from: ReadyStep::Starting,
                to: ReadyStep::SettingParameters
            },
            FormEvent::StepChanged {
                from: ReadyStep::SettingParameters,
                to: ReadyStep::UpdatingSchema
            },
            FormEvent::SchemaUpdated {
                added: 1,
                updated: 0,
                removed: 0
            },
            FormEvent::StepChanged {
                from: ReadyStep::UpdatingSchema,
                to: ReadyStep::SchemaReady
            },
            FormEvent::ValuesApplied,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_global_disable_survives_apply() -> Result<()> {
    let form = MeasurementValuesForm::<Sample>::new(FormOptions::default());
    form.disable();
    form.set_parameters(Some(list(vec![spec(1, "COUNT", ValueType::Integer).with_required(true)]).into()))
        .await?;
    form.apply(Sample {
        program: Some(ProgramRef::new("SIH")),
        ..sample(&[])
    })
    .await;

    assert!(!form.is_enabled());
    assert!(!form.with_schema(|schema| schema.is_field_enabled(&FieldKey::Pmfm(1))));
    assert!(form.is_valid());

    form.enable();
    assert!(!form.is_valid());
    Ok(())
}
