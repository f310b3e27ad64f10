//! Measurement Values Form
//!
//! The engine behind an entity editor whose fields are driven by a parameter
//! catalog. It resolves the active parameter list, keeps the field schema in
//! sync with it, and moves entity values into and out of the schema.
//!
//! Every entry point goes through the readiness gate: values are written
//! only once the schema reached `SchemaReady`, and a newer `apply` always
//! wins over an older one still waiting for it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use pmfm_core::spec::parameters_equal;
use pmfm_core::{
    FormValue, MeasurementEntity, MeasurementValues, ModelValues, ParameterCatalogProvider, ParameterList,
    ParameterSource, PmfmId, PmfmValue,
};

use crate::bridge::{select_persistable, EmptinessFn, EntityBridge};
use crate::cancel::CancelSignal;
use crate::config::{CatalogContext, FormOptions};
use crate::error::FormError;
use crate::events::{FormEvent, FormEventBus};
use crate::hooks::{DefaultHooks, FormHooks};
use crate::readiness::{ReadinessStateMachine, ReadyStep};
use crate::resolver::{await_first, force_optional};
use crate::schema::{
    check_key_invariant, Field, FieldKey, FieldSchema, SchemaSynchronizer, SyncReport, ValidationReport,
};
use crate::validator::{PmfmValidators, ValidatorFactory};

lazy_static! {
    static ref MEASUREMENT_PATH: Regex = Regex::new(r"^measurementValues\.(\d+)$").unwrap();
}

/// Result of a parameter update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    /// Structurally equal to the active list, nothing changed
    Unchanged,
    Synchronized(SyncReport),
    /// Parameters were cleared (absent input or load failure)
    Reset,
    /// The catalog context is incomplete, nothing was loaded
    Deferred,
    Cancelled,
}

/// Result of one `apply` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ApplyOutcome {
    Applied,
    /// A newer `apply` took over while this one was waiting
    Superseded,
    Cancelled,
    Failed(String),
}

struct FormState<E> {
    options: FormOptions,
    context: CatalogContext,
    /// Resolved list before force-optional and mapping, kept for refreshes
    initial_parameters: Option<ParameterList>,
    parameters: Option<ParameterList>,
    schema: FieldSchema,
    data: Option<E>,
    prior_model: ModelValues,
    apply_generation: u64,
    applying: usize,
    loading: bool,
    enabled: bool,
    last_error: Option<String>,
    sync_passes: u64,
}

impl<E> FormState<E> {
    fn new(options: FormOptions, context: CatalogContext) -> Self {
        Self {
            options,
            context,
            initial_parameters: None,
            parameters: None,
            schema: FieldSchema::new(),
            data: None,
            prior_model: ModelValues::new(),
            apply_generation: 0,
            applying: 0,
            loading: true,
            enabled: true,
            last_error: None,
            sync_passes: 0,
        }
    }

    fn log_prefix(&self) -> String {
        format!(
            "[measurement-values] ({})",
            self.context.acquisition_level.as_deref().unwrap_or("?")
        )
    }
}

/// Decrements the in-flight apply counter, even when the apply future is dropped.
struct ApplyGuard<'a, E> {
    state: &'a Mutex<FormState<E>>,
}

impl<E> Drop for ApplyGuard<'_, E> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.applying = state.applying.saturating_sub(1);
    }
}

pub struct MeasurementValuesForm<E: MeasurementEntity> {
    hooks: Arc<dyn FormHooks<E>>,
    validators: Arc<dyn ValidatorFactory>,
    provider: Option<Arc<dyn ParameterCatalogProvider>>,
    bridge: EntityBridge,
    readiness: ReadinessStateMachine,
    cancel: CancelSignal,
    events: FormEventBus,
    state: Mutex<FormState<E>>,
}

impl<E: MeasurementEntity> MeasurementValuesForm<E> {
    pub fn new(options: FormOptions) -> Self {
        let context = CatalogContext {
            acquisition_level: E::ACQUISITION_LEVEL.map(str::to_string),
            ..Default::default()
        };
        Self {
            hooks: Arc::new(DefaultHooks),
            validators: Arc::new(PmfmValidators),
            provider: None,
            bridge: EntityBridge::new().with_keep_unknown(options.keep_unknown_values),
            readiness: ReadinessStateMachine::new(),
            cancel: CancelSignal::new(),
            events: FormEventBus::default(),
            state: Mutex::new(FormState::new(options, context)),
        }
    }

    pub fn with_hooks(mut self, hooks: impl FormHooks<E> + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_validators(mut self, validators: impl ValidatorFactory + 'static) -> Self {
        self.validators = Arc::new(validators);
        self
    }

    pub fn with_catalog(mut self, provider: Arc<dyn ParameterCatalogProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Initial catalog context. Fields left empty keep the entity's defaults.
    pub fn with_context(self, context: CatalogContext) -> Self {
        {
            let mut state = self.lock();
            let acquisition_level = context.acquisition_level.clone().or_else(|| state.context.acquisition_level.take());
            state.context = CatalogContext {
                acquisition_level,
                ..context
            };
        }
        self
    }

    pub fn with_emptiness(mut self, is_empty: EmptinessFn) -> Self {
        self.bridge = self.bridge.with_emptiness(is_empty);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FormState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_prefix(&self) -> String {
        self.lock().log_prefix()
    }

    // ---- readiness ----

    pub fn ready_step(&self) -> ReadyStep {
        self.readiness.current()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn subscribe_steps(&self) -> watch::Receiver<ReadyStep> {
        self.readiness.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FormEvent> {
        self.events.subscribe()
    }

    /// Suspends until the schema is ready, or the form is destroyed.
    pub async fn wait_ready(&self) -> Result<(), FormError> {
        self.readiness.wait_until(ReadyStep::SchemaReady, &self.cancel).await
    }

    /// Moves the machine to `step`, in either direction. Going down to
    /// `LoadingParameters` or below marks the form as loading, and first
    /// saves user edits into the pending entity.
    fn set_ready_step(&self, step: ReadyStep) {
        let from = self.readiness.current();
        if step <= ReadyStep::LoadingParameters {
            let mut state = self.lock();
            if !state.loading {
                self.snapshot_edits(&mut state);
                state.loading = true;
            }
        }
        if from == step {
            return;
        }

        let changed = if step > from {
            self.readiness.advance_to(step)
        } else {
            self.readiness.rewind_to(step)
        };
        if changed {
            debug!("{} Loading step -> {}", self.log_prefix(), step);
            self.events.publish(FormEvent::StepChanged { from, to: step });
        }
    }

    fn snapshot_edits(&self, state: &mut FormState<E>) {
        if state.applying > 0 || !state.schema.is_dirty() {
            return;
        }
        if let Some(value) = self.read_value(state) {
            debug!("{} Keeping unsaved edits before reloading", state.log_prefix());
            state.prior_model = match value.measurement_values() {
                MeasurementValues::Model(model) => model.clone(),
                MeasurementValues::Form(_) => state.prior_model.clone(),
            };
            state.data = Some(value);
        }
    }

    // ---- parameters ----

    /// Leaves `Starting` and loads the parameters of the current context.
    pub async fn mark_ready(&self) -> Result<SyncOutcome, FormError> {
        if self.cancel.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }
        if self.readiness.current() != ReadyStep::Starting {
            return Ok(SyncOutcome::Unchanged);
        }
        self.set_ready_step(ReadyStep::LoadingParameters);
        self.load_parameters().await
    }

    pub fn context(&self) -> CatalogContext {
        self.lock().context.clone()
    }

    /// Replaces the catalog context. Once the form left `Starting`, a change
    /// reloads the parameters.
    pub async fn set_context(&self, context: CatalogContext) -> Result<SyncOutcome, FormError> {
        let changed = {
            let mut state = self.lock();
            let changed = state.context != context;
            state.context = context;
            changed
        };
        if !changed || self.readiness.current() == ReadyStep::Starting {
            return Ok(SyncOutcome::Unchanged);
        }
        self.load_parameters().await
    }

    pub async fn set_program_label(&self, label: &str) -> Result<SyncOutcome, FormError> {
        let mut context = self.context();
        context.program_label = Some(label.to_string());
        self.set_context(context).await
    }

    pub async fn set_gear_id(&self, gear_id: Option<i32>) -> Result<SyncOutcome, FormError> {
        let mut context = self.context();
        context.gear_id = gear_id;
        self.set_context(context).await
    }

    pub async fn set_force_optional(&self, force_optional: bool) -> Result<SyncOutcome, FormError> {
        let initial = {
            let mut state = self.lock();
            if state.options.force_optional == force_optional {
                return Ok(SyncOutcome::Unchanged);
            }
            state.options.force_optional = force_optional;
            state.initial_parameters.clone()
        };
        if self.readiness.current() == ReadyStep::Starting {
            return Ok(SyncOutcome::Unchanged);
        }
        match (&self.provider, initial) {
            (Some(_), _) => self.load_parameters().await,
            (None, Some(initial)) => self.set_parameters(Some(ParameterSource::Ready(initial))).await,
            (None, None) => Ok(SyncOutcome::Unchanged),
        }
    }

    async fn load_parameters(&self) -> Result<SyncOutcome, FormError> {
        if self.cancel.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }
        let Some(provider) = self.provider.clone() else {
            return Ok(SyncOutcome::Deferred);
        };
        let query = self.lock().context.to_query();
        let Some(query) = query else {
            debug!("{} Cannot load parameters yet: incomplete context", self.log_prefix());
            return Ok(SyncOutcome::Deferred);
        };

        self.set_ready_step(ReadyStep::LoadingParameters);
        let source = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(SyncOutcome::Cancelled),
            source = provider.watch_parameters(&query) => source,
        };
        match source {
            Ok(source) => self.set_parameters(Some(source)).await,
            Err(e) => {
                self.fail_parameters(FormError::CatalogLoad(e.to_string()));
                Ok(SyncOutcome::Reset)
            }
        }
    }

    /// Active parameter list, empty before the first synchronization.
    pub fn parameters(&self) -> ParameterList {
        self.lock().parameters.clone().unwrap_or_default()
    }

    pub fn sync_passes(&self) -> u64 {
        self.lock().sync_passes
    }

    /// Resolves `source` and synchronizes the schema with it. `None` resets
    /// the parameters. Load failures reset too and are reported through
    /// `last_error()`; only a broken schema invariant is returned as an error.
    pub async fn set_parameters(&self, source: Option<ParameterSource>) -> Result<SyncOutcome, FormError> {
        let Some(source) = source else {
            self.reset_parameters();
            return Ok(SyncOutcome::Reset);
        };
        if self.cancel.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }

        self.set_ready_step(ReadyStep::SettingParameters);
        let candidate = match self.resolve_candidate(source).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return Ok(SyncOutcome::Cancelled),
            Err(e) => {
                self.fail_parameters(e);
                return Ok(SyncOutcome::Reset);
            }
        };

        let unchanged = {
            let state = self.lock();
            state
                .parameters
                .as_ref()
                .map_or(false, |active| parameters_equal(active, &candidate))
        };
        if unchanged {
            debug!("{} Parameters unchanged, skipping schema update", self.log_prefix());
            self.set_ready_step(ReadyStep::SchemaReady);
            self.refresh_view()?;
            return Ok(SyncOutcome::Unchanged);
        }

        self.set_ready_step(ReadyStep::UpdatingSchema);
        let (mut schema, synchronizer, with_discriminator) = {
            let state = self.lock();
            let synchronizer = SchemaSynchronizer::new(
                Arc::clone(&self.validators),
                &state.options.protected_attributes,
                state.options.with_discriminator,
            );
            (state.schema.clone(), synchronizer, state.options.with_discriminator)
        };
        let report = synchronizer.synchronize(&mut schema, &candidate);

        let hooked = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(SyncOutcome::Cancelled),
            hooked = self.hooks.on_schema_updated(&mut schema) => hooked,
        };
        if let Err(e) = hooked {
            self.fail_parameters(FormError::Hook(format!("{:#}", e)));
            return Ok(SyncOutcome::Reset);
        }

        if let Err(e) = check_key_invariant(&schema, &candidate, with_discriminator) {
            error!("{} {}", self.log_prefix(), e);
            self.record_error(&e);
            self.reset_parameters();
            return Err(e);
        }

        {
            let mut state = self.lock();
            self.snapshot_edits(&mut state);
            schema.set_enabled(state.enabled);
            state.schema = schema;
            state.parameters = Some(candidate);
            state.sync_passes += 1;
            debug!(
                "{} Schema updated with {} parameter(s)",
                state.log_prefix(),
                state.parameters.as_ref().map_or(0, Vec::len)
            );
        }
        self.events.publish(FormEvent::SchemaUpdated {
            added: report.added,
            updated: report.updated,
            removed: report.removed,
        });
        self.set_ready_step(ReadyStep::SchemaReady);
        self.refresh_view()?;
        Ok(SyncOutcome::Synchronized(report))
    }

    async fn resolve_candidate(&self, source: ParameterSource) -> Result<Option<ParameterList>, FormError> {
        let Some(resolved) = await_first(source, &self.cancel).await? else {
            return Ok(None);
        };

        let (force, excluded) = {
            let mut state = self.lock();
            state.initial_parameters = Some(resolved.clone());
            (state.options.force_optional, state.options.excluded_ids())
        };
        let relaxed = if force {
            force_optional(&resolved, &excluded)
        } else {
            resolved
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            mapped = self.hooks.map_parameters(relaxed) => mapped
                .map(Some)
                .map_err(|e| FormError::Hook(format!("{:#}", e))),
        }
    }

    /// Clears the schema's parameter fields. A form that went past `Starting`
    /// goes back to it.
    pub fn reset_parameters(&self) {
        let was_set = {
            let mut state = self.lock();
            state.initial_parameters = None;
            state.parameters.is_some()
        };
        if !was_set {
            return;
        }
        debug!("{} Reset parameters", self.log_prefix());

        if self.readiness.current() > ReadyStep::Starting {
            self.set_ready_step(ReadyStep::Starting);
        }

        let mut state = self.lock();
        let synchronizer = SchemaSynchronizer::new(
            Arc::clone(&self.validators),
            &state.options.protected_attributes,
            state.options.with_discriminator,
        );
        synchronizer.synchronize(&mut state.schema, &[]);
        state.parameters = None;
    }

    /// Load failures leave the form usable: the schema is emptied and marked
    /// ready, so pending and later applies still complete.
    fn fail_parameters(&self, e: FormError) {
        if e.is_cancelled() {
            return;
        }
        warn!("{} Error while applying parameters: {}", self.log_prefix(), e);
        self.record_error(&e);
        self.reset_parameters();

        {
            let mut state = self.lock();
            let synchronizer = SchemaSynchronizer::new(
                Arc::clone(&self.validators),
                &state.options.protected_attributes,
                state.options.with_discriminator,
            );
            synchronizer.synchronize(&mut state.schema, &[]);
            state.parameters = Some(ParameterList::new());
        }
        self.set_ready_step(ReadyStep::SchemaReady);
        if let Err(e) = self.refresh_view() {
            self.record_error(&e);
        }
    }

    fn record_error(&self, e: &FormError) {
        self.lock().last_error = Some(e.to_string());
        self.events.publish(FormEvent::Error(e.to_string()));
    }

    /// After the schema became ready: re-applies a pending entity, unless an
    /// `apply` is about to do it.
    fn refresh_view(&self) -> Result<(), FormError> {
        let mut state = self.lock();
        if state.applying == 0 {
            if let Some(data) = state.data.clone() {
                drop(state);
                return self.update_view(&data);
            }
        }
        let enabled = state.enabled;
        state.schema.set_enabled(enabled);
        Ok(())
    }

    // ---- values ----

    /// Writes `entity` into the schema once it is ready. When several calls
    /// overlap, only the most recent one is written.
    pub async fn apply(&self, entity: E) -> ApplyOutcome {
        let generation = {
            let mut state = self.lock();
            state.apply_generation += 1;
            state.applying += 1;
            state.prior_model = match entity.measurement_values() {
                MeasurementValues::Model(model) => model.clone(),
                MeasurementValues::Form(form) => {
                    let parameters = state.parameters.clone().unwrap_or_default();
                    self.bridge.from_form(form, &parameters, &ModelValues::new())
                }
            };
            state.data = Some(entity.clone());
            debug!("{} Applying value...", state.log_prefix());
            state.apply_generation
        };
        let _guard = ApplyGuard { state: &self.state };

        match self.apply_entity(&entity, generation).await {
            Ok(outcome) => outcome,
            Err(FormError::Cancelled) => ApplyOutcome::Cancelled,
            Err(e) => {
                if matches!(e, FormError::InvariantViolation(_)) {
                    error!("{} {}", self.log_prefix(), e);
                } else {
                    warn!("{} Cannot apply value: {}", self.log_prefix(), e);
                }
                self.record_error(&e);
                // The schema does not hold this entity: reads return it as given
                self.lock().loading = true;
                ApplyOutcome::Failed(e.to_string())
            }
        }
    }

    async fn apply_entity(&self, entity: &E, generation: u64) -> Result<ApplyOutcome, FormError> {
        let context_changed = {
            let mut state = self.lock();
            let mut context = state.context.clone();
            self.hooks
                .on_applying_entity(entity, &mut context)
                .map_err(|e| FormError::Hook(format!("{:#}", e)))?;
            let changed = context != state.context;
            state.context = context;
            changed
        };
        if context_changed && self.readiness.current() != ReadyStep::Starting {
            self.load_parameters().await?;
        }

        self.readiness.wait_until(ReadyStep::SchemaReady, &self.cancel).await?;

        if self.lock().apply_generation != generation {
            debug!("{} Value superseded by a newer one, skipping", self.log_prefix());
            return Ok(ApplyOutcome::Superseded);
        }
        self.update_view(entity)?;
        Ok(ApplyOutcome::Applied)
    }

    fn update_view(&self, entity: &E) -> Result<(), FormError> {
        {
            let mut state = self.lock();
            if !self.readiness.is_ready() {
                warn!("{} Trying to set value, but form not ready!", state.log_prefix());
            }
            let parameters = state.parameters.clone().unwrap_or_default();
            check_key_invariant(&state.schema, &parameters, state.options.with_discriminator)?;

            let values = entity.measurement_values();
            let form_values = self.bridge.to_form(values, &parameters);
            state.schema.patch_values(&form_values);
            state.schema.mark_pristine();
            state.prior_model = match values {
                MeasurementValues::Model(model) => model.clone(),
                MeasurementValues::Form(form) => self.bridge.from_form(form, &parameters, &ModelValues::new()),
            };
            state.data = Some(entity.clone());
            state.loading = false;
            let enabled = state.enabled;
            state.schema.set_enabled(enabled);
            info!("{} Value applied ({} field(s))", state.log_prefix(), form_values.len());
        }
        self.events.publish(FormEvent::ValuesApplied);
        Ok(())
    }

    /// Current entity value. While loading, the last known entity is
    /// returned unmodified.
    pub fn get_value(&self) -> Option<E> {
        let state = self.lock();
        self.read_value(&state)
    }

    fn read_value(&self, state: &FormState<E>) -> Option<E> {
        let data = state.data.as_ref()?;
        if state.loading {
            return Some(data.clone());
        }
        let parameters = state.parameters.as_deref().unwrap_or_default();
        let persistable = select_persistable(parameters, &state.schema, state.options.skip_rules());
        let model = self
            .bridge
            .from_form(&state.schema.form_values(), &persistable, &state.prior_model);

        let mut entity = data.clone();
        entity.set_measurement_values(MeasurementValues::Model(model));
        Some(entity)
    }

    // ---- lifecycle ----

    /// Drops data, error, schema and parameters, and goes back to `Starting`.
    pub fn unload(&self) {
        {
            let mut state = self.lock();
            state.data = None;
            state.prior_model.clear();
            state.last_error = None;
            state.loading = true;
        }
        self.reset_parameters();
        self.set_ready_step(ReadyStep::Starting);
    }

    /// Aborts every pending wait. The form is unusable afterwards.
    pub fn destroy(&self) {
        debug!("{} Destroying form", self.log_prefix());
        self.cancel.cancel();
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    // ---- fields ----

    pub fn schema_keys(&self) -> Vec<FieldKey> {
        self.lock().schema.keys()
    }

    /// Read access to the live schema.
    pub fn with_schema<R>(&self, f: impl FnOnce(&FieldSchema) -> R) -> R {
        f(&self.lock().schema)
    }

    /// Adds an owner attribute field (kept across updates when protected).
    pub fn add_attribute(&self, name: &str, value: serde_json::Value) {
        self.lock()
            .schema
            .insert(FieldKey::Attribute(name.to_string()), Field::attribute(value));
    }

    /// User edit of one field.
    /// A value equal to the current one (numeric formatting and qualitative
    /// ids aside) leaves the field untouched.
    pub fn set_field_value(&self, key: &FieldKey, value: FormValue) -> Result<(), FormError> {
        self.edit_field(key, |field| {
            if field.form_value().is_some_and(|current| current.equals(&value)) {
                return Some(false);
            }
            field.edit(&value);
            Some(true)
        })
    }

    pub fn push_item(&self, id: PmfmId, value: Option<PmfmValue>) -> Result<(), FormError> {
        self.edit_field(&FieldKey::Pmfm(id), |field| field.push_item(value).then_some(true))
    }

    pub fn remove_item(&self, id: PmfmId, index: usize) -> Result<(), FormError> {
        self.edit_field(&FieldKey::Pmfm(id), |field| field.remove_item(index).then_some(true))
    }

    /// `edit` returns `None` when it does not apply to the field, otherwise
    /// whether the value changed.
    fn edit_field(&self, key: &FieldKey, edit: impl FnOnce(&mut Field) -> Option<bool>) -> Result<(), FormError> {
        let quiet = {
            let mut state = self.lock();
            let quiet = state.loading || state.applying > 0;
            let field = state
                .schema
                .get_mut(key)
                .ok_or_else(|| FormError::UnknownField(key.to_string()))?;
            match edit(field) {
                None => return Err(FormError::UnknownField(key.to_string())),
                Some(changed) => quiet || !changed,
            }
        };
        if !quiet {
            self.events.publish(FormEvent::ValueChanged { field: key.to_string() });
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().schema.is_dirty()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Enables the whole form; kept across schema updates and applies.
    pub fn enable(&self) {
        let mut state = self.lock();
        state.enabled = true;
        state.schema.set_enabled(true);
    }

    pub fn disable(&self) {
        let mut state = self.lock();
        state.enabled = false;
        state.schema.set_enabled(false);
    }

    pub fn enable_field(&self, key: &FieldKey) -> Result<(), FormError> {
        self.toggle_field(key, true)
    }

    pub fn disable_field(&self, key: &FieldKey) -> Result<(), FormError> {
        self.toggle_field(key, false)
    }

    fn toggle_field(&self, key: &FieldKey, enabled: bool) -> Result<(), FormError> {
        let mut state = self.lock();
        let field = state
            .schema
            .get_mut(key)
            .ok_or_else(|| FormError::UnknownField(key.to_string()))?;
        if enabled {
            field.enable();
        } else {
            field.disable();
        }
        Ok(())
    }

    // ---- validation ----

    pub fn validate(&self) -> ValidationReport {
        self.lock().schema.validate()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// One line per invalid field, named after its parameter.
    pub fn error_summary(&self) -> Vec<String> {
        self.validate()
            .into_iter()
            .flat_map(|(key, errors)| {
                let name = match &key {
                    FieldKey::Pmfm(id) => self.translate_field_path(&format!("measurementValues.{}", id)),
                    other => other.to_string(),
                };
                errors.into_iter().map(move |e| format!("{}: {}", name, e))
            })
            .collect()
    }

    /// Maps `measurementValues.<id>` to the parameter's display name; other
    /// paths are returned unchanged.
    pub fn translate_field_path(&self, path: &str) -> String {
        let id = MEASUREMENT_PATH
            .captures(path)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<PmfmId>().ok());
        let Some(id) = id else {
            return path.to_string();
        };
        let state = self.lock();
        state
            .parameters
            .iter()
            .flatten()
            .find(|p| p.id() == id)
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|| path.to_string())
    }
}

impl<E: MeasurementEntity> Drop for MeasurementValuesForm<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
