use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::errors::{FieldError, FieldErrorKind, FieldErrors, FlatFieldError};
use super::fields::FieldDefinition;
use super::observer::Observers;
use super::submit::SubmitError;
use super::validation::SchemaValidator;
use crate::path;

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

macro_rules! form_debug {
    ($controller:expr, $($arg:tt)+) => {
        if $controller.config.debug {
            tracing::debug!(target: "calmform::form", form_id = $controller.id.0, $($arg)+);
        }
    };
}
pub(super) use form_debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

/// Tags one validation pass or submit attempt. Unique per controller, so a
/// completion can tell whether it is still the latest one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct Ticket(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Rejected,
    Failed,
}

impl SubmitState {
    pub const fn is_in_flight(self) -> bool {
        matches!(self, SubmitState::Validating | SubmitState::Submitting)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevalidateMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionState {
    pub is_submitting: bool,
    pub is_submitted: bool,
    pub submit_count: u32,
    pub is_dirty: bool,
    pub is_valid: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub version: u64,
    pub values: Value,
    pub errors: FieldErrors,
    pub submission_error: Option<String>,
    pub submit_state: SubmitState,
    pub state: SubmissionState,
    pub dirty_fields: BTreeSet<String>,
    pub touched_fields: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("invalid submit state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: SubmitState, to: SubmitState },
    #[error("default values must be an object, got {0}")]
    InvalidDefaults(&'static str),
    #[error("form values could not be converted: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type FormResult<T> = Result<T, FormError>;

pub type BoxedFormFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(super) type SubmitHandlerFn =
    Arc<dyn Fn(Value) -> BoxedFormFuture<'static, Result<(), SubmitError>> + Send + Sync>;
pub(super) type TransformFn =
    Arc<dyn Fn(Value) -> BoxedFormFuture<'static, Result<Value, SubmitError>> + Send + Sync>;
pub(super) type ErrorHandlerFn = Arc<dyn Fn(&FieldErrors) + Send + Sync>;
pub(super) type ResetHandlerFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct FormConfig {
    pub(super) schema: Option<Arc<dyn SchemaValidator>>,
    pub(super) default_values: Value,
    pub(super) fields: Vec<FieldDefinition>,
    pub(super) on_submit: Option<SubmitHandlerFn>,
    pub(super) on_error: Option<ErrorHandlerFn>,
    pub(super) on_reset: Option<ResetHandlerFn>,
    pub(super) transform_on_submit: Option<TransformFn>,
    pub(super) reset_on_success: bool,
    pub(super) debug: bool,
    pub(super) validate_mode: ValidationMode,
    pub(super) revalidate_mode: RevalidateMode,
    pub(super) validate_debounce: Duration,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            schema: None,
            default_values: Value::Object(Map::new()),
            fields: Vec::new(),
            on_submit: None,
            on_error: None,
            on_reset: None,
            transform_on_submit: None,
            reset_on_success: false,
            debug: false,
            validate_mode: ValidationMode::OnBlur,
            revalidate_mode: RevalidateMode::OnChange,
            validate_debounce: Duration::ZERO,
        }
    }
}

impl FormConfig {
    pub fn new(default_values: Value) -> Self {
        Self {
            default_values,
            ..Self::default()
        }
    }

    pub fn from_defaults<T: Serialize>(defaults: &T) -> FormResult<Self> {
        Ok(Self::new(serde_json::to_value(defaults)?))
    }

    pub fn schema(mut self, schema: impl SchemaValidator) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.fields = fields;
        self
    }

    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubmitError>> + Send + 'static,
    {
        self.on_submit = Some(Arc::new(move |values| Box::pin(handler(values))));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&FieldErrors) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn on_reset(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Arc::new(handler));
        self
    }

    pub fn transform_on_submit<F, Fut>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SubmitError>> + Send + 'static,
    {
        self.transform_on_submit = Some(Arc::new(move |values| Box::pin(transform(values))));
        self
    }

    pub fn reset_on_success(mut self, value: bool) -> Self {
        self.reset_on_success = value;
        self
    }

    pub fn debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    pub fn validate_mode(mut self, mode: ValidationMode) -> Self {
        self.validate_mode = mode;
        self
    }

    pub fn revalidate_mode(mut self, mode: RevalidateMode) -> Self {
        self.revalidate_mode = mode;
        self
    }

    pub fn validate_debounce(mut self, debounce: Duration) -> Self {
        self.validate_debounce = debounce;
        self
    }
}

impl Debug for FormConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("default_values", &self.default_values)
            .field("fields", &self.fields.len())
            .field("has_schema", &self.schema.is_some())
            .field("reset_on_success", &self.reset_on_success)
            .field("debug", &self.debug)
            .field("validate_mode", &self.validate_mode)
            .field("revalidate_mode", &self.revalidate_mode)
            .field("validate_debounce", &self.validate_debounce)
            .finish_non_exhaustive()
    }
}

pub(super) struct FormState {
    pub(super) default_values: Value,
    pub(super) values: Value,
    pub(super) errors: FieldErrors,
    pub(super) submission_error: Option<String>,
    pub(super) submit_state: SubmitState,
    pub(super) submit_count: u32,
    pub(super) is_submitted: bool,
    pub(super) dirty_fields: BTreeSet<String>,
    pub(super) touched_fields: BTreeSet<String>,
    pub(super) next_ticket: u64,
    pub(super) submit_ticket: Option<Ticket>,
    pub(super) form_ticket: Option<Ticket>,
    pub(super) field_tickets: BTreeMap<String, Ticket>,
    pub(super) version: u64,
}

impl FormState {
    pub(super) fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    /// Also drops a pending whole-form pass, whose result was computed from
    /// the values before this write.
    pub(super) fn write_value(&mut self, field: &str, value: Value) {
        path::set(&mut self.values, field, value);
        self.form_ticket = None;
        let is_dirty = path::get(&self.values, field) != path::get(&self.default_values, field);
        if is_dirty {
            self.dirty_fields.insert(field.to_string());
        } else {
            self.dirty_fields.remove(field);
        }
    }

    /// Values, errors and interaction flags back to the initial snapshot.
    /// Submit bookkeeping is left to the caller.
    pub(super) fn reset_to_defaults(&mut self) {
        self.values = self.default_values.clone();
        self.errors.clear();
        self.submission_error = None;
        self.dirty_fields.clear();
        self.touched_fields.clear();
        self.field_tickets.clear();
        self.form_ticket = None;
    }

    pub(super) fn submission_state(&self) -> SubmissionState {
        SubmissionState {
            is_submitting: self.submit_state.is_in_flight(),
            is_submitted: self.is_submitted,
            submit_count: self.submit_count,
            is_dirty: self.values != self.default_values,
            is_valid: self.errors.is_empty(),
        }
    }

    fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            version: self.version,
            values: self.values.clone(),
            errors: self.errors.clone(),
            submission_error: self.submission_error.clone(),
            submit_state: self.submit_state,
            state: self.submission_state(),
            dirty_fields: self.dirty_fields.clone(),
            touched_fields: self.touched_fields.clone(),
        }
    }
}

/// Owns the values, errors and submission lifecycle of one form.
///
/// Clones share state, so handlers handed to the presentation layer can hold
/// their own copy.
#[derive(Clone)]
pub struct FormController {
    pub(super) id: FormId,
    pub(super) config: Arc<FormConfig>,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) observers: Arc<Observers>,
}

impl Debug for FormController {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormController")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FormController {
    pub fn new(config: FormConfig) -> FormResult<Self> {
        let default_values = match &config.default_values {
            Value::Object(_) => config.default_values.clone(),
            Value::Null => Value::Object(Map::new()),
            other => return Err(FormError::InvalidDefaults(value_kind(other))),
        };
        let id = FormId::next();
        if config.debug {
            tracing::debug!(target: "calmform::form", form_id = id.0, ?config, "form created");
        }
        Ok(Self {
            id,
            config: Arc::new(config),
            state: Arc::new(RwLock::new(FormState {
                values: default_values.clone(),
                default_values,
                errors: FieldErrors::new(),
                submission_error: None,
                submit_state: SubmitState::Idle,
                submit_count: 0,
                is_submitted: false,
                dirty_fields: BTreeSet::new(),
                touched_fields: BTreeSet::new(),
                next_ticket: 0,
                submit_ticket: None,
                form_ticket: None,
                field_tickets: BTreeMap::new(),
                version: 0,
            })),
            observers: Arc::new(Observers::new()),
        })
    }

    pub fn form_id(&self) -> FormId {
        self.id
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.config.fields
    }

    pub fn field_definition(&self, field: &str) -> Option<&FieldDefinition> {
        self.config.fields.iter().find(|definition| definition.name == field)
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        Ok(read_lock(&self.state, "creating form snapshot")?.snapshot())
    }

    pub fn submission_state(&self) -> FormResult<SubmissionState> {
        Ok(read_lock(&self.state, "reading submission state")?.submission_state())
    }

    pub fn submit_state(&self) -> FormResult<SubmitState> {
        Ok(read_lock(&self.state, "reading submit state")?.submit_state)
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(self.submit_state()?.is_in_flight())
    }

    /// Bumped on every state change; lets callers poll instead of subscribing.
    pub fn version(&self) -> FormResult<u64> {
        Ok(read_lock(&self.state, "reading form version")?.version)
    }

    pub fn get_field_value(&self, field: &str) -> FormResult<Option<Value>> {
        Ok(path::get(&read_lock(&self.state, "reading field value")?.values, field).cloned())
    }

    pub fn get_all_values(&self) -> FormResult<Value> {
        Ok(read_lock(&self.state, "reading form values")?.values.clone())
    }

    pub fn get_all_values_as<T: DeserializeOwned>(&self) -> FormResult<T> {
        Ok(serde_json::from_value(self.get_all_values()?)?)
    }

    pub fn default_values(&self) -> FormResult<Value> {
        Ok(read_lock(&self.state, "reading default values")?
            .default_values
            .clone())
    }

    pub fn is_touched(&self, field: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched fields")?
            .touched_fields
            .contains(field))
    }

    pub fn is_field_dirty(&self, field: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading dirty fields")?
            .dirty_fields
            .contains(field))
    }

    /// Restores the default values and clears every error. An in-flight
    /// submit attempt is superseded and its completion is discarded.
    pub fn reset(&self) -> FormResult<()> {
        form_debug!(self, "resetting form");
        self.mutate("resetting form", |state| {
            state.reset_to_defaults();
            state.submit_ticket = None;
            transition_submit_state(state, SubmitState::Idle)
        })??;
        if let Some(on_reset) = &self.config.on_reset {
            on_reset();
        }
        Ok(())
    }

    pub fn clear_all_errors(&self) -> FormResult<()> {
        form_debug!(self, "clearing all errors");
        self.mutate("clearing all errors", |state| {
            state.errors.clear();
            state.submission_error = None;
        })
    }

    pub fn clear_field_error(&self, field: &str) -> FormResult<()> {
        form_debug!(self, field, "clearing field error");
        self.mutate("clearing field error", |state| {
            state.errors.remove(field);
        })
    }

    pub fn set_field_error(&self, field: &str, message: impl Into<String>) -> FormResult<()> {
        let message = message.into();
        form_debug!(self, field, message = %message, "setting field error");
        self.mutate("setting field error", |state| {
            state
                .errors
                .insert(field, FieldError::new(message, FieldErrorKind::Manual));
        })
    }

    pub fn has_field_error(&self, field: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking field error")?
            .errors
            .contains(field))
    }

    pub fn get_field_error(&self, field: &str) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(field)
            .map(|error| error.message.clone()))
    }

    pub fn errors(&self) -> FormResult<FieldErrors> {
        Ok(read_lock(&self.state, "reading field errors")?.errors.clone())
    }

    pub fn get_all_errors(&self) -> FormResult<Vec<FlatFieldError>> {
        Ok(read_lock(&self.state, "flattening field errors")?
            .errors
            .flatten())
    }

    pub fn submission_error(&self) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading submission error")?
            .submission_error
            .clone())
    }

    pub fn set_submission_error(&self, error: Option<String>) -> FormResult<()> {
        form_debug!(self, error = ?error, "setting submission error");
        self.mutate("setting submission error", |state| {
            state.submission_error = error;
        })
    }

    pub fn clear_submission_error(&self) -> FormResult<()> {
        self.set_submission_error(None)
    }

    /// Applies `f` under one write lock, then notifies subscribers once.
    pub(super) fn mutate<R>(
        &self,
        context: &'static str,
        f: impl FnOnce(&mut FormState) -> R,
    ) -> FormResult<R> {
        self.mutate_if(context, f, |_| true)
    }

    /// Like `mutate`, but the version only moves and subscribers are only
    /// notified when `changed` holds for the result. Ticket bookkeeping and
    /// discarded stale results pass `|_| false` or a check on `R`.
    pub(super) fn mutate_if<R>(
        &self,
        context: &'static str,
        f: impl FnOnce(&mut FormState) -> R,
        changed: impl FnOnce(&R) -> bool,
    ) -> FormResult<R> {
        let (result, snapshot) = {
            let mut state = write_lock(&self.state, context)?;
            let result = f(&mut state);
            if !changed(&result) {
                return Ok(result);
            }
            state.version = state.version.wrapping_add(1);
            (result, state.snapshot())
        };
        self.observers.notify(&snapshot)?;
        Ok(result)
    }
}

pub(super) fn transition_submit_state(state: &mut FormState, next: SubmitState) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (SubmitState::Idle, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Rejected)
            | (SubmitState::Submitting, SubmitState::Succeeded)
            | (SubmitState::Submitting, SubmitState::Failed)
            | (SubmitState::Succeeded, SubmitState::Validating)
            | (SubmitState::Rejected, SubmitState::Validating)
            | (SubmitState::Failed, SubmitState::Validating)
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
