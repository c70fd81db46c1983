use std::collections::BTreeSet;

use futures_timer::Delay;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::controller::{
    BoxedFormFuture, FormController, FormResult, RevalidateMode, Ticket, ValidationMode,
    form_debug, read_lock,
};
use super::errors::{FieldError, FieldErrorKind, FieldErrors};
use crate::path;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    fn is_within(&self, scope: &str) -> bool {
        self.path == scope
            || self
                .path
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with(path::DELIMITER))
    }
}

/// The validation-shaped error: a list of path + message issues. Returned by
/// validators and recognised when raised from a submit handler.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("validation failed with {} issue(s)", .issues.len())]
pub struct ValidationIssues {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationIssues {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::new(path, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn to_field_errors(&self, kind: FieldErrorKind) -> FieldErrors {
        let mut errors = FieldErrors::new();
        self.apply_to(&mut errors, kind);
        errors
    }

    /// Writes the first issue of every path into `errors`, replacing what was
    /// there. Later issues for an already written path are skipped.
    pub fn apply_to(&self, errors: &mut FieldErrors, kind: FieldErrorKind) {
        let mut seen = BTreeSet::new();
        for issue in &self.issues {
            if seen.insert(issue.path.as_str()) {
                errors.insert(&issue.path, FieldError::new(issue.message.clone(), kind));
            }
        }
    }

    fn scoped(self, scope: &str) -> Self {
        Self::new(
            self.issues
                .into_iter()
                .filter(|issue| issue.is_within(scope))
                .collect(),
        )
    }
}

impl From<ValidationIssue> for ValidationIssues {
    fn from(issue: ValidationIssue) -> Self {
        Self::new(vec![issue])
    }
}

/// Validates form values against a schema.
///
/// `path` is `None` for a whole-form pass and `Some(field)` when only one
/// field is being checked; implementations may still validate more and the
/// controller keeps only issues under `field`. On success the parsed (possibly
/// coerced) values are returned and handed to the submit handler.
pub trait SchemaValidator: Send + Sync + 'static {
    fn validate<'a>(
        &'a self,
        values: &'a Value,
        path: Option<&'a str>,
    ) -> BoxedFormFuture<'a, Result<Value, ValidationIssues>>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value, Option<&str>) -> Result<Value, ValidationIssues> + Send + Sync + 'static,
{
    fn validate<'a>(
        &'a self,
        values: &'a Value,
        path: Option<&'a str>,
    ) -> BoxedFormFuture<'a, Result<Value, ValidationIssues>> {
        Box::pin(std::future::ready((self)(values, path)))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum FieldTrigger {
    Change,
    Blur,
}

impl FormController {
    /// Writes one value, marks the form dirty and validates that field only.
    pub async fn set_field_value(&self, field: &str, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        form_debug!(self, field, value = %value, "setting field value");
        self.mutate("writing field value", |state| state.write_value(field, value))?;
        if self.config.schema.is_some() {
            let _ = self.validate_field(field).await?;
        }
        Ok(())
    }

    /// Writes every entry under one lock, in iteration order, so subscribers
    /// and readers never observe a partial batch. Each written field is then
    /// validated.
    pub async fn set_field_values<I, K>(&self, entries: I) -> FormResult<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(field, value)| (field.into(), value))
            .collect::<Vec<(String, Value)>>();
        form_debug!(self, count = entries.len(), "setting multiple field values");
        let fields = self.mutate("writing field values", |state| {
            entries
                .into_iter()
                .map(|(field, value)| {
                    state.write_value(&field, value);
                    field
                })
                .collect::<Vec<_>>()
        })?;
        if self.config.schema.is_some() {
            for field in fields {
                let _ = self.validate_field(&field).await?;
            }
        }
        Ok(())
    }

    /// Marks a field as touched (the blur event) and validates it when the
    /// timing policy asks for it.
    pub async fn touch(&self, field: &str) -> FormResult<()> {
        form_debug!(self, field, "field touched");
        let submitted = self.mutate("touching field", |state| {
            state.touched_fields.insert(field.to_string());
            state.submit_count > 0
        })?;
        if self.should_validate(FieldTrigger::Blur, submitted) {
            let _ = self.validate_field(field).await?;
        }
        Ok(())
    }

    /// Writes a value coming from user input. Unlike `set_field_value`, the
    /// field is only validated when the timing policy asks for it, after the
    /// configured debounce.
    pub async fn change_field_value(&self, field: &str, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        form_debug!(self, field, value = %value, "field changed");
        let submitted = self.mutate("writing changed field value", |state| {
            state.write_value(field, value);
            state.submit_count > 0
        })?;
        if self.should_validate(FieldTrigger::Change, submitted) {
            self.validate_field_debounced(field).await?;
        }
        Ok(())
    }

    /// Runs a whole-form pass without submitting. Field errors are replaced
    /// by the result; values are never touched. The result is dropped when a
    /// value write or a field pass starts before it completes.
    pub async fn validate_form(&self) -> FormResult<bool> {
        form_debug!(self, "validating entire form");
        let Some(schema) = self.config.schema.clone() else {
            return Ok(read_lock(&self.state, "reading form validity")?
                .errors
                .is_empty());
        };
        let (ticket, values) = self.mutate_if(
            "starting form validation",
            |state| {
                let ticket = state.issue_ticket();
                state.form_ticket = Some(ticket);
                (ticket, state.values.clone())
            },
            |_| false,
        )?;

        let issues = match schema.validate(&values, None).await {
            Ok(_) => ValidationIssues::default(),
            Err(issues) => issues,
        };
        let errors = issues.to_field_errors(FieldErrorKind::Schema);
        let applied = self.mutate_if(
            "applying form validation result",
            |state| {
                if state.form_ticket != Some(ticket) {
                    return None;
                }
                state.form_ticket = None;
                state.field_tickets.clear();
                let changed = state.errors != errors;
                state.errors = errors;
                Some(changed)
            },
            |applied| *applied == Some(true),
        )?;
        if applied.is_none() {
            form_debug!(self, ticket = ticket.0, "discarding stale form validation");
        }
        Ok(issues.is_empty())
    }

    /// Validates one field. Only errors at or below `field` are replaced.
    pub async fn validate_field(&self, field: &str) -> FormResult<bool> {
        form_debug!(self, field, "validating field");
        let Some(schema) = self.config.schema.clone() else {
            return Ok(!self.has_field_error(field)?);
        };
        let (ticket, values) = self.mutate_if(
            "starting field validation",
            |state| {
                let ticket = state.issue_ticket();
                state.field_tickets.insert(field.to_string(), ticket);
                state.form_ticket = None;
                (ticket, state.values.clone())
            },
            |_| false,
        )?;

        let issues = match schema.validate(&values, Some(field)).await {
            Ok(_) => ValidationIssues::default(),
            Err(issues) => issues.scoped(field),
        };
        let applied = self.mutate_if(
            "applying field validation result",
            |state| {
                if state.field_tickets.get(field) != Some(&ticket) {
                    return None;
                }
                state.field_tickets.remove(field);
                let before = state.errors.clone();
                state.errors.remove(field);
                issues.apply_to(&mut state.errors, FieldErrorKind::Schema);
                Some(state.errors != before)
            },
            |applied| *applied == Some(true),
        )?;
        if applied.is_none() {
            form_debug!(self, field, ticket = ticket.0, "discarding stale field validation");
        }
        Ok(issues.is_empty())
    }

    async fn validate_field_debounced(&self, field: &str) -> FormResult<()> {
        let debounce = self.config.validate_debounce;
        if debounce.is_zero() {
            let _ = self.validate_field(field).await?;
            return Ok(());
        }

        let ticket = self.mutate_if(
            "scheduling debounced validation",
            |state| {
                let ticket = state.issue_ticket();
                state.field_tickets.insert(field.to_string(), ticket);
                ticket
            },
            |_| false,
        )?;
        Delay::new(debounce).await;
        if !self.is_latest_field_ticket(field, ticket)? {
            form_debug!(self, field, ticket = ticket.0, "debounced validation superseded");
            return Ok(());
        }
        let _ = self.validate_field(field).await?;
        Ok(())
    }

    fn is_latest_field_ticket(&self, field: &str, ticket: Ticket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .field_tickets
            .get(field)
            .copied()
            == Some(ticket))
    }

    pub(super) fn should_validate(&self, trigger: FieldTrigger, submitted: bool) -> bool {
        if self.config.schema.is_none() {
            return false;
        }
        if submitted {
            matches!(
                (self.config.revalidate_mode, trigger),
                (RevalidateMode::OnChange, FieldTrigger::Change)
                    | (RevalidateMode::OnBlur, FieldTrigger::Blur)
            )
        } else {
            matches!(
                (self.config.validate_mode, trigger),
                (ValidationMode::OnChange, FieldTrigger::Change)
                    | (ValidationMode::OnBlur, FieldTrigger::Blur)
            )
        }
    }
}
