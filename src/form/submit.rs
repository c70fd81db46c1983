use std::fmt::Display;

use serde_json::Value;

use super::controller::{
    FormController, FormResult, SubmitState, Ticket, form_debug, transition_submit_state,
};
use super::errors::FieldErrorKind;
use super::validation::ValidationIssues;

/// Error raised by a submit handler or transform.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SubmitError {
    /// Mapped onto field errors instead of the submission error.
    #[error(transparent)]
    Validation(#[from] ValidationIssues),
    #[error("{0}")]
    Message(String),
    #[error("An unexpected error occurred")]
    Unexpected,
}

impl SubmitError {
    pub fn other(error: impl Display) -> Self {
        let message = error.to_string();
        if message.trim().is_empty() {
            SubmitError::Unexpected
        } else {
            SubmitError::Message(message)
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::other(message.into())
    }
}

/// The event that triggered a submit, e.g. a native form submission whose
/// default navigation must be suppressed.
pub trait SubmitEvent {
    fn prevent_default(&mut self);
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FormSubmitEvent {
    default_prevented: bool,
}

impl FormSubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

impl SubmitEvent for FormSubmitEvent {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// Another attempt was already in flight; nothing happened.
    Ignored,
    /// Validation failed; `on_error` was called.
    Rejected,
    Succeeded,
    /// The submit handler or transform failed.
    Failed,
    /// The form was reset while this attempt was in flight; its result was
    /// discarded.
    Superseded,
}

enum Completion {
    Succeeded,
    Failed,
}

impl FormController {
    pub async fn submit_with<E>(&self, event: &mut E) -> FormResult<SubmitOutcome>
    where
        E: SubmitEvent + ?Sized,
    {
        event.prevent_default();
        self.submit().await
    }

    /// Validates and submits the current values.
    ///
    /// Business failures never surface as `Err`: validation failures become
    /// field errors, a validation-shaped error from the handler becomes field
    /// errors, and anything else becomes the submission error. Calls made
    /// while an attempt is in flight are ignored.
    pub async fn submit(&self) -> FormResult<SubmitOutcome> {
        let started = self.mutate_if(
            "preparing submit",
            |state| -> FormResult<Option<(Ticket, Value)>> {
                if state.submit_state.is_in_flight() {
                    return Ok(None);
                }
                transition_submit_state(state, SubmitState::Validating)?;
                state.submit_count = state.submit_count.saturating_add(1);
                state.submission_error = None;
                state.form_ticket = None;
                state.field_tickets.clear();
                let ticket = state.issue_ticket();
                state.submit_ticket = Some(ticket);
                Ok(Some((ticket, state.values.clone())))
            },
            |started: &FormResult<Option<(Ticket, Value)>>| matches!(started, Ok(Some(_))),
        )??;
        let Some((ticket, values)) = started else {
            form_debug!(self, "submit ignored while another attempt is in flight");
            return Ok(SubmitOutcome::Ignored);
        };
        form_debug!(self, attempt = ticket.0, values = %values, "submitting form");

        let parsed = match &self.config.schema {
            Some(schema) => schema.validate(&values, None).await,
            None => Ok(values),
        };
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(issues) => return self.reject(ticket, issues),
        };

        let still_current = self.mutate_if(
            "moving submit state to submitting",
            |state| -> FormResult<bool> {
                if state.submit_ticket != Some(ticket) {
                    return Ok(false);
                }
                // Errors from before this attempt no longer apply.
                state.errors.clear();
                state.form_ticket = None;
                state.field_tickets.clear();
                transition_submit_state(state, SubmitState::Submitting)?;
                Ok(true)
            },
            |current: &FormResult<bool>| matches!(current, Ok(true)),
        )??;
        if !still_current {
            form_debug!(self, attempt = ticket.0, "submit superseded before handler ran");
            return Ok(SubmitOutcome::Superseded);
        }

        let result = self.run_submit_handlers(ticket, parsed).await;
        self.complete(ticket, result)
    }

    async fn run_submit_handlers(&self, ticket: Ticket, values: Value) -> Result<(), SubmitError> {
        let values = match &self.config.transform_on_submit {
            Some(transform) => {
                let transformed = transform(values).await?;
                form_debug!(self, attempt = ticket.0, values = %transformed, "transformed values");
                transformed
            }
            None => values,
        };
        match &self.config.on_submit {
            Some(handler) => handler(values).await,
            None => Ok(()),
        }
    }

    fn reject(&self, ticket: Ticket, issues: ValidationIssues) -> FormResult<SubmitOutcome> {
        let errors = issues.to_field_errors(FieldErrorKind::Schema);
        let applied = self.mutate_if(
            "handling submit validation failure",
            |state| -> FormResult<bool> {
                if state.submit_ticket != Some(ticket) {
                    return Ok(false);
                }
                state.submit_ticket = None;
                state.is_submitted = true;
                state.form_ticket = None;
                state.field_tickets.clear();
                state.errors = errors.clone();
                transition_submit_state(state, SubmitState::Rejected)?;
                Ok(true)
            },
            |applied: &FormResult<bool>| matches!(applied, Ok(true)),
        )??;
        if !applied {
            form_debug!(self, attempt = ticket.0, "discarding stale submit validation");
            return Ok(SubmitOutcome::Superseded);
        }

        form_debug!(self, attempt = ticket.0, issues = issues.issues.len(), "validation errors");
        if let Some(on_error) = &self.config.on_error {
            on_error(&errors);
        }
        Ok(SubmitOutcome::Rejected)
    }

    fn complete(
        &self,
        ticket: Ticket,
        result: Result<(), SubmitError>,
    ) -> FormResult<SubmitOutcome> {
        let reset_on_success = self.config.reset_on_success;
        let completion = self.mutate_if(
            "completing submit",
            |state| -> FormResult<Option<Completion>> {
                if state.submit_ticket != Some(ticket) {
                    return Ok(None);
                }
                state.submit_ticket = None;
                state.is_submitted = true;
                match &result {
                    Ok(()) => {
                        if reset_on_success {
                            state.reset_to_defaults();
                        }
                        transition_submit_state(state, SubmitState::Succeeded)?;
                        Ok(Some(Completion::Succeeded))
                    }
                    Err(SubmitError::Validation(issues)) => {
                        issues.apply_to(&mut state.errors, FieldErrorKind::Submit);
                        transition_submit_state(state, SubmitState::Failed)?;
                        Ok(Some(Completion::Failed))
                    }
                    Err(error) => {
                        state.submission_error = Some(error.to_string());
                        transition_submit_state(state, SubmitState::Failed)?;
                        Ok(Some(Completion::Failed))
                    }
                }
            },
            |completion: &FormResult<Option<Completion>>| matches!(completion, Ok(Some(_))),
        )??;

        match completion {
            None => {
                form_debug!(self, attempt = ticket.0, "discarding stale submit completion");
                Ok(SubmitOutcome::Superseded)
            }
            Some(Completion::Succeeded) => {
                form_debug!(self, attempt = ticket.0, "submission successful");
                if reset_on_success {
                    if let Some(on_reset) = &self.config.on_reset {
                        on_reset();
                    }
                }
                Ok(SubmitOutcome::Succeeded)
            }
            Some(Completion::Failed) => {
                if let Err(error) = &result {
                    form_debug!(self, attempt = ticket.0, error = %error, "submission error");
                }
                Ok(SubmitOutcome::Failed)
            }
        }
    }
}
