use std::fmt::{self, Debug, Formatter};

use serde_json::Value;

use super::controller::{FormController, FormResult, read_lock};
use crate::path;

/// Everything an input needs to render and report back to its controller.
#[derive(Clone)]
pub struct FieldProps {
    pub name: String,
    pub value: Value,
    pub error: bool,
    pub helper_text: Option<String>,
    pub label: Option<String>,
    pub required: bool,
    pub disabled: bool,
    controller: FormController,
}

impl FieldProps {
    pub async fn on_change(&self, value: impl Into<Value>) -> FormResult<()> {
        self.controller.change_field_value(&self.name, value).await
    }

    pub async fn on_blur(&self) -> FormResult<()> {
        self.controller.touch(&self.name).await
    }

    /// Value as text for plain inputs; `null` and missing values render empty.
    pub fn text(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl Debug for FieldProps {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProps")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("error", &self.error)
            .field("helper_text", &self.helper_text)
            .field("label", &self.label)
            .field("required", &self.required)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl FormController {
    /// Projects the current state of `field` for the presentation layer. The
    /// helper text is the field error when there is one, otherwise the helper
    /// text of the matching field definition.
    pub fn get_field_props(&self, field: &str) -> FormResult<FieldProps> {
        let definition = self.field_definition(field);
        let (value, has_error, error) = {
            let state = read_lock(&self.state, "reading field props")?;
            let value = path::get(&state.values, field)
                .cloned()
                .unwrap_or(Value::Null);
            let error = state.errors.get(field).map(|error| error.message.clone());
            (value, state.errors.contains(field), error)
        };

        Ok(FieldProps {
            name: field.to_string(),
            value,
            error: has_error,
            helper_text: error.or_else(|| definition.and_then(|d| d.helper_text.clone())),
            label: definition.and_then(|d| d.label.clone()),
            required: definition.is_some_and(|d| d.required),
            disabled: definition.is_some_and(|d| d.disabled),
            controller: self.clone(),
        })
    }

    /// The field error, but only once the field was touched or the form was
    /// submitted, so untouched inputs do not show errors from a change pass.
    pub fn field_error_for_display(&self, field: &str) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading display error message")?;
        if !state.touched_fields.contains(field) && state.submit_count == 0 {
            return Ok(None);
        }
        Ok(state.errors.get(field).map(|error| error.message.clone()))
    }
}
