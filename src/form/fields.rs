use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Password,
    Number,
    Tel,
    Url,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Date,
    Time,
    DatetimeLocal,
    File,
    Hidden,
}

impl FieldType {
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Number => "number",
            FieldType::Tel => "tel",
            FieldType::Url => "url",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DatetimeLocal => "datetime-local",
            FieldType::File => "file",
            FieldType::Hidden => "hidden",
        }
    }

    pub const fn has_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: Value,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Declarative description of one input. Pure metadata: the controller stores
/// these and hands them back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_complete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default)]
    pub multiple: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            ..Self::default()
        }
    }

    pub fn label(mut self, value: impl Into<String>) -> Self {
        self.label = Some(value.into());
        self
    }

    pub fn placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholder = Some(value.into());
        self
    }

    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    pub fn disabled(mut self, value: bool) -> Self {
        self.disabled = value;
        self
    }

    pub fn helper_text(mut self, value: impl Into<String>) -> Self {
        self.helper_text = Some(value.into());
        self
    }

    pub fn auto_complete(mut self, value: impl Into<String>) -> Self {
        self.auto_complete = Some(value.into());
        self
    }

    pub fn rows(mut self, value: u32) -> Self {
        self.rows = Some(value);
        self
    }

    pub fn multiple(mut self, value: bool) -> Self {
        self.multiple = value;
        self
    }

    pub fn option(mut self, value: impl Into<Value>, label: impl Into<String>) -> Self {
        self.options.push(FieldOption::new(value, label));
        self
    }
}

/// Implemented by `#[derive(FormFields)]`.
pub trait FormFields {
    fn field_definitions() -> Vec<FieldDefinition>;
}
