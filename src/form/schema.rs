use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};

use super::controller::BoxedFormFuture;
use super::validation::{SchemaValidator, ValidationIssue, ValidationIssues};
use crate::path;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern must compile")
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Any,
    String,
    Number,
    Boolean,
}

impl ValueKind {
    fn name(self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug)]
enum Rule {
    MinLength(usize, String),
    MaxLength(usize, String),
    Email(String),
    Pattern(Regex, String),
    Min(Decimal, String),
    Max(Decimal, String),
    OneOf(Vec<Value>, String),
}

/// Constraints for the value at one path.
#[derive(Clone, Debug)]
pub struct FieldSchema {
    kind: ValueKind,
    optional: bool,
    coerce: bool,
    required_message: Option<String>,
    rules: Vec<Rule>,
}

impl FieldSchema {
    fn of(kind: ValueKind) -> Self {
        Self {
            kind,
            optional: false,
            coerce: false,
            required_message: None,
            rules: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::of(ValueKind::String)
    }

    pub fn number() -> Self {
        Self::of(ValueKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of(ValueKind::Boolean)
    }

    pub fn any() -> Self {
        Self::of(ValueKind::Any)
    }

    /// Missing and `null` values pass without running the other rules.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Numbers accept numeric strings and are written back as JSON numbers.
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = Some(message.into());
        self
    }

    pub fn min_length(mut self, length: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MinLength(length, message.into()));
        self
    }

    pub fn max_length(mut self, length: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MaxLength(length, message.into()));
        self
    }

    pub fn email(mut self, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Email(message.into()));
        self
    }

    pub fn pattern(mut self, pattern: Regex, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Pattern(pattern, message.into()));
        self
    }

    pub fn min(mut self, bound: impl Into<Decimal>, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Min(bound.into(), message.into()));
        self
    }

    pub fn max(mut self, bound: impl Into<Decimal>, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Max(bound.into(), message.into()));
        self
    }

    pub fn one_of(mut self, allowed: Vec<Value>, message: impl Into<String>) -> Self {
        self.rules.push(Rule::OneOf(allowed, message.into()));
        self
    }

    /// Checks `value` and returns the parsed value when it differs from the
    /// input (numeric coercion).
    fn check(
        &self,
        field: &str,
        value: Option<&Value>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Value> {
        let value = match value {
            None | Some(Value::Null) if self.optional => return None,
            None | Some(Value::Null) => {
                let message = self.required_message.as_deref().unwrap_or("Required");
                issues.push(ValidationIssue::new(field, message));
                return None;
            }
            Some(value) => value,
        };

        let (number, coerced) = match (self.kind, value) {
            (ValueKind::Any, _)
            | (ValueKind::String, Value::String(_))
            | (ValueKind::Boolean, Value::Bool(_)) => (None, None),
            (ValueKind::Number, Value::Number(number)) => match decimal_from_number(number) {
                Some(decimal) => (Some(decimal), None),
                None => {
                    issues.push(type_issue(field, self.kind, value));
                    return None;
                }
            },
            (ValueKind::Number, Value::String(text)) if self.coerce => {
                match Decimal::from_str(text.trim()) {
                    Ok(decimal) => (Some(decimal), decimal_to_value(decimal)),
                    Err(_) => {
                        issues.push(type_issue(field, self.kind, value));
                        return None;
                    }
                }
            }
            _ => {
                issues.push(type_issue(field, self.kind, value));
                return None;
            }
        };

        for rule in &self.rules {
            if let Some(message) = rule.violation(value, number) {
                issues.push(ValidationIssue::new(field, message));
            }
        }
        coerced
    }
}

impl Rule {
    fn violation<'a>(&'a self, value: &Value, number: Option<Decimal>) -> Option<&'a str> {
        let failed = match self {
            Rule::MinLength(length, _) => text_len(value).is_some_and(|len| len < *length),
            Rule::MaxLength(length, _) => text_len(value).is_some_and(|len| len > *length),
            Rule::Email(_) => value
                .as_str()
                .is_some_and(|text| !EMAIL_PATTERN.is_match(text)),
            Rule::Pattern(pattern, _) => value.as_str().is_some_and(|text| !pattern.is_match(text)),
            Rule::Min(bound, _) => number.is_some_and(|number| number < *bound),
            Rule::Max(bound, _) => number.is_some_and(|number| number > *bound),
            Rule::OneOf(allowed, _) => !allowed.contains(value),
        };
        failed.then_some(self.message())
    }

    fn message(&self) -> &str {
        match self {
            Rule::MinLength(_, message)
            | Rule::MaxLength(_, message)
            | Rule::Email(message)
            | Rule::Pattern(_, message)
            | Rule::Min(_, message)
            | Rule::Max(_, message)
            | Rule::OneOf(_, message) => message,
        }
    }
}

/// Rule-based validator over dot-delimited paths.
///
/// ```
/// use calmform::form::{FieldSchema, Schema};
///
/// let schema = Schema::new()
///     .field("name", FieldSchema::string().min_length(2, "Name must be at least 2 characters"))
///     .field("email", FieldSchema::string().email("Invalid email address"))
///     .field("company", FieldSchema::string().optional());
/// assert_eq!(schema.len(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSchema)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, path: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.push((path.into(), schema));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Synchronous form of `SchemaValidator::validate`.
    pub fn parse(&self, values: &Value, scope: Option<&str>) -> Result<Value, ValidationIssues> {
        let mut parsed = values.clone();
        let mut issues = Vec::new();
        for (field, schema) in &self.fields {
            if !scope.is_none_or(|scope| in_scope(field, scope)) {
                continue;
            }
            if let Some(coerced) = schema.check(field, path::get(values, field), &mut issues) {
                path::set(&mut parsed, field, coerced);
            }
        }
        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(ValidationIssues::new(issues))
        }
    }
}

impl SchemaValidator for Schema {
    fn validate<'a>(
        &'a self,
        values: &'a Value,
        path: Option<&'a str>,
    ) -> BoxedFormFuture<'a, Result<Value, ValidationIssues>> {
        Box::pin(std::future::ready(self.parse(values, path)))
    }
}

fn in_scope(field: &str, scope: &str) -> bool {
    field == scope
        || field
            .strip_prefix(scope)
            .is_some_and(|rest| rest.starts_with(path::DELIMITER))
}

fn text_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn type_issue(field: &str, expected: ValueKind, received: &Value) -> ValidationIssue {
    let received = match received {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    ValidationIssue::new(
        field,
        format!("Expected {}, received {received}", expected.name()),
    )
}

fn decimal_from_number(number: &Number) -> Option<Decimal> {
    if let Some(value) = number.as_i64() {
        return Some(Decimal::from(value));
    }
    if let Some(value) = number.as_u64() {
        return Some(Decimal::from(value));
    }
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn decimal_to_value(decimal: Decimal) -> Option<Value> {
    let normalized = decimal.normalize();
    if normalized.scale() == 0 {
        if let Some(value) = normalized.to_i64() {
            return Some(Value::from(value));
        }
    }
    normalized
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
