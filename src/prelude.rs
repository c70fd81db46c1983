pub use crate::form::{
    FieldDefinition, FieldProps, FieldSchema, FieldType, FormConfig, FormController, FormFields,
    FormResult, FormSubmitEvent, Schema, SchemaValidator, SubmitError, SubmitEvent,
    SubmitOutcome, ValidationIssue, ValidationIssues,
};
