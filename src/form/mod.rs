mod binding;
mod controller;
mod errors;
mod fields;
mod observer;
mod schema;
mod submit;
mod validation;


pub use binding::FieldProps;
pub use calmform_derive::FormFields;
pub use controller::{
    BoxedFormFuture, FormConfig, FormController, FormError, FormId, FormResult, FormSnapshot,
    RevalidateMode, SubmissionState, SubmitState, Ticket, ValidationMode,
};
pub use errors::{ErrorNode, FieldError, FieldErrorKind, FieldErrors, FlatFieldError};
pub use fields::{FieldDefinition, FieldOption, FieldType, FormFields};
pub use observer::{FormListener, Subscription};
pub use schema::{FieldSchema, Schema, ValueKind};
pub use submit::{FormSubmitEvent, SubmitError, SubmitEvent, SubmitOutcome};
pub use validation::{SchemaValidator, ValidationIssue, ValidationIssues};
