//! Form state controller: values, field errors, schema validation and the
//! submission lifecycle of one form, exposed as an observable store.

pub mod form;
pub mod path;
pub mod prelude;
