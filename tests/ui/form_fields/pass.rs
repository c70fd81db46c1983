use calmform::form::{FieldType, FormFields};

#[allow(dead_code)]
#[derive(calmform::form::FormFields)]
struct SignupForm {
    #[form(kind = "email", auto_complete = "email")]
    email: String,
    #[form(kind = "password", helper_text = "At least 8 characters")]
    password: String,
    #[form(kind = "textarea", rows = 3, optional)]
    bio: String,
    newsletter: Option<bool>,
}

fn main() {
    let fields = SignupForm::field_definitions();
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[0].field_type, FieldType::Email);
    assert_eq!(fields[0].auto_complete.as_deref(), Some("email"));
    assert_eq!(fields[1].helper_text.as_deref(), Some("At least 8 characters"));
    assert_eq!(fields[2].rows, Some(3));
    assert!(!fields[2].required);
    assert_eq!(fields[3].field_type, FieldType::Checkbox);
    assert!(!fields[3].required);
}
