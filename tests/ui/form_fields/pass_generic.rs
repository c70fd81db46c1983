use calmform::form::{FieldType, FormFields};

#[allow(dead_code)]
#[derive(calmform::form::FormFields)]
#[form(rename_all = "camelCase")]
struct Wrapper<T: Clone> {
    display_name: String,
    #[form(name = "payload", label = "Payload", disabled)]
    inner: T,
}

fn main() {
    let fields = Wrapper::<u8>::field_definitions();
    assert_eq!(fields[0].name, "displayName");
    assert_eq!(fields[0].label.as_deref(), Some("Display name"));
    assert_eq!(fields[1].name, "payload");
    assert_eq!(fields[1].field_type, FieldType::Text);
    assert!(fields[1].disabled);
}
