use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Field, Fields, GenericArgument, LitStr, PathArguments, Type,
    parse_macro_input,
};

#[proc_macro_derive(FormFields, attributes(form))]
pub fn derive_form_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

#[derive(Clone, Copy)]
enum RenameRule {
    None,
    CamelCase,
}

struct FieldAttrs {
    skip: bool,
    name: Option<String>,
    label: Option<String>,
    kind: Option<Ident>,
    required: Option<bool>,
    placeholder: Option<String>,
    helper_text: Option<String>,
    auto_complete: Option<String>,
    rows: Option<u32>,
    disabled: bool,
    options: Vec<(syn::Lit, String)>,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let model_ident = &input.ident;
    let named_fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.clone(),
            _ => {
                return Err(syn::Error::new(
                    Span::call_site(),
                    "FormFields derive requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                Span::call_site(),
                "FormFields derive is only supported on structs",
            ));
        }
    };

    let rename = container_rename(&input.attrs)?;
    let calmform = calmform_path();
    let mut definitions = Vec::new();

    for field in &named_fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let attrs = field_attrs(field)?;
        if attrs.skip {
            continue;
        }

        let rust_name = field_ident.to_string();
        let rust_name = rust_name.trim_start_matches("r#");
        let name = attrs
            .name
            .clone()
            .unwrap_or_else(|| apply_rename(rename, rust_name));
        let label = attrs.label.clone().unwrap_or_else(|| humanize(rust_name));
        let (inner_ty, is_option) = unwrap_option(&field.ty);
        let kind = attrs
            .kind
            .clone()
            .unwrap_or_else(|| format_ident!("{}", infer_kind(inner_ty)));
        let required = attrs.required.unwrap_or(!is_option);
        let disabled = attrs.disabled;

        let placeholder = attrs.placeholder.iter();
        let helper_text = attrs.helper_text.iter();
        let auto_complete = attrs.auto_complete.iter();
        let rows = attrs.rows.iter();
        let option_values = attrs.options.iter().map(|(value, _)| value);
        let option_labels = attrs.options.iter().map(|(_, label)| label);

        definitions.push(quote! {
            #calmform::form::FieldDefinition::new(#name, #calmform::form::FieldType::#kind)
                .label(#label)
                .required(#required)
                .disabled(#disabled)
                #(.placeholder(#placeholder))*
                #(.helper_text(#helper_text))*
                #(.auto_complete(#auto_complete))*
                #(.rows(#rows))*
                #(.option(#option_values, #option_labels))*
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics #calmform::form::FormFields for #model_ident #ty_generics #where_clause {
            fn field_definitions() -> ::std::vec::Vec<#calmform::form::FieldDefinition> {
                ::std::vec![#(#definitions),*]
            }
        }
    })
}

fn container_rename(attrs: &[Attribute]) -> syn::Result<RenameRule> {
    let mut rule = RenameRule::None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("form")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let value: LitStr = meta.value()?.parse()?;
                rule = match value.value().as_str() {
                    "camelCase" => RenameRule::CamelCase,
                    "snake_case" => RenameRule::None,
                    _ => {
                        return Err(syn::Error::new_spanned(
                            value,
                            "supported rename_all values are \"camelCase\" and \"snake_case\"",
                        ));
                    }
                };
                Ok(())
            } else {
                Err(meta.error("unsupported container attribute"))
            }
        })?;
    }
    Ok(rule)
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        skip: false,
        name: None,
        label: None,
        kind: None,
        required: None,
        placeholder: None,
        helper_text: None,
        auto_complete: None,
        rows: None,
        disabled: false,
        options: Vec::new(),
    };

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("form")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("required") {
                attrs.required = Some(true);
            } else if meta.path.is_ident("optional") {
                attrs.required = Some(false);
            } else if meta.path.is_ident("disabled") {
                attrs.disabled = true;
            } else if meta.path.is_ident("name") {
                attrs.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("label") {
                attrs.label = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("placeholder") {
                attrs.placeholder = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("helper_text") {
                attrs.helper_text = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("auto_complete") {
                attrs.auto_complete = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rows") {
                attrs.rows = Some(meta.value()?.parse::<syn::LitInt>()?.base10_parse()?);
            } else if meta.path.is_ident("kind") {
                let value: LitStr = meta.value()?.parse()?;
                let Some(variant) = kind_variant(&value.value()) else {
                    return Err(syn::Error::new_spanned(value, "unknown field kind"));
                };
                attrs.kind = Some(format_ident!("{variant}"));
            } else if meta.path.is_ident("option") {
                let mut value = None;
                let mut label = None;
                meta.parse_nested_meta(|option| {
                    if option.path.is_ident("value") {
                        value = Some(option.value()?.parse::<syn::Lit>()?);
                        Ok(())
                    } else if option.path.is_ident("label") {
                        label = Some(option.value()?.parse::<LitStr>()?.value());
                        Ok(())
                    } else {
                        Err(option.error("expected `value` or `label`"))
                    }
                })?;
                let Some(value) = value else {
                    return Err(meta.error("option requires a `value`"));
                };
                let label = label.unwrap_or_else(|| lit_text(&value));
                attrs.options.push((value, label));
            } else {
                return Err(meta.error("unsupported form attribute"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn kind_variant(kind: &str) -> Option<&'static str> {
    Some(match kind {
        "text" => "Text",
        "email" => "Email",
        "password" => "Password",
        "number" => "Number",
        "tel" => "Tel",
        "url" => "Url",
        "textarea" => "Textarea",
        "select" => "Select",
        "checkbox" => "Checkbox",
        "radio" => "Radio",
        "date" => "Date",
        "time" => "Time",
        "datetime-local" => "DatetimeLocal",
        "file" => "File",
        "hidden" => "Hidden",
        _ => return None,
    })
}

fn infer_kind(ty: &Type) -> &'static str {
    let Type::Path(path) = ty else {
        return "Text";
    };
    let Some(last) = path.path.segments.last() else {
        return "Text";
    };
    match last.ident.to_string().as_str() {
        "bool" => "Checkbox",
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" | "f32" | "f64" | "Decimal" => "Number",
        _ => "Text",
    }
}

fn unwrap_option(ty: &Type) -> (&Type, bool) {
    let Type::Path(path) = ty else {
        return (ty, false);
    };
    let Some(last) = path.path.segments.last() else {
        return (ty, false);
    };
    if last.ident != "Option" {
        return (ty, false);
    }
    match &last.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) => (inner, true),
            _ => (ty, false),
        },
        _ => (ty, false),
    }
}

fn lit_text(lit: &syn::Lit) -> String {
    match lit {
        syn::Lit::Str(value) => value.value(),
        syn::Lit::Int(value) => value.base10_digits().to_string(),
        syn::Lit::Float(value) => value.base10_digits().to_string(),
        syn::Lit::Bool(value) => value.value.to_string(),
        _ => String::new(),
    }
}

fn apply_rename(rule: RenameRule, name: &str) -> String {
    match rule {
        RenameRule::None => name.to_string(),
        RenameRule::CamelCase => {
            let mut out = String::new();
            for (index, segment) in name.split('_').filter(|s| !s.is_empty()).enumerate() {
                if index == 0 {
                    out.push_str(segment);
                    continue;
                }
                let mut chars = segment.chars();
                if let Some(first) = chars.next() {
                    out.push(first.to_ascii_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            out
        }
    }
}

/// `first_name` -> `First name`.
fn humanize(name: &str) -> String {
    let words = name
        .split('_')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn calmform_path() -> TokenStream2 {
    match crate_name("calmform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::calmform),
    }
}
