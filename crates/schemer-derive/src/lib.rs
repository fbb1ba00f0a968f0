//! Derive macro for statically declared model schemas.
//!
//! This crate provides the `#[derive(Model)]` macro, which turns a struct's
//! fields into the property declarations `schemer` generates tables from.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, LitInt, LitStr,
    PathArguments, Type,
};

/// Derives `schemer::model::Model` for a struct.
///
/// # Attributes
///
/// - `#[model(type_name = "App.Models.User")]` - Type reference used for
///   foreign keys and default table naming (optional, defaults to the
///   struct name)
/// - `#[model(table = "people")]` - Explicit table name (optional)
///
/// # Field Attributes
///
/// - `#[field(type = "App.Models.Team")]` - Declared type, overriding the
///   one derived from the Rust type
/// - `#[field(name = "column_name")]` - Column name (optional, defaults to
///   the field name)
/// - `#[field(primary)]` - Part of the primary key
/// - `#[field(length = 190)]` - Column length
/// - `#[field(unsigned)]` - Unsigned integer
/// - `#[field(text)]` - Store as `text`
/// - `#[field(nullable)]` - Allow NULL
/// - `#[field(skip)]` - Not persisted
///
/// # Type Mapping
///
/// | Rust type | declared type |
/// |---|---|
/// | `String`, `&str` | `string` |
/// | `bool` | `bool` |
/// | `i8`..`i32`, `isize` | `int` |
/// | `i64`, `i128` | `bigint` |
/// | `f32` / `f64` | `float` / `double` |
/// | `NaiveDate` | `date` |
/// | `NaiveDateTime`, `DateTime<_>` | `DateTime` |
/// | `Duration`, `TimeDelta` | `DateInterval` |
///
/// Unsigned integers map like their signed width and add `unsigned`.
/// `Option<T>` declares `T` and adds `nullable`. Any other path declares its
/// last segment, so `author: User` becomes a foreign key to `User`.
#[proc_macro_derive(Model, attributes(model, field))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_model_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_model_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let model_attrs = parse_model_attrs(&input.attrs)?;
    let type_name = model_attrs
        .type_name
        .unwrap_or_else(|| struct_name.to_string());
    let table = match model_attrs.table {
        Some(table) => quote! { Some(#table) },
        None => quote! { None },
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model derive only supports structs",
            ));
        }
    };

    let mut descriptors: Vec<TokenStream2> = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = attrs.name.unwrap_or_else(|| ident.to_string());

        let mut modifiers: Vec<String> = Vec::new();
        let declared = match attrs.declared_type {
            Some(declared) => {
                if option_inner(&field.ty).is_some() {
                    modifiers.push("nullable".to_string());
                }
                declared
            }
            None => {
                let mapped = map_rust_type(&field.ty)?;
                modifiers.extend(mapped.modifiers.iter().map(|m| m.to_string()));
                mapped.declared
            }
        };
        if attrs.primary {
            modifiers.push("primary".to_string());
        }
        if let Some(length) = attrs.length {
            modifiers.push(format!("length={length}"));
        }
        if attrs.unsigned {
            modifiers.push("unsigned".to_string());
        }
        if attrs.text {
            modifiers.push("text".to_string());
        }
        if attrs.nullable && !modifiers.iter().any(|m| m == "nullable") {
            modifiers.push("nullable".to_string());
        }

        descriptors.push(quote! {
            ::schemer::reflect::FieldDescriptor::new(#name, #declared)
                #(.modifier(#modifiers))*
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::schemer::model::Model for #struct_name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const TABLE: Option<&'static str> = #table;

            fn fields() -> Vec<::schemer::reflect::FieldDescriptor> {
                vec![#(#descriptors),*]
            }
        }
    })
}

#[derive(Default)]
struct ModelAttrs {
    type_name: Option<String>,
    table: Option<String>,
}

#[derive(Default)]
struct FieldAttrs {
    declared_type: Option<String>,
    name: Option<String>,
    primary: bool,
    length: Option<u32>,
    unsigned: bool,
    text: bool,
    nullable: bool,
    skip: bool,
}

struct MappedType {
    declared: String,
    modifiers: Vec<&'static str>,
}

impl MappedType {
    fn new(declared: impl Into<String>) -> Self {
        Self {
            declared: declared.into(),
            modifiers: Vec::new(),
        }
    }

    fn with(mut self, modifier: &'static str) -> Self {
        if !self.modifiers.contains(&modifier) {
            self.modifiers.push(modifier);
        }
        self
    }
}

fn parse_model_attrs(attrs: &[Attribute]) -> syn::Result<ModelAttrs> {
    let mut result = ModelAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let value: LitStr = meta.value()?.parse()?;
                result.type_name = Some(value.value());
            } else if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                result.table = Some(value.value());
            } else {
                return Err(meta.error("unsupported model attribute"));
            }
            Ok(())
        })?;
    }
    Ok(result)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("field") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type") {
                let value: LitStr = meta.value()?.parse()?;
                result.declared_type = Some(value.value());
            } else if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                result.name = Some(value.value());
            } else if meta.path.is_ident("length") {
                let value: LitInt = meta.value()?.parse()?;
                result.length = Some(value.base10_parse()?);
            } else if meta.path.is_ident("primary") {
                result.primary = true;
            } else if meta.path.is_ident("unsigned") {
                result.unsigned = true;
            } else if meta.path.is_ident("text") {
                result.text = true;
            } else if meta.path.is_ident("nullable") {
                result.nullable = true;
            } else if meta.path.is_ident("skip") {
                result.skip = true;
            } else {
                return Err(meta.error("unsupported field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(result)
}

fn map_rust_type(ty: &Type) -> syn::Result<MappedType> {
    let path = match ty {
        Type::Reference(reference) => return map_rust_type(&reference.elem),
        Type::Group(group) => return map_rust_type(&group.elem),
        Type::Path(path) => &path.path,
        _ => {
            return Err(syn::Error::new_spanned(
                ty,
                "cannot derive a declared type, use #[field(type = \"...\")]",
            ));
        }
    };

    let Some(segment) = path.segments.last() else {
        return Err(syn::Error::new_spanned(ty, "empty type path"));
    };

    let ident = segment.ident.to_string();
    let mapped = match ident.as_str() {
        "Option" => {
            let Some(inner) = option_inner(ty) else {
                return Err(syn::Error::new_spanned(ty, "Option without a type argument"));
            };
            map_rust_type(inner)?.with("nullable")
        }
        "String" | "str" => MappedType::new("string"),
        "bool" => MappedType::new("bool"),
        "i8" | "i16" | "i32" | "isize" => MappedType::new("int"),
        "u8" | "u16" | "u32" | "usize" => MappedType::new("int").with("unsigned"),
        "i64" | "i128" => MappedType::new("bigint"),
        "u64" | "u128" => MappedType::new("bigint").with("unsigned"),
        "f32" => MappedType::new("float"),
        "f64" => MappedType::new("double"),
        "NaiveDate" => MappedType::new("date"),
        "NaiveDateTime" | "DateTime" => MappedType::new("DateTime"),
        "Duration" | "TimeDelta" => MappedType::new("DateInterval"),
        other => MappedType::new(other),
    };
    Ok(mapped)
}

/// Returns `T` when `ty` is `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn declared(ty: Type) -> (String, Vec<&'static str>) {
        let mapped = map_rust_type(&ty).unwrap();
        (mapped.declared, mapped.modifiers)
    }

    #[test]
    fn test_maps_primitives() {
        assert_eq!(declared(parse_quote!(String)), ("string".into(), vec![]));
        assert_eq!(declared(parse_quote!(&'static str)), ("string".into(), vec![]));
        assert_eq!(declared(parse_quote!(bool)), ("bool".into(), vec![]));
        assert_eq!(declared(parse_quote!(i32)), ("int".into(), vec![]));
        assert_eq!(declared(parse_quote!(u32)), ("int".into(), vec!["unsigned"]));
        assert_eq!(declared(parse_quote!(i64)), ("bigint".into(), vec![]));
        assert_eq!(declared(parse_quote!(u64)), ("bigint".into(), vec!["unsigned"]));
        assert_eq!(declared(parse_quote!(f32)), ("float".into(), vec![]));
        assert_eq!(declared(parse_quote!(f64)), ("double".into(), vec![]));
    }

    #[test]
    fn test_maps_option_to_nullable() {
        assert_eq!(
            declared(parse_quote!(Option<String>)),
            ("string".into(), vec!["nullable"])
        );
        assert_eq!(
            declared(parse_quote!(std::option::Option<u8>)),
            ("int".into(), vec!["unsigned", "nullable"])
        );
    }

    #[test]
    fn test_maps_chrono_and_model_types() {
        assert_eq!(
            declared(parse_quote!(chrono::NaiveDateTime)),
            ("DateTime".into(), vec![])
        );
        assert_eq!(
            declared(parse_quote!(DateTime<Utc>)),
            ("DateTime".into(), vec![])
        );
        assert_eq!(
            declared(parse_quote!(chrono::TimeDelta)),
            ("DateInterval".into(), vec![])
        );
        assert_eq!(declared(parse_quote!(crate::models::User)), ("User".into(), vec![]));
    }

    #[test]
    fn test_option_inner() {
        let ty: Type = parse_quote!(Option<i32>);
        assert!(option_inner(&ty).is_some());
        let ty: Type = parse_quote!(i32);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_type_override_keeps_option_nullable() {
        let input: DeriveInput = parse_quote! {
            struct Fixture {
                #[field(type = "App.Models.Team")]
                home: Option<i32>,
                #[field(type = "App.Models.Team", nullable)]
                away: Option<i32>,
            }
        };
        let tokens = derive_model_impl(input).unwrap().to_string();
        assert_eq!(tokens.matches("\"nullable\"").count(), 2);
    }

    #[test]
    fn test_rejects_tuples() {
        let ty: Type = parse_quote!((i32, i32));
        assert!(map_rust_type(&ty).is_err());
    }

    #[test]
    fn test_field_attrs() {
        let attrs: Vec<Attribute> = vec![
            parse_quote!(#[field(primary, length = 20)]),
            parse_quote!(#[field(type = "App.Models.Team", name = "team")]),
        ];
        let parsed = parse_field_attrs(&attrs).unwrap();
        assert!(parsed.primary);
        assert_eq!(parsed.length, Some(20));
        assert_eq!(parsed.declared_type.as_deref(), Some("App.Models.Team"));
        assert_eq!(parsed.name.as_deref(), Some("team"));
    }

    #[test]
    fn test_unknown_field_attr_is_error() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[field(indexed)])];
        assert!(parse_field_attrs(&attrs).is_err());
    }
}
