//! Procedural macros for the docmodel project.
//!
//! This crate provides `#[derive(Model)]`, which declares a model's fields in
//! attributes and implements `docmodel::schema::Model` with a schema built once, on
//! first use.
//!
//! Field declarations are checked against the field kinds' constraint sets while the
//! derive expands, so an unknown or ill-typed option is a compile error at the option
//! that caused it.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

use bson::{Bson, Document};
use docmodel_core::{error::ModelError, field::Field};
use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, DeriveInput, Error, Expr,
    ExprLit, Ident, Lit, LitStr, Meta, Token,
};

const FIELD_KINDS: &[&str] = &["string", "number", "list", "date", "boolean"];

struct FieldDecl {
    name: LitStr,
    kind: LitStr,
    options: Vec<(LitStr, Bson)>,
}

/// Derives `docmodel::schema::Model`.
///
/// ```ignore
/// #[derive(Model)]
/// #[model(collection = "people")]
/// #[field(first_name, string, size = 20, required)]
/// #[field(age, number, required)]
/// #[field(tags, list, item_type = "string")]
/// pub struct Person;
/// ```
///
/// Each `field` attribute names the field, then its kind, then its options. A bare
/// option such as `required` means `required = true`. Without `model(collection = ...)`
/// the collection name is derived from the type name.
///
/// Options outside a field kind's constraint set, ill-typed option values and duplicate
/// field names are rejected at compile time.
#[proc_macro_derive(Model, attributes(model, field))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Model cannot be derived for generic types",
        ));
    }

    let ident = &input.ident;
    let mut collection = None;
    let mut fields: Vec<FieldDecl> = Vec::new();

    for attr in &input.attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("collection") {
                    collection = Some(meta.value()?.parse::<LitStr>()?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported model attribute, expected `collection`"))
                }
            })?;
        } else if attr.path().is_ident("field") {
            let args = attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)?;
            let field = parse_field(attr.span(), args)?;

            if fields.iter().any(|declared| declared.name.value() == field.name.value()) {
                return Err(Error::new(
                    field.name.span(),
                    format!("field `{}` declared twice", field.name.value()),
                ));
            }

            fields.push(field);
        }
    }

    let collection = collection.map(|name| quote! { .collection_name(#name) });
    let fields = fields.iter().map(|FieldDecl { name, kind, options }| {
        let inserts = options.iter().map(|(key, value)| {
            let value = value_tokens(value);
            quote! { options.insert(#key, #value); }
        });

        quote! {
            .field(#name, ::docmodel::field::Field::of_kind(#kind, {
                #[allow(unused_mut)]
                let mut options = ::docmodel::bson::Document::new();
                #(#inserts)*
                options
            }))
        }
    });

    Ok(quote! {
        impl ::docmodel::schema::Model for #ident {
            fn schema() -> &'static ::docmodel::schema::Schema {
                static SCHEMA: ::std::sync::LazyLock<::docmodel::schema::Schema> =
                    ::std::sync::LazyLock::new(|| {
                        let schema = ::docmodel::schema::Schema::builder(stringify!(#ident))
                            #collection
                            #(#fields)*
                            .build();

                        // Every declaration was checked when the derive expanded.
                        match schema {
                            ::std::result::Result::Ok(schema) => schema,
                            ::std::result::Result::Err(err) => panic!("{}", err),
                        }
                    });

                &SCHEMA
            }
        }
    })
}

fn parse_field(span: Span, args: Punctuated<Meta, Token![,]>) -> syn::Result<FieldDecl> {
    let mut args = args.into_iter();

    let name = match args.next() {
        Some(Meta::Path(path)) => path
            .get_ident()
            .map(|ident| LitStr::new(&ident.to_string(), ident.span()))
            .ok_or_else(|| Error::new(path.span(), "expected a field name"))?,
        Some(other) => return Err(Error::new(other.span(), "expected a field name")),
        None => return Err(Error::new(span, "expected `field(name, kind, options...)`")),
    };

    if name.value().starts_with('_') {
        return Err(Error::new(
            name.span(),
            format!("invalid field name `{}`", name.value()),
        ));
    }

    let (kind, constraints) = match args.next() {
        Some(Meta::Path(path)) => {
            let ident = path
                .get_ident()
                .ok_or_else(|| Error::new(path.span(), "expected a field kind"))?;
            let kind = ident.to_string();

            let constraints = Field::constraints_for(&kind).ok_or_else(|| {
                Error::new(
                    ident.span(),
                    format!("unknown field kind `{kind}`, expected one of {}", FIELD_KINDS.join(", ")),
                )
            })?;

            (LitStr::new(&kind, ident.span()), constraints)
        }
        Some(other) => return Err(Error::new(other.span(), "expected a field kind")),
        None => return Err(Error::new(span, "missing field kind")),
    };

    let mut options: Vec<(LitStr, Bson)> = Vec::new();

    for meta in args {
        let (key, value) = parse_option(meta)?;
        let option = key.to_string();

        if !constraints.option_names().any(|allowed| allowed == option) {
            return Err(Error::new(
                key.span(),
                format!(
                    "`{option}` is not allowed for {} fields, expected one of {}",
                    constraints.kind(),
                    constraints.option_names().collect::<Vec<_>>().join(", "),
                ),
            ));
        }

        if options.iter().any(|(declared, _)| declared.value() == option) {
            return Err(Error::new(key.span(), format!("option `{option}` given twice")));
        }

        options.push((LitStr::new(&option, key.span()), value));
    }

    // Values are checked by the same constructor the generated schema calls.
    let document = options
        .iter()
        .map(|(key, value)| (key.value(), value.clone()))
        .collect::<Document>();

    match Field::of_kind(&kind.value(), document) {
        Ok(_) => {}
        Err(ModelError::Configuration(message)) => return Err(Error::new(span, message)),
        Err(other) => return Err(Error::new(span, other.to_string())),
    }

    Ok(FieldDecl { name, kind, options })
}

fn parse_option(meta: Meta) -> syn::Result<(Ident, Bson)> {
    match meta {
        Meta::Path(path) => {
            let ident = path
                .get_ident()
                .ok_or_else(|| Error::new(path.span(), "expected an option name"))?;

            Ok((ident.clone(), Bson::Boolean(true)))
        }
        Meta::NameValue(option) => {
            let ident = option
                .path
                .get_ident()
                .ok_or_else(|| Error::new(option.path.span(), "expected an option name"))?;

            let value = match &option.value {
                Expr::Lit(ExprLit { lit, .. }) => match lit {
                    Lit::Str(text) => Bson::String(text.value()),
                    Lit::Int(number) => Bson::Int64(number.base10_parse()?),
                    Lit::Float(number) => Bson::Double(number.base10_parse()?),
                    Lit::Bool(flag) => Bson::Boolean(flag.value),
                    other => {
                        return Err(Error::new(other.span(), "unsupported option literal"));
                    }
                },
                // `item_type = string` reads the same as `item_type = "string"`.
                Expr::Path(path) if path.path.get_ident().is_some() => Bson::String(
                    path.path.get_ident().map(ToString::to_string).unwrap_or_default(),
                ),
                other => {
                    return Err(Error::new(other.span(), "option values must be literals"));
                }
            };

            Ok((ident.clone(), value))
        }
        Meta::List(list) => Err(Error::new(list.span(), "unexpected nested option")),
    }
}

fn value_tokens(value: &Bson) -> TokenStream2 {
    match value {
        Bson::String(text) => quote! { #text },
        Bson::Int64(number) => quote! { #number },
        Bson::Double(number) => quote! { #number },
        Bson::Boolean(flag) => quote! { #flag },
        _ => quote! { ::docmodel::bson::Bson::Null },
    }
}
