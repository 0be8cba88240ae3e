//! Procedural macros for stagehand

use darling::{FromDeriveInput, FromVariant};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Property)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(property), supports(enum_any))]
struct PropertyOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<PropertyVariant, ()>,

    /// Name every variant in snake_case instead of PascalCase
    #[darling(default)]
    snake_case: bool,
}

/// Variant-level attributes
#[derive(Debug, FromVariant)]
#[darling(attributes(property))]
struct PropertyVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<()>,

    /// Explicit binding name
    #[darling(default)]
    rename: Option<String>,
}

/// Split a PascalCase string into parts
fn split_pascal_case(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for c in s.chars() {
        if c.is_uppercase() && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Convert PascalCase to snake_case
fn to_snake_case(s: &str) -> String {
    split_pascal_case(s)
        .iter()
        .map(|p| p.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Derive macro for the Property trait
///
/// Generates `name()` returning the variant name (or its `rename`) and an
/// inherent `all()` listing every variant in declaration order.
///
/// Only fieldless enums are supported.
///
/// # Attributes
///
/// - `#[property(snake_case)]` on the enum: names are `snake_case`
/// - `#[property(rename = "...")]` on a variant: explicit name
///
/// # Example
/// ```ignore
/// #[derive(Property, Clone, Copy, PartialEq, Eq, Debug)]
/// enum PanelProperty {
///     TroopName,
///     #[property(rename = "tier_text")]
///     Tier,
/// }
///
/// assert_eq!(PanelProperty::TroopName.name(), "TroopName");
/// assert_eq!(PanelProperty::Tier.name(), "tier_text");
/// assert_eq!(PanelProperty::all().len(), 2);
/// ```
#[proc_macro_derive(Property, attributes(property))]
pub fn derive_property(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match PropertyOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;

    if !opts.generics.params.is_empty() {
        return syn::Error::new_spanned(&opts.generics, "Property cannot be derived for generic enums")
            .to_compile_error()
            .into();
    }

    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        _ => {
            return syn::Error::new_spanned(&input, "Property can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    for variant in variants {
        if !variant.fields.is_unit() {
            return syn::Error::new_spanned(
                &variant.ident,
                "Property can only be derived for enums with unit variants",
            )
            .to_compile_error()
            .into();
        }
    }

    let variant_names: Vec<_> = variants.iter().map(|v| &v.ident).collect();
    let variant_strings: Vec<_> = variants
        .iter()
        .map(|v| match &v.rename {
            Some(rename) => rename.clone(),
            None if opts.snake_case => to_snake_case(&v.ident.to_string()),
            None => v.ident.to_string(),
        })
        .collect();

    let name_arms = variant_names
        .iter()
        .zip(variant_strings.iter())
        .map(|(v, s)| {
            quote! { #name::#v => #s }
        });

    let all_variants = variant_names.iter().map(|v| quote! { #name::#v });

    // Empty enums have no values to match on
    let name_body: proc_macro2::TokenStream = if variant_names.is_empty() {
        quote! { match *self {} }
    } else {
        quote! {
            match self {
                #(#name_arms),*
            }
        }
    };

    let expanded = quote! {
        impl stagehand::Property for #name {
            fn name(&self) -> &'static str {
                #name_body
            }
        }

        impl #name {
            /// Every property, in declaration order
            pub fn all() -> &'static [Self] {
                static ALL: &[#name] = &[#(#all_variants),*];
                ALL
            }
        }
    };

    TokenStream::from(expanded)
}
