//! Code generation for `#[derive(Describe)]`.

use crate::attrs::{Constraint, ContainerAttrs, FieldAttrs};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, GenericParam, Generics};

pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let container = ContainerAttrs::parse(&input.attrs)?;
    let ident = &input.ident;
    let generics = add_bounds(input.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let base = container.name.clone().unwrap_or_else(|| ident.to_string());
    let type_params: Vec<_> = input.generics.type_params().map(|p| &p.ident).collect();
    let type_name = if type_params.is_empty() {
        quote! { ::std::string::String::from(#base) }
    } else {
        quote! {
            let mut name = ::std::string::String::from(#base);
            #(
                name.push('_');
                name.push_str(&<#type_params as ::typeroute::Describe>::type_name());
            )*
            name
        }
    };

    let shape = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(_) => record_shape(&container, &data.fields)?,
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                if container.discriminator.is_some() {
                    return Err(syn::Error::new_spanned(
                        ident,
                        "only records with named fields can declare a discriminator",
                    ));
                }
                let inner = &fields.unnamed[0].ty;
                quote! { (*::typeroute::describe::<#inner>()).clone() }
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Describe supports tuple structs with exactly one field",
                ))
            }
            Fields::Unit => quote! { ::typeroute::TypeShape::Opaque },
        },
        Data::Enum(_) => {
            return Err(syn::Error::new_spanned(
                ident,
                "Describe cannot be derived for enums; use Union2, Union3 or Union4",
            ))
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(ident, "Describe cannot be derived for unions"))
        }
    };

    Ok(quote! {
        impl #impl_generics ::typeroute::Describe for #ident #ty_generics #where_clause {
            fn type_name() -> ::std::string::String {
                #type_name
            }

            fn shape() -> ::typeroute::TypeShape {
                #shape
            }
        }
    })
}

fn add_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(syn::parse_quote!(::typeroute::Describe));
        }
    }
    generics
}

fn record_shape(container: &ContainerAttrs, fields: &Fields) -> syn::Result<TokenStream> {
    let mut chain = TokenStream::new();
    if let Some((property, value)) = &container.discriminator {
        chain.extend(quote! { .discriminator(#property, #value) });
    }

    for field in fields {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(field_ident) = &field.ident else {
            continue;
        };
        if attrs.flatten {
            return Err(syn::Error::new_spanned(
                field_ident,
                "#[serde(flatten)] fields are not supported by Describe",
            ));
        }

        let raw = field_ident.to_string();
        let raw = raw.strip_prefix("r#").unwrap_or(&raw).to_string();
        let key = match (&attrs.rename, container.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => rule.apply(&raw),
            (None, None) => raw,
        };
        let name = attrs.name.clone().unwrap_or_else(|| key.clone());
        let ty = &field.ty;

        let mut spec = quote! { ::typeroute::FieldSpec::of::<#ty>(#name) };
        if name != key {
            spec.extend(quote! { .key(#key) });
        }
        if let Some(section) = &attrs.section {
            let variant = format_ident!("{}", capitalize(section));
            spec.extend(quote! { .section(::typeroute::Section::#variant) });
        }
        if !attrs.constraints.is_empty() {
            let rules = attrs.constraints.iter().map(constraint_tokens);
            spec.extend(quote! {
                .constraints(::typeroute::Constraints::new() #(#rules)*)
            });
        }
        if attrs.required {
            spec.extend(quote! { .required() });
        }
        if attrs.default || container.default {
            spec.extend(quote! { .defaulted() });
        }
        if attrs.write_only {
            spec.extend(quote! { .write_only() });
        }
        chain.extend(quote! { .field(#spec) });
    }

    Ok(quote! {
        ::typeroute::TypeShape::Record(::typeroute::RecordShape::new() #chain)
    })
}

fn constraint_tokens(constraint: &Constraint) -> TokenStream {
    match constraint {
        Constraint::Min(v) => quote! { .min(#v) },
        Constraint::Max(v) => quote! { .max(#v) },
        Constraint::MinLength(n) => quote! { .min_length(#n) },
        Constraint::MaxLength(n) => quote! { .max_length(#n) },
        Constraint::Pattern(p) => quote! { .pattern(#p) },
        Constraint::OneOf(values) => quote! { .one_of([#(#values),*]) },
        Constraint::Format(f) => quote! { .format(::typeroute::Format::parse(#f)) },
        Constraint::Rules(r) => quote! { .merge(::typeroute::Constraints::parse(#r)) },
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
