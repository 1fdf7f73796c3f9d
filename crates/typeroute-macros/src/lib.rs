//! Procedural macros for typeroute
//!
//! - `#[derive(Describe)]` - runtime shape of a request or response record
//!
//! # Attributes
//!
//! Container:
//!
//! - `#[api(name = "User")]` - component name (defaults to the type name)
//! - `#[api(discriminator = "kind", variant = "cat")]` - tag emitted and
//!   matched when the record is a union variant
//!
//! Field:
//!
//! - `#[api(body | path | query | header | cookie)]` or
//!   `#[api(section = "query")]` - where the field is read from (default `body`)
//! - `#[api(name = "X-Token")]` - external name, when it differs from the serde key
//! - `#[api(required)]`, `#[api(skip)]`
//! - `#[api(min = 0, max = 10, min_length = 1, max_length = 64, length = 8)]`
//! - `#[api(pattern = "^[a-z]+$", format = "email", one_of = ["a", "b"])]`
//! - `#[api(rules = "required,min=1")]` - compact rule string
//!
//! `#[serde(rename)]`, `#[serde(rename_all)]`, `#[serde(skip)]` and
//! `#[serde(default)]` are honoured. A `#[serde(skip_serializing)]` field is
//! still decoded and is documented as `writeOnly`.
//!
//! # Example
//!
//! ```rust,ignore
//! use typeroute::prelude::*;
//!
//! #[derive(Deserialize, Describe)]
//! struct CreateUser {
//!     #[api(required, min_length = 1)]
//!     name: String,
//!     #[api(query, min = 0)]
//!     age: Option<i32>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod describe;

#[proc_macro_derive(Describe, attributes(api))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    describe::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
