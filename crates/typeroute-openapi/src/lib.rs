//! OpenAPI documentation for typeroute
//!
//! This crate compiles the described request and response types of a
//! router into JSON Schema 2020-12 components and assembles an OpenAPI
//! 3.1 document from the registered routes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use typeroute::prelude::*;
//!
//! let router = TypedRouter::new();
//! router.post("/users", create_user)?;
//!
//! let docs = ApiDocs::new(OpenApiConfig::new("Users", "1.0.0"), &router);
//! println!("{}", docs.json());
//! ```

mod compiler;
mod config;
mod docs;
mod document;
mod schema;

pub use compiler::{compile, ComponentTable, SchemaCompiler};
pub use config::OpenApiConfig;
pub use docs::ApiDocs;
pub use document::{
    ApiInfo, Components, Header, MediaType, OpenApiDocument, Operation, Parameter, PathItem,
    RequestBody, Response,
};
pub use schema::{Discriminator, Schema, TypeArray, COMPONENT_PREFIX};
