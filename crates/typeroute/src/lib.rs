//! # typeroute
//!
//! Declare typed request and response records once and get, from the same
//! declaration, runtime decoding and validation of incoming requests under
//! any HTTP framework and an OpenAPI 3.1 document describing them.
//!
//! ## Quick Start
//!
//! ```rust
//! use typeroute::prelude::*;
//!
//! #[derive(Debug, Deserialize, Describe)]
//! struct CreateUser {
//!     #[api(required, min_length = 1)]
//!     name: String,
//!     #[api(query, min = 0)]
//!     age: Option<i32>,
//! }
//!
//! #[derive(Serialize, Describe)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn create_user(_ctx: Context, req: CreateUser) -> Result<User> {
//!     Ok(User { id: 1, name: req.name })
//! }
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let router = TypedRouter::new();
//! let handler = router.post("/users", create_user)?;
//! assert_eq!(handler.route().path.as_str(), "/users");
//!
//! let docs = ApiDocs::new(OpenApiConfig::new("Users", "1.0.0"), &router);
//! assert!(docs.json().contains("CreateUser"));
//! # Ok(())
//! # }
//! ```
//!
//! The returned [`RouteHandler`] maps a [`RawRequest`] (or an
//! `http::Request<Bytes>`) to a [`RawResponse`]. Hooking it into a server
//! is up to the host framework.
//!
//! ## Optional Features
//!
//! - `openapi` (default) - schema compiler and OpenAPI document builder

extern crate self as typeroute;

// Re-export core functionality
pub use typeroute_core::*;

// Re-export macros
pub use typeroute_macros::*;

#[cfg(feature = "openapi")]
pub use typeroute_openapi as openapi;
#[cfg(feature = "openapi")]
pub use typeroute_openapi::{
    compile, ApiDocs, ComponentTable, OpenApiConfig, OpenApiDocument, Schema, SchemaCompiler,
};

/// Prelude module - import everything you need with `use typeroute::prelude::*`
pub mod prelude {
    pub use typeroute_core::{
        // Error handling
        ApiError,
        // Configuration
        Environment,
        RouterConfig,
        // Request context
        Context,
        // Introspection
        Describe,
        // Parameter sources
        HttpParams,
        MapParams,
        ParamSource,
        // Custom parsers
        ParseError,
        ParserRegistry,
        RawRequest,
        RawResponse,
        Result,
        // Router
        RouteHandler,
        RouteOptions,
        Section,
        TypedRouter,
        // Unions
        Union2,
        Union3,
        Union4,
    };

    pub use typeroute_macros::Describe;

    #[cfg(feature = "openapi")]
    pub use typeroute_openapi::{ApiDocs, OpenApiConfig};

    // Re-export commonly used external types
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, trace, warn};
}
