//! Lazily built API document for a router.

use crate::config::OpenApiConfig;
use crate::document::OpenApiDocument;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use std::sync::OnceLock;
use typeroute_core::TypedRouter;

/// The API document of a router, built on first use.
///
/// Build it after every route is registered: concurrent first callers
/// share a single build and later registrations are not reflected.
#[derive(Debug)]
pub struct ApiDocs {
    config: OpenApiConfig,
    router: TypedRouter,
    document: OnceLock<OpenApiDocument>,
    json: OnceLock<String>,
}

impl ApiDocs {
    pub fn new(config: OpenApiConfig, router: &TypedRouter) -> Self {
        Self {
            config,
            router: router.clone(),
            document: OnceLock::new(),
            json: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &OpenApiConfig {
        &self.config
    }

    pub fn document(&self) -> &OpenApiDocument {
        self.document.get_or_init(|| {
            let routes = self.router.routes();
            tracing::debug!(routes = routes.len(), "building API document");
            OpenApiDocument::build(&self.config, &routes, self.router.parsers())
        })
    }

    /// Pretty-printed JSON of the document.
    pub fn json(&self) -> &str {
        self.json.get_or_init(|| {
            serde_json::to_string_pretty(self.document()).unwrap_or_else(|err| {
                tracing::error!(error = %err, "failed to serialize API document");
                String::from("{}")
            })
        })
    }

    /// The document as an `application/json` response.
    pub fn http_response(&self) -> Response<String> {
        let mut response = Response::new(self.json().to_string());
        *response.status_mut() = StatusCode::OK;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
