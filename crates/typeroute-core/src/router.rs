//! Route registry and the transport-agnostic typed router.
//!
//! Handlers are registered against a method and a path template. The
//! router records a [`RouteInfo`] and hands back a [`RouteHandler`], an
//! adapter from [`RawRequest`] to [`RawResponse`] that runs the
//! decode/validate pipeline around the handler. Wiring the adapter into an
//! HTTP server is left to the host framework.
//!
//! # Example
//!
//! ```rust
//! use typeroute_core::{ApiError, Context, MapParams, RawRequest, RouteOptions, TypedRouter};
//!
//! # tokio_test_block(async {
//! let router = TypedRouter::new();
//! let api = router.group("/api");
//! let ping = api
//!     .get("/ping", |_ctx: Context, _req: ()| async { Ok::<_, ApiError>("pong".to_string()) })
//!     .unwrap();
//!
//! let response = ping.call(RawRequest::new(MapParams::new(), "")).await;
//! assert_eq!(response.body_json().unwrap(), "pong");
//! assert_eq!(router.routes()[0].path.as_str(), "/api/ping");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use crate::config::RouterConfig;
use crate::context::Context;
use crate::error::{ApiError, PipelineError, RegistrationError};
use crate::params::{RawRequest, RawResponse};
use crate::parser::ParserRegistry;
use crate::path::{join_prefix, normalize_prefix, PathParams, PathTemplate};
use crate::pipeline::{self, Stage};
use crate::shape::{Describe, TypeRef};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::Instrument;

/// Metadata of a registered route. Immutable once registered.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub method: Method,
    /// Full path template, group prefixes included
    pub path: PathTemplate,
    /// Type name of the handler function
    pub handler: &'static str,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub request: TypeRef,
    pub response: TypeRef,
}

/// Per-route documentation options.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub deprecated: bool,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// Ordered, duplicate-free collection of routes.
///
/// A (method, path) pair that was registered twice is poisoned: the
/// earlier route is withdrawn and every further registration fails.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    routes: Vec<Arc<RouteInfo>>,
    conflicts: HashSet<(Method, String)>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, route: RouteInfo) -> Result<Arc<RouteInfo>, RegistrationError> {
        let key = (route.method.clone(), route.path.normalized());
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let existing = state
            .routes
            .iter()
            .position(|r| r.method == key.0 && r.path.normalized() == key.1);
        if let Some(index) = existing {
            let removed = state.routes.remove(index);
            state.conflicts.insert(key);
            return Err(RegistrationError::DuplicateRoute {
                method: route.method,
                path: route.path.to_string(),
                existing: removed.path.to_string(),
            });
        }
        if state.conflicts.contains(&key) {
            return Err(RegistrationError::DuplicateRoute {
                method: route.method,
                path: route.path.to_string(),
                existing: key.1,
            });
        }

        let route = Arc::new(route);
        state.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Routes in registration order.
    pub fn routes(&self) -> Vec<Arc<RouteInfo>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type BoxedAdapter = Arc<dyn Fn(RawRequest) -> BoxFuture<'static, RawResponse> + Send + Sync>;

/// Transport-agnostic adapter for one route.
#[derive(Clone)]
pub struct RouteHandler {
    route: Arc<RouteInfo>,
    adapter: BoxedAdapter,
}

impl RouteHandler {
    pub fn route(&self) -> &RouteInfo {
        &self.route
    }

    /// Run the pipeline for one request.
    pub fn call(&self, request: RawRequest) -> BoxFuture<'static, RawResponse> {
        (self.adapter)(request)
    }

    /// Run the pipeline for an `http` request, extracting path parameters
    /// with the route's own template.
    pub async fn call_http(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
        let path = self
            .route
            .path
            .match_path(request.uri().path())
            .unwrap_or_else(PathParams::new);
        self.call(RawRequest::from_http(request, path)).await.into_http()
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandler")
            .field("method", &self.route.method)
            .field("path", &self.route.path.as_str())
            .finish_non_exhaustive()
    }
}

/// The typed router shim.
///
/// Cloning is cheap; groups share the registry, parsers and configuration
/// of the router they were created from.
#[derive(Debug, Clone)]
pub struct TypedRouter {
    registry: Arc<RouteRegistry>,
    parsers: Arc<ParserRegistry>,
    config: Arc<RouterConfig>,
    prefix: String,
    tags: Vec<String>,
}

impl Default for TypedRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedRouter {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RouteRegistry::new()),
            parsers: Arc::new(ParserRegistry::new()),
            config: Arc::new(RouterConfig::default()),
            prefix: String::new(),
            tags: Vec::new(),
        }
    }

    /// Freeze a parser registry into the router. Call before registering routes.
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = Arc::new(parsers);
        self
    }

    /// Replace the configuration. Call before registering routes.
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Routes registered through this router or any of its groups, in order.
    pub fn routes(&self) -> Vec<Arc<RouteInfo>> {
        self.registry.routes()
    }

    /// A router sharing this registry with `prefix` prepended to every path.
    pub fn group(&self, prefix: &str) -> TypedRouter {
        TypedRouter {
            registry: Arc::clone(&self.registry),
            parsers: Arc::clone(&self.parsers),
            config: Arc::clone(&self.config),
            prefix: join_prefix(&self.prefix, &normalize_prefix(prefix)),
            tags: self.tags.clone(),
        }
    }

    /// Default tags applied to routes registered through this router.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Register a handler and return its adapter.
    pub fn register<Req, Resp, E, H, Fut>(
        &self,
        method: Method,
        path: &str,
        handler: H,
        options: RouteOptions,
    ) -> Result<RouteHandler, RegistrationError>
    where
        H: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: DeserializeOwned + Describe + Send + 'static,
        Resp: Serialize + Describe + Send + 'static,
        E: Into<ApiError> + 'static,
    {
        let full_path = if self.prefix.is_empty() {
            path.to_string()
        } else {
            join_prefix(&self.prefix, path)
        };
        let template = PathTemplate::parse(&full_path)?;

        let handler_name = std::any::type_name::<H>();
        let mut tags = self.tags.clone();
        tags.extend(options.tags);
        let info = RouteInfo {
            operation_id: options
                .operation_id
                .unwrap_or_else(|| default_operation_id(&method, &template)),
            method,
            path: template,
            handler: handler_name,
            tags,
            summary: options.summary,
            description: options.description,
            deprecated: options.deprecated,
            request: TypeRef::of::<Req>(),
            response: TypeRef::of::<Resp>(),
        };

        let route = self.registry.insert(info).map_err(|err| {
            tracing::error!(error = %err, "route registration failed");
            err
        })?;
        tracing::debug!(
            method = %route.method,
            path = %route.path,
            handler = handler_name,
            "registered route"
        );

        let handler = Arc::new(handler);
        let parsers = Arc::clone(&self.parsers);
        let config = Arc::clone(&self.config);
        let meta = Arc::clone(&route);
        let adapter: BoxedAdapter = Arc::new(move |request: RawRequest| {
            let handler = Arc::clone(&handler);
            let parsers = Arc::clone(&parsers);
            let config = Arc::clone(&config);
            let meta = Arc::clone(&meta);
            Box::pin(async move { run(&*handler, request, &meta, &parsers, &config).await })
        });

        Ok(RouteHandler { route, adapter })
    }

    pub fn get<Req, Resp, E, H, Fut>(
        &self,
        path: &str,
        handler: H,
    ) -> Result<RouteHandler, RegistrationError>
    where
        H: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: DeserializeOwned + Describe + Send + 'static,
        Resp: Serialize + Describe + Send + 'static,
        E: Into<ApiError> + 'static,
    {
        self.register(Method::GET, path, handler, RouteOptions::default())
    }

    pub fn post<Req, Resp, E, H, Fut>(
        &self,
        path: &str,
        handler: H,
    ) -> Result<RouteHandler, RegistrationError>
    where
        H: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: DeserializeOwned + Describe + Send + 'static,
        Resp: Serialize + Describe + Send + 'static,
        E: Into<ApiError> + 'static,
    {
        self.register(Method::POST, path, handler, RouteOptions::default())
    }

    pub fn put<Req, Resp, E, H, Fut>(
        &self,
        path: &str,
        handler: H,
    ) -> Result<RouteHandler, RegistrationError>
    where
        H: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: DeserializeOwned + Describe + Send + 'static,
        Resp: Serialize + Describe + Send + 'static,
        E: Into<ApiError> + 'static,
    {
        self.register(Method::PUT, path, handler, RouteOptions::default())
    }

    pub fn patch<Req, Resp, E, H, Fut>(
        &self,
        path: &str,
        handler: H,
    ) -> Result<RouteHandler, RegistrationError>
    where
        H: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: DeserializeOwned + Describe + Send + 'static,
        Resp: Serialize + Describe + Send + 'static,
        E: Into<ApiError> + 'static,
    {
        self.register(Method::PATCH, path, handler, RouteOptions::default())
    }

    pub fn delete<Req, Resp, E, H, Fut>(
        &self,
        path: &str,
        handler: H,
    ) -> Result<RouteHandler, RegistrationError>
    where
        H: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Req: DeserializeOwned + Describe + Send + 'static,
        Resp: Serialize + Describe + Send + 'static,
        E: Into<ApiError> + 'static,
    {
        self.register(Method::DELETE, path, handler, RouteOptions::default())
    }
}

/// `get_users_id` style identifier for routes without an explicit one.
fn default_operation_id(method: &Method, template: &PathTemplate) -> String {
    let mut id = method.as_str().to_ascii_lowercase();
    for segment in template.as_str().split('/').filter(|s| !s.is_empty()) {
        let cleaned: String = segment
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let cleaned = cleaned.trim_matches('_');
        if cleaned.is_empty() {
            id.push_str("_all");
        } else {
            id.push('_');
            id.push_str(cleaned);
        }
    }
    id
}

/// One full pipeline run, with the error mapped to a response.
async fn run<Req, Resp, E, H, Fut>(
    handler: &H,
    request: RawRequest,
    route: &RouteInfo,
    parsers: &ParserRegistry,
    config: &RouterConfig,
) -> RawResponse
where
    H: Fn(Context, Req) -> Fut,
    Fut: Future<Output = Result<Resp, E>>,
    Req: DeserializeOwned + Describe,
    Resp: Serialize + Describe,
    E: Into<ApiError>,
{
    let request_id = request.context.request_id();
    let span = tracing::info_span!(
        "route",
        method = %route.method,
        path = %route.path,
        request_id = %request_id,
    );

    async move {
        tracing::debug!(stage = %Stage::Start, "pipeline stage");
        let outcome = process(handler, request, parsers, config).await;
        match outcome {
            Ok(response) => {
                tracing::debug!(stage = %Stage::Done, status = %response.status, "pipeline stage");
                response
            }
            Err(err) => {
                pipeline::report(&err);
                error_response(err, config, request_id)
            }
        }
    }
    .instrument(span)
    .await
}

async fn process<Req, Resp, E, H, Fut>(
    handler: &H,
    request: RawRequest,
    parsers: &ParserRegistry,
    config: &RouterConfig,
) -> Result<RawResponse, PipelineError>
where
    H: Fn(Context, Req) -> Fut,
    Fut: Future<Output = Result<Resp, E>>,
    Req: DeserializeOwned + Describe,
    Resp: Serialize + Describe,
    E: Into<ApiError>,
{
    let RawRequest { context, params, body } = request;
    if body.len() > config.max_body_size {
        return Err(PipelineError::PayloadTooLarge {
            size: body.len(),
            limit: config.max_body_size,
        });
    }
    pipeline::guard(async move {
        let decoded = pipeline::decode::<Req>(&context, params.as_ref(), &body, parsers)
            .map_err(PipelineError::Validation)?;
        pipeline::invoke(handler, context, decoded).await
    })
    .await
}

fn error_response(
    err: PipelineError,
    config: &RouterConfig,
    request_id: uuid::Uuid,
) -> RawResponse {
    let api_error = err.into_api_error(config.validation_status);
    let body = api_error.to_body(&config.environment, Some(request_id));
    let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| {
        br#"{"error":{"type":"internal_error","message":"Internal server error"}}"#.to_vec()
    });
    RawResponse::json(api_error.status, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MapParams;
    use http::StatusCode;

    async fn ok(_: Context, _: ()) -> Result<(), ApiError> {
        Ok(())
    }

    #[test]
    fn routes_keep_registration_order() {
        let router = TypedRouter::new();
        router.get("/b", ok).unwrap();
        router.post("/a", ok).unwrap();
        router.delete("/a/{id}", ok).unwrap();

        let routes: Vec<_> = router
            .routes()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(routes, vec!["GET /b", "POST /a", "DELETE /a/{id}"]);
    }

    #[test]
    fn duplicates_withdraw_both_routes() {
        let router = TypedRouter::new();
        router.get("/users/{id}", ok).unwrap();
        router.get("/health", ok).unwrap();

        let err = router.get("/users/{user_id}", ok).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRoute { .. }));
        assert!(router.get("/users/{other}", ok).is_err());

        let paths: Vec<_> = router.routes().iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["/health"]);

        // Same path, different method is not a conflict.
        router.post("/users/{id}", ok).unwrap();
    }

    #[test]
    fn malformed_templates_are_rejected() {
        let router = TypedRouter::new();
        assert!(matches!(
            router.get("/files/*/x", ok),
            Err(RegistrationError::InvalidPath(_))
        ));
        assert!(router.routes().is_empty());
    }

    #[test]
    fn groups_share_the_registry_and_copy_tags() {
        let router = TypedRouter::new().tag("root");
        let admin = router.group("/admin").tag("admin");
        let users = admin.group("users/");
        users
            .register(
                Method::GET,
                "/{id}",
                ok,
                RouteOptions::new().tag("users").summary("Get user"),
            )
            .unwrap();
        router.get("/", ok).unwrap();

        let routes = router.routes();
        assert_eq!(routes[0].path.as_str(), "/admin/users/{id}");
        assert_eq!(routes[0].tags, vec!["root", "admin", "users"]);
        assert_eq!(routes[0].summary.as_deref(), Some("Get user"));
        assert_eq!(routes[1].tags, vec!["root"]);
        assert_eq!(routes[0].operation_id, "get_admin_users_id");
    }

    #[test]
    fn wildcard_is_preserved_in_metadata() {
        let router = TypedRouter::new();
        router.get("/static/*", ok).unwrap();
        let route = &router.routes()[0];
        assert!(route.path.has_wildcard());
        assert_eq!(route.path.as_str(), "/static/*");
        assert_eq!(route.operation_id, "get_static_all");
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected_before_decoding() {
        let router = TypedRouter::new().with_config(RouterConfig::new().max_body_size(4));
        let handler = router.post("/upload", ok).unwrap();
        let response = handler.call(RawRequest::new(MapParams::new(), "123456")).await;
        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.body_json().unwrap()["error"]["type"], "payload_too_large");
    }

    #[tokio::test]
    async fn call_http_extracts_path_params() {
        let router = TypedRouter::new();
        let echo = router
            .get("/echo/{word}/*", |_: Context, req: Echo| async move {
                Ok::<_, ApiError>(format!("{}:{}", req.word, req.rest))
            })
            .unwrap();

        let request = http::Request::builder()
            .uri("/echo/hi/a/b")
            .body(Bytes::new())
            .unwrap();
        let response = echo.call_http(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), br#""hi:a/b""#);
    }

    #[derive(serde::Deserialize)]
    struct Echo {
        word: String,
        rest: String,
    }

    impl Describe for Echo {
        fn type_name() -> String {
            "Echo".into()
        }

        fn shape() -> crate::shape::TypeShape {
            use crate::shape::{FieldSpec, RecordShape};
            use typeroute_validate::Section;
            crate::shape::TypeShape::Record(
                RecordShape::new()
                    .field(FieldSpec::of::<String>("word").section(Section::Path))
                    .field(FieldSpec::of::<String>("*").key("rest").section(Section::Path)),
            )
        }
    }
}
