//! Parameter sources and transport-neutral request/response values.
//!
//! A [`ParamSource`] answers "what raw string(s) does this section carry
//! under this key". Host frameworks either implement it directly or build a
//! [`RawRequest`] from an `http::Request` via [`RawRequest::from_http`].

use crate::context::Context;
use crate::path::PathParams;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use http::StatusCode;
use std::collections::BTreeMap;
use std::fmt;
use typeroute_validate::Section;

/// Raw parameter lookup for the non-body sections.
pub trait ParamSource: Send + Sync {
    /// First raw value of `key` in `section`.
    fn lookup(&self, section: Section, key: &str) -> Option<String>;

    /// Every raw value of `key` in `section`, in request order.
    fn lookup_all(&self, section: Section, key: &str) -> Vec<String> {
        self.lookup(section, key).into_iter().collect()
    }
}

/// A map-backed parameter source for tests and simple hosts.
///
/// Header keys are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MapParams {
    values: BTreeMap<Section, Vec<(String, String)>>,
}

impl MapParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        section: Section,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(section, key, value);
        self
    }

    pub fn insert(&mut self, section: Section, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(section)
            .or_default()
            .push((key.into(), value.into()));
    }

    pub fn path(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Section::Path, key, value)
    }

    pub fn query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Section::Query, key, value)
    }

    pub fn header(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Section::Header, key, value)
    }

    pub fn cookie(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Section::Cookie, key, value)
    }
}

impl ParamSource for MapParams {
    fn lookup(&self, section: Section, key: &str) -> Option<String> {
        self.lookup_all(section, key).into_iter().next()
    }

    fn lookup_all(&self, section: Section, key: &str) -> Vec<String> {
        let Some(entries) = self.values.get(&section) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|(k, _)| match section {
                Section::Header => k.eq_ignore_ascii_case(key),
                _ => k == key,
            })
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// Parameters extracted from an `http` request head.
///
/// Query strings are decoded with `serde_urlencoded`, cookies are parsed
/// with the `cookie` crate and path parameters come from the host router
/// or [`PathTemplate::match_path`](crate::path::PathTemplate::match_path).
#[derive(Debug, Clone, Default)]
pub struct HttpParams {
    path: PathParams,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
}

impl HttpParams {
    pub fn new(path: PathParams, query: Option<&str>, headers: HeaderMap) -> Self {
        let query = match query {
            Some(q) => serde_urlencoded::from_str::<Vec<(String, String)>>(q).unwrap_or_else(|err| {
                tracing::debug!(error = %err, "ignoring malformed query string");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| {
                cookie::Cookie::split_parse(raw)
                    .filter_map(Result::ok)
                    .map(|c| (c.name().to_string(), c.value().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            path,
            query,
            headers,
            cookies,
        }
    }

    pub fn from_parts(parts: &http::request::Parts, path: PathParams) -> Self {
        Self::new(path, parts.uri.query(), parts.headers.clone())
    }
}

impl ParamSource for HttpParams {
    fn lookup(&self, section: Section, key: &str) -> Option<String> {
        match section {
            Section::Path => self.path.get(key).cloned(),
            Section::Header => self
                .headers
                .get(key)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            _ => self.lookup_all(section, key).into_iter().next(),
        }
    }

    fn lookup_all(&self, section: Section, key: &str) -> Vec<String> {
        let pairs = match section {
            Section::Body => return Vec::new(),
            Section::Path => return self.path.get(key).cloned().into_iter().collect(),
            Section::Header => {
                return self
                    .headers
                    .get_all(key)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_string)
                    .collect()
            }
            Section::Query => &self.query,
            Section::Cookie => &self.cookies,
        };
        pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// A transport-neutral request handed to a route adapter.
pub struct RawRequest {
    pub context: Context,
    pub params: Box<dyn ParamSource>,
    pub body: Bytes,
}

impl RawRequest {
    pub fn new(params: impl ParamSource + 'static, body: impl Into<Bytes>) -> Self {
        Self {
            context: Context::new(),
            params: Box::new(params),
            body: body.into(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Build from an `http` request with already-extracted path parameters.
    pub fn from_http(request: http::Request<Bytes>, path: PathParams) -> Self {
        let (parts, body) = request.into_parts();
        let params = HttpParams::from_parts(&parts, path);
        let mut context = Context::new();
        *context.extensions_mut() = parts.extensions;
        Self {
            context,
            params: Box::new(params),
            body,
        }
    }
}

impl fmt::Debug for RawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRequest")
            .field("context", &self.context)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// A transport-neutral response produced by a route adapter.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: StatusCode, body: Vec<u8>) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response.body = Bytes::from(body);
        response
    }

    /// Parse the body as JSON (`null` for an empty body).
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        if self.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    pub fn into_http(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_params_match_headers_case_insensitively() {
        let params = MapParams::new()
            .header("X-Token", "abc")
            .query("tag", "a")
            .query("tag", "b");
        assert_eq!(params.lookup(Section::Header, "x-token").as_deref(), Some("abc"));
        assert_eq!(params.lookup_all(Section::Query, "tag"), vec!["a", "b"]);
        assert!(params.lookup(Section::Query, "TAG").is_none());
        assert!(params.lookup(Section::Cookie, "tag").is_none());
    }

    #[test]
    fn http_params_read_every_section() {
        let request = http::Request::builder()
            .uri("/users/7?tag=a&tag=b%20c&limit=10")
            .header("X-Trace", "t-1")
            .header(COOKIE, "session=s3cr3t; theme=dark")
            .body(Bytes::new())
            .unwrap();
        let (parts, _) = request.into_parts();
        let path: PathParams = [("id".to_string(), "7".to_string())].into_iter().collect();
        let params = HttpParams::from_parts(&parts, path);

        assert_eq!(params.lookup(Section::Path, "id").as_deref(), Some("7"));
        assert_eq!(params.lookup_all(Section::Query, "tag"), vec!["a", "b c"]);
        assert_eq!(params.lookup(Section::Query, "limit").as_deref(), Some("10"));
        assert_eq!(params.lookup(Section::Header, "x-trace").as_deref(), Some("t-1"));
        assert_eq!(params.lookup(Section::Cookie, "theme").as_deref(), Some("dark"));
        assert!(params.lookup(Section::Body, "tag").is_none());
    }

    #[test]
    fn raw_response_round_trips_to_http() {
        let response = RawResponse::json(StatusCode::CREATED, br#"{"id":1}"#.to_vec());
        assert_eq!(response.body_json().unwrap()["id"], 1);

        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(http.headers()[CONTENT_TYPE], "application/json");
    }
}
