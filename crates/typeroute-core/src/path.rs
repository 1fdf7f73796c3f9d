//! Route path templates.
//!
//! Templates use `{name}` placeholders occupying whole segments and may end
//! with a single catch-all `/*` segment:
//!
//! ```rust
//! use typeroute_core::path::PathTemplate;
//!
//! let template = PathTemplate::parse("/files/{bucket}/*").unwrap();
//! let params = template.match_path("/files/media/a/b.png").unwrap();
//! assert_eq!(params.get("bucket").map(String::as_str), Some("media"));
//! assert_eq!(params.get("*").map(String::as_str), Some("a/b.png"));
//!
//! assert!(PathTemplate::parse("/users/{id}/{id}").is_err());
//! assert!(PathTemplate::parse("/files/*/meta").is_err());
//! ```

use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Key under which a trailing wildcard capture is stored.
pub const WILDCARD_KEY: &str = "*";

/// Maximum number of path parameters to store on the stack.
pub const STACK_PARAMS_CAPACITY: usize = 4;

/// Result of path validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathValidationError {
    #[error("route path must start with '/', got: \"{path}\"")]
    MustStartWithSlash { path: String },
    #[error("route path contains empty segment (double slash): \"{path}\"")]
    EmptySegment { path: String },
    #[error("nested braces are not allowed in route path at position {position}: \"{path}\"")]
    NestedBraces { path: String, position: usize },
    #[error("unmatched closing brace '}}' at position {position} in route path: \"{path}\"")]
    UnmatchedClosingBrace { path: String, position: usize },
    #[error("empty parameter name '{{}}' at position {position} in route path: \"{path}\"")]
    EmptyParameterName { path: String, position: usize },
    #[error(
        "invalid parameter name '{{{param_name}}}' at position {position} - parameter names \
         must contain only alphanumeric characters and underscores: \"{path}\""
    )]
    InvalidParameterName {
        path: String,
        param_name: String,
        position: usize,
    },
    #[error(
        "parameter name '{{{param_name}}}' cannot start with a digit \
         at position {position}: \"{path}\""
    )]
    ParameterStartsWithDigit {
        path: String,
        param_name: String,
        position: usize,
    },
    #[error("unclosed brace '{{' in route path (missing closing '}}'): \"{path}\"")]
    UnclosedBrace { path: String },
    #[error("invalid character '{character}' at position {position} in route path: \"{path}\"")]
    InvalidCharacter {
        path: String,
        character: char,
        position: usize,
    },
    #[error("parameter must span a whole segment at position {position} in route path: \"{path}\"")]
    PartialSegmentParameter { path: String, position: usize },
    #[error("duplicate parameter name '{{{param_name}}}' in route path: \"{path}\"")]
    DuplicateParameter { path: String, param_name: String },
    #[error("wildcard '*' is only allowed as the final segment at position {position}: \"{path}\"")]
    MisplacedWildcard { path: String, position: usize },
}

/// Validate route path syntax
///
/// Returns Ok(()) if the path is valid, or Err with a descriptive error.
///
/// # Valid paths
/// - Must start with '/'
/// - Can contain alphanumeric characters, '-', '_', '.', '/'
/// - Can contain whole-segment parameters `{param_name}` with unique names
/// - Can end with a single `/*` wildcard segment
///
/// ```
/// use typeroute_core::path::validate_path;
///
/// assert!(validate_path("/").is_ok());
/// assert!(validate_path("/users/{user_id}/posts/{post_id}").is_ok());
/// assert!(validate_path("/static/*").is_ok());
///
/// assert!(validate_path("users").is_err()); // Missing leading /
/// assert!(validate_path("/users//posts").is_err()); // Double slash
/// assert!(validate_path("/users/{").is_err()); // Unclosed brace
/// assert!(validate_path("/users/{}").is_err()); // Empty parameter
/// assert!(validate_path("/users/{123}").is_err()); // Parameter starts with digit
/// assert!(validate_path("/users/id-{id}").is_err()); // Partial segment
/// ```
pub fn validate_path(path: &str) -> Result<(), PathValidationError> {
    PathTemplate::parse(path).map(|_| ())
}

/// Check if a path is valid (convenience function)
pub fn is_valid_path(path: &str) -> bool {
    validate_path(path).is_ok()
}

fn check_syntax(path: &str) -> Result<(), PathValidationError> {
    if !path.starts_with('/') {
        return Err(PathValidationError::MustStartWithSlash {
            path: path.to_string(),
        });
    }

    if path.contains("//") {
        return Err(PathValidationError::EmptySegment {
            path: path.to_string(),
        });
    }

    let mut brace_depth = 0;
    let mut param_start = None;

    for (i, ch) in path.char_indices() {
        match ch {
            '{' => {
                if brace_depth > 0 {
                    return Err(PathValidationError::NestedBraces {
                        path: path.to_string(),
                        position: i,
                    });
                }
                brace_depth += 1;
                param_start = Some(i);
            }
            '}' => {
                if brace_depth == 0 {
                    return Err(PathValidationError::UnmatchedClosingBrace {
                        path: path.to_string(),
                        position: i,
                    });
                }
                brace_depth -= 1;

                if let Some(start) = param_start {
                    let param_name = &path[start + 1..i];
                    if param_name.is_empty() {
                        return Err(PathValidationError::EmptyParameterName {
                            path: path.to_string(),
                            position: start,
                        });
                    }
                    if !param_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        return Err(PathValidationError::InvalidParameterName {
                            path: path.to_string(),
                            param_name: param_name.to_string(),
                            position: start,
                        });
                    }
                    if param_name
                        .chars()
                        .next()
                        .map(|c| c.is_ascii_digit())
                        .unwrap_or(false)
                    {
                        return Err(PathValidationError::ParameterStartsWithDigit {
                            path: path.to_string(),
                            param_name: param_name.to_string(),
                            position: start,
                        });
                    }
                }
                param_start = None;
            }
            _ if brace_depth == 0 => {
                if !ch.is_alphanumeric() && !"-_./*".contains(ch) {
                    return Err(PathValidationError::InvalidCharacter {
                        path: path.to_string(),
                        character: ch,
                        position: i,
                    });
                }
            }
            _ => {}
        }
    }

    if brace_depth > 0 {
        return Err(PathValidationError::UnclosedBrace {
            path: path.to_string(),
        });
    }

    Ok(())
}

/// One segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    /// Trailing catch-all
    Wildcard,
}

/// A validated route path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse and validate a template. A trailing slash is dropped.
    pub fn parse(path: &str) -> Result<Self, PathValidationError> {
        check_syntax(path)?;

        let trimmed = match path.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => path,
        };

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;
        let parts: Vec<&str> = trimmed.split('/').skip(1).filter(|s| !s.is_empty()).collect();
        let last = parts.len().saturating_sub(1);

        for (index, part) in parts.iter().enumerate() {
            let position = trimmed[offset..]
                .find(part)
                .map(|p| p + offset)
                .unwrap_or(offset);
            offset = position + part.len();

            if part.contains('*') {
                if *part != WILDCARD_KEY || index != last {
                    return Err(PathValidationError::MisplacedWildcard {
                        path: path.to_string(),
                        position: position + part.find('*').unwrap_or(0),
                    });
                }
                segments.push(Segment::Wildcard);
                continue;
            }

            if part.contains('{') {
                let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) else {
                    return Err(PathValidationError::PartialSegmentParameter {
                        path: path.to_string(),
                        position,
                    });
                };
                if name.contains('{') || name.contains('}') {
                    return Err(PathValidationError::PartialSegmentParameter {
                        path: path.to_string(),
                        position,
                    });
                }
                if !seen.insert(name.to_string()) {
                    return Err(PathValidationError::DuplicateParameter {
                        path: path.to_string(),
                        param_name: name.to_string(),
                    });
                }
                segments.push(Segment::Param(name.to_string()));
                continue;
            }

            segments.push(Segment::Static(part.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    /// The template with parameter names erased, used for conflict detection.
    pub fn normalized(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut result = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            result.push('/');
            match segment {
                Segment::Static(s) => result.push_str(s),
                Segment::Param(_) => result.push_str("{}"),
                Segment::Wildcard => result.push('*'),
            }
        }
        result
    }

    /// Match a concrete request path, capturing parameters.
    ///
    /// The wildcard capture (possibly empty) is stored under [`WILDCARD_KEY`].
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let mut parts = path.split('/').skip(1).filter(|s| !s.is_empty());
        let mut params = PathParams::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.next()? != expected.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), parts.next()?.to_string());
                }
                Segment::Wildcard => {
                    debug_assert_eq!(index, self.segments.len() - 1);
                    let rest: Vec<&str> = parts.by_ref().collect();
                    params.insert(WILDCARD_KEY.to_string(), rest.join("/"));
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Normalize a group prefix: leading slash, no trailing or repeated slashes.
pub fn normalize_prefix(prefix: &str) -> String {
    let segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = String::with_capacity(prefix.len() + 1);
    for segment in segments {
        result.push('/');
        result.push_str(segment);
    }
    result
}

/// Prepend a normalized prefix to a route path.
pub fn join_prefix(prefix: &str, path: &str) -> String {
    let prefix = normalize_prefix(prefix);
    match (prefix.as_str(), path) {
        ("/", path) => path.to_string(),
        (prefix, "/") | (prefix, "") => prefix.to_string(),
        (prefix, path) => format!("{prefix}{path}"),
    }
}

/// Path parameters with stack-optimized storage.
///
/// Uses `SmallVec` to store up to 4 key-value pairs on the stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: SmallVec<[(String, String); STACK_PARAMS_CAPACITY]>,
}

impl PathParams {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: SmallVec::new(),
        }
    }

    /// Insert a key-value pair, replacing an earlier value for the key.
    #[inline]
    pub fn insert(&mut self, key: String, value: String) {
        match self.inner.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.inner.push((key, value)),
        }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&String> {
        self.inner.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.iter().any(|(k, _)| k == key)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.inner.iter().map(|(k, v)| (k, v))
    }

    pub fn to_hashmap(&self) -> HashMap<String, String> {
        self.inner.iter().cloned().collect()
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
