//! Custom string parsers keyed by target type.
//!
//! A parser turns a raw path/query/header/cookie string into a value of its
//! target type. The decode pipeline consults the registry before primitive
//! conversion and the schema compiler renders parser-backed types as plain
//! strings.

use crate::context::Context;
use crate::shape::{Describe, TypeRef};
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Failure reported by a custom parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A registered parser returning its target type.
pub type TypedParser<T> = Arc<dyn Fn(&Context, &str) -> Result<T, ParseError> + Send + Sync>;

/// A registered parser with its output erased to JSON.
pub type ErasedParser = Arc<dyn Fn(&Context, &str) -> Result<Value, ParseError> + Send + Sync>;

struct Entry {
    target: TypeRef,
    typed: Arc<dyn Any + Send + Sync>,
    erased: ErasedParser,
}

/// Mapping from target type to its parser. At most one parser per type.
#[derive(Default)]
pub struct ParserRegistry {
    entries: HashMap<TypeId, Entry>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `parser` for its output type `T`, replacing any earlier one.
    ///
    /// ```rust
    /// use typeroute_core::{Context, ParserRegistry};
    ///
    /// let mut parsers = ParserRegistry::new();
    /// parsers.register(|_ctx: &Context, raw: &str| raw.parse::<u32>().map(|n| n * 2));
    ///
    /// let double = parsers.lookup::<u32>().unwrap();
    /// assert_eq!(double(&Context::new(), "21").unwrap(), 42);
    /// ```
    pub fn register<T, E, F>(&mut self, parser: F)
    where
        T: Describe + Serialize,
        E: fmt::Display,
        F: Fn(&Context, &str) -> Result<T, E> + Send + Sync + 'static,
    {
        let typed: TypedParser<T> = Arc::new(move |ctx: &Context, raw: &str| {
            parser(ctx, raw).map_err(|e| ParseError::new(e.to_string()))
        });
        let erased: ErasedParser = {
            let typed = Arc::clone(&typed);
            Arc::new(move |ctx: &Context, raw: &str| {
                let value = typed(ctx, raw)?;
                serde_json::to_value(value).map_err(|e| ParseError::new(e.to_string()))
            })
        };

        let target = TypeRef::of::<T>();
        let entry = Entry {
            target,
            typed: Arc::new(typed),
            erased,
        };
        if self.entries.insert(target.id(), entry).is_some() {
            tracing::debug!(target_type = %target.name(), "replaced custom parser");
        } else {
            tracing::debug!(target_type = %target.name(), "registered custom parser");
        }
    }

    /// The parser registered for `T`, if any.
    pub fn lookup<T: Describe>(&self) -> Option<TypedParser<T>> {
        self.entries
            .get(&T::identity())?
            .typed
            .downcast_ref::<TypedParser<T>>()
            .cloned()
    }

    /// The parser registered for a type identity, with JSON output.
    pub fn lookup_id(&self, id: TypeId) -> Option<ErasedParser> {
        self.entries.get(&id).map(|entry| Arc::clone(&entry.erased))
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Every type that has a parser.
    pub fn registered_types(&self) -> Vec<TypeRef> {
        self.entries.values().map(|entry| entry.target).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.values().map(|entry| entry.target))
            .finish()
    }
}
