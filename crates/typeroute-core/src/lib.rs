//! # typeroute core
//!
//! Core engine of typeroute: the type descriptor walker, the parser
//! registry, tagged-union containers, the decode/validate pipeline and the
//! transport-agnostic router shim.
//!
//! This crate is not meant to be used directly. Use `typeroute` instead.

mod config;
pub mod conform;
mod context;
mod error;
mod params;
mod parser;
pub mod path;
pub mod pipeline;
mod primitive;
mod router;
pub mod shape;
pub mod union;

// Public API
pub use config::{ConfigError, Environment, RouterConfig, DEFAULT_MAX_BODY_SIZE};
pub use context::{CancelHandle, Context};
pub use error::{ApiError, ErrorBody, ErrorResponse, PipelineError, RegistrationError, Result};
pub use params::{HttpParams, MapParams, ParamSource, RawRequest, RawResponse};
pub use parser::{ErasedParser, ParseError, ParserRegistry, TypedParser};
pub use path::{PathParams, PathTemplate, PathValidationError, Segment};
pub use primitive::{ConversionError, PrimitiveKind};
pub use router::{RouteHandler, RouteInfo, RouteOptions, RouteRegistry, TypedRouter};
pub use shape::{
    describe, Describe, Discriminator, FieldSpec, RecordShape, TypeRef, TypeShape, UnionShape,
};
pub use union::{Union2, Union3, Union4, UnionShapeError};

pub use typeroute_validate::{Constraints, Format, Section, SectionErrors, ValidationError};
