//! Decode/validate pipeline.
//!
//! One run goes `Start → PerFieldExtract → PerSectionValidate → Invoke →
//! Encode → Done`, or ends in `Faulted`. Field errors are collected per
//! section and never abort sibling fields; any error stops the run before
//! the handler is invoked.

use crate::conform;
use crate::context::Context;
use crate::error::{ApiError, PipelineError};
use crate::params::{ParamSource, RawResponse};
use crate::parser::ParserRegistry;
use crate::shape::{remap, Describe, FieldSpec, RecordShape, TypeRef, TypeShape, Wire};
use crate::union;
use futures_util::FutureExt;
use http::header::{HeaderName, HeaderValue, SET_COOKIE};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use typeroute_validate::{Section, SectionErrors, ValidationError};

/// Pipeline states, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    PerFieldExtract,
    PerSectionValidate,
    Invoke,
    Encode,
    Done,
    Faulted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::PerFieldExtract => "per_field_extract",
            Stage::PerSectionValidate => "per_section_validate",
            Stage::Invoke => "invoke",
            Stage::Encode => "encode",
            Stage::Done => "done",
            Stage::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "pipeline stage");
}

/// Decode and validate a request record.
///
/// Every field is extracted from its section, converted (custom parser
/// first, then primitive conversion) and checked against its constraints.
/// All failures are returned together.
pub fn decode<Req>(
    ctx: &Context,
    params: &dyn ParamSource,
    body: &[u8],
    parsers: &ParserRegistry,
) -> Result<Req, SectionErrors>
where
    Req: DeserializeOwned + Describe,
{
    enter(Stage::PerFieldExtract);
    let ty = TypeRef::of::<Req>();
    let mut errors = SectionErrors::new();
    let body = parse_body(body);

    let shape = ty.shape();
    let Some(record) = shape.as_record() else {
        return decode_whole_body(&ty, body, errors);
    };

    // `None` skips body fields: the body itself was already reported.
    let body_fields = match body {
        Ok(Some(Value::Object(entries))) => Some(entries),
        Ok(None) => Some(Map::new()),
        Ok(Some(other)) => {
            if record.in_section(Section::Body).next().is_some() {
                errors.add(ValidationError::new(
                    Section::Body,
                    "",
                    "invalid_type",
                    format!("expected object body, found {}", conform::json_type(&other)),
                ));
            }
            None
        }
        Err(err) => {
            errors.add(err);
            None
        }
    };

    let mut fields = Map::new();
    let mut extracted = Vec::with_capacity(record.fields().len());
    for field in record.fields() {
        let value = match field.section {
            Section::Body => match &body_fields {
                Some(entries) => extract_body(ctx, field, entries, parsers, &mut errors),
                None => continue,
            },
            section => extract_param(ctx, field, section, params, parsers, &mut errors),
        };
        match value {
            Extracted::Value(value) => extracted.push((field, value)),
            Extracted::Missing => missing(field, &mut fields, &mut errors),
            Extracted::Failed => {}
        }
    }

    enter(Stage::PerSectionValidate);
    for (field, value) in extracted {
        if value.is_null() && field.is_required() {
            errors.add(ValidationError::required(field.section, &field.name));
            continue;
        }
        for rule in field.constraints.check(&value) {
            errors.add(ValidationError::from_rule(field.section, &field.name, rule));
        }
        if field.section == Section::Body {
            check_nested(&field.ty, &value, &field.name, &mut errors);
        }
        fields.insert(field.key.clone(), remap(&field.ty, value, Wire::Incoming));
    }

    errors.into_result()?;
    serde_json::from_value(Value::Object(fields)).map_err(|err| {
        [ValidationError::new(Section::Body, "", "invalid_body", err.to_string())]
            .into_iter()
            .collect()
    })
}

enum Extracted {
    Value(Value),
    Missing,
    Failed,
}

/// Parse the body once. Empty bodies are absent.
fn parse_body(body: &[u8]) -> Result<Option<Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Value>(body).map(Some).map_err(|err| {
        ValidationError::new(Section::Body, "", "invalid_json", format!("Invalid JSON: {err}"))
    })
}

/// Non-record request types take the whole body.
fn decode_whole_body<Req: DeserializeOwned>(
    ty: &TypeRef,
    body: Result<Option<Value>, ValidationError>,
    mut errors: SectionErrors,
) -> Result<Req, SectionErrors> {
    let value = match body {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(err) => {
            errors.add(err);
            return Err(errors);
        }
    };
    match conform::check(ty, &value) {
        Ok(()) => check_nested(ty, &value, "", &mut errors),
        Err(mismatch) => errors.add(ValidationError::new(
            Section::Body,
            mismatch.path,
            mismatch.code,
            mismatch.message,
        )),
    }
    errors.into_result()?;
    serde_json::from_value(remap(ty, value, Wire::Incoming)).map_err(|err| {
        [ValidationError::new(Section::Body, "", "invalid_body", err.to_string())]
            .into_iter()
            .collect()
    })
}

fn extract_body(
    ctx: &Context,
    field: &FieldSpec,
    entries: &Map<String, Value>,
    parsers: &ParserRegistry,
    errors: &mut SectionErrors,
) -> Extracted {
    let Some(value) = entries.get(&field.name) else {
        return Extracted::Missing;
    };
    // Parser-backed fields travel as strings, like their schema says.
    let parser = parsers.lookup_id(field.ty.innermost().id());
    if let (Some(parse), Value::String(raw)) = (parser, value) {
        return match parse(ctx, raw) {
            Ok(parsed) => Extracted::Value(parsed),
            Err(err) => {
                errors.add(ValidationError::new(Section::Body, &field.name, "parse", err.message));
                Extracted::Failed
            }
        };
    }
    match conform::check(&field.ty, value) {
        Ok(()) => Extracted::Value(value.clone()),
        Err(mismatch) => {
            errors.add(ValidationError::new(
                Section::Body,
                nested_name(&field.name, &mismatch.path),
                mismatch.code,
                mismatch.message,
            ));
            Extracted::Failed
        }
    }
}

fn extract_param(
    ctx: &Context,
    field: &FieldSpec,
    section: Section,
    params: &dyn ParamSource,
    parsers: &ParserRegistry,
    errors: &mut SectionErrors,
) -> Extracted {
    let target = field.ty.innermost();
    let sequence = match &*target.shape() {
        TypeShape::Slice(elem) if !parsers.contains(target.id()) => Some(*elem),
        _ => None,
    };

    if let Some(elem) = sequence {
        let raws = params.lookup_all(section, &field.name);
        if raws.is_empty() {
            return Extracted::Missing;
        }
        let mut items = Vec::with_capacity(raws.len());
        let mut failed = false;
        for raw in &raws {
            match convert_raw(ctx, &elem, raw, parsers) {
                Ok(item) => items.push(item),
                Err(err) => {
                    errors.add(err.into_validation(section, &field.name, raw));
                    failed = true;
                }
            }
        }
        return if failed {
            Extracted::Failed
        } else {
            Extracted::Value(Value::Array(items))
        };
    }

    let Some(raw) = params.lookup(section, &field.name) else {
        return Extracted::Missing;
    };
    match convert_raw(ctx, &field.ty, &raw, parsers) {
        Ok(value) => Extracted::Value(value),
        Err(err) => {
            errors.add(err.into_validation(section, &field.name, &raw));
            Extracted::Failed
        }
    }
}

enum ConvertError {
    Conversion,
    Parser(String),
}

impl ConvertError {
    fn into_validation(self, section: Section, field: &str, raw: &str) -> ValidationError {
        match self {
            ConvertError::Conversion => ValidationError::conversion(section, field, raw),
            ConvertError::Parser(message) => ValidationError::new(section, field, "parse", message),
        }
    }
}

/// Convert one raw string to a JSON value of `ty`.
fn convert_raw(
    ctx: &Context,
    ty: &TypeRef,
    raw: &str,
    parsers: &ParserRegistry,
) -> Result<Value, ConvertError> {
    if let Some(parse) = parsers.lookup_id(ty.id()) {
        return parse(ctx, raw).map_err(|err| ConvertError::Parser(err.message));
    }
    match &*ty.shape() {
        TypeShape::Pointer(inner) => convert_raw(ctx, inner, raw, parsers),
        TypeShape::Primitive(kind) => kind.convert(raw).map_err(|_| ConvertError::Conversion),
        TypeShape::Opaque => Ok(Value::String(raw.to_string())),
        _ => {
            let value: Value = serde_json::from_str(raw).map_err(|_| ConvertError::Conversion)?;
            conform::check(ty, &value).map_err(|_| ConvertError::Conversion)?;
            Ok(value)
        }
    }
}

fn missing(field: &FieldSpec, fields: &mut Map<String, Value>, errors: &mut SectionErrors) {
    if field.is_required() {
        errors.add(ValidationError::required(field.section, &field.name));
        return;
    }
    let shape = field.ty.shape();
    if shape.is_nullable() {
        fields.insert(field.key.clone(), Value::Null);
    } else if field.defaulted {
        // serde fills the default
    } else if field.section != Section::Body && matches!(&*shape, TypeShape::Slice(_)) {
        fields.insert(field.key.clone(), Value::Array(Vec::new()));
    } else {
        errors.add(ValidationError::required(field.section, &field.name));
    }
}

/// Apply constraints of fields inside nested body records.
fn check_nested(ty: &TypeRef, value: &Value, path: &str, errors: &mut SectionErrors) {
    match (&*ty.shape(), value) {
        (TypeShape::Pointer(inner), value) => check_nested(inner, value, path, errors),
        (TypeShape::Slice(elem), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_nested(elem, item, &format!("{path}[{i}]"), errors);
            }
        }
        (TypeShape::Map(_, val), Value::Object(entries)) => {
            for (key, item) in entries {
                check_nested(val, item, &nested_name(path, key), errors);
            }
        }
        (TypeShape::Record(record), Value::Object(entries)) => {
            check_record(record, entries, path, errors)
        }
        (TypeShape::Union(union), value) => {
            if let Ok(index) = union::resolve(union, value) {
                check_nested(&union.variants()[index], value, path, errors);
            }
        }
        _ => {}
    }
}

fn check_record(
    record: &RecordShape,
    entries: &Map<String, Value>,
    path: &str,
    errors: &mut SectionErrors,
) {
    for field in record.fields() {
        let Some(item) = entries.get(&field.name) else {
            continue;
        };
        let name = nested_name(path, &field.name);
        if item.is_null() && field.is_required() {
            errors.add(ValidationError::required(Section::Body, name));
            continue;
        }
        for rule in field.constraints.check(item) {
            errors.add(ValidationError::from_rule(Section::Body, name.clone(), rule));
        }
        check_nested(&field.ty, item, &name, errors);
    }
}

fn nested_name(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => rest.to_string(),
        (false, false) if rest.starts_with('[') => format!("{base}{rest}"),
        (false, false) => format!("{base}.{rest}"),
    }
}

/// Encode a handler response.
///
/// Record fields declared in the `header` section become response headers
/// and `cookie` fields become `Set-Cookie` headers; everything else is the
/// JSON body. A `null` body is sent empty.
pub fn encode<Resp: Serialize + Describe>(response: &Resp) -> Result<RawResponse, PipelineError> {
    enter(Stage::Encode);
    let ty = TypeRef::of::<Resp>();
    let value = serde_json::to_value(response)
        .map_err(|err| PipelineError::Fault(format!("response encoding failed: {err}")))?;
    let mut value = remap(&ty, value, Wire::Outgoing);

    let mut out = RawResponse::new(StatusCode::OK);
    if let (TypeShape::Record(record), Value::Object(entries)) = (&*ty.shape(), &mut value) {
        for field in record.fields() {
            if !matches!(field.section, Section::Header | Section::Cookie) {
                continue;
            }
            let Some(item) = entries.remove(&field.name) else {
                continue;
            };
            for text in header_texts(item) {
                append_header(&mut out, field, text)?;
            }
        }
    }

    if value.is_null() {
        return Ok(out);
    }
    let body = serde_json::to_vec(&value)
        .map_err(|err| PipelineError::Fault(format!("response encoding failed: {err}")))?;
    let headers = std::mem::take(&mut out.headers);
    let mut response = RawResponse::json(StatusCode::OK, body);
    response.headers.extend(headers);
    Ok(response)
}

fn header_texts(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().flat_map(header_texts).collect(),
        other => vec![other.to_string()],
    }
}

fn append_header(
    out: &mut RawResponse,
    field: &FieldSpec,
    text: String,
) -> Result<(), PipelineError> {
    let invalid = |err: &dyn fmt::Display| {
        PipelineError::Fault(format!("invalid response header '{}': {err}", field.name))
    };
    if field.section == Section::Cookie {
        let cookie = cookie::Cookie::new(field.name.clone(), text).to_string();
        let value = HeaderValue::from_str(&cookie).map_err(|e| invalid(&e))?;
        out.headers.append(SET_COOKIE, value);
    } else {
        let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(|e| invalid(&e))?;
        let value = HeaderValue::from_str(&text).map_err(|e| invalid(&e))?;
        out.headers.append(name, value);
    }
    Ok(())
}

/// Invoke the handler and encode its response.
///
/// Cancellation of the context drops the handler future and yields
/// [`PipelineError::Cancelled`]. Panics are left to [`guard`].
pub async fn invoke<Req, Resp, E, H, Fut>(
    handler: &H,
    ctx: Context,
    request: Req,
) -> Result<RawResponse, PipelineError>
where
    H: Fn(Context, Req) -> Fut,
    Fut: Future<Output = Result<Resp, E>>,
    Resp: Serialize + Describe,
    E: Into<ApiError>,
{
    if ctx.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    enter(Stage::Invoke);

    let signal = ctx.clone();
    let work = async move {
        let response = handler(ctx, request)
            .await
            .map_err(|err| PipelineError::Handler(err.into()))?;
        encode(&response)
    };

    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(PipelineError::Cancelled),
        outcome = work => outcome,
    }
}

/// The fault barrier: run one pipeline pass, turning any panic raised by
/// custom parsers, the handler or response encoding into
/// [`PipelineError::Fault`].
pub async fn guard<F>(run: F) -> Result<RawResponse, PipelineError>
where
    F: Future<Output = Result<RawResponse, PipelineError>>,
{
    AssertUnwindSafe(run)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(PipelineError::Fault(panic_message(panic.as_ref()))))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Log the outcome of a failed run.
pub(crate) fn report(err: &PipelineError) {
    match err {
        PipelineError::Validation(errors) => {
            tracing::warn!(errors = errors.len(), "request validation failed");
        }
        PipelineError::Handler(err) => {
            tracing::debug!(status = %err.status, error = %err, "handler returned an error");
        }
        PipelineError::Fault(detail) => {
            enter(Stage::Faulted);
            tracing::error!(detail = %detail, "handler fault");
        }
        PipelineError::Cancelled => tracing::warn!("request cancelled"),
        PipelineError::PayloadTooLarge { size, limit } => {
            tracing::warn!(size, limit, "request body too large");
        }
    }
}
