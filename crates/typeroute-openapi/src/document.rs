//! OpenAPI 3.1 document model and builder.

use crate::compiler::SchemaCompiler;
use crate::config::OpenApiConfig;
use crate::schema::Schema;
use http::Method;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;
use typeroute_core::{ErrorResponse, ParserRegistry, RouteInfo, TypeRef, TypeShape};
use typeroute_validate::Section;

const JSON: &str = "application/json";

/// API information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI 3.1.0 document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDocument {
    /// Always "3.1.0"
    pub openapi: String,
    pub info: ApiInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema_dialect: Option<String>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Components {
    pub schemas: BTreeMap<String, Schema>,
}

/// Operations of one path
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
}

impl PathItem {
    /// Slot for `method`, if OpenAPI has one.
    pub fn slot(&mut self, method: &Method) -> Option<&mut Option<Operation>> {
        let slot = match *method {
            Method::GET => &mut self.get,
            Method::PUT => &mut self.put,
            Method::POST => &mut self.post,
            Method::DELETE => &mut self.delete,
            Method::OPTIONS => &mut self.options,
            Method::HEAD => &mut self.head,
            Method::PATCH => &mut self.patch,
            _ => return None,
        };
        Some(slot)
    }
}

/// Operation (endpoint)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

/// Parameter read from the path, query, headers or cookies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaType {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, Header>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub schema: Schema,
}

impl OpenApiDocument {
    /// An empty document.
    pub fn new(config: &OpenApiConfig) -> Self {
        Self {
            openapi: "3.1.0".to_string(),
            info: ApiInfo {
                title: config.title.clone(),
                version: config.version.clone(),
                description: config.description.clone(),
            },
            json_schema_dialect: Some("https://json-schema.org/draft/2020-12/schema".to_string()),
            paths: BTreeMap::new(),
            components: None,
        }
    }

    /// Build the document for `routes`, compiling every request and
    /// response type into `components.schemas`.
    pub fn build(
        config: &OpenApiConfig,
        routes: &[Arc<RouteInfo>],
        parsers: &ParserRegistry,
    ) -> Self {
        let mut document = Self::new(config);
        let mut compiler = SchemaCompiler::new(parsers);
        let error_ref = (!routes.is_empty()).then(|| error_schema(&mut compiler));

        for route in routes {
            let mut operation = Operation {
                operation_id: route.operation_id.clone(),
                tags: route.tags.clone(),
                summary: route.summary.clone(),
                description: route.description.clone(),
                parameters: Vec::new(),
                request_body: None,
                responses: BTreeMap::new(),
                deprecated: route.deprecated.then_some(true),
            };
            let takes_input = describe_request(&mut compiler, &route.request, &mut operation);
            let success = describe_response(&mut compiler, &route.response);
            operation.responses.insert("200".to_string(), success);

            if let Some(error_ref) = &error_ref {
                if takes_input {
                    operation.responses.insert(
                        config.validation_status.as_u16().to_string(),
                        error_response("Request validation failed", error_ref),
                    );
                }
                operation
                    .responses
                    .insert("500".to_string(), error_response("Internal server error", error_ref));
            }

            let item = document.paths.entry(route.path.as_str().to_string()).or_default();
            match item.slot(&route.method) {
                Some(slot) => *slot = Some(operation),
                None => tracing::debug!(
                    method = %route.method,
                    path = %route.path,
                    "method has no OpenAPI operation slot"
                ),
            }
        }

        let schemas = compiler.finish().into_schemas();
        if !schemas.is_empty() {
            document.components = Some(Components { schemas });
        }
        document
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Fill parameters and the request body. Returns whether the request
/// carries anything to validate.
fn describe_request(
    compiler: &mut SchemaCompiler<'_>,
    request: &TypeRef,
    operation: &mut Operation,
) -> bool {
    let shape = request.shape();
    let record = match &*shape {
        TypeShape::Opaque => return false,
        TypeShape::Record(record) => record,
        other => {
            let schema = compiler.schema_for(request);
            operation.request_body = Some(RequestBody {
                required: !other.is_nullable(),
                content: json_content(schema),
            });
            return true;
        }
    };

    for field in record.fields() {
        if field.section == Section::Body {
            continue;
        }
        operation.parameters.push(Parameter {
            name: field.name.clone(),
            location: field.section.as_str().to_string(),
            required: field.section == Section::Path || compiler.is_required(field),
            schema: compiler.field_schema(field),
        });
    }

    let mut body = record.in_section(Section::Body).peekable();
    if body.peek().is_some() {
        let required = body.any(|field| compiler.is_required(field));
        operation.request_body = Some(RequestBody {
            required,
            content: json_content(compiler.schema_for(request)),
        });
    }
    !record.fields().is_empty()
}

fn describe_response(compiler: &mut SchemaCompiler<'_>, response: &TypeRef) -> Response {
    let mut out = Response {
        description: "Successful response".to_string(),
        headers: None,
        content: None,
    };
    let shape = response.shape();
    let record = match &*shape {
        TypeShape::Opaque => return out,
        TypeShape::Record(record) => record,
        _ => {
            out.content = Some(json_content(compiler.schema_for(response)));
            return out;
        }
    };

    let mut headers = BTreeMap::new();
    for field in record.in_section(Section::Header) {
        headers.insert(
            field.name.clone(),
            Header {
                schema: compiler.field_schema(field),
            },
        );
    }
    if record.in_section(Section::Cookie).next().is_some() {
        headers.insert(
            "Set-Cookie".to_string(),
            Header {
                schema: Schema::string(),
            },
        );
    }
    if !headers.is_empty() {
        out.headers = Some(headers);
    }
    if record.in_section(Section::Body).next().is_some() {
        out.content = Some(json_content(compiler.schema_for(response)));
    }
    out
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    BTreeMap::from([(JSON.to_string(), MediaType { schema })])
}

fn error_response(description: &str, schema: &Schema) -> Response {
    Response {
        description: description.to_string(),
        headers: None,
        content: Some(json_content(schema.clone())),
    }
}

/// Register the shared error envelope component.
fn error_schema(compiler: &mut SchemaCompiler<'_>) -> Schema {
    let table = compiler.table_mut();
    let (name, fresh) = table.reserve(TypeId::of::<ErrorResponse>(), "ErrorResponse");
    if fresh {
        let field_error = Schema::object()
            .with_property("section", Schema::string())
            .with_property("field", Schema::string())
            .with_property("code", Schema::string())
            .with_property("message", Schema::string())
            .with_required("section")
            .with_required("field")
            .with_required("code")
            .with_required("message");
        let body = Schema::object()
            .with_property("type", Schema::string())
            .with_property("message", Schema::string())
            .with_property("fields", Schema::array(field_error))
            .with_required("type")
            .with_required("message");
        let envelope = Schema::object()
            .with_property("error", body)
            .with_property("request_id", Schema::string().with_format("uuid"))
            .with_required("error");
        table.fill(&name, envelope);
    }
    Schema::reference(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use typeroute_core::{
        ApiError, Context, Describe, FieldSpec, RecordShape, RouteOptions, TypedRouter,
    };

    #[derive(serde::Deserialize)]
    #[allow(dead_code)]
    struct GetUser {
        id: u64,
        verbose: Option<bool>,
    }

    impl Describe for GetUser {
        fn type_name() -> String {
            "GetUser".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .field(FieldSpec::of::<u64>("id").section(Section::Path))
                    .field(FieldSpec::of::<Option<bool>>("verbose").section(Section::Query)),
            )
        }
    }

    #[derive(serde::Serialize)]
    struct User {
        name: String,
        etag: String,
    }

    impl Describe for User {
        fn type_name() -> String {
            "User".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .field(FieldSpec::of::<String>("name").required())
                    .field(FieldSpec::of::<String>("ETag").key("etag").section(Section::Header)),
            )
        }
    }

    async fn get_user(_: Context, req: GetUser) -> Result<User, ApiError> {
        Ok(User {
            name: format!("user-{}", req.id),
            etag: "v1".into(),
        })
    }

    async fn health(_: Context, _: ()) -> Result<(), ApiError> {
        Ok(())
    }

    fn router() -> TypedRouter {
        let router = TypedRouter::new();
        router
            .register(
                Method::GET,
                "/users/{id}",
                get_user,
                RouteOptions::new().tag("users").summary("Fetch a user"),
            )
            .unwrap();
        router.get("/health", health).unwrap();
        router
    }

    #[test]
    fn operations_describe_parameters_and_headers() {
        let router = router();
        let config = OpenApiConfig::new("Users", "2.0.0");
        let doc = OpenApiDocument::build(&config, &router.routes(), router.parsers());
        let json = doc.to_json();

        assert_eq!(json["openapi"], "3.1.0");
        assert_eq!(json["info"]["title"], "Users");

        let op = &json["paths"]["/users/{id}"]["get"];
        assert_eq!(op["operationId"], "get_users_id");
        assert_eq!(op["tags"], json!(["users"]));
        assert_eq!(op["summary"], "Fetch a user");
        assert_eq!(
            op["parameters"],
            json!([
                {
                    "name": "id",
                    "in": "path",
                    "required": true,
                    "schema": {"type": "integer", "format": "int64", "minimum": 0.0}
                },
                {
                    "name": "verbose",
                    "in": "query",
                    "required": false,
                    "schema": {"type": ["boolean", "null"]}
                }
            ])
        );
        assert!(op.get("requestBody").is_none());

        let ok = &op["responses"]["200"];
        assert_eq!(ok["headers"]["ETag"]["schema"], json!({"type": "string"}));
        assert_eq!(
            ok["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/User"
        );
        assert_eq!(
            op["responses"]["422"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/ErrorResponse"
        );

        let user = &json["components"]["schemas"]["User"];
        assert_eq!(user["properties"], json!({"name": {"type": "string"}}));
        assert_eq!(user["required"], json!(["name"]));
    }

    #[test]
    fn unit_routes_have_no_body_or_validation_response() {
        let router = router();
        let config = OpenApiConfig::default();
        let doc = OpenApiDocument::build(&config, &router.routes(), router.parsers());
        let health = doc.paths["/health"].get.as_ref().unwrap();

        assert!(health.request_body.is_none());
        assert!(health.responses["200"].content.is_none());
        assert!(!health.responses.contains_key("422"));
        assert!(health.responses.contains_key("500"));
    }

    #[test]
    fn empty_router_has_no_components() {
        let doc = OpenApiDocument::build(&OpenApiConfig::default(), &[], &ParserRegistry::new());
        assert!(doc.paths.is_empty());
        assert!(doc.components.is_none());
    }
}
