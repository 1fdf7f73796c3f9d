#![cfg(feature = "openapi")]

use serde_json::json;
use typeroute::openapi::compile;
use typeroute::prelude::*;
use typeroute::{RegistrationError, Segment, TypeRef};

#[derive(Debug, Deserialize, Describe)]
struct ListPets {
    #[api(path)]
    owner: u64,
    #[api(query, max = 100)]
    limit: Option<u32>,
    #[api(header, name = "X-Api-Key", required)]
    api_key: String,
}

#[derive(Debug, Serialize, Describe)]
struct Pet {
    #[api(min_length = 1)]
    name: String,
    #[api(one_of = ["cat", "dog"])]
    species: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    friends: Option<Vec<Pet>>,
    #[api(header, name = "X-Total-Count")]
    total: u32,
}

#[derive(Debug, Deserialize, Describe)]
struct Category {
    #[api(required)]
    label: String,
    children: Vec<Category>,
    parent: Option<Box<Category>>,
}

async fn list_pets(_: Context, req: ListPets) -> Result<Pet> {
    Ok(Pet {
        name: format!("pet-of-{}", req.owner),
        species: "cat".into(),
        friends: None,
        total: 1,
    })
}

fn pet_router() -> TypedRouter {
    let router = TypedRouter::new();
    router
        .group("/owners")
        .tag("pets")
        .get("/{owner}/pets", list_pets)
        .unwrap();
    router
        .register(
            http::Method::GET,
            "/health",
            |_: Context, _: ()| async { Ok::<_, ApiError>(()) },
            RouteOptions::new().summary("Liveness check").deprecated(),
        )
        .unwrap();
    router
}

#[test]
fn document_describes_parameters_and_components() {
    let docs = ApiDocs::new(OpenApiConfig::new("Pets", "2.0.0"), &pet_router());
    let doc: serde_json::Value = serde_json::from_str(docs.json()).unwrap();

    assert_eq!(doc["openapi"], "3.1.0");
    assert_eq!(doc["info"]["title"], "Pets");

    let op = &doc["paths"]["/owners/{owner}/pets"]["get"];
    assert_eq!(op["operationId"], "get_owners_owner_pets");
    assert_eq!(op["tags"], json!(["pets"]));
    assert!(op.get("requestBody").is_none());

    let params = op["parameters"].as_array().unwrap();
    assert_eq!(params.len(), 3);
    assert_eq!(params[0]["name"], "owner");
    assert_eq!(params[0]["in"], "path");
    assert_eq!(params[0]["required"], true);
    assert_eq!(params[1]["in"], "query");
    assert_eq!(params[1]["required"], false);
    assert_eq!(params[1]["schema"]["maximum"], 100.0);
    assert_eq!(params[2]["name"], "X-Api-Key");
    assert_eq!(params[2]["in"], "header");
    assert_eq!(params[2]["required"], true);

    let ok = &op["responses"]["200"];
    assert_eq!(ok["content"]["application/json"]["schema"]["$ref"], "#/components/schemas/Pet");
    assert!(ok["headers"]["X-Total-Count"].is_object());
    assert!(op["responses"]["422"].is_object());
    assert!(op["responses"]["500"].is_object());

    let pet = &doc["components"]["schemas"]["Pet"];
    assert_eq!(pet["properties"]["name"]["minLength"], 1);
    assert_eq!(pet["properties"]["species"]["enum"], json!(["cat", "dog"]));
    assert!(pet["properties"].get("X-Total-Count").is_none());
    assert!(doc["components"]["schemas"]["ErrorResponse"].is_object());

    let health = &doc["paths"]["/health"]["get"];
    assert_eq!(health["summary"], "Liveness check");
    assert_eq!(health["deprecated"], true);
    assert!(health["responses"].get("422").is_none());
}

#[test]
fn recursive_records_compile_to_one_component() {
    let parsers = ParserRegistry::new();
    let types = [TypeRef::of::<Category>(), TypeRef::of::<Vec<Category>>()];

    let (first, roots) = compile(&parsers, &types);
    let (second, _) = compile(&parsers, &types);
    assert_eq!(first.schemas(), second.schemas());
    assert_eq!(first.len(), 1);

    let root = serde_json::to_value(&roots[0]).unwrap();
    assert_eq!(root, json!({"$ref": "#/components/schemas/Category"}));
    let list = serde_json::to_value(&roots[1]).unwrap();
    assert_eq!(list["items"]["$ref"], "#/components/schemas/Category");

    let category = serde_json::to_value(first.get("Category").unwrap()).unwrap();
    assert_eq!(category["required"], json!(["label"]));
    assert_eq!(
        category["properties"]["children"]["items"]["$ref"],
        "#/components/schemas/Category"
    );
}

#[test]
fn duplicate_routes_are_withdrawn() {
    let router = TypedRouter::new();
    router
        .get("/items/{id}", |_: Context, _: ()| async { Ok::<_, ApiError>(()) })
        .unwrap();
    let err = router
        .get("/items/{item}", |_: Context, _: ()| async { Ok::<_, ApiError>(()) })
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateRoute { .. }));
    assert!(router
        .get("/items/{x}", |_: Context, _: ()| async { Ok::<_, ApiError>(()) })
        .is_err());

    router
        .post("/items/{id}", |_: Context, _: ()| async { Ok::<_, ApiError>(()) })
        .unwrap();

    let routes = router.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].method, http::Method::POST);

    let docs = ApiDocs::new(OpenApiConfig::default(), &router);
    let doc = docs.document();
    assert!(doc.paths["/items/{id}"].get.is_none());
    assert!(doc.paths["/items/{id}"].post.is_some());
}

#[test]
fn wildcard_routes_keep_their_segment() {
    let router = TypedRouter::new();
    let handler = router
        .get("/files/{bucket}/*", |_: Context, _: ()| async { Ok::<_, ApiError>(()) })
        .unwrap();

    let path = &handler.route().path;
    assert!(path.has_wildcard());
    assert_eq!(path.segments().last(), Some(&Segment::Wildcard));
    assert_eq!(handler.route().operation_id, "get_files_bucket_all");

    let docs = ApiDocs::new(OpenApiConfig::default(), &router);
    assert!(docs.document().paths.contains_key("/files/{bucket}/*"));
}

#[test]
fn docs_are_served_as_json() {
    let docs = ApiDocs::new(OpenApiConfig::new("Pets", "1.0.0"), &pet_router());
    let response = docs.http_response();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(response.headers()[http::header::CONTENT_TYPE], "application/json");
    assert_eq!(response.body(), docs.json());
}

#[derive(Debug, Serialize, Deserialize, Describe)]
struct Credentials {
    user: String,
    #[serde(skip_serializing)]
    password: String,
}

#[test]
fn skip_serializing_fields_are_documented_as_write_only() {
    let parsers = ParserRegistry::new();
    let (table, _) = compile(&parsers, &[TypeRef::of::<Credentials>()]);
    let credentials = serde_json::to_value(table.get("Credentials").unwrap()).unwrap();

    assert_eq!(credentials["properties"]["user"], json!({"type": "string"}));
    assert_eq!(
        credentials["properties"]["password"],
        json!({"type": "string", "writeOnly": true})
    );
}
