//! Schema compiler.
//!
//! Walks described types and produces reference-based schemas. Records and
//! unions become named components, everything else is inlined. A record is
//! registered under its identity before its fields are visited, so
//! recursive types resolve to a `$ref` of themselves.

use crate::schema::{Discriminator, Schema};
use serde_json::Value;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use typeroute_core::{
    FieldSpec, ParserRegistry, PrimitiveKind, RecordShape, TypeRef, TypeShape, UnionShape,
};
use typeroute_validate::{Constraints, Section};

/// Compiled components, one per distinct type identity.
#[derive(Debug, Clone, Default)]
pub struct ComponentTable {
    names: HashMap<TypeId, String>,
    schemas: BTreeMap<String, Schema>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Component name assigned to a type, if it was compiled.
    pub fn name_of(&self, ty: &TypeRef) -> Option<&str> {
        self.names.get(&ty.id()).map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn schemas(&self) -> &BTreeMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Reserve a name for `id` with an empty placeholder schema.
    ///
    /// Distinct identities with the same base name get `_2`, `_3`, ...
    /// suffixes in registration order.
    pub(crate) fn reserve(&mut self, id: TypeId, base: &str) -> (String, bool) {
        if let Some(name) = self.names.get(&id) {
            return (name.clone(), false);
        }
        let base = sanitize(base);
        let mut name = base.clone();
        let mut n = 1;
        while self.schemas.contains_key(&name) {
            n += 1;
            name = format!("{base}_{n}");
        }
        self.names.insert(id, name.clone());
        self.schemas.insert(name.clone(), Schema::any());
        (name, true)
    }

    pub(crate) fn fill(&mut self, name: &str, schema: Schema) {
        self.schemas.insert(name.to_string(), schema);
    }
}

/// Component names may only use `[A-Za-z0-9._-]`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "Anonymous".to_string()
    } else {
        cleaned
    }
}

/// Compiles described types against a parser registry.
#[derive(Debug)]
pub struct SchemaCompiler<'a> {
    parsers: &'a ParserRegistry,
    table: ComponentTable,
}

impl<'a> SchemaCompiler<'a> {
    pub fn new(parsers: &'a ParserRegistry) -> Self {
        Self {
            parsers,
            table: ComponentTable::new(),
        }
    }

    pub fn table(&self) -> &ComponentTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ComponentTable {
        &mut self.table
    }

    pub fn finish(self) -> ComponentTable {
        self.table
    }

    fn has_parser(&self, ty: &TypeRef) -> bool {
        self.parsers.contains(ty.id())
    }

    /// Schema of `ty`: a `$ref` for records and unions, inline otherwise.
    pub fn schema_for(&mut self, ty: &TypeRef) -> Schema {
        if self.has_parser(ty) {
            return Schema::string();
        }
        let shape = ty.shape();
        match &*shape {
            TypeShape::Primitive(kind) => primitive(*kind),
            TypeShape::Pointer(inner) => self.schema_for(inner).nullable(),
            TypeShape::Slice(elem) => Schema::array(self.schema_for(elem)),
            TypeShape::Map(_, val) => Schema::map(self.schema_for(val)),
            TypeShape::Opaque => Schema::any(),
            TypeShape::Record(record) => {
                let (name, fresh) = self.table.reserve(ty.id(), &ty.name());
                if fresh {
                    let compiled = self.record(record);
                    self.table.fill(&name, compiled);
                }
                Schema::reference(&name)
            }
            TypeShape::Union(union) => {
                let (name, fresh) = self.table.reserve(ty.id(), &ty.name());
                if fresh {
                    let compiled = self.union(union);
                    self.table.fill(&name, compiled);
                }
                Schema::reference(&name)
            }
        }
    }

    /// Schema of one field, constraints applied.
    pub fn field_schema(&mut self, field: &FieldSpec) -> Schema {
        let schema = self.schema_for(&field.ty);
        let kind = match &*field.ty.innermost().shape() {
            TypeShape::Primitive(kind) => Some(*kind),
            _ => None,
        };
        apply_constraints(schema, &field.constraints, kind)
    }

    /// Whether the documented field is required.
    ///
    /// Parser-backed fields are never marked required.
    pub fn is_required(&self, field: &FieldSpec) -> bool {
        field.is_required()
            && !self.has_parser(&field.ty)
            && !self.has_parser(&field.ty.innermost())
    }

    fn record(&mut self, record: &RecordShape) -> Schema {
        let mut schema = Schema::object();
        if let Some(declared) = record.discriminator_spec() {
            let tag = Schema {
                enum_values: Some(vec![Value::String(declared.value.clone())]),
                ..Schema::string()
            };
            schema = schema
                .with_property(declared.property.clone(), tag)
                .with_required(declared.property.clone());
        }
        for field in record.in_section(Section::Body) {
            let mut compiled = self.field_schema(field);
            if field.write_only {
                compiled.write_only = Some(true);
            }
            schema = schema.with_property(field.name.clone(), compiled);
            if self.is_required(field) {
                schema = schema.with_required(field.name.clone());
            }
        }
        if schema.properties.is_none() {
            schema.properties = Some(BTreeMap::new());
        }
        schema
    }

    fn union(&mut self, union: &UnionShape) -> Schema {
        let variants: Vec<Schema> = union
            .variants()
            .iter()
            .map(|variant| self.schema_for(variant))
            .collect();

        let discriminator = union.discriminator_property().map(|property| {
            let mapping: BTreeMap<String, String> = union
                .variants()
                .iter()
                .zip(&variants)
                .filter_map(|(variant, compiled)| {
                    let shape = variant.shape();
                    let declared = shape.as_record()?.discriminator_spec()?;
                    Some((declared.value.clone(), compiled.reference.clone()?))
                })
                .collect();
            Discriminator {
                property_name: property,
                mapping: (!mapping.is_empty()).then_some(mapping),
            }
        });

        Schema {
            one_of: Some(variants),
            discriminator,
            ..Default::default()
        }
    }
}

/// Compile `types` into a fresh component table.
///
/// Returns the table and one root schema per input type, in order.
pub fn compile(parsers: &ParserRegistry, types: &[TypeRef]) -> (ComponentTable, Vec<Schema>) {
    let mut compiler = SchemaCompiler::new(parsers);
    let roots = types.iter().map(|ty| compiler.schema_for(ty)).collect();
    (compiler.finish(), roots)
}

fn primitive(kind: PrimitiveKind) -> Schema {
    use PrimitiveKind::*;
    match kind {
        Bool => Schema::boolean(),
        I8 | I16 | I32 => Schema::integer().with_format("int32"),
        I64 | Isize => Schema::integer().with_format("int64"),
        I128 => Schema::integer(),
        U8 | U16 | U32 => Schema::integer().with_format("int32").with_minimum(0.0),
        U64 | Usize => Schema::integer().with_format("int64").with_minimum(0.0),
        U128 => Schema::integer().with_minimum(0.0),
        F32 => Schema::number().with_format("float"),
        F64 => Schema::number().with_format("double"),
        Char => Schema {
            min_length: Some(1),
            max_length: Some(1),
            ..Schema::string()
        },
        String => Schema::string(),
    }
}

fn apply_constraints(
    mut schema: Schema,
    constraints: &Constraints,
    kind: Option<PrimitiveKind>,
) -> Schema {
    if let Some(min) = constraints.minimum {
        schema.minimum = Some(min);
    }
    if let Some(max) = constraints.maximum {
        schema.maximum = Some(max);
    }
    if let Some(min) = constraints.min_length {
        schema.min_length = Some(min as u64);
    }
    if let Some(max) = constraints.max_length {
        schema.max_length = Some(max as u64);
    }
    if let Some(pattern) = &constraints.pattern {
        schema.pattern = Some(pattern.as_str().to_string());
    }
    if let Some(format) = &constraints.format {
        schema.format = Some(format.as_str().to_string());
    }
    if !constraints.one_of.is_empty() {
        let values = constraints
            .one_of
            .iter()
            .map(|raw| match kind {
                Some(kind) => kind.convert(raw).unwrap_or_else(|_| Value::String(raw.clone())),
                None => Value::String(raw.clone()),
            })
            .collect();
        schema.enum_values = Some(values);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use typeroute_core::{Describe, ParseError, Union2};

    struct Node;

    impl Describe for Node {
        fn type_name() -> String {
            "Node".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .field(FieldSpec::of::<String>("label").required())
                    .field(FieldSpec::of::<Vec<Node>>("children"))
                    .field(FieldSpec::of::<Option<Box<Node>>>("parent")),
            )
        }
    }

    struct Account;

    impl Describe for Account {
        fn type_name() -> String {
            "Account".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .field(
                        FieldSpec::of::<u8>("age")
                            .constraints(Constraints::parse("required,min=18,max=120")),
                    )
                    .field(
                        FieldSpec::of::<String>("plan")
                            .constraints(Constraints::parse("oneof=free|pro")),
                    )
                    .field(
                        FieldSpec::of::<String>("email")
                            .constraints(Constraints::parse("format=email")),
                    )
                    .field(FieldSpec::of::<String>("token").section(Section::Header).required())
                    .field(FieldSpec::of::<Slug>("slug").required()),
            )
        }
    }

    #[derive(serde::Serialize)]
    struct Slug(String);

    impl Describe for Slug {
        fn type_name() -> String {
            "Slug".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Primitive(PrimitiveKind::String)
        }
    }

    struct Cat;
    struct Dog;

    impl Describe for Cat {
        fn type_name() -> String {
            "Cat".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .discriminator("kind", "cat")
                    .field(FieldSpec::of::<bool>("purrs")),
            )
        }
    }

    impl Describe for Dog {
        fn type_name() -> String {
            "Dog".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .discriminator("kind", "dog")
                    .field(FieldSpec::of::<u32>("barks")),
            )
        }
    }

    mod other {
        use super::*;

        pub struct Cat;

        impl Describe for Cat {
            fn type_name() -> String {
                "Cat".into()
            }

            fn shape() -> TypeShape {
                TypeShape::Record(RecordShape::new().field(FieldSpec::of::<String>("name")))
            }
        }
    }

    fn json_of(schema: &Schema) -> Value {
        serde_json::to_value(schema).unwrap()
    }

    #[test]
    fn primitives_carry_formats() {
        let parsers = ParserRegistry::new();
        let (table, roots) = compile(
            &parsers,
            &[
                TypeRef::of::<i32>(),
                TypeRef::of::<u64>(),
                TypeRef::of::<f32>(),
                TypeRef::of::<char>(),
            ],
        );
        assert!(table.is_empty());
        assert_eq!(json_of(&roots[0]), json!({"type": "integer", "format": "int32"}));
        assert_eq!(
            json_of(&roots[1]),
            json!({"type": "integer", "format": "int64", "minimum": 0.0})
        );
        assert_eq!(json_of(&roots[2]), json!({"type": "number", "format": "float"}));
        assert_eq!(json_of(&roots[3]), json!({"type": "string", "minLength": 1, "maxLength": 1}));
    }

    #[test]
    fn containers_are_inlined() {
        let parsers = ParserRegistry::new();
        let (_, roots) = compile(
            &parsers,
            &[
                TypeRef::of::<Option<Vec<String>>>(),
                TypeRef::of::<std::collections::HashMap<String, bool>>(),
                TypeRef::of::<Value>(),
            ],
        );
        assert_eq!(
            json_of(&roots[0]),
            json!({"type": ["array", "null"], "items": {"type": "string"}})
        );
        assert_eq!(
            json_of(&roots[1]),
            json!({"type": "object", "additionalProperties": {"type": "boolean"}})
        );
        assert_eq!(json_of(&roots[2]), json!({}));
    }

    #[test]
    fn recursive_records_reference_themselves() {
        let parsers = ParserRegistry::new();
        let (table, roots) = compile(&parsers, &[TypeRef::of::<Node>()]);

        assert_eq!(json_of(&roots[0]), json!({"$ref": "#/components/schemas/Node"}));
        assert_eq!(table.len(), 1);
        assert_eq!(
            json_of(table.get("Node").unwrap()),
            json!({
                "type": "object",
                "properties": {
                    "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}},
                    "label": {"type": "string"},
                    "parent": {"anyOf": [{"$ref": "#/components/schemas/Node"}, {"type": "null"}]}
                },
                "required": ["label"]
            })
        );
    }

    #[test]
    fn constraints_translate_and_only_body_fields_are_properties() {
        let mut parsers = ParserRegistry::new();
        parsers.register(|_ctx: &typeroute_core::Context, raw: &str| {
            Ok::<_, ParseError>(Slug(raw.to_lowercase()))
        });
        let (table, _) = compile(&parsers, &[TypeRef::of::<Account>()]);
        let account = json_of(table.get("Account").unwrap());

        assert_eq!(
            account["properties"]["age"],
            json!({"type": "integer", "format": "int32", "minimum": 18.0, "maximum": 120.0})
        );
        assert_eq!(account["properties"]["plan"]["enum"], json!(["free", "pro"]));
        assert_eq!(account["properties"]["email"]["format"], "email");
        assert_eq!(account["properties"]["slug"], json!({"type": "string"}));
        assert!(account["properties"].get("token").is_none());
        // The parser-backed slug is not required.
        assert_eq!(account["required"], json!(["age"]));
    }

    #[test]
    fn unions_compile_to_one_of_with_mapping() {
        let parsers = ParserRegistry::new();
        let (table, roots) = compile(&parsers, &[TypeRef::of::<Union2<Cat, Dog>>()]);

        assert_eq!(json_of(&roots[0]), json!({"$ref": "#/components/schemas/CatOrDog"}));
        assert_eq!(
            json_of(table.get("CatOrDog").unwrap()),
            json!({
                "oneOf": [
                    {"$ref": "#/components/schemas/Cat"},
                    {"$ref": "#/components/schemas/Dog"}
                ],
                "discriminator": {
                    "propertyName": "kind",
                    "mapping": {
                        "cat": "#/components/schemas/Cat",
                        "dog": "#/components/schemas/Dog"
                    }
                }
            })
        );
        assert_eq!(
            json_of(table.get("Cat").unwrap())["properties"]["kind"],
            json!({"type": "string", "enum": ["cat"]})
        );
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let parsers = ParserRegistry::new();
        let (table, roots) = compile(
            &parsers,
            &[TypeRef::of::<Cat>(), TypeRef::of::<other::Cat>(), TypeRef::of::<Cat>()],
        );
        assert_eq!(table.name_of(&TypeRef::of::<Cat>()), Some("Cat"));
        assert_eq!(table.name_of(&TypeRef::of::<other::Cat>()), Some("Cat_2"));
        assert_eq!(roots[0], roots[2]);
        assert_eq!(table.len(), 2);
    }

    fn pool() -> Vec<TypeRef> {
        vec![
            TypeRef::of::<Node>(),
            TypeRef::of::<Account>(),
            TypeRef::of::<Union2<Cat, Dog>>(),
            TypeRef::of::<other::Cat>(),
            TypeRef::of::<Vec<Cat>>(),
            TypeRef::of::<Option<u16>>(),
        ]
    }

    proptest! {
        #[test]
        fn compiling_twice_is_identical(picks in proptest::collection::vec(0usize..6, 1..8)) {
            let pool = pool();
            let types: Vec<TypeRef> = picks.iter().map(|&i| pool[i]).collect();
            let parsers = ParserRegistry::new();

            let (first, first_roots) = compile(&parsers, &types);
            let (second, second_roots) = compile(&parsers, &types);

            prop_assert_eq!(
                serde_json::to_string(first.schemas()).unwrap(),
                serde_json::to_string(second.schemas()).unwrap()
            );
            prop_assert_eq!(first_roots, second_roots);
        }
    }
}
