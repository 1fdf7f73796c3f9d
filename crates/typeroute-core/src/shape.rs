//! Type descriptor walker.
//!
//! Every type that can appear in a request or response record implements
//! [`Describe`]. Std types are covered here; user records get an impl from
//! `#[derive(Describe)]`. Shapes are built lazily and memoized per type
//! identity, so the pipeline and the schema compiler walk the same
//! [`TypeShape`] values.
//!
//! ```rust
//! use typeroute_core::shape::{describe, TypeShape};
//!
//! let shape = describe::<Option<Vec<u32>>>();
//! let TypeShape::Pointer(inner) = &*shape else { panic!() };
//! assert!(matches!(&*inner.shape(), TypeShape::Slice(_)));
//! ```

use crate::primitive::PrimitiveKind;
use serde_json::{Map, Value};
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use typeroute_validate::{Constraints, Section};

/// Runtime introspection for request and response types.
pub trait Describe: 'static {
    /// Short name used for schema component names and diagnostics.
    fn type_name() -> String;

    /// Build the shape of this type. Called at most once per identity
    /// through [`describe`].
    fn shape() -> TypeShape;

    /// The identity shapes are cached under. Smart pointers forward to
    /// their target.
    fn identity() -> TypeId {
        TypeId::of::<Self>()
    }
}

/// Category of a described type.
#[derive(Debug, Clone)]
pub enum TypeShape {
    Primitive(PrimitiveKind),
    /// Nullable wrapper (`Option<T>`)
    Pointer(TypeRef),
    /// Sequence of elements
    Slice(TypeRef),
    /// Key/value map
    Map(TypeRef, TypeRef),
    Record(RecordShape),
    /// Two/three/four-way union container
    Union(UnionShape),
    /// Anything the walker cannot classify (e.g. `serde_json::Value`)
    Opaque,
}

impl TypeShape {
    pub fn as_record(&self) -> Option<&RecordShape> {
        match self {
            TypeShape::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Whether a JSON `null` is a valid value of this shape.
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeShape::Pointer(_) | TypeShape::Opaque)
    }
}

/// A lazily described type.
///
/// Holds function pointers instead of the shape itself so recursive record
/// graphs can be declared without recursing at construction time.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: fn() -> String,
    shape: fn() -> Arc<TypeShape>,
}

impl TypeRef {
    pub fn of<T: Describe>() -> Self {
        Self {
            id: T::identity(),
            name: T::type_name,
            shape: describe::<T>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> String {
        (self.name)()
    }

    pub fn shape(&self) -> Arc<TypeShape> {
        (self.shape)()
    }

    /// Strip nullable wrappers.
    pub fn innermost(&self) -> TypeRef {
        let mut current = *self;
        while let TypeShape::Pointer(inner) = &*current.shape() {
            current = *inner;
        }
        current
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name()).finish()
    }
}

/// Declared discriminator of a union variant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    /// Property carrying the tag (e.g. `kind`)
    pub property: String,
    /// Tag value identifying this variant
    pub value: String,
}

/// Ordered fields of a record type.
#[derive(Debug, Clone, Default)]
pub struct RecordShape {
    fields: Vec<FieldSpec>,
    discriminator: Option<Discriminator>,
}

impl RecordShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the discriminator this record carries when used as a union variant.
    pub fn discriminator(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.discriminator = Some(Discriminator {
            property: property.into(),
            value: value.into(),
        });
        self
    }

    /// Append a field. Fields with an empty name or the `-` sentinel are dropped.
    pub fn field(mut self, field: FieldSpec) -> Self {
        if field.name.is_empty() || field.name == "-" {
            return self;
        }
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn discriminator_spec(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields read from (or written to) one section.
    pub fn in_section(&self, section: Section) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(move |f| f.section == section)
    }
}

/// Variant slots of a union container, in declared order.
#[derive(Debug, Clone)]
pub struct UnionShape {
    variants: Vec<TypeRef>,
}

impl UnionShape {
    pub fn new(variants: Vec<TypeRef>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[TypeRef] {
        &self.variants
    }

    /// The discriminator property shared by every variant, if any.
    pub fn discriminator_property(&self) -> Option<String> {
        let mut property: Option<String> = None;
        for variant in &self.variants {
            let shape = variant.shape();
            let declared = shape.as_record()?.discriminator_spec()?;
            match &property {
                Some(p) if *p != declared.property => return None,
                Some(_) => {}
                None => property = Some(declared.property.clone()),
            }
        }
        property
    }
}

/// Derived descriptor of one record field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// External name (annotation, serde name or identifier)
    pub name: String,
    /// Serde key of the field inside the record
    pub key: String,
    pub section: Section,
    pub constraints: Constraints,
    /// The field falls back to a default when absent
    pub defaulted: bool,
    /// Accepted in requests but never written to responses
    pub write_only: bool,
    pub ty: TypeRef,
}

impl FieldSpec {
    pub fn of<T: Describe>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            section: Section::Body,
            constraints: Constraints::default(),
            defaulted: false,
            write_only: false,
            ty: TypeRef::of::<T>(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn section(mut self, section: Section) -> Self {
        self.section = section;
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = self.constraints.merge(constraints);
        self
    }

    pub fn required(mut self) -> Self {
        self.constraints.required = true;
        self
    }

    pub fn defaulted(mut self) -> Self {
        self.defaulted = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.constraints.required
    }

    /// Whether the field may be left out without an error.
    pub fn may_be_absent(&self) -> bool {
        !self.constraints.required && (self.defaulted || self.ty.shape().is_nullable())
    }
}

type ShapeCache = RwLock<HashMap<TypeId, Arc<TypeShape>>>;

static SHAPES: OnceLock<ShapeCache> = OnceLock::new();

/// The memoized shape of `T`.
///
/// The cache lock is never held while a shape is being built, so shape
/// builders may describe other types freely.
pub fn describe<T: Describe>() -> Arc<TypeShape> {
    let cache = SHAPES.get_or_init(Default::default);
    let id = T::identity();
    if let Some(shape) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Arc::clone(shape);
    }
    let built = Arc::new(T::shape());
    let mut shapes = cache.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(shapes.entry(id).or_insert(built))
}

/// Direction of a field-name remap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    /// External names to serde keys (decode)
    Incoming,
    /// Serde keys to external names (encode)
    Outgoing,
}

/// Rename record properties between external names and serde keys.
///
/// Recurses through nullable, sequence and map shapes. Union payloads are
/// left alone; the union containers remap their own variant.
pub fn remap(ty: &TypeRef, value: Value, wire: Wire) -> Value {
    match (&*ty.shape(), value) {
        (TypeShape::Pointer(inner), value) => remap(inner, value, wire),
        (TypeShape::Slice(elem), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| remap(elem, item, wire))
                .collect(),
        ),
        (TypeShape::Map(_, val), Value::Object(entries)) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, remap(val, v, wire)))
                .collect(),
        ),
        (TypeShape::Record(record), Value::Object(entries)) => {
            Value::Object(remap_record(record, entries, wire))
        }
        (_, value) => value,
    }
}

fn remap_record(
    record: &RecordShape,
    mut entries: Map<String, Value>,
    wire: Wire,
) -> Map<String, Value> {
    let mut moved = Vec::with_capacity(record.fields().len());
    for field in record.fields() {
        let (from, to) = match wire {
            Wire::Incoming => (&field.name, &field.key),
            Wire::Outgoing => (&field.key, &field.name),
        };
        if let Some(v) = entries.remove(from.as_str()) {
            moved.push((to.clone(), remap(&field.ty, v, wire)));
        }
    }
    entries.extend(moved);
    entries
}

macro_rules! describe_primitive {
    ($($ty:ty => $kind:ident, $name:literal;)*) => {
        $(
            impl Describe for $ty {
                fn type_name() -> String {
                    $name.to_string()
                }

                fn shape() -> TypeShape {
                    TypeShape::Primitive(PrimitiveKind::$kind)
                }
            }
        )*
    };
}

describe_primitive! {
    bool => Bool, "bool";
    i8 => I8, "i8";
    i16 => I16, "i16";
    i32 => I32, "i32";
    i64 => I64, "i64";
    i128 => I128, "i128";
    isize => Isize, "isize";
    u8 => U8, "u8";
    u16 => U16, "u16";
    u32 => U32, "u32";
    u64 => U64, "u64";
    u128 => U128, "u128";
    usize => Usize, "usize";
    f32 => F32, "f32";
    f64 => F64, "f64";
    char => Char, "char";
    String => String, "String";
}

impl<T: Describe> Describe for Option<T> {
    fn type_name() -> String {
        format!("Option_{}", T::type_name())
    }

    fn shape() -> TypeShape {
        TypeShape::Pointer(TypeRef::of::<T>())
    }
}

macro_rules! describe_sequence {
    ($($ty:ident),*) => {
        $(
            impl<T: Describe> Describe for $ty<T> {
                fn type_name() -> String {
                    format!("{}_{}", stringify!($ty), T::type_name())
                }

                fn shape() -> TypeShape {
                    TypeShape::Slice(TypeRef::of::<T>())
                }
            }
        )*
    };
}

describe_sequence!(Vec, VecDeque, HashSet, BTreeSet);

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn type_name() -> String {
        format!("Array{}_{}", N, T::type_name())
    }

    fn shape() -> TypeShape {
        TypeShape::Slice(TypeRef::of::<T>())
    }
}

impl<K: Describe, V: Describe> Describe for HashMap<K, V> {
    fn type_name() -> String {
        format!("HashMap_{}_{}", K::type_name(), V::type_name())
    }

    fn shape() -> TypeShape {
        TypeShape::Map(TypeRef::of::<K>(), TypeRef::of::<V>())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn type_name() -> String {
        format!("BTreeMap_{}_{}", K::type_name(), V::type_name())
    }

    fn shape() -> TypeShape {
        TypeShape::Map(TypeRef::of::<K>(), TypeRef::of::<V>())
    }
}

impl<T: Describe> Describe for Box<T> {
    fn type_name() -> String {
        T::type_name()
    }

    fn shape() -> TypeShape {
        (*describe::<T>()).clone()
    }

    fn identity() -> TypeId {
        T::identity()
    }
}

impl<T: Describe> Describe for Arc<T> {
    fn type_name() -> String {
        T::type_name()
    }

    fn shape() -> TypeShape {
        (*describe::<T>()).clone()
    }

    fn identity() -> TypeId {
        T::identity()
    }
}

impl Describe for Value {
    fn type_name() -> String {
        "Value".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Opaque
    }
}

impl Describe for () {
    fn type_name() -> String {
        "Empty".to_string()
    }

    fn shape() -> TypeShape {
        TypeShape::Opaque
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Node;

    impl Describe for Node {
        fn type_name() -> String {
            "Node".into()
        }

        fn shape() -> TypeShape {
            TypeShape::Record(
                RecordShape::new()
                    .field(FieldSpec::of::<String>("label").required())
                    .field(FieldSpec::of::<Vec<Node>>("children").key("kids"))
                    .field(FieldSpec::of::<Option<Box<Node>>>("parent"))
                    .field(FieldSpec::of::<u8>("-"))
                    .field(FieldSpec::of::<u8>("")),
            )
        }
    }

    #[test]
    fn primitives_are_classified_explicitly() {
        assert!(matches!(
            &*describe::<u16>(),
            TypeShape::Primitive(PrimitiveKind::U16)
        ));
        assert!(matches!(
            &*describe::<char>(),
            TypeShape::Primitive(PrimitiveKind::Char)
        ));
        assert!(matches!(&*describe::<Value>(), TypeShape::Opaque));
    }

    #[test]
    fn containers_wrap_their_elements() {
        let TypeShape::Map(k, v) = &*describe::<HashMap<String, Vec<i64>>>() else {
            panic!("expected map");
        };
        assert_eq!(k.name(), "String");
        assert!(matches!(&*v.shape(), TypeShape::Slice(_)));
    }

    #[test]
    fn recursive_records_describe_without_recursing() {
        let shape = describe::<Node>();
        let record = shape.as_record().unwrap();
        let names: Vec<_> = record.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["label", "children", "parent"]);
    }

    #[test]
    fn shapes_are_memoized() {
        let a = describe::<Node>();
        let b = describe::<Node>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn smart_pointers_share_identity() {
        assert_eq!(TypeRef::of::<Box<Node>>(), TypeRef::of::<Node>());
        assert_eq!(TypeRef::of::<Arc<Node>>().id(), TypeId::of::<Node>());
        assert!(Arc::ptr_eq(&describe::<Box<Node>>(), &describe::<Node>()));
    }

    #[test]
    fn innermost_strips_options() {
        assert_eq!(
            TypeRef::of::<Option<Option<u8>>>().innermost(),
            TypeRef::of::<u8>()
        );
    }

    #[test]
    fn absence_rules() {
        let shape = describe::<Node>();
        let record = shape.as_record().unwrap();
        assert!(!record.fields()[0].may_be_absent());
        assert!(!record.fields()[1].may_be_absent());
        assert!(record.fields()[2].may_be_absent());
        assert!(record.fields()[1].clone().defaulted().may_be_absent());
    }

    #[test]
    fn remap_moves_keys_recursively() {
        let ty = TypeRef::of::<Node>();
        let wire = json!({
            "label": "root",
            "children": [{"label": "leaf", "children": []}],
            "extra": true
        });
        let inner = remap(&ty, wire.clone(), Wire::Incoming);
        assert_eq!(inner["kids"][0]["kids"], json!([]));
        assert!(inner.get("children").is_none());
        assert_eq!(inner["extra"], json!(true));

        assert_eq!(remap(&ty, inner, Wire::Outgoing), wire);
    }
}
