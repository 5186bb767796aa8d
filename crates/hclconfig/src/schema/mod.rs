//! dynamic schemas
//!
//! Lets a process work with a resource type it has no Rust definition for.
//!
//! 1. The owner of a type describes it with [describe], producing a [SchemaNode] tree. The tree is a plain
//!    document (`name`, `type`, `tags`, `properties`) that can be sent to another process as json or yaml.
//! 2. The receiving side calls [reconstruct] to get a [DynamicValue] of an equivalent [Type], decodes its
//!    configuration into it ([DynamicValue::new]) and navigates or modifies it like any other value.
//! 3. The populated value travels back as a json document and the owner turns it into its own concrete type with
//!    [exchange].
//!
//! Each field's shape is encoded in a type string (see [property_type]). Struct elements are not encoded in the
//! string, their fields become the node's `properties` instead.
use crate::lookup::{self, Navigator};
use crate::path::{Path, Segment};
use crate::types::{FieldType, Scalar, StructType, Type, Typed};
use crate::value::{Field, Struct, Tags, Value};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub mod property_type;
pub use property_type::PropertyType;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to parse type string '{0}'")]
    UnparseableTypeString(String),
    #[error("type {0} can not be described, at most one container and two pointers are supported")]
    Unencodable(String),
    #[error("property '{0}' has a leaf type but defines properties")]
    LeafWithProperties(String),
    #[error("can not decode {found} as {expected} at '{path}'")]
    Decode {
        path: String,
        expected: String,
        found: &'static str,
    },
    #[error("document does not fit the destination type")]
    SchemaReconstructionFailure(#[source] serde_json::Error),
    #[error("unable to assign value")]
    Lookup(#[from] lookup::Error),
}

/// Transmissible description of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct SchemaNode {
    /// Field name, or the type name for the root node
    pub name: String,
    #[serde(rename = "type")]
    pub type_string: String,
    #[serde(default, alias = "metadataAliases", skip_serializing_if = "String::is_empty")]
    pub tags: String,
    #[serde(default, alias = "children", skip_serializing_if = "Vec::is_empty")]
    #[new(default)]
    pub properties: Vec<SchemaNode>,
}

impl SchemaNode {
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Describe `ty`
///
/// Nested structs deeper than `max_depth` levels are left out entirely, `None` describes everything.
pub fn describe(ty: &Type, max_depth: Option<usize>) -> Result<SchemaNode, Error> {
    let (property_type, st) = PropertyType::encode(ty)?;

    let name = st.map(|st| st.name.clone()).unwrap_or_default();
    let mut node = SchemaNode::new(name, property_type.to_string(), String::new());
    if let Some(st) = st {
        node.properties = describe_fields(st, 1, max_depth)?;
    }

    Ok(node)
}

pub fn describe_typed<T: Typed>(max_depth: Option<usize>) -> Result<SchemaNode, Error> {
    describe(&T::type_of(), max_depth)
}

fn describe_fields(
    st: &StructType,
    depth: usize,
    max_depth: Option<usize>,
) -> Result<Vec<SchemaNode>, Error> {
    let mut properties = Vec::with_capacity(st.fields.len());

    for field in &st.fields {
        let (property_type, nested) = PropertyType::encode(&field.ty)?;
        let mut node = SchemaNode::new(
            field.name.clone(),
            property_type.to_string(),
            field.tags.to_string(),
        );

        if let Some(nested) = nested {
            if max_depth.is_some_and(|max| depth >= max) {
                tracing::trace!(field = %field.name, depth, "depth limit reached, field omitted");
                continue;
            }
            node.properties = describe_fields(nested, depth + 1, max_depth)?;
        }

        properties.push(node);
    }

    Ok(properties)
}

/// Build a zeroed [DynamicValue] from a schema tree
pub fn reconstruct(node: &SchemaNode) -> Result<DynamicValue, Error> {
    let ty = build_type(node, true)?;
    Ok(DynamicValue::zero(ty))
}

fn build_type(node: &SchemaNode, root: bool) -> Result<Type, Error> {
    let property_type: PropertyType = node.type_string.parse()?;

    if !property_type.is_struct() {
        if !node.properties.is_empty() {
            return Err(Error::LeafWithProperties(node.name.clone()));
        }
        return Ok(property_type.decode(None));
    }

    // nested struct types are anonymous, the node's name belongs to the field
    let mut st = StructType::new(if root { node.name.as_str() } else { "" });
    for child in &node.properties {
        st.fields.push(FieldType::new(
            child.name.clone(),
            Tags::new(child.tags.clone()),
            build_type(child, false)?,
        ));
    }

    Ok(property_type.decode(Some(st)))
}

/// Turn a dynamic value into a concrete type through its json document
pub fn exchange<T: DeserializeOwned>(value: &DynamicValue) -> Result<T, Error> {
    let document = value.to_json()?;
    serde_json::from_value(document).map_err(Error::SchemaReconstructionFailure)
}

/// A [Value] together with the [Type] it was shaped by
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    ty: Type,
    value: Value,
}

impl DynamicValue {
    /// Decode `value` into `ty`, see [decode]
    pub fn new(ty: Type, value: Value) -> Result<Self, Error> {
        let value = decode(&ty, value)?;
        Ok(Self { ty, value })
    }

    pub fn zero(ty: Type) -> Self {
        let value = ty.zero_value();
        Self { ty, value }
    }

    pub fn from_json(ty: Type, document: serde_json::Value) -> Result<Self, Error> {
        Self::new(ty, document.into())
    }

    pub fn from_typed<T: Typed + Serialize>(value: &T) -> Result<Self, Error> {
        let document = serde_json::to_value(value).map_err(Error::SchemaReconstructionFailure)?;
        Self::from_json(T::type_of(), document)
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Mutable access for in place writes ([crate::lookup::Navigator::set])
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Assign `value` at `path`, it must fit the declared type of that location
    pub fn set(&mut self, navigator: &Navigator, path: &Path, value: Value) -> Result<(), Error> {
        navigator.set_typed(&self.ty, &mut self.value, path, value)?;
        Ok(())
    }

    pub fn describe(&self, max_depth: Option<usize>) -> Result<SchemaNode, Error> {
        describe(&self.ty, max_depth)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(&self.value).map_err(Error::SchemaReconstructionFailure)
    }

    pub fn exchange<T: DeserializeOwned>(&self) -> Result<T, Error> {
        exchange(self)
    }
}

/// Shape an untyped value into `ty`
///
/// - objects (or structs) become structs, keys match a field's name, its `json` or `hcl` alias, or its name
///   ignoring ASCII case. Missing fields are zeroed, unknown keys ignored.
/// - a single element array holding an object decodes into a struct (a nested hcl block)
/// - integers widen to floats
/// - null is accepted for every type
pub fn decode(ty: &Type, value: Value) -> Result<Value, Error> {
    decode_at(ty, value, &mut vec![])
}

fn decode_at(ty: &Type, value: Value, path: &mut Vec<String>) -> Result<Value, Error> {
    let mut value = value;
    while let Value::Pointer(inner) = value {
        value = *inner;
    }

    let mismatch = |path: &[String], found: &Value| Error::Decode {
        path: path.join("."),
        expected: ty.to_string(),
        found: found.type_name(),
    };

    match (ty, value) {
        (_, Value::Null) => Ok(Value::Null),
        (Type::Leaf(Scalar::Interface), value) => Ok(value),
        (Type::Pointer(referent), value) => {
            Ok(Value::Pointer(Box::new(decode_at(referent, value, path)?)))
        }
        (Type::Leaf(Scalar::Bool), value @ Value::Boolean(_)) => Ok(value),
        (Type::Leaf(Scalar::String), value @ Value::String(_)) => Ok(value),
        (Type::Leaf(scalar), value @ Value::Integer(_)) if scalar.is_integer() => Ok(value),
        (Type::Leaf(scalar), Value::Integer(int)) if scalar.is_float() => {
            Ok(Value::Decimal(int as f64))
        }
        (Type::Leaf(scalar), value @ Value::Decimal(_)) if scalar.is_float() => Ok(value),
        (Type::Slice(element), Value::Array(items)) => {
            let mut decoded = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                path.push(index.to_string());
                decoded.push(decode_at(element, item, path)?);
                path.pop();
            }
            Ok(Value::Array(decoded))
        }
        (Type::Map(_, element), Value::Object(entries)) => {
            let mut decoded = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                path.push(key.clone());
                let item = decode_at(element, item, path)?;
                path.pop();
                decoded.insert(key, item);
            }
            Ok(Value::Object(decoded))
        }
        (Type::Struct(st), Value::Object(entries)) => decode_struct(st, entries, path),
        (Type::Struct(st), Value::Struct(value)) => {
            let entries = value
                .fields
                .into_iter()
                .map(|field| (field.name, field.value))
                .collect();
            decode_struct(st, entries, path)
        }
        (Type::Struct(_), Value::Array(mut items))
            if items.len() == 1 && matches!(items[0], Value::Object(_)) =>
        {
            let item = items.remove(0);
            decode_at(ty, item, path)
        }
        (_, value) => Err(mismatch(path, &value)),
    }
}

fn decode_struct(
    st: &StructType,
    mut entries: IndexMap<String, Value>,
    path: &mut Vec<String>,
) -> Result<Value, Error> {
    let mut fields = Vec::with_capacity(st.fields.len());

    for field in &st.fields {
        let value = match find_key(&entries, field).and_then(|key| entries.shift_remove(&key)) {
            Some(value) => {
                path.push(field.name.clone());
                let value = decode_at(&field.ty, value, path)?;
                path.pop();
                value
            }
            None => field.ty.zero_value(),
        };

        fields.push(Field::new(field.name.clone(), field.tags.clone(), value));
    }

    for key in entries.keys() {
        tracing::debug!(%key, ty = %st.name, "ignoring unknown key");
    }

    Ok(Value::Struct(Struct::new(st.name.clone(), fields)))
}

/// Where a location inside an undecoded value ends up after [decode]
///
/// Struct keys become field names and the index of a nested block that was collapsed into its struct is
/// dropped. `None` if decoding discards the location (unknown keys, leaves).
pub fn decoded_path(ty: &Type, path: &Path) -> Option<Path> {
    let mut decoded = Path::default();
    let mut ty = ty;
    let mut segments = path.segments().iter();

    while let Some(segment) = segments.next() {
        match deref_type(ty) {
            Type::Leaf(Scalar::Interface) => {
                decoded.push(segment.clone());
                for segment in segments.by_ref() {
                    decoded.push(segment.clone());
                }
            }
            Type::Leaf(_) => return None,
            Type::Pointer(_) => unreachable!("deref_type strips pointers"),
            Type::Slice(element) => {
                segment.as_index()?;
                decoded.push(segment.clone());
                ty = element;
            }
            Type::Map(_, element) => {
                let (next, index) = indexed(element, segment.index)?;
                decoded.push(Segment::new(segment.name.clone(), index));
                ty = next;
            }
            // single block, collapsed into the struct itself
            Type::Struct(_) if segment.as_index() == Some(0) => {}
            Type::Struct(st) => {
                let field = field_for_key(st, &segment.name)?;
                let (next, index) = indexed(&field.ty, segment.index)?;
                decoded.push(Segment::new(field.name.clone(), index));
                ty = next;
            }
        }
    }

    Some(decoded)
}

fn deref_type(mut ty: &Type) -> &Type {
    while let Type::Pointer(referent) = ty {
        ty = referent;
    }
    ty
}

/// Apply a bracketed index to `ty`, an index `0` on a struct is the collapsed block
fn indexed(ty: &Type, index: Option<usize>) -> Option<(&Type, Option<usize>)> {
    let Some(index) = index else {
        return Some((ty, None));
    };

    match deref_type(ty) {
        Type::Slice(element) => Some((element.as_ref(), Some(index))),
        Type::Struct(_) if index == 0 => Some((ty, None)),
        Type::Leaf(Scalar::Interface) => Some((ty, Some(index))),
        _ => None,
    }
}

/// Field a key of an undecoded object maps to, same rules as [find_key]
fn field_for_key<'t>(st: &'t StructType, key: &str) -> Option<&'t FieldType> {
    st.fields
        .iter()
        .find(|field| field.name == key)
        .or_else(|| {
            st.fields.iter().find(|field| {
                ["json", "hcl"]
                    .into_iter()
                    .filter_map(|tag| field.tags.get(tag))
                    .any(|alias| alias != "-" && alias == key)
            })
        })
        .or_else(|| st.fields.iter().find(|field| field.name.eq_ignore_ascii_case(key)))
}

fn find_key(entries: &IndexMap<String, Value>, field: &FieldType) -> Option<String> {
    if entries.contains_key(&field.name) {
        return Some(field.name.clone());
    }

    let alias = ["json", "hcl"]
        .into_iter()
        .filter_map(|tag| field.tags.get(tag))
        .filter(|alias| !alias.is_empty() && *alias != "-")
        .find(|alias| entries.contains_key(*alias));
    if let Some(alias) = alias {
        return Some(alias.to_string());
    }

    entries
        .keys()
        .find(|key| key.eq_ignore_ascii_case(&field.name))
        .cloned()
}
