//! value representation
//!
//! A [Value] is the dynamic form of every resource body, variable default and output this crate handles.
//! It contains the following data types
//! - null (an unset optional, pointer or interface)
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving keyed mapping, where the key is of type string)
//! - struct (a composite with a fixed list of named, tagged fields)
//! - pointer (one level of indirection, dereferenced transparently by [crate::lookup])
//!
//! Objects and structs are deliberately different: a struct's field set comes from a [crate::types::Type], its
//! fields carry [Tags] and can be addressed by alias, while an object is just data.
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Struct(Struct),
    Pointer(Box<Value>),
}

impl Value {
    /// Short name of the variant, used in error messages and for assignment checks
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Struct(_) => "struct",
            Value::Pointer(_) => "pointer",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Sequences and keyed mappings can be aggregated over
    pub fn is_aggregable(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }
}

/// A composite value with named fields
#[derive(Debug, Clone, PartialEq, Default, derive_new::new)]
pub struct Struct {
    /// Name of the type this value was built from, may be empty
    pub name: String,
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Index of the field addressed by `key`
    ///
    /// Matches the field name exactly first, then ignoring ASCII case (if enabled), then the value of any of the
    /// `aliases` tags.
    pub fn position(&self, key: &str, aliases: &[String], case_insensitive: bool) -> Option<usize> {
        if let Some(index) = self.fields.iter().position(|f| f.name == key) {
            return Some(index);
        }

        if case_insensitive {
            if let Some(index) = self
                .fields
                .iter()
                .position(|f| f.name.eq_ignore_ascii_case(key))
            {
                return Some(index);
            }
        }

        self.fields.iter().position(|field| {
            aliases.iter().any(|alias| {
                field.tags.get(alias).is_some_and(|value| {
                    value == key || (case_insensitive && value.eq_ignore_ascii_case(key))
                })
            })
        })
    }

    /// Key used for this field in serialized documents
    fn serialized_key(field: &Field) -> &str {
        field
            .tags
            .get("json")
            .filter(|alias| !alias.is_empty() && *alias != "-")
            .unwrap_or(&field.name)
    }
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct Field {
    pub name: String,
    pub tags: Tags,
    pub value: Value,
}

/// Metadata aliases of a struct field
///
/// Uses the `key:"value" other:"value,option"` notation. Only the part before the first comma is an alias, the
/// remainder are options (e.g. `hcl:"network,block"`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Tags(String);

impl Tags {
    pub fn new(tags: impl Into<String>) -> Self {
        Self(tags.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Alias registered under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lookup(key)
            .map(|value| value.split(',').next().unwrap_or_default())
    }

    /// Options following the alias registered under `key`
    pub fn options(&self, key: &str) -> impl Iterator<Item = &str> {
        self.lookup(key)
            .into_iter()
            .flat_map(|value| value.split(',').skip(1))
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        let mut rest = self.0.trim_start();
        while !rest.is_empty() {
            let (name, after) = rest.split_once(':')?;
            let after = after.strip_prefix('"')?;
            let (value, after) = after.split_once('"')?;
            if name == key {
                return Some(value);
            }
            rest = after.trim_start();
        }

        None
    }
}

impl From<&str> for Tags {
    fn from(value: &str) -> Self {
        Tags::new(value)
    }
}

impl std::fmt::Display for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<hcl::Object<K, V>> for Value {
    fn from(value: hcl::Object<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl<K: ToString, V: Into<Value>> From<hcl::value::Map<K, V>> for Value {
    fn from(value: hcl::value::Map<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // every number that is not an i64 is representable as f64
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl From<hcl::Value> for Value {
    fn from(value: hcl::Value) -> Value {
        match value {
            hcl::Value::Null => Value::Null,
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(n) => n.into(),
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(a) => a.into(),
            hcl::Value::Object(o) => o.into(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => b.into(),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => s.into(),
            serde_json::Value::Array(a) => a.into(),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Expression is not a literal and can not be turned into a [Value] without evaluation
#[derive(thiserror::Error, Debug)]
#[error("expression is not a literal value: {0}")]
pub struct NotLiteral(String);

impl TryFrom<hcl::Expression> for Value {
    type Error = NotLiteral;

    fn try_from(value: hcl::Expression) -> Result<Self, Self::Error> {
        use hcl::Expression;

        Ok(match value {
            Expression::Null => Value::Null,
            Expression::Bool(bool) => bool.into(),
            Expression::Number(num) => num.into(),
            Expression::String(s) => s.into(),
            Expression::Array(array) => Value::Array(
                array
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Expression::Object(object) => Value::Object(
                object
                    .into_iter()
                    .map(|(k, v)| Ok((k.to_string(), Value::try_from(v)?)))
                    .collect::<Result<_, NotLiteral>>()?,
            ),
            Expression::Parenthesis(inner) => Value::try_from(*inner)?,
            other => return Err(NotLiteral(format!("{other:?}"))),
        })
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Pointer(value) => value.serialize(serializer),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Struct(value) => {
                let fields = value
                    .fields
                    .iter()
                    .filter(|field| field.tags.get("json") != Some("-"));
                let mut ser = serializer.serialize_map(None)?;
                for field in fields {
                    ser.serialize_entry(Struct::serialized_key(field), &field.value)?;
                }
                ser.end()
            }
        }
    }
}
