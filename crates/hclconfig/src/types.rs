//! explicit type shapes
//!
//! Rust has no runtime reflection, so every resource type that takes part in navigation or schema exchange
//! describes its shape as a [Type]. Concrete types implement [Typed]; types that only exist at runtime (e.g.
//! reconstructed from a plugin's schema) carry their [Type] in a [crate::schema::DynamicValue].
use crate::value::{Field, Struct, Tags, Value};

/// Shape of a value
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Leaf(Scalar),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    /// keyed mapping, keys are always stored as strings but remember their declared kind
    Map(Scalar, Box<Type>),
    Struct(StructType),
}

impl Type {
    pub fn pointer(referent: Type) -> Self {
        Type::Pointer(Box::new(referent))
    }

    pub fn slice(element: Type) -> Self {
        Type::Slice(Box::new(element))
    }

    pub fn map(key: Scalar, element: Type) -> Self {
        Type::Map(key, Box::new(element))
    }

    pub fn of<T: Typed>() -> Self {
        T::type_of()
    }

    /// The zero value of this type
    ///
    /// Pointers and interfaces start out null, containers empty, structs with all fields zeroed.
    pub fn zero_value(&self) -> Value {
        match self {
            Type::Leaf(scalar) => scalar.zero_value(),
            Type::Pointer(_) => Value::Null,
            Type::Slice(_) => Value::Array(vec![]),
            Type::Map(_, _) => Value::Object(Default::default()),
            Type::Struct(st) => Value::Struct(Struct::new(
                st.name.clone(),
                st.fields
                    .iter()
                    .map(|field| {
                        Field::new(field.name.clone(), field.tags.clone(), field.ty.zero_value())
                    })
                    .collect(),
            )),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Leaf(scalar) => write!(f, "{scalar}"),
            Type::Pointer(referent) => write!(f, "*{referent}"),
            Type::Slice(element) => write!(f, "[]{element}"),
            Type::Map(key, element) => write!(f, "map[{key}]{element}"),
            Type::Struct(st) if st.name.is_empty() => f.write_str("struct"),
            Type::Struct(st) => f.write_str(&st.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<FieldType>,
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![],
        }
    }

    /// Builder style field declaration
    pub fn field(mut self, name: impl Into<String>, tags: impl Into<Tags>, ty: Type) -> Self {
        self.fields.push(FieldType::new(name.into(), tags.into(), ty));
        self
    }

    /// Field addressed by `key`, see [Struct::position] for the matching rules
    pub fn find(&self, key: &str, aliases: &[String], case_insensitive: bool) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == key)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|f| case_insensitive && f.name.eq_ignore_ascii_case(key))
            })
            .or_else(|| {
                self.fields.iter().find(|f| {
                    aliases.iter().any(|alias| {
                        f.tags.get(alias).is_some_and(|value| {
                            value == key || (case_insensitive && value.eq_ignore_ascii_case(key))
                        })
                    })
                })
            })
    }
}

impl From<StructType> for Type {
    fn from(value: StructType) -> Self {
        Type::Struct(value)
    }
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct FieldType {
    pub name: String,
    pub tags: Tags,
    pub ty: Type,
}

/// Leaf kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    /// opaque, holds any value
    Interface,
}

impl Scalar {
    pub const ALL: [Scalar; 15] = [
        Scalar::Bool,
        Scalar::Int,
        Scalar::Int8,
        Scalar::Int16,
        Scalar::Int32,
        Scalar::Int64,
        Scalar::Uint,
        Scalar::Uint8,
        Scalar::Uint16,
        Scalar::Uint32,
        Scalar::Uint64,
        Scalar::Float32,
        Scalar::Float64,
        Scalar::String,
        Scalar::Interface,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::Int => "int",
            Scalar::Int8 => "int8",
            Scalar::Int16 => "int16",
            Scalar::Int32 => "int32",
            Scalar::Int64 => "int64",
            Scalar::Uint => "uint",
            Scalar::Uint8 => "uint8",
            Scalar::Uint16 => "uint16",
            Scalar::Uint32 => "uint32",
            Scalar::Uint64 => "uint64",
            Scalar::Float32 => "float32",
            Scalar::Float64 => "float64",
            Scalar::String => "string",
            Scalar::Interface => "interface",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            Scalar::Bool | Scalar::Float32 | Scalar::Float64 | Scalar::String | Scalar::Interface
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Scalar::Float32 | Scalar::Float64)
    }

    pub fn zero_value(&self) -> Value {
        match self {
            Scalar::Bool => Value::Boolean(false),
            Scalar::Float32 | Scalar::Float64 => Value::Decimal(0.0),
            Scalar::String => Value::String(String::new()),
            Scalar::Interface => Value::Null,
            _ => Value::Integer(0),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scalar {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scalar::ALL
            .iter()
            .find(|scalar| scalar.as_str() == s)
            .copied()
            .ok_or(())
    }
}

/// A Rust type that can describe its own shape
///
/// ```
/// # use hclconfig::types::{StructType, Type, Typed};
/// struct Network {
///     id: String,
///     ip: Option<String>,
/// }
///
/// impl Typed for Network {
///     fn type_of() -> Type {
///         StructType::new("Network")
///             .field("ID", r#"hcl:"id" json:"id""#, String::type_of())
///             .field("IP", r#"hcl:"ip,optional" json:"ip""#, Option::<String>::type_of())
///             .into()
///     }
/// }
/// ```
pub trait Typed {
    fn type_of() -> Type;
}

macro_rules! typed_scalar {
    ($($ty:ty => $scalar:expr),+ $(,)?) => {
        $(
            impl Typed for $ty {
                fn type_of() -> Type {
                    Type::Leaf($scalar)
                }
            }
        )+
    };
}

typed_scalar! {
    bool => Scalar::Bool,
    isize => Scalar::Int,
    i8 => Scalar::Int8,
    i16 => Scalar::Int16,
    i32 => Scalar::Int32,
    i64 => Scalar::Int64,
    usize => Scalar::Uint,
    u8 => Scalar::Uint8,
    u16 => Scalar::Uint16,
    u32 => Scalar::Uint32,
    u64 => Scalar::Uint64,
    f32 => Scalar::Float32,
    f64 => Scalar::Float64,
    String => Scalar::String,
    serde_json::Value => Scalar::Interface,
    Value => Scalar::Interface,
}

impl<T: Typed> Typed for Option<T> {
    fn type_of() -> Type {
        Type::pointer(T::type_of())
    }
}

impl<T: Typed> Typed for Box<T> {
    fn type_of() -> Type {
        Type::pointer(T::type_of())
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn type_of() -> Type {
        Type::slice(T::type_of())
    }
}

impl<T: Typed> Typed for indexmap::IndexMap<String, T> {
    fn type_of() -> Type {
        Type::map(Scalar::String, T::type_of())
    }
}

impl<T: Typed> Typed for std::collections::HashMap<String, T> {
    fn type_of() -> Type {
        Type::map(Scalar::String, T::type_of())
    }
}

impl<T: Typed> Typed for std::collections::BTreeMap<String, T> {
    fn type_of() -> Type {
        Type::map(Scalar::String, T::type_of())
    }
}
