//! path based navigation
//!
//! [Navigator] resolves a [Path] against a [Value] without knowing its type up front. Structs are searched by
//! field name and tag alias, objects by key, arrays by index. When a segment can not be resolved against an
//! array or object directly the remaining path is applied to every element instead and the results are
//! aggregated (the "splat" behaviour of `list.*.name` or `list.name`).
//!
//! Reads return a [Position] alongside the value. Writes go through [set_at] with such a position, so a
//! caller never holds a borrow into the tree it is about to modify.
use crate::path::{Path, Segment};
use crate::schema;
use crate::types::{Scalar, Type};
use crate::value::Value;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("malformed index key: {0}")]
    MalformedIndex(String),
    #[error("invalid index usage at {0}: value is not a sequence")]
    InvalidIndexUsage(String),
    #[error("index out of range ({index}); len: {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("location is not assignable")]
    NotAssignable,
    #[error("can not assign {found} to a location of type {expected}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },
}

/// Location of a value relative to the root it was found in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position(Vec<Step>);

impl Position {
    pub fn steps(&self) -> &[Step] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Deref,
    Field(usize),
    Key(String),
    Index(usize),
}

/// Result of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Found<'v> {
    /// A value inside the root
    Single {
        value: &'v Value,
        position: Position,
    },
    /// Merged results of applying a path to each element of a collection
    Aggregate(Vec<Value>),
}

impl<'v> Found<'v> {
    pub fn into_value(self) -> Value {
        match self {
            Found::Single { value, .. } => value.clone(),
            Found::Aggregate(values) => Value::Array(values),
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            Found::Single { position, .. } => Some(position),
            Found::Aggregate(_) => None,
        }
    }
}

/// Path resolution settings
#[derive(Debug, Clone, Default, derive_new::new)]
pub struct Navigator {
    /// tag keys consulted when no field name matches
    #[new(default)]
    aliases: Vec<String>,
    #[new(default)]
    case_insensitive: bool,
}

impl Navigator {
    pub fn with_alias(mut self, tag_key: impl Into<String>) -> Self {
        self.aliases.push(tag_key.into());
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn lookup<'v>(&self, root: &'v Value, path: &Path) -> Result<Found<'v>, Error> {
        self.walk(root, Position::default(), path.segments())
    }

    /// Assign `value` to the location `path` resolves to
    pub fn set(&self, root: &mut Value, path: &Path, value: Value) -> Result<(), Error> {
        let position = match self.lookup(root, path)? {
            Found::Single { position, .. } => position,
            Found::Aggregate(_) => return Err(Error::NotAssignable),
        };

        set_at(root, &position, value)
    }

    /// Assign `value` to the location `path` resolves to in `root`, a value of type `ty`
    ///
    /// The value is shaped into the declared type of the location first (see [schema::decode]), so empty pointers
    /// and optional fields only accept values of their referent's type.
    pub fn set_typed(
        &self,
        ty: &Type,
        root: &mut Value,
        path: &Path,
        value: Value,
    ) -> Result<(), Error> {
        let slot_ty = self
            .lookup_type(ty, path)
            .ok_or_else(|| Error::KeyNotFound(path.to_string()))?;

        let found = value.type_name();
        let value = schema::decode(&slot_ty, value).map_err(|err| {
            tracing::debug!(%path, %err, "value does not fit its location");
            Error::TypeMismatch {
                expected: slot_ty.to_string(),
                found,
            }
        })?;

        let position = match self.lookup(root, path)? {
            Found::Single { position, .. } => position,
            Found::Aggregate(_) => return Err(Error::NotAssignable),
        };

        // a populated pointer was followed, write its referent
        let value = match position.steps().last() {
            Some(Step::Deref) => strip_pointers(value),
            _ => value,
        };

        set_at(root, &position, value)
    }

    /// Type `path` would resolve to in a value of type `ty`
    ///
    /// Sequences and mappings resolve to their element type, the same way a lookup aggregates over elements.
    pub fn lookup_type(&self, ty: &Type, path: &Path) -> Option<Type> {
        self.resolve_type(ty, path.segments())
    }

    fn walk<'v>(
        &self,
        root: &'v Value,
        mut position: Position,
        segments: &[Segment],
    ) -> Result<Found<'v>, Error> {
        let mut current = deref(root, &mut position);

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_wildcard() && current.is_aggregable() {
                return self.aggregate(current, &segments[i + 1..], None);
            }

            match self.step(current, segment, &mut position) {
                Ok(next) => current = deref(next, &mut position),
                Err(err @ Error::KeyNotFound(_)) if current.is_aggregable() => {
                    tracing::trace!(%segment, container = current.type_name(), "aggregating");
                    return self.aggregate(current, &segments[i..], Some(err));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Found::Single {
            value: current,
            position,
        })
    }

    fn step<'v>(
        &self,
        current: &'v Value,
        segment: &Segment,
        position: &mut Position,
    ) -> Result<&'v Value, Error> {
        let mut target = match (segment.as_index(), current) {
            _ if segment.name.is_empty() => current,
            (Some(index), Value::Array(items)) => {
                position.0.push(Step::Index(index));
                items.get(index).ok_or(Error::IndexOutOfRange {
                    index,
                    len: items.len(),
                })?
            }
            _ => self.child(current, &segment.name, position)?,
        };

        if let Some(index) = segment.index {
            target = deref(target, position);
            let Value::Array(items) = target else {
                return Err(Error::InvalidIndexUsage(segment.to_string()));
            };

            position.0.push(Step::Index(index));
            target = items.get(index).ok_or(Error::IndexOutOfRange {
                index,
                len: items.len(),
            })?;
        }

        Ok(target)
    }

    fn child<'v>(
        &self,
        current: &'v Value,
        key: &str,
        position: &mut Position,
    ) -> Result<&'v Value, Error> {
        match current {
            Value::Struct(st) => {
                let index = st
                    .position(key, &self.aliases, self.case_insensitive)
                    .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
                position.0.push(Step::Field(index));
                Ok(&st.fields[index].value)
            }
            Value::Object(map) => {
                let (found_key, value) = map
                    .get_key_value(key)
                    .or_else(|| {
                        if !self.case_insensitive {
                            return None;
                        }
                        map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key))
                    })
                    .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
                position.0.push(Step::Key(found_key.clone()));
                Ok(value)
            }
            _ => Err(Error::KeyNotFound(key.to_string())),
        }
    }

    /// Apply `rest` to each element of `container`
    ///
    /// Elements that do not resolve are skipped. If none resolve out of a non-empty container the error that
    /// caused the aggregation (or the first element's error) is returned.
    fn aggregate<'v>(
        &self,
        container: &'v Value,
        rest: &[Segment],
        trigger: Option<Error>,
    ) -> Result<Found<'v>, Error> {
        let elements: Vec<&Value> = match container {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => return Err(trigger.unwrap_or(Error::NotAssignable)),
        };

        let mut results = vec![];
        let mut resolved = 0;
        let mut first_error = trigger;

        for element in elements.iter().copied() {
            match self.walk(element, Position::default(), rest) {
                Ok(Found::Single { value, .. }) => {
                    resolved += 1;
                    match value {
                        Value::Array(items) => results.extend(items.iter().cloned()),
                        other => results.push(other.clone()),
                    }
                }
                Ok(Found::Aggregate(values)) => {
                    resolved += 1;
                    results.extend(values);
                }
                Err(err) => {
                    tracing::debug!(%err, "element dropped from aggregation");
                    first_error.get_or_insert(err);
                }
            }
        }

        if resolved == 0 && !elements.is_empty() {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        Ok(Found::Aggregate(results))
    }

    fn resolve_type(&self, ty: &Type, segments: &[Segment]) -> Option<Type> {
        let Some((segment, rest)) = segments.split_first() else {
            return Some(ty.clone());
        };

        match ty {
            // opaque, anything could be behind it
            Type::Leaf(Scalar::Interface) => Some(ty.clone()),
            Type::Leaf(_) => None,
            Type::Pointer(referent) => self.resolve_type(referent, segments),
            Type::Slice(element) => {
                let consumes = segment.is_wildcard()
                    || segment.as_index().is_some()
                    || (segment.name.is_empty() && segment.index.is_some());
                if consumes {
                    self.resolve_type(element, rest)
                } else {
                    self.resolve_type(element, segments)
                }
            }
            Type::Map(_, element) => index_type(element, segment)
                .and_then(|ty| self.resolve_type(&ty, rest))
                .or_else(|| self.resolve_type(element, segments)),
            Type::Struct(st) => {
                let field = st.find(&segment.name, &self.aliases, self.case_insensitive)?;
                let ty = index_type(&field.ty, segment)?;
                self.resolve_type(&ty, rest)
            }
        }
    }
}

/// Assign `value` at `position` inside `root`
///
/// A null location accepts any value and null can be written anywhere; otherwise the variants must match.
pub fn set_at(root: &mut Value, position: &Position, value: Value) -> Result<(), Error> {
    let mut slot = root;
    for step in position.steps() {
        slot = match (step, slot) {
            (Step::Deref, Value::Pointer(inner)) => inner.as_mut(),
            (Step::Field(index), Value::Struct(st)) => {
                &mut st.fields.get_mut(*index).ok_or(Error::NotAssignable)?.value
            }
            (Step::Key(key), Value::Object(map)) => {
                map.get_mut(key).ok_or(Error::NotAssignable)?
            }
            (Step::Index(index), Value::Array(items)) => {
                items.get_mut(*index).ok_or(Error::NotAssignable)?
            }
            _ => return Err(Error::NotAssignable),
        };
    }

    if !slot.is_null() && !value.is_null() && slot.type_name() != value.type_name() {
        return Err(Error::TypeMismatch {
            expected: slot.type_name().to_string(),
            found: value.type_name(),
        });
    }

    tracing::trace!(?position, "assigning {}", value.type_name());
    *slot = value;
    Ok(())
}

fn strip_pointers(mut value: Value) -> Value {
    while let Value::Pointer(inner) = value {
        value = *inner;
    }
    value
}

fn deref<'v>(mut value: &'v Value, position: &mut Position) -> &'v Value {
    while let Value::Pointer(inner) = value {
        position.0.push(Step::Deref);
        value = inner;
    }
    value
}

/// Apply the bracketed index of `segment` to `ty`
fn index_type(ty: &Type, segment: &Segment) -> Option<Type> {
    if segment.index.is_none() {
        return Some(ty.clone());
    }

    let mut ty = ty;
    while let Type::Pointer(referent) = ty {
        ty = referent;
    }

    match ty {
        Type::Slice(element) => Some(element.as_ref().clone()),
        Type::Leaf(Scalar::Interface) => Some(ty.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::StructType;
    use crate::value::{Field, Struct, Tags};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn path(p: &str) -> Path {
        Path::parse(p).unwrap()
    }

    fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<IndexMap<_, _>>(),
        )
    }

    fn container(name: &str) -> Value {
        Value::Struct(Struct::new(
            "Container".into(),
            vec![
                Field::new("Name".into(), Tags::new(r#"hcl:"name""#), name.into()),
                Field::new(
                    "Ports".into(),
                    Tags::new(r#"hcl:"port""#),
                    vec![Value::Integer(80), Value::Integer(443)].into(),
                ),
                Field::new(
                    "Parent".into(),
                    Tags::default(),
                    Value::Pointer(Box::new("root".into())),
                ),
            ],
        ))
    }

    fn value(found: Result<Found<'_>, Error>) -> Value {
        found.expect("lookup must succeed").into_value()
    }

    #[test]
    fn object_keys() {
        let root = object([("foo", Value::Integer(42))]);

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("foo"))),
            Value::Integer(42)
        );
        assert_eq!(
            Navigator::new().lookup(&root, &path("Foo")),
            Err(Error::KeyNotFound("Foo".into()))
        );
        assert_eq!(
            value(
                Navigator::new()
                    .case_insensitive(true)
                    .lookup(&root, &path("Foo"))
            ),
            Value::Integer(42)
        );
    }

    #[test]
    fn struct_fields_and_aliases() {
        let root = container("mine");

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("Name"))),
            Value::from("mine")
        );
        assert_eq!(
            Navigator::new().lookup(&root, &path("name")),
            Err(Error::KeyNotFound("name".into()))
        );
        assert_eq!(
            value(Navigator::new().with_alias("hcl").lookup(&root, &path("port[1]"))),
            Value::Integer(443)
        );
        // pointers are transparent
        assert_eq!(
            value(Navigator::new().lookup(&root, &path("Parent"))),
            Value::from("root")
        );
    }

    #[test]
    fn dotted_index() {
        let root = object([("list", vec!["a", "b"].into())]);

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("list.1"))),
            Value::from("b")
        );
    }

    #[test]
    fn index_errors() {
        let root = container("mine");
        let navigator = Navigator::new();

        assert_eq!(
            navigator.lookup(&root, &path("Ports[5]")),
            Err(Error::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            Error::IndexOutOfRange { index: 5, len: 2 }.to_string(),
            "index out of range (5); len: 2"
        );
        assert_eq!(
            navigator.lookup(&root, &path("Name[0]")),
            Err(Error::InvalidIndexUsage("Name[0]".into()))
        );
        assert_eq!(
            Path::parse("Name[zero]"),
            Err(Error::MalformedIndex("Name[zero]".into()))
        );
    }

    #[test]
    fn aggregation_over_sequence() {
        let root = Value::Array(vec![container("one"), container("two")]);

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("Name"))),
            Value::from(vec!["one", "two"])
        );

        let partial = Value::Array(vec![
            container("one"),
            object([("Other", Value::Integer(1))]),
        ]);
        assert_eq!(
            value(Navigator::new().lookup(&partial, &path("Name"))),
            Value::from(vec!["one"])
        );
    }

    #[test]
    fn aggregation_flattens_sequences() {
        let root = Value::Array(vec![container("one"), container("two")]);

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("*.Ports"))),
            Value::Array(vec![
                Value::Integer(80),
                Value::Integer(443),
                Value::Integer(80),
                Value::Integer(443)
            ])
        );
    }

    #[test]
    fn aggregation_over_mapping() {
        let root = object([
            ("a", object([("ip", "10.0.0.1".into())])),
            ("b", object([("ip", "10.0.0.2".into())])),
        ]);

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("ip"))),
            Value::from(vec!["10.0.0.1", "10.0.0.2"])
        );
        assert_eq!(
            value(Navigator::new().lookup(&root, &path("*.ip"))),
            Value::from(vec!["10.0.0.1", "10.0.0.2"])
        );
    }

    #[test]
    fn aggregation_over_empty_collection() {
        let root = object([("list", Value::Array(vec![]))]);

        assert_eq!(
            value(Navigator::new().lookup(&root, &path("list.name"))),
            Value::Array(vec![])
        );
    }

    #[test]
    fn set_values() {
        let mut root = object([("target", container("mine"))]);
        let navigator = Navigator::new().with_alias("hcl");

        navigator
            .set(&mut root, &path("target.name"), "changed".into())
            .unwrap();
        navigator
            .set(&mut root, &path("target.port[0]"), Value::Integer(8080))
            .unwrap();
        navigator
            .set(&mut root, &path("target.Parent"), "other".into())
            .unwrap();

        assert_eq!(
            value(navigator.lookup(&root, &path("target.Name"))),
            Value::from("changed")
        );
        assert_eq!(
            value(navigator.lookup(&root, &path("target.Ports.0"))),
            Value::Integer(8080)
        );
        assert_eq!(
            value(navigator.lookup(&root, &path("target.Parent"))),
            Value::from("other")
        );
    }

    #[test]
    fn set_rejects_mismatches() {
        let mut root = Value::Array(vec![container("one"), container("two")]);
        let navigator = Navigator::new();

        assert_eq!(
            navigator.set(&mut root, &path("0.Name"), Value::Integer(1)),
            Err(Error::TypeMismatch {
                expected: "string".into(),
                found: "integer"
            })
        );
        assert_eq!(
            navigator.set(&mut root, &path("Name"), "x".into()),
            Err(Error::NotAssignable)
        );
    }

    #[test]
    fn set_typed_values() {
        let ty: Type = StructType::new("Container")
            .field("Count", "", Type::pointer(Type::Leaf(Scalar::Int64)))
            .field("Ratio", "", Type::Leaf(Scalar::Float64))
            .field("Labels", "", Type::map(Scalar::String, Type::Leaf(Scalar::String)))
            .into();
        let mut root = ty.zero_value();
        let navigator = Navigator::new();

        assert_eq!(
            navigator.set_typed(&ty, &mut root, &path("Count"), "not a number".into()),
            Err(Error::TypeMismatch {
                expected: "*int64".into(),
                found: "string"
            })
        );
        assert_eq!(value(navigator.lookup(&root, &path("Count"))), Value::Null);

        navigator
            .set_typed(&ty, &mut root, &path("Count"), Value::Integer(3))
            .unwrap();
        assert_eq!(
            value(navigator.lookup(&root, &path("Count"))),
            Value::Integer(3)
        );
        // once populated the referent is replaced
        navigator
            .set_typed(&ty, &mut root, &path("Count"), Value::Integer(4))
            .unwrap();
        assert_eq!(
            value(navigator.lookup(&root, &path("Count"))),
            Value::Integer(4)
        );

        navigator
            .set_typed(&ty, &mut root, &path("Ratio"), Value::Integer(1))
            .unwrap();
        assert_eq!(
            value(navigator.lookup(&root, &path("Ratio"))),
            Value::Decimal(1.0)
        );

        assert_eq!(
            navigator.set_typed(&ty, &mut root, &path("Missing"), Value::Integer(1)),
            Err(Error::KeyNotFound("Missing".into()))
        );
        assert_eq!(
            navigator.set_typed(&ty, &mut root, &path("Labels.team"), "core".into()),
            Err(Error::NotAssignable)
        );
    }

    #[test]
    fn set_at_stale_position() {
        let root = object([("list", vec!["a", "b"].into())]);
        let found = Navigator::new().lookup(&root, &path("list.1")).unwrap();
        let position = found.position().cloned().unwrap();

        let mut other = object([("list", vec!["a"].into())]);
        assert_eq!(
            set_at(&mut other, &position, "c".into()),
            Err(Error::NotAssignable)
        );
    }

    #[test]
    fn types() {
        let network: Type = StructType::new("Network")
            .field("ID", r#"hcl:"id""#, Type::Leaf(Scalar::String))
            .into();
        let ty: Type = StructType::new("Container")
            .field("Name", r#"hcl:"name""#, Type::Leaf(Scalar::String))
            .field(
                "Networks",
                r#"hcl:"network,block""#,
                Type::slice(Type::pointer(network.clone())),
            )
            .field("Labels", "", Type::map(Scalar::String, Type::Leaf(Scalar::String)))
            .field("Meta", "", Type::Leaf(Scalar::Interface))
            .into();
        let navigator = Navigator::new().with_alias("hcl");

        assert_eq!(
            navigator.lookup_type(&ty, &path("name")),
            Some(Type::Leaf(Scalar::String))
        );
        assert_eq!(
            navigator.lookup_type(&ty, &path("network[0]")),
            Some(Type::pointer(network.clone()))
        );
        assert_eq!(
            navigator.lookup_type(&ty, &path("network.id")),
            Some(Type::Leaf(Scalar::String))
        );
        assert_eq!(
            navigator.lookup_type(&ty, &path("Networks.0.ID")),
            Some(Type::Leaf(Scalar::String))
        );
        assert_eq!(
            navigator.lookup_type(&ty, &path("Labels.anything")),
            Some(Type::Leaf(Scalar::String))
        );
        assert_eq!(
            navigator.lookup_type(&ty, &path("Meta.any.thing")),
            Some(Type::Leaf(Scalar::Interface))
        );
        assert_eq!(navigator.lookup_type(&ty, &path("Name.length")), None);
        assert_eq!(navigator.lookup_type(&ty, &path("missing")), None);
    }
}
