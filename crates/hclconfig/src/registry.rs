//! resource kinds
//!
//! Maps a kind name (the first label of a `resource` block) to the [Type] its body is decoded into. Kinds come
//! from Rust types ([Typed]), explicit [Type]s, or a schema exported by another process.
use crate::schema::{self, DynamicValue, SchemaNode};
use crate::types::{Type, Typed};
use crate::value::Value;
use indexmap::IndexMap;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("resource kind '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),
    #[error("schema of resource kind '{kind}' does not apply")]
    Schema {
        kind: String,
        #[source]
        source: schema::Error,
    },
}

#[derive(Debug, Default)]
pub struct Registry {
    kinds: IndexMap<String, Type>,
}

impl Registry {
    pub fn register<T: Typed>(&mut self, kind: &str) -> Result<(), Error> {
        self.register_type(kind, T::type_of())
    }

    pub fn register_type(&mut self, kind: &str, ty: Type) -> Result<(), Error> {
        if self.kinds.contains_key(kind) {
            return Err(Error::AlreadyRegistered(kind.to_string()));
        }

        tracing::debug!(kind, ty = %ty, "resource kind registered");
        self.kinds.insert(kind.to_string(), ty);
        Ok(())
    }

    /// Register a kind from its transmitted description
    pub fn register_schema(&mut self, kind: &str, schema: &SchemaNode) -> Result<(), Error> {
        let template = schema::reconstruct(schema).map_err(|source| Error::Schema {
            kind: kind.to_string(),
            source,
        })?;
        self.register_type(kind, template.ty().clone())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn template(&self, kind: &str) -> Option<&Type> {
        self.kinds.get(kind)
    }

    pub fn schema(&self, kind: &str, max_depth: Option<usize>) -> Result<SchemaNode, Error> {
        let ty = self.get(kind)?;
        schema::describe(ty, max_depth).map_err(|source| Error::Schema {
            kind: kind.to_string(),
            source,
        })
    }

    /// Zero value of `kind`
    pub fn create(&self, kind: &str) -> Result<DynamicValue, Error> {
        Ok(DynamicValue::zero(self.get(kind)?.clone()))
    }

    /// Shape `value` into the template of `kind`
    pub fn decode(&self, kind: &str, value: Value) -> Result<DynamicValue, Error> {
        let ty = self.get(kind)?.clone();
        DynamicValue::new(ty, value).map_err(|source| Error::Schema {
            kind: kind.to_string(),
            source,
        })
    }

    fn get(&self, kind: &str) -> Result<&Type, Error> {
        self.kinds
            .get(kind)
            .ok_or_else(|| Error::UnknownKind(kind.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{Scalar, StructType};
    use pretty_assertions::assert_eq;

    struct Container;

    impl Typed for Container {
        fn type_of() -> Type {
            StructType::new("Container")
                .field("Image", r#"hcl:"image" json:"image""#, String::type_of())
                .field("Ports", r#"hcl:"ports,optional" json:"ports""#, Vec::<u16>::type_of())
                .into()
        }
    }

    #[test]
    fn register_kinds() {
        let mut registry = Registry::default();
        registry.register::<Container>("container").unwrap();
        registry
            .register_type("network", Type::Leaf(Scalar::Interface))
            .unwrap();

        assert!(matches!(
            registry.register::<Container>("container"),
            Err(Error::AlreadyRegistered(kind)) if kind == "container"
        ));
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["container", "network"]);
        assert_eq!(registry.template("container"), Some(&Container::type_of()));
    }

    #[test]
    fn kinds_from_schema() {
        let mut exporter = Registry::default();
        exporter.register::<Container>("container").unwrap();
        let schema = exporter.schema("container", None).unwrap();

        let mut importer = Registry::default();
        importer.register_schema("container", &schema).unwrap();

        assert_eq!(importer.schema("container", None).unwrap(), schema);

        let created = importer.create("container").unwrap();
        assert_eq!(
            created.to_json().unwrap(),
            serde_json::json!({"image": "", "ports": []})
        );

        assert!(matches!(
            importer.create("volume"),
            Err(Error::UnknownKind(kind)) if kind == "volume"
        ));
    }

    #[test]
    fn invalid_schema() {
        let schema = SchemaNode::new("Broken".into(), "[]map[string]int".into(), String::new());

        let mut registry = Registry::default();
        assert!(matches!(
            registry.register_schema("broken", &schema),
            Err(Error::Schema {
                source: schema::Error::UnparseableTypeString(_),
                ..
            })
        ));
    }
}
