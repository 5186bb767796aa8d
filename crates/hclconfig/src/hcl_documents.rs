//! collection of hcl documents ([Body] and path to source file)
//!
//! [HclDocuments] tracks
//! - the source path
//! - the root blocks
//! - the root attributes
//! and defines a numeric index for each. Once added those indices are stable (removal is not possible)
//!
//! [HclDocuments::resources] maps the root blocks onto a [ResourceSet].
use crate::fqrn::{self, Fqrn};
use crate::path::{Path, Segment};
use crate::registry::Registry;
use crate::resource::{Meta, Reference, Resource, ResourceSet};
use crate::schema;
use crate::types::Type;
use crate::value::Value;
use crate::visit::VisitTraversals;
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use indexmap::IndexMap;

/// Attribute listing explicit dependencies of a resource
pub const DEPENDS_ON: &str = "depends_on";

#[derive(Default, Debug)]
pub struct HclDocuments {
    sources: Vec<Source>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

impl HclDocuments {
    /// Inserts and indexes an hcl document
    pub fn insert(&mut self, document: Body, path: impl Into<Option<std::path::PathBuf>>) {
        let source_index = self.sources.len();
        self.sources.push(path.into());

        for structure in document.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    pub fn get_attribute(&self, index: usize) -> SourceAttribute {
        let (source_index, attribute) = &self.root_attributes[index];
        (index, &self.sources[*source_index], attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .enumerate()
            .map(|(index, (source_index, attribute))| {
                (index, &self.sources[*source_index], attribute)
            })
    }

    pub fn get_block(&self, index: usize) -> SourceBlock {
        let (source_index, block) = &self.root_blocks[index];
        (index, &self.sources[*source_index], block)
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// File the structure an issue refers to was loaded from
    pub fn source_of(&self, issue: &Issue) -> &Source {
        match issue {
            Issue::RootAttribute(index) => self.get_attribute(*index).1,
            Issue::UnknownBlockType(index)
            | Issue::LabelCount { block: index, .. }
            | Issue::InvalidDependsOn(index)
            | Issue::Decode { block: index, .. }
            | Issue::Duplicate { block: index, .. } => self.get_block(*index).1,
        }
    }
}

impl HclDocuments {
    pub fn load_file(&mut self, file_path: &std::path::Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents)?;

        self.insert(body, Some(file_path));
        Ok(())
    }

    /// Loads all `*.hcl` files of a directory (not recursive), in file name order
    pub fn load_directory(&mut self, dir_path: &std::path::Path) -> Result<(), LoadError> {
        let mut file_paths = vec![];

        for dir_entry in std::fs::read_dir(dir_path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let file_path = dir_entry.path();
            if file_path.extension().is_some_and(|extension| extension == "hcl") {
                file_paths.push(file_path);
            }
        }

        if file_paths.is_empty() {
            return Err(LoadError::NoFilesFound);
        }

        file_paths.sort();
        for file_path in file_paths {
            self.load_file(&file_path)?;
        }

        Ok(())
    }
}

impl HclDocuments {
    /// Map all root blocks onto resources
    ///
    /// - `resource "<kind>" "<name>"`: body is the block's attributes and nested blocks, decoded into the
    ///   registered template if `kind` is known to `registry`. References into keys the template does not know
    ///   are dropped along with them.
    /// - `variable "<name>"`: body is the `default` attribute
    /// - `output "<name>"`, `local "<name>"`: body is the `value` attribute
    /// - `module "<name>"`: body is the block's attributes
    ///
    /// Bare references become [Reference]s with a null placeholder, every reference is recorded in
    /// [Meta::depends_on]. Other expressions are not evaluated and stay null.
    pub fn resources(&self, registry: &Registry) -> Result<ResourceSet, ParseErrors> {
        let mut e = ParseErrors::new();
        let mut set = ResourceSet::default();

        for (index, _source, _attribute) in self.attributes() {
            e.log(Issue::RootAttribute(index));
        }

        for (index, source, block) in self.blocks() {
            let labels: Vec<&str> = block.labels.iter().map(|label| label.as_str()).collect();

            let (kind, name) = match (block.ident.value().as_str(), labels.as_slice()) {
                (fqrn::RESOURCE, [kind, name]) => (*kind, *name),
                (fqrn::RESOURCE, _) => {
                    e.log(Issue::LabelCount {
                        block: index,
                        expected: 2,
                    });
                    continue;
                }
                (kind @ (fqrn::VARIABLE | fqrn::OUTPUT | fqrn::LOCAL | fqrn::MODULE), [name]) => {
                    (kind, *name)
                }
                (fqrn::VARIABLE | fqrn::OUTPUT | fqrn::LOCAL | fqrn::MODULE, _) => {
                    e.log(Issue::LabelCount {
                        block: index,
                        expected: 1,
                    });
                    continue;
                }
                _ => {
                    e.log(Issue::UnknownBlockType(index));
                    continue;
                }
            };

            let body: hcl::Body = block.body.clone().into();

            let Some(mut depends_on) = explicit_dependencies(&body) else {
                e.log(Issue::InvalidDependsOn(index));
                continue;
            };
            body.visit_traversals(&mut |traversal: &hcl::Traversal| {
                let Ok(fqrn) = Fqrn::try_from(traversal) else {
                    return;
                };
                let fqrn = fqrn.without_attribute().to_string();
                if !depends_on.contains(&fqrn) {
                    depends_on.push(fqrn);
                }
            });

            let mut mapper = BodyMapper::default();
            let mut value = match kind {
                fqrn::VARIABLE => mapper.attribute(&body, "default"),
                fqrn::OUTPUT | fqrn::LOCAL => mapper.attribute(&body, "value"),
                _ => mapper.body(&body, &Path::default()),
            };

            let mut pending = mapper.pending;
            let mut ty = None;
            if block.ident.value().as_str() == fqrn::RESOURCE && registry.contains(kind) {
                match registry.decode(kind, value) {
                    Ok(decoded) => {
                        pending = decoded_references(decoded.ty(), pending);
                        ty = Some(decoded.ty().clone());
                        value = decoded.into_value();
                    }
                    Err(err) => {
                        e.log(Issue::Decode {
                            block: index,
                            message: error_chain(&err),
                        });
                        continue;
                    }
                }
            }

            let mut meta = Meta::new(name.to_string(), kind.to_string(), vec![]);
            meta.file = source.clone();
            meta.depends_on = depends_on;

            let mut resource = Resource::new(meta, value);
            resource.pending = pending;
            resource.ty = ty;

            if let Err(err) = set.insert(resource) {
                tracing::debug!(%err, "resource rejected");
                e.log(Issue::Duplicate {
                    block: index,
                    fqrn: Fqrn::new(vec![], kind, name, "").to_string(),
                });
            }
        }

        if !e.issues.is_empty() {
            return Err(e);
        }

        Ok(set)
    }
}

/// Canonical addresses listed in `depends_on`, `None` if the attribute is not a list of references
fn explicit_dependencies(body: &hcl::Body) -> Option<Vec<String>> {
    let Some(attribute) = body.attributes().find(|a| a.key.as_str() == DEPENDS_ON) else {
        return Some(vec![]);
    };

    let hcl::Expression::Array(items) = &attribute.expr else {
        return None;
    };

    items
        .iter()
        .map(|item| match item {
            hcl::Expression::String(text) => Fqrn::parse(text)
                .map(|fqrn| fqrn.without_attribute().to_string())
                .ok(),
            _ => None,
        })
        .collect()
}

/// Move references of a decoded body to where decoding put their attributes
fn decoded_references(ty: &Type, pending: Vec<Reference>) -> Vec<Reference> {
    pending
        .into_iter()
        .filter_map(|reference| match schema::decoded_path(ty, &reference.attribute) {
            Some(attribute) => Some(Reference::new(attribute, reference.source)),
            None => {
                tracing::debug!(
                    attribute = %reference.attribute,
                    source = %reference.source,
                    "ignoring reference of unknown key"
                );
                None
            }
        })
        .collect()
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}

/// Turns hcl bodies into [Value]s, remembering where references were found
#[derive(Default)]
struct BodyMapper {
    pending: Vec<Reference>,
}

impl BodyMapper {
    fn attribute(&mut self, body: &hcl::Body, key: &str) -> Value {
        match body.attributes().find(|a| a.key.as_str() == key) {
            Some(attribute) => self.expression(&attribute.expr, &Path::default()),
            None => Value::Null,
        }
    }

    /// Attributes, then nested blocks as arrays (labels are dropped)
    fn body(&mut self, body: &hcl::Body, path: &Path) -> Value {
        let mut object = IndexMap::new();

        for attribute in body.attributes() {
            let key = attribute.key.as_str();
            if path.is_empty() && key == DEPENDS_ON {
                continue;
            }
            let value = self.expression(&attribute.expr, &child(path, key));
            object.insert(key.to_string(), value);
        }

        for block in body.blocks() {
            let key = block.identifier.as_str();
            let entry = object
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(vec![]));
            let Value::Array(items) = entry else {
                tracing::debug!(%key, "block collides with attribute, ignored");
                continue;
            };

            let item_path = child(&child(path, key), &items.len().to_string());
            items.push(self.body(&block.body, &item_path));
        }

        Value::Object(object)
    }

    fn expression(&mut self, expr: &hcl::Expression, path: &Path) -> Value {
        use hcl::Expression;

        match expr {
            Expression::Traversal(traversal) => match Fqrn::try_from(traversal.as_ref()) {
                Ok(source) => {
                    tracing::trace!(%path, %source, "pending reference");
                    self.pending.push(Reference::new(path.clone(), source));
                    Value::Null
                }
                Err(err) => {
                    tracing::warn!(%path, %err, "reference can not be resolved, left unset");
                    Value::Null
                }
            },
            Expression::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.expression(item, &child(path, &index.to_string())))
                    .collect(),
            ),
            Expression::Object(object) => Value::Object(
                object
                    .iter()
                    .map(|(key, value)| {
                        let key = key.to_string();
                        let value = self.expression(value, &child(path, &key));
                        (key, value)
                    })
                    .collect(),
            ),
            Expression::Parenthesis(inner) => self.expression(inner, path),
            other => match Value::try_from(other.clone()) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(%path, %err, "expression not evaluated, left unset");
                    Value::Null
                }
            },
        }
    }
}

fn child(path: &Path, key: &str) -> Path {
    let mut path = path.clone();
    path.push(Segment::from(key));
    path
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No files found in directory")]
    NoFilesFound,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
}

#[derive(Debug, derive_new::new)]
pub struct ParseErrors {
    #[new(default)]
    issues: Vec<Issue>,
}

impl ParseErrors {
    pub fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

impl std::error::Error for ParseErrors {}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.issues.as_slice() {
            [] => f.write_str("no issues"),
            [issue] => write!(f, "{issue:?}"),
            [issue, rest @ ..] => write!(f, "{issue:?} (and {} more)", rest.len()),
        }
    }
}

/// Problems found while mapping documents onto resources, indices refer to [HclDocuments]
#[derive(Debug, PartialEq)]
pub enum Issue {
    RootAttribute(usize),
    UnknownBlockType(usize),
    LabelCount { block: usize, expected: usize },
    InvalidDependsOn(usize),
    Decode { block: usize, message: String },
    Duplicate { block: usize, fqrn: String },
}

impl From<Body> for HclDocuments {
    fn from(value: Body) -> Self {
        let mut tree = HclDocuments::default();
        tree.insert(value, None);
        tree
    }
}

/// Utility macro to create [HclDocuments]
///
/// Create from a single document
/// ```
/// # use hclconfig::hcl_documents;
/// hcl_documents!(r#"variable "name" { default = 42 }"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use hclconfig::hcl_documents;
/// let documents = hcl_documents! {
///   "one.hcl" => r#"local "one" { value = 1 }"#,
///   "two.hcl" => r#"local "two" { value = local.one }"#
/// };
/// assert_eq!(documents.source_count(), 2);
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use hclconfig::hcl_documents;
/// hcl_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_documents {
    // single document without source
    { $expr:expr } => {
        $crate::hcl_documents::HclDocuments::from(hcl_edit::parser::parse_body($expr).expect("body must parse"))
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::hcl_documents::HclDocuments::default();
        $(
            docs.insert(hcl_edit::parser::parse_body($expr).expect("body must parse"), Some($source.into()));
        )+

        docs
    }};
}

pub type Source = Option<std::path::PathBuf>;
pub type SourceAttribute<'a> = (usize, &'a Source, &'a Attribute);
pub type SourceBlock<'a> = (usize, &'a Source, &'a Block);

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::lookup::Navigator;
    use crate::types::{StructType, Type, Typed};
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"
        variable "image" {
          default = "nginx"
        }

        resource "container" "app" {
          image   = variable.image
          ports   = [80, local.port]
          command = upper("x")

          network {
            name = "main"
          }

          network {
            name = "backup"
          }

          depends_on = ["resource.network.main"]
        }

        local "port" {
          value = 8080
        }

        output "network" {
          value = resource.container.app.network[0].name
        }
    "#;

    fn resolve(set: &ResourceSet, navigator: &Navigator, reference: &str) -> Value {
        set.resolve(&Fqrn::parse(reference).unwrap(), navigator)
            .expect("reference must resolve")
    }

    #[test]
    fn iterators() {
        let hcl_documents = hcl_documents! {r#"
        attr_1 = 1
        one two {}
        three four five {}
        attr_2 = 2
        attr_3 = 3
        "#};

        assert_eq!(hcl_documents.attributes().count(), 3);
        assert_eq!(hcl_documents.blocks().count(), 2);
    }

    #[test]
    fn map_resources() {
        let mut set = hcl_documents!(DOCUMENT)
            .resources(&Registry::default())
            .expect("valid resources");
        let navigator = Navigator::new();

        assert_eq!(set.len(), 4);

        let app = set.find(&Fqrn::parse("resource.container.app").unwrap()).unwrap();
        assert_eq!(
            app.meta.depends_on,
            vec!["resource.network.main", "variable.image", "local.port"]
        );
        assert_eq!(
            app.pending
                .iter()
                .map(|reference| (reference.attribute.to_string(), reference.source.to_string()))
                .collect::<Vec<_>>(),
            vec![
                ("image".to_string(), "variable.image".to_string()),
                ("ports.1".to_string(), "local.port".to_string()),
            ]
        );
        assert_eq!(resolve(&set, &navigator, "resource.container.app.command"), Value::Null);

        assert_eq!(set.apply_references(&navigator), Ok(3));

        assert_eq!(
            resolve(&set, &navigator, "resource.container.app.image"),
            Value::from("nginx")
        );
        assert_eq!(
            resolve(&set, &navigator, "resource.container.app.ports"),
            Value::Array(vec![Value::Integer(80), Value::Integer(8080)])
        );
        assert_eq!(
            resolve(&set, &navigator, "resource.container.app.network.name"),
            Value::from(vec!["main", "backup"])
        );
        assert_eq!(resolve(&set, &navigator, "output.network"), Value::from("main"));
    }

    #[test]
    fn registered_kinds_are_decoded() {
        struct Container;

        impl Typed for Container {
            fn type_of() -> Type {
                StructType::new("Container")
                    .field("Image", r#"hcl:"image""#, String::type_of())
                    .field("Ports", r#"hcl:"ports,optional""#, Vec::<i64>::type_of())
                    .field(
                        "Networks",
                        r#"hcl:"network,block""#,
                        Type::slice(
                            StructType::new("Network")
                                .field("Name", r#"hcl:"name""#, String::type_of())
                                .into(),
                        ),
                    )
                    .into()
            }
        }

        let mut registry = Registry::default();
        registry.register::<Container>("container").unwrap();

        let mut set = hcl_documents!(DOCUMENT).resources(&registry).unwrap();
        let navigator = Navigator::new().with_alias("hcl");
        set.apply_references(&navigator).unwrap();

        let app = set.find(&Fqrn::parse("resource.container.app").unwrap()).unwrap();
        let Value::Struct(body) = &app.body else {
            panic!("registered kinds decode into structs");
        };
        assert_eq!(body.name, "Container");
        assert_eq!(body.field("Image"), Some(&Value::from("nginx")));
        assert_eq!(
            resolve(&set, &navigator, "resource.container.app.Networks.Name"),
            Value::from(vec!["main", "backup"])
        );
        assert_eq!(resolve(&set, &navigator, "output.network"), Value::from("main"));
    }

    #[test]
    fn single_blocks_of_registered_kinds() {
        let mut registry = Registry::default();
        registry
            .register_type(
                "container",
                StructType::new("Container")
                    .field("Image", r#"hcl:"image""#, String::type_of())
                    .field(
                        "Resources",
                        r#"hcl:"resources,block""#,
                        Type::pointer(
                            StructType::new("Resources")
                                .field("CPU", r#"hcl:"cpu""#, i64::type_of())
                                .into(),
                        ),
                    )
                    .into(),
            )
            .unwrap();

        let mut set = hcl_documents!(
            r#"
            local "cpu" {
              value = 2
            }

            local "unused" {
              value = "x"
            }

            resource "container" "app" {
              image = "nginx"
              extra = local.unused

              resources {
                cpu = local.cpu
              }
            }
            "#
        )
        .resources(&registry)
        .unwrap();

        let app = set.find(&Fqrn::parse("resource.container.app").unwrap()).unwrap();
        assert_eq!(
            app.pending
                .iter()
                .map(|reference| reference.attribute.to_string())
                .collect::<Vec<_>>(),
            vec!["Resources.CPU"]
        );
        assert_eq!(app.meta.depends_on, vec!["local.unused", "local.cpu"]);

        let navigator = Navigator::new().with_alias("hcl");
        assert_eq!(set.apply_references(&navigator), Ok(1));
        assert_eq!(
            resolve(&set, &navigator, "resource.container.app.resources.cpu"),
            Value::Integer(2)
        );
    }

    #[test]
    fn applied_values_must_fit_registered_kinds() {
        let mut registry = Registry::default();
        registry
            .register_type(
                "container",
                StructType::new("Container")
                    .field("Replicas", r#"hcl:"replicas""#, Option::<i64>::type_of())
                    .into(),
            )
            .unwrap();

        let mut set = hcl_documents!(
            r#"
            variable "replicas" {
              default = "three"
            }

            resource "container" "app" {
              replicas = variable.replicas
            }
            "#
        )
        .resources(&registry)
        .unwrap();

        assert_eq!(
            set.apply_references(&Navigator::new()),
            Err(crate::resource::Error::Lookup(crate::lookup::Error::TypeMismatch {
                expected: "*int64".into(),
                found: "string"
            }))
        );
    }

    #[test]
    fn issues() {
        let documents = hcl_documents! {r#"
        attr = 1
        unknown "x" {}
        resource "container" {}
        variable "a" "b" {}
        resource "container" "dup" {}
        resource "container" "dup" {}
        resource "container" "deps" {
          depends_on = "resource.container.dup"
        }
        "#};

        let errors = documents.resources(&Registry::default()).unwrap_err();
        assert_eq!(
            errors.issues(),
            &[
                Issue::RootAttribute(0),
                Issue::UnknownBlockType(0),
                Issue::LabelCount {
                    block: 1,
                    expected: 2
                },
                Issue::LabelCount {
                    block: 2,
                    expected: 1
                },
                Issue::Duplicate {
                    block: 4,
                    fqrn: "resource.container.dup".into()
                },
                Issue::InvalidDependsOn(5),
            ]
        );
        assert_eq!(documents.source_of(&errors.issues()[0]), &None);
    }

    #[test]
    fn decode_failures() {
        let mut registry = Registry::default();
        registry
            .register_type(
                "container",
                StructType::new("Container")
                    .field("Ports", r#"hcl:"ports""#, Vec::<i64>::type_of())
                    .into(),
            )
            .unwrap();

        let errors = hcl_documents!(r#"resource "container" "bad" { ports = "eighty" }"#)
            .resources(&registry)
            .unwrap_err();

        assert!(matches!(
            errors.issues(),
            [Issue::Decode { block: 0, message }] if message.contains("Ports")
        ));
    }
}
