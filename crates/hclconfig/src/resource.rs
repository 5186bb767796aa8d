//! resources and reference resolution
//!
//! A [Resource] is a named, typed body of configuration. Bodies may still wait for values of other resources
//! ([Reference]); [ResourceSet::apply_references] resolves those in dependency order.
use crate::fqrn::{self, Fqrn};
use crate::lookup::{self, Navigator};
use crate::path::Path;
use crate::types::Type;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("resource already exists: {0}")]
    Duplicate(String),
    #[error("attribute lookup failed")]
    Lookup(#[from] lookup::Error),
    #[error("invalid reference")]
    Fqrn(#[from] fqrn::Error),
    #[error("unresolved references: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}

/// Identity and bookkeeping of a resource
#[derive(Debug, Clone, PartialEq, derive_new::new, serde::Serialize)]
pub struct Meta {
    pub name: String,
    pub kind: String,
    pub module: Vec<String>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// canonical addresses (without attribute) of everything this resource refers to
    #[new(default)]
    pub depends_on: Vec<String>,
}

/// `attribute` of the owning resource waits for the value of `source`
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct Reference {
    pub attribute: Path,
    pub source: Fqrn,
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct Resource {
    pub meta: Meta,
    pub body: Value,
    #[new(default)]
    pub pending: Vec<Reference>,
    /// declared type of `body`, references are checked against it when applied
    #[new(default)]
    pub ty: Option<Type>,
}

impl Resource {
    pub fn fqrn(&self) -> Fqrn {
        Fqrn::from_meta(&self.meta)
    }
}

#[derive(Debug, Default)]
pub struct ResourceSet {
    resources: IndexMap<Fqrn, Resource>,
}

impl ResourceSet {
    pub fn insert(&mut self, resource: Resource) -> Result<(), Error> {
        let fqrn = resource.fqrn();
        if self.resources.contains_key(&fqrn) {
            tracing::debug!(%fqrn, "resource collision");
            return Err(Error::Duplicate(fqrn.to_string()));
        }

        tracing::trace!(%fqrn, "resource added");
        self.resources.insert(fqrn, resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Resource addressed by `fqrn`, its attribute is ignored
    pub fn find(&self, fqrn: &Fqrn) -> Result<&Resource, Error> {
        self.resources
            .get(&fqrn.without_attribute())
            .ok_or_else(|| Error::NotFound(fqrn.without_attribute().to_string()))
    }

    /// Resource addressed by `fqrn` as written inside `module`
    pub fn find_relative(&self, fqrn: &Fqrn, module: &[String]) -> Result<&Resource, Error> {
        self.find(&absolute(fqrn, module))
    }

    pub fn in_module<'s>(&'s self, module: &'s [String]) -> impl Iterator<Item = &'s Resource> {
        self.resources
            .values()
            .filter(move |resource| resource.meta.module == module)
    }

    /// Value addressed by `fqrn`, the whole body when it has no attribute
    pub fn resolve(&self, fqrn: &Fqrn, navigator: &Navigator) -> Result<Value, Error> {
        self.resolve_relative(fqrn, &[], navigator)
    }

    pub fn resolve_relative(
        &self,
        fqrn: &Fqrn,
        module: &[String],
        navigator: &Navigator,
    ) -> Result<Value, Error> {
        let resource = self.find_relative(fqrn, module)?;
        let path = fqrn.attribute_path()?;

        if path.is_empty() {
            return Ok(resource.body.clone());
        }

        Ok(navigator.lookup(&resource.body, &path)?.into_value())
    }

    /// Write the values of all pending references into their owners
    ///
    /// A reference is only resolved once its source has no pending references of its own. Typed resources only
    /// accept values that fit the declared type of the attribute ([Navigator::set_typed]). Returns the number of
    /// references applied; fails with [Error::Unresolved] when the remaining references can never be satisfied
    /// (cycles, missing resources).
    pub fn apply_references(&mut self, navigator: &Navigator) -> Result<usize, Error> {
        let mut applied = 0;

        loop {
            let blocked: HashSet<Fqrn> = self
                .resources
                .iter()
                .filter(|(_, resource)| !resource.pending.is_empty())
                .map(|(fqrn, _)| fqrn.clone())
                .collect();

            if blocked.is_empty() {
                return Ok(applied);
            }

            let mut progress = false;

            for index in 0..self.resources.len() {
                let Some((_, resource)) = self.resources.get_index(index) else {
                    continue;
                };
                if resource.pending.is_empty() {
                    continue;
                }

                let mut resolved = vec![];
                let mut remaining = vec![];
                for reference in &resource.pending {
                    let source = absolute(&reference.source, &resource.meta.module);
                    if blocked.contains(&source.without_attribute()) {
                        remaining.push(reference.clone());
                        continue;
                    }

                    match self.resolve(&source, navigator) {
                        Ok(value) => resolved.push((reference.attribute.clone(), value)),
                        Err(Error::NotFound(missing)) => {
                            tracing::debug!(%missing, "reference source not found");
                            remaining.push(reference.clone());
                        }
                        Err(err) => return Err(err),
                    }
                }

                let Some((fqrn, resource)) = self.resources.get_index_mut(index) else {
                    continue;
                };
                for (attribute, value) in resolved {
                    tracing::trace!(%fqrn, %attribute, "reference applied");
                    match &resource.ty {
                        Some(ty) => {
                            navigator.set_typed(ty, &mut resource.body, &attribute, value)?
                        }
                        None => navigator.set(&mut resource.body, &attribute, value)?,
                    }
                    applied += 1;
                    progress = true;
                }
                resource.pending = remaining;
            }

            if !progress {
                let unresolved = self
                    .resources
                    .iter()
                    .flat_map(|(fqrn, resource)| {
                        resource
                            .pending
                            .iter()
                            .map(move |reference| describe(fqrn, reference))
                    })
                    .collect();
                return Err(Error::Unresolved(unresolved));
            }
        }
    }
}

fn absolute(fqrn: &Fqrn, module: &[String]) -> Fqrn {
    module
        .iter()
        .rev()
        .fold(fqrn.clone(), |fqrn, parent| fqrn.prepend_parent_module(parent))
}

fn describe(owner: &Fqrn, reference: &Reference) -> String {
    if reference.attribute.is_empty() {
        format!("{owner} -> {}", reference.source)
    } else {
        format!(
            "{} -> {}",
            owner.with_attribute(reference.attribute.to_string()),
            reference.source
        )
    }
}
