//! fully-qualified resource names
//!
//! An [Fqrn] addresses a resource, variable, output, local or module anywhere in a (nested) module tree, and
//! optionally an attribute inside it.
//!
//! ```text
//! module.a.b.resource.container.mine.network.0.ip
//! \________/ \______/ \_______/ \__/ \___________/
//!   module   marker     kind    name   attribute
//! ```
//!
//! The `resource` marker is left out for the implicit kinds `variable`, `output`, `local` and `module`.
use crate::path::Path;
use crate::resource::Meta;
use hcl::{Expression, Traversal, TraversalOperator};

pub const RESOURCE: &str = "resource";
pub const VARIABLE: &str = "variable";
pub const OUTPUT: &str = "output";
pub const LOCAL: &str = "local";
pub const MODULE: &str = "module";

/// Kinds that are referenced without the `resource` marker
pub const IMPLICIT_KINDS: [&str; 4] = [VARIABLE, OUTPUT, LOCAL, MODULE];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("malformed reference '{0}': no resource kind found")]
    MissingKind(String),
    #[error("malformed reference '{0}': resources are referenced as resource.<kind>.<name>")]
    MissingResourceMarker(String),
    #[error("malformed reference '{0}': reference is incomplete")]
    Truncated(String),
    #[error("malformed reference '{0}': empty segment")]
    EmptySegment(String),
    #[error("malformed reference '{0}': unbalanced or empty brackets")]
    MalformedIndex(String),
    #[error("unsupported traversal: {0}")]
    UnsupportedTraversal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct Fqrn {
    module: Vec<String>,
    kind: String,
    name: String,
    /// dotted, may contain `*`
    attribute: String,
}

impl Fqrn {
    pub fn new(
        module: Vec<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            module,
            kind: kind.into(),
            name: name.into(),
            attribute: attribute.into(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        let normalized = rewrite_brackets(text)?;
        let tokens: Vec<&str> = normalized.split('.').collect();
        Self::from_tokens(text, &tokens)
    }

    /// Address of a live resource, without attribute
    pub fn from_meta(meta: &Meta) -> Self {
        Self::new(meta.module.clone(), meta.kind.as_str(), meta.name.as_str(), "")
    }

    #[tracing::instrument(level = "trace")]
    fn from_tokens(text: &str, tokens: &[&str]) -> Result<Self, Error> {
        if tokens.iter().any(|token| token.is_empty()) {
            return Err(Error::EmptySegment(text.to_string()));
        }

        let mut module = vec![];
        let mut rest = tokens;

        loop {
            match rest {
                [MODULE, name] => return Ok(Self::new(module, MODULE, *name, "")),
                [MODULE, tail @ ..] => {
                    if tail.is_empty() {
                        return Err(Error::Truncated(text.to_string()));
                    }
                    // module names run until the next marker
                    let end = tail
                        .iter()
                        .position(|token| *token == RESOURCE || IMPLICIT_KINDS.contains(token))
                        .ok_or_else(|| Error::MissingKind(text.to_string()))?;
                    if end == 0 {
                        return Err(Error::Truncated(text.to_string()));
                    }

                    module.extend(tail[..end].iter().map(|name| name.to_string()));
                    rest = &tail[end..];
                }
                [RESOURCE, kind, name, attribute @ ..] => {
                    return Ok(Self::new(module, *kind, *name, attribute.join(".")))
                }
                [RESOURCE, ..] => return Err(Error::Truncated(text.to_string())),
                [kind, name, attribute @ ..] if IMPLICIT_KINDS.contains(kind) => {
                    return Ok(Self::new(module, *kind, *name, attribute.join(".")))
                }
                [kind] if IMPLICIT_KINDS.contains(kind) => {
                    return Err(Error::Truncated(text.to_string()))
                }
                _ => return Err(Error::MissingResourceMarker(text.to_string())),
            }
        }
    }

    pub fn module(&self) -> &[String] {
        &self.module
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn attribute_path(&self) -> Result<Path, crate::lookup::Error> {
        Path::parse(&self.attribute)
    }

    pub fn is_implicit(&self) -> bool {
        IMPLICIT_KINDS.contains(&self.kind.as_str())
    }

    /// Same address one module further down, `module` becomes the outermost module
    pub fn prepend_parent_module(&self, module: &str) -> Self {
        let mut fqrn = self.clone();
        if !module.is_empty() {
            fqrn.module.insert(0, module.to_string());
        }
        fqrn
    }

    /// Address of the whole resource
    pub fn without_attribute(&self) -> Self {
        Self {
            attribute: String::new(),
            ..self.clone()
        }
    }

    pub fn with_attribute(&self, attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ..self.clone()
        }
    }
}

/// `name[0]` -> `name.0`, `list[*]` -> `list.*`, `map["key"]` -> `map.key`
fn rewrite_brackets(text: &str) -> Result<String, Error> {
    let malformed = || Error::MalformedIndex(text.to_string());

    let mut rewritten = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(['[', ']']) {
        if rest[open..].starts_with(']') {
            return Err(malformed());
        }

        rewritten.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find(']').ok_or_else(malformed)?;

        let index = after[..close].trim();
        let index = index
            .strip_prefix('"')
            .and_then(|index| index.strip_suffix('"'))
            .unwrap_or(index);
        if index.is_empty() || index.contains('[') {
            return Err(malformed());
        }

        rewritten.push('.');
        rewritten.push_str(index);
        rest = &after[close + 1..];
    }

    rewritten.push_str(rest);
    Ok(rewritten)
}

impl std::str::FromStr for Fqrn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fqrn::parse(s)
    }
}

impl std::fmt::Display for Fqrn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for module in &self.module {
            write!(f, "{MODULE}.{module}.")?;
        }

        if self.is_implicit() {
            write!(f, "{}.{}", self.kind, self.name)?;
        } else {
            write!(f, "{RESOURCE}.{}.{}", self.kind, self.name)?;
        }

        if !self.attribute.is_empty() {
            write!(f, ".{}", self.attribute)?;
        }

        Ok(())
    }
}

impl TryFrom<&Traversal> for Fqrn {
    type Error = Error;

    fn try_from(traversal: &Traversal) -> Result<Self, Self::Error> {
        let Expression::Variable(root) = &traversal.expr else {
            return Err(Error::UnsupportedTraversal(format!("{:?}", traversal.expr)));
        };

        let mut tokens = vec![root.as_str().to_string()];
        for operator in &traversal.operators {
            let token = match operator {
                TraversalOperator::GetAttr(ident) => ident.as_str().to_string(),
                TraversalOperator::Index(Expression::Number(num)) => num.to_string(),
                TraversalOperator::Index(Expression::String(key)) => key.clone(),
                TraversalOperator::LegacyIndex(index) => index.to_string(),
                TraversalOperator::AttrSplat | TraversalOperator::FullSplat => {
                    crate::path::Segment::WILDCARD.to_string()
                }
                other => return Err(Error::UnsupportedTraversal(format!("{other:?}"))),
            };
            tokens.push(token);
        }

        let text = tokens.join(".");
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        Fqrn::from_tokens(&text, &tokens)
    }
}
