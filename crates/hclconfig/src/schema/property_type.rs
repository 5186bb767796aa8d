//! textual type strings
//!
//! `[*][ [] | map[<key>] ][*]<kind>`
//!
//! | type string          | meaning                                  |
//! |----------------------|------------------------------------------|
//! | `string`             | plain leaf                               |
//! | `*string`            | pointer to leaf                          |
//! | `[]string`           | slice of leaf                            |
//! | `*[]*struct`         | pointer to slice of pointers to a struct |
//! | `map[string]int64`   | mapping of leaf                          |
//!
//! Without a container a second pointer marker is an inner pointer (`**string`).
use super::Error;
use crate::types::{Scalar, StructType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyType {
    pub outer_pointer: bool,
    pub container: Container,
    pub inner_pointer: bool,
    pub element: Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Container {
    #[default]
    None,
    Slice,
    Map(Scalar),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Scalar(Scalar),
    /// a composite, its fields are the children of the schema node
    Struct,
}

impl PropertyType {
    pub fn is_struct(&self) -> bool {
        self.element == Element::Struct
    }

    /// Split `ty` into its encodable layers
    ///
    /// Returns the nested struct type as well, if the element is a struct.
    pub fn encode(ty: &Type) -> Result<(Self, Option<&StructType>), Error> {
        let (outer_pointer, rest) = strip_pointer(ty);
        let (container, rest) = match rest {
            Type::Slice(element) => (Container::Slice, element.as_ref()),
            Type::Map(key, element) => (Container::Map(*key), element.as_ref()),
            other => (Container::None, other),
        };
        let (inner_pointer, rest) = strip_pointer(rest);

        let (element, st) = match rest {
            Type::Leaf(scalar) => (Element::Scalar(*scalar), None),
            Type::Struct(st) => (Element::Struct, Some(st)),
            _ => return Err(Error::Unencodable(ty.to_string())),
        };

        Ok((
            Self {
                outer_pointer,
                container,
                inner_pointer,
                element,
            },
            st,
        ))
    }

    /// Rebuild the [Type], `element` is the already built struct type for [Element::Struct]
    pub fn decode(&self, element: Option<StructType>) -> Type {
        let mut ty = match (self.element, element) {
            (Element::Scalar(scalar), _) => Type::Leaf(scalar),
            (Element::Struct, st) => Type::Struct(st.unwrap_or_default()),
        };

        if self.inner_pointer {
            ty = Type::pointer(ty);
        }

        ty = match self.container {
            Container::None => ty,
            Container::Slice => Type::slice(ty),
            Container::Map(key) => Type::map(key, ty),
        };

        if self.outer_pointer {
            ty = Type::pointer(ty);
        }

        ty
    }
}

fn strip_pointer(ty: &Type) -> (bool, &Type) {
    match ty {
        Type::Pointer(referent) => (true, referent.as_ref()),
        other => (false, other),
    }
}

impl std::str::FromStr for PropertyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || Error::UnparseableTypeString(s.to_string());

        let (outer_pointer, rest) = match s.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (container, rest) = if let Some(rest) = rest.strip_prefix("[]") {
            (Container::Slice, rest)
        } else if let Some(rest) = rest.strip_prefix("map[") {
            let (key, rest) = rest.split_once(']').ok_or_else(unparseable)?;
            let key = key.parse::<Scalar>().map_err(|_| unparseable())?;
            (Container::Map(key), rest)
        } else {
            (Container::None, rest)
        };

        let (inner_pointer, rest) = match rest.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        let element = match rest {
            "struct" => Element::Struct,
            other => Element::Scalar(other.parse::<Scalar>().map_err(|_| unparseable())?),
        };

        Ok(Self {
            outer_pointer,
            container,
            inner_pointer,
            element,
        })
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.outer_pointer {
            f.write_str("*")?;
        }
        match self.container {
            Container::None => {}
            Container::Slice => f.write_str("[]")?,
            Container::Map(key) => write!(f, "map[{key}]")?,
        }
        if self.inner_pointer {
            f.write_str("*")?;
        }
        match self.element {
            Element::Scalar(scalar) => write!(f, "{scalar}"),
            Element::Struct => f.write_str("struct"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> PropertyType {
        s.parse().expect("type string must parse")
    }

    #[test]
    fn combinations() {
        assert_eq!(
            parse("string"),
            PropertyType {
                outer_pointer: false,
                container: Container::None,
                inner_pointer: false,
                element: Element::Scalar(Scalar::String),
            }
        );
        assert_eq!(
            parse("*string"),
            PropertyType {
                outer_pointer: true,
                container: Container::None,
                inner_pointer: false,
                element: Element::Scalar(Scalar::String),
            }
        );
        assert_eq!(
            parse("[]int"),
            PropertyType {
                outer_pointer: false,
                container: Container::Slice,
                inner_pointer: false,
                element: Element::Scalar(Scalar::Int),
            }
        );
        assert_eq!(
            parse("*map[string]*struct"),
            PropertyType {
                outer_pointer: true,
                container: Container::Map(Scalar::String),
                inner_pointer: true,
                element: Element::Struct,
            }
        );
    }

    #[test]
    fn display_is_inverse() {
        for input in [
            "bool",
            "*float64",
            "[]string",
            "[]*struct",
            "*[]uint8",
            "map[string]interface",
            "map[int]*int64",
            "**string",
        ] {
            assert_eq!(parse(input).to_string(), input);
        }
    }

    #[test]
    fn unparseable() {
        for input in ["", "str", "[]", "map[string", "map[struct]int", "[]]int", "***int"] {
            assert!(
                matches!(
                    input.parse::<PropertyType>(),
                    Err(Error::UnparseableTypeString(s)) if s == input
                ),
                "{input}"
            );
        }
    }

    #[test]
    fn encode_decode() {
        let network = StructType::new("").field("id", "", Type::Leaf(Scalar::String));
        let ty = Type::slice(Type::pointer(network.clone().into()));

        let (property_type, st) = PropertyType::encode(&ty).unwrap();
        assert_eq!(property_type.to_string(), "[]*struct");
        assert_eq!(st, Some(&network));
        assert_eq!(property_type.decode(Some(network)), ty);
    }

    #[test]
    fn unencodable() {
        let ty = Type::slice(Type::slice(Type::Leaf(Scalar::String)));
        assert!(matches!(
            PropertyType::encode(&ty),
            Err(Error::Unencodable(s)) if s == "[][]string"
        ));
    }
}
