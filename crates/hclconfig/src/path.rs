//! attribute paths
//!
//! A [Path] is what is left of a reference once the resource it points to has been found, e.g. the
//! `ports[0].host` in `resource.container.mine.ports[0].host`.
use crate::lookup::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a dotted path, segments may carry a bracketed index (`name[0]`)
    ///
    /// An empty string is the empty path.
    pub fn parse(path: &str) -> Result<Self, Error> {
        if path.is_empty() {
            return Ok(Self::default());
        }

        let segments = path
            .split('.')
            .map(Segment::parse)
            .collect::<Result<_, _>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }
}

impl<S: Into<Segment>> FromIterator<S> for Path {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::str::FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// One step of a [Path]
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Segment {
    /// field name, map key, digits (sequence index) or `*`; empty for a bare `[N]`
    pub name: String,
    pub index: Option<usize>,
}

impl Segment {
    pub const WILDCARD: &'static str = "*";

    pub fn parse(segment: &str) -> Result<Self, Error> {
        let Some(open) = segment.find('[') else {
            if segment.contains(']') {
                return Err(Error::MalformedIndex(segment.to_string()));
            }
            return Ok(Self::new(segment.to_string(), None));
        };

        let index = segment[open + 1..]
            .strip_suffix(']')
            .and_then(|index| index.trim().parse::<usize>().ok())
            .ok_or_else(|| Error::MalformedIndex(segment.to_string()))?;

        Ok(Self::new(segment[..open].to_string(), Some(index)))
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == Self::WILDCARD && self.index.is_none()
    }

    /// Digits only, addresses a sequence element
    pub fn as_index(&self) -> Option<usize> {
        if self.index.is_some() || self.name.is_empty() {
            return None;
        }
        if !self.name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.name.parse().ok()
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Segment::new(value.to_string(), None)
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        Segment::new(value, None)
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_segments() {
        let path = Path::parse("network[1].ip.0.*").unwrap();

        assert_eq!(
            path.segments(),
            &[
                Segment::new("network".into(), Some(1)),
                Segment::new("ip".into(), None),
                Segment::new("0".into(), None),
                Segment::new("*".into(), None),
            ]
        );
        assert_eq!(path.segments()[2].as_index(), Some(0));
        assert!(path.segments()[3].is_wildcard());
        assert_eq!(path.to_string(), "network[1].ip.0.*");
    }

    #[test]
    fn bare_index() {
        let segment = Segment::parse("[3]").unwrap();
        assert_eq!(segment, Segment::new(String::new(), Some(3)));
    }

    #[test]
    fn malformed_index() {
        for input in ["a[", "a[x]", "a]", "a[1", "a[-1]"] {
            assert_eq!(
                Segment::parse(input),
                Err(Error::MalformedIndex(input.to_string())),
                "{input}"
            );
        }
    }
}
