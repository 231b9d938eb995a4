//! Dotted schema paths such as `measurement_location.items.properties.latitude_ddeg`.

use std::fmt;

/// One step of a [`SchemaPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Look up a property by name, falling back to a direct key.
    Property(String),
    /// Descend into an array schema's `items`.
    Items,
    /// Descend into a `properties` map.
    Properties,
    /// Array position, written `name[0]` or as a bare numeric segment.
    Index(usize),
}

/// Parsed lookup key into the schema tree.
///
/// Two paths are equal when their segments are equal, which makes the type
/// usable as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SchemaPath {
    segments: Vec<PathSegment>,
}

impl SchemaPath {
    /// The empty path, addressing the schema root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path. Bracketed indexes may follow any name.
    ///
    /// Parsing never fails: malformed brackets are kept as part of the name,
    /// so the lookup simply misses.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let (name, indexes) = split_indexes(part);
            if !name.is_empty() {
                segments.push(parse_name(name));
            }
            segments.extend(indexes.into_iter().map(PathSegment::Index));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last property name on the path, used to label a field in messages.
    pub fn field_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|s| match s {
            PathSegment::Property(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Append a segment, returning the extended path.
    pub fn join(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl From<&str> for SchemaPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            let name = match segment {
                PathSegment::Index(i) => {
                    write!(f, "[{}]", i)?;
                    first = false;
                    continue;
                }
                PathSegment::Property(name) => name.as_str(),
                PathSegment::Items => "items",
                PathSegment::Properties => "properties",
            };
            if !first {
                f.write_str(".")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

fn parse_name(name: &str) -> PathSegment {
    match name {
        "items" => PathSegment::Items,
        "properties" => PathSegment::Properties,
        n if n.bytes().all(|b| b.is_ascii_digit()) => match n.parse() {
            Ok(i) => PathSegment::Index(i),
            Err(_) => PathSegment::Property(n.to_string()),
        },
        n => PathSegment::Property(n.to_string()),
    }
}

/// Split `name[1][2]` into `("name", [1, 2])`.
fn split_indexes(part: &str) -> (&str, Vec<usize>) {
    let Some(open) = part.find('[') else {
        return (part, Vec::new());
    };
    let (name, mut rest) = part.split_at(open);
    let mut indexes = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return (part, Vec::new());
        };
        match inner[..close].parse() {
            Ok(i) => indexes.push(i),
            Err(_) => return (part, Vec::new()),
        }
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        return (part, Vec::new());
    }
    (name, indexes)
}

/// Render a JSON Pointer instance path (`/measurement_location/0/name`)
/// in the dotted form used for user-facing paths (`measurement_location[0].name`).
pub fn pointer_to_dotted(pointer: &str) -> String {
    let mut out = String::new();
    for raw in pointer.split('/').skip(1) {
        let part = raw.replace("~1", "/").replace("~0", "~");
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(&part);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_schema_style_path() {
        let path = SchemaPath::parse("measurement_location.items.properties.latitude_ddeg");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Property("measurement_location".into()),
                PathSegment::Items,
                PathSegment::Properties,
                PathSegment::Property("latitude_ddeg".into()),
            ]
        );
        assert_eq!(path.field_name(), Some("latitude_ddeg"));
    }

    #[test]
    fn parse_bracket_indexes() {
        let path = SchemaPath::parse("measurement_location[0].measurement_point[12].name");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Property("measurement_location".into()),
                PathSegment::Index(0),
                PathSegment::Property("measurement_point".into()),
                PathSegment::Index(12),
                PathSegment::Property("name".into()),
            ]
        );
        assert_eq!(
            path.to_string(),
            "measurement_location[0].measurement_point[12].name"
        );
    }

    #[test]
    fn parse_numeric_segment_as_index() {
        let path = SchemaPath::parse("measurement_location.3");
        assert_eq!(path.segments()[1], PathSegment::Index(3));
    }

    #[test]
    fn malformed_brackets_stay_in_name() {
        let path = SchemaPath::parse("foo[x]");
        assert_eq!(path.segments(), &[PathSegment::Property("foo[x]".into())]);
    }

    #[test]
    fn empty_path_is_root() {
        assert!(SchemaPath::parse("").is_root());
        assert_eq!(SchemaPath::root().to_string(), "");
    }

    #[test]
    fn equal_paths_hash_equal() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(SchemaPath::parse("a.items.b"));
        assert!(set.contains(&SchemaPath::parse("a.items.b")));
        assert!(!set.contains(&SchemaPath::parse("a.b")));
    }

    #[test]
    fn pointer_rendering() {
        assert_eq!(
            pointer_to_dotted("/measurement_location/0/latitude_ddeg"),
            "measurement_location[0].latitude_ddeg"
        );
        assert_eq!(pointer_to_dotted(""), "");
        assert_eq!(pointer_to_dotted("/a~1b"), "a/b");
    }
}
