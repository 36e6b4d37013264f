//! Document trees and collections with dot-path addressing.

use crate::parse::structured::write_quoted;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter, Result as FormatResult, Write as _};

/// Insertion-ordered object representation.
pub type DocMap = IndexMap<String, DocValue>;

/// A node of a document tree.
#[derive(Clone, Debug, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<DocValue>),
    Object(DocMap),
}

impl DocValue {
    /// Resolve a dot-separated path such as `address.city`.
    ///
    /// Returns `None` when a segment is missing or an intermediate value is not an object.
    pub fn get_path(&self, path: &str) -> Option<&DocValue> {
        path.split('.').try_fold(self, |cur, key| match cur {
            DocValue::Object(map) => map.get(key),
            _ => None,
        })
    }

    /// Like [`get_path`](Self::get_path), but a failed lookup reads as null.
    pub fn lookup(&self, path: &str) -> &DocValue {
        const NULL: &DocValue = &DocValue::Null;
        self.get_path(path).unwrap_or(NULL)
    }

    /// Write `value` at `path`, creating intermediate objects.
    ///
    /// A non-object value sitting on an intermediate segment is replaced by an object.
    /// Does nothing when `self` is not an object.
    pub fn set_path(&mut self, path: &str, value: DocValue) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };
        let mut cur = self;
        for seg in segments {
            let DocValue::Object(map) = cur else {
                return;
            };
            let slot = map
                .entry(seg.to_string())
                .or_insert_with(|| DocValue::Object(DocMap::new()));
            if !matches!(slot, DocValue::Object(_)) {
                *slot = DocValue::Object(DocMap::new());
            }
            cur = slot;
        }
        if let DocValue::Object(map) = cur {
            map.insert(last.to_string(), value);
        }
    }

    /// Text rendering used for equality filters and join/group keys.
    ///
    /// Strings render raw, containers render as compact text.
    pub fn to_text(&self) -> String {
        match self {
            DocValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Numeric coercion; `None` when the value is not a number or numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DocValue::Int(i) => Some(*i as f64),
            DocValue::Float(x) => Some(*x),
            DocValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, DocValue::Object(_))
    }
}

impl Display for DocValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            DocValue::Null => f.write_str("null"),
            DocValue::Bool(b) => write!(f, "{b}"),
            DocValue::Int(i) => write!(f, "{i}"),
            DocValue::Float(x) if x.is_finite() => write!(f, "{x:?}"),
            DocValue::Float(_) => f.write_str("null"),
            DocValue::String(s) => write_quoted(f, s),
            DocValue::Array(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            DocValue::Object(map) => {
                f.write_char('{')?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write_quoted(f, k)?;
                    write!(f, ":{v}")?;
                }
                f.write_char('}')
            }
        }
    }
}

/// What a loaded document source held at the top level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionShape {
    Array,
    Object,
}

/// An ordered sequence of documents.
///
/// A single non-array tree is stored as a one-element sequence; [`shape`](Self::shape)
/// remembers which it was.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentCollection {
    docs: Vec<DocValue>,
    shape: CollectionShape,
}

impl DocumentCollection {
    /// Normalize a parsed tree: arrays become the sequence, anything else is wrapped.
    pub fn from_value(value: DocValue) -> Self {
        match value {
            DocValue::Array(docs) => Self {
                docs,
                shape: CollectionShape::Array,
            },
            other => Self {
                docs: vec![other],
                shape: CollectionShape::Object,
            },
        }
    }

    pub fn from_docs(docs: Vec<DocValue>) -> Self {
        Self {
            docs,
            shape: CollectionShape::Array,
        }
    }

    pub fn docs(&self) -> &[DocValue] {
        &self.docs
    }

    pub fn into_docs(self) -> Vec<DocValue> {
        self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn shape(&self) -> CollectionShape {
        self.shape
    }

    pub fn preview(&self, n: usize) -> &[DocValue] {
        &self.docs[..n.min(self.docs.len())]
    }

    /// Dot-path field names of the first document, in encounter order.
    ///
    /// Nested objects contribute both their own path and their children's paths.
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(first) = self.docs.first() {
            collect_fields(first, "", &mut out);
        }
        out
    }
}

fn collect_fields(value: &DocValue, prefix: &str, out: &mut Vec<String>) {
    let DocValue::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        out.push(name.clone());
        collect_fields(child, &name, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::structured::parse_document;

    #[test]
    fn dot_paths() -> anyhow::Result<()> {
        let doc = parse_document(r#"{"a": {"b": {"c": 7}}, "s": "x"}"#)?;
        assert_eq!(doc.lookup("a.b.c"), &DocValue::Int(7));
        assert_eq!(doc.lookup("s.length"), &DocValue::Null);
        assert_eq!(doc.lookup("missing"), &DocValue::Null);
        Ok(())
    }

    #[test]
    fn set_path_builds_nested_objects() {
        let mut doc = DocValue::Object(DocMap::new());
        doc.set_path("user.name", DocValue::String("Ann".into()));
        doc.set_path("user.age", DocValue::Int(4));
        doc.set_path("id", DocValue::Int(1));
        assert_eq!(doc.to_string(), r#"{"user":{"name":"Ann","age":4},"id":1}"#);
    }

    #[test]
    fn fields_of_first_document() -> anyhow::Result<()> {
        let docs = DocumentCollection::from_value(parse_document(
            r#"[{"id": 1, "address": {"city": "X", "zip": "1"}, "tags": []}, {"other": 1}]"#,
        )?);
        assert_eq!(
            docs.fields(),
            vec!["id", "address", "address.city", "address.zip", "tags"]
        );
        assert_eq!(docs.shape(), CollectionShape::Array);
        Ok(())
    }

    #[test]
    fn single_object_is_wrapped() -> anyhow::Result<()> {
        let docs = DocumentCollection::from_value(parse_document(r#"{"k": 1}"#)?);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs.shape(), CollectionShape::Object);
        Ok(())
    }
}
