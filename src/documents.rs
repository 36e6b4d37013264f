//! Document operators: filter, join (lookup), project, group-by, limit.
//!
//! Fields are dot paths resolved through objects; a missing segment or a non-object
//! intermediate reads as null. None of these operators fail: a document that cannot be
//! compared simply does not match.

use crate::document::{DocMap, DocValue};
use crate::pipeline::DocOperation;
use crate::value::Comparison;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

/// Field attached to every primary document by a join.
pub const JOINED_FIELD: &str = "joined_data";

/// Run one document operation.
pub fn apply(op: &DocOperation, docs: Vec<DocValue>) -> Vec<DocValue> {
    match op {
        DocOperation::Filter { field, op, value } => filter(docs, field, *op, value),
        DocOperation::Join {
            secondary,
            main_field,
            join_field,
        } => lookup(docs, secondary.docs(), main_field, join_field),
        DocOperation::Project { fields } => project(&docs, fields),
        DocOperation::GroupBy { field } => group_by(&docs, field),
        DocOperation::Limit { count } => {
            let mut docs = docs;
            docs.truncate(*count);
            docs
        }
    }
}

/// Keep documents whose `field` satisfies `op` against `value`.
///
/// Equality compares text renderings; ordering operators compare numbers and drop documents
/// whose value is not numeric.
pub fn filter(docs: Vec<DocValue>, field: &str, op: Comparison, value: &str) -> Vec<DocValue> {
    let threshold = value.trim().parse::<f64>().ok();
    docs.into_iter()
        .filter(|doc| {
            let v = doc.lookup(field);
            match op {
                Comparison::Eq => v.to_text() == value,
                Comparison::Ne => v.to_text() != value,
                Comparison::Contains => v.to_text().to_lowercase().contains(&value.to_lowercase()),
                Comparison::Gt | Comparison::Lt | Comparison::Ge | Comparison::Le => {
                    match (v.as_number(), threshold) {
                        (Some(a), Some(b)) => match op {
                            Comparison::Gt => a > b,
                            Comparison::Lt => a < b,
                            Comparison::Ge => a >= b,
                            _ => a <= b,
                        },
                        _ => {
                            debug!(field, value = %v, "document value is not numeric");
                            false
                        }
                    }
                }
            }
        })
        .collect()
}

/// Attach to each object document the `secondary` documents whose `join_field` renders the
/// same as its `main_field`, under [`JOINED_FIELD`]. Null keys match nothing.
pub fn lookup(
    docs: Vec<DocValue>,
    secondary: &[DocValue],
    main_field: &str,
    join_field: &str,
) -> Vec<DocValue> {
    let mut index: HashMap<String, Vec<&DocValue>> = HashMap::new();
    for doc in secondary {
        let key = doc.lookup(join_field);
        if !matches!(key, DocValue::Null) {
            index.entry(key.to_text()).or_default().push(doc);
        }
    }
    docs.into_iter()
        .map(|mut doc| {
            let matches: Vec<DocValue> = match doc.lookup(main_field) {
                DocValue::Null => Vec::new(),
                key => index
                    .get(&key.to_text())
                    .map(|hits| hits.iter().map(|d| (*d).clone()).collect())
                    .unwrap_or_default(),
            };
            if let DocValue::Object(map) = &mut doc {
                map.insert(JOINED_FIELD.to_string(), DocValue::Array(matches));
            }
            doc
        })
        .collect()
}

/// Build a fresh nested object per document holding only `fields`. Missing fields become null.
pub fn project(docs: &[DocValue], fields: &[String]) -> Vec<DocValue> {
    docs.iter()
        .map(|doc| {
            let mut out = DocValue::Object(DocMap::new());
            for field in fields {
                out.set_path(field, doc.lookup(field).clone());
            }
            out
        })
        .collect()
}

/// One `{field: key, count: n}` document per distinct rendering of `field`, in
/// first-encountered order.
pub fn group_by(docs: &[DocValue], field: &str) -> Vec<DocValue> {
    let mut counts: IndexMap<String, i64> = IndexMap::new();
    for doc in docs {
        *counts.entry(doc.lookup(field).to_text()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(key, n)| {
            let mut map = DocMap::new();
            map.insert(field.to_string(), DocValue::String(key));
            map.insert("count".to_string(), DocValue::Int(n));
            DocValue::Object(map)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::structured::parse_document;

    fn docs(text: &str) -> Vec<DocValue> {
        match parse_document(text) {
            Ok(DocValue::Array(items)) => items,
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn numeric_filter_skips_non_numbers() {
        let input = docs(r#"[{"a": 5}, {"a": "7"}, {"a": "x"}, {"b": 1}]"#);
        let out = filter(input, "a", Comparison::Gt, "4");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn lookup_attaches_matches_in_order() {
        let users = docs(r#"[{"id": 1}, {"id": 2}, {"name": "no id"}]"#);
        let orders =
            docs(r#"[{"uid": 1, "n": "a"}, {"uid": 3}, {"uid": 1, "n": "b"}, {"n": "no uid"}]"#);
        let out = lookup(users, &orders, "id", "uid");
        assert_eq!(
            out[0].to_string(),
            r#"{"id":1,"joined_data":[{"uid":1,"n":"a"},{"uid":1,"n":"b"}]}"#
        );
        assert_eq!(out[1].lookup(JOINED_FIELD), &DocValue::Array(vec![]));
        assert_eq!(out[2].lookup(JOINED_FIELD), &DocValue::Array(vec![]));
    }

    #[test]
    fn project_writes_paths_independently() {
        let input = docs(r#"[{"user": {"name": "Ann", "age": 3}, "id": 9}]"#);
        let out = project(&input, &["user.name".into(), "id".into(), "missing".into()]);
        assert_eq!(out[0].to_string(), r#"{"user":{"name":"Ann"},"id":9,"missing":null}"#);
    }

    #[test]
    fn group_by_counts_renderings() {
        let input = docs(r#"[{"c": "x"}, {"c": 1}, {"c": "x"}, {}]"#);
        let out = group_by(&input, "c");
        let text: Vec<String> = out.iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            vec![
                r#"{"c":"x","count":2}"#,
                r#"{"c":"1","count":1}"#,
                r#"{"c":"null","count":1}"#
            ]
        );
    }
}
