//! Document sessions: loading, filters, joins, projection and grouping over nested records.

use anyhow::Result;
use flatnest::testing::TempFixture;
use flatnest::{
    CollectionShape, Comparison, DocValue, DocumentCollection, DocumentSession, EngineError,
    parse_document,
};

const ORDERS: &str = r#"[
  {"id": 1, "customer": {"name": "Ada", "city": "Oslo"}, "total": 120, "status": "shipped"},
  {"id": 2, "customer": {"name": "Bo", "city": "Rome"}, "total": "45.5", "status": "pending"},
  {"id": 3, "customer": {"name": "Cy", "city": "Oslo"}, "total": 80, "status": "Shipped"},
  {"id": 4, "customer": null, "total": "n/a", "status": "pending"}
]"#;

fn session() -> Result<(TempFixture, DocumentSession)> {
    let file = TempFixture::json(ORDERS)?;
    let mut session = DocumentSession::default();
    let message = session.load(file.path())?;
    assert!(message.ends_with(": 4 records, 4 fields"), "{message}");
    Ok((file, session))
}

fn ids(docs: &[DocValue]) -> Vec<DocValue> {
    docs.iter().map(|d| d.lookup("id").clone()).collect()
}

#[test]
fn test_load_reports_fields_as_dot_paths() -> Result<()> {
    let (_file, session) = session()?;
    assert_eq!(
        session.fields(),
        vec!["id", "customer", "customer.name", "customer.city", "total", "status"]
    );
    let info = session.info().ok_or_else(|| anyhow::anyhow!("no info"))?;
    assert_eq!(info.records, 4);
    assert_eq!(info.fields, 4);
    assert_eq!(session.preview(2).len(), 2);
    assert_eq!(session.preview(10).len(), 4);
    Ok(())
}

#[test]
fn test_numeric_filter_reads_numeric_text() -> Result<()> {
    let (_file, mut session) = session()?;
    session.add_filter("total", Comparison::Gt, "50");
    assert_eq!(ids(&session.execute()?), vec![DocValue::Int(1), DocValue::Int(3)]);

    session.clear_operations();
    session.add_filter("total", Comparison::Lt, "100");
    assert_eq!(ids(&session.execute()?), vec![DocValue::Int(2), DocValue::Int(3)]);
    Ok(())
}

#[test]
fn test_equality_and_contains_on_nested_fields() -> Result<()> {
    let (_file, mut session) = session()?;
    session.add_filter("customer.city", Comparison::Eq, "Oslo");
    assert_eq!(ids(&session.execute()?), vec![DocValue::Int(1), DocValue::Int(3)]);

    session.clear_operations();
    session.add_filter("status", Comparison::Contains, "SHIP");
    assert_eq!(ids(&session.execute()?), vec![DocValue::Int(1), DocValue::Int(3)]);

    session.clear_operations();
    session.add_filter("status", Comparison::Ne, "pending");
    assert_eq!(session.execute()?.len(), 2);
    Ok(())
}

#[test]
fn test_join_attaches_matching_documents() -> Result<()> {
    let (_file, mut session) = session()?;
    let cities = DocumentCollection::from_value(parse_document(
        r#"[{"city": "Oslo", "country": "NO"}, {"city": "Rome", "country": "IT"}, {"city": null}]"#,
    )?);
    session.add_join(cities, "customer.city", "city");
    let joined = session.execute()?;
    assert_eq!(joined.len(), 4);

    let countries = |doc: &DocValue| -> Vec<String> {
        match doc.lookup("joined_data") {
            DocValue::Array(items) => items.iter().map(|d| d.lookup("country").to_text()).collect(),
            _ => Vec::new(),
        }
    };
    assert_eq!(countries(&joined[0]), vec!["NO"]);
    assert_eq!(countries(&joined[1]), vec!["IT"]);
    // a null key never matches the null city
    assert_eq!(joined[3].lookup("joined_data"), &DocValue::Array(Vec::new()));
    Ok(())
}

#[test]
fn test_projection_builds_nested_output() -> Result<()> {
    let (_file, mut session) = session()?;
    session
        .add_projection(["id", "customer.name", "missing.field"])
        .add_limit(1);
    let out = session.execute()?;
    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0],
        parse_document(r#"{"id": 1, "customer": {"name": "Ada"}, "missing": {"field": null}}"#)?
    );
    Ok(())
}

#[test]
fn test_group_by_counts_in_first_seen_order() -> Result<()> {
    let (_file, mut session) = session()?;
    session.add_group_by("customer.city");
    let out = session.execute()?;
    let rendered: Vec<String> = out.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            r#"{"customer.city":"Oslo","count":2}"#,
            r#"{"customer.city":"Rome","count":1}"#,
            r#"{"customer.city":"null","count":1}"#,
        ]
    );
    Ok(())
}

#[test]
fn test_single_object_loads_as_one_document() -> Result<()> {
    let mut session = DocumentSession::default();
    assert_eq!(session.load_text(r#"{"a": 1, "b": {"c": 2}}"#)?, 1);
    assert_eq!(
        session.collection().map(DocumentCollection::shape),
        Some(CollectionShape::Object)
    );
    assert_eq!(session.fields(), vec!["a", "b", "b.c"]);
    Ok(())
}

#[test]
fn test_unreadable_document_file_is_a_load_error() -> Result<()> {
    let file = TempFixture::json("{not valid")?;
    let mut session = DocumentSession::default();
    let err = session.load(file.path()).err().map(|e| e.to_string()).unwrap_or_default();
    assert!(err.starts_with("failed to load"), "{err}");
    assert!(session.execute().is_err());
    Ok(())
}

#[test]
fn test_operations_are_listed_and_removable() -> Result<()> {
    let (_file, mut session) = session()?;
    session.add_limit(2).add_group_by("status");
    let listed: Vec<String> = session.operations().iter().map(ToString::to_string).collect();
    assert_eq!(listed.len(), 2);
    assert!(session.remove_operation(1).is_some());
    assert_eq!(session.execute()?.len(), 2);
    Ok(())
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    let text = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
    assert!(matches!(parse_document(&text), Err(EngineError::Parse { .. })));
}
