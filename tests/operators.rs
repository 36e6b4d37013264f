//! Row-table operators driven through `TableSession`.

use anyhow::Result;
use flatnest::testing::{TempFixture, assert_column_eq, people_csv, people_table, sales_table};
use flatnest::{
    AggFunc, Comparison, Direction, EngineError, JoinKind, LoadOptions, RowTable, TableSession,
    Value,
};

fn departments() -> RowTable {
    RowTable::new(
        vec!["dept_name".into(), "floor".into()],
        vec![
            vec![Value::from("Alice"), Value::Int(1)],
            vec![Value::from("Bob"), Value::Int(2)],
            vec![Value::from("Bob"), Value::Int(3)],
            vec![Value::from("Zed"), Value::Int(9)],
        ],
    )
}

#[test]
fn filter_on_loaded_file() -> Result<()> {
    let file = TempFixture::csv(people_csv())?;
    let mut session = TableSession::default();
    let message = session.load(file.path(), LoadOptions::default())?;
    assert!(message.contains("3 records, 2 fields"), "{message}");

    session.add_filter("age", Comparison::Gt, 25);
    let result = session.execute()?;
    assert_column_eq(&result, "name", &[Value::from("Bob"), Value::from("Carol")]);
    Ok(())
}

#[test]
fn repeating_a_filter_changes_nothing() -> Result<()> {
    let mut once = TableSession::default();
    once.load_table(people_table());
    once.add_filter("age", Comparison::Ge, 30);

    let mut twice = TableSession::default();
    twice.load_table(people_table());
    twice
        .add_filter("age", Comparison::Ge, 30)
        .add_filter("age", Comparison::Ge, 30);

    assert_eq!(once.execute()?, twice.execute()?);
    Ok(())
}

#[test]
fn execute_is_repeatable() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(people_table());
    session.add_order_by("age", Direction::Descending);
    let first = session.execute()?;
    assert_eq!(first, session.execute()?);
    assert_eq!(session.operations().len(), 1);
    Ok(())
}

#[test]
fn join_cardinality_by_kind() -> Result<()> {
    let run = |kind: JoinKind| -> Result<RowTable> {
        let mut session = TableSession::default();
        session.load_table(people_table());
        session.add_join(kind, departments(), "name", "dept_name");
        Ok(session.execute()?)
    };

    let inner = run(JoinKind::Inner)?;
    assert_eq!(inner.columns(), &["name", "age", "floor"]);
    assert_eq!(inner.len(), 3);
    assert_column_eq(&inner, "floor", &[Value::Int(1), Value::Int(2), Value::Int(3)]);

    let left = run(JoinKind::Left)?;
    assert_eq!(left.len(), 4);
    assert_eq!(left.value(3, "floor")?, &Value::Null);

    let right = run(JoinKind::Right)?;
    assert_eq!(right.len(), 4);
    assert_eq!(right.value(3, "name")?, &Value::from("Zed"));
    assert_eq!(right.value(3, "age")?, &Value::Null);

    let full = run(JoinKind::Full)?;
    assert_eq!(full.len(), 5);
    Ok(())
}

#[test]
fn missing_join_key_names_the_side() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(people_table());
    session.add_join(JoinKind::Inner, departments(), "name", "nope");
    match session.execute() {
        Err(EngineError::KeyNotFound { key, side, .. }) => {
            assert_eq!(key, "nope");
            assert_eq!(side, "right");
        }
        other => anyhow::bail!("expected KeyNotFound, got {other:?}"),
    }
    Ok(())
}

#[test]
fn group_by_sum_keeps_first_seen_order() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(sales_table());
    session.add_group_by(["category"], Some((AggFunc::Sum, "amount")));
    let result = session.execute()?;
    assert_eq!(result.columns(), &["category", "sum"]);
    assert_column_eq(&result, "category", &[Value::from("A"), Value::from("B")]);
    assert_column_eq(&result, "sum", &[Value::Int(40), Value::Int(20)]);
    Ok(())
}

#[test]
fn group_by_without_aggregate_counts() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(sales_table());
    session.add_group_by(["category"], None);
    let result = session.execute()?;
    assert_column_eq(&result, "count", &[Value::Int(2), Value::Int(1)]);
    Ok(())
}

#[test]
fn having_then_order_then_limit() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(sales_table());
    session
        .add_group_by(["category"], Some((AggFunc::Avg, "amount")))
        .add_having(AggFunc::Avg, Comparison::Gt, 15)
        .add_order_by("avg", Direction::Ascending)
        .add_limit(5);
    let result = session.execute()?;
    assert_column_eq(&result, "category", &[Value::from("A"), Value::from("B")]);
    assert_column_eq(&result, "avg", &[Value::Float(20.0), Value::Float(20.0)]);
    Ok(())
}

#[test]
fn having_on_wrong_aggregate_is_empty() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(sales_table());
    session
        .add_group_by(["category"], Some((AggFunc::Sum, "amount")))
        .add_having(AggFunc::Max, Comparison::Gt, 0);
    assert!(session.execute()?.is_empty());
    Ok(())
}

#[test]
fn limit_returns_min_of_count_and_rows() -> Result<()> {
    for (count, expected) in [(0, 0), (2, 2), (3, 3), (10, 3)] {
        let mut session = TableSession::default();
        session.load_table(people_table());
        session.add_limit(count);
        assert_eq!(session.execute()?.len(), expected, "limit {count}");
    }
    Ok(())
}

#[test]
fn select_unknown_column_fails() {
    let mut session = TableSession::default();
    session.load_table(people_table());
    session.add_select(["name", "zip"]);
    let err = session.execute().err().map(|e| e.to_string()).unwrap_or_default();
    assert_eq!(err, "column 'zip' not found; available columns: [name, age]");
}

#[test]
fn remove_and_clear_operations() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(people_table());
    session.add_filter("age", Comparison::Gt, 100).add_limit(1);
    assert!(session.remove_operation(0).is_some());
    assert!(session.remove_operation(5).is_none());
    assert_eq!(session.execute()?.len(), 1);
    session.clear_operations();
    assert_eq!(session.execute()?.len(), 3);
    Ok(())
}

#[test]
fn execute_before_load_is_an_error() {
    let session = TableSession::default();
    assert!(matches!(session.execute(), Err(EngineError::Load { .. })));
    assert!(session.explain().is_none());
}

#[test]
fn contains_filter_ignores_case() -> Result<()> {
    let mut session = TableSession::default();
    session.load_table(people_table());
    session.add_filter("name", Comparison::Contains, "O");
    let result = session.execute()?;
    assert_column_eq(&result, "name", &[Value::from("Bob"), Value::from("Carol")]);
    Ok(())
}

#[test]
fn join_matches_boolean_flags_against_integer_ids() -> Result<()> {
    let users = TempFixture::csv("id,name\n1,a\n2,b\n3,c\n")?;
    let flags = TempFixture::csv("user_id,flag\n1,x\n0,y\n1,z\n")?;

    let mut right = TableSession::default();
    right.load(flags.path(), LoadOptions::default())?;
    let flags_table = right.execute()?;
    assert_eq!(flags_table.value(0, "user_id")?, &Value::Bool(true));

    right.add_filter("user_id", Comparison::Eq, 1);
    let filtered = right.execute()?.len();

    let mut session = TableSession::default();
    session.load(users.path(), LoadOptions::default())?;
    session.add_join(JoinKind::Inner, flags_table, "id", "user_id");
    let joined = session.execute()?;
    assert_eq!(joined.len(), 2);
    assert_eq!(joined.len(), filtered);
    assert_column_eq(&joined, "flag", &[Value::from("x"), Value::from("z")]);
    Ok(())
}
