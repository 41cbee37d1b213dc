//! Query integration tests
//!
//! SQL expressions evaluated against tables that went through a real save
//! and load.

use chrono::NaiveDate;
use rowdb::{Database, DatabaseConfig, DbError, Frame, Params, Row, Scalar};
use tempfile::TempDir;

fn params(pairs: &[(&str, Scalar)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn shop() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(&DatabaseConfig::in_dir(dir.path())).unwrap();
    db.register_table("users", &["user_id"]).unwrap();
    db.register_table("orders", &["order_id"]).unwrap();

    db.insert_data(
        "users",
        &Frame::from_rows(vec![
            Row::new().with("user_id", 1).with("name", "ann").with("region", "eu"),
            Row::new().with("user_id", 2).with("name", "bob").with("region", "us"),
            Row::new().with("user_id", 3).with("name", "cy").with("region", "eu"),
        ]),
    )
    .unwrap();

    let orders = [
        (100, 1, 20.0, "2024-01-01"),
        (101, 1, 5.5, "2024-01-03"),
        (102, 2, 12.0, "2024-01-03"),
        (103, 3, 7.25, "2024-01-05"),
        (104, 4, 99.0, "2024-01-06"),
    ];
    db.insert_data(
        "orders",
        &Frame::from_rows(orders.iter().map(|(id, user, amount, day)| {
            Row::new()
                .with("order_id", *id)
                .with("user_id", *user)
                .with("amount", *amount)
                .with("day", *day)
        })),
    )
    .unwrap();
    (dir, db)
}

#[test]
fn test_filter_with_date_parameter() {
    let (_dir, db) = shop();
    let since = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    let out = db
        .query(
            "SELECT order_id FROM orders WHERE day >= $since AND amount < $cap ORDER BY order_id",
            &params(&[("since", Scalar::Date(since)), ("cap", 50.into())]),
        )
        .unwrap();
    let ids: Vec<&Scalar> = out.column("order_id").unwrap();
    assert_eq!(ids, vec![&Scalar::Int(101), &Scalar::Int(102), &Scalar::Int(103)]);
}

#[test]
fn test_join_group_sort() {
    let (_dir, db) = shop();
    let out = db
        .query(
            "SELECT u.region, SUM(o.amount) AS revenue, COUNT(*) AS orders \
             FROM orders o JOIN users u ON o.user_id = u.user_id \
             GROUP BY u.region ORDER BY revenue DESC",
            &Params::new(),
        )
        .unwrap();

    assert_eq!(out.columns(), &["region", "revenue", "orders"]);
    assert_eq!(out.height(), 2);
    assert_eq!(out.get(0, "region"), Some(&Scalar::from("eu")));
    assert_eq!(out.get(0, "revenue"), Some(&Scalar::Float(32.75)));
    assert_eq!(out.get(0, "orders"), Some(&Scalar::Int(3)));
    assert_eq!(out.get(1, "revenue"), Some(&Scalar::Float(12.0)));
}

#[test]
fn test_anti_join_finds_orphans() {
    let (_dir, db) = shop();
    let out = db
        .query(
            "SELECT o.order_id FROM orders o LEFT JOIN users u ON o.user_id = u.user_id \
             WHERE u.user_id IS NULL",
            &Params::new(),
        )
        .unwrap();
    assert_eq!(out.height(), 1);
    assert_eq!(out.get(0, "order_id"), Some(&Scalar::Int(104)));
}

#[test]
fn test_string_literal_matches_date_column() {
    let (_dir, db) = shop();
    let out = db
        .query("SELECT * FROM orders WHERE day = '2024-01-03'", &Params::new())
        .unwrap();
    assert_eq!(out.height(), 2);
    assert!(matches!(out.get(0, "day"), Some(Scalar::Date(_))));
}

#[test]
fn test_sort_with_nan_keeps_finite_order() {
    let (_dir, mut db) = shop();
    db.register_table("samples", &["id"]).unwrap();
    db.insert_data(
        "samples",
        &Frame::from_rows(vec![
            Row::new().with("id", 1).with("x", 0.0).with("y", 0.0),
            Row::new().with("id", 2).with("x", 1.0).with("y", 2.0),
            Row::new().with("id", 3).with("x", -1.0).with("y", 1.0),
        ]),
    )
    .unwrap();

    let out = db
        .query("SELECT id, x / y AS r FROM samples ORDER BY r", &Params::new())
        .unwrap();
    let ids: Vec<&Scalar> = out.column("id").unwrap();
    let finite: Vec<&Scalar> = ids
        .iter()
        .copied()
        .filter(|id| **id != Scalar::Int(1))
        .collect();
    assert_eq!(finite, vec![&Scalar::Int(3), &Scalar::Int(2)]);

    let nan_at = ids.iter().position(|id| **id == Scalar::Int(1)).unwrap();
    assert!(nan_at == 0 || nan_at == 2);
    assert!(matches!(out.get(nan_at, "r"), Some(Scalar::Float(f)) if f.is_nan()));
}

#[test]
fn test_queries_see_latest_state_and_are_not_recorded() {
    let (_dir, mut db) = shop();
    let count = |db: &Database| {
        db.query("SELECT COUNT(*) AS n FROM orders", &Params::new())
            .unwrap()
            .get(0, "n")
            .cloned()
    };
    assert_eq!(count(&db), Some(Scalar::Int(5)));

    db.delete_data_by_date("orders", "day", "2024-01-01", "2024-01-03")
        .unwrap();
    assert_eq!(count(&db), Some(Scalar::Int(2)));
    assert_eq!(db.get_operation_history("orders").len(), 2);
}

#[test]
fn test_query_errors_carry_context() {
    let (_dir, db) = shop();

    let expression = "SELECT order_id / $d AS q FROM orders";
    match db.query(expression, &params(&[("d", 0.into())])) {
        Err(DbError::QueryEvaluation {
            expression: failed,
            parameters,
            message,
        }) => {
            assert_eq!(failed, expression);
            assert_eq!(parameters.get("d"), Some(&Scalar::Int(0)));
            assert!(message.contains("Divide by zero"), "{}", message);
        }
        other => panic!("expected evaluation error, got {:?}", other),
    }

    assert!(matches!(
        db.query("SELECT nope FROM orders", &Params::new()),
        Err(DbError::QueryEvaluation { ref message, .. }) if message.contains("nope")
    ));
    assert!(matches!(
        db.query(
            "SELECT * FROM orders o JOIN ghosts g ON o.user_id = g.user_id",
            &Params::new()
        ),
        Err(DbError::UnknownTable(ref t)) if t == "ghosts"
    ));
    assert!(matches!(
        db.query(
            "SELECT * FROM orders WHERE user_id = $a OR user_id = $b",
            &params(&[("a", 1.into())])
        ),
        Err(DbError::UndefinedParameter(ref p)) if p == "b"
    ));
    assert!(matches!(
        db.query("SELECT * FROM orders ORDER BY amount sideways", &Params::new()),
        Err(DbError::QuerySyntax { .. })
    ));
}

#[test]
fn test_queries_cannot_modify_tables() {
    let (_dir, db) = shop();
    assert!(matches!(
        db.query("INSERT INTO orders SELECT * FROM orders", &Params::new()),
        Err(DbError::QueryEvaluation { .. })
    ));
    assert_eq!(db.read_table("orders").unwrap().height(), 5);
}

#[test]
fn test_explain_and_show_tables() {
    let (_dir, db) = shop();
    let explanation = db
        .explain_query(
            "SELECT * FROM users u JOIN orders o ON o.user_id = u.user_id WHERE u.region = $r",
        )
        .unwrap();
    assert_eq!(explanation.tables, vec!["orders", "users"]);
    assert_eq!(explanation.parameters, vec!["r"]);
    assert!(explanation.plan.contains("Join"));

    let tables = db.show_tables().unwrap();
    assert_eq!(tables.height(), 2);
    assert_eq!(tables.get(0, "table_name"), Some(&Scalar::from("orders")));
    assert_eq!(tables.get(0, "rows"), Some(&Scalar::Int(5)));
    assert_eq!(tables.get(0, "columns"), Some(&Scalar::Int(4)));
    assert_eq!(tables.get(1, "exists"), Some(&Scalar::Bool(true)));
}
