//! DuckDB backend against a real in-memory database.
//!
//! Run with: cargo test -p dbtester_db --features duckdb

#![cfg(feature = "duckdb")]

use std::str::FromStr;

use dbtester_db::duckdb::DuckDbDataSource;
use dbtester_db::{
    open_data_source, DataSource, DataSourceConfig, DbValue, Decimal, SqlType,
};

fn memory() -> DuckDbDataSource {
    DuckDbDataSource::open_memory().unwrap()
}

#[test]
fn test_bind_and_query() {
    let ds = memory();
    let mut conn = ds.connection().unwrap();
    conn.execute_batch("CREATE TABLE t (id BIGINT PRIMARY KEY, name VARCHAR, amount DECIMAL(10,2))")
        .unwrap();

    {
        let mut stmt = conn.prepare("INSERT INTO t VALUES (?, ?, ?)").unwrap();
        stmt.bind(1, &DbValue::Integer(1), SqlType::BigInt).unwrap();
        stmt.bind(2, &DbValue::from("a"), SqlType::VarChar).unwrap();
        stmt.bind(3, &DbValue::Null, SqlType::Decimal).unwrap();
        assert_eq!(stmt.execute_update().unwrap(), 1);
    }

    let mut stmt = conn.prepare("SELECT id, name, amount FROM t WHERE id = ?").unwrap();
    stmt.bind(1, &DbValue::Integer(1), SqlType::BigInt).unwrap();
    let rows = stmt.execute_query(None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<i64>(0).unwrap(), 1);
    assert_eq!(rows[0].get::<String>(1).unwrap(), "a");
    assert_eq!(rows[0].get_raw(2), Some(&DbValue::Null));
}

#[test]
fn test_batch_and_max_rows() {
    let ds = memory();
    let mut conn = ds.connection().unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();

    {
        let mut stmt = conn.prepare("INSERT INTO t VALUES (?)").unwrap();
        for id in 1..=3 {
            stmt.bind(1, &DbValue::Integer(id), SqlType::Integer).unwrap();
            stmt.add_batch().unwrap();
        }
        assert_eq!(stmt.execute_batch().unwrap(), vec![1, 1, 1]);
    }

    let mut stmt = conn.prepare("SELECT id FROM t ORDER BY id").unwrap();
    assert_eq!(stmt.execute_query(Some(2)).unwrap().len(), 2);
}

#[test]
fn test_decimal_round_trip_keeps_value() {
    let ds = memory();
    let mut conn = ds.connection().unwrap();
    conn.execute_batch("CREATE TABLE t (amount DECIMAL(10,2))").unwrap();
    let amount = Decimal::from_str("10.50").unwrap();
    {
        let mut stmt = conn.prepare("INSERT INTO t VALUES (?)").unwrap();
        stmt.bind(1, &DbValue::Decimal(amount), SqlType::Decimal).unwrap();
        stmt.execute_update().unwrap();
    }
    let mut stmt = conn.prepare("SELECT amount FROM t").unwrap();
    let rows = stmt.execute_query(None).unwrap();
    assert!(rows[0].get_raw(0).unwrap().same_value(&DbValue::Decimal(amount)));
}

#[test]
fn test_metadata() {
    let ds = memory();
    let mut conn = ds.connection().unwrap();
    conn.execute_batch(
        "CREATE TABLE orders (id BIGINT PRIMARY KEY, customer VARCHAR NOT NULL, note VARCHAR)",
    )
    .unwrap();

    let meta = conn.metadata().unwrap();
    assert_eq!(meta.product_name().unwrap().as_deref(), Some("DuckDB"));
    assert_eq!(meta.identifier_quote().unwrap(), "\"");

    let columns = meta.columns(None, None, "orders").unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "customer", "note"]);
    assert_eq!(columns[0].sql_type, SqlType::BigInt);
    assert!(!columns[1].nullable);
    assert!(columns[2].nullable);

    assert_eq!(meta.primary_keys(None, None, "orders").unwrap(), vec!["id"]);
    assert_eq!(meta.tables(None, None, "orders").unwrap().len(), 1);
    assert!(meta.columns(None, None, "missing").unwrap().is_empty());
    assert!(meta.tables(None, None, "missing").unwrap().is_empty());
}

#[test]
fn test_sql_error_carries_statement() {
    let ds = memory();
    let mut conn = ds.connection().unwrap();
    let err = conn.execute_batch("SELEC 1").unwrap_err();
    assert!(err.to_string().contains("SELEC 1"), "{}", err);
}

#[test]
fn test_open_from_config() {
    let tmp = tempfile::TempDir::new().unwrap();
    let url = format!("duckdb:{}", tmp.path().join("db").join("test.duckdb").display());
    let ds = open_data_source(&DataSourceConfig::new(url)).unwrap();
    let mut conn = ds.connection().unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
    assert!(tmp.path().join("db").join("test.duckdb").exists());
}
