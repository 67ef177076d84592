mod support;

use std::sync::Arc;

use dbtester::{DbTester, DbValue, TesterError};
use support::fakes::FakeDatabase;
use support::{orders_db, tester_for, write_file};
use tempfile::TempDir;

/// Two orders, stored in the reverse of their id order.
fn seeded() -> (Arc<FakeDatabase>, DbTester) {
    let db = orders_db();
    let tester = tester_for(&db);
    tester
        .table("orders")
        .unwrap()
        .insert_columns(&["id", "customer", "total"])
        .unwrap()
        .values([DbValue::Integer(2), "y".into(), DbValue::Null])
        .values([DbValue::Integer(1), "z".into(), DbValue::Integer(5)])
        .exec()
        .unwrap();
    (db, tester)
}

#[test]
fn test_condition_counts() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();

    orders.matcher().eq("customer", "z").assert_one_match();
    orders.matcher().in_("id", [1, 2]).assert_matches(2);
    orders.matcher().eq("total", DbValue::Null).assert_one_match();
    orders
        .matcher()
        .eq("customer", "y")
        .eq("id", 1)
        .assert_no_match();
    assert_eq!(orders.matcher().row_count().unwrap(), 2);
}

#[test]
fn test_check_matches_reports_counts() {
    let (_db, tester) = seeded();
    let mismatch = tester
        .table("orders")
        .unwrap()
        .matcher()
        .check_matches(3)
        .unwrap()
        .unwrap();
    assert!(mismatch.message().contains("found 2"), "{}", mismatch);
    assert_eq!(mismatch.column(), None);
}

#[test]
#[should_panic(expected = "Expected 3 matching row(s)")]
fn test_assert_matches_panics_on_wrong_count() {
    let (_db, tester) = seeded();
    tester.table("orders").unwrap().matcher().assert_matches(3);
}

#[test]
fn test_in_with_null_is_rejected() {
    let (_db, tester) = seeded();
    let err = tester
        .table("orders")
        .unwrap()
        .matcher()
        .in_("id", [DbValue::Integer(1), DbValue::Null])
        .row_count()
        .unwrap_err();
    assert!(matches!(err, TesterError::InvalidArgument(_)));
}

#[test]
#[should_panic(expected = "Error matching table")]
fn test_assert_panics_on_errors() {
    let (_db, tester) = seeded();
    tester
        .table("orders")
        .unwrap()
        .matcher()
        .eq("nope", 1)
        .assert_no_match();
}

#[test]
fn test_data_set_matches_regardless_of_order() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders
        .csv_data_set()
        .load_str("id,customer\n1,z\n2,y\n")
        .unwrap();

    assert_eq!(
        orders.matcher().check_matches_data_set(&expected, &["id"]).unwrap(),
        None
    );
    // keyed on every column
    orders.matcher().assert_matches_data_set(&expected, &[]);
}

#[test]
fn test_decimal_values_match_by_value() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders
        .csv_data_set()
        .load_str("id,total\n1,5.00\n")
        .unwrap();
    orders
        .matcher()
        .eq("id", 1)
        .assert_matches_data_set(&expected, &["id"]);
}

#[test]
fn test_missing_key_is_reported() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders
        .csv_data_set()
        .load_str("id,customer\n1,z\n3,y\n")
        .unwrap();

    let mismatch = orders
        .matcher()
        .check_matches_data_set(&expected, &["id"])
        .unwrap()
        .unwrap();
    assert!(mismatch.message().contains("[3]"), "{}", mismatch);
    assert_eq!(mismatch.key(), Some("[3]"));
    assert_eq!(mismatch.column(), None);
}

#[test]
fn test_repeated_reference_row_needs_repeated_live_row() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders
        .csv_data_set()
        .load_str("customer\nz\nz\n")
        .unwrap();

    let mismatch = orders
        .matcher()
        .check_matches_data_set(&expected, &[])
        .unwrap()
        .unwrap();
    assert_eq!(mismatch.key(), Some("[z]"));
    assert!(mismatch.message().contains("more often"), "{}", mismatch);
}

#[test]
fn test_non_unique_key_pairs_rows_one_to_one() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    orders
        .insert_columns(&["id", "customer"])
        .unwrap()
        .values([DbValue::Integer(3), "z".into()])
        .exec()
        .unwrap();

    let same = orders
        .csv_data_set()
        .load_str("id,customer\n3,z\n2,y\n1,z\n")
        .unwrap();
    orders
        .matcher()
        .assert_matches_data_set(&same, &["customer"]);

    let repeated = orders
        .csv_data_set()
        .load_str("id,customer\n3,z\n2,y\n3,z\n")
        .unwrap();
    let mismatch = orders
        .matcher()
        .check_matches_data_set(&repeated, &["customer"])
        .unwrap()
        .unwrap();
    assert_eq!(mismatch.column(), Some("id"));
    assert_eq!(mismatch.key(), Some("[z]"));
}

#[test]
fn test_column_mismatch_names_column() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders
        .csv_data_set()
        .load_str("id,customer\n1,z\n2,x\n")
        .unwrap();

    let mismatch = orders
        .matcher()
        .check_matches_data_set(&expected, &["id"])
        .unwrap()
        .unwrap();
    assert_eq!(mismatch.column(), Some("customer"));
    assert_eq!(mismatch.key(), Some("[2]"));
    assert!(mismatch.message().contains("'customer'"), "{}", mismatch);
}

#[test]
fn test_row_count_mismatch() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders.csv_data_set().load_str("id\n1\n").unwrap();

    let mismatch = orders
        .matcher()
        .check_matches_data_set(&expected, &["id"])
        .unwrap()
        .unwrap();
    assert!(
        mismatch.message().contains("expected 1, found 2"),
        "{}",
        mismatch
    );
}

#[test]
fn test_empty_reference_data_set() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let empty = orders.csv_data_set().load_str("id,customer\n").unwrap();

    let mismatch = orders
        .matcher()
        .check_matches_data_set(&empty, &[])
        .unwrap()
        .unwrap();
    assert!(mismatch.message().starts_with("Expected no rows"), "{}", mismatch);

    assert_eq!(
        orders
            .matcher()
            .eq("customer", "nobody")
            .check_matches_data_set(&empty, &[])
            .unwrap(),
        None
    );
}

#[test]
fn test_unknown_key_column() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    let expected = orders.csv_data_set().load_str("id\n1\n2\n").unwrap();
    let err = orders
        .matcher()
        .check_matches_data_set(&expected, &["zone"])
        .unwrap_err();
    assert!(err.to_string().contains("zone"), "{}", err);
}

#[test]
fn test_binary_columns_compare_bytes() {
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();
    orders
        .update()
        .set("payload", b"ab".to_vec())
        .eq("id", 1)
        .exec()
        .unwrap();

    let same = orders.csv_data_set().load_str("id,payload\n1,YWI=\n").unwrap();
    orders
        .matcher()
        .eq("id", 1)
        .assert_matches_data_set(&same, &["id"]);

    let different = orders.csv_data_set().load_str("id,payload\n1,YWM=\n").unwrap();
    let mismatch = orders
        .matcher()
        .eq("id", 1)
        .check_matches_data_set(&different, &["id"])
        .unwrap()
        .unwrap();
    assert_eq!(mismatch.column(), Some("payload"));
}

#[test]
fn test_csv_file_reference() {
    let tmp = TempDir::new().unwrap();
    let good = write_file(tmp.path(), "good.csv", "id,customer\n2,y\n1,z\n");
    let bad = write_file(tmp.path(), "bad.csv", "id,customer\n2,y\n1,q\n");
    let (_db, tester) = seeded();
    let orders = tester.table("orders").unwrap();

    orders.matcher().assert_matches_csv(&good, &["id"]);
    let mismatch = orders
        .matcher()
        .check_matches_csv(&bad, &["id"])
        .unwrap()
        .unwrap();
    assert_eq!(mismatch.column(), Some("customer"));
}

#[test]
#[should_panic(expected = "Column 'customer'")]
fn test_assert_matches_csv_panics_on_mismatch() {
    let tmp = TempDir::new().unwrap();
    let bad = write_file(tmp.path(), "bad.csv", "id,customer\n1,q\n2,y\n");
    let (_db, tester) = seeded();
    tester
        .table("orders")
        .unwrap()
        .matcher()
        .assert_matches_csv(&bad, &["id"]);
}
