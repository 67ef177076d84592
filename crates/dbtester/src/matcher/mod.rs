//! Assertions on table contents.
//!
//! `check_*` methods return `Ok(Some(mismatch))` when the table does not match
//! and reserve `Err` for failures to run the check. `assert_*` methods panic
//! on either, so they read like `assert!` in tests.

mod data_set;
mod row_key;

use std::fmt;
use std::path::Path;

use dbtester_db::DbValue;

use crate::dataset::TableDataSet;
use crate::error::Result;
use crate::statement::Condition;
use crate::table::Table;

pub use row_key::{RowKey, RowKeyFactory};

/// Why a table did not match an expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    message: String,
    column: Option<String>,
    key: Option<String>,
}

impl Mismatch {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            column: None,
            key: None,
        }
    }

    pub(crate) fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Column whose value differed, for value mismatches.
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// String form of the row key involved, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Mismatch {}

/// Row count and content assertions for one table, optionally narrowed by
/// `eq`/`in_` conditions.
#[derive(Debug, Clone)]
pub struct TableMatcher {
    table: Table,
    conditions: Vec<Condition>,
}

impl TableMatcher {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            conditions: Vec::new(),
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.conditions.push(Condition::eq(column, value));
        self
    }

    /// `column IN (values)`. Null values make the matcher fail when run.
    pub fn in_<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.conditions.push(Condition::in_(column, values));
        self
    }

    /// Number of rows matching the conditions.
    pub fn row_count(&self) -> Result<u64> {
        self.table.count_where(&self.conditions)
    }

    pub fn check_matches(&self, expected: u64) -> Result<Option<Mismatch>> {
        let actual = self.row_count()?;
        if actual == expected {
            return Ok(None);
        }
        Ok(Some(Mismatch::new(format!(
            "Expected {} matching row(s) in table '{}', found {}",
            expected,
            self.table.name(),
            actual
        ))))
    }

    #[track_caller]
    pub fn assert_matches(&self, expected: u64) {
        self.fail_on(self.check_matches(expected));
    }

    #[track_caller]
    pub fn assert_one_match(&self) {
        self.assert_matches(1);
    }

    #[track_caller]
    pub fn assert_no_match(&self) {
        self.assert_matches(0);
    }

    /// Compare with a data set, pairing rows on `key_columns` (all columns
    /// when empty).
    pub fn check_matches_data_set(
        &self,
        expected: &TableDataSet,
        key_columns: &[&str],
    ) -> Result<Option<Mismatch>> {
        data_set::match_data_set(&self.table, &self.conditions, expected, key_columns)
    }

    /// Compare with a CSV file whose first row names the columns.
    pub fn check_matches_csv(
        &self,
        path: impl AsRef<Path>,
        key_columns: &[&str],
    ) -> Result<Option<Mismatch>> {
        let expected = self.table.csv_data_set().load(path)?;
        self.check_matches_data_set(&expected, key_columns)
    }

    #[track_caller]
    pub fn assert_matches_data_set(&self, expected: &TableDataSet, key_columns: &[&str]) {
        self.fail_on(self.check_matches_data_set(expected, key_columns));
    }

    #[track_caller]
    pub fn assert_matches_csv(&self, path: impl AsRef<Path>, key_columns: &[&str]) {
        self.fail_on(self.check_matches_csv(path, key_columns));
    }

    #[track_caller]
    fn fail_on(&self, outcome: Result<Option<Mismatch>>) {
        match outcome {
            Ok(None) => {}
            Ok(Some(mismatch)) => panic!("{}", mismatch),
            Err(e) => panic!("Error matching table '{}': {}", self.table.name(), e),
        }
    }
}
