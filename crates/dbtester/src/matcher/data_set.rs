use std::collections::HashMap;

use dbtester_db::DbValue;
use tracing::debug;

use super::row_key::{RowKey, RowKeyFactory};
use super::Mismatch;
use crate::dataset::TableDataSet;
use crate::error::Result;
use crate::metadata::DbColumnMetadata;
use crate::statement::Condition;
use crate::table::Table;

/// Compare live rows of `table` with `expected`, pairing rows by key.
///
/// Only rows matching `conditions` are considered. Empty `key_columns` keys on
/// every column of the data set.
pub(crate) fn match_data_set(
    table: &Table,
    conditions: &[Condition],
    expected: &TableDataSet,
    key_columns: &[&str],
) -> Result<Option<Mismatch>> {
    let header = expected.header();
    let all_columns = expected.header_names();
    let keys = if key_columns.is_empty() {
        all_columns.as_slice()
    } else {
        key_columns
    };
    let factory = RowKeyFactory::new(header, keys)?;

    let actual = table.select_where(header, conditions, None)?;
    debug!(
        table = %table.name(),
        expected = expected.len(),
        actual = actual.len(),
        keys = ?factory.key_columns(),
        "Matching table against data set"
    );

    if expected.is_empty() {
        if actual.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Mismatch::new(format!(
            "Expected no rows in table '{}', found {}",
            table.name(),
            actual.len()
        ))));
    }

    if actual.len() != expected.len() {
        return Ok(Some(Mismatch::new(format!(
            "Row count mismatch in table '{}': expected {}, found {}",
            table.name(),
            expected.len(),
            actual.len()
        ))));
    }

    // each live row pairs with at most one reference row
    let mut by_key: HashMap<RowKey, Vec<&Vec<DbValue>>> = HashMap::new();
    for row in &actual {
        by_key.entry(factory.create_key(row)).or_default().push(row);
    }

    for expected_row in expected.records() {
        let key = factory.create_key(expected_row);
        let candidates = match by_key.get_mut(&key) {
            Some(candidates) if !candidates.is_empty() => candidates,
            Some(_) => {
                return Ok(Some(
                    Mismatch::new(format!(
                        "Key {} {:?} occurs more often in the expected data than in table '{}'",
                        key,
                        factory.key_columns(),
                        table.name()
                    ))
                    .with_key(key.to_string()),
                ));
            }
            None => {
                return Ok(Some(
                    Mismatch::new(format!(
                        "No row with key {} {:?} in table '{}'",
                        key,
                        factory.key_columns(),
                        table.name()
                    ))
                    .with_key(key.to_string()),
                ));
            }
        };

        let matching = candidates.iter().position(|row| {
            header
                .iter()
                .zip(expected_row)
                .zip(row.iter())
                .all(|((column, want), got)| values_match(column, want, got))
        });
        if let Some(index) = matching {
            candidates.swap_remove(index);
            continue;
        }

        for ((column, want), got) in header.iter().zip(expected_row).zip(candidates[0].iter()) {
            if !values_match(column, want, got) {
                return Ok(Some(
                    Mismatch::new(format!(
                        "Column '{}' of row {} in table '{}': expected {}, found {}",
                        column.name(),
                        key,
                        table.name(),
                        want,
                        got
                    ))
                    .with_column(column.name())
                    .with_key(key.to_string()),
                ));
            }
        }
    }
    Ok(None)
}

fn values_match(column: &DbColumnMetadata, expected: &DbValue, actual: &DbValue) -> bool {
    match (expected, actual) {
        (DbValue::Null, _) => actual.is_null(),
        (_, DbValue::Null) => false,
        (DbValue::Blob(a), DbValue::Blob(b)) => a == b,
        _ if column.sql_type().is_binary() => false,
        (DbValue::Text(_), DbValue::Text(_)) => expected == actual,
        // a pass-through text fixture against a typed value
        (DbValue::Text(text), other) | (other, DbValue::Text(text)) => {
            expected.same_value(actual) || *text == other.to_string()
        }
        _ => expected.same_value(actual),
    }
}
