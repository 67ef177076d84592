use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use dbtester_db::DbValue;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{Result, TesterError};
use crate::metadata::DbColumnMetadata;

/// Key column values of one row, usable as a map key.
///
/// Integral decimals are stored as integers and other decimals in normalized
/// form, so `1`, `1.0` and `1.00` are the same key. Zoned timestamps are
/// stored as their UTC wall-clock time, matching zone-less UTC values.
#[derive(Debug, Clone)]
pub struct RowKey {
    values: Vec<DbValue>,
}

impl RowKey {
    pub fn new(values: Vec<DbValue>) -> Self {
        Self {
            values: values.into_iter().map(normalize).collect(),
        }
    }

    pub fn values(&self) -> &[DbValue] {
        &self.values
    }
}

fn normalize(value: DbValue) -> DbValue {
    match value {
        DbValue::Decimal(d) if d.fract().is_zero() => match d.to_i64() {
            Some(i) => DbValue::Integer(i),
            None => DbValue::Decimal(d.normalize()),
        },
        DbValue::Decimal(d) => DbValue::Decimal(d.normalize()),
        DbValue::TimestampTz(t) => DbValue::Timestamp(t.naive_utc()),
        other => other,
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| match (a, b) {
                    (DbValue::Real(x), DbValue::Real(y)) => x.to_bits() == y.to_bits(),
                    _ => a == b,
                })
    }
}

impl Eq for RowKey {}

impl Hash for RowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.len().hash(state);
        for value in &self.values {
            mem::discriminant(value).hash(state);
            match value {
                DbValue::Null => {}
                DbValue::Boolean(v) => v.hash(state),
                DbValue::Integer(v) => v.hash(state),
                DbValue::Real(v) => v.to_bits().hash(state),
                DbValue::Decimal(v) => v.to_string().hash(state),
                DbValue::Text(v) => v.hash(state),
                DbValue::Blob(v) => v.hash(state),
                DbValue::Date(v) => v.hash(state),
                DbValue::Time(v) => v.hash(state),
                DbValue::Timestamp(v) => v.hash(state),
                DbValue::TimestampTz(v) => v.naive_utc().hash(state),
            }
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

/// Extracts [`RowKey`]s from rows laid out like `header`.
#[derive(Debug, Clone)]
pub struct RowKeyFactory {
    columns: Vec<String>,
    indexes: Vec<usize>,
}

impl RowKeyFactory {
    /// Fails if no key columns are given or one is missing from the header.
    pub fn new<S: AsRef<str>>(header: &[DbColumnMetadata], key_columns: &[S]) -> Result<Self> {
        if key_columns.is_empty() {
            return Err(TesterError::invalid_argument("No key columns specified"));
        }

        let mut columns = Vec::with_capacity(key_columns.len());
        let mut indexes = Vec::with_capacity(key_columns.len());
        for key in key_columns {
            let key = key.as_ref();
            let index = header
                .iter()
                .position(|c| c.name() == key)
                .or_else(|| header.iter().position(|c| c.name().eq_ignore_ascii_case(key)))
                .ok_or_else(|| {
                    TesterError::invalid_argument(format!(
                        "Key column '{}' is not in the header",
                        key
                    ))
                })?;
            columns.push(header[index].name().to_string());
            indexes.push(index);
        }
        Ok(Self { columns, indexes })
    }

    pub fn key_columns(&self) -> &[String] {
        &self.columns
    }

    /// Values at the key column positions, in key column order.
    pub fn create_key(&self, row: &[DbValue]) -> RowKey {
        RowKey::new(
            self.indexes
                .iter()
                .map(|i| row.get(*i).cloned().unwrap_or(DbValue::Null))
                .collect(),
        )
    }
}
