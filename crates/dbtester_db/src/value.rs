//! Values exchanged with the database: statement parameters and row cells.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{DbError, Result};

/// Value type for query parameters and result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Decimal(Decimal),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Short name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            DbValue::Null => "null",
            DbValue::Boolean(_) => "boolean",
            DbValue::Integer(_) => "integer",
            DbValue::Real(_) => "real",
            DbValue::Decimal(_) => "decimal",
            DbValue::Text(_) => "text",
            DbValue::Blob(_) => "blob",
            DbValue::Date(_) => "date",
            DbValue::Time(_) => "time",
            DbValue::Timestamp(_) => "timestamp",
            DbValue::TimestampTz(_) => "timestamptz",
        }
    }

    /// Exact decimal view of a numeric value.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            DbValue::Integer(v) => Some(Decimal::from(*v)),
            DbValue::Decimal(v) => Some(*v),
            DbValue::Real(v) => Decimal::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Compare two values the way a test assertion would.
    ///
    /// Numbers compare by value across integer/decimal/real representations.
    /// Timestamps compare by instant, reading zone-less ones as UTC. Everything
    /// else compares structurally.
    pub fn same_value(&self, other: &DbValue) -> bool {
        match (self, other) {
            (DbValue::Integer(_) | DbValue::Decimal(_), DbValue::Integer(_) | DbValue::Decimal(_)) => {
                self.as_decimal() == other.as_decimal()
            }
            (DbValue::Real(a), DbValue::Real(b)) => a == b,
            (DbValue::Real(_), DbValue::Integer(_) | DbValue::Decimal(_))
            | (DbValue::Integer(_) | DbValue::Decimal(_), DbValue::Real(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (DbValue::TimestampTz(a), DbValue::TimestampTz(b)) => a == b,
            // a zone-less timestamp is taken as UTC
            (DbValue::Timestamp(naive), DbValue::TimestampTz(zoned))
            | (DbValue::TimestampTz(zoned), DbValue::Timestamp(naive)) => {
                *naive == zoned.naive_utc()
            }
            _ => self == other,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            DbValue::Integer(v) => Some(*v as f64),
            DbValue::Real(v) => Some(*v),
            DbValue::Decimal(v) => v.to_f64(),
            _ => None,
        }
    }
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbValue::Null => write!(f, "null"),
            DbValue::Boolean(v) => write!(f, "{}", v),
            DbValue::Integer(v) => write!(f, "{}", v),
            DbValue::Real(v) => write!(f, "{}", v),
            DbValue::Decimal(v) => write!(f, "{}", v),
            DbValue::Text(v) => write!(f, "{}", v),
            DbValue::Blob(v) => {
                write!(f, "[")?;
                for (i, b) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{:#04x}", b)?;
                }
                write!(f, "]")
            }
            DbValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            DbValue::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            DbValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            DbValue::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Integer(v as i64)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<Decimal> for DbValue {
    fn from(v: Decimal) -> Self {
        DbValue::Decimal(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        DbValue::Blob(v)
    }
}

impl From<&[u8]> for DbValue {
    fn from(v: &[u8]) -> Self {
        DbValue::Blob(v.to_vec())
    }
}

impl From<NaiveDate> for DbValue {
    fn from(v: NaiveDate) -> Self {
        DbValue::Date(v)
    }
}

impl From<NaiveTime> for DbValue {
    fn from(v: NaiveTime) -> Self {
        DbValue::Time(v)
    }
}

impl From<NaiveDateTime> for DbValue {
    fn from(v: NaiveDateTime) -> Self {
        DbValue::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for DbValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        DbValue::TimestampTz(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    /// Create a new row with column names and values.
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T> {
        self.values
            .get(index)
            .ok_or_else(|| DbError::conversion(format!("Column index {} out of bounds", index)))
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name (case-insensitive).
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| DbError::conversion(format!("Column '{}' not found", name)))?;
        self.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Get the raw DbValue at an index.
    pub fn get_raw(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[DbValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<DbValue> {
        self.values
    }
}

/// Trait for converting from DbValue.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self>;
}

fn null_error(target: &str) -> DbError {
    DbError::conversion(format!(
        "{} field is NULL - use Option<{}> for nullable columns",
        target, target
    ))
}

fn mismatch(target: &str, value: &DbValue) -> DbError {
    DbError::conversion(format!("Expected {}, got {}", target, value.kind()))
}

impl FromDbValue for DbValue {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Decimal(v) if v.fract().is_zero() => v
                .to_i64()
                .ok_or_else(|| DbError::conversion(format!("{} does not fit in i64", v))),
            DbValue::Null => Err(null_error("i64")),
            other => Err(mismatch("integer", other)),
        }
    }
}

impl FromDbValue for i32 {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        let wide = i64::from_db_value(value).map_err(|e| match value {
            DbValue::Null => null_error("i32"),
            _ => e,
        })?;
        i32::try_from(wide).map_err(|_| DbError::conversion(format!("{} does not fit in i32", wide)))
    }
}

impl FromDbValue for f64 {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Real(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v as f64),
            DbValue::Decimal(v) => v
                .to_f64()
                .ok_or_else(|| DbError::conversion(format!("{} does not fit in f64", v))),
            DbValue::Null => Err(null_error("f64")),
            other => Err(mismatch("real", other)),
        }
    }
}

impl FromDbValue for Decimal {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Null => Err(null_error("Decimal")),
            other => other.as_decimal().ok_or_else(|| mismatch("decimal", other)),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(null_error("String")),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Boolean(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v != 0),
            DbValue::Null => Err(null_error("bool")),
            other => Err(mismatch("boolean", other)),
        }
    }
}

impl FromDbValue for Vec<u8> {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Blob(v) => Ok(v.clone()),
            DbValue::Null => Err(null_error("Vec<u8>")),
            other => Err(mismatch("blob", other)),
        }
    }
}

impl FromDbValue for NaiveDate {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Date(v) => Ok(*v),
            DbValue::Timestamp(v) => Ok(v.date()),
            DbValue::Null => Err(null_error("NaiveDate")),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromDbValue for NaiveTime {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Time(v) => Ok(*v),
            DbValue::Null => Err(null_error("NaiveTime")),
            other => Err(mismatch("time", other)),
        }
    }
}

impl FromDbValue for NaiveDateTime {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Timestamp(v) => Ok(*v),
            DbValue::TimestampTz(v) => Ok(v.naive_utc()),
            DbValue::Null => Err(null_error("NaiveDateTime")),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}
