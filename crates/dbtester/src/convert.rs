//! Text to value conversion for CSV fixtures.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use dbtester_db::{DbValue, Decimal, SqlType};

use crate::error::{Result, TesterError};
use crate::metadata::DbColumnMetadata;

/// The literal that always converts to null.
pub const NULL_TOKEN: &str = "NULL";

/// Custom conversion for one SQL type.
pub type ConvertFn = Arc<dyn Fn(&str) -> std::result::Result<DbValue, String> + Send + Sync>;

/// Converts CSV fields to values according to the target column's type.
///
/// `NULL` is always null. An empty field is `""` for character columns and
/// null for everything else. Other fields go through a per-type parser, which
/// callers may replace with [`with_converter`](Self::with_converter).
#[derive(Clone, Default)]
pub struct ValueConverter {
    overrides: HashMap<SqlType, ConvertFn>,
}

impl ValueConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter<F>(mut self, sql_type: SqlType, convert: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<DbValue, String> + Send + Sync + 'static,
    {
        self.overrides.insert(sql_type, Arc::new(convert));
        self
    }

    pub fn convert(&self, column: &DbColumnMetadata, raw: &str) -> Result<DbValue> {
        let sql_type = column.sql_type();
        if raw == NULL_TOKEN {
            return Ok(DbValue::Null);
        }
        if raw.is_empty() {
            return Ok(if sql_type.is_character() {
                DbValue::Text(String::new())
            } else {
                DbValue::Null
            });
        }

        let converted = match self.overrides.get(&sql_type) {
            Some(convert) => convert(raw),
            None => parse(sql_type, raw),
        };
        converted.map_err(|message| TesterError::Conversion {
            column: column.name().to_string(),
            value: raw.to_string(),
            message,
        })
    }
}

impl fmt::Debug for ValueConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConverter")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn parse(sql_type: SqlType, raw: &str) -> std::result::Result<DbValue, String> {
    let text = raw.trim();
    match sql_type {
        SqlType::Bit | SqlType::Boolean => parse_bool(text).map(DbValue::Boolean),
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => text
            .parse::<i64>()
            .map(DbValue::Integer)
            .map_err(|e| e.to_string()),
        SqlType::Float | SqlType::Real | SqlType::Double => text
            .parse::<f64>()
            .map(DbValue::Real)
            .map_err(|e| e.to_string()),
        SqlType::Numeric | SqlType::Decimal => Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map(DbValue::Decimal)
            .map_err(|e| e.to_string()),
        SqlType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(DbValue::Date)
            .map_err(|e| e.to_string()),
        SqlType::Time => parse_time(text).map(DbValue::Time),
        SqlType::Timestamp => parse_timestamp(text).map(DbValue::Timestamp),
        SqlType::TimestampWithTimezone => DateTime::parse_from_rfc3339(text)
            .map(DbValue::TimestampTz)
            .or_else(|_| {
                parse_timestamp(text).map(|ts| DbValue::TimestampTz(ts.and_utc().fixed_offset()))
            }),
        t if t.is_binary() => STANDARD
            .decode(text)
            .map(DbValue::Blob)
            .map_err(|e| format!("invalid base64: {}", e)),
        _ => Ok(DbValue::Text(raw.to_string())),
    }
}

fn parse_bool(text: &str) -> std::result::Result<bool, String> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    }
}

fn parse_time(text: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|e| e.to_string())
}

fn parse_timestamp(text: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .map_err(|e| e.to_string())
}
