//! Typed parameter bindings.

use std::borrow::Cow;
use std::str::FromStr;

use dbtester_db::{Decimal, DbValue, SqlType, Statement};
use tracing::debug;

use crate::metadata::DbColumnMetadata;

/// A value queued for a `?` placeholder, with the column it targets if known.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    column: Option<DbColumnMetadata>,
    value: DbValue,
}

impl Binding {
    pub fn new(column: DbColumnMetadata, value: impl Into<DbValue>) -> Self {
        Self {
            column: Some(column),
            value: value.into(),
        }
    }

    /// A binding whose type is left to the driver.
    pub fn untyped(value: impl Into<DbValue>) -> Self {
        Self {
            column: None,
            value: value.into(),
        }
    }

    pub fn column(&self) -> Option<&DbColumnMetadata> {
        self.column.as_ref()
    }

    pub fn value(&self) -> &DbValue {
        &self.value
    }

    pub fn sql_type(&self) -> SqlType {
        self.column
            .as_ref()
            .map(|c| c.sql_type())
            .unwrap_or(SqlType::Other)
    }
}

/// Bind values to placeholders `1..=bindings.len()` in order.
pub(crate) fn bind_all(stmt: &mut dyn Statement, bindings: &[Binding]) -> dbtester_db::Result<()> {
    for (i, binding) in bindings.iter().enumerate() {
        bind(stmt, i + 1, binding)?;
    }
    Ok(())
}

fn bind(stmt: &mut dyn Statement, position: usize, binding: &Binding) -> dbtester_db::Result<()> {
    let sql_type = binding.sql_type();

    if binding.value.is_null() {
        let sql_type = match sql_type {
            SqlType::Other => match stmt.parameter_type(position) {
                Ok(t) => t,
                Err(e) => {
                    debug!(position, error = %e, "Parameter type lookup failed; binding untyped null");
                    SqlType::Other
                }
            },
            known => known,
        };
        return stmt.bind(position, &DbValue::Null, sql_type);
    }

    let value = coerce(&binding.value, sql_type);
    stmt.bind(position, &value, sql_type)
}

/// Adjust a value to the target column type where drivers are picky.
///
/// Decimal columns get exact decimals. Temporal columns get values in the
/// column's own representation, converting zoned timestamps through UTC.
pub(crate) fn coerce(value: &DbValue, sql_type: SqlType) -> Cow<'_, DbValue> {
    let converted = match (sql_type, value) {
        (SqlType::Decimal | SqlType::Numeric, DbValue::Integer(v)) => {
            Some(DbValue::Decimal(Decimal::from(*v)))
        }
        (SqlType::Decimal | SqlType::Numeric, DbValue::Real(v)) => {
            Decimal::try_from(*v).ok().map(DbValue::Decimal)
        }
        (SqlType::Decimal | SqlType::Numeric, DbValue::Text(v)) => {
            Decimal::from_str(v.trim()).ok().map(DbValue::Decimal)
        }
        (SqlType::Timestamp, DbValue::TimestampTz(v)) => Some(DbValue::Timestamp(v.naive_utc())),
        (SqlType::Timestamp, DbValue::Date(v)) => v.and_hms_opt(0, 0, 0).map(DbValue::Timestamp),
        (SqlType::TimestampWithTimezone, DbValue::Timestamp(v)) => {
            Some(DbValue::TimestampTz(v.and_utc().fixed_offset()))
        }
        (SqlType::Time, DbValue::Timestamp(v)) => Some(DbValue::Time(v.time())),
        _ => None,
    };
    match converted {
        Some(v) => Cow::Owned(v),
        None => Cow::Borrowed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use dbtester_db::DbRow;

    #[derive(Default)]
    struct RecordingStatement {
        reported_type: Option<SqlType>,
        bound: Vec<(usize, DbValue, SqlType)>,
    }

    impl Statement for RecordingStatement {
        fn parameter_type(&mut self, _index: usize) -> dbtester_db::Result<SqlType> {
            self.reported_type
                .ok_or_else(|| dbtester_db::DbError::Metadata("no parameter metadata".into()))
        }
        fn bind(&mut self, index: usize, value: &DbValue, sql_type: SqlType) -> dbtester_db::Result<()> {
            self.bound.push((index, value.clone(), sql_type));
            Ok(())
        }
        fn execute_update(&mut self) -> dbtester_db::Result<u64> {
            Ok(0)
        }
        fn execute_query(&mut self, _max_rows: Option<usize>) -> dbtester_db::Result<Vec<DbRow>> {
            Ok(Vec::new())
        }
        fn add_batch(&mut self) -> dbtester_db::Result<()> {
            Ok(())
        }
        fn execute_batch(&mut self) -> dbtester_db::Result<Vec<u64>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_untyped_null_uses_parameter_metadata() {
        let mut stmt = RecordingStatement {
            reported_type: Some(SqlType::Date),
            ..Default::default()
        };
        bind_all(&mut stmt, &[Binding::untyped(DbValue::Null)]).unwrap();
        assert_eq!(stmt.bound, vec![(1, DbValue::Null, SqlType::Date)]);

        let mut stmt = RecordingStatement::default();
        bind_all(&mut stmt, &[Binding::untyped(DbValue::Null)]).unwrap();
        assert_eq!(stmt.bound, vec![(1, DbValue::Null, SqlType::Other)]);
    }

    #[test]
    fn test_typed_null_skips_lookup() {
        let column = DbColumnMetadata::new("c", SqlType::VarChar, false, true);
        let mut stmt = RecordingStatement {
            reported_type: Some(SqlType::Date),
            ..Default::default()
        };
        bind_all(&mut stmt, &[Binding::new(column, DbValue::Null)]).unwrap();
        assert_eq!(stmt.bound, vec![(1, DbValue::Null, SqlType::VarChar)]);
    }

    #[test]
    fn test_decimal_coercion() {
        assert_eq!(
            coerce(&DbValue::Integer(5), SqlType::Decimal).into_owned(),
            DbValue::Decimal(Decimal::from(5))
        );
        assert_eq!(
            coerce(&DbValue::Text("12.50".into()), SqlType::Numeric).into_owned(),
            DbValue::Decimal(Decimal::from_str("12.50").unwrap())
        );
        // not a number: left for the driver to reject
        assert_eq!(
            coerce(&DbValue::Text("abc".into()), SqlType::Decimal).into_owned(),
            DbValue::Text("abc".into())
        );
    }

    #[test]
    fn test_temporal_coercion() {
        let zoned = chrono::FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .unwrap();
        assert_eq!(
            coerce(&DbValue::TimestampTz(zoned), SqlType::Timestamp).into_owned(),
            DbValue::Timestamp(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap())
        );

        let naive = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(
            coerce(&DbValue::Timestamp(naive), SqlType::TimestampWithTimezone).into_owned(),
            DbValue::TimestampTz(Utc.from_utc_datetime(&naive).fixed_offset())
        );
        assert_eq!(
            coerce(&DbValue::Timestamp(naive), SqlType::Time).into_owned(),
            DbValue::Time(naive.time())
        );
    }
}
