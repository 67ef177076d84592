//! `WHERE` clause conditions.

use dbtester_db::DbValue;

use super::{Binding, SqlBuilder};
use crate::error::{Result, TesterError};
use crate::metadata::DbTableMetadata;

/// A column condition; several are joined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`, or `column IS NULL` for a null value.
    Eq { column: String, value: DbValue },
    /// `column IN (values...)`. Nulls are not allowed.
    In { column: String, values: Vec<DbValue> },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<DbValue>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn in_<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn append_to(&self, sql: &mut SqlBuilder, table: &DbTableMetadata) -> Result<()> {
        match self {
            Self::Eq { column, value } => {
                let column = table.column(column)?;
                sql.append_identifier(column.name());
                if value.is_null() {
                    sql.append(" IS NULL");
                } else {
                    sql.append(" = ")
                        .append_binding(Binding::new(column.clone(), value.clone()));
                }
            }
            Self::In { column, values } => {
                let column = table.column(column)?;
                if values.is_empty() {
                    return Err(TesterError::invalid_argument(format!(
                        "Empty IN condition for column '{}'",
                        column.name()
                    )));
                }
                if values.iter().any(DbValue::is_null) {
                    return Err(TesterError::invalid_argument(format!(
                        "Null values are not supported in IN condition for column '{}'",
                        column.name()
                    )));
                }
                sql.append_identifier(column.name()).append(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        sql.append(", ");
                    }
                    sql.append_binding(Binding::new(column.clone(), value.clone()));
                }
                sql.append(")");
            }
        }
        Ok(())
    }
}

/// Append ` WHERE c1 AND c2 ...`, or nothing for no conditions.
pub(crate) fn append_where(
    sql: &mut SqlBuilder,
    table: &DbTableMetadata,
    conditions: &[Condition],
) -> Result<()> {
    for (i, condition) in conditions.iter().enumerate() {
        sql.append(if i == 0 { " WHERE " } else { " AND " });
        condition.append_to(sql, table)?;
    }
    Ok(())
}
