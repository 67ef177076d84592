use std::sync::Arc;

use dbtester_db::DbValue;

use super::{append_where, execute_update, Binding, Condition, SqlBuilder};
use crate::channel::DatabaseChannel;
use crate::error::{Result, TesterError};
use crate::metadata::DbTableMetadata;

/// `UPDATE table SET ... [WHERE ...]`
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    channel: DatabaseChannel,
    table: Arc<DbTableMetadata>,
    assignments: Vec<(String, DbValue)>,
    conditions: Vec<Condition>,
}

impl UpdateBuilder {
    pub(crate) fn new(channel: DatabaseChannel, table: Arc<DbTableMetadata>) -> Self {
        Self {
            channel,
            table,
            assignments: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.conditions.push(Condition::eq(column, value));
        self
    }

    pub fn in_<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.conditions.push(Condition::in_(column, values));
        self
    }

    pub fn exec(&self) -> Result<u64> {
        if self.assignments.is_empty() {
            return Err(TesterError::invalid_argument(format!(
                "No columns to update in table '{}'",
                self.table.name()
            )));
        }

        let mut sql = SqlBuilder::new();
        sql.append("UPDATE ").append_table(self.table.name()).append(" SET ");
        for (i, (name, value)) in self.assignments.iter().enumerate() {
            let column = self.table.column(name)?;
            if i > 0 {
                sql.append(", ");
            }
            sql.append_identifier(column.name())
                .append(" = ")
                .append_binding(Binding::new(column.clone(), value.clone()));
        }
        append_where(&mut sql, &self.table, &self.conditions)?;

        let rendered = sql.render(self.channel.flavor()?);
        execute_update(&self.channel, &rendered, sql.bindings())
    }
}
