use std::sync::Arc;

use dbtester_db::DbValue;

use super::{append_where, execute_update, Condition, SqlBuilder};
use crate::channel::DatabaseChannel;
use crate::error::Result;
use crate::metadata::DbTableMetadata;

/// `DELETE FROM table [WHERE ...]`
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    channel: DatabaseChannel,
    table: Arc<DbTableMetadata>,
    conditions: Vec<Condition>,
}

impl DeleteBuilder {
    pub(crate) fn new(channel: DatabaseChannel, table: Arc<DbTableMetadata>) -> Self {
        Self {
            channel,
            table,
            conditions: Vec::new(),
        }
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

    /// Delete matching rows; no conditions deletes everything.
    pub fn exec(&self) -> Result<u64> {
        let mut sql = SqlBuilder::new();
        sql.append("DELETE FROM ").append_table(self.table.name());
        append_where(&mut sql, &self.table, &self.conditions)?;

        let rendered = sql.render(self.channel.flavor()?);
        execute_update(&self.channel, &rendered, sql.bindings())
    }
}
