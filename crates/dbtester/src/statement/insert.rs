use std::sync::Arc;

use dbtester_db::DbValue;
use tracing::debug;

use super::{execute_update_rows, Binding, SqlBuilder};
use crate::channel::DatabaseChannel;
use crate::error::{Result, TesterError};
use crate::metadata::{DbColumnMetadata, DbTableMetadata};

/// Multi-row insert into a fixed column list.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    channel: DatabaseChannel,
    table: Arc<DbTableMetadata>,
    columns: Vec<DbColumnMetadata>,
    rows: Vec<Vec<DbValue>>,
}

impl InsertBuilder {
    pub(crate) fn new(
        channel: DatabaseChannel,
        table: Arc<DbTableMetadata>,
        columns: Vec<DbColumnMetadata>,
    ) -> Self {
        Self {
            channel,
            table,
            columns,
            rows: Vec::new(),
        }
    }

    /// Queue one row; values follow the column list order.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn columns(&self) -> &[DbColumnMetadata] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert all queued rows in order. No rows means no database access.
    pub fn exec(&self) -> Result<u64> {
        if self.rows.is_empty() {
            return Ok(0);
        }

        let mut bindings = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(TesterError::invalid_argument(format!(
                    "Row #{} for table '{}' has {} values, expected {}",
                    i + 1,
                    self.table.name(),
                    row.len(),
                    self.columns.len()
                )));
            }
            bindings.push(
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| Binding::new(column.clone(), value.clone()))
                    .collect::<Vec<_>>(),
            );
        }

        let flavor = self.channel.flavor()?;
        let mut sql = SqlBuilder::new();
        sql.append("INSERT INTO ")
            .append_table(self.table.name())
            .append(" (");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.append(", ");
            }
            sql.append_identifier(column.name());
        }
        sql.append(") VALUES (");
        for i in 0..self.columns.len() {
            sql.append(if i == 0 { "?" } else { ", ?" });
        }
        sql.append(")");

        let sql = sql.render(flavor);
        debug!(table = %self.table.name(), rows = self.rows.len(), "Inserting rows");
        execute_update_rows(
            &self.channel,
            &sql,
            &bindings,
            flavor.supports_batch_updates() && self.rows.len() > 1,
        )
    }
}
