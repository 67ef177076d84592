//! Per-table operations used by fixtures and assertions.

use std::sync::Arc;

use dbtester_db::{DbRow, DbValue};

use crate::channel::DatabaseChannel;
use crate::csv_loader::CsvDataSetBuilder;
use crate::error::{Result, TesterError};
use crate::matcher::TableMatcher;
use crate::metadata::{DbColumnMetadata, DbTableMetadata};
use crate::name::TableFQName;
use crate::statement::{
    append_where, read_values, Condition, DeleteBuilder, InsertBuilder, SqlBuilder,
    UpdateBuilder,
};

/// A table of the test database.
#[derive(Debug, Clone)]
pub struct Table {
    channel: DatabaseChannel,
    metadata: Arc<DbTableMetadata>,
}

impl Table {
    pub fn new(channel: DatabaseChannel, metadata: Arc<DbTableMetadata>) -> Self {
        Self { channel, metadata }
    }

    pub fn name(&self) -> &TableFQName {
        self.metadata.name()
    }

    pub fn metadata(&self) -> &Arc<DbTableMetadata> {
        &self.metadata
    }

    pub fn columns(&self) -> &[DbColumnMetadata] {
        self.metadata.columns()
    }

    pub fn channel(&self) -> &DatabaseChannel {
        &self.channel
    }

    /// Insert one row with a value for every column, in table order.
    pub fn insert<I, V>(&self, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        InsertBuilder::new(
            self.channel.clone(),
            Arc::clone(&self.metadata),
            self.metadata.columns().to_vec(),
        )
        .values(values)
        .exec()
    }

    /// Start a multi-row insert into the named columns.
    pub fn insert_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<InsertBuilder> {
        let columns = self.metadata.columns_named(columns)?;
        Ok(InsertBuilder::new(
            self.channel.clone(),
            Arc::clone(&self.metadata),
            columns,
        ))
    }

    pub fn update(&self) -> UpdateBuilder {
        UpdateBuilder::new(self.channel.clone(), Arc::clone(&self.metadata))
    }

    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(self.channel.clone(), Arc::clone(&self.metadata))
    }

    pub fn delete_all(&self) -> Result<u64> {
        self.delete().exec()
    }

    pub fn row_count(&self) -> Result<u64> {
        self.count_where(&[])
    }

    /// All rows, all columns in table order. Row order is unspecified.
    pub fn select(&self) -> Result<Vec<Vec<DbValue>>> {
        self.select_where(self.metadata.columns(), &[], None)
    }

    pub fn select_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<Vec<DbValue>>> {
        let columns = self.metadata.columns_named(columns)?;
        self.select_where(&columns, &[], None)
    }

    /// The only row of the table, if any. More than one row is an error.
    pub fn select_one(&self) -> Result<Option<Vec<DbValue>>> {
        let mut rows = self.select_where(self.metadata.columns(), &[], Some(2))?;
        if rows.len() > 1 {
            return Err(TesterError::UnexpectedRowCount(format!(
                "expected at most one row in table '{}', found more",
                self.name()
            )));
        }
        Ok(rows.pop())
    }

    pub fn csv_data_set(&self) -> CsvDataSetBuilder {
        CsvDataSetBuilder::new(self.clone())
    }

    pub fn matcher(&self) -> TableMatcher {
        TableMatcher::new(self.clone())
    }

    pub(crate) fn count_where(&self, conditions: &[Condition]) -> Result<u64> {
        let mut sql = SqlBuilder::new();
        sql.append("SELECT COUNT(*) FROM ").append_table(self.name());
        append_where(&mut sql, &self.metadata, conditions)?;

        let rows = self
            .channel
            .select_statement(|row: &DbRow| -> Result<i64> { Ok(row.get(0)?) })
            .with_sql(sql)
            .select(Some(1))?;
        let count = rows.first().copied().unwrap_or(0);
        u64::try_from(count).map_err(|_| {
            TesterError::UnexpectedRowCount(format!("negative count {} for '{}'", count, self.name()))
        })
    }

    pub(crate) fn select_where(
        &self,
        columns: &[DbColumnMetadata],
        conditions: &[Condition],
        max_rows: Option<usize>,
    ) -> Result<Vec<Vec<DbValue>>> {
        let mut sql = SqlBuilder::new();
        sql.append("SELECT ");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                sql.append(", ");
            }
            sql.append_identifier(column.name());
        }
        sql.append(" FROM ").append_table(self.name());
        append_where(&mut sql, &self.metadata, conditions)?;

        self.channel
            .select_statement(read_values)
            .with_sql(sql)
            .select(max_rows)
    }
}
