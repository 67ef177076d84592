//! Parameterized statement composition and execution.
//!
//! Builders collect SQL fragments and [`Binding`]s; identifiers are quoted with
//! the database flavor when the statement runs. Every execution acquires one
//! connection, binds parameters in order, runs, commits mutating statements and
//! releases the connection.

mod binding;
mod condition;
mod delete;
mod insert;
mod update;

use std::marker::PhantomData;

use dbtester_db::{DbError, DbRow, DbValue};
use tracing::debug;

use crate::channel::DatabaseChannel;
use crate::error::{Result, TesterError};
use crate::flavor::DbFlavor;
use crate::name::TableFQName;

pub use binding::Binding;
pub use condition::Condition;
pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use update::UpdateBuilder;

pub(crate) use binding::bind_all;
pub(crate) use condition::append_where;

/// Converts a result row into a caller type.
pub trait RowReader<T> {
    fn read(&self, row: &DbRow) -> Result<T>;
}

impl<T, F> RowReader<T> for F
where
    F: Fn(&DbRow) -> Result<T>,
{
    fn read(&self, row: &DbRow) -> Result<T> {
        self(row)
    }
}

/// Row reader returning all values of a row.
pub fn read_values(row: &DbRow) -> Result<Vec<DbValue>> {
    Ok(row.values().to_vec())
}

#[derive(Debug, Clone)]
enum Fragment {
    Sql(String),
    Identifier(String),
    Table(TableFQName),
    Param,
}

/// SQL text with deferred identifier quoting and ordered bindings.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    fragments: Vec<Fragment>,
    bindings: Vec<Binding>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sql: &str) -> &mut Self {
        match self.fragments.last_mut() {
            Some(Fragment::Sql(text)) => text.push_str(sql),
            _ => self.fragments.push(Fragment::Sql(sql.to_string())),
        }
        self
    }

    pub fn append_identifier(&mut self, name: &str) -> &mut Self {
        self.fragments.push(Fragment::Identifier(name.to_string()));
        self
    }

    pub fn append_table(&mut self, name: &TableFQName) -> &mut Self {
        self.fragments.push(Fragment::Table(name.clone()));
        self
    }

    /// Append a `?` placeholder bound to `binding`.
    pub fn append_binding(&mut self, binding: Binding) -> &mut Self {
        self.fragments.push(Fragment::Param);
        self.bindings.push(binding);
        self
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn render(&self, flavor: &DbFlavor) -> String {
        let mut sql = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(text) => sql.push_str(text),
                Fragment::Identifier(name) => sql.push_str(&flavor.quote(name)),
                Fragment::Table(name) => sql.push_str(&flavor.quote_table(name)),
                Fragment::Param => sql.push('?'),
            }
        }
        sql
    }
}

/// Builder for a statement run with [`exec`](Self::exec).
#[derive(Debug, Clone)]
pub struct ExecStatementBuilder {
    channel: DatabaseChannel,
    sql: SqlBuilder,
}

impl ExecStatementBuilder {
    pub(crate) fn new(channel: DatabaseChannel) -> Self {
        Self {
            channel,
            sql: SqlBuilder::new(),
        }
    }

    pub fn append(mut self, sql: &str) -> Self {
        self.sql.append(sql);
        self
    }

    pub fn append_identifier(mut self, name: &str) -> Self {
        self.sql.append_identifier(name);
        self
    }

    pub fn append_table(mut self, name: &TableFQName) -> Self {
        self.sql.append_table(name);
        self
    }

    pub fn append_binding(mut self, binding: Binding) -> Self {
        self.sql.append_binding(binding);
        self
    }

    /// Append a placeholder for a value of unknown column type.
    pub fn append_value(self, value: impl Into<DbValue>) -> Self {
        self.append_binding(Binding::untyped(value))
    }

    /// The SQL as it will be sent to the database.
    pub fn sql(&self) -> Result<String> {
        Ok(self.sql.render(self.channel.flavor()?))
    }

    /// Execute and commit, returning the affected row count.
    pub fn exec(&self) -> Result<u64> {
        let sql = self.sql()?;
        execute_update(&self.channel, &sql, self.sql.bindings())
    }
}

/// Builder for a query run with [`select`](Self::select).
pub struct SelectStatementBuilder<T, R> {
    channel: DatabaseChannel,
    sql: SqlBuilder,
    reader: R,
    _row: PhantomData<fn() -> T>,
}

impl<T, R: RowReader<T>> SelectStatementBuilder<T, R> {
    pub(crate) fn new(channel: DatabaseChannel, reader: R) -> Self {
        Self {
            channel,
            sql: SqlBuilder::new(),
            reader,
            _row: PhantomData,
        }
    }

    pub(crate) fn with_sql(mut self, sql: SqlBuilder) -> Self {
        self.sql = sql;
        self
    }

    pub fn append(mut self, sql: &str) -> Self {
        self.sql.append(sql);
        self
    }

    pub fn append_identifier(mut self, name: &str) -> Self {
        self.sql.append_identifier(name);
        self
    }

    pub fn append_table(mut self, name: &TableFQName) -> Self {
        self.sql.append_table(name);
        self
    }

    pub fn append_binding(mut self, binding: Binding) -> Self {
        self.sql.append_binding(binding);
        self
    }

    pub fn append_value(self, value: impl Into<DbValue>) -> Self {
        self.append_binding(Binding::untyped(value))
    }

    pub fn sql(&self) -> Result<String> {
        Ok(self.sql.render(self.channel.flavor()?))
    }

    /// Run the query, reading at most `max_rows` rows when given.
    pub fn select(&self, max_rows: Option<usize>) -> Result<Vec<T>> {
        let sql = self.sql()?;
        let rows = execute_query(&self.channel, &sql, self.sql.bindings(), max_rows)?;
        rows.iter().map(|row| self.reader.read(row)).collect()
    }
}

pub(crate) fn execute_update(
    channel: &DatabaseChannel,
    sql: &str,
    bindings: &[Binding],
) -> Result<u64> {
    debug!(sql, bindings = bindings.len(), "Executing update");
    let wrap = |source: DbError| TesterError::sql(sql, source);

    let mut conn = channel.data_source().connection().map_err(wrap)?;
    let count = {
        let mut stmt = conn.prepare(sql).map_err(wrap)?;
        bind_all(stmt.as_mut(), bindings).map_err(wrap)?;
        stmt.execute_update().map_err(wrap)?
    };
    conn.commit().map_err(wrap)?;
    Ok(count)
}

/// Run one statement for each binding row, batched when the driver allows.
pub(crate) fn execute_update_rows(
    channel: &DatabaseChannel,
    sql: &str,
    rows: &[Vec<Binding>],
    use_batch: bool,
) -> Result<u64> {
    debug!(sql, rows = rows.len(), use_batch, "Executing update for each row");
    let wrap = |source: DbError| TesterError::sql(sql, source);

    let mut conn = channel.data_source().connection().map_err(wrap)?;
    let count = {
        let mut stmt = conn.prepare(sql).map_err(wrap)?;
        if use_batch {
            for row in rows {
                bind_all(stmt.as_mut(), row).map_err(wrap)?;
                stmt.add_batch().map_err(wrap)?;
            }
            stmt.execute_batch().map_err(wrap)?.iter().sum()
        } else {
            let mut count = 0;
            for row in rows {
                bind_all(stmt.as_mut(), row).map_err(wrap)?;
                count += stmt.execute_update().map_err(wrap)?;
            }
            count
        }
    };
    conn.commit().map_err(wrap)?;
    Ok(count)
}

pub(crate) fn execute_query(
    channel: &DatabaseChannel,
    sql: &str,
    bindings: &[Binding],
    max_rows: Option<usize>,
) -> Result<Vec<DbRow>> {
    debug!(sql, bindings = bindings.len(), "Executing query");
    let wrap = |source: DbError| TesterError::sql(sql, source);

    let mut conn = channel.data_source().connection().map_err(wrap)?;
    let mut stmt = conn.prepare(sql).map_err(wrap)?;
    bind_all(stmt.as_mut(), bindings).map_err(wrap)?;
    stmt.execute_query(max_rows).map_err(wrap)
}
