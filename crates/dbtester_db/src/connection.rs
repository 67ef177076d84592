//! Collaborator traits: connection sources, prepared statements and driver metadata.
//!
//! The toolkit never creates or tunes pools. It consumes a [`DataSource`] that
//! hands out connections, and reads table shape through [`DatabaseMetadata`].

use crate::error::Result;
use crate::types::SqlType;
use crate::value::{DbRow, DbValue};

/// A source of database connections, typically backed by a pool.
pub trait DataSource: Send + Sync {
    /// Acquire a connection. Dropping the connection releases it.
    fn connection(&self) -> Result<Box<dyn Connection + '_>>;

    /// Shut the underlying database down.
    ///
    /// Embedded engines may report success through an error whose
    /// [`DbError::is_expected_shutdown`](crate::DbError::is_expected_shutdown)
    /// is true; callers are expected to treat that as success.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A single live connection.
pub trait Connection {
    /// Prepare a statement with `?` positional placeholders.
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn Statement + 'c>>;

    /// Commit work performed on this connection.
    fn commit(&mut self) -> Result<()>;

    /// Driver metadata for the database behind this connection.
    fn metadata<'c>(&'c mut self) -> Result<Box<dyn DatabaseMetadata + 'c>>;

    /// Run one or more statements without parameters or results.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;
}

/// A prepared statement. Parameter indexes are 1-based.
pub trait Statement {
    /// Expected type of a parameter, as reported by the driver.
    ///
    /// Used to bind untyped nulls on drivers that insist on a parameter type.
    fn parameter_type(&mut self, index: usize) -> Result<SqlType>;

    /// Bind a value to a parameter. `sql_type` is the best known type of the
    /// target and may be [`SqlType::Other`].
    fn bind(&mut self, index: usize, value: &DbValue, sql_type: SqlType) -> Result<()>;

    /// Execute a mutating statement, returning the affected row count.
    fn execute_update(&mut self) -> Result<u64>;

    /// Execute a query, reading at most `max_rows` rows when given.
    fn execute_query(&mut self, max_rows: Option<usize>) -> Result<Vec<DbRow>>;

    /// Queue the current bindings as one batch entry and clear them.
    fn add_batch(&mut self) -> Result<()>;

    /// Execute all queued batch entries, returning per-entry row counts.
    fn execute_batch(&mut self) -> Result<Vec<u64>>;
}

/// Column description as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: SqlType,
    /// Native type name, e.g. `timestamptz`.
    pub type_name: String,
    pub nullable: bool,
}

/// Table location as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

/// Database introspection.
///
/// Filters follow the usual driver convention: `None` means "do not filter on
/// this component".
pub trait DatabaseMetadata {
    /// Product name, e.g. `PostgreSQL`. `None` if the driver does not say.
    fn product_name(&self) -> Result<Option<String>>;

    /// Identifier quote string. A single space means quoting is unsupported.
    fn identifier_quote(&self) -> Result<String>;

    fn supports_catalogs_in_table_definitions(&self) -> Result<bool>;

    fn supports_schemas_in_table_definitions(&self) -> Result<bool>;

    fn supports_batch_updates(&self) -> Result<bool>;

    /// Columns of a table in ordinal order.
    fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>>;

    /// Names of primary key columns.
    fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>>;

    /// Tables matching the filters.
    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<TableInfo>>;
}
