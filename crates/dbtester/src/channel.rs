//! The toolkit's handle on a database: a data source plus its cached metadata.

use std::fmt;
use std::sync::Arc;

use dbtester_db::{Connection, DataSource};

use crate::error::{Result, TesterError};
use crate::flavor::DbFlavor;
use crate::metadata::DbMetadata;
use crate::statement::{self, ExecStatementBuilder, RowReader, SelectStatementBuilder};

/// Cheap to clone; clones share the metadata cache.
#[derive(Clone)]
pub struct DatabaseChannel {
    data_source: Arc<dyn DataSource>,
    metadata: Arc<DbMetadata>,
}

impl DatabaseChannel {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        let metadata = Arc::new(DbMetadata::new(Arc::clone(&data_source)));
        Self {
            data_source,
            metadata,
        }
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    pub fn metadata(&self) -> &DbMetadata {
        &self.metadata
    }

    pub fn flavor(&self) -> Result<&DbFlavor> {
        self.metadata.flavor()
    }

    /// Acquire a connection; it is released when dropped.
    pub fn connection(&self) -> Result<Box<dyn Connection + '_>> {
        Ok(self.data_source.connection()?)
    }

    /// Start an update statement.
    pub fn exec_statement(&self) -> ExecStatementBuilder {
        ExecStatementBuilder::new(self.clone())
    }

    /// Start a query whose rows are read with `reader`.
    pub fn select_statement<T, R: RowReader<T>>(&self, reader: R) -> SelectStatementBuilder<T, R> {
        SelectStatementBuilder::new(self.clone(), reader)
    }

    /// Run a single parameterless statement and commit.
    pub fn execute(&self, sql: &str) -> Result<u64> {
        statement::execute_update(self, sql, &[])
    }

    /// Run raw SQL that may hold several statements, without results.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let wrap = |source| TesterError::sql(sql, source);
        let mut conn = self.data_source.connection().map_err(wrap)?;
        conn.execute_batch(sql).map_err(wrap)?;
        conn.commit().map_err(wrap)
    }
}

impl fmt::Debug for DatabaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseChannel").finish_non_exhaustive()
    }
}
