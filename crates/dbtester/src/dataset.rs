//! Staged rows for one table.

use dbtester_db::DbValue;
use tracing::{debug, info};

use crate::error::{Result, TesterError};
use crate::metadata::DbColumnMetadata;
use crate::statement::InsertBuilder;
use crate::table::Table;

/// Rows waiting to be inserted into, or compared against, a table.
#[derive(Debug, Clone)]
pub struct TableDataSet {
    table: Table,
    header: Vec<DbColumnMetadata>,
    records: Vec<Vec<DbValue>>,
}

impl TableDataSet {
    /// Every record must have one value per header column.
    pub fn new(table: Table, header: Vec<DbColumnMetadata>, records: Vec<Vec<DbValue>>) -> Result<Self> {
        if let Some((i, record)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != header.len())
        {
            return Err(TesterError::invalid_argument(format!(
                "Record #{} has {} values, header has {} columns",
                i + 1,
                record.len(),
                header.len()
            )));
        }
        Ok(Self {
            table,
            header,
            records,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn header(&self) -> &[DbColumnMetadata] {
        &self.header
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.header.iter().map(|c| c.name()).collect()
    }

    pub fn records(&self) -> &[Vec<DbValue>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert all records in order. An empty data set touches nothing.
    pub fn persist(&self) -> Result<u64> {
        if self.records.is_empty() {
            debug!(table = %self.table.name(), "Empty data set, nothing to persist");
            return Ok(0);
        }

        let mut insert = InsertBuilder::new(
            self.table.channel().clone(),
            self.table.metadata().clone(),
            self.header.clone(),
        );
        for record in &self.records {
            insert = insert.values(record.iter().cloned());
        }
        let inserted = insert.exec()?;
        info!(table = %self.table.name(), rows = inserted, "Persisted data set");
        Ok(inserted)
    }
}
