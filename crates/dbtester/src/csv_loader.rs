//! Loading CSV fixtures into datasets.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use dbtester_db::{DbValue, SqlType};
use tracing::debug;

use crate::convert::ValueConverter;
use crate::dataset::TableDataSet;
use crate::error::{Result, TesterError};
use crate::metadata::DbColumnMetadata;
use crate::table::Table;

/// Where the column list of a CSV fixture comes from.
enum Header {
    FirstRow,
    Columns(Vec<DbColumnMetadata>),
}

/// Builds a [`TableDataSet`] from CSV for one table.
#[derive(Debug, Clone)]
pub struct CsvDataSetBuilder {
    table: Table,
    converter: ValueConverter,
}

impl CsvDataSetBuilder {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            converter: ValueConverter::new(),
        }
    }

    /// Replace the text conversion for one column type.
    pub fn with_converter<F>(mut self, sql_type: SqlType, convert: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<DbValue, String> + Send + Sync + 'static,
    {
        self.converter = self.converter.with_converter(sql_type, convert);
        self
    }

    /// Load a file whose first row names the columns.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<TableDataSet> {
        let path = path.as_ref();
        debug!(table = %self.table.name(), path = %path.display(), "Loading CSV data set");
        self.read(File::open(path)?, Header::FirstRow)
    }

    /// Load a file without a header row, using the given columns.
    pub fn load_with_header<S: AsRef<str>>(
        &self,
        columns: &[S],
        path: impl AsRef<Path>,
    ) -> Result<TableDataSet> {
        let header = self.table.metadata().columns_named(columns)?;
        self.read(File::open(path.as_ref())?, Header::Columns(header))
    }

    /// Load a file without a header row, using all table columns in order.
    pub fn load_with_table_header(&self, path: impl AsRef<Path>) -> Result<TableDataSet> {
        let header = self.table.columns().to_vec();
        self.read(File::open(path.as_ref())?, Header::Columns(header))
    }

    /// Parse CSV text whose first row names the columns.
    pub fn load_str(&self, csv: &str) -> Result<TableDataSet> {
        self.read(csv.as_bytes(), Header::FirstRow)
    }

    /// Parse CSV text without a header row, using the given columns.
    pub fn load_str_with_header<S: AsRef<str>>(&self, columns: &[S], csv: &str) -> Result<TableDataSet> {
        let header = self.table.metadata().columns_named(columns)?;
        self.read(csv.as_bytes(), Header::Columns(header))
    }

    fn read<R: Read>(&self, source: R, header: Header) -> Result<TableDataSet> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut rows = reader.records().enumerate();
        let header = match header {
            Header::Columns(columns) => columns,
            Header::FirstRow => {
                let Some((_, first)) = rows.next() else {
                    return Err(TesterError::Csv(format!(
                        "no header row in CSV for table '{}'",
                        self.table.name()
                    )));
                };
                let first = first.map_err(|e| csv_error(1, e))?;
                let names: Vec<&str> = first.iter().map(str::trim).collect();
                self.table.metadata().columns_named(&names)?
            }
        };

        let mut records = Vec::new();
        for (idx, result) in rows {
            // quoted fields may span lines, so the record index can trail the file line
            let fallback = idx as u64 + 1;
            let record = result.map_err(|e| {
                let line = e.position().map_or(fallback, csv::Position::line);
                csv_error(line, e)
            })?;
            let line = record.position().map_or(fallback, csv::Position::line);
            if record.len() != header.len() {
                return Err(TesterError::Csv(format!(
                    "line {}: expected {} values, found {}",
                    line,
                    header.len(),
                    record.len()
                )));
            }
            let row = header
                .iter()
                .zip(record.iter())
                .map(|(column, raw)| self.converter.convert(column, raw))
                .collect::<Result<Vec<_>>>()?;
            records.push(row);
        }

        TableDataSet::new(self.table.clone(), header, records)
    }
}

fn csv_error(line: u64, e: csv::Error) -> TesterError {
    TesterError::Csv(format!("line {}: {}", line, e))
}
