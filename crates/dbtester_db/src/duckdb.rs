//! DuckDB backend.
//!
//! Synchronous, embedded. Every connection handed out by [`DuckDbDataSource`]
//! is a clone of one base connection, so all of them see the same database
//! (including in-memory ones). Connections run in auto-commit mode.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveTime, Timelike};
use duckdb::arrow::datatypes::DataType;
use duckdb::types::{TimeUnit, Value, ValueRef};
use rust_decimal::Decimal;
use tracing::info;

use crate::connection::{
    ColumnInfo, Connection, DataSource, DatabaseMetadata, Statement, TableInfo,
};
use crate::error::{DbError, Result};
use crate::trace::StatementSpan;
use crate::types::SqlType;
use crate::value::{DbRow, DbValue};

const MEMORY_URL: &str = "duckdb::memory:";

/// Data source over a single DuckDB database.
pub struct DuckDbDataSource {
    base: Mutex<duckdb::Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for DuckDbDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbDataSource")
            .field("path", &self.path)
            .finish()
    }
}

impl DuckDbDataSource {
    /// Open from a `duckdb:` URL. `duckdb::memory:` opens an in-memory database.
    pub fn open_from_url(url: &str) -> Result<Self> {
        if url == MEMORY_URL {
            return Self::open_memory();
        }
        match url.strip_prefix("duckdb:") {
            Some(path) if !path.is_empty() => Self::open(Path::new(path)),
            _ => Err(DbError::NotAvailable(format!(
                "Unsupported database URL: {}",
                url
            ))),
        }
    }

    /// Open or create a file-backed database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = duckdb::Connection::open(path)?;
        info!("Opened DuckDB database: {}", path.display());
        Ok(Self {
            base: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = duckdb::Connection::open_in_memory()?;
        info!("Opened in-memory DuckDB database");
        Ok(Self {
            base: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl DataSource for DuckDbDataSource {
    fn connection(&self) -> Result<Box<dyn Connection + '_>> {
        let base = self
            .base
            .lock()
            .map_err(|_| DbError::Connect("DuckDB base connection lock poisoned".to_string()))?;
        let conn = base.try_clone()?;
        Ok(Box::new(DuckDbConnection { conn }))
    }
}

/// One DuckDB connection.
pub struct DuckDbConnection {
    conn: duckdb::Connection,
}

impl Connection for DuckDbConnection {
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn Statement + 'c>> {
        let stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DbError::sql(sql, e.to_string()))?;
        Ok(Box::new(DuckDbStatement {
            sql: sql.to_string(),
            stmt,
            params: Vec::new(),
            batch: Vec::new(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        // auto-commit
        Ok(())
    }

    fn metadata<'c>(&'c mut self) -> Result<Box<dyn DatabaseMetadata + 'c>> {
        Ok(Box::new(DuckDbMetadata { conn: &self.conn }))
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        let span = StatementSpan::exec(sql);
        span.in_scope(|| self.conn.execute_batch(sql))
            .map_err(|e| DbError::sql(sql, e.to_string()))?;
        span.finish();
        Ok(())
    }
}

struct DuckDbStatement<'c> {
    sql: String,
    stmt: duckdb::Statement<'c>,
    params: Vec<Value>,
    batch: Vec<Vec<Value>>,
}

impl DuckDbStatement<'_> {
    fn run_update(&mut self, params: &[Value]) -> Result<u64> {
        let span = StatementSpan::exec(&self.sql);
        let param_refs: Vec<&dyn duckdb::ToSql> =
            params.iter().map(|v| v as &dyn duckdb::ToSql).collect();
        let rows = span
            .in_scope(|| self.stmt.execute(param_refs.as_slice()))
            .map_err(|e| DbError::sql(&self.sql, e.to_string()))?;
        span.finish();
        Ok(rows as u64)
    }
}

impl Statement for DuckDbStatement<'_> {
    fn parameter_type(&mut self, _index: usize) -> Result<SqlType> {
        // DuckDB infers parameter types itself; untyped NULL binds fine.
        Ok(SqlType::Other)
    }

    fn bind(&mut self, index: usize, value: &DbValue, _sql_type: SqlType) -> Result<()> {
        if index == 0 {
            return Err(DbError::invalid_input("Parameter indexes are 1-based"));
        }
        if self.params.len() < index {
            self.params.resize(index, Value::Null);
        }
        self.params[index - 1] = to_duckdb_value(value);
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64> {
        let params = std::mem::take(&mut self.params);
        self.run_update(&params)
    }

    fn execute_query(&mut self, max_rows: Option<usize>) -> Result<Vec<DbRow>> {
        let span = StatementSpan::query(&self.sql);
        let params = std::mem::take(&mut self.params);
        let sql = self.sql.clone();
        let stmt = &mut self.stmt;
        let result = span.in_scope(|| query_rows(stmt, &params, max_rows));
        span.finish();
        result.map_err(|e| DbError::sql(sql, e.to_string()))
    }

    fn add_batch(&mut self) -> Result<()> {
        let params = std::mem::take(&mut self.params);
        self.batch.push(params);
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        let batch = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(batch.len());
        for params in &batch {
            counts.push(self.run_update(params)?);
        }
        Ok(counts)
    }
}

fn query_rows(
    stmt: &mut duckdb::Statement<'_>,
    params: &[Value],
    max_rows: Option<usize>,
) -> std::result::Result<Vec<DbRow>, duckdb::Error> {
    let param_refs: Vec<&dyn duckdb::ToSql> =
        params.iter().map(|v| v as &dyn duckdb::ToSql).collect();
    let mut rows_iter = stmt.query(param_refs.as_slice())?;

    let (column_count, columns, zoned) = if let Some(stmt_ref) = rows_iter.as_ref() {
        let count = stmt_ref.column_count();
        let cols: Vec<String> = (0..count)
            .map(|i| {
                stmt_ref
                    .column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();
        // TIMESTAMPTZ arrives as a plain timestamp value holding the UTC instant
        let zoned: Vec<bool> = (0..count)
            .map(|i| matches!(stmt_ref.column_type(i), DataType::Timestamp(_, Some(_))))
            .collect();
        (count, cols, zoned)
    } else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    while let Some(row) = rows_iter.next()? {
        if max_rows.is_some_and(|max| result.len() >= max) {
            break;
        }
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(from_duckdb_value(row.get_ref(i)?, zoned[i]));
        }
        result.push(DbRow::new(columns.clone(), values));
    }
    Ok(result)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn to_duckdb_value(value: &DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(v) => Value::Boolean(*v),
        DbValue::Integer(v) => Value::BigInt(*v),
        DbValue::Real(v) => Value::Double(*v),
        DbValue::Decimal(v) => Value::Decimal(*v),
        DbValue::Text(v) => Value::Text(v.clone()),
        DbValue::Blob(v) => Value::Blob(v.clone()),
        DbValue::Date(v) => Value::Date32((*v - epoch()).num_days() as i32),
        DbValue::Time(v) => {
            let micros = v.num_seconds_from_midnight() as i64 * 1_000_000
                + (v.nanosecond() / 1_000) as i64;
            Value::Time64(TimeUnit::Microsecond, micros)
        }
        // Wall-clock value, stored as-is with no zone conversion.
        DbValue::Timestamp(v) => {
            Value::Timestamp(TimeUnit::Microsecond, v.and_utc().timestamp_micros())
        }
        // Bound as text so DuckDB applies the offset instead of the session zone.
        DbValue::TimestampTz(v) => Value::Text(v.to_rfc3339()),
    }
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v * 1_000_000,
        TimeUnit::Millisecond => v * 1_000,
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

/// Integers beyond `i64` become decimals, or text past the decimal range.
fn wide_integer(v: i128) -> DbValue {
    match Decimal::try_from_i128_with_scale(v, 0) {
        Ok(d) => DbValue::Decimal(d),
        Err(_) => DbValue::Text(v.to_string()),
    }
}

fn from_duckdb_value(value: ValueRef<'_>, zoned: bool) -> DbValue {
    match value {
        ValueRef::Null => DbValue::Null,
        ValueRef::Boolean(v) => DbValue::Boolean(v),
        ValueRef::TinyInt(v) => DbValue::Integer(v as i64),
        ValueRef::SmallInt(v) => DbValue::Integer(v as i64),
        ValueRef::Int(v) => DbValue::Integer(v as i64),
        ValueRef::BigInt(v) => DbValue::Integer(v),
        ValueRef::HugeInt(v) => match i64::try_from(v) {
            Ok(i) => DbValue::Integer(i),
            Err(_) => wide_integer(v),
        },
        ValueRef::UTinyInt(v) => DbValue::Integer(v as i64),
        ValueRef::USmallInt(v) => DbValue::Integer(v as i64),
        ValueRef::UInt(v) => DbValue::Integer(v as i64),
        ValueRef::UBigInt(v) => match i64::try_from(v) {
            Ok(i) => DbValue::Integer(i),
            Err(_) => wide_integer(i128::from(v)),
        },
        ValueRef::Float(v) => DbValue::Real(v as f64),
        ValueRef::Double(v) => DbValue::Real(v),
        ValueRef::Decimal(v) => DbValue::Decimal(v),
        ValueRef::Text(v) => DbValue::Text(String::from_utf8_lossy(v).to_string()),
        ValueRef::Blob(v) => DbValue::Blob(v.to_vec()),
        ValueRef::Timestamp(unit, v) => {
            let micros = to_micros(unit, v);
            match chrono::DateTime::from_timestamp_micros(micros) {
                Some(dt) if zoned => DbValue::TimestampTz(dt.fixed_offset()),
                Some(dt) => DbValue::Timestamp(dt.naive_utc()),
                None => DbValue::Integer(micros),
            }
        }
        ValueRef::Date32(days) => {
            match epoch().checked_add_signed(chrono::Duration::days(days as i64)) {
                Some(date) => DbValue::Date(date),
                None => DbValue::Integer(days as i64),
            }
        }
        ValueRef::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            let secs = (micros / 1_000_000) as u32;
            let nanos = ((micros % 1_000_000) * 1_000) as u32;
            match NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
                Some(time) => DbValue::Time(time),
                None => DbValue::Integer(micros),
            }
        }
        other => {
            tracing::warn!(
                "DuckDB type {:?} mapped to debug string",
                std::mem::discriminant(&other)
            );
            DbValue::Text(format!("{:?}", other))
        }
    }
}

/// Driver metadata read through DuckDB's catalog views.
struct DuckDbMetadata<'c> {
    conn: &'c duckdb::Connection,
}

impl DuckDbMetadata<'_> {
    fn query_strings(&self, sql: &str, params: &[String]) -> Result<Vec<Vec<Option<String>>>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DbError::Metadata(format!("{} [{}]", e, sql)))?;
        let values: Vec<Value> = params.iter().map(|p| Value::Text(p.clone())).collect();
        let rows = query_rows(&mut stmt, &values, None)
            .map_err(|e| DbError::Metadata(format!("{} [{}]", e, sql)))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_values()
                    .into_iter()
                    .map(|v| match v {
                        DbValue::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect()
            })
            .collect())
    }
}

/// Append optional catalog/schema filters to a catalog-view query.
fn filtered(
    base: &str,
    catalog_col: &str,
    schema_col: &str,
    catalog: Option<&str>,
    schema: Option<&str>,
    params: &mut Vec<String>,
) -> String {
    let mut sql = base.to_string();
    if let Some(schema) = schema {
        sql.push_str(&format!(" AND {} = ?", schema_col));
        params.push(schema.to_string());
    }
    if let Some(catalog) = catalog {
        sql.push_str(&format!(" AND {} = ?", catalog_col));
        params.push(catalog.to_string());
    }
    sql
}

impl DatabaseMetadata for DuckDbMetadata<'_> {
    fn product_name(&self) -> Result<Option<String>> {
        Ok(Some("DuckDB".to_string()))
    }

    fn identifier_quote(&self) -> Result<String> {
        Ok("\"".to_string())
    }

    fn supports_catalogs_in_table_definitions(&self) -> Result<bool> {
        Ok(true)
    }

    fn supports_schemas_in_table_definitions(&self) -> Result<bool> {
        Ok(true)
    }

    fn supports_batch_updates(&self) -> Result<bool> {
        Ok(true)
    }

    fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>> {
        let mut params = vec![table.to_string()];
        let mut sql = filtered(
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_name = ?",
            "table_catalog",
            "table_schema",
            catalog,
            schema,
            &mut params,
        );
        sql.push_str(" ORDER BY ordinal_position");

        let rows = self.query_strings(&sql, &params)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let name = cells.next().flatten()?;
                let type_name = cells.next().flatten().unwrap_or_default();
                let nullable = cells.next().flatten().map_or(true, |n| n == "YES");
                Some(ColumnInfo {
                    name,
                    sql_type: SqlType::from_type_name(&type_name),
                    type_name,
                    nullable,
                })
            })
            .collect())
    }

    fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>> {
        let mut params = vec![table.to_string()];
        let sql = filtered(
            "SELECT unnest(constraint_column_names) FROM duckdb_constraints() \
             WHERE constraint_type = 'PRIMARY KEY' AND table_name = ?",
            "database_name",
            "schema_name",
            catalog,
            schema,
            &mut params,
        );
        let rows = self.query_strings(&sql, &params)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }

    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<TableInfo>> {
        let mut params = vec![table.to_string()];
        let sql = filtered(
            "SELECT table_catalog, table_schema, table_name FROM information_schema.tables \
             WHERE table_name = ?",
            "table_catalog",
            "table_schema",
            catalog,
            schema,
            &mut params,
        );
        let rows = self.query_strings(&sql, &params)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let catalog = cells.next().flatten();
                let schema = cells.next().flatten();
                let name = cells.next().flatten()?;
                Some(TableInfo {
                    catalog,
                    schema,
                    name,
                })
            })
            .collect())
    }
}
