//! PostgreSQL backend.
//!
//! Drives an sqlx `PgPool` from a private current-thread runtime so callers
//! get the same blocking API as the embedded backend. Statements use `?`
//! placeholders, rewritten to `$n` before they reach the server.

use std::cell::RefCell;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Either, Executor, PgPool, Postgres, Row, TypeInfo};
use tokio::runtime::Runtime;
use tracing::info;

use crate::connection::{
    ColumnInfo, Connection, DataSource, DatabaseMetadata, Statement, TableInfo,
};
use crate::error::{DbError, Result};
use crate::trace::StatementSpan;
use crate::types::SqlType;
use crate::value::{DbRow, DbValue};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Pooled PostgreSQL data source with a blocking facade.
pub struct PgDataSource {
    runtime: Runtime,
    pool: PgPool,
}

impl std::fmt::Debug for PgDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDataSource")
            .field("size", &self.pool.size())
            .finish()
    }
}

impl PgDataSource {
    /// Connect a pool of at most `max_connections` connections.
    pub fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url),
            )
            .map_err(|e| DbError::Connect(e.to_string()))?;
        info!(max_connections, "Connected PostgreSQL pool");
        Ok(Self { runtime, pool })
    }
}

impl DataSource for PgDataSource {
    fn connection(&self) -> Result<Box<dyn Connection + '_>> {
        let conn = self
            .runtime
            .block_on(self.pool.acquire())
            .map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(Box::new(PgConnection {
            runtime: &self.runtime,
            conn,
        }))
    }

    fn shutdown(&self) -> Result<()> {
        self.runtime.block_on(self.pool.close());
        Ok(())
    }
}

/// One pooled PostgreSQL connection; returned to the pool on drop.
pub struct PgConnection<'a> {
    runtime: &'a Runtime,
    conn: PoolConnection<Postgres>,
}

impl Connection for PgConnection<'_> {
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn Statement + 'c>> {
        let pg_sql = rewrite_placeholders(sql);
        let describe = self
            .runtime
            .block_on((&mut *self.conn).describe(&pg_sql))
            .map_err(|e| DbError::sql(sql, e.to_string()))?;

        let param_types = match describe.parameters() {
            Some(Either::Left(types)) => types
                .iter()
                .map(|t| SqlType::from_type_name(t.name()))
                .collect(),
            Some(Either::Right(count)) => vec![SqlType::Other; count],
            None => Vec::new(),
        };

        Ok(Box::new(PgStatement {
            runtime: self.runtime,
            conn: &mut self.conn,
            sql: sql.to_string(),
            pg_sql,
            param_types,
            params: Vec::new(),
            batch: Vec::new(),
        }))
    }

    fn commit(&mut self) -> Result<()> {
        // auto-commit
        Ok(())
    }

    fn metadata<'c>(&'c mut self) -> Result<Box<dyn DatabaseMetadata + 'c>> {
        Ok(Box::new(PgMetadata {
            runtime: self.runtime,
            conn: RefCell::new(&mut self.conn),
        }))
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        let span = StatementSpan::exec(sql);
        span.in_scope(|| self.runtime.block_on((&mut *self.conn).execute(sql)))
            .map_err(|e| sql_error(sql, e))?;
        span.finish();
        Ok(())
    }
}

struct PgStatement<'c> {
    runtime: &'c Runtime,
    conn: &'c mut PoolConnection<Postgres>,
    sql: String,
    pg_sql: String,
    param_types: Vec<SqlType>,
    params: Vec<(DbValue, SqlType)>,
    batch: Vec<Vec<(DbValue, SqlType)>>,
}

impl PgStatement<'_> {
    fn build_query<'q>(&self, pg_sql: &'q str, params: &[(DbValue, SqlType)]) -> PgQuery<'q> {
        let mut query = sqlx::query(pg_sql);
        for (index, (value, sql_type)) in params.iter().enumerate() {
            let target = match sql_type {
                SqlType::Other => self
                    .param_types
                    .get(index)
                    .copied()
                    .unwrap_or(SqlType::Other),
                known => *known,
            };
            query = bind_value(query, value, target);
        }
        query
    }

    fn run_update(&mut self, params: &[(DbValue, SqlType)]) -> Result<u64> {
        let span = StatementSpan::exec(&self.sql);
        let pg_sql = self.pg_sql.clone();
        let query = self.build_query(&pg_sql, params);
        let runtime = self.runtime;
        let conn = &mut **self.conn;
        let result = span
            .in_scope(|| runtime.block_on(query.execute(conn)))
            .map_err(|e| sql_error(&self.sql, e))?;
        span.finish();
        Ok(result.rows_affected())
    }
}

impl Statement for PgStatement<'_> {
    fn parameter_type(&mut self, index: usize) -> Result<SqlType> {
        index
            .checked_sub(1)
            .and_then(|i| self.param_types.get(i))
            .copied()
            .ok_or_else(|| {
                DbError::invalid_input(format!("No parameter {} in [{}]", index, self.sql))
            })
    }

    fn bind(&mut self, index: usize, value: &DbValue, sql_type: SqlType) -> Result<()> {
        if index == 0 {
            return Err(DbError::invalid_input("Parameter indexes are 1-based"));
        }
        if self.params.len() < index {
            self.params.resize(index, (DbValue::Null, SqlType::Other));
        }
        self.params[index - 1] = (value.clone(), sql_type);
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64> {
        let params = std::mem::take(&mut self.params);
        self.run_update(&params)
    }

    fn execute_query(&mut self, max_rows: Option<usize>) -> Result<Vec<DbRow>> {
        let span = StatementSpan::query(&self.sql);
        let params = std::mem::take(&mut self.params);
        let pg_sql = self.pg_sql.clone();
        let query = self.build_query(&pg_sql, &params);
        let runtime = self.runtime;
        let conn = &mut **self.conn;
        let rows = span
            .in_scope(|| runtime.block_on(query.fetch_all(conn)))
            .map_err(|e| sql_error(&self.sql, e))?;
        span.finish();

        let limit = max_rows.unwrap_or(usize::MAX);
        rows.iter()
            .take(limit)
            .map(|row| from_pg_row(row).map_err(|e| sql_error(&self.sql, e)))
            .collect()
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

fn sql_error(sql: &str, err: sqlx::Error) -> DbError {
    let sql_state = match &err {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    };
    DbError::Sql {
        sql: sql.to_string(),
        message: err.to_string(),
        sql_state,
    }
}

/// Rewrite `?` placeholders to `$1..$n`, leaving quoted text untouched.
pub(crate) fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut in_single = false;
    let mut in_double = false;
    for ch in sql.chars() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '?' if !in_single && !in_double => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                continue;
            }
            _ => {}
        }
        out.push(ch);
    }
    out
}

fn bind_null(query: PgQuery<'_>, sql_type: SqlType) -> PgQuery<'_> {
    match sql_type {
        SqlType::Bit | SqlType::Boolean => query.bind(None::<bool>),
        SqlType::TinyInt | SqlType::SmallInt => query.bind(None::<i16>),
        SqlType::Integer => query.bind(None::<i32>),
        SqlType::BigInt => query.bind(None::<i64>),
        SqlType::Float | SqlType::Double => query.bind(None::<f64>),
        SqlType::Real => query.bind(None::<f32>),
        SqlType::Numeric | SqlType::Decimal => query.bind(None::<Decimal>),
        SqlType::Date => query.bind(None::<NaiveDate>),
        SqlType::Time => query.bind(None::<NaiveTime>),
        SqlType::Timestamp => query.bind(None::<NaiveDateTime>),
        SqlType::TimestampWithTimezone => query.bind(None::<DateTime<Utc>>),
        t if t.is_binary() => query.bind(None::<Vec<u8>>),
        _ => query.bind(None::<String>),
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: &DbValue, sql_type: SqlType) -> PgQuery<'q> {
    match value {
        DbValue::Null => bind_null(query, sql_type),
        DbValue::Boolean(v) => query.bind(*v),
        DbValue::Integer(v) => match sql_type {
            SqlType::SmallInt | SqlType::TinyInt => match i16::try_from(*v) {
                Ok(narrow) => query.bind(narrow),
                Err(_) => query.bind(*v),
            },
            SqlType::Integer => match i32::try_from(*v) {
                Ok(narrow) => query.bind(narrow),
                Err(_) => query.bind(*v),
            },
            SqlType::Numeric | SqlType::Decimal => query.bind(Decimal::from(*v)),
            _ => query.bind(*v),
        },
        DbValue::Real(v) => match sql_type {
            SqlType::Numeric | SqlType::Decimal => match Decimal::try_from(*v) {
                Ok(d) => query.bind(d),
                Err(_) => query.bind(*v),
            },
            SqlType::Real => query.bind(*v as f32),
            _ => query.bind(*v),
        },
        DbValue::Decimal(v) => query.bind(*v),
        DbValue::Text(v) => query.bind(v.clone()),
        DbValue::Blob(v) => query.bind(v.clone()),
        DbValue::Date(v) => query.bind(*v),
        DbValue::Time(v) => query.bind(*v),
        DbValue::Timestamp(v) => query.bind(*v),
        DbValue::TimestampTz(v) => query.bind(v.with_timezone(&Utc)),
    }
}

fn from_pg_row(row: &PgRow) -> std::result::Result<DbRow, sqlx::Error> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut values = Vec::with_capacity(columns.len());
    for (i, column) in row.columns().iter().enumerate() {
        let value: DbValue = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(i)?.into(),
            "INT2" => row.try_get::<Option<i16>, _>(i)?.map(|v| v as i64).into(),
            "INT4" => row.try_get::<Option<i32>, _>(i)?.map(|v| v as i64).into(),
            "INT8" => row.try_get::<Option<i64>, _>(i)?.into(),
            "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(|v| v as f64).into(),
            "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.into(),
            "NUMERIC" => row.try_get::<Option<Decimal>, _>(i)?.into(),
            "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(i)?.into(),
            "DATE" => row.try_get::<Option<NaiveDate>, _>(i)?.into(),
            "TIME" => row.try_get::<Option<NaiveTime>, _>(i)?.into(),
            "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(i)?.into(),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(i)?
                .map(|v| v.fixed_offset())
                .into(),
            _ => row.try_get_unchecked::<Option<String>, _>(i)?.into(),
        };
        values.push(value);
    }
    Ok(DbRow::new(columns, values))
}

/// Driver metadata read through `information_schema`.
struct PgMetadata<'c> {
    runtime: &'c Runtime,
    conn: RefCell<&'c mut PoolConnection<Postgres>>,
}

impl PgMetadata<'_> {
    fn fetch(&self, sql: &str, params: &[String]) -> Result<Vec<PgRow>> {
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(p.clone());
        }
        let mut conn = self.conn.borrow_mut();
        self.runtime
            .block_on(query.fetch_all(&mut ***conn))
            .map_err(|e| DbError::Metadata(format!("{} [{}]", e, sql)))
    }
}

/// Append optional schema/catalog filters with `$n` numbering.
///
/// Without a schema, only schemas on the current search path are considered.
fn filtered(
    base: &str,
    catalog_col: &str,
    schema_col: &str,
    catalog: Option<&str>,
    schema: Option<&str>,
    params: &mut Vec<String>,
) -> String {
    let mut sql = base.to_string();
    match schema {
        Some(schema) => {
            params.push(schema.to_string());
            sql.push_str(&format!(" AND {} = ${}", schema_col, params.len()));
        }
        None => sql.push_str(&format!(
            " AND {} = ANY(current_schemas(false))",
            schema_col
        )),
    }
    if let Some(catalog) = catalog {
        params.push(catalog.to_string());
        sql.push_str(&format!(" AND {} = ${}", catalog_col, params.len()));
    }
    sql
}

fn metadata_error(err: sqlx::Error) -> DbError {
    DbError::Metadata(err.to_string())
}

impl DatabaseMetadata for PgMetadata<'_> {
    fn product_name(&self) -> Result<Option<String>> {
        Ok(Some("PostgreSQL".to_string()))
    }

    fn identifier_quote(&self) -> Result<String> {
        Ok("\"".to_string())
    }

    fn supports_catalogs_in_table_definitions(&self) -> Result<bool> {
        Ok(false)
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
            "SELECT column_name::text, udt_name::text, is_nullable::text \
             FROM information_schema.columns WHERE table_name = $1",
            "table_catalog",
            "table_schema",
            catalog,
            schema,
            &mut params,
        );
        sql.push_str(" ORDER BY ordinal_position");

        self.fetch(&sql, &params)?
            .iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(metadata_error)?;
                let type_name: String = row.try_get(1).map_err(metadata_error)?;
                let nullable: String = row.try_get(2).map_err(metadata_error)?;
                Ok(ColumnInfo {
                    name,
                    sql_type: SqlType::from_type_name(&type_name),
                    type_name,
                    nullable: nullable == "YES",
                })
            })
            .collect()
    }

    fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>> {
        let mut params = vec![table.to_string()];
        let mut sql = filtered(
            "SELECT kcu.column_name::text FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
              AND tc.table_schema = kcu.table_schema \
              AND tc.table_name = kcu.table_name \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_name = $1",
            "tc.table_catalog",
            "tc.table_schema",
            catalog,
            schema,
            &mut params,
        );
        sql.push_str(" ORDER BY kcu.ordinal_position");

        self.fetch(&sql, &params)?
            .iter()
            .map(|row| row.try_get::<String, _>(0).map_err(metadata_error))
            .collect()
    }

    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<TableInfo>> {
        let mut params = vec![table.to_string()];
        let sql = filtered(
            "SELECT table_catalog::text, table_schema::text, table_name::text \
             FROM information_schema.tables WHERE table_name = $1",
            "table_catalog",
            "table_schema",
            catalog,
            schema,
            &mut params,
        );

        self.fetch(&sql, &params)?
            .iter()
            .map(|row| {
                Ok(TableInfo {
                    catalog: row.try_get(0).map_err(metadata_error)?,
                    schema: row.try_get(1).map_err(metadata_error)?,
                    name: row.try_get(2).map_err(metadata_error)?,
                })
            })
            .collect()
    }
}
