//! A scripted in-memory backend.
//!
//! Understands exactly the statement shapes the toolkit generates with `"`
//! quoting: single-table INSERT, UPDATE, DELETE, SELECT and SELECT COUNT(*)
//! with `=`, `IS NULL` and `IN` conditions joined by AND. Anything else passed
//! to `execute_batch` is only recorded.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use dbtester_db::{
    ColumnInfo, Connection, DataSource, DatabaseMetadata, DbError, DbRow, DbValue, SqlType,
    Statement, TableInfo,
};

#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
    pub rows: Vec<Vec<DbValue>>,
    pub failing: bool,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, FakeTable>,
    log: Vec<String>,
    bound: Vec<(DbValue, SqlType)>,
    connections: usize,
    column_queries: usize,
    batches: usize,
    commits: usize,
}

pub struct FakeDatabase {
    state: Mutex<State>,
    product: Option<String>,
    quote: String,
    catalogs: bool,
    schemas: bool,
    batch_updates: bool,
    shutdown_state: Option<String>,
    metadata_error: Option<String>,
}

impl Default for FakeDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            product: Some("FakeDB".to_string()),
            quote: "\"".to_string(),
            catalogs: false,
            schemas: true,
            batch_updates: true,
            shutdown_state: None,
            metadata_error: None,
        }
    }

    pub fn with_product(mut self, product: Option<&str>) -> Self {
        self.product = product.map(String::from);
        self
    }

    pub fn with_name_support(mut self, catalogs: bool, schemas: bool) -> Self {
        self.catalogs = catalogs;
        self.schemas = schemas;
        self
    }

    pub fn without_batch_updates(mut self) -> Self {
        self.batch_updates = false;
        self
    }

    pub fn with_shutdown_state(mut self, state: &str) -> Self {
        self.shutdown_state = Some(state.to_string());
        self
    }

    /// Reading the product name fails with `message`.
    pub fn with_metadata_error(mut self, message: &str) -> Self {
        self.metadata_error = Some(message.to_string());
        self
    }

    pub fn with_table(self, name: &str, columns: &[(&str, SqlType)], primary_key: &[&str]) -> Self {
        let columns = columns
            .iter()
            .map(|(name, sql_type)| ColumnInfo {
                name: name.to_string(),
                sql_type: *sql_type,
                type_name: sql_type.as_str().to_string(),
                nullable: !primary_key.contains(name),
            })
            .collect();
        self.with_column_infos(name, columns, primary_key)
    }

    pub fn with_column_infos(self, name: &str, columns: Vec<ColumnInfo>, primary_key: &[&str]) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            FakeTable {
                columns,
                primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
                ..FakeTable::default()
            },
        );
        self
    }

    /// Every statement touching this table fails.
    pub fn with_failing_table(self, name: &str) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            FakeTable {
                columns: vec![ColumnInfo {
                    name: "id".to_string(),
                    sql_type: SqlType::Integer,
                    type_name: "INTEGER".to_string(),
                    nullable: false,
                }],
                failing: true,
                ..FakeTable::default()
            },
        );
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<DbValue>> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn set_rows(&self, table: &str, rows: Vec<Vec<DbValue>>) {
        if let Some(t) = self.lock().tables.get_mut(table) {
            t.rows = rows;
        }
    }

    /// Every statement prepared or run, in order.
    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// Every value bound, with the type it was bound as.
    pub fn bound(&self) -> Vec<(DbValue, SqlType)> {
        self.lock().bound.clone()
    }

    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    pub fn column_queries(&self) -> usize {
        self.lock().column_queries
    }

    pub fn batches(&self) -> usize {
        self.lock().batches
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl DataSource for FakeDatabase {
    fn connection(&self) -> dbtester_db::Result<Box<dyn Connection + '_>> {
        self.lock().connections += 1;
        Ok(Box::new(FakeConnection { db: self }))
    }

    fn shutdown(&self) -> dbtester_db::Result<()> {
        match &self.shutdown_state {
            Some(state) => Err(DbError::sql_with_state(
                "",
                "Database 'fake' shutdown.",
                state.clone(),
            )),
            None => Ok(()),
        }
    }
}

struct FakeConnection<'a> {
    db: &'a FakeDatabase,
}

impl Connection for FakeConnection<'_> {
    fn prepare<'c>(&'c mut self, sql: &str) -> dbtester_db::Result<Box<dyn Statement + 'c>> {
        self.db.lock().log.push(sql.to_string());
        let op = parse(sql).ok_or_else(|| DbError::sql(sql, "unsupported statement"))?;
        Ok(Box::new(FakeStatement {
            db: self.db,
            sql: sql.to_string(),
            op,
            params: Vec::new(),
            batch: Vec::new(),
        }))
    }

    fn commit(&mut self) -> dbtester_db::Result<()> {
        self.db.lock().commits += 1;
        Ok(())
    }

    fn metadata<'c>(&'c mut self) -> dbtester_db::Result<Box<dyn DatabaseMetadata + 'c>> {
        Ok(Box::new(FakeMetadata { db: self.db }))
    }

    fn execute_batch(&mut self, sql: &str) -> dbtester_db::Result<()> {
        self.db.lock().log.push(sql.to_string());
        if sql.contains("FAIL") {
            return Err(DbError::sql(sql, "syntax error at or near \"FAIL\""));
        }
        if let Some(op) = parse(sql) {
            run(self.db, sql, &op, &[])?;
        }
        Ok(())
    }
}

struct FakeStatement<'a> {
    db: &'a FakeDatabase,
    sql: String,
    op: Op,
    params: Vec<DbValue>,
    batch: Vec<Vec<DbValue>>,
}

impl Statement for FakeStatement<'_> {
    fn parameter_type(&mut self, _index: usize) -> dbtester_db::Result<SqlType> {
        Ok(SqlType::Other)
    }

    fn bind(&mut self, index: usize, value: &DbValue, sql_type: SqlType) -> dbtester_db::Result<()> {
        if index == 0 {
            return Err(DbError::invalid_input("parameter indexes start at 1"));
        }
        if self.params.len() < index {
            self.params.resize(index, DbValue::Null);
        }
        self.params[index - 1] = value.clone();
        self.db.lock().bound.push((value.clone(), sql_type));
        Ok(())
    }

    fn execute_update(&mut self) -> dbtester_db::Result<u64> {
        let params = std::mem::take(&mut self.params);
        match run(self.db, &self.sql, &self.op, &params)? {
            Outcome::Updated(n) => Ok(n),
            Outcome::Rows(_) => Err(DbError::sql(&self.sql, "query used as update")),
        }
    }

    fn execute_query(&mut self, max_rows: Option<usize>) -> dbtester_db::Result<Vec<DbRow>> {
        let params = std::mem::take(&mut self.params);
        match run(self.db, &self.sql, &self.op, &params)? {
            Outcome::Rows(mut rows) => {
                if let Some(max) = max_rows {
                    rows.truncate(max);
                }
                Ok(rows)
            }
            Outcome::Updated(_) => Err(DbError::sql(&self.sql, "update used as query")),
        }
    }

    fn add_batch(&mut self) -> dbtester_db::Result<()> {
        self.batch.push(std::mem::take(&mut self.params));
        Ok(())
    }

    fn execute_batch(&mut self) -> dbtester_db::Result<Vec<u64>> {
        self.db.lock().batches += 1;
        let mut counts = Vec::new();
        for params in std::mem::take(&mut self.batch) {
            match run(self.db, &self.sql, &self.op, &params)? {
                Outcome::Updated(n) => counts.push(n),
                Outcome::Rows(_) => return Err(DbError::sql(&self.sql, "query in batch")),
            }
        }
        Ok(counts)
    }
}

struct FakeMetadata<'a> {
    db: &'a FakeDatabase,
}

impl DatabaseMetadata for FakeMetadata<'_> {
    fn product_name(&self) -> dbtester_db::Result<Option<String>> {
        if let Some(message) = &self.db.metadata_error {
            return Err(DbError::Metadata(message.clone()));
        }
        Ok(self.db.product.clone())
    }

    fn identifier_quote(&self) -> dbtester_db::Result<String> {
        Ok(self.db.quote.clone())
    }

    fn supports_catalogs_in_table_definitions(&self) -> dbtester_db::Result<bool> {
        Ok(self.db.catalogs)
    }

    fn supports_schemas_in_table_definitions(&self) -> dbtester_db::Result<bool> {
        Ok(self.db.schemas)
    }

    fn supports_batch_updates(&self) -> dbtester_db::Result<bool> {
        Ok(self.db.batch_updates)
    }

    fn columns(
        &self,
        _catalog: Option<&str>,
        _schema: Option<&str>,
        table: &str,
    ) -> dbtester_db::Result<Vec<ColumnInfo>> {
        let mut state = self.db.lock();
        state.column_queries += 1;
        Ok(state
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn primary_keys(
        &self,
        _catalog: Option<&str>,
        _schema: Option<&str>,
        table: &str,
    ) -> dbtester_db::Result<Vec<String>> {
        Ok(self
            .db
            .lock()
            .tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    fn tables(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> dbtester_db::Result<Vec<TableInfo>> {
        let state = self.db.lock();
        Ok(state
            .tables
            .keys()
            .filter(|name| name.as_str() == table)
            .map(|name| TableInfo {
                catalog: catalog.map(String::from),
                schema: schema.map(String::from),
                name: name.clone(),
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
enum Cond {
    IsNull(String),
    Eq(String),
    In(String, usize),
}

#[derive(Debug, Clone)]
enum Op {
    Insert { table: String, columns: Vec<String> },
    Update { table: String, columns: Vec<String>, conds: Vec<Cond> },
    Delete { table: String, conds: Vec<Cond> },
    Count { table: String, conds: Vec<Cond> },
    Select { table: String, columns: Vec<String>, conds: Vec<Cond> },
}

enum Outcome {
    Updated(u64),
    Rows(Vec<DbRow>),
}

fn unquote(identifier: &str) -> String {
    identifier.trim().trim_matches('"').replace("\"\"", "\"")
}

/// Last component of a possibly qualified table name.
fn table_key(name: &str) -> String {
    unquote(name.trim().rsplit("\".\"").next().unwrap_or(name))
}

fn column_list(list: &str) -> Vec<String> {
    list.split(", ").map(unquote).collect()
}

fn split_where(text: &str) -> Option<(&str, Vec<Cond>)> {
    match text.split_once(" WHERE ") {
        Some((head, conds)) => Some((head, parse_conds(conds)?)),
        None => Some((text, Vec::new())),
    }
}

fn parse_conds(text: &str) -> Option<Vec<Cond>> {
    text.split(" AND ")
        .map(|cond| {
            if let Some(column) = cond.strip_suffix(" IS NULL") {
                Some(Cond::IsNull(unquote(column)))
            } else if let Some((column, values)) = cond.split_once(" IN (") {
                Some(Cond::In(unquote(column), values.matches('?').count()))
            } else {
                cond.strip_suffix(" = ?").map(|column| Cond::Eq(unquote(column)))
            }
        })
        .collect()
}

fn parse(sql: &str) -> Option<Op> {
    if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
        let (table, rest) = rest.split_once(" (")?;
        let (columns, _) = rest.split_once(") VALUES (")?;
        Some(Op::Insert {
            table: table_key(table),
            columns: column_list(columns),
        })
    } else if let Some(rest) = sql.strip_prefix("UPDATE ") {
        let (table, rest) = rest.split_once(" SET ")?;
        let (assignments, conds) = split_where(rest)?;
        let columns = assignments
            .split(", ")
            .map(|a| a.strip_suffix(" = ?").map(unquote))
            .collect::<Option<Vec<_>>>()?;
        Some(Op::Update {
            table: table_key(table),
            columns,
            conds,
        })
    } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
        let (table, conds) = split_where(rest)?;
        Some(Op::Delete {
            table: table_key(table),
            conds,
        })
    } else if let Some(rest) = sql.strip_prefix("SELECT COUNT(*) FROM ") {
        let (table, conds) = split_where(rest)?;
        Some(Op::Count {
            table: table_key(table),
            conds,
        })
    } else if let Some(rest) = sql.strip_prefix("SELECT ") {
        let (columns, rest) = rest.split_once(" FROM ")?;
        let (table, conds) = split_where(rest)?;
        Some(Op::Select {
            table: table_key(table),
            columns: column_list(columns),
            conds,
        })
    } else {
        None
    }
}

enum Pred {
    IsNull(usize),
    Eq(usize, DbValue),
    In(usize, Vec<DbValue>),
}

impl Pred {
    fn matches(&self, row: &[DbValue]) -> bool {
        let same = |a: &DbValue, b: &DbValue| !a.is_null() && a.same_value(b);
        match self {
            Pred::IsNull(i) => row[*i].is_null(),
            Pred::Eq(i, v) => same(&row[*i], v),
            Pred::In(i, values) => values.iter().any(|v| same(&row[*i], v)),
        }
    }
}

fn column_index(table: &FakeTable, sql: &str, name: &str) -> dbtester_db::Result<usize> {
    table
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| DbError::sql(sql, format!("column \"{}\" does not exist", name)))
}

fn predicates(
    table: &FakeTable,
    sql: &str,
    conds: &[Cond],
    params: &mut impl Iterator<Item = DbValue>,
) -> dbtester_db::Result<Vec<Pred>> {
    conds
        .iter()
        .map(|cond| -> dbtester_db::Result<Pred> {
            Ok(match cond {
                Cond::IsNull(c) => Pred::IsNull(column_index(table, sql, c)?),
                Cond::Eq(c) => Pred::Eq(
                    column_index(table, sql, c)?,
                    params.next().unwrap_or(DbValue::Null),
                ),
                Cond::In(c, n) => Pred::In(
                    column_index(table, sql, c)?,
                    params.by_ref().take(*n).collect(),
                ),
            })
        })
        .collect()
}

fn run(db: &FakeDatabase, sql: &str, op: &Op, params: &[DbValue]) -> dbtester_db::Result<Outcome> {
    let mut state = db.lock();
    let table_name = match op {
        Op::Insert { table, .. }
        | Op::Update { table, .. }
        | Op::Delete { table, .. }
        | Op::Count { table, .. }
        | Op::Select { table, .. } => table,
    };
    let table = state
        .tables
        .get_mut(table_name)
        .ok_or_else(|| DbError::sql(sql, format!("relation \"{}\" does not exist", table_name)))?;
    if table.failing {
        return Err(DbError::sql(sql, "disk I/O error"));
    }

    let mut params = params.iter().cloned();
    match op {
        Op::Insert { columns, .. } => {
            let mut row = vec![DbValue::Null; table.columns.len()];
            for column in columns {
                let i = column_index(table, sql, column)?;
                row[i] = params.next().unwrap_or(DbValue::Null);
            }
            table.rows.push(row);
            Ok(Outcome::Updated(1))
        }
        Op::Update { columns, conds, .. } => {
            let mut assignments = Vec::new();
            for column in columns {
                let i = column_index(table, sql, column)?;
                assignments.push((i, params.next().unwrap_or(DbValue::Null)));
            }
            let preds = predicates(table, sql, conds, &mut params)?;
            let mut count = 0;
            for row in table.rows.iter_mut() {
                if preds.iter().all(|p| p.matches(row)) {
                    for (i, value) in &assignments {
                        row[*i] = value.clone();
                    }
                    count += 1;
                }
            }
            Ok(Outcome::Updated(count))
        }
        Op::Delete { conds, .. } => {
            let preds = predicates(table, sql, conds, &mut params)?;
            let before = table.rows.len();
            table.rows.retain(|row| !preds.iter().all(|p| p.matches(row)));
            Ok(Outcome::Updated((before - table.rows.len()) as u64))
        }
        Op::Count { conds, .. } => {
            let preds = predicates(table, sql, conds, &mut params)?;
            let count = table
                .rows
                .iter()
                .filter(|row| preds.iter().all(|p| p.matches(row)))
                .count();
            Ok(Outcome::Rows(vec![DbRow::new(
                vec!["count".to_string()],
                vec![DbValue::Integer(count as i64)],
            )]))
        }
        Op::Select { columns, conds, .. } => {
            let indexes = columns
                .iter()
                .map(|c| column_index(table, sql, c))
                .collect::<dbtester_db::Result<Vec<_>>>()?;
            let preds = predicates(table, sql, conds, &mut params)?;
            let rows = table
                .rows
                .iter()
                .filter(|row| preds.iter().all(|p| p.matches(row)))
                .map(|row| {
                    DbRow::new(
                        columns.clone(),
                        indexes.iter().map(|i| row[*i].clone()).collect(),
                    )
                })
                .collect();
            Ok(Outcome::Rows(rows))
        }
    }
}
