//! Table shape, read from driver metadata and cached per table name.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use dbtester_db::{DataSource, DatabaseMetadata, DbError, SqlType};
use tracing::{debug, warn};

use crate::error::{Result, TesterError};
use crate::flavor::DbFlavor;
use crate::name::TableFQName;

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbColumnMetadata {
    name: String,
    sql_type: SqlType,
    primary_key: bool,
    nullable: bool,
}

impl DbColumnMetadata {
    pub fn new(name: impl Into<String>, sql_type: SqlType, primary_key: bool, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Columns of one table, in ordinal order.
#[derive(Debug)]
pub struct DbTableMetadata {
    name: TableFQName,
    columns: Vec<DbColumnMetadata>,
    index: HashMap<String, usize>,
    primary_key: OnceLock<Vec<DbColumnMetadata>>,
}

impl DbTableMetadata {
    /// Fails if two columns share a name.
    pub fn new(name: TableFQName, columns: Vec<DbColumnMetadata>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), i).is_some() {
                return Err(TesterError::invalid_argument(format!(
                    "Duplicate column name '{}' in table '{}'",
                    column.name, name
                )));
            }
        }
        Ok(Self {
            name,
            columns,
            index,
            primary_key: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &TableFQName {
        &self.name
    }

    pub fn columns(&self) -> &[DbColumnMetadata] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Primary key columns in table order.
    pub fn primary_key(&self) -> &[DbColumnMetadata] {
        self.primary_key.get_or_init(|| {
            self.columns
                .iter()
                .filter(|c| c.primary_key)
                .cloned()
                .collect()
        })
    }

    /// Position of a column by name.
    ///
    /// Exact match wins; otherwise a unique case-insensitive match is
    /// accepted, since many databases fold unquoted identifiers.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.index.get(name) {
            return Some(*i);
        }
        let mut matches = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(i, _)| i);
        match (matches.next(), matches.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }

    pub fn column(&self, name: &str) -> Result<&DbColumnMetadata> {
        self.column_index(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| {
                TesterError::invalid_argument(format!(
                    "No such column '{}' in table '{}'",
                    name, self.name
                ))
            })
    }

    /// Resolve a list of column names. The list must be non-empty.
    pub fn columns_named<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<DbColumnMetadata>> {
        if names.is_empty() {
            return Err(TesterError::invalid_argument(format!(
                "No columns specified for table '{}'",
                self.name
            )));
        }
        names
            .iter()
            .map(|n| self.column(n.as_ref()).cloned())
            .collect()
    }
}

/// Flavor and table metadata for one data source, loaded lazily.
///
/// Concurrent first lookups of the same table may both hit the database;
/// the first result stored is kept.
pub struct DbMetadata {
    data_source: Arc<dyn DataSource>,
    flavor: OnceLock<DbFlavor>,
    tables: RwLock<HashMap<TableFQName, Arc<DbTableMetadata>>>,
}

impl DbMetadata {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self {
            data_source,
            flavor: OnceLock::new(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// The database flavor, resolved on first use.
    pub fn flavor(&self) -> Result<&DbFlavor> {
        if let Some(flavor) = self.flavor.get() {
            return Ok(flavor);
        }
        let resolve = || -> dbtester_db::Result<DbFlavor> {
            let mut conn = self.data_source.connection()?;
            let metadata = conn.metadata()?;
            DbFlavor::resolve(&*metadata)
        };
        let resolved = resolve().map_err(TesterError::Flavor)?;
        Ok(self.flavor.get_or_init(|| resolved))
    }

    /// Parse a dotted table name using the flavor's catalog/schema support.
    pub fn parse_table_name(&self, name: &str) -> Result<TableFQName> {
        let flavor = self.flavor()?;
        Ok(TableFQName::parse(
            name,
            flavor.supports_catalogs(),
            flavor.supports_schemas(),
        ))
    }

    /// Metadata for a table given as a dotted name.
    pub fn get_table(&self, name: &str) -> Result<Arc<DbTableMetadata>> {
        let fq_name = self.parse_table_name(name)?;
        self.get_table_fq(&fq_name)
    }

    pub fn get_table_fq(&self, name: &TableFQName) -> Result<Arc<DbTableMetadata>> {
        if let Some(table) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(table));
        }

        let loaded = Arc::new(self.load_table(name)?);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(tables.entry(name.clone()).or_insert(loaded)))
    }

    fn load_table(&self, name: &TableFQName) -> Result<DbTableMetadata> {
        let flavor = self.flavor()?;
        let wrap = |source: DbError| TesterError::Metadata {
            table: name.to_string(),
            source,
        };

        let mut conn = self.data_source.connection().map_err(wrap)?;
        let metadata = conn.metadata().map_err(wrap)?;
        let (catalog, schema, table) = (name.catalog(), name.schema(), name.table());

        let columns = metadata.columns(catalog, schema, table).map_err(wrap)?;
        let primary_keys: HashSet<String> = metadata
            .primary_keys(catalog, schema, table)
            .map_err(wrap)?
            .into_iter()
            .collect();

        if columns.is_empty() {
            check_table_exists(&*metadata, name).map_err(|e| match e {
                TesterError::Db(source) => wrap(source),
                other => other,
            })?;
        }

        let columns = columns
            .into_iter()
            .map(|c| {
                let sql_type = flavor.column_type(c.sql_type, &c.type_name);
                let primary_key = primary_keys.contains(&c.name);
                DbColumnMetadata::new(c.name, sql_type, primary_key, c.nullable)
            })
            .collect::<Vec<_>>();

        debug!(
            table = %name,
            columns = columns.len(),
            primary_key = primary_keys.len(),
            "Loaded table metadata"
        );
        DbTableMetadata::new(name.clone(), columns)
    }
}

fn check_table_exists(metadata: &dyn DatabaseMetadata, name: &TableFQName) -> Result<()> {
    let tables = metadata.tables(name.catalog(), name.schema(), name.table())?;
    if tables.is_empty() {
        return Err(TesterError::NonExistentTable(name.to_string()));
    }
    warn!(table = %name, "Table exists but reports no columns");
    Ok(())
}
