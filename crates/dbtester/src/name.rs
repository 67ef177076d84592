//! Fully-qualified table names.

use std::fmt;

/// A table identified by optional catalog and schema plus its name.
///
/// Equality is component-wise. Names are kept exactly as given: no quote
/// stripping and no case folding, so `"T"` and `t` are different names even
/// when they denote the same table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableFQName {
    catalog: Option<String>,
    schema: Option<String>,
    table: String,
}

impl TableFQName {
    pub fn new(catalog: Option<String>, schema: Option<String>, table: impl Into<String>) -> Self {
        Self {
            catalog,
            schema,
            table: table.into(),
        }
    }

    pub fn for_name(table: impl Into<String>) -> Self {
        Self::new(None, None, table)
    }

    pub fn for_schema_and_name(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(None, Some(schema.into()), table)
    }

    /// Parse a dotted name according to what the database supports.
    ///
    /// A two-part name prefers `schema.table` and falls back to
    /// `catalog.table`. A three-part name needs both catalogs and schemas.
    /// Anything that does not fit is kept verbatim as a single table name.
    /// Quoted segments containing dots are not understood.
    pub fn parse(name: &str, supports_catalogs: bool, supports_schemas: bool) -> Self {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [schema, table] if supports_schemas => Self::for_schema_and_name(*schema, *table),
            [catalog, table] if supports_catalogs => {
                Self::new(Some((*catalog).to_string()), None, *table)
            }
            [catalog, schema, table] if supports_catalogs && supports_schemas => Self::new(
                Some((*catalog).to_string()),
                Some((*schema).to_string()),
                *table,
            ),
            _ => Self::for_name(name),
        }
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableFQName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{}.", catalog)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.table)
    }
}
