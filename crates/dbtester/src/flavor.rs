//! Vendor dialect detection: identifier quoting, catalog/schema support and
//! column type normalization.

use dbtester_db::{DatabaseMetadata, SqlType};
use tracing::debug;

use crate::name::TableFQName;

/// Vendor family, detected from the driver's product name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlavorKind {
    Generic,
    MySql,
    Postgres,
    Derby,
}

impl FlavorKind {
    /// Case-insensitive substring match on the product name.
    pub fn from_product_name(product: Option<&str>) -> Self {
        let Some(product) = product else {
            return Self::Generic;
        };
        let product = product.to_ascii_uppercase();
        if product.contains("MYSQL") || product.contains("MARIADB") {
            Self::MySql
        } else if product.contains("POSTGRESQL") {
            Self::Postgres
        } else if product.contains("APACHE DERBY") {
            Self::Derby
        } else {
            Self::Generic
        }
    }

    /// Fixed `(catalogs, schemas)` support, or `None` to trust the driver.
    fn name_support(&self) -> Option<(bool, bool)> {
        match self {
            Self::MySql => Some((true, false)),
            Self::Postgres | Self::Derby => Some((false, true)),
            Self::Generic => None,
        }
    }
}

/// Dialect behavior of one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbFlavor {
    kind: FlavorKind,
    identifier_quote: String,
    supports_catalogs: bool,
    supports_schemas: bool,
    supports_batch_updates: bool,
}

impl DbFlavor {
    /// Build a flavor from driver metadata.
    pub fn resolve(metadata: &dyn DatabaseMetadata) -> dbtester_db::Result<Self> {
        let product = metadata.product_name()?;
        let kind = FlavorKind::from_product_name(product.as_deref());
        let (supports_catalogs, supports_schemas) = match kind.name_support() {
            Some(support) => support,
            None => (
                metadata.supports_catalogs_in_table_definitions()?,
                metadata.supports_schemas_in_table_definitions()?,
            ),
        };

        let flavor = Self {
            kind,
            identifier_quote: metadata.identifier_quote()?,
            supports_catalogs,
            supports_schemas,
            supports_batch_updates: metadata.supports_batch_updates()?,
        };
        debug!(
            product = product.as_deref().unwrap_or("unknown"),
            kind = ?flavor.kind,
            "Resolved database flavor"
        );
        Ok(flavor)
    }

    /// A flavor with explicit settings.
    pub fn new(
        kind: FlavorKind,
        identifier_quote: impl Into<String>,
        supports_catalogs: bool,
        supports_schemas: bool,
        supports_batch_updates: bool,
    ) -> Self {
        Self {
            kind,
            identifier_quote: identifier_quote.into(),
            supports_catalogs,
            supports_schemas,
            supports_batch_updates,
        }
    }

    pub fn kind(&self) -> FlavorKind {
        self.kind
    }

    pub fn identifier_quote(&self) -> &str {
        &self.identifier_quote
    }

    pub fn supports_catalogs(&self) -> bool {
        self.supports_catalogs
    }

    pub fn supports_schemas(&self) -> bool {
        self.supports_schemas
    }

    pub fn supports_batch_updates(&self) -> bool {
        self.supports_batch_updates
    }

    /// Drivers report a single space when identifier quoting is unsupported.
    pub fn should_quote_identifiers(&self) -> bool {
        !self.identifier_quote.is_empty() && self.identifier_quote != " "
    }

    /// Correct a column type reported by the driver.
    ///
    /// Some Postgres drivers report `timestamptz`/`timetz` columns as plain
    /// timestamp/time, losing the zone.
    pub fn column_type(&self, sql_type: SqlType, native_type: &str) -> SqlType {
        match self.kind {
            FlavorKind::Postgres => {
                if native_type.eq_ignore_ascii_case("timestamptz") {
                    SqlType::TimestampWithTimezone
                } else if native_type.eq_ignore_ascii_case("timetz") {
                    SqlType::TimeWithTimezone
                } else {
                    sql_type
                }
            }
            FlavorKind::Generic | FlavorKind::MySql | FlavorKind::Derby => sql_type,
        }
    }

    /// Quote one identifier, doubling embedded quote characters.
    pub fn quote(&self, identifier: &str) -> String {
        if !self.should_quote_identifiers() {
            return identifier.to_string();
        }
        let q = &self.identifier_quote;
        let escaped = identifier.replace(q.as_str(), &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Quote each present component of a table name.
    pub fn quote_table(&self, name: &TableFQName) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(catalog) = name.catalog() {
            parts.push(self.quote(catalog));
        }
        if let Some(schema) = name.schema() {
            parts.push(self.quote(schema));
        }
        parts.push(self.quote(name.table()));
        parts.join(".")
    }
}
