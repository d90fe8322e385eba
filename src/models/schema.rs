use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub name: String,
    pub schema_name: String,
}

/// Tables of one schema, as returned by a catalog listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableCatalog {
    schema_name: String,
    tables: Vec<TableInfo>,
}

impl TableCatalog {
    pub(crate) fn from_listing(schema_name: impl Into<String>, tables: Vec<TableInfo>) -> Self {
        TableCatalog {
            schema_name: schema_name.into(),
            tables,
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Look a pair up in the listing. Only a hit yields a `TableRef`.
    pub fn resolve(&self, schema_name: &str, table_name: &str) -> Option<TableRef> {
        if schema_name != self.schema_name {
            return None;
        }
        self.tables
            .iter()
            .find(|t| t.name == table_name)
            .map(|t| TableRef {
                schema_name: t.schema_name.clone(),
                table_name: t.name.clone(),
            })
    }
}

/// A schema/table pair that came out of a catalog listing.
///
/// There is no public constructor: identifiers substituted into preview SQL
/// never originate from free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    schema_name: String,
    table_name: String,
}

impl TableRef {
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// `"schema"."table"` with embedded quotes doubled.
    pub fn quoted(&self) -> String {
        format!(
            "\"{}\".\"{}\"",
            self.schema_name.replace('"', "\"\""),
            self.table_name.replace('"', "\"\"")
        )
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}
