use crate::semantic_model::BaseTableRef;
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Physical description of a table as reported by the database
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectedTable {
    pub base_table: BaseTableRef,
    pub comment: Option<String>,
    pub columns: Vec<IntrospectedColumn>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntrospectedColumn {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Distinct values, already bounded by the source
    #[serde(default, deserialize_with = "json_scalars")]
    pub sample_values: Vec<String>,
}

#[derive(Error, Debug)]
pub enum IntrospectionError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog format: {0}")]
    InvalidCatalog(#[from] serde_json::Error),
}

/// Source of physical table metadata. Implementations talk to a database
/// or, for offline use, read an exported catalog.
pub trait Introspector {
    fn describe_table(&self, table: &BaseTableRef) -> Result<IntrospectedTable, IntrospectionError>;
}

/// Catalog exported as JSON:
///
/// ```json
/// {"tables": [{"name": "db.schema.orders", "comment": "...",
///              "columns": [{"name": "ID", "data_type": "NUMBER(38,0)"}]}]}
/// ```
pub struct JsonCatalogIntrospector {
    tables: HashMap<String, IntrospectedTable>,
}

#[derive(Deserialize)]
struct Catalog {
    tables: Vec<CatalogTable>,
}

#[derive(Deserialize)]
struct CatalogTable {
    name: String,
    #[serde(default)]
    comment: Option<String>,
    columns: Vec<IntrospectedColumn>,
}

impl JsonCatalogIntrospector {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IntrospectionError> {
        let contents = fs::read_to_string(path.as_ref())?;
        debug!("Loaded introspection catalog from {}", path.as_ref().display());
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, IntrospectionError> {
        let catalog: Catalog = serde_json::from_str(contents)?;
        let mut tables = HashMap::new();
        for table in catalog.tables {
            let base_table = BaseTableRef::from_str(&table.name)
                .map_err(|_| IntrospectionError::InvalidTableName(table.name.clone()))?;
            tables.insert(
                catalog_key(&base_table),
                IntrospectedTable {
                    base_table,
                    comment: table.comment,
                    columns: table.columns,
                },
            );
        }
        Ok(JsonCatalogIntrospector { tables })
    }
}

// catalogs differ in identifier case, match on the upper-cased name
fn catalog_key(table: &BaseTableRef) -> String {
    table.to_string().to_uppercase()
}

impl Introspector for JsonCatalogIntrospector {
    fn describe_table(&self, table: &BaseTableRef) -> Result<IntrospectedTable, IntrospectionError> {
        self.tables
            .get(&catalog_key(table))
            .cloned()
            .ok_or_else(|| IntrospectionError::TableNotFound(table.to_string()))
    }
}

fn json_scalars<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            // null and nested values make poor samples
            _ => None,
        })
        .collect())
}
