pub mod introspection;

use crate::config::ValidatorConfig;
use crate::dialect::physical_type::{normalize_data_type, TypeClass};
use crate::semantic_model::codec::{self, SerdeError};
use crate::semantic_model::{BaseTableRef, Column, ColumnKind, SemanticDocument, Table};
use introspection::{IntrospectedColumn, IntrospectionError, Introspector};
use log::{info, warn};
use thiserror::Error;

/// Value left in fields a person still has to fill in
pub const PLACEHOLDER: &str = "  ";
/// Comment appended to rendered lines holding a placeholder
pub const FILL_OUT_TOKEN: &str = " # <FILL-OUT>";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("At least one table is required")]
    NoTables,

    #[error("Table {0} has no columns of a supported type")]
    NoUsableColumns(String),

    #[error(transparent)]
    Serde(#[from] SerdeError),
}

/// Drafts a document from physical metadata, one table at a time.
///
/// Column kinds follow the physical type: temporal columns become time
/// dimensions, numeric columns measures and everything else dimensions.
/// Semi-structured columns are left out. Descriptions without a source
/// comment and all synonyms are placeholders.
pub fn generate_document(
    name: &str,
    tables: &[BaseTableRef],
    introspector: &dyn Introspector,
    config: &ValidatorConfig,
) -> Result<SemanticDocument, GenerateError> {
    if tables.is_empty() {
        return Err(GenerateError::NoTables);
    }

    let mut generated = Vec::with_capacity(tables.len());
    for base_table in tables {
        let introspected = introspector.describe_table(base_table)?;
        let columns: Vec<Column> = introspected
            .columns
            .iter()
            .filter_map(|column| generate_column(base_table, column, config))
            .collect();
        if columns.is_empty() {
            return Err(GenerateError::NoUsableColumns(base_table.to_string()));
        }

        info!(
            "Generated {} columns for table {}",
            columns.len(),
            base_table
        );
        generated.push(Table {
            name: to_snake_case(&base_table.table),
            description: Some(or_placeholder(introspected.comment.as_deref())),
            synonyms: vec![PLACEHOLDER.to_string()],
            base_table: introspected.base_table,
            primary_key: None,
            columns,
            filters: Vec::new(),
        });
    }

    Ok(SemanticDocument {
        name: name.to_string(),
        description: None,
        tables: generated,
        relationships: Vec::new(),
        verified_queries: Vec::new(),
        custom_instructions: None,
    })
}

fn generate_column(
    table: &BaseTableRef,
    column: &IntrospectedColumn,
    config: &ValidatorConfig,
) -> Option<Column> {
    let data_type = normalize_data_type(&column.data_type);
    let kind = match config.dialect.mapping().classify_type(&data_type) {
        Some(TypeClass::Temporal) => ColumnKind::TimeDimension { unique: false },
        Some(TypeClass::Numeric) => ColumnKind::Measure {
            default_aggregation: None,
        },
        Some(TypeClass::Text | TypeClass::Boolean) => ColumnKind::Dimension { unique: false },
        Some(TypeClass::Object) => {
            warn!(
                "Skipping column {}.{} of unsupported type {}",
                table, column.name, data_type
            );
            return None;
        }
        None => {
            warn!(
                "Column {}.{} has unrecognized type {}, treating it as a dimension",
                table, column.name, data_type
            );
            ColumnKind::Dimension { unique: false }
        }
    };

    let expr = if is_plain_identifier(&column.name) {
        column.name.clone()
    } else {
        format!("\"{}\"", column.name.replace('"', "\"\""))
    };

    Some(Column {
        name: to_snake_case(&column.name),
        description: Some(or_placeholder(column.comment.as_deref())),
        synonyms: vec![PLACEHOLDER.to_string()],
        kind,
        expr,
        data_type,
        sample_values: column
            .sample_values
            .iter()
            .take(config.max_sample_values)
            .cloned()
            .collect(),
    })
}

fn or_placeholder(comment: Option<&str>) -> String {
    match comment {
        Some(comment) if !comment.trim().is_empty() => comment.trim().to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `Gross Amount` -> `gross_amount`
pub fn to_snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            snake.extend(c.to_lowercase());
        } else if !snake.ends_with('_') {
            snake.push('_');
        }
    }
    snake.trim_matches('_').to_string()
}

/// Canonical text with a fill-out marker on every line that still holds a
/// placeholder
pub fn render_with_placeholders(document: &SemanticDocument) -> Result<String, SerdeError> {
    let text = codec::serialize(document)?;
    let quoted = [format!("'{}'", PLACEHOLDER), format!("\"{}\"", PLACEHOLDER)];

    let mut rendered = String::with_capacity(text.len());
    for line in text.lines() {
        rendered.push_str(line);
        if quoted.iter().any(|q| line.ends_with(q.as_str())) {
            rendered.push_str(FILL_OUT_TOKEN);
        }
        rendered.push('\n');
    }
    Ok(rendered)
}
