use super::schema::{canonicalize, DOCUMENT, KIND_LISTS};
use super::SemanticDocument;
use log::debug;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerdeError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("table '{table}': {message}")]
    TableLayout { table: String, message: String },
}

/// Writes the canonical YAML text of a document
pub fn serialize(document: &SemanticDocument) -> Result<String, SerdeError> {
    let value = serde_yaml::to_value(document)?;
    Ok(serde_yaml::to_string(&canonicalize(&DOCUMENT, value))?)
}

pub fn deserialize(text: &str) -> Result<SemanticDocument, SerdeError> {
    let value: Value = serde_yaml::from_str(text)?;
    from_value(value)
}

/// Lifts an already parsed YAML tree into the model. Tables written with
/// per-kind `dimensions`/`time_dimensions`/`measures` lists come out with
/// the same `columns` a flat table would have.
pub fn from_value(mut value: Value) -> Result<SemanticDocument, SerdeError> {
    if let Some(tables) = value.get_mut("tables").and_then(Value::as_sequence_mut) {
        for table in tables.iter_mut().filter_map(Value::as_mapping_mut) {
            lift_kind_lists(table)?;
        }
    }
    Ok(serde_yaml::from_value(canonicalize(&DOCUMENT, value))?)
}

fn lift_kind_lists(table: &mut Mapping) -> Result<(), SerdeError> {
    let table_name = table
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let layout_error = |message: String| SerdeError::TableLayout {
        table: table_name.clone(),
        message,
    };

    let mut lifted = Vec::new();
    let mut uses_kind_lists = false;
    for (list, kind) in KIND_LISTS {
        let entries = match table.shift_remove(*list) {
            None | Some(Value::Null) => continue,
            Some(Value::Sequence(entries)) => entries,
            Some(_) => return Err(layout_error(format!("'{}' must be a sequence", list))),
        };
        uses_kind_lists = true;

        for entry in entries {
            let Value::Mapping(mut entry) = entry else {
                return Err(layout_error(format!("entries of '{}' must be mappings", list)));
            };
            if entry.contains_key("kind") {
                return Err(layout_error(format!("entries of '{}' must not set 'kind'", list)));
            }
            entry.insert(Value::from("kind"), Value::from(*kind));
            lifted.push(Value::Mapping(entry));
        }
    }

    if !uses_kind_lists {
        return Ok(());
    }
    if table.get("columns").is_some_and(|columns| !columns.is_null()) {
        return Err(layout_error(
            "defines both columns and dimensions/time_dimensions/measures".to_string(),
        ));
    }
    debug!(
        "Lifted {} per-kind entries of table '{}' into columns",
        lifted.len(),
        table_name
    );
    table.insert(Value::from("columns"), Value::Sequence(lifted));
    Ok(())
}
