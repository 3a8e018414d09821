use super::finding::{FieldPath, Finding, ValidationError};
use crate::semantic_model::schema::{Field, Presence, Shape, DOCUMENT};
use log::debug;
use serde_yaml::{Mapping, Value};

/// Checks raw document text against the declarative schema.
///
/// Every violation is reported in one pass. On success the parsed YAML
/// tree is returned so it does not need to be parsed again.
pub fn validate_structure(text: &str) -> Result<Value, Vec<Finding>> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| {
        vec![structural(
            FieldPath::root(),
            format!("document is not valid YAML: {}", e),
        )]
    })?;

    let mut findings = Vec::new();
    check(&DOCUMENT, &value, &FieldPath::root(), &mut findings);
    debug!("Structural validation produced {} findings", findings.len());

    if findings.is_empty() {
        Ok(value)
    } else {
        Err(findings)
    }
}

fn structural(path: FieldPath, message: String) -> Finding {
    Finding::blocking(path, ValidationError::Structural { message })
}

fn check(shape: &Shape, value: &Value, path: &FieldPath, findings: &mut Vec<Finding>) {
    match (shape, value) {
        (Shape::Str, Value::String(_)) => {}
        (Shape::NonEmptyStr, Value::String(s)) => {
            if s.trim().is_empty() {
                findings.push(structural(path.clone(), "must not be empty".to_string()));
            }
        }
        (Shape::Name, Value::String(s)) => {
            if s.trim().is_empty() {
                findings.push(structural(path.clone(), "must not be empty".to_string()));
            } else if s.chars().any(char::is_whitespace) {
                findings.push(structural(
                    path.clone(),
                    format!("name '{}' must not contain whitespace", s),
                ));
            }
        }
        (Shape::Bool, Value::Bool(_)) => {}
        (Shape::Int, Value::Number(n)) if n.is_i64() => {}
        (Shape::Int, Value::Number(n)) if n.is_u64() => findings.push(structural(
            path.clone(),
            format!("integer {} is out of range", n),
        )),
        (Shape::Scalar, Value::String(_) | Value::Number(_) | Value::Bool(_)) => {}
        (Shape::Enum(allowed), Value::String(s)) => {
            if !allowed.contains(&s.as_str()) {
                findings.push(structural(
                    path.clone(),
                    format!("'{}' is not one of: {}", s, allowed.join(", ")),
                ));
            }
        }
        (Shape::Seq { item, non_empty }, Value::Sequence(items)) => {
            if *non_empty && items.is_empty() {
                findings.push(structural(
                    path.clone(),
                    "must contain at least one entry".to_string(),
                ));
            }
            for (i, item_value) in items.iter().enumerate() {
                check(item, item_value, &path.index(i), findings);
            }
        }
        (Shape::Map(fields), Value::Mapping(mapping)) => check_mapping(fields, mapping, path, findings),
        (shape, value) => findings.push(structural(
            path.clone(),
            format!("expected {}, found {}", shape.describe(), describe_value(value)),
        )),
    }
}

fn check_mapping(fields: &[Field], mapping: &Mapping, path: &FieldPath, findings: &mut Vec<Finding>) {
    for (key, _) in mapping {
        match key.as_str() {
            Some(name) if fields.iter().any(|f| f.name == name) => {}
            Some(name) => findings.push(structural(
                path.key(name),
                format!("unknown field '{}'", name),
            )),
            None => findings.push(structural(
                path.clone(),
                format!("field names must be strings, found {}", describe_value(key)),
            )),
        }
    }

    for field in fields {
        let field_path = path.key(field.name);
        let value = mapping.get(field.name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if field.presence == Presence::Required {
                findings.push(structural(
                    field_path,
                    format!("missing required field '{}'", field.name),
                ));
            }
            continue;
        };

        if let Some(gate) = field.only_when {
            let discriminator = mapping.get(gate.discriminator).and_then(Value::as_str);
            // An absent or invalid discriminator is already reported on its own
            if let Some(current) = discriminator {
                if gate.values.contains(&current) {
                    check(field.shape, value, &field_path, findings);
                } else if field_is_known_literal(fields, gate.discriminator, current) {
                    findings.push(structural(
                        field_path,
                        format!(
                            "'{}' is only allowed when {} is one of: {}",
                            field.name,
                            gate.discriminator,
                            gate.values.join(", ")
                        ),
                    ));
                }
                continue;
            }
        }

        check(field.shape, value, &field_path, findings);
    }

    check_layouts(fields, mapping, path, findings);
}

/// A mapping with alternative layouts must use exactly one of them, and
/// the one it uses must hold at least one entry
fn check_layouts(fields: &[Field], mapping: &Mapping, path: &FieldPath, findings: &mut Vec<Finding>) {
    let layout_fields: Vec<(&Field, &str)> = fields
        .iter()
        .filter_map(|f| match f.presence {
            Presence::Layout(layout) => Some((f, layout)),
            _ => None,
        })
        .collect();
    let Some((first, _)) = layout_fields.first() else {
        return;
    };

    let present: Vec<(&Field, &str, &Value)> = layout_fields
        .iter()
        .filter_map(|(f, layout)| {
            mapping
                .get(f.name)
                .filter(|v| !v.is_null())
                .map(|v| (*f, *layout, v))
        })
        .collect();

    let Some((_, used, _)) = present.first().copied() else {
        let names: Vec<&str> = layout_fields.iter().map(|(f, _)| f.name).collect();
        findings.push(structural(
            path.key(first.name),
            format!("missing required field, expected one of: {}", names.join(", ")),
        ));
        return;
    };

    for (field, _, _) in present.iter().filter(|(_, layout, _)| *layout != used) {
        findings.push(structural(
            path.key(field.name),
            format!("'{}' cannot be combined with {}", field.name, used),
        ));
    }

    let in_use: Vec<&(&Field, &str, &Value)> =
        present.iter().filter(|(_, layout, _)| *layout == used).collect();
    let all_empty = in_use
        .iter()
        .all(|(_, _, v)| v.as_sequence().is_some_and(|items| items.is_empty()));
    if all_empty {
        findings.push(structural(
            path.key(in_use[0].0.name),
            "must contain at least one entry".to_string(),
        ));
    }
}

fn field_is_known_literal(fields: &[Field], name: &str, literal: &str) -> bool {
    fields
        .iter()
        .find(|f| f.name == name)
        .map(|f| match f.shape {
            Shape::Enum(allowed) => allowed.contains(&literal),
            _ => true,
        })
        .unwrap_or(false)
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const VALID: &str = r#"
name: sales
tables:
  - name: orders
    base_table:
      database: db
      schema: public
      table: orders
    columns:
      - name: amount
        kind: measure
        expr: SUM(amt)
        data_type: NUMBER
        default_aggregation: sum
      - name: region
        kind: dimension
        expr: region
        data_type: TEXT
        unique: false
        sample_values: [EU, 1, true]
relationships:
  - name: self_orders
    left_table: orders
    right_table: orders
    relationship_columns:
      - left_column: region
        right_column: region
    join_type: inner
    relationship_type: many_to_many
verified_queries:
  - question: How much?
    sql: SELECT SUM(amt) FROM orders
    verified_at: 1700000000
"#;

    fn paths(findings: &[Finding]) -> Vec<String> {
        findings.iter().map(|f| f.path.to_string()).collect()
    }

    #[test]
    fn test_valid_document() {
        assert!(validate_structure(VALID).is_ok());
    }

    #[test]
    fn test_yaml_syntax_error_is_single_root_finding() {
        let findings = validate_structure("name: [unclosed\n").unwrap_err();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].path.is_root());
    }

    #[rstest]
    #[case::missing_required(
        "name: sales\n",
        vec!["tables"]
    )]
    #[case::unknown_field(
        "name: sales\nowner: me\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT}\n",
        vec!["owner"]
    )]
    #[case::bad_enum(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: fact, expr: a, data_type: TEXT}\n",
        vec!["tables[0].columns[0].kind"]
    )]
    #[case::wrong_type(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT, unique: 'yes'}\n",
        vec!["tables[0].columns[0].unique"]
    )]
    #[case::empty_columns(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns: []\n",
        vec!["tables[0].columns"]
    )]
    #[case::whitespace_in_name(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: order id, kind: dimension, expr: a, data_type: TEXT}\n",
        vec!["tables[0].columns[0].name"]
    )]
    #[case::aggregation_on_dimension(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT, default_aggregation: sum}\n",
        vec!["tables[0].columns[0].default_aggregation"]
    )]
    #[case::unique_on_measure(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: measure, expr: a, data_type: NUMBER, unique: true}\n",
        vec!["tables[0].columns[0].unique"]
    )]
    #[case::float_timestamp(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT}\nverified_queries:\n  - {question: q, sql: SELECT 1, verified_at: 1.5}\n",
        vec!["verified_queries[0].verified_at"]
    )]
    #[case::timestamp_out_of_range(
        "name: sales\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT}\nverified_queries:\n  - {question: q, sql: SELECT 1, verified_at: 18446744073709551615}\n",
        vec!["verified_queries[0].verified_at"]
    )]
    fn test_single_violation(#[case] text: &str, #[case] expected: Vec<&str>) {
        let findings = validate_structure(text).unwrap_err();
        assert_eq!(paths(&findings), expected);
        assert!(findings.iter().all(Finding::is_blocking));
    }

    #[test]
    fn test_reports_every_violation() {
        let text = r#"
name: ""
tables:
  - name: orders
    base_table: {database: db, schema: "", table: orders}
    columns:
      - name: a
        kind: dimension
        data_type: TEXT
relationships:
  - name: r
    left_table: orders
    right_table: orders
    relationship_columns: []
    join_type: sideways
"#;
        let findings = validate_structure(text).unwrap_err();
        assert_eq!(
            paths(&findings),
            vec![
                "name",
                "tables[0].base_table.schema",
                "tables[0].columns[0].expr",
                "relationships[0].relationship_columns",
                "relationships[0].join_type",
                "relationships[0].relationship_type",
            ]
        );
    }

    const KIND_LIST_DOCUMENT: &str = r#"
name: my test semantic model
tables:
  - name: ALIAS
    base_table: {database: AUTOSQL_DATASET_BIRD_V2, schema: ADDRESS, table: ALIAS}
    dimensions:
      - name: ALIAS
        synonyms: ['  ']
        expr: ALIAS
        data_type: TEXT
        unique: false
        sample_values: [Holtsville, Adjuntas]
    time_dimensions:
      - name: CREATED_AT
        expr: CREATED_AT
        data_type: TIMESTAMP
    measures:
      - name: ZIP_CODE
        expr: ZIP_CODE
        data_type: NUMBER
        default_aggregation: count
"#;

    #[test]
    fn test_kind_lists_layout() {
        assert!(validate_structure(KIND_LIST_DOCUMENT).is_ok());
    }

    #[rstest]
    #[case::both_layouts(
        "name: s\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    columns:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT}\n    measures:\n      - {name: b, expr: b, data_type: NUMBER}\n",
        vec!["tables[0].measures"]
    )]
    #[case::no_layout(
        "name: s\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n",
        vec!["tables[0].columns"]
    )]
    #[case::empty_kind_lists(
        "name: s\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    dimensions: []\n    measures: []\n",
        vec!["tables[0].dimensions"]
    )]
    #[case::kind_inside_list(
        "name: s\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    dimensions:\n      - {name: a, kind: dimension, expr: a, data_type: TEXT}\n",
        vec!["tables[0].dimensions[0].kind"]
    )]
    #[case::aggregation_in_dimensions(
        "name: s\ntables:\n  - name: t\n    base_table: {database: d, schema: s, table: t}\n    dimensions:\n      - {name: a, expr: a, data_type: TEXT, default_aggregation: sum}\n",
        vec!["tables[0].dimensions[0].default_aggregation"]
    )]
    fn test_table_layout_violations(#[case] text: &str, #[case] expected: Vec<&str>) {
        let findings = validate_structure(text).unwrap_err();
        assert_eq!(paths(&findings), expected);
    }

    #[test]
    fn test_root_must_be_mapping() {
        let findings = validate_structure("- a\n- b\n").unwrap_err();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "expected a mapping, found a sequence");
    }
}
