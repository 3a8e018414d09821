use super::finding::{FieldPath, Finding, ValidationError};
use crate::config::ValidatorConfig;
use crate::dialect::physical_type::TypeClass;
use crate::dialect::DialectMapping;
use crate::expression::{ExpressionParser, QueryError};
use crate::semantic_model::{Aggregation, ColumnKind, SemanticDocument, Table};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Cross-referential and domain checks over a well-shaped document.
///
/// Every check runs and all findings are returned in check order; the
/// document is never modified, so repeated runs give identical output.
pub fn validate_semantics(document: &SemanticDocument, config: &ValidatorConfig) -> Vec<Finding> {
    let parser = ExpressionParser::new(config.dialect);
    let mapping = config.dialect.mapping();
    let mut findings = Vec::new();

    check_names(document, &mut findings);
    check_expressions(document, &parser, &mut findings);
    check_relationships(document, config, mapping, &mut findings);
    check_verified_queries(document, &parser, &mut findings);
    check_data_types(document, config, mapping, &mut findings);
    check_placeholders(document, &mut findings);

    debug!(
        "Semantic validation of '{}' produced {} findings",
        document.name,
        findings.len()
    );
    findings
}

fn normalize_name(value: &str) -> String {
    value.trim().to_lowercase()
}

fn qualified(table: &Table, name: &str) -> String {
    format!("{}.{}", table.name, name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Tables,
    /// Columns and filters of one table
    TableMembers(usize),
}

impl Scope {
    /// Table names share a namespace with every column and filter; members
    /// of two different tables do not clash
    fn overlaps(self, other: Scope) -> bool {
        match (self, other) {
            (Scope::TableMembers(a), Scope::TableMembers(b)) => a == b,
            _ => true,
        }
    }
}

struct NameEntry {
    key: String,
    value: String,
    label: String,
    path: FieldPath,
    scope: Scope,
    owner: usize,
    is_synonym: bool,
}

struct NameRegistry {
    entries: Vec<NameEntry>,
    next_owner: usize,
}

impl NameRegistry {
    fn new() -> Self {
        NameRegistry {
            entries: Vec::new(),
            next_owner: 0,
        }
    }

    fn register(&mut self, label: String, name: &str, synonyms: &[String], path: &FieldPath, scope: Scope) {
        let owner = self.next_owner;
        self.next_owner += 1;

        self.entries.push(NameEntry {
            key: normalize_name(name),
            value: name.trim().to_string(),
            label: label.clone(),
            path: path.key("name"),
            scope,
            owner,
            is_synonym: false,
        });
        for (i, synonym) in synonyms.iter().enumerate() {
            // Blank synonyms are placeholders, reported separately
            if synonym.trim().is_empty() {
                continue;
            }
            self.entries.push(NameEntry {
                key: normalize_name(synonym),
                value: synonym.trim().to_string(),
                label: label.clone(),
                path: path.key("synonyms").index(i),
                scope,
                owner,
                is_synonym: true,
            });
        }
    }
}

/// Names clash when their scopes overlap; synonyms clash with everything
fn check_names(document: &SemanticDocument, findings: &mut Vec<Finding>) {
    let mut registry = NameRegistry::new();
    let tables_path = FieldPath::root().key("tables");

    for (t, table) in document.tables.iter().enumerate() {
        let table_path = tables_path.index(t);
        registry.register(
            format!("table '{}'", table.name),
            &table.name,
            &table.synonyms,
            &table_path,
            Scope::Tables,
        );
        for (c, column) in table.columns.iter().enumerate() {
            registry.register(
                format!("column '{}'", qualified(table, &column.name)),
                &column.name,
                &column.synonyms,
                &table_path.key("columns").index(c),
                Scope::TableMembers(t),
            );
        }
        for (f, filter) in table.filters.iter().enumerate() {
            registry.register(
                format!("filter '{}'", qualified(table, &filter.name)),
                &filter.name,
                &filter.synonyms,
                &table_path.key("filters").index(f),
                Scope::TableMembers(t),
            );
        }
    }

    let mut seen: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, entry) in registry.entries.iter().enumerate() {
        let earlier = seen.entry(entry.key.as_str()).or_default();
        for &j in earlier.iter() {
            let first = &registry.entries[j];
            if first.owner == entry.owner {
                findings.push(Finding::advisory(
                    entry.path.clone(),
                    format!(
                        "synonym '{}' repeats a name or synonym of {}",
                        entry.value, entry.label
                    ),
                ));
                break;
            }
            let clashes = entry.is_synonym || first.is_synonym || first.scope.overlaps(entry.scope);
            if clashes {
                findings.push(Finding::blocking(
                    entry.path.clone(),
                    ValidationError::DuplicateName {
                        field: if entry.is_synonym { "synonym" } else { "name" }.to_string(),
                        value: entry.value.clone(),
                        first: first.label.clone(),
                        second: entry.label.clone(),
                    },
                ));
                break;
            }
        }
        earlier.push(i);
    }
}

fn check_expressions(document: &SemanticDocument, parser: &ExpressionParser, findings: &mut Vec<Finding>) {
    let tables_path = FieldPath::root().key("tables");

    for (t, table) in document.tables.iter().enumerate() {
        for (c, column) in table.columns.iter().enumerate() {
            let column_path = tables_path.index(t).key("columns").index(c);
            let parsed = match parser.parse(&column.expr) {
                Ok(parsed) => parsed,
                Err(e) => {
                    findings.push(Finding::blocking(
                        column_path.key("expr"),
                        ValidationError::ExpressionSyntax(e),
                    ));
                    continue;
                }
            };

            match column.kind {
                ColumnKind::Dimension { unique } | ColumnKind::TimeDimension { unique } => {
                    if parsed.has_aggregate {
                        findings.push(Finding::blocking(
                            column_path.key("expr"),
                            ValidationError::InvalidAggregation {
                                column: qualified(table, &column.name),
                                message: format!(
                                    "{} expressions must not contain an aggregate function",
                                    column.kind.tag()
                                ),
                            },
                        ));
                    }
                    if unique && !parsed.is_bare_column {
                        findings.push(Finding::advisory(
                            column_path.key("unique"),
                            format!(
                                "'{}' is not a bare column, uniqueness cannot be checked and is taken as declared",
                                column.expr
                            ),
                        ));
                    }
                }
                ColumnKind::Measure {
                    default_aggregation,
                }
                | ColumnKind::Metric {
                    default_aggregation,
                } => {
                    if let (true, Some(aggregation)) = (parsed.has_aggregate, default_aggregation) {
                        findings.push(Finding::advisory(
                            column_path.key("default_aggregation"),
                            format!(
                                "'{}' already aggregates, default_aggregation '{}' would be applied on top of it",
                                column.expr, aggregation
                            ),
                        ));
                    }
                }
            }
        }

        for (f, filter) in table.filters.iter().enumerate() {
            let expr_path = tables_path.index(t).key("filters").index(f).key("expr");
            match parser.parse(&filter.expr) {
                Err(e) => findings.push(Finding::blocking(
                    expr_path,
                    ValidationError::ExpressionSyntax(e),
                )),
                Ok(parsed) if parsed.has_aggregate => findings.push(Finding::blocking(
                    expr_path,
                    ValidationError::InvalidAggregation {
                        column: qualified(table, &filter.name),
                        message: "filter expressions must not contain an aggregate function"
                            .to_string(),
                    },
                )),
                Ok(_) => {}
            }
        }
    }
}

/// Folded column names of a table, as the engine would resolve them
fn column_index(table: &Table, mapping: &dyn DialectMapping) -> HashSet<String> {
    table
        .columns
        .iter()
        .map(|c| mapping.fold_name(&c.name))
        .collect()
}

fn check_relationships(
    document: &SemanticDocument,
    config: &ValidatorConfig,
    mapping: &dyn DialectMapping,
    findings: &mut Vec<Finding>,
) {
    let tables: HashMap<String, (&Table, HashSet<String>)> = document
        .tables
        .iter()
        .map(|t| (mapping.fold_name(&t.name), (t, column_index(t, mapping))))
        .collect();

    let missing = |entity_type: &str, entity_name: &str, reference_type: &str, reference_name: String| {
        ValidationError::Referential {
            entity_type: entity_type.to_string(),
            entity_name: entity_name.to_string(),
            reference_type: reference_type.to_string(),
            reference_name,
        }
    };

    for (t, table) in document.tables.iter().enumerate() {
        let Some(primary_key) = &table.primary_key else {
            continue;
        };
        let columns = column_index(table, mapping);
        for (k, column) in primary_key.columns.iter().enumerate() {
            if !columns.contains(&mapping.fold_name(column)) {
                findings.push(Finding::blocking(
                    FieldPath::root()
                        .key("tables")
                        .index(t)
                        .key("primary_key")
                        .key("columns")
                        .index(k),
                    missing("table", &table.name, "column", column.clone()),
                ));
            }
        }
    }

    let relationships_path = FieldPath::root().key("relationships");
    let mut names: HashMap<String, &str> = HashMap::new();

    for (r, relationship) in document.relationships.iter().enumerate() {
        let path = relationships_path.index(r);

        if let Some(first) = names.get(&normalize_name(&relationship.name)) {
            findings.push(Finding::blocking(
                path.key("name"),
                ValidationError::DuplicateName {
                    field: "relationship name".to_string(),
                    value: relationship.name.clone(),
                    first: format!("relationship '{}'", first),
                    second: format!("relationship '{}'", relationship.name),
                },
            ));
        } else {
            names.insert(normalize_name(&relationship.name), &relationship.name);
        }

        let left_key = mapping.fold_name(&relationship.left_table);
        let right_key = mapping.fold_name(&relationship.right_table);
        let left = tables.get(&left_key);
        let right = tables.get(&right_key);

        if left.is_none() {
            findings.push(Finding::blocking(
                path.key("left_table"),
                missing("relationship", &relationship.name, "table", relationship.left_table.clone()),
            ));
        }
        if right.is_none() {
            findings.push(Finding::blocking(
                path.key("right_table"),
                missing("relationship", &relationship.name, "table", relationship.right_table.clone()),
            ));
        }
        if left.is_some() && left_key == right_key && !config.allow_self_join {
            findings.push(Finding::blocking(
                path.key("right_table"),
                ValidationError::SelfJoinNotAllowed {
                    relationship: relationship.name.clone(),
                    table: relationship.right_table.clone(),
                },
            ));
        }

        for (k, key) in relationship.relationship_columns.iter().enumerate() {
            let key_path = path.key("relationship_columns").index(k);
            let sides = [
                (left, &relationship.left_table, &key.left_column, "left_column"),
                (right, &relationship.right_table, &key.right_column, "right_column"),
            ];
            for (resolved, table_name, column, field) in sides {
                // An unknown table is already reported once above
                let Some((_, columns)) = resolved else {
                    continue;
                };
                if !columns.contains(&mapping.fold_name(column)) {
                    findings.push(Finding::blocking(
                        key_path.key(field),
                        missing(
                            "relationship",
                            &relationship.name,
                            "column",
                            format!("{}.{}", table_name, column),
                        ),
                    ));
                }
            }
        }
    }
}

/// Case and whitespace insensitive form used to spot duplicate queries
fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn check_verified_queries(
    document: &SemanticDocument,
    parser: &ExpressionParser,
    findings: &mut Vec<Finding>,
) {
    let queries_path = FieldPath::root().key("verified_queries");
    let normalized: Vec<(String, String)> = document
        .verified_queries
        .iter()
        .map(|q| (normalize_text(&q.question), normalize_text(&q.sql)))
        .collect();

    for (i, query) in document.verified_queries.iter().enumerate() {
        let path = queries_path.index(i);

        for j in 0..i {
            let same_question = normalized[i].0 == normalized[j].0;
            let same_sql = normalized[i].1 == normalized[j].1;
            let (field, value) = match (same_question, same_sql) {
                (true, true) => ("question and sql", query.question.trim()),
                (true, false) => ("question", query.question.trim()),
                (false, true) => ("sql", query.sql.trim()),
                (false, false) => continue,
            };
            findings.push(Finding::blocking(
                path.clone(),
                ValidationError::DuplicateName {
                    field: format!("verified query {}", field),
                    value: value.to_string(),
                    first: document.verified_queries[j].label(j),
                    second: query.label(i),
                },
            ));
        }

        match parser.parse_query(&query.sql) {
            Ok(_) => {}
            Err(QueryError::Syntax(e)) => findings.push(Finding::blocking(
                path.key("sql"),
                ValidationError::ExpressionSyntax(e),
            )),
            Err(e) => findings.push(Finding::blocking(
                path.key("sql"),
                ValidationError::UnsupportedStatement {
                    name: query.label(i),
                    statement: e.to_string(),
                },
            )),
        }
    }
}

fn check_data_types(
    document: &SemanticDocument,
    config: &ValidatorConfig,
    mapping: &dyn DialectMapping,
    findings: &mut Vec<Finding>,
) {
    let tables_path = FieldPath::root().key("tables");

    for (t, table) in document.tables.iter().enumerate() {
        for (c, column) in table.columns.iter().enumerate() {
            let column_path = tables_path.index(t).key("columns").index(c);
            let column_name = qualified(table, &column.name);

            match mapping.classify_type(&column.data_type) {
                None => findings.push(Finding::blocking(
                    column_path.key("data_type"),
                    ValidationError::UnsupportedType {
                        column: column_name.clone(),
                        data_type: column.data_type.clone(),
                        reason: format!("not a {} data type", mapping.tag()),
                    },
                )),
                Some(TypeClass::Object) => findings.push(Finding::blocking(
                    column_path.key("data_type"),
                    ValidationError::UnsupportedType {
                        column: column_name.clone(),
                        data_type: column.data_type.clone(),
                        reason: "semi-structured and spatial types are not supported".to_string(),
                    },
                )),
                Some(class) => {
                    if let Some(hint) = kind_mismatch(column.kind, class) {
                        findings.push(Finding::advisory(column_path.key("kind"), hint));
                    }
                }
            }

            if column.sample_values.len() > config.max_sample_values {
                findings.push(Finding::blocking(
                    column_path.key("sample_values"),
                    ValidationError::Structural {
                        message: format!(
                            "{} sample values exceed the maximum of {}",
                            column.sample_values.len(),
                            config.max_sample_values
                        ),
                    },
                ));
            }
        }
    }
}

fn kind_mismatch(kind: ColumnKind, class: TypeClass) -> Option<String> {
    match kind {
        ColumnKind::TimeDimension { .. } if class != TypeClass::Temporal => Some(format!(
            "time_dimension over a {} type, consider a dimension",
            class
        )),
        ColumnKind::Measure {
            default_aggregation: Some(aggregation),
        }
        | ColumnKind::Metric {
            default_aggregation: Some(aggregation),
        } if class != TypeClass::Numeric
            && matches!(
                aggregation,
                Aggregation::Sum | Aggregation::Avg | Aggregation::Median
            ) =>
        {
            Some(format!(
                "default_aggregation '{}' over a {} type",
                aggregation, class
            ))
        }
        _ => None,
    }
}

const AWAITING_CONFIRMATION: &str = "awaiting confirmation";

fn check_placeholders(document: &SemanticDocument, findings: &mut Vec<Finding>) {
    fn visit(
        path: &FieldPath,
        description: Option<&str>,
        synonyms: &[String],
        findings: &mut Vec<Finding>,
    ) {
        if description.is_some_and(|d| d.trim().is_empty()) {
            findings.push(Finding::advisory(
                path.key("description"),
                format!("description is {}", AWAITING_CONFIRMATION),
            ));
        }
        for (i, synonym) in synonyms.iter().enumerate() {
            if synonym.trim().is_empty() {
                findings.push(Finding::advisory(
                    path.key("synonyms").index(i),
                    format!("synonym is {}", AWAITING_CONFIRMATION),
                ));
            }
        }
    }

    visit(
        &FieldPath::root(),
        document.description.as_deref(),
        &[],
        findings,
    );
    for (t, table) in document.tables.iter().enumerate() {
        let table_path = FieldPath::root().key("tables").index(t);
        visit(&table_path, table.description.as_deref(), &table.synonyms, findings);
        for (c, column) in table.columns.iter().enumerate() {
            visit(
                &table_path.key("columns").index(c),
                column.description.as_deref(),
                &column.synonyms,
                findings,
            );
        }
        for (f, filter) in table.filters.iter().enumerate() {
            visit(
                &table_path.key("filters").index(f),
                filter.description.as_deref(),
                &filter.synonyms,
                findings,
            );
        }
    }
}
