//! Declarative shape of a semantic document.
//!
//! The structural validator walks these tables to report violations and the
//! codec uses them to put keys in their canonical order, so field order here
//! is the order fields are written out.

use super::column::{Aggregation, ColumnKind};
use super::{JoinType, RelationshipType};
use serde_yaml::Value;

#[derive(Debug)]
pub enum Shape {
    Str,
    NonEmptyStr,
    /// Non-empty identifier without whitespace
    Name,
    Bool,
    Int,
    /// String, number or boolean
    Scalar,
    Enum(&'static [&'static str]),
    Seq {
        item: &'static Shape,
        non_empty: bool,
    },
    Map(&'static [Field]),
}

impl Shape {
    /// Short description used in findings, eg. "expected a boolean"
    pub fn describe(&self) -> &'static str {
        match self {
            Shape::Str | Shape::NonEmptyStr | Shape::Name | Shape::Enum(_) => "a string",
            Shape::Bool => "a boolean",
            Shape::Int => "an integer",
            Shape::Scalar => "a string, number or boolean",
            Shape::Seq { .. } => "a sequence",
            Shape::Map(_) => "a mapping",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Part of one of several alternative layouts; a mapping uses exactly one
    Layout(&'static str),
}

/// Restricts a field to mappings whose `discriminator` holds one of `values`
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    pub discriminator: &'static str,
    pub values: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub presence: Presence,
    pub shape: &'static Shape,
    pub only_when: Option<Gate>,
}

impl Field {
    pub const fn required(name: &'static str, shape: &'static Shape) -> Self {
        Field {
            name,
            presence: Presence::Required,
            shape,
            only_when: None,
        }
    }

    pub const fn optional(name: &'static str, shape: &'static Shape) -> Self {
        Field {
            name,
            presence: Presence::Optional,
            shape,
            only_when: None,
        }
    }

    pub const fn layout(name: &'static str, shape: &'static Shape, layout: &'static str) -> Self {
        Field {
            name,
            presence: Presence::Layout(layout),
            shape,
            only_when: None,
        }
    }

    pub const fn only_when(
        self,
        discriminator: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Field {
            name: self.name,
            presence: self.presence,
            shape: self.shape,
            only_when: Some(Gate {
                discriminator,
                values,
            }),
        }
    }
}

static STR: Shape = Shape::Str;
static NON_EMPTY_STR: Shape = Shape::NonEmptyStr;
static NAME: Shape = Shape::Name;
static BOOL: Shape = Shape::Bool;
static INT: Shape = Shape::Int;
static SCALAR: Shape = Shape::Scalar;

static SYNONYMS: Shape = Shape::Seq {
    item: &STR,
    non_empty: false,
};
static SAMPLE_VALUES: Shape = Shape::Seq {
    item: &SCALAR,
    non_empty: false,
};
static KEY_COLUMNS: Shape = Shape::Seq {
    item: &NON_EMPTY_STR,
    non_empty: true,
};

static COLUMN_KIND: Shape = Shape::Enum(ColumnKind::LITERALS);
static AGGREGATION: Shape = Shape::Enum(Aggregation::LITERALS);
static JOIN_TYPE: Shape = Shape::Enum(JoinType::LITERALS);
static RELATIONSHIP_TYPE: Shape = Shape::Enum(RelationshipType::LITERALS);

const MEASURE_KINDS: &[&str] = &["measure", "metric"];
const DIMENSION_KINDS: &[&str] = &["dimension", "time_dimension"];

static COLUMN_FIELDS: [Field; 9] = [
    Field::required("name", &NAME),
    Field::optional("description", &STR),
    Field::optional("synonyms", &SYNONYMS),
    Field::required("kind", &COLUMN_KIND),
    Field::required("expr", &NON_EMPTY_STR),
    Field::required("data_type", &NON_EMPTY_STR),
    Field::optional("default_aggregation", &AGGREGATION).only_when("kind", MEASURE_KINDS),
    Field::optional("unique", &BOOL).only_when("kind", DIMENSION_KINDS),
    Field::optional("sample_values", &SAMPLE_VALUES),
];
static COLUMN: Shape = Shape::Map(&COLUMN_FIELDS);
static COLUMNS: Shape = Shape::Seq {
    item: &COLUMN,
    non_empty: false,
};

// Per-kind lists, the older table layout; entries carry no `kind`
static DIMENSION_FIELDS: [Field; 7] = [
    Field::required("name", &NAME),
    Field::optional("description", &STR),
    Field::optional("synonyms", &SYNONYMS),
    Field::required("expr", &NON_EMPTY_STR),
    Field::required("data_type", &NON_EMPTY_STR),
    Field::optional("unique", &BOOL),
    Field::optional("sample_values", &SAMPLE_VALUES),
];
static DIMENSION: Shape = Shape::Map(&DIMENSION_FIELDS);
static DIMENSIONS: Shape = Shape::Seq {
    item: &DIMENSION,
    non_empty: false,
};

static MEASURE_FIELDS: [Field; 7] = [
    Field::required("name", &NAME),
    Field::optional("description", &STR),
    Field::optional("synonyms", &SYNONYMS),
    Field::required("expr", &NON_EMPTY_STR),
    Field::required("data_type", &NON_EMPTY_STR),
    Field::optional("default_aggregation", &AGGREGATION),
    Field::optional("sample_values", &SAMPLE_VALUES),
];
static MEASURE: Shape = Shape::Map(&MEASURE_FIELDS);
static MEASURES: Shape = Shape::Seq {
    item: &MEASURE,
    non_empty: false,
};

const COLUMN_LAYOUT: &str = "columns";
const KIND_LIST_LAYOUT: &str = "dimensions/time_dimensions/measures";

/// Per-kind table lists and the column kind their entries are lifted into
pub const KIND_LISTS: &[(&str, &str)] = &[
    ("dimensions", "dimension"),
    ("time_dimensions", "time_dimension"),
    ("measures", "measure"),
];

static BASE_TABLE_FIELDS: [Field; 3] = [
    Field::required("database", &NON_EMPTY_STR),
    Field::required("schema", &NON_EMPTY_STR),
    Field::required("table", &NON_EMPTY_STR),
];
static BASE_TABLE: Shape = Shape::Map(&BASE_TABLE_FIELDS);

static PRIMARY_KEY_FIELDS: [Field; 1] = [Field::required("columns", &KEY_COLUMNS)];
static PRIMARY_KEY: Shape = Shape::Map(&PRIMARY_KEY_FIELDS);

static FILTER_FIELDS: [Field; 4] = [
    Field::required("name", &NAME),
    Field::optional("description", &STR),
    Field::optional("synonyms", &SYNONYMS),
    Field::required("expr", &NON_EMPTY_STR),
];
static FILTER: Shape = Shape::Map(&FILTER_FIELDS);
static FILTERS: Shape = Shape::Seq {
    item: &FILTER,
    non_empty: false,
};

static TABLE_FIELDS: [Field; 10] = [
    Field::required("name", &NAME),
    Field::optional("description", &STR),
    Field::optional("synonyms", &SYNONYMS),
    Field::required("base_table", &BASE_TABLE),
    Field::optional("primary_key", &PRIMARY_KEY),
    Field::layout("columns", &COLUMNS, COLUMN_LAYOUT),
    Field::layout("dimensions", &DIMENSIONS, KIND_LIST_LAYOUT),
    Field::layout("time_dimensions", &DIMENSIONS, KIND_LIST_LAYOUT),
    Field::layout("measures", &MEASURES, KIND_LIST_LAYOUT),
    Field::optional("filters", &FILTERS),
];
static TABLE: Shape = Shape::Map(&TABLE_FIELDS);
static TABLES: Shape = Shape::Seq {
    item: &TABLE,
    non_empty: true,
};

static RELATION_KEY_FIELDS: [Field; 2] = [
    Field::required("left_column", &NON_EMPTY_STR),
    Field::required("right_column", &NON_EMPTY_STR),
];
static RELATION_KEY: Shape = Shape::Map(&RELATION_KEY_FIELDS);
static RELATION_KEYS: Shape = Shape::Seq {
    item: &RELATION_KEY,
    non_empty: true,
};

static RELATIONSHIP_FIELDS: [Field; 6] = [
    Field::required("name", &NAME),
    Field::required("left_table", &NON_EMPTY_STR),
    Field::required("right_table", &NON_EMPTY_STR),
    Field::required("relationship_columns", &RELATION_KEYS),
    Field::required("join_type", &JOIN_TYPE),
    Field::required("relationship_type", &RELATIONSHIP_TYPE),
];
static RELATIONSHIP: Shape = Shape::Map(&RELATIONSHIP_FIELDS);
static RELATIONSHIPS: Shape = Shape::Seq {
    item: &RELATIONSHIP,
    non_empty: false,
};

static VERIFIED_QUERY_FIELDS: [Field; 6] = [
    Field::optional("name", &STR),
    Field::required("question", &NON_EMPTY_STR),
    Field::required("sql", &NON_EMPTY_STR),
    Field::optional("verified_at", &INT),
    Field::optional("verified_by", &STR),
    Field::optional("use_as_onboarding_question", &BOOL),
];
static VERIFIED_QUERY: Shape = Shape::Map(&VERIFIED_QUERY_FIELDS);
static VERIFIED_QUERIES: Shape = Shape::Seq {
    item: &VERIFIED_QUERY,
    non_empty: false,
};

static DOCUMENT_FIELDS: [Field; 6] = [
    Field::required("name", &NON_EMPTY_STR),
    Field::optional("description", &STR),
    Field::required("tables", &TABLES),
    Field::optional("relationships", &RELATIONSHIPS),
    Field::optional("verified_queries", &VERIFIED_QUERIES),
    Field::optional("custom_instructions", &STR),
];

/// Root shape of a semantic document
pub static DOCUMENT: Shape = Shape::Map(&DOCUMENT_FIELDS);

/// Rewrites every mapping so known keys come first in schema order,
/// optional nulls are dropped and unknown keys trail in their original order
pub fn canonicalize(shape: &Shape, value: Value) -> Value {
    match (shape, value) {
        (Shape::Map(fields), Value::Mapping(mapping)) => {
            let mut entries: Vec<(Value, Value)> = mapping.into_iter().collect();
            let mut ordered = serde_yaml::Mapping::with_capacity(entries.len());
            for field in fields.iter() {
                let Some(pos) = entries
                    .iter()
                    .position(|(key, _)| key.as_str() == Some(field.name))
                else {
                    continue;
                };
                let (key, value) = entries.remove(pos);
                if value.is_null() && field.presence != Presence::Required {
                    continue;
                }
                ordered.insert(key, canonicalize(field.shape, value));
            }
            for (key, value) in entries {
                ordered.insert(key, value);
            }
            Value::Mapping(ordered)
        }
        (Shape::Seq { item, .. }, Value::Sequence(items)) => Value::Sequence(
            items
                .into_iter()
                .map(|value| canonicalize(item, value))
                .collect(),
        ),
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(value: &Value) -> Vec<String> {
        value
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_canonicalize_orders_keys() {
        let value: Value = serde_yaml::from_str(
            "tables: []\ncustom_instructions: null\nname: sales\nextra: 1\ndescription: d\n",
        )
        .unwrap();
        let canonical = canonicalize(&DOCUMENT, value);
        assert_eq!(keys(&canonical), vec!["name", "description", "tables", "extra"]);
    }

    #[test]
    fn test_canonicalize_recurses_into_sequences() {
        let value: Value = serde_yaml::from_str(
            "name: s\ntables:\n- columns: []\n  base_table: {table: t, database: d, schema: s}\n  name: t\n",
        )
        .unwrap();
        let canonical = canonicalize(&DOCUMENT, value);
        let table = &canonical["tables"][0];
        assert_eq!(keys(table), vec!["name", "base_table", "columns"]);
        assert_eq!(
            keys(&table["base_table"]),
            vec!["database", "schema", "table"]
        );
    }

    #[test]
    fn test_column_gates() {
        let Shape::Map(fields) = &COLUMN else {
            panic!("column shape is a mapping");
        };
        let gated: Vec<&str> = fields
            .iter()
            .filter(|f| f.only_when.is_some())
            .map(|f| f.name)
            .collect();
        assert_eq!(gated, vec!["default_aggregation", "unique"]);
    }

    #[test]
    fn test_kind_lists_are_table_layouts() {
        let Shape::Map(fields) = &TABLE else {
            panic!("table shape is a mapping");
        };
        for (list, kind) in KIND_LISTS {
            let field = fields.iter().find(|f| f.name == *list).unwrap();
            assert_eq!(field.presence, Presence::Layout(KIND_LIST_LAYOUT));
            assert!(ColumnKind::LITERALS.contains(kind));
        }
    }
}
