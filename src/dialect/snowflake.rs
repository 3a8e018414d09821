use super::physical_type::{normalize_data_type, TypeClass};
use super::{DialectMapping, SqlDialect};
use sqlparser::dialect::SnowflakeDialect;

// https://docs.snowflake.com/en/sql-reference/data-types-datetime
const TEMPORAL_DATATYPES: &[&str] = &[
    "DATE",
    "DATETIME",
    "TIMESTAMP_LTZ",
    "TIMESTAMP_NTZ",
    "TIMESTAMP_TZ",
    "TIMESTAMP",
    "TIME",
];

// https://docs.snowflake.com/en/sql-reference/data-types-text
const TEXT_DATATYPES: &[&str] = &[
    "VARCHAR",
    "CHAR",
    "CHARACTER",
    "NCHAR",
    "STRING",
    "TEXT",
    "NVARCHAR",
    "NVARCHAR2",
    "CHAR VARYING",
    "NCHAR VARYING",
    "BINARY",
    "VARBINARY",
];

// https://docs.snowflake.com/en/sql-reference/data-types-numeric
const NUMERIC_DATATYPES: &[&str] = &[
    "NUMBER",
    "DECIMAL",
    "DEC",
    "NUMERIC",
    "INT",
    "INTEGER",
    "BIGINT",
    "SMALLINT",
    "TINYINT",
    "BYTEINT",
    "FLOAT",
    "FLOAT4",
    "FLOAT8",
    "DOUBLE",
    "DOUBLE PRECISION",
    "REAL",
];

const OBJECT_DATATYPES: &[&str] = &["VARIANT", "ARRAY", "OBJECT", "GEOGRAPHY", "GEOMETRY"];

pub struct SnowflakeMapping;

impl DialectMapping for SnowflakeMapping {
    fn tag(&self) -> SqlDialect {
        SqlDialect::Snowflake
    }

    fn get_dialect(&self) -> &dyn sqlparser::dialect::Dialect {
        &SnowflakeDialect {}
    }

    // unquoted identifiers are stored and resolved in upper case
    fn fold_unquoted(&self, value: &str) -> String {
        value.to_uppercase()
    }

    fn extra_aggregates(&self) -> &'static [&'static str] {
        &[
            "APPROX_COUNT_DISTINCT",
            "APPROX_PERCENTILE",
            "ARRAY_UNIQUE_AGG",
            "BITAND_AGG",
            "BITOR_AGG",
            "BOOLAND_AGG",
            "BOOLOR_AGG",
            "COUNT_IF",
            "HLL",
            "KURTOSIS",
            "LISTAGG",
            "MAX_BY",
            "MEDIAN",
            "MIN_BY",
            "OBJECT_AGG",
            "SKEW",
        ]
    }

    fn classify_type(&self, data_type: &str) -> Option<TypeClass> {
        let normalized = normalize_data_type(data_type);
        let name = normalized.as_str();
        if TEMPORAL_DATATYPES.contains(&name) {
            Some(TypeClass::Temporal)
        } else if TEXT_DATATYPES.contains(&name) {
            Some(TypeClass::Text)
        } else if NUMERIC_DATATYPES.contains(&name) {
            Some(TypeClass::Numeric)
        } else if name == "BOOLEAN" {
            Some(TypeClass::Boolean)
        } else if OBJECT_DATATYPES.contains(&name) {
            Some(TypeClass::Object)
        } else {
            None
        }
    }
}
