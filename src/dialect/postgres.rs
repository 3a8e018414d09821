use super::physical_type::{PostgresType, TypeClass};
use super::{DialectMapping, SqlDialect};
use sqlparser::dialect::PostgreSqlDialect;
use std::str::FromStr;

pub struct PostgresMapping;

impl DialectMapping for PostgresMapping {
    fn tag(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn get_dialect(&self) -> &dyn sqlparser::dialect::Dialect {
        &PostgreSqlDialect {}
    }

    // unquoted identifiers are folded to lower case
    fn fold_unquoted(&self, value: &str) -> String {
        value.to_lowercase()
    }

    fn extra_aggregates(&self) -> &'static [&'static str] {
        &[
            "BIT_AND",
            "BIT_OR",
            "BOOL_AND",
            "BOOL_OR",
            "EVERY",
            "JSON_AGG",
            "JSONB_AGG",
            "JSON_OBJECT_AGG",
            "REGR_COUNT",
            "STRING_AGG",
            "XMLAGG",
        ]
    }

    fn classify_type(&self, data_type: &str) -> Option<TypeClass> {
        PostgresType::from_str(data_type).ok().map(|t| t.class())
    }
}
