pub mod physical_type;
pub mod postgres;
pub mod snowflake;

use physical_type::{PostgresType, TypeClass};
use postgres::PostgresMapping;
use serde::Serialize;
use snowflake::SnowflakeMapping;
use sqlparser::ast::Ident;
use sqlparser::dialect::GenericDialect;
use std::fmt;
use std::str::FromStr;

/// Target SQL engine a semantic document is written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Snowflake,
    Postgres,
    Generic,
}

impl SqlDialect {
    pub fn mapping(&self) -> &'static dyn DialectMapping {
        match self {
            SqlDialect::Snowflake => &SnowflakeMapping,
            SqlDialect::Postgres => &PostgresMapping,
            SqlDialect::Generic => &GenericMapping,
        }
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snowflake" => Ok(SqlDialect::Snowflake),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "generic" | "ansi" => Ok(SqlDialect::Generic),
            other => Err(format!("Unknown SQL dialect: {}", other)),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::Snowflake => write!(f, "snowflake"),
            SqlDialect::Postgres => write!(f, "postgres"),
            SqlDialect::Generic => write!(f, "generic"),
        }
    }
}

/// Aggregate functions understood by every supported engine
const COMMON_AGGREGATES: &[&str] = &[
    "ANY_VALUE",
    "ARRAY_AGG",
    "AVG",
    "CORR",
    "COUNT",
    "COVAR_POP",
    "COVAR_SAMP",
    "MAX",
    "MIN",
    "MODE",
    "PERCENTILE_CONT",
    "PERCENTILE_DISC",
    "REGR_SLOPE",
    "STDDEV",
    "STDDEV_POP",
    "STDDEV_SAMP",
    "SUM",
    "VARIANCE",
    "VAR_POP",
    "VAR_SAMP",
];

/// Engine specific rules the validator needs from a SQL dialect.
///
/// Implementations are zero-sized and stateless, so a single `'static`
/// instance per engine is shared by every parse.
pub trait DialectMapping: Send + Sync {
    /// Tag of the engine this mapping describes
    fn tag(&self) -> SqlDialect;

    /// Dialect handed to `sqlparser`
    fn get_dialect(&self) -> &dyn sqlparser::dialect::Dialect;

    /// Case folding applied by the engine to unquoted identifiers
    fn fold_unquoted(&self, value: &str) -> String;

    /// Aggregates the engine adds on top of [`COMMON_AGGREGATES`]
    fn extra_aggregates(&self) -> &'static [&'static str];

    /// Maps a declared physical type onto its class, `None` when the
    /// engine does not know the type at all
    fn classify_type(&self, data_type: &str) -> Option<TypeClass>;

    fn fold_identifier(&self, ident: &Ident) -> String {
        match ident.quote_style {
            Some(_) => ident.value.clone(),
            None => self.fold_unquoted(&ident.value),
        }
    }

    /// Folds a name written in the document, honouring double quotes the
    /// same way the engine would for an identifier.
    fn fold_name(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            raw[1..raw.len() - 1].replace("\"\"", "\"")
        } else {
            self.fold_unquoted(raw)
        }
    }

    fn is_aggregate(&self, function_name: &str) -> bool {
        let name = function_name.to_uppercase();
        COMMON_AGGREGATES.contains(&name.as_str())
            || self.extra_aggregates().contains(&name.as_str())
    }
}

/// ANSI fallback used when the target engine is unknown
pub struct GenericMapping;

impl DialectMapping for GenericMapping {
    fn tag(&self) -> SqlDialect {
        SqlDialect::Generic
    }

    fn get_dialect(&self) -> &dyn sqlparser::dialect::Dialect {
        &GenericDialect {}
    }

    fn fold_unquoted(&self, value: &str) -> String {
        value.to_lowercase()
    }

    fn extra_aggregates(&self) -> &'static [&'static str] {
        &["COUNT_IF", "LISTAGG", "MEDIAN", "STRING_AGG", "BOOL_AND", "BOOL_OR"]
    }

    fn classify_type(&self, data_type: &str) -> Option<TypeClass> {
        SnowflakeMapping
            .classify_type(data_type)
            .or_else(|| PostgresType::from_str(data_type).ok().map(|t| t.class()))
    }
}
