use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Median,
    Min,
    Max,
    Count,
    CountDistinct,
}

impl Aggregation {
    pub const LITERALS: &'static [&'static str] = &[
        "sum",
        "avg",
        "median",
        "min",
        "max",
        "count",
        "count_distinct",
    ];
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literal = match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Median => "median",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Count => "count",
            Aggregation::CountDistinct => "count_distinct",
        };
        write!(f, "{}", literal)
    }
}

/// Role of a column, each variant carrying only the fields valid for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Dimension { unique: bool },
    TimeDimension { unique: bool },
    Measure { default_aggregation: Option<Aggregation> },
    Metric { default_aggregation: Option<Aggregation> },
}

impl ColumnKind {
    pub const LITERALS: &'static [&'static str] =
        &["dimension", "time_dimension", "measure", "metric"];

    pub fn tag(&self) -> KindTag {
        match self {
            ColumnKind::Dimension { .. } => KindTag::Dimension,
            ColumnKind::TimeDimension { .. } => KindTag::TimeDimension,
            ColumnKind::Measure { .. } => KindTag::Measure,
            ColumnKind::Metric { .. } => KindTag::Metric,
        }
    }

    pub fn is_dimensional(&self) -> bool {
        matches!(
            self,
            ColumnKind::Dimension { .. } | ColumnKind::TimeDimension { .. }
        )
    }

    pub fn default_aggregation(&self) -> Option<Aggregation> {
        match self {
            ColumnKind::Measure {
                default_aggregation,
            }
            | ColumnKind::Metric {
                default_aggregation,
            } => *default_aggregation,
            ColumnKind::Dimension { .. } | ColumnKind::TimeDimension { .. } => None,
        }
    }

    pub fn unique(&self) -> bool {
        match self {
            ColumnKind::Dimension { unique } | ColumnKind::TimeDimension { unique } => *unique,
            ColumnKind::Measure { .. } | ColumnKind::Metric { .. } => false,
        }
    }
}

/// Payload-free discriminant as written in the document
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Dimension,
    TimeDimension,
    Measure,
    Metric,
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literal = match self {
            KindTag::Dimension => "dimension",
            KindTag::TimeDimension => "time_dimension",
            KindTag::Measure => "measure",
            KindTag::Metric => "metric",
        };
        write!(f, "{}", literal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub description: Option<String>,
    pub synonyms: Vec<String>,
    pub kind: ColumnKind,
    pub expr: String,
    pub data_type: String,
    pub sample_values: Vec<String>,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind, expr: &str, data_type: &str) -> Self {
        Column {
            name: name.to_string(),
            description: None,
            synonyms: Vec::new(),
            kind,
            expr: expr.to_string(),
            data_type: data_type.to_string(),
            sample_values: Vec::new(),
        }
    }
}

/// Flat, borrowed view of a column in the order it is written out
#[derive(Serialize)]
struct ColumnRepr<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "is_empty")]
    synonyms: &'a [String],
    kind: KindTag,
    expr: &'a str,
    data_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_aggregation: Option<Aggregation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unique: Option<bool>,
    #[serde(skip_serializing_if = "is_empty")]
    sample_values: &'a [String],
}

fn is_empty(values: &&[String]) -> bool {
    values.is_empty()
}

impl Serialize for Column {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ColumnRepr {
            name: &self.name,
            description: self.description.as_deref(),
            synonyms: &self.synonyms,
            kind: self.kind.tag(),
            expr: &self.expr,
            data_type: &self.data_type,
            default_aggregation: self.kind.default_aggregation(),
            unique: self.kind.unique().then_some(true),
            sample_values: &self.sample_values,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct ColumnHelper {
            name: String,
            #[serde(default)]
            description: Option<String>,
            #[serde(default)]
            synonyms: Vec<String>,
            kind: KindTag,
            expr: String,
            data_type: String,
            #[serde(default)]
            default_aggregation: Option<Aggregation>,
            #[serde(default)]
            unique: Option<bool>,
            #[serde(default, deserialize_with = "scalar_strings")]
            sample_values: Vec<String>,
        }

        let helper = ColumnHelper::deserialize(deserializer)?;

        let kind = match helper.kind {
            KindTag::Dimension | KindTag::TimeDimension => {
                if helper.default_aggregation.is_some() {
                    return Err(D::Error::custom(format!(
                        "column '{}': default_aggregation is only allowed on measure or metric columns",
                        helper.name
                    )));
                }
                let unique = helper.unique.unwrap_or(false);
                if helper.kind == KindTag::Dimension {
                    ColumnKind::Dimension { unique }
                } else {
                    ColumnKind::TimeDimension { unique }
                }
            }
            KindTag::Measure | KindTag::Metric => {
                if helper.unique.is_some() {
                    return Err(D::Error::custom(format!(
                        "column '{}': unique is only allowed on dimension or time_dimension columns",
                        helper.name
                    )));
                }
                let default_aggregation = helper.default_aggregation;
                if helper.kind == KindTag::Measure {
                    ColumnKind::Measure {
                        default_aggregation,
                    }
                } else {
                    ColumnKind::Metric {
                        default_aggregation,
                    }
                }
            }
        };

        Ok(Column {
            name: helper.name,
            description: helper.description,
            synonyms: helper.synonyms,
            kind,
            expr: helper.expr,
            data_type: helper.data_type,
            sample_values: helper.sample_values,
        })
    }
}

/// Sample values are stored as text. Unquoted YAML numbers and booleans are
/// accepted and normalized, so `1.10` is kept as `1.1` and `0x1F` as `31`;
/// quote a sample to keep its exact spelling
fn scalar_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Vec<serde_yaml::Value> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            serde_yaml::Value::String(s) => Ok(s),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(D::Error::custom(format!(
                "sample values must be scalars, found {:?}",
                other
            ))),
        })
        .collect()
}
