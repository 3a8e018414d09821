use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Coarse class of a physical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    Temporal,
    Text,
    Numeric,
    Boolean,
    /// Semi-structured or geometric values, never accepted in a document
    Object,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeClass::Temporal => "temporal",
            TypeClass::Text => "text",
            TypeClass::Numeric => "numeric",
            TypeClass::Boolean => "boolean",
            TypeClass::Object => "object",
        };
        write!(f, "{}", name)
    }
}

/// Cleans up a declared type, eg. `NUMBER(38,0)` -> `NUMBER` and
/// `timestamp(3)  with time zone` -> `TIMESTAMP WITH TIME ZONE`
pub fn normalize_data_type(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[derive(Debug, PartialEq, Eq)]
pub enum PostgresType {
    Serial,
    BigSerial,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Real,
    DoublePrecision,
    Money,
    ByteA,
    Varchar,
    Char,
    Text,
    Cidr,
    Inet,
    MacAddr,
    MacAddr8,
    Bit,
    Uuid,
    Xml,
    Json,
    Jsonb,
    TsVector,
    TsQuery,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TimeTz,
    Interval,
    Point,
    Line,
    LSeg,
    Box,
    Path,
    Polygon,
    Circle,
    Geometry,
    Array,
    Composite,
    Range,
    Oid,
    PgLsn,
    Boolean,
    Name,
}

impl PostgresType {
    pub fn class(&self) -> TypeClass {
        use PostgresType::*;
        match self {
            Serial | BigSerial | SmallInt | Integer | BigInt | Numeric | Real | DoublePrecision
            | Money | Oid => TypeClass::Numeric,
            ByteA | Varchar | Char | Text | Cidr | Inet | MacAddr | MacAddr8 | Bit | Uuid
            | Name | PgLsn => TypeClass::Text,
            Timestamp | TimestampTz | Date | Time | TimeTz | Interval => TypeClass::Temporal,
            Boolean => TypeClass::Boolean,
            Xml | Json | Jsonb | TsVector | TsQuery | Point | Line | LSeg | Box | Path
            | Polygon | Circle | Geometry | Array | Composite | Range => TypeClass::Object,
        }
    }
}

impl FromStr for PostgresType {
    type Err = String;

    /// Accepts both the catalog (`int4`) and the SQL (`INTEGER`) spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_data_type(s);
        if normalized.ends_with("[]") {
            return Ok(PostgresType::Array);
        }
        match normalized.as_str() {
            "SERIAL" | "SERIAL4" => Ok(PostgresType::Serial),
            "BIGSERIAL" | "SERIAL8" => Ok(PostgresType::BigSerial),
            "INT2" | "SMALLINT" => Ok(PostgresType::SmallInt),
            "INT4" | "INT" | "INTEGER" => Ok(PostgresType::Integer),
            "INT8" | "BIGINT" => Ok(PostgresType::BigInt),
            "NUMERIC" | "DECIMAL" => Ok(PostgresType::Numeric),
            "FLOAT4" | "REAL" => Ok(PostgresType::Real),
            "FLOAT8" | "DOUBLE PRECISION" | "FLOAT" => Ok(PostgresType::DoublePrecision),
            "MONEY" => Ok(PostgresType::Money),
            "BYTEA" => Ok(PostgresType::ByteA),
            "VARCHAR" | "CHARACTER VARYING" => Ok(PostgresType::Varchar),
            "BPCHAR" | "CHAR" | "CHARACTER" => Ok(PostgresType::Char),
            "TEXT" | "CITEXT" => Ok(PostgresType::Text),
            "CIDR" => Ok(PostgresType::Cidr),
            "INET" => Ok(PostgresType::Inet),
            "MACADDR" => Ok(PostgresType::MacAddr),
            "MACADDR8" => Ok(PostgresType::MacAddr8),
            "BIT" | "VARBIT" | "BIT VARYING" => Ok(PostgresType::Bit),
            "UUID" => Ok(PostgresType::Uuid),
            "XML" => Ok(PostgresType::Xml),
            "JSON" => Ok(PostgresType::Json),
            "JSONB" => Ok(PostgresType::Jsonb),
            "TSVECTOR" => Ok(PostgresType::TsVector),
            "TSQUERY" => Ok(PostgresType::TsQuery),
            "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => Ok(PostgresType::Timestamp),
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => Ok(PostgresType::TimestampTz),
            "DATE" => Ok(PostgresType::Date),
            "TIME" | "TIME WITHOUT TIME ZONE" => Ok(PostgresType::Time),
            "TIMETZ" | "TIME WITH TIME ZONE" => Ok(PostgresType::TimeTz),
            "INTERVAL" => Ok(PostgresType::Interval),
            "POINT" => Ok(PostgresType::Point),
            "LINE" => Ok(PostgresType::Line),
            "LSEG" => Ok(PostgresType::LSeg),
            "BOX" => Ok(PostgresType::Box),
            "PATH" => Ok(PostgresType::Path),
            "POLYGON" => Ok(PostgresType::Polygon),
            "CIRCLE" => Ok(PostgresType::Circle),
            "GEOMETRY" => Ok(PostgresType::Geometry),
            "ARRAY" => Ok(PostgresType::Array),
            "COMPOSITE" => Ok(PostgresType::Composite),
            "RANGE" | "INT4RANGE" | "INT8RANGE" | "NUMRANGE" | "TSRANGE" | "TSTZRANGE"
            | "DATERANGE" => Ok(PostgresType::Range),
            "OID" => Ok(PostgresType::Oid),
            "PG_LSN" => Ok(PostgresType::PgLsn),
            "BOOL" | "BOOLEAN" => Ok(PostgresType::Boolean),
            "NAME" => Ok(PostgresType::Name),
            _ => Err(format!("Unknown PostgreSQL type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::precision("NUMBER(38,0)", "NUMBER")]
    #[case::lowercase("varchar(16777216)", "VARCHAR")]
    #[case::inner_params("timestamp(3)  with time zone", "TIMESTAMP WITH TIME ZONE")]
    #[case::padded("  date ", "DATE")]
    fn test_normalize_data_type(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_data_type(raw), expected);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            PostgresType::from_str("int4").unwrap(),
            PostgresType::Integer
        );
        assert_eq!(
            PostgresType::from_str("character varying(64)").unwrap(),
            PostgresType::Varchar
        );
        assert_eq!(
            PostgresType::from_str("timestamp").unwrap(),
            PostgresType::Timestamp
        );
        assert_eq!(
            PostgresType::from_str("bool").unwrap(),
            PostgresType::Boolean
        );
        assert_eq!(
            PostgresType::from_str("text[]").unwrap(),
            PostgresType::Array
        );
    }

    #[test]
    fn test_from_str_unknown_type() {
        assert!(PostgresType::from_str("unknown_type").is_err());
    }

    #[rstest]
    #[case::numeric(PostgresType::Money, TypeClass::Numeric)]
    #[case::temporal(PostgresType::TimestampTz, TypeClass::Temporal)]
    #[case::object(PostgresType::Jsonb, TypeClass::Object)]
    #[case::text(PostgresType::Uuid, TypeClass::Text)]
    fn test_class(#[case] pg_type: PostgresType, #[case] expected: TypeClass) {
        assert_eq!(pg_type.class(), expected);
    }
}
