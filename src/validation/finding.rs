use crate::expression::ExpressionSyntaxError;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Prevents the document from being accepted
    Blocking,
    Advisory,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Blocking => write!(f, "blocking"),
            Severity::Advisory => write!(f, "advisory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a field inside the document, rendered as
/// `tables[2].columns[0].kind`. The empty path is the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        FieldPath::default()
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        FieldPath { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        FieldPath { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Which of the two size measures tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetDimension {
    Token,
    Byte,
}

impl fmt::Display for BudgetDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetDimension::Token => write!(f, "token"),
            BudgetDimension::Byte => write!(f, "byte"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{message}")]
    Structural { message: String },

    #[error(transparent)]
    ExpressionSyntax(ExpressionSyntaxError),

    #[error("{entity_type} '{entity_name}' references undefined {reference_type} '{reference_name}'")]
    Referential {
        entity_type: String,
        entity_name: String,
        reference_type: String,
        reference_name: String,
    },

    #[error("{field} '{value}' is used by both {first} and {second}")]
    DuplicateName {
        field: String,
        value: String,
        first: String,
        second: String,
    },

    #[error("column '{column}' has unsupported data type '{data_type}': {reason}")]
    UnsupportedType {
        column: String,
        data_type: String,
        reason: String,
    },

    #[error("document {dimension} measure {measured} exceeds the limit of {limit}")]
    DocumentTooLarge {
        measured: usize,
        limit: usize,
        dimension: BudgetDimension,
    },

    #[error("column '{column}': {message}")]
    InvalidAggregation { column: String, message: String },

    #[error("verified query '{name}' must be a single read-only query: {statement}")]
    UnsupportedStatement { name: String, statement: String },

    #[error("relationship '{relationship}' joins table '{table}' to itself")]
    SelfJoinNotAllowed { relationship: String, table: String },

    #[error("{message}")]
    Hint { message: String },
}

/// One violation or hint located in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub path: FieldPath,
    pub message: String,
    pub error: ValidationError,
}

impl Finding {
    pub fn blocking(path: FieldPath, error: ValidationError) -> Self {
        Finding {
            severity: Severity::Blocking,
            path,
            message: error.to_string(),
            error,
        }
    }

    pub fn advisory(path: FieldPath, message: impl Into<String>) -> Self {
        let message = message.into();
        Finding {
            severity: Severity::Advisory,
            path,
            error: ValidationError::Hint {
                message: message.clone(),
            },
            message,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
    }
}

pub fn has_blocking(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_blocking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_display() {
        let path = FieldPath::root()
            .key("tables")
            .index(2)
            .key("columns")
            .index(0)
            .key("kind");
        assert_eq!(path.to_string(), "tables[2].columns[0].kind");
        assert_eq!(FieldPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding::blocking(
            FieldPath::root().key("relationships").index(0),
            ValidationError::Referential {
                entity_type: "relationship".to_string(),
                entity_name: "orders_to_customers".to_string(),
                reference_type: "column".to_string(),
                reference_name: "customers.cust_id".to_string(),
            },
        );
        assert_eq!(
            finding.to_string(),
            "[blocking] relationships[0]: relationship 'orders_to_customers' references undefined column 'customers.cust_id'"
        );
    }

    #[test]
    fn test_finding_serializes_to_json() {
        let finding = Finding::blocking(
            FieldPath::root().key("name"),
            ValidationError::DocumentTooLarge {
                measured: 12,
                limit: 10,
                dimension: BudgetDimension::Byte,
            },
        );
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["severity"], "blocking");
        assert_eq!(json["path"], "name");
        assert_eq!(json["error"]["category"], "document_too_large");
        assert_eq!(json["error"]["dimension"], "byte");
    }
}
