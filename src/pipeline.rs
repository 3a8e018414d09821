use crate::config::ValidatorConfig;
use crate::semantic_model::codec;
use crate::semantic_model::SemanticDocument;
use crate::validation::{
    budget, has_blocking, validate_semantics, validate_structure, BudgetMeasure, FieldPath,
    Finding, ValidationError,
};
use log::{debug, info};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Structural,
    Semantic,
    Budget,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Structural => write!(f, "structural"),
            Stage::Semantic => write!(f, "semantic"),
            Stage::Budget => write!(f, "budget"),
        }
    }
}

/// A document that went through every stage without a blocking finding.
///
/// Only the pipeline can build one, which is what lets a store require it.
#[derive(Debug, Clone)]
pub struct AcceptedDocument {
    document: SemanticDocument,
    advisories: Vec<Finding>,
    measure: BudgetMeasure,
}

impl AcceptedDocument {
    pub fn document(&self) -> &SemanticDocument {
        &self.document
    }

    pub fn advisories(&self) -> &[Finding] {
        &self.advisories
    }

    pub fn measure(&self) -> BudgetMeasure {
        self.measure
    }

    pub fn into_document(self) -> SemanticDocument {
        self.document
    }
}

/// The stage that stopped a document and everything it found
#[derive(Error, Debug, Clone)]
#[error("document rejected at the {stage} stage with {} finding(s)", .findings.len())]
pub struct Rejection {
    pub stage: Stage,
    pub findings: Vec<Finding>,
}

impl Rejection {
    fn new(stage: Stage, findings: Vec<Finding>) -> Self {
        info!(
            "Document rejected at the {} stage with {} findings",
            stage,
            findings.len()
        );
        Rejection { stage, findings }
    }
}

/// Runs raw document text through every stage. Findings accumulate within
/// a stage and any blocking finding stops the stages after it.
pub fn validate_text(text: &str, config: &ValidatorConfig) -> Result<AcceptedDocument, Rejection> {
    let value = validate_structure(text).map_err(|findings| Rejection::new(Stage::Structural, findings))?;

    let document = codec::from_value(value).map_err(|e| {
        Rejection::new(
            Stage::Structural,
            vec![Finding::blocking(
                FieldPath::root(),
                ValidationError::Structural {
                    message: e.to_string(),
                },
            )],
        )
    })?;
    debug!("Document '{}' passed structural validation", document.name);

    let mut findings = validate_semantics(&document, config);
    if has_blocking(&findings) {
        return Err(Rejection::new(Stage::Semantic, findings));
    }

    let report = budget::enforce(&document, config).map_err(|e| {
        Rejection::new(
            Stage::Budget,
            vec![Finding::blocking(
                FieldPath::root(),
                ValidationError::Structural {
                    message: format!("document cannot be serialized: {}", e),
                },
            )],
        )
    })?;
    if !report.findings.is_empty() {
        findings.extend(report.findings);
        return Err(Rejection::new(Stage::Budget, findings));
    }
    let measure = report.measure;

    info!(
        "Document '{}' accepted with {} advisories ({} tokens, {} bytes)",
        document.name,
        findings.len(),
        measure.tokens,
        measure.bytes
    );
    Ok(AcceptedDocument {
        document,
        advisories: findings,
        measure,
    })
}

/// Same as [`validate_text`] for a document built in memory, eg. by the
/// generator; it is serialized first so both paths check the same text
pub fn validate_document(
    document: &SemanticDocument,
    config: &ValidatorConfig,
) -> Result<AcceptedDocument, Rejection> {
    let text = codec::serialize(document).map_err(|e| {
        Rejection::new(
            Stage::Structural,
            vec![Finding::blocking(
                FieldPath::root(),
                ValidationError::Structural {
                    message: format!("document cannot be serialized: {}", e),
                },
            )],
        )
    })?;
    validate_text(&text, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{BudgetDimension, Severity};
    use rstest::*;

    const DOCUMENT: &str = r#"
name: sales
tables:
  - name: orders
    description: "  "
    base_table: {database: db, schema: public, table: orders}
    columns:
      - name: amount
        kind: measure
        expr: amt
        data_type: NUMBER
        default_aggregation: sum
      - name: region
        kind: dimension
        expr: region
        data_type: TEXT
"#;

    #[fixture]
    fn config() -> ValidatorConfig {
        ValidatorConfig::default()
    }

    #[test_log::test]
    fn test_accepts_with_advisories() {
        let accepted = validate_text(DOCUMENT, &ValidatorConfig::default()).unwrap();
        assert_eq!(accepted.document().name, "sales");
        assert_eq!(accepted.advisories().len(), 1);
        assert_eq!(accepted.advisories()[0].severity, Severity::Advisory);
        assert!(accepted.measure().tokens > 0);
    }

    #[rstest]
    fn test_structural_stops_semantic(config: ValidatorConfig) {
        let text = DOCUMENT.replace("kind: dimension", "kind: category");
        let rejection = validate_text(&text, &config).unwrap_err();
        assert_eq!(rejection.stage, Stage::Structural);
        assert_eq!(rejection.findings.len(), 1);
    }

    #[rstest]
    fn test_semantic_stops_budget(config: ValidatorConfig) {
        let text = DOCUMENT.replace("expr: region", "expr: MAX(region)");
        let config = ValidatorConfig {
            token_ceiling: 1,
            ..config
        };
        let rejection = validate_text(&text, &config).unwrap_err();
        assert_eq!(rejection.stage, Stage::Semantic);
        assert!(rejection
            .findings
            .iter()
            .all(|f| !matches!(f.error, ValidationError::DocumentTooLarge { .. })));
    }

    #[rstest]
    fn test_budget_rejection_keeps_advisories(config: ValidatorConfig) {
        let config = ValidatorConfig {
            byte_ceiling: 10,
            ..config
        };
        let rejection = validate_text(DOCUMENT, &config).unwrap_err();
        assert_eq!(rejection.stage, Stage::Budget);
        assert_eq!(rejection.findings.len(), 2);
        assert!(matches!(
            rejection.findings[1].error,
            ValidationError::DocumentTooLarge {
                dimension: BudgetDimension::Byte,
                ..
            }
        ));
    }

    #[rstest]
    fn test_validate_document_matches_text(config: ValidatorConfig) {
        let document = codec::deserialize(DOCUMENT).unwrap();
        let accepted = validate_document(&document, &config).unwrap();
        assert_eq!(accepted.into_document(), document);
    }
}
