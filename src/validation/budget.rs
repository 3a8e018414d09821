use super::finding::{BudgetDimension, FieldPath, Finding, ValidationError};
use crate::config::ValidatorConfig;
use crate::semantic_model::codec::{self, SerdeError};
use crate::semantic_model::SemanticDocument;
use log::debug;
use std::fmt;
use std::str::FromStr;

/// How the token measure is derived from canonical text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// One token per run of word characters and per punctuation character
    Lexical,
    /// Character count divided by a fixed ratio, rounded up
    CharsPerToken(usize),
}

impl TokenPolicy {
    pub fn count(&self, text: &str) -> usize {
        match self {
            TokenPolicy::Lexical => lexical_tokens(text),
            TokenPolicy::CharsPerToken(ratio) => text.chars().count().div_ceil(*ratio),
        }
    }
}

impl FromStr for TokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "lexical" {
            return Ok(TokenPolicy::Lexical);
        }
        match s.strip_prefix("chars_per_token:").map(str::parse::<usize>) {
            Some(Ok(ratio)) if ratio > 0 => Ok(TokenPolicy::CharsPerToken(ratio)),
            _ => Err(format!(
                "Unknown token policy: {} (expected 'lexical' or 'chars_per_token:N')",
                s
            )),
        }
    }
}

impl fmt::Display for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPolicy::Lexical => write!(f, "lexical"),
            TokenPolicy::CharsPerToken(ratio) => write!(f, "chars_per_token:{}", ratio),
        }
    }
}

fn lexical_tokens(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else {
            in_word = false;
            if !c.is_whitespace() {
                count += 1;
            }
        }
    }
    count
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetMeasure {
    pub tokens: usize,
    pub bytes: usize,
}

/// Measures a document as it would be published.
///
/// Tokens are counted over the canonical text with every sample value and
/// the verified queries removed; bytes cover the full canonical text.
pub fn measure(document: &SemanticDocument, policy: TokenPolicy) -> Result<BudgetMeasure, SerdeError> {
    let full = codec::serialize(document)?;

    let mut billable = document.clone();
    billable.verified_queries.clear();
    for table in billable.tables.iter_mut() {
        for column in table.columns.iter_mut() {
            column.sample_values.clear();
        }
    }
    let billable_text = codec::serialize(&billable)?;

    Ok(BudgetMeasure {
        tokens: policy.count(&billable_text),
        bytes: full.len(),
    })
}

/// A document's measures and the ceilings they break
#[derive(Debug, Clone)]
pub struct BudgetReport {
    pub measure: BudgetMeasure,
    pub findings: Vec<Finding>,
}

/// Measures a document and checks both measures against the configured ceilings
pub fn enforce(document: &SemanticDocument, config: &ValidatorConfig) -> Result<BudgetReport, SerdeError> {
    let measured = measure(document, config.token_policy)?;
    debug!(
        "Document '{}' measures {} tokens ({}) and {} bytes",
        document.name, measured.tokens, config.token_policy, measured.bytes
    );

    Ok(BudgetReport {
        measure: measured,
        findings: check_ceilings(measured, config),
    })
}

fn check_ceilings(measured: BudgetMeasure, config: &ValidatorConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    if measured.tokens > config.token_ceiling {
        findings.push(too_large(
            measured.tokens,
            config.token_ceiling,
            BudgetDimension::Token,
        ));
    }
    if measured.bytes > config.byte_ceiling {
        findings.push(too_large(
            measured.bytes,
            config.byte_ceiling,
            BudgetDimension::Byte,
        ));
    }
    findings
}

fn too_large(measured: usize, limit: usize, dimension: BudgetDimension) -> Finding {
    Finding::blocking(
        FieldPath::root(),
        ValidationError::DocumentTooLarge {
            measured,
            limit,
            dimension,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic_model::codec::deserialize;
    use rstest::*;

    #[fixture]
    fn document() -> SemanticDocument {
        deserialize(
            r#"
name: sales
tables:
  - name: orders
    base_table: {database: db, schema: public, table: orders}
    columns:
      - name: amount
        kind: measure
        expr: SUM(amt)
        data_type: NUMBER
      - name: region
        kind: dimension
        expr: region
        data_type: TEXT
"#,
        )
        .unwrap()
    }

    #[rstest]
    #[case::words("select amount from orders", 4)]
    #[case::punctuation("SUM(amt) > 0", 6)]
    #[case::snake_case("order_id: 1", 3)]
    #[case::empty("", 0)]
    fn test_lexical_tokens(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(TokenPolicy::Lexical.count(text), expected);
    }

    #[test]
    fn test_chars_per_token_rounds_up() {
        assert_eq!(TokenPolicy::CharsPerToken(4).count("abcde"), 2);
        assert_eq!(TokenPolicy::CharsPerToken(4).count("abcd"), 1);
    }

    #[rstest]
    #[case::lexical("lexical", TokenPolicy::Lexical)]
    #[case::ratio("chars_per_token:4", TokenPolicy::CharsPerToken(4))]
    #[case::padded(" Lexical ", TokenPolicy::Lexical)]
    fn test_policy_from_str(#[case] input: &str, #[case] expected: TokenPolicy) {
        assert_eq!(TokenPolicy::from_str(input).unwrap(), expected);
    }

    #[rstest]
    #[case::zero("chars_per_token:0")]
    #[case::missing_ratio("chars_per_token:")]
    #[case::unknown("tiktoken")]
    fn test_policy_from_str_invalid(#[case] input: &str) {
        assert!(TokenPolicy::from_str(input).is_err());
    }

    #[rstest]
    fn test_samples_only_change_bytes(document: SemanticDocument) {
        let before = measure(&document, TokenPolicy::Lexical).unwrap();
        let mut with_samples = document.clone();
        with_samples.tables[0].columns[1].sample_values =
            vec!["EMEA".to_string(), "APAC".to_string()];
        let after = measure(&with_samples, TokenPolicy::Lexical).unwrap();
        assert_eq!(before.tokens, after.tokens);
        assert!(after.bytes > before.bytes);
    }

    #[rstest]
    fn test_description_adds_tokens(document: SemanticDocument) {
        let before = measure(&document, TokenPolicy::Lexical).unwrap();
        let mut described = document.clone();
        described.tables[0].description = Some("One row per order".to_string());
        let after = measure(&described, TokenPolicy::Lexical).unwrap();
        assert!(after.tokens > before.tokens);
        assert!(after.bytes > before.bytes);
    }

    #[rstest]
    fn test_enforce_names_dimension(document: SemanticDocument) {
        let config = ValidatorConfig {
            token_ceiling: 5,
            ..ValidatorConfig::default()
        };
        let report = enforce(&document, &config).unwrap();
        assert!(report.measure.tokens > 5);
        assert_eq!(report.findings.len(), 1);
        assert!(matches!(
            report.findings[0].error,
            ValidationError::DocumentTooLarge {
                dimension: BudgetDimension::Token,
                limit: 5,
                ..
            }
        ));
    }

    #[rstest]
    fn test_enforce_reports_both_dimensions(document: SemanticDocument) {
        let config = ValidatorConfig {
            token_ceiling: 5,
            byte_ceiling: 10,
            ..ValidatorConfig::default()
        };
        let report = enforce(&document, &config).unwrap();
        assert_eq!(report.findings.len(), 2);
        assert!(matches!(
            report.findings[1].error,
            ValidationError::DocumentTooLarge {
                dimension: BudgetDimension::Byte,
                limit: 10,
                ..
            }
        ));
    }

    #[rstest]
    fn test_enforce_within_budget(document: SemanticDocument) {
        let report = enforce(&document, &ValidatorConfig::default()).unwrap();
        assert!(report.findings.is_empty());
        assert_eq!(
            report.measure,
            measure(&document, ValidatorConfig::default().token_policy).unwrap()
        );
    }
}
