mod analysis;

use crate::dialect::{DialectMapping, SqlDialect};
use log::debug;
use serde::Serialize;
use sqlparser::ast::{Expr, Statement};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::Token;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// 1-based location inside an expression, `0:0` when the parser gave none
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u64,
    pub column: u64,
}

impl Position {
    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "line {}, column {}", self.line, self.column)
        } else {
            write!(f, "unknown position")
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("`{expression}` is not a valid {dialect} expression at {position}: {message}")]
pub struct ExpressionSyntaxError {
    pub expression: String,
    pub dialect: SqlDialect,
    pub position: Position,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error(transparent)]
    Syntax(#[from] ExpressionSyntaxError),

    #[error("only read-only queries are allowed, found {0}")]
    NotReadOnly(String),

    #[error("expected exactly one query, found {0} statements")]
    StatementCount(usize),
}

/// What the validator needs to know about an expression
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    pub expr: Expr,
    /// Referenced column names, folded the way the engine resolves them
    pub identifiers: BTreeSet<String>,
    /// An aggregate function appears and the expression has no window
    pub has_aggregate: bool,
    pub has_window: bool,
    /// The expression is nothing but a (possibly qualified) column reference
    pub is_bare_column: bool,
}

/// Syntax-only SQL analysis for a single dialect. Holds no state between
/// calls and never touches a data source.
pub struct ExpressionParser {
    mapping: &'static dyn DialectMapping,
}

impl ExpressionParser {
    pub fn new(dialect: SqlDialect) -> Self {
        ExpressionParser {
            mapping: dialect.mapping(),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.mapping.tag()
    }

    pub fn parse(&self, expression: &str) -> Result<ParsedExpression, ExpressionSyntaxError> {
        if expression.trim().is_empty() {
            return Err(self.error(expression, Position::default(), "empty expression"));
        }

        let mut parser = Parser::new(self.mapping.get_dialect())
            .try_with_sql(expression)
            .map_err(|e| self.parser_error(expression, e))?;
        let expr = parser
            .parse_expr()
            .map_err(|e| self.parser_error(expression, e))?;

        let trailing = parser.peek_token();
        if trailing.token != Token::EOF {
            let position = Position {
                line: trailing.location.line,
                column: trailing.location.column,
            };
            return Err(self.error(
                expression,
                position,
                &format!("unexpected trailing input `{}`", trailing.token),
            ));
        }

        let analysis = analysis::analyze(&expr, self.mapping);
        debug!(
            "Parsed expression {:?}: identifiers={:?}, aggregate={}, window={}",
            expression, analysis.identifiers, analysis.has_aggregate, analysis.has_window
        );

        Ok(ParsedExpression {
            is_bare_column: analysis::is_bare_column(&expr),
            identifiers: analysis.identifiers,
            has_aggregate: analysis.has_aggregate,
            has_window: analysis.has_window,
            expr,
        })
    }

    /// Accepts exactly one read-only query
    pub fn parse_query(&self, sql: &str) -> Result<Statement, QueryError> {
        let mut statements = Parser::parse_sql(self.mapping.get_dialect(), sql)
            .map_err(|e| self.parser_error(sql, e))?;

        if statements.len() != 1 {
            return Err(QueryError::StatementCount(statements.len()));
        }
        match statements.remove(0) {
            statement @ Statement::Query(_) => Ok(statement),
            other => Err(QueryError::NotReadOnly(statement_keyword(&other))),
        }
    }

    fn parser_error(&self, expression: &str, error: ParserError) -> ExpressionSyntaxError {
        let raw = match error {
            ParserError::TokenizerError(msg) | ParserError::ParserError(msg) => msg,
            ParserError::RecursionLimitExceeded => "recursion limit exceeded".to_string(),
        };
        let (message, position) = split_location(&raw);
        self.error(expression, position, message)
    }

    fn error(&self, expression: &str, position: Position, message: &str) -> ExpressionSyntaxError {
        ExpressionSyntaxError {
            expression: expression.to_string(),
            dialect: self.mapping.tag(),
            position,
            message: message.to_string(),
        }
    }
}

/// Splits the ` at Line: L, Column: C` suffix sqlparser appends to its messages
fn split_location(message: &str) -> (&str, Position) {
    let Some(idx) = message.rfind(" at Line: ") else {
        return (message, Position::default());
    };
    let location = &message[idx + " at Line: ".len()..];
    let mut parts = location.split(", Column: ");
    let line = parts.next().and_then(|l| l.trim().parse().ok());
    let column = parts.next().and_then(|c| c.trim().parse().ok());
    match (line, column) {
        (Some(line), Some(column)) => (&message[..idx], Position { line, column }),
        _ => (message, Position::default()),
    }
}

fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[fixture]
    fn snowflake_parser() -> ExpressionParser {
        ExpressionParser::new(SqlDialect::Snowflake)
    }

    #[fixture]
    fn postgres_parser() -> ExpressionParser {
        ExpressionParser::new(SqlDialect::Postgres)
    }

    #[rstest]
    #[case::bare_column("amt", false, true)]
    #[case::qualified_column("orders.amt", false, true)]
    #[case::nested_column("(amt)", false, true)]
    #[case::sum("SUM(amt)", true, false)]
    #[case::count_distinct("COUNT(DISTINCT customer_id)", true, false)]
    #[case::nested_aggregate("ROUND(AVG(price * quantity), 2)", true, false)]
    #[case::aggregate_in_case(
        "CASE WHEN region = 'EU' THEN SUM(amt) ELSE 0 END",
        true,
        false
    )]
    #[case::scalar_function("DATE_TRUNC('month', order_date)", false, false)]
    #[case::arithmetic("price * quantity - discount", false, false)]
    #[case::window_only("SUM(amt) OVER (PARTITION BY region)", false, false)]
    #[case::dialect_aggregate("COUNT_IF(is_active)", true, false)]
    fn test_aggregate_detection(
        snowflake_parser: ExpressionParser,
        #[case] expression: &str,
        #[case] has_aggregate: bool,
        #[case] is_bare_column: bool,
    ) {
        let parsed = snowflake_parser.parse(expression).unwrap();
        assert_eq!(parsed.has_aggregate, has_aggregate, "{}", expression);
        assert_eq!(parsed.is_bare_column, is_bare_column, "{}", expression);
    }

    #[rstest]
    fn test_window_is_reported(snowflake_parser: ExpressionParser) {
        let parsed = snowflake_parser
            .parse("ROW_NUMBER() OVER (ORDER BY created_at)")
            .unwrap();
        assert!(parsed.has_window);
        assert!(!parsed.has_aggregate);
    }

    #[rstest]
    fn test_identifiers_follow_snowflake_folding(snowflake_parser: ExpressionParser) {
        let parsed = snowflake_parser
            .parse("SUM(o.amount) + \"Tax Amount\" - discount")
            .unwrap();
        let expected: BTreeSet<String> = ["AMOUNT", "Tax Amount", "DISCOUNT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(parsed.identifiers, expected);
    }

    #[rstest]
    fn test_identifiers_follow_postgres_folding(postgres_parser: ExpressionParser) {
        let parsed = postgres_parser.parse("Amount * \"Rate\"").unwrap();
        let expected: BTreeSet<String> = ["amount", "Rate"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parsed.identifiers, expected);
    }

    #[rstest]
    #[case::unbalanced("SUM(amt")]
    #[case::dangling_operator("amt +")]
    #[case::trailing_tokens("amt amt2 amt3")]
    #[case::empty("   ")]
    #[case::trailing_semicolon("SUM(amt);")]
    fn test_syntax_errors(snowflake_parser: ExpressionParser, #[case] expression: &str) {
        let err = snowflake_parser.parse(expression).unwrap_err();
        assert_eq!(err.expression, expression);
        assert_eq!(err.dialect, SqlDialect::Snowflake);
    }

    #[rstest]
    fn test_trailing_input_position(snowflake_parser: ExpressionParser) {
        let err = snowflake_parser.parse("a b c").unwrap_err();
        assert_eq!(err.position, Position { line: 1, column: 3 });
    }

    #[test]
    fn test_split_location() {
        let (message, position) =
            split_location("Expected: an expression, found: EOF at Line: 1, Column: 8");
        assert_eq!(message, "Expected: an expression, found: EOF");
        assert_eq!(position, Position { line: 1, column: 8 });

        let (message, position) = split_location("no location here");
        assert_eq!(message, "no location here");
        assert!(!position.is_known());
    }

    #[rstest]
    #[case::select("SELECT region, SUM(amt) FROM __orders GROUP BY region")]
    #[case::cte(
        "WITH __orders AS (SELECT * FROM db.sch.orders) SELECT COUNT(*) FROM __orders"
    )]
    fn test_parse_query_accepts_reads(snowflake_parser: ExpressionParser, #[case] sql: &str) {
        assert!(snowflake_parser.parse_query(sql).is_ok());
    }

    #[rstest]
    #[case::update("UPDATE employees SET salary = 60000 WHERE employee_id = 101;")]
    #[case::insert("INSERT INTO t (a) VALUES (1)")]
    #[case::delete("DELETE FROM orders")]
    fn test_parse_query_rejects_writes(snowflake_parser: ExpressionParser, #[case] sql: &str) {
        assert!(matches!(
            snowflake_parser.parse_query(sql),
            Err(QueryError::NotReadOnly(_))
        ));
    }

    #[rstest]
    fn test_parse_query_rejects_multiple_statements(snowflake_parser: ExpressionParser) {
        assert_eq!(
            snowflake_parser.parse_query("SELECT 1; SELECT 2"),
            Err(QueryError::StatementCount(2))
        );
    }
}
