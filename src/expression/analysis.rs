use crate::dialect::DialectMapping;
use sqlparser::ast::{visit_expressions, Expr};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

#[derive(Debug, Default)]
pub(super) struct Analysis {
    pub identifiers: BTreeSet<String>,
    pub has_aggregate: bool,
    pub has_window: bool,
}

/// Walks every sub-expression once, collecting column references and
/// aggregate/window usage
pub(super) fn analyze(expr: &Expr, mapping: &dyn DialectMapping) -> Analysis {
    let mut analysis = Analysis::default();
    let mut saw_aggregate = false;

    let _ = visit_expressions(expr, |e| {
        match e {
            Expr::Identifier(ident) => {
                analysis.identifiers.insert(mapping.fold_identifier(ident));
            }
            Expr::CompoundIdentifier(parts) => {
                // Qualifiers name a table, only the column matters here
                if let Some(column) = parts.last() {
                    analysis.identifiers.insert(mapping.fold_identifier(column));
                }
            }
            Expr::Function(function) => {
                if function.over.is_some() {
                    analysis.has_window = true;
                } else if let Some(name) = function.name.0.last() {
                    if mapping.is_aggregate(&name.value) {
                        saw_aggregate = true;
                    }
                }
            }
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });

    // An aggregate inside a windowed expression is evaluated per row
    analysis.has_aggregate = saw_aggregate && !analysis.has_window;
    analysis
}

pub(super) fn is_bare_column(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => true,
        Expr::Nested(inner) => is_bare_column(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlDialect;
    use sqlparser::parser::Parser;

    fn parse(sql: &str) -> Expr {
        let mapping = SqlDialect::Snowflake.mapping();
        Parser::new(mapping.get_dialect())
            .try_with_sql(sql)
            .unwrap()
            .parse_expr()
            .unwrap()
    }

    #[test]
    fn test_aggregate_under_window_is_not_counted() {
        let expr = parse("SUM(amt) / SUM(SUM(amt)) OVER ()");
        let analysis = analyze(&expr, SqlDialect::Snowflake.mapping());
        assert!(analysis.has_window);
        assert!(!analysis.has_aggregate);
    }

    #[test]
    fn test_function_names_are_not_identifiers() {
        let expr = parse("COALESCE(discount, 0)");
        let analysis = analyze(&expr, SqlDialect::Snowflake.mapping());
        assert_eq!(
            analysis.identifiers.into_iter().collect::<Vec<_>>(),
            vec!["DISCOUNT".to_string()]
        );
    }

    #[test]
    fn test_is_bare_column() {
        assert!(is_bare_column(&parse("((amt))")));
        assert!(!is_bare_column(&parse("-amt")));
        assert!(!is_bare_column(&parse("'amt'")));
    }
}
