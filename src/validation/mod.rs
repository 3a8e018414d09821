pub mod budget;
pub mod finding;
pub mod semantic;
pub mod structural;

pub use budget::{enforce, measure, BudgetMeasure, BudgetReport, TokenPolicy};
pub use finding::{has_blocking, BudgetDimension, FieldPath, Finding, Severity, ValidationError};
pub use semantic::validate_semantics;
pub use structural::validate_structure;
