pub mod config;
pub mod dialect;
pub mod expression;
pub mod generate;
pub mod pipeline;
pub mod semantic_model;
pub mod validation;

pub use pipeline::{validate_document, validate_text, AcceptedDocument, Rejection, Stage};
