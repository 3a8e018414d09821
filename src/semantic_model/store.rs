use super::codec::SerdeError;
use super::SemanticDocument;
use crate::pipeline::AcceptedDocument;
use thiserror::Error;

/// Destination of accepted documents.
///
/// Publishing takes an [`AcceptedDocument`], so nothing that skipped
/// validation can be stored.
pub trait DocumentStore {
    /// Stores the document under its name, replacing an earlier version,
    /// and returns where it was written
    fn publish(&self, document: &AcceptedDocument) -> Result<String, StoreError>;
    fn get_document(&self, name: &str) -> Result<SemanticDocument, StoreError>;
    fn list_documents(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid document name: {0}")]
    InvalidName(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] SerdeError),
}
