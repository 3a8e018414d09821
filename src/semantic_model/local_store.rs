use super::codec;
use super::store::{DocumentStore, StoreError};
use super::SemanticDocument;
use crate::config::StoreConfig;
use crate::generate::to_snake_case;
use crate::pipeline::AcceptedDocument;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

const EXTENSION: &str = "yaml";

/// Keeps each document as `<snake_case name>.yaml` in one directory, so
/// `Sales Model` and `sales_model` are the same document
#[derive(Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDocumentStore { root: root.into() }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.store_path)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let stem = to_snake_case(name);
        if stem.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", stem, EXTENSION)))
    }
}

impl DocumentStore for LocalDocumentStore {
    fn publish(&self, document: &AcceptedDocument) -> Result<String, StoreError> {
        let path = self.path_for(&document.document().name)?;
        fs::create_dir_all(&self.root)?;
        fs::write(&path, codec::serialize(document.document())?)?;
        info!("Published document to {}", path.display());
        Ok(path.display().to_string())
    }

    fn get_document(&self, name: &str) -> Result<SemanticDocument, StoreError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(StoreError::DocumentNotFound(name.to_string()));
        }
        debug!("Loading document from {}", path.display());
        Ok(codec::deserialize(&fs::read_to_string(path)?)?)
    }

    fn list_documents(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
