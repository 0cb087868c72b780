use crate::error::{DiscrepancyError, Result};
use crate::schema::RawRecord;
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Turns an uploaded document into labelled values.
pub trait DocumentExtractor {
    /// Fails with [`DiscrepancyError::SourceNotFound`] when `identifier` cannot
    /// be resolved to a document.
    fn extract(&self, identifier: &str) -> Result<RawRecord>;
}

/// Registry of already-extracted documents stored as JSON objects of
/// label → value, one file per identifier.
#[derive(Debug, Clone, Default)]
pub struct JsonDocumentExtractor {
    documents: BTreeMap<String, PathBuf>,
}

impl JsonDocumentExtractor {
    pub fn new(documents: BTreeMap<String, PathBuf>) -> Self {
        Self { documents }
    }

    pub fn register(&mut self, identifier: impl Into<String>, path: impl Into<PathBuf>) {
        self.documents.insert(identifier.into(), path.into());
    }

    /// Registers every `*.json` file in `dir` under its file stem.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut extractor = Self::default();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                extractor.register(stem.to_string(), path.clone());
            }
        }
        Ok(extractor)
    }

    pub fn document_path(&self, identifier: &str) -> Option<&Path> {
        self.documents.get(identifier).map(PathBuf::as_path)
    }
}

impl DocumentExtractor for JsonDocumentExtractor {
    fn extract(&self, identifier: &str) -> Result<RawRecord> {
        let path = self.document_path(identifier).ok_or_else(|| {
            DiscrepancyError::SourceNotFound(format!(
                "No document registered for '{}'",
                identifier
            ))
        })?;

        if !path.is_file() {
            return Err(DiscrepancyError::SourceNotFound(format!(
                "Document file {} does not exist",
                path.display()
            )));
        }

        debug!("Extracting '{}' from {}", identifier, path.display());
        let contents = std::fs::read_to_string(path)?;
        let raw: RawRecord = serde_json::from_str(&contents)?;
        Ok(raw)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryExtractor {
    documents: BTreeMap<String, RawRecord>,
}

impl InMemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, identifier: impl Into<String>, raw: RawRecord) -> Self {
        self.documents.insert(identifier.into(), raw);
        self
    }
}

impl DocumentExtractor for InMemoryExtractor {
    fn extract(&self, identifier: &str) -> Result<RawRecord> {
        self.documents.get(identifier).cloned().ok_or_else(|| {
            DiscrepancyError::SourceNotFound(format!(
                "No document registered for '{}'",
                identifier
            ))
        })
    }
}
