use crate::error::{DiscrepancyError, Result};
use crate::extraction::JsonDocumentExtractor;
use crate::mapper::{FieldMapper, KeyTranslationTable};
use crate::store::{CsvRecordStore, DEFAULT_KEY_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Everything needed to wire a checker. Passed explicitly; nothing is read
/// from the environment unless [`CheckerConfig::from_env`] is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// CSV file holding the stored records
    pub database_path: PathBuf,
    /// Header of the CSV column records are looked up by
    pub key_label: String,
    /// Uploaded document registry: identifier → extracted JSON file
    pub documents: BTreeMap<String, PathBuf>,
    /// Directory whose `*.json` files are registered by file stem
    pub documents_dir: Option<PathBuf>,
    /// Canonical field name → replacement external label
    pub label_overrides: BTreeMap<String, String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/database.csv"),
            key_label: DEFAULT_KEY_LABEL.to_string(),
            documents: BTreeMap::new(),
            documents_dir: None,
            label_overrides: BTreeMap::new(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Reads `DISCREPANCY_DATABASE_PATH`, `DISCREPANCY_KEY_LABEL`,
    /// `DISCREPANCY_DOCUMENTS_DIR`, `GEMINI_API_KEY` and `GEMINI_MODEL`;
    /// anything unset keeps its default.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            match key.as_str() {
                "DISCREPANCY_DATABASE_PATH" => config.database_path = PathBuf::from(value),
                "DISCREPANCY_KEY_LABEL" => config.key_label = value,
                "DISCREPANCY_DOCUMENTS_DIR" => config.documents_dir = Some(PathBuf::from(value)),
                "GEMINI_API_KEY" => config.gemini_api_key = Some(value),
                "GEMINI_MODEL" => config.gemini_model = value,
                _ => {}
            }
        }
        config
    }

    pub fn key_translation_table(&self) -> Result<KeyTranslationTable> {
        self.label_overrides
            .iter()
            .try_fold(KeyTranslationTable::standard(), |table, (field, label)| {
                table.with_override(field, label.clone())
            })
    }

    pub fn field_mapper(&self) -> Result<FieldMapper> {
        Ok(FieldMapper::new(self.key_translation_table()?))
    }

    pub fn record_store(&self) -> Result<CsvRecordStore> {
        CsvRecordStore::from_path(&self.database_path, self.key_label.clone())
    }

    /// Explicit `documents` entries win over files found in `documents_dir`.
    pub fn document_extractor(&self) -> Result<JsonDocumentExtractor> {
        let mut extractor = match &self.documents_dir {
            Some(dir) => JsonDocumentExtractor::from_dir(dir)?,
            None => JsonDocumentExtractor::default(),
        };
        for (identifier, path) in &self.documents {
            extractor.register(identifier.clone(), path.clone());
        }
        Ok(extractor)
    }

    pub fn require_gemini_api_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            DiscrepancyError::InvalidConfig("GEMINI_API_KEY is not set".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CheckerConfig::default();
        assert_eq!(config.key_label, "Company Name");
        assert_eq!(config.key_translation_table().unwrap(), KeyTranslationTable::standard());
        assert!(config.require_gemini_api_key().is_err());
    }

    #[test]
    fn test_from_vars() {
        let config = CheckerConfig::from_vars(vars(&[
            ("DISCREPANCY_DATABASE_PATH", "/srv/records.csv"),
            ("DISCREPANCY_DOCUMENTS_DIR", "/srv/uploads"),
            ("GEMINI_API_KEY", "TEST_KEY"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(config.database_path, PathBuf::from("/srv/records.csv"));
        assert_eq!(config.documents_dir, Some(PathBuf::from("/srv/uploads")));
        assert_eq!(config.require_gemini_api_key().unwrap(), "TEST_KEY");
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_partial_json_config() {
        let config: CheckerConfig = serde_json::from_str(
            r#"{
                "database_path": "records.csv",
                "label_overrides": { "revenue": "Total Revenue" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.key_label, "Company Name");
        let table = config.key_translation_table().unwrap();
        assert_eq!(table.label("revenue"), Some("Total Revenue"));
        assert_eq!(table.label("ebitda"), Some("EBITDA (in millions)"));
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = CheckerConfig::default();
        config
            .label_overrides
            .insert("turnover".to_string(), "Turnover".to_string());
        assert!(matches!(
            config.field_mapper(),
            Err(DiscrepancyError::InvalidConfig(_))
        ));
    }
}
