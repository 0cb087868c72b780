use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field had no value in the input
    MissingField,
    /// A value could not be coerced to the field's declared type
    BadType,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => write!(f, "missing field"),
            Self::BadType => write!(f, "bad type"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DiscrepancyError {
    #[error("Schema violation ({kind}) on field '{field}'")]
    SchemaViolation { kind: ViolationKind, field: String },

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DiscrepancyError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::SchemaViolation {
            kind: ViolationKind::MissingField,
            field: field.into(),
        }
    }

    pub fn bad_type(field: impl Into<String>) -> Self {
        Self::SchemaViolation {
            kind: ViolationKind::BadType,
            field: field.into(),
        }
    }

    /// True for failures caused by the caller's input rather than by this process.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. } | Self::SourceNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DiscrepancyError>;
