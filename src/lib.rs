//! # Financial Discrepancy Checker
//!
//! A library for catching data-entry and extraction errors by reconciling the
//! company figures extracted from an uploaded document against the record held
//! in a reference store.
//!
//! ## Core Concepts
//!
//! - **Canonical Record**: the typed, normalized set of tracked company attributes
//! - **Key-Translation Table**: maps canonical field names to the labels external sources use
//! - **Field Mapper**: coerces an externally-labelled mapping into a Canonical Record
//! - **Reconciliation**: a field-by-field diff of two records, reported in declaration order
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_discrepancy_checker::*;
//!
//! let config = CheckerConfig::from_env();
//! let checker = DiscrepancyChecker::new(
//!     config.record_store()?,
//!     config.document_extractor()?,
//!     config.field_mapper()?,
//! );
//!
//! let report = checker.check("HealthInc", "HealthInc")?;
//! for entry in &report.mismatched_fields {
//!     println!("{}: {} != {}", entry.field_name, entry.uploaded_value, entry.stored_value);
//! }
//! ```

pub mod config;
pub mod decimal;
pub mod error;
pub mod extraction;
pub mod mapper;
pub mod reconcile;
pub mod schema;
pub mod store;

#[cfg(feature = "gemini")]
pub mod llm;

pub use config::CheckerConfig;
pub use decimal::{Decimal, ParseDecimalError};
pub use error::{DiscrepancyError, Result, ViolationKind};
pub use extraction::{DocumentExtractor, InMemoryExtractor, JsonDocumentExtractor};
pub use mapper::{FieldMapper, KeyTranslationTable};
pub use reconcile::{find_mismatched_fields, reconcile, DiscrepancyEntry, ReconciliationReport};
pub use schema::{field_spec, CanonicalRecord, Field, FieldSpec, FieldType, FieldValue, RawRecord, FIELDS};
pub use store::{CsvRecordStore, InMemoryRecordStore, RecordStore};

use log::{info, warn};

/// Runs one comparison request end to end: stored-record lookup, document
/// extraction, mapping of both sides, reconciliation.
pub struct DiscrepancyChecker<S, E> {
    store: S,
    extractor: E,
    mapper: FieldMapper,
}

impl<S: RecordStore, E: DocumentExtractor> DiscrepancyChecker<S, E> {
    pub fn new(store: S, extractor: E, mapper: FieldMapper) -> Self {
        Self {
            store,
            extractor,
            mapper,
        }
    }

    pub fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    pub fn check(&self, company_name: &str, document_id: &str) -> Result<ReconciliationReport> {
        info!(
            "Checking document '{}' against stored data for '{}'",
            document_id, company_name
        );

        let stored = self.load_stored(company_name)?;
        let extracted = self.extractor.extract(document_id)?;
        let uploaded = self.mapper.map_to_canonical(&extracted)?;

        Ok(self.finish(company_name, uploaded, stored))
    }

    /// Like [`check`](Self::check), for a document that was extracted elsewhere.
    pub fn check_extracted(
        &self,
        company_name: &str,
        extracted: &RawRecord,
    ) -> Result<ReconciliationReport> {
        info!("Checking extracted data against stored data for '{}'", company_name);

        let stored = self.load_stored(company_name)?;
        let uploaded = self.mapper.map_to_canonical(extracted)?;

        Ok(self.finish(company_name, uploaded, stored))
    }

    fn load_stored(&self, company_name: &str) -> Result<CanonicalRecord> {
        let raw = self.store.find_by_name(company_name)?.ok_or_else(|| {
            warn!("No stored data found for '{}'", company_name);
            DiscrepancyError::SourceNotFound(format!(
                "No stored data found for company '{}'",
                company_name
            ))
        })?;
        self.mapper.map_to_canonical(&raw)
    }

    fn finish(
        &self,
        company_name: &str,
        uploaded: CanonicalRecord,
        stored: CanonicalRecord,
    ) -> ReconciliationReport {
        let report = reconcile(uploaded, stored);
        info!(
            "Found {} mismatched field(s) for '{}'",
            report.mismatched_fields.len(),
            company_name
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::healthinc_labelled;
    use serde_json::json;
    use std::cell::Cell;

    struct CountingExtractor<'a> {
        inner: InMemoryExtractor,
        calls: &'a Cell<usize>,
    }

    impl DocumentExtractor for CountingExtractor<'_> {
        fn extract(&self, identifier: &str) -> Result<RawRecord> {
            self.calls.set(self.calls.get() + 1);
            self.inner.extract(identifier)
        }
    }

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::new().with_record("HealthInc", healthinc_labelled())
    }

    #[test]
    fn test_check_consistent_document() {
        let extractor = InMemoryExtractor::new().with_document("healthinc.pdf", healthinc_labelled());
        let checker = DiscrepancyChecker::new(store(), extractor, FieldMapper::default());

        let report = checker.check("HealthInc", "healthinc.pdf").unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.uploaded_data, report.stored_data);
    }

    #[test]
    fn test_check_reports_mismatches() {
        let mut uploaded = healthinc_labelled();
        uploaded.insert("Revenue (in millions)".to_string(), json!("111"));
        uploaded.remove("CEO");

        let checker = DiscrepancyChecker::new(
            store(),
            InMemoryExtractor::new(),
            FieldMapper::default(),
        );
        let report = checker.check_extracted("HealthInc", &uploaded).unwrap();

        assert_eq!(report.mismatched_field_names(), vec!["revenue", "ceo"]);
        assert_eq!(report.mismatched_fields[1].uploaded_value, FieldValue::Absent);
    }

    #[test]
    fn test_unknown_company_short_circuits() {
        let calls = Cell::new(0);
        let extractor = CountingExtractor {
            inner: InMemoryExtractor::new().with_document("doc", healthinc_labelled()),
            calls: &calls,
        };
        let checker = DiscrepancyChecker::new(store(), extractor, FieldMapper::default());

        let err = checker.check("Fake Company", "doc").unwrap_err();
        assert!(matches!(err, DiscrepancyError::SourceNotFound(_)));
        assert!(err.is_client_error());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_missing_document() {
        let checker = DiscrepancyChecker::new(
            store(),
            InMemoryExtractor::new(),
            FieldMapper::default(),
        );
        assert!(matches!(
            checker.check("HealthInc", "missing.pdf"),
            Err(DiscrepancyError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_upload_is_schema_violation() {
        let mut uploaded = healthinc_labelled();
        uploaded.insert("P/E Ratio".to_string(), json!("fifteen"));

        let checker = DiscrepancyChecker::new(
            store(),
            InMemoryExtractor::new(),
            FieldMapper::default(),
        );
        match checker.check_extracted("HealthInc", &uploaded) {
            Err(DiscrepancyError::SchemaViolation { kind, field }) => {
                assert_eq!(kind, ViolationKind::BadType);
                assert_eq!(field, "pe_ratio");
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
    }
}
