use crate::schema::{CanonicalRecord, FieldValue, FIELDS};
use log::debug;
use serde::Serialize;

/// One field whose value differs between the uploaded and the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscrepancyEntry {
    pub field_name: String,
    pub uploaded_value: FieldValue,
    pub stored_value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub uploaded_data: CanonicalRecord,
    pub stored_data: CanonicalRecord,
    /// In field declaration order; empty when the records agree.
    pub mismatched_fields: Vec<DiscrepancyEntry>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatched_fields.is_empty()
    }

    pub fn mismatched_field_names(&self) -> Vec<&str> {
        self.mismatched_fields
            .iter()
            .map(|entry| entry.field_name.as_str())
            .collect()
    }
}

/// Lists every field on which `uploaded` and `stored` disagree.
///
/// An absent value only equals another absent value.
pub fn find_mismatched_fields(
    uploaded: &CanonicalRecord,
    stored: &CanonicalRecord,
) -> Vec<DiscrepancyEntry> {
    let mut mismatched = Vec::new();

    for spec in FIELDS.iter() {
        let uploaded_value = uploaded.get(spec.field);
        let stored_value = stored.get(spec.field);

        if uploaded_value != stored_value {
            debug!(
                "Field '{}' differs: uploaded {} vs stored {}",
                spec.name, uploaded_value, stored_value
            );
            mismatched.push(DiscrepancyEntry {
                field_name: spec.name.to_string(),
                uploaded_value,
                stored_value,
            });
        }
    }

    mismatched
}

/// Compares a freshly extracted record against the stored one.
pub fn reconcile(uploaded: CanonicalRecord, stored: CanonicalRecord) -> ReconciliationReport {
    let mismatched_fields = find_mismatched_fields(&uploaded, &stored);

    ReconciliationReport {
        uploaded_data: uploaded,
        stored_data: stored,
        mismatched_fields,
    }
}
