use crate::error::{DiscrepancyError, Result};
use crate::schema::{field_spec, CanonicalRecord, FieldSpec, FieldValue, RawRecord, FIELDS};
use log::debug;
use serde_json::Value;
use std::collections::HashSet;

/// Maps each canonical field name to the label an external source uses for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTranslationTable {
    entries: Vec<(&'static FieldSpec, String)>,
}

impl KeyTranslationTable {
    /// The header convention of the reference data source.
    pub fn standard() -> Self {
        Self {
            entries: FIELDS
                .iter()
                .map(|spec| (spec, spec.label.to_string()))
                .collect(),
        }
    }

    /// Replaces the label for one canonical field.
    pub fn with_override(mut self, field: &str, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let spec = field_spec(field).ok_or_else(|| {
            DiscrepancyError::InvalidConfig(format!("Unknown canonical field '{}'", field))
        })?;

        if let Some(entry) = self.entries.iter_mut().find(|(s, _)| s.name == spec.name) {
            entry.1 = label;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn label(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(spec, _)| spec.name == field)
            .map(|(_, label)| label.as_str())
    }

    /// Iterates `(spec, label)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldSpec, &str)> + '_ {
        self.entries.iter().map(|(spec, label)| (*spec, label.as_str()))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (spec, label) in &self.entries {
            if !seen.insert(label.as_str()) {
                return Err(DiscrepancyError::InvalidConfig(format!(
                    "Label '{}' is assigned to more than one field (last: '{}')",
                    label, spec.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for KeyTranslationTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Translates externally-labelled data into [`CanonicalRecord`]s and back.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    table: KeyTranslationTable,
}

impl FieldMapper {
    pub fn new(table: KeyTranslationTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &KeyTranslationTable {
        &self.table
    }

    pub fn map_to_canonical(&self, raw: &RawRecord) -> Result<CanonicalRecord> {
        for key in raw.keys() {
            if !self.table.iter().any(|(_, label)| label == key.as_str()) {
                debug!("Ignoring unrecognised input key '{}'", key);
            }
        }

        CanonicalRecord::from_lookup(|spec| {
            self.table
                .label(spec.name)
                .and_then(|label| raw.get(label))
        })
    }

    /// Renders a record in the external label space. Absent fields are omitted.
    pub fn to_labelled(&self, record: &CanonicalRecord) -> RawRecord {
        let mut raw = RawRecord::new();
        for (spec, value) in record.fields() {
            let json = match value {
                FieldValue::Text(s) => Value::String(s),
                FieldValue::Decimal(d) => Value::String(d.to_string()),
                FieldValue::Integer(i) => Value::from(i),
                FieldValue::Absent => continue,
            };
            if let Some(label) = self.table.label(spec.name) {
                raw.insert(label.to_string(), json);
            }
        }
        raw
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decimal::Decimal;
    use crate::error::ViolationKind;
    use serde_json::json;

    pub(crate) fn healthinc_labelled() -> RawRecord {
        let value = json!({
            "Company Name": "HealthInc",
            "Industry": "Healthcare",
            "Market Capitalization": 3000,
            "Revenue (in millions)": 1000,
            "EBITDA (in millions)": 250,
            "Net Income (in millions)": 80,
            "Debt (in millions)": 150,
            "Equity (in millions)": 666,
            "Enterprise Value (in millions)": 3150,
            "P/E Ratio": 15,
            "Revenue Growth Rate (%)": 12,
            "EBITDA Margin (%)": 40,
            "Net Income Margin (%)": 8,
            "ROE (Return on Equity) (%)": 13.33,
            "ROA (Return on Assets) (%)": 10,
            "Current Ratio": 1,
            "Debt to Equity Ratio": 0.25,
            "Location": "New York, NY",
            "CEO": "Jane Smith",
            "Number of Employees": 3000
        });
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_map_all_fields() {
        let record = FieldMapper::default()
            .map_to_canonical(&healthinc_labelled())
            .unwrap();

        assert_eq!(record.company_name, "HealthInc");
        assert_eq!(record.market_capitalization, Decimal::from(3000));
        assert_eq!(record.roe, "13.33".parse().unwrap());
        assert_eq!(record.debt_to_equity_ratio, "0.25".parse().unwrap());
        assert_eq!(record.ceo.as_deref(), Some("Jane Smith"));
        assert_eq!(record.number_of_employees, Some(3000));
    }

    #[test]
    fn test_missing_optional_labels() {
        let mut raw = healthinc_labelled();
        raw.remove("CEO");
        raw.remove("Number of Employees");

        let record = FieldMapper::default().map_to_canonical(&raw).unwrap();
        assert_eq!(record.ceo, None);
        assert_eq!(record.number_of_employees, None);
    }

    #[test]
    fn test_missing_required_label() {
        let mut raw = healthinc_labelled();
        raw.remove("Location");

        match FieldMapper::default().map_to_canonical(&raw) {
            Err(DiscrepancyError::SchemaViolation { kind, field }) => {
                assert_eq!(kind, ViolationKind::MissingField);
                assert_eq!(field, "location");
            }
            other => panic!("expected missing field violation, got {:?}", other),
        }
    }

    #[test]
    fn test_canonical_names_are_not_labels() {
        let raw = crate::schema::tests::healthinc_canonical();
        assert!(FieldMapper::default().map_to_canonical(&raw).is_err());
    }

    #[test]
    fn test_numeric_representation_independence() {
        let mut as_text = healthinc_labelled();
        as_text.insert("Revenue (in millions)".to_string(), json!("1000"));
        let mut as_number = healthinc_labelled();
        as_number.insert("Revenue (in millions)".to_string(), json!(1000));

        let mapper = FieldMapper::default();
        assert_eq!(
            mapper.map_to_canonical(&as_text).unwrap().revenue,
            mapper.map_to_canonical(&as_number).unwrap().revenue
        );
    }

    #[test]
    fn test_label_override() {
        let table = KeyTranslationTable::standard()
            .with_override("revenue", "Total Revenue")
            .unwrap();
        assert_eq!(table.label("revenue"), Some("Total Revenue"));

        let mut raw = healthinc_labelled();
        let revenue = raw.remove("Revenue (in millions)").unwrap();
        raw.insert("Total Revenue".to_string(), revenue);

        let record = FieldMapper::new(table).map_to_canonical(&raw).unwrap();
        assert_eq!(record.revenue, Decimal::from(1000));
    }

    #[test]
    fn test_invalid_overrides() {
        assert!(matches!(
            KeyTranslationTable::standard().with_override("turnover", "Turnover"),
            Err(DiscrepancyError::InvalidConfig(_))
        ));
        assert!(matches!(
            KeyTranslationTable::standard().with_override("revenue", "Industry"),
            Err(DiscrepancyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_labelled_round_trip() {
        let mapper = FieldMapper::default();
        let mut raw = healthinc_labelled();
        raw.remove("CEO");
        let record = mapper.map_to_canonical(&raw).unwrap();

        let labelled = mapper.to_labelled(&record);
        assert!(!labelled.contains_key("CEO"));
        assert_eq!(labelled["Revenue (in millions)"], json!("1000"));
        assert_eq!(mapper.map_to_canonical(&labelled).unwrap(), record);
    }
}
