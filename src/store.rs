use crate::error::Result;
use crate::schema::RawRecord;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_KEY_LABEL: &str = "Company Name";

/// Keyed lookup of stored records. Returned records use the source's own labels.
pub trait RecordStore {
    fn find_by_name(&self, name: &str) -> Result<Option<RawRecord>>;
}

/// Records loaded from a CSV file whose header row holds the external labels.
///
/// Empty cells are stored as JSON `null` so optional fields read as absent.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    key_label: String,
    rows: Vec<RawRecord>,
}

impl CsvRecordStore {
    pub fn from_path(path: impl AsRef<Path>, key_label: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading stored records from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, key_label)
    }

    pub fn from_reader<R: Read>(reader: R, key_label: impl Into<String>) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: RawRecord = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| {
                    let value = if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell.to_string())
                    };
                    (header.clone(), value)
                })
                .collect();
            rows.push(row);
        }

        debug!("Loaded {} stored records", rows.len());
        Ok(Self {
            key_label: key_label.into(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RecordStore for CsvRecordStore {
    fn find_by_name(&self, name: &str) -> Result<Option<RawRecord>> {
        let found = self
            .rows
            .iter()
            .find(|row| matches!(row.get(&self.key_label), Some(Value::String(s)) if s == name));
        Ok(found.cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: BTreeMap<String, RawRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, record: RawRecord) {
        self.records.insert(name.into(), record);
    }

    pub fn with_record(mut self, name: impl Into<String>, record: RawRecord) -> Self {
        self.insert(name, record);
        self
    }
}

impl RecordStore for InMemoryRecordStore {
    fn find_by_name(&self, name: &str) -> Result<Option<RawRecord>> {
        Ok(self.records.get(name).cloned())
    }
}
