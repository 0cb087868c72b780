use crate::error::{DiscrepancyError, Result};
use crate::llm::{client::GeminiClient, types::*};
use crate::mapper::KeyTranslationTable;
use crate::schema::{FieldType, RawRecord};
use log::info;
use serde_json::{json, Map, Value};
use std::path::Path;

const SYSTEM_PROMPT: &str = "You are a meticulous financial data extraction agent. \
You read company fact sheets and report figures exactly as printed, without calculating, \
rounding or inferring anything.";

/// Extracts labelled company figures from a document using Gemini.
pub struct GeminiExtractor {
    client: GeminiClient,
    model: String,
    table: KeyTranslationTable,
}

impl GeminiExtractor {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            table: KeyTranslationTable::standard(),
        }
    }

    /// Ask for a different label set (e.g. one with overrides applied).
    pub fn with_table(mut self, table: KeyTranslationTable) -> Self {
        self.table = table;
        self
    }

    pub async fn extract_file(&self, path: &Path) -> Result<RawRecord> {
        let document = self.client.upload_document(path).await?;
        info!("Uploaded {} as {}", document.display_name, document.name);
        self.extract_document(&document).await
    }

    pub async fn extract_document(&self, document: &RemoteDocument) -> Result<RawRecord> {
        let labels: Vec<String> = self
            .table
            .iter()
            .map(|(_, label)| format!("- \"{}\"", label))
            .collect();

        let instructions = format!(
            "Extract the company figures from the attached file \"{}\".\n\
            Return ONLY a JSON object using exactly these keys:\n{}\n\
            Numbers must be plain numbers without currency symbols, units or thousands separators. \
            Use null for any value the document does not state.",
            document.display_name,
            labels.join("\n")
        );

        let raw_json = self
            .client
            .generate_content(
                &self.model,
                SYSTEM_PROMPT,
                vec![Content::user_with_file(instructions, document)],
                Some(response_schema(&self.table)),
            )
            .await?;

        let cleaned = clean_json_output(&raw_json);
        let raw: RawRecord = serde_json::from_str(&cleaned).map_err(|e| {
            DiscrepancyError::ExtractionFailed(format!("Model returned invalid JSON: {}", e))
        })?;
        Ok(raw)
    }
}

/// Gemini response schema (OpenAPI subset) keyed by the external labels.
pub fn response_schema(table: &KeyTranslationTable) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (spec, label) in table.iter() {
        let kind = match spec.field_type {
            FieldType::Text | FieldType::OptionalText => "STRING",
            FieldType::Decimal | FieldType::OptionalDecimal => "NUMBER",
            FieldType::OptionalInteger => "INTEGER",
        };
        properties.insert(
            label.to_string(),
            json!({ "type": kind, "nullable": !spec.is_required() }),
        );
        if spec.is_required() {
            required.push(Value::String(label.to_string()));
        }
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

fn clean_json_output(raw: &str) -> String {
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            return raw[start..=end].to_string();
        }
    }
    raw.trim().to_string()
}
