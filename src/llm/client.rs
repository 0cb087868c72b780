use crate::error::{DiscrepancyError, Result};
use crate::llm::types::*;
use log::debug;
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";
const MAX_STATE_POLLS: usize = 60;

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub async fn upload_document(&self, path: &Path) -> Result<RemoteDocument> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DiscrepancyError::ExtractionFailed("Invalid file name".to_string()))?;

        if !path.is_file() {
            return Err(DiscrepancyError::SourceNotFound(format!(
                "Document file {} does not exist",
                path.display()
            )));
        }

        let file_size = fs::metadata(path).await?.len();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let file_bytes = fs::read(path).await?;

        debug!("Uploading {} ({} bytes, {})", file_name, file_size, mime_type);

        let start_url = format!("{}?key={}", GEMINI_UPLOAD_URL, self.api_key);
        let metadata = json!({ "file": { "display_name": file_name } });

        let init_res = self
            .client
            .post(&start_url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", file_size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", &mime_type)
            .header("Content-Type", "application/json")
            .json(&metadata)
            .send()
            .await?;

        let init_status = init_res.status();
        if !init_status.is_success() {
            let error_text = init_res.text().await?;
            return Err(DiscrepancyError::ExtractionFailed(format!(
                "Upload init failed (status {}): {}",
                init_status, error_text
            )));
        }

        let upload_url = init_res
            .headers()
            .get("x-goog-upload-url")
            .ok_or_else(|| {
                DiscrepancyError::ExtractionFailed("No upload URL in headers".to_string())
            })?
            .to_str()
            .map_err(|e| DiscrepancyError::ExtractionFailed(e.to_string()))?
            .to_string();

        let upload_res = self
            .client
            .post(&upload_url)
            .header("Content-Length", file_size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(file_bytes)
            .send()
            .await?;

        let upload_status = upload_res.status();
        if !upload_status.is_success() {
            let error_text = upload_res.text().await?;
            return Err(DiscrepancyError::ExtractionFailed(format!(
                "File upload failed (status {}): {}",
                upload_status, error_text
            )));
        }

        let upload_body: serde_json::Value = upload_res.json().await?;
        let file_obj = upload_body.get("file").ok_or_else(|| {
            DiscrepancyError::ExtractionFailed("Upload response missing 'file'".to_string())
        })?;

        let uri = string_field(file_obj, "uri")?;
        let name = string_field(file_obj, "name")?;
        let mut state = file_obj
            .get("state")
            .and_then(|v| v.as_str())
            .unwrap_or("PROCESSING")
            .to_string();

        let mut polls = 0;
        while state != "ACTIVE" {
            if polls == MAX_STATE_POLLS {
                return Err(DiscrepancyError::ExtractionFailed(format!(
                    "File {} did not become active",
                    name
                )));
            }
            polls += 1;

            let check_url = format!("{}/{}?key={}", self.base_url, name, self.api_key);
            let check_json: serde_json::Value =
                self.client.get(&check_url).send().await?.json().await?;
            let file_obj = check_json.get("file").unwrap_or(&check_json);
            state = file_obj
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or("PROCESSING")
                .to_string();

            match state.as_str() {
                "ACTIVE" => break,
                "FAILED" => {
                    return Err(DiscrepancyError::ExtractionFailed(
                        "Google failed to process the file".to_string(),
                    ))
                }
                _ => sleep(Duration::from_secs(2)).await,
            }
        }

        Ok(RemoteDocument {
            uri,
            name,
            display_name: file_name.to_string(),
            mime_type,
            state,
        })
    }

    pub(crate) async fn generate_content(
        &self,
        model: &str,
        system_prompt: &str,
        messages: Vec<Content>,
        response_schema: Option<serde_json::Value>,
    ) -> Result<String> {
        let payload = build_request(system_prompt, messages, response_schema);
        let res = self
            .client
            .post(self.generate_url(model))
            .json(&payload)
            .send()
            .await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(DiscrepancyError::ExtractionFailed(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        first_text(res.json().await?)
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }
}

/// JSON-mode request: the system prompt travels as `systemInstruction`.
fn build_request(
    system_prompt: &str,
    messages: Vec<Content>,
    response_schema: Option<serde_json::Value>,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: messages,
        system_instruction: Some(Content::user(system_prompt)),
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema,
        },
    }
}

fn first_text(body: GenerateContentResponse) -> Result<String> {
    let part = body
        .candidates
        .ok_or_else(|| DiscrepancyError::ExtractionFailed("No candidates returned".to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| DiscrepancyError::ExtractionFailed("Empty candidates list".to_string()))?
        .content
        .parts
        .into_iter()
        .next()
        .ok_or_else(|| DiscrepancyError::ExtractionFailed("No parts in content".to_string()))?;

    match part {
        Part::Text { text } => Ok(text),
        _ => Err(DiscrepancyError::ExtractionFailed(
            "Model returned non-text content".to_string(),
        )),
    }
}

fn string_field(obj: &serde_json::Value, key: &str) -> Result<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            DiscrepancyError::ExtractionFailed(format!("Upload response missing {}", key))
        })
}
