use financial_discrepancy_checker::llm::{GeminiClient, GeminiExtractor};
use financial_discrepancy_checker::{CheckerConfig, DiscrepancyChecker, InMemoryExtractor};
use std::path::PathBuf;

/// Usage: gemini_check <company name> <document path>
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let company_name = args.next().ok_or("usage: gemini_check <company name> <document path>")?;
    let document_path = PathBuf::from(
        args.next()
            .ok_or("usage: gemini_check <company name> <document path>")?,
    );

    let config = CheckerConfig::from_env();
    let mapper = config.field_mapper()?;

    let client = GeminiClient::new(config.require_gemini_api_key()?);
    let extractor = GeminiExtractor::new(client, config.gemini_model.clone())
        .with_table(mapper.table().clone());

    println!("📤 Extracting {}...", document_path.display());
    let extracted = extractor.extract_file(&document_path).await?;

    let checker = DiscrepancyChecker::new(config.record_store()?, InMemoryExtractor::new(), mapper);
    let report = checker.check_extracted(&company_name, &extracted)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
