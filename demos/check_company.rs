use financial_discrepancy_checker::{CheckerConfig, DiscrepancyChecker};

/// Usage: check_company <company name> [document id]
///
/// Reads `DISCREPANCY_DATABASE_PATH` and `DISCREPANCY_DOCUMENTS_DIR` for the
/// stored records and the extracted documents.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let company_name = args.next().ok_or("usage: check_company <company name> [document id]")?;
    let document_id = args.next().unwrap_or_else(|| company_name.to_lowercase());

    let config = CheckerConfig::from_env();
    let checker = DiscrepancyChecker::new(
        config.record_store()?,
        config.document_extractor()?,
        config.field_mapper()?,
    );

    match checker.check(&company_name, &document_id) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.is_consistent() {
                eprintln!("✅ Uploaded document matches stored data");
            } else {
                eprintln!("⚠️  {} mismatched field(s):", report.mismatched_fields.len());
                for entry in &report.mismatched_fields {
                    eprintln!(
                        "   {}: uploaded {} / stored {}",
                        entry.field_name, entry.uploaded_value, entry.stored_value
                    );
                }
            }
        }
        Err(e) if e.is_client_error() => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
