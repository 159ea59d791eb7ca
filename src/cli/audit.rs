use std::path::Path;

use crate::audit::JsonlAuditLog;
use crate::error::{CloakError, Result};

/// Print the last `limit` records, oldest first.
pub fn run_list(path: &Path, limit: usize) -> Result<()> {
    let log = JsonlAuditLog::new(path);
    let records = log.load_records()?;

    if records.is_empty() {
        println!("No decisions recorded.");
        return Ok(());
    }

    let skip = records.len().saturating_sub(limit);
    for record in &records[skip..] {
        println!(
            "[{}] {} {} {} -> {} (masked: {}, status: {}) subject={} role={}",
            record.timestamp_utc.format("%Y-%m-%d %H:%M:%S"),
            record.id,
            record.method,
            record.endpoint,
            record.decision,
            record.masked_count,
            record.status_code,
            record.subject_user_id,
            record.role,
        );
        if !record.pii_types_found.is_empty() {
            let types: Vec<String> = record
                .pii_types_found
                .iter()
                .map(|t| t.to_string())
                .collect();
            println!("  types: {}", types.join(", "));
            println!("  fields: {}", record.masked_fields.join(", "));
        }
    }

    println!("{} of {} decision(s)", records.len() - skip, records.len());
    Ok(())
}

/// Verify the hash chain. Exits 1 when it is broken.
pub fn run_verify(path: &Path) -> Result<()> {
    let log = JsonlAuditLog::new(path);
    match log.verify() {
        Ok(count) => {
            eprintln!("cloakgate: audit chain intact ({} entries)", count);
            Ok(())
        }
        Err(CloakError::AuditChain { line, reason }) => {
            eprintln!(
                "cloakgate: audit chain broken at {}:{}: {}",
                path.display(),
                line,
                reason
            );
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}
