pub mod jsonl;

use std::sync::Mutex;

use async_trait::async_trait;

use crate::decision::DecisionRecord;
use crate::error::Result;

pub use jsonl::JsonlAuditLog;

/// Destination for decision records. Invoked at most once per request.
///
/// Implementations own durability and any retry policy. A failed write is
/// logged by the caller and never changes the HTTP response.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &DecisionRecord) -> Result<()>;

    /// Name of this sink (for logging).
    fn name(&self) -> &str;
}

/// Emits each record as a structured log line. Used when no audit file is
/// configured.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &DecisionRecord) -> Result<()> {
        tracing::info!(
            id = %record.id,
            subject = %record.subject_user_id,
            role = %record.role,
            method = %record.method,
            endpoint = %record.endpoint,
            decision = %record.decision,
            masked_count = record.masked_count,
            status = record.status_code,
            "decision recorded"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Keeps records in memory, in the order they were written.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &DecisionRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
