use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::audit::{AuditSink, JsonlAuditLog, MemoryAuditSink};
use crate::decision::{Identity, RequestInfo};
use crate::error::Result;
use crate::pipeline::{Interceptor, MaskingPolicy, UpstreamResponse};

/// Options for an offline pipeline run.
#[derive(Debug, Clone)]
pub struct MaskArgs<'a> {
    pub role: &'a str,
    pub subject: &'a str,
    pub content_type: &'a str,
    pub method: &'a str,
    pub endpoint: &'a str,
    pub masked_roles: Vec<String>,
    pub input: Option<&'a Path>,
    pub audit_path: Option<&'a Path>,
}

/// Run a body through the interception pipeline as if it came from upstream.
/// The resulting body goes to stdout, the decision record to stderr.
pub async fn run_mask(args: MaskArgs<'_>) -> Result<()> {
    let body = match args.input {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let sink: Arc<dyn AuditSink> = match args.audit_path {
        Some(path) => Arc::new(JsonlAuditLog::new(path)),
        None => Arc::new(MemoryAuditSink::new()),
    };
    let interceptor = Interceptor::new(MaskingPolicy::new(args.masked_roles), sink);

    let outcome = interceptor
        .intercept(
            &Identity::new(args.subject, args.role),
            &RequestInfo::new(args.method, args.endpoint),
            UpstreamResponse::new(200, Some(args.content_type), body),
        )
        .await;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&outcome.body)?;
    stdout.flush()?;

    eprintln!("{}", serde_json::to_string(&outcome.record)?);
    Ok(())
}
