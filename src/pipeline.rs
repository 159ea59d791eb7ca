//! Response interception.
//!
//! Per request: `Forwarding -> Buffered -> {Bypassed | Masked} -> Recorded`.
//! The upstream body is held in full before anything reaches the caller.
//! Masking applies only when the body is JSON and the caller's role is in the
//! masked set; every other combination passes the bytes through untouched.
//! Exactly one [`DecisionRecord`] is handed to the audit sink per request,
//! on both terminal paths. [`Interceptor::run_detached`] keeps that true when
//! the caller stops waiting part way through.

use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;

use crate::audit::AuditSink;
use crate::decision::{Decision, DecisionRecord, Identity, RequestInfo};
use crate::error::Result;
use crate::walker::JsonMasker;

const JSON_CONTENT_TYPE: &str = "application/json";
const UTF8_BOM: &str = "\u{feff}";

/// What the upstream collaborator returned, fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// Remaining headers to relay to the caller.
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(String::from),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Stand-in answer when the upstream could not be reached.
    pub fn bad_gateway() -> Self {
        Self::new(502, Some("text/plain; charset=utf-8"), "bad gateway")
    }
}

/// Which roles get redacted responses.
#[derive(Debug, Clone)]
pub struct MaskingPolicy {
    masked_roles: Vec<String>,
}

impl Default for MaskingPolicy {
    fn default() -> Self {
        Self::new(vec!["Analyst".to_string()])
    }
}

impl MaskingPolicy {
    pub fn new(masked_roles: Vec<String>) -> Self {
        Self { masked_roles }
    }

    pub fn masks_role(&self, role: &str) -> bool {
        !role.is_empty() && self.masked_roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// JSON body and a masked role, both compared case-insensitively.
    pub fn is_eligible(&self, content_type: Option<&str>, role: &str) -> bool {
        is_json(content_type) && self.masks_role(role)
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.get(..JSON_CONTENT_TYPE.len()))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}

/// The body to send back and the record describing it.
#[derive(Debug, Clone)]
pub struct InterceptOutcome {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// True when `body` differs from what upstream sent; any upstream
    /// content-length no longer applies.
    pub body_replaced: bool,
    pub record: DecisionRecord,
}

pub struct Interceptor {
    policy: MaskingPolicy,
    masker: JsonMasker<'static>,
    sink: Arc<dyn AuditSink>,
}

impl Interceptor {
    pub fn new(policy: MaskingPolicy, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            policy,
            masker: JsonMasker::default(),
            sink,
        }
    }

    pub fn policy(&self) -> &MaskingPolicy {
        &self.policy
    }

    /// Drive a request end to end: await the upstream, decide, record.
    ///
    /// An upstream failure is answered with 502 and still recorded.
    pub async fn run<F>(&self, identity: &Identity, request: &RequestInfo, forward: F) -> InterceptOutcome
    where
        F: Future<Output = Result<UpstreamResponse>>,
    {
        let upstream = match forward.await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(endpoint = %request.endpoint, error = %e, "upstream request failed");
                UpstreamResponse::bad_gateway()
            }
        };
        self.intercept(identity, request, upstream).await
    }

    /// [`run`](Self::run) on its own task. Dropping the returned future does
    /// not cancel the upstream call, the masking, or the audit write.
    pub async fn run_detached<F>(
        self: Arc<Self>,
        identity: Identity,
        request: RequestInfo,
        forward: F,
    ) -> InterceptOutcome
    where
        F: Future<Output = Result<UpstreamResponse>> + Send + 'static,
    {
        let task = tokio::spawn({
            let this = Arc::clone(&self);
            let identity = identity.clone();
            let request = request.clone();
            async move { this.run(&identity, &request, forward).await }
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(endpoint = %request.endpoint, error = %e, "interception task failed");
                self.intercept(&identity, &request, UpstreamResponse::bad_gateway())
                    .await
            }
        }
    }

    /// Decide on a buffered response and hand the record to the sink.
    pub async fn intercept(
        &self,
        identity: &Identity,
        request: &RequestInfo,
        upstream: UpstreamResponse,
    ) -> InterceptOutcome {
        let outcome = self.decide(identity, request, upstream);
        self.record(&outcome.record).await;
        outcome
    }

    /// The synchronous part: bypass or mask. Never fails.
    pub fn decide(
        &self,
        identity: &Identity,
        request: &RequestInfo,
        upstream: UpstreamResponse,
    ) -> InterceptOutcome {
        let UpstreamResponse {
            status,
            content_type,
            headers,
            body,
        } = upstream;

        if !self.policy.is_eligible(content_type.as_deref(), &identity.role) {
            return InterceptOutcome {
                status,
                content_type,
                headers,
                body,
                body_replaced: false,
                record: DecisionRecord::allow(identity, request, status),
            };
        }

        match self.mask_body(&body) {
            Some((masked, report)) => {
                let record = DecisionRecord::from_report(identity, request, report, status);
                tracing::debug!(
                    endpoint = %request.endpoint,
                    masked_count = record.masked_count,
                    decision = %record.decision,
                    "masked response body"
                );
                InterceptOutcome {
                    status,
                    content_type,
                    headers,
                    body: Bytes::from(masked),
                    body_replaced: true,
                    record,
                }
            }
            None => InterceptOutcome {
                status,
                content_type,
                headers,
                body,
                body_replaced: false,
                record: DecisionRecord::allow(identity, request, status),
            },
        }
    }

    /// `None` when the body is not UTF-8 JSON; the caller then passes the
    /// original bytes through.
    fn mask_body(&self, body: &[u8]) -> Option<(String, crate::walker::MaskingReport)> {
        let text = match std::str::from_utf8(body) {
            Ok(text) => text.strip_prefix(UTF8_BOM).unwrap_or(text),
            Err(e) => {
                tracing::debug!(error = %e, "response body is not UTF-8, passing through");
                return None;
            }
        };
        match self.masker.mask_json(text) {
            Ok(masked) => Some(masked),
            Err(e) => {
                tracing::debug!(error = %e, "response body is not valid JSON, passing through");
                None
            }
        }
    }

    /// Hand the record to the sink on its own task so a dropped request
    /// future does not cancel the write. Failures are logged only.
    async fn record(&self, record: &DecisionRecord) {
        let sink = Arc::clone(&self.sink);
        let owned = record.clone();
        let write = tokio::spawn(async move { sink.record(&owned).await });

        match write.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    sink = self.sink.name(),
                    id = %record.id,
                    error = %e,
                    "audit write failed"
                );
            }
            Err(e) => {
                tracing::warn!(sink = self.sink.name(), id = %record.id, error = %e, "audit task failed");
            }
        }
    }
}

impl InterceptOutcome {
    pub fn decision(&self) -> Decision {
        self.record.decision
    }
}
