pub mod identity;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::audit::{AuditSink, JsonlAuditLog, TracingAuditSink};
use crate::config::{GatewayConfig, IdentityConfig};
use crate::decision::RequestInfo;
use crate::error::{CloakError, Result};
use crate::pipeline::{InterceptOutcome, Interceptor, UpstreamResponse};

pub use identity::extract_identity;

/// Largest inbound request body forwarded upstream.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Never copied between hops. `content-length` is recomputed from the final
/// body; `accept-encoding` is dropped so upstream bodies arrive uncompressed
/// and can be inspected.
const SKIPPED_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::ACCEPT_ENCODING,
];

/// Shared, read-only per-process state.
#[derive(Clone)]
pub struct AppState {
    interceptor: Arc<Interceptor>,
    client: reqwest::Client,
    upstream_url: Arc<str>,
    identity: Arc<IdentityConfig>,
}

impl AppState {
    pub fn new(config: &GatewayConfig, sink: Arc<dyn AuditSink>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()
            .map_err(|e| CloakError::Upstream {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            interceptor: Arc::new(Interceptor::new(config.masking_policy(), sink)),
            client,
            upstream_url: Arc::from(config.upstream_url.trim_end_matches('/')),
            identity: Arc::new(config.identity.clone()),
        })
    }
}

/// Pick the audit sink the config asks for.
pub fn audit_sink(config: &GatewayConfig) -> Arc<dyn AuditSink> {
    match &config.audit.path {
        Some(path) => Arc::new(JsonlAuditLog::new(path)),
        None => Arc::new(TracingAuditSink),
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(proxy)
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn serve(config: GatewayConfig) -> Result<()> {
    let sink = audit_sink(&config);
    tracing::info!(sink = sink.name(), "audit sink ready");

    let state = AppState::new(&config, sink)?;
    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!(
        listen = %config.listen,
        upstream = %config.upstream_url,
        masked_roles = ?config.masked_roles,
        "cloakgate listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("cloakgate shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let identity = extract_identity(&parts.headers, &state.identity);
    let info = RequestInfo::new(parts.method.as_str(), parts.uri.path());
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.upstream_url, path_and_query);

    let upstream = forward(
        state.client.clone(),
        parts.method,
        url,
        copy_headers(&parts.headers),
        body,
    );
    let outcome = Arc::clone(&state.interceptor)
        .run_detached(identity.clone(), info.clone(), upstream)
        .await;
    tracing::info!(
        method = %info.method,
        endpoint = %info.endpoint,
        role = %identity.role,
        status = outcome.status,
        decision = %outcome.decision(),
        masked_count = outcome.record.masked_count,
        "request handled"
    );
    into_response(outcome)
}

/// Send the request upstream and buffer the whole response.
async fn forward(
    client: reqwest::Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Body,
) -> Result<UpstreamResponse> {
    let body = axum::body::to_bytes(body, MAX_REQUEST_BODY)
        .await
        .map_err(|e| CloakError::Upstream {
            reason: format!("failed to read request body: {e}"),
        })?;
    let response = client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| CloakError::Upstream {
            reason: e.to_string(),
        })?;

    let status = response.status().as_u16();
    let headers = copy_headers(response.headers());
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response.bytes().await.map_err(|e| CloakError::Upstream {
        reason: format!("failed to read upstream body: {e}"),
    })?;
    Ok(UpstreamResponse::new(status, content_type.as_deref(), body).with_headers(headers))
}

fn copy_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if SKIPPED_HEADERS.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn into_response(outcome: InterceptOutcome) -> Response {
    let mut headers = outcome.headers;
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if let Some(content_type) = outcome
        .content_type
        .as_deref()
        .and_then(|ct| ct.parse::<HeaderValue>().ok())
    {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    if outcome.body_replaced {
        // upstream validators describe the unmasked body
        headers.remove(header::ETAG);
    }
    (status, headers, Body::from(outcome.body)).into_response()
}
