use axum::http::HeaderMap;

use crate::config::IdentityConfig;
use crate::decision::Identity;

/// Read the caller's identity from the trusted headers set by the
/// authentication layer. Missing or non-UTF-8 values read as empty, which
/// never qualifies for masking.
pub fn extract_identity(headers: &HeaderMap, config: &IdentityConfig) -> Identity {
    Identity::new(
        header_value(headers, &config.subject_header),
        header_value(headers, &config.role_header),
    )
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}
