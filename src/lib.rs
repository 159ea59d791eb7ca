//! PII-masking response gateway.
//!
//! Upstream JSON responses are scanned for personal data (email, phone,
//! national id, IPv4, coordinates) and redacted for roles that must not see
//! it. Every request leaves one [`decision::DecisionRecord`] in the audit
//! trail.

pub mod audit;
pub mod cli;
pub mod config;
pub mod decision;
pub mod detect;
pub mod error;
pub mod mask;
pub mod pii;
pub mod pipeline;
pub mod server;
pub mod walker;

pub use decision::{Decision, DecisionRecord, Identity, RequestInfo};
pub use error::{CloakError, Result};
pub use pii::PiiType;
pub use pipeline::{InterceptOutcome, Interceptor, MaskingPolicy, UpstreamResponse};
pub use walker::{JsonMasker, MaskingReport};
