use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CloakError {
    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid pattern: {reason}")]
    InvalidPattern { reason: String },

    #[error("upstream error: {reason}")]
    Upstream { reason: String },

    #[error("audit error: {reason}")]
    Audit { reason: String },

    #[error("audit chain broken at line {line}: {reason}")]
    AuditChain { line: usize, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloakError>;
