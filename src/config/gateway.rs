use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{CloakError, Result};
use crate::pipeline::MaskingPolicy;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cloakgate.yml";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the gateway listens on. Default: 127.0.0.1:8080.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Base URL requests are forwarded to.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Seconds to wait for the upstream before answering 502. Default: 30.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Roles whose JSON responses are masked. Compared case-insensitively.
    #[serde(default = "default_masked_roles")]
    pub masked_roles: Vec<String>,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
fn default_upstream_url() -> String {
    "http://127.0.0.1:5000".into()
}
fn default_upstream_timeout() -> u64 {
    30
}
fn default_masked_roles() -> Vec<String> {
    vec!["Analyst".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream_url: default_upstream_url(),
            upstream_timeout_secs: default_upstream_timeout(),
            masked_roles: default_masked_roles(),
            identity: IdentityConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&contents).map_err(|e| CloakError::ConfigParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://")) {
            return Err(CloakError::InvalidConfig {
                reason: format!("upstream_url must be http(s): {}", self.upstream_url),
            });
        }
        if self.identity.subject_header.is_empty() || self.identity.role_header.is_empty() {
            return Err(CloakError::InvalidConfig {
                reason: "identity headers must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn masking_policy(&self) -> MaskingPolicy {
        MaskingPolicy::new(self.masked_roles.clone())
    }
}

/// Headers carrying the identity established by the token-validation layer
/// in front of the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub subject_header: String,
    pub role_header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            subject_header: "x-subject-id".into(),
            role_header: "x-role".into(),
        }
    }
}

/// Where decision records go. No path means log-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("audit").join("decisions.jsonl")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = GatewayConfig::load_from(&tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.masked_roles, vec!["Analyst"]);
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.identity.role_header, "x-role");
    }

    #[test]
    fn test_partial_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "upstream_url: http://backend:9000\nmasked_roles: [Analyst, Auditor]\naudit:\n  path: null\n",
        )
        .unwrap();

        let config = GatewayConfig::load_from(&path).unwrap();
        assert_eq!(config.upstream_url, "http://backend:9000");
        assert!(config.masking_policy().masks_role("auditor"));
        assert!(config.audit.path.is_none());
        assert_eq!(config.upstream_timeout_secs, 30);
    }

    #[test]
    fn test_bad_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "listen: [not, an, address]").unwrap();
        assert!(matches!(
            GatewayConfig::load_from(&path),
            Err(CloakError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_bad_upstream_scheme() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "upstream_url: ftp://files\n").unwrap();
        assert!(matches!(
            GatewayConfig::load_from(&path),
            Err(CloakError::InvalidConfig { .. })
        ));
    }
}
