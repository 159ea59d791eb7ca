use std::path::Path;

use crate::config::GatewayConfig;
use crate::error::Result;

/// Load the config and run the gateway until Ctrl+C.
pub async fn run_serve(config_path: &Path) -> Result<()> {
    let config = GatewayConfig::load_from(config_path)?;
    if !config_path.exists() {
        tracing::info!(
            path = %config_path.display(),
            "config file not found, using defaults"
        );
    }
    crate::server::serve(config).await
}
