use anyhow::{Context, Result, bail};
use schemars::{Schema, schema_for};
use std::net::SocketAddr;
use std::path::Path;
use tracing::debug;

use super::models::Config;

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!(target: "keypilot::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Config model (for external validation or tooling).
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Parse the configured bind address.
pub fn bind_addr(cfg: &Config) -> Result<SocketAddr> {
    cfg.bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", cfg.bind))
}

/// Perform basic sanity checks on a loaded configuration.
pub fn validate_config(cfg: &Config) -> Result<()> {
    bind_addr(cfg)?;

    if cfg.stop_grace_ms == 0 {
        bail!("stop_grace_ms must be greater than zero");
    }

    let screen = cfg.dry_run_screen;
    if screen.width <= 0 || screen.height <= 0 {
        bail!(
            "dry_run_screen must have positive dimensions, got {}x{}",
            screen.width,
            screen.height
        );
    }

    Ok(())
}
