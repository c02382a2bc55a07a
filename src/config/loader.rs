//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    service = %config.service.name,
    chain_id = config.engine.chain_id,
    contract = %config.engine.verifying_contract,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.is_empty(),
    "service.name must not be empty"
  );

  anyhow::ensure!(config.engine.chain_id > 0, "engine.chain_id must be positive");
  anyhow::ensure!(
    config
      .engine
      .verifying_contract
      .parse::<alloy::primitives::Address>()
      .is_ok(),
    "engine.verifying_contract is not a valid address: {}",
    config.engine.verifying_contract
  );
  anyhow::ensure!(
    !config.engine.domain_name.is_empty(),
    "engine.domain_name must not be empty"
  );

  anyhow::ensure!(config.server.port > 0, "server.port must be positive");

  anyhow::ensure!(
    config.limits.max_depth_levels > 0,
    "limits.max_depth_levels must be positive"
  );
  anyhow::ensure!(
    config.limits.max_reconcile_batch > 0,
    "limits.max_reconcile_batch must be positive"
  );

  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "persistence.data_dir must not be empty"
  );

  Ok(())
}
