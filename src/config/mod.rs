//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. The signing
//! domain (chain id, verifying contract) and every operational limit
//! are externalized here - nothing is hardcoded in the domain layer.

pub mod loader;

use serde::Deserialize;

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the engine begins serving.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Signing domain the engine serves.
  pub engine: EngineConfig,
  /// HTTP server binding.
  pub server: ServerConfig,
  /// Request and retry limits.
  #[serde(default)]
  pub limits: LimitsConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// The single (chain, contract) signing domain this instance serves.
///
/// One engine process backs one settlement contract on one chain;
/// requests targeting anything else are rejected at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// EVM chain id of the settlement contract.
  pub chain_id: u64,
  /// Settlement contract address (0x hex).
  pub verifying_contract: String,
  /// EIP-712 domain name.
  #[serde(default = "default_domain_name")]
  pub domain_name: String,
  /// EIP-712 domain version.
  #[serde(default = "default_domain_version")]
  pub domain_version: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Bind address.
  #[serde(default = "default_bind")]
  pub bind: String,
  /// Listen port.
  #[serde(default = "default_port")]
  pub port: u16,
}

/// Request and retry limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
  /// Hard cap on depth levels per request.
  #[serde(default = "default_depth_levels")]
  pub max_depth_levels: usize,
  /// Conditional-update retries before surfacing a conflict.
  #[serde(default = "default_fill_retries")]
  pub max_fill_retries: u32,
  /// Hard cap on events per reconcile batch.
  #[serde(default = "default_reconcile_batch")]
  pub max_reconcile_batch: usize,
}

impl Default for LimitsConfig {
  fn default() -> Self {
    Self {
      max_depth_levels: default_depth_levels(),
      max_fill_retries: default_fill_retries(),
      max_reconcile_batch: default_reconcile_batch(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the trade journal and book snapshots.
  pub data_dir: String,
  /// Seconds between periodic book snapshots (0 disables).
  #[serde(default = "default_snapshot_interval")]
  pub snapshot_interval_secs: u64,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_domain_name() -> String {
  "Hybrid CLOB".to_string()
}

fn default_domain_version() -> String {
  "1".to_string()
}

fn default_bind() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  8080
}

fn default_depth_levels() -> usize {
  50
}

fn default_fill_retries() -> u32 {
  3
}

fn default_reconcile_batch() -> usize {
  500
}

fn default_snapshot_interval() -> u64 {
  60
}
