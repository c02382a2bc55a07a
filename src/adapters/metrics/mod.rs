//! Metrics Adapters - Prometheus Export and Health State
//!
//! - `prometheus`: counter registry + text exposition for /metrics
//! - `health`: shared liveness/readiness flags for /live and /ready

pub mod health;
pub mod prometheus;

pub use health::HealthState;
pub use prometheus::MetricsRegistry;
