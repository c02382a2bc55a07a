//! Health Probes - Liveness and Readiness State
//!
//! Shared health flags polled by the /live and /ready endpoints of
//! the API server. Readiness tracks store health; liveness only
//! requires the process to respond.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Whether the persistence layer is reachable and writable.
    pub store_healthy: Arc<AtomicBool>,
    /// Whether the engine is accepting requests (false during drain).
    pub accepting_requests: Arc<AtomicBool>,
}

impl HealthState {
    /// Create a new health state (all healthy by default).
    pub fn new() -> Self {
        Self {
            store_healthy: Arc::new(AtomicBool::new(true)),
            accepting_requests: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Check if the system is ready to serve traffic.
    pub fn is_ready(&self) -> bool {
        self.store_healthy.load(Ordering::Relaxed)
            && self.accepting_requests.load(Ordering::Relaxed)
    }

    /// Mark the store unhealthy/healthy from a background probe.
    pub fn set_store_healthy(&self, healthy: bool) {
        self.store_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Begin draining: readiness flips false, liveness stays true.
    pub fn start_drain(&self) {
        self.accepting_requests.store(false, Ordering::Relaxed);
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
