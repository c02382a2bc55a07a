//! API Adapter - The Engine's HTTP Boundary
//!
//! Serves the logical engine operations over axum with strongly-typed
//! request schemas validated before any domain logic runs:
//! - `types`: serde DTOs + boundary field coercion
//! - `routes`: router, handlers, and the error -> status mapping

pub mod routes;
pub mod types;

pub use routes::{ApiError, AppState, EngineDomain, router};
