//! Axum HTTP API server.
//!
//! This crate provides:
//! - `POST /compile`, streaming the compiled MP4 back
//! - Inline `data:` image support
//! - Health checks and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod inline;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
