//! Compile worker.
//!
//! This crate provides:
//! - The compile pipeline (fetch, animate, normalize, concatenate)
//! - Per-job scratch workspaces
//! - Structured job logging and pipeline metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{content_disposition, CompilePipeline, CompiledVideo};
pub use workspace::JobWorkspace;
