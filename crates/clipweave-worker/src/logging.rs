//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for compile jobs with
//! tracing spans and contextual information.

use std::time::Duration;

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipweave_models::{JobId, JobStage};

/// Install the global tracing subscriber.
///
/// JSON lines when `LOG_FORMAT=json`, colored text otherwise. `RUST_LOG`
/// overrides the default `clipweave=info` directive.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "clipweave=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a stage transition.
    pub fn log_stage(&self, stage: JobStage, items: usize) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = %stage,
            items,
            "Job stage: {}", stage
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    /// Log a job failure. `detail` (tool stderr) stays server side.
    pub fn log_failure(&self, stage: JobStage, message: &str, detail: Option<&str>) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = %stage,
            detail = detail.unwrap_or(""),
            "Job failed: {}", message
        );
    }

    /// Log the completion of a job operation.
    pub fn log_completion(&self, message: &str, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
