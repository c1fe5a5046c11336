//! Worker error types.

use thiserror::Error;

use clipweave_media::MediaError;
use clipweave_models::JobStage;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// A pipeline stage failed; the job was aborted there.
    #[error("{stage} stage failed: {source}")]
    Stage { stage: JobStage, source: MediaError },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn stage(stage: JobStage, source: MediaError) -> Self {
        Self::Stage { stage, source }
    }

    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::Workspace(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stage the job failed in, if it got past workspace setup.
    pub fn failed_stage(&self) -> Option<JobStage> {
        match self {
            WorkerError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Underlying media error, if any.
    pub fn media_error(&self) -> Option<&MediaError> {
        match self {
            WorkerError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}
