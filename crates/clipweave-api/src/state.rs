//! Application state.

use std::sync::Arc;

use clipweave_worker::{CompilePipeline, WorkerConfig, WorkerResult};

use crate::config::ApiConfig;
use crate::inline::InlineImageStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<CompilePipeline>,
    pub inline_images: InlineImageStore,
}

impl AppState {
    /// Create new application state backed by real ffmpeg processes.
    pub fn new(config: ApiConfig, worker_config: WorkerConfig) -> WorkerResult<Self> {
        let pipeline = CompilePipeline::new(worker_config)?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create state around an existing pipeline.
    pub fn with_pipeline(config: ApiConfig, pipeline: CompilePipeline) -> Self {
        let inline_images = InlineImageStore::new(pipeline.config().work_dir.join("inline"));

        Self {
            config,
            pipeline: Arc::new(pipeline),
            inline_images,
        }
    }
}
