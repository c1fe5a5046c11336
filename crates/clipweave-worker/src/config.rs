//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use clipweave_media::download::DEFAULT_FETCH_TIMEOUT;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root under which each job gets its own scratch directory
    pub work_dir: PathBuf,
    /// Maximum items processed concurrently within one stage (1 = sequential)
    pub max_stage_parallel: usize,
    /// Kill an external tool after this long; `None` waits forever
    pub process_timeout: Option<Duration>,
    /// Whole-request timeout for fetching one asset
    pub fetch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            max_stage_parallel: 1,
            process_timeout: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("clipweave")
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_work_dir()),
            max_stage_parallel: std::env::var("WORKER_MAX_STAGE_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(1),
            process_timeout: std::env::var("WORKER_PROCESS_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            fetch_timeout: Duration::from_secs(
                std::env::var("WORKER_FETCH_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT.as_secs()),
            ),
        }
    }

    /// Returns a new config rooted at `work_dir`.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Returns a new config with a different per-stage concurrency limit.
    pub fn with_max_stage_parallel(mut self, n: usize) -> Self {
        self.max_stage_parallel = n.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sequential() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_stage_parallel, 1);
        assert!(config.process_timeout.is_none());
        assert!(config.work_dir.ends_with("clipweave"));
    }

    #[test]
    fn test_parallel_floor() {
        assert_eq!(WorkerConfig::default().with_max_stage_parallel(0).max_stage_parallel, 1);
    }
}
