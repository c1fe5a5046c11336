//! Per-job scratch directory.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use clipweave_models::encoding::OUTPUT_FILE_NAME;
use clipweave_models::{AssetKind, JobId};

use crate::error::{WorkerError, WorkerResult};

/// Name of the concat manifest inside a workspace.
pub const MANIFEST_FILE_NAME: &str = "concat.txt";

/// Exclusively owned scratch directory holding every artifact of one job.
///
/// Nothing deletes it automatically; whoever receives the compiled video
/// decides when to call [`JobWorkspace::cleanup`].
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    job_id: JobId,
    dir: PathBuf,
}

impl JobWorkspace {
    /// Create `<root>/job-<id>`. Fails if that directory already exists.
    pub async fn create(root: impl AsRef<Path>, job_id: &JobId) -> WorkerResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await.map_err(|e| {
            WorkerError::workspace(format!("cannot create work dir {}: {}", root.display(), e))
        })?;

        let dir = root.join(format!("job-{}", job_id));
        fs::create_dir(&dir).await.map_err(|e| {
            WorkerError::workspace(format!("cannot create job dir {}: {}", dir.display(), e))
        })?;

        debug!(job_id = %job_id, "Created workspace {}", dir.display());

        Ok(Self {
            job_id: job_id.clone(),
            dir,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Where the `index`-th fetched asset of `kind` lands.
    pub fn asset_path(&self, kind: AssetKind, index: usize) -> PathBuf {
        self.dir.join(kind.scratch_name(index))
    }

    /// Clip made from the `index`-th image.
    pub fn image_clip_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("imgclip_{}.mp4", index))
    }

    /// Normalized form of the `index`-th clip in the combined list.
    pub fn normalized_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("norm_{}.mp4", index))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir.join(OUTPUT_FILE_NAME)
    }

    /// Delete the workspace and everything in it.
    pub async fn cleanup(self) -> WorkerResult<()> {
        fs::remove_dir_all(&self.dir).await?;
        debug!(job_id = %self.job_id, "Removed workspace {}", self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_workspace_layout() {
        let root = TempDir::new().unwrap();
        let job_id = JobId::from_string("abc");
        let ws = JobWorkspace::create(root.path().join("nested"), &job_id).await.unwrap();

        assert!(ws.path().is_dir());
        assert_eq!(ws.path(), root.path().join("nested").join("job-abc"));
        assert_eq!(ws.asset_path(AssetKind::Image, 2), ws.path().join("img_2.png"));
        assert_eq!(ws.asset_path(AssetKind::Video, 0), ws.path().join("vid_0.mp4"));
        assert_eq!(ws.image_clip_path(1), ws.path().join("imgclip_1.mp4"));
        assert_eq!(ws.normalized_path(3), ws.path().join("norm_3.mp4"));
        assert_eq!(ws.final_path(), ws.path().join("final.mp4"));
        assert_eq!(ws.manifest_path(), ws.path().join("concat.txt"));
    }

    #[tokio::test]
    async fn test_workspace_is_exclusive() {
        let root = TempDir::new().unwrap();
        let job_id = JobId::from_string("same");
        JobWorkspace::create(root.path(), &job_id).await.unwrap();

        let err = JobWorkspace::create(root.path(), &job_id).await.unwrap_err();
        assert!(matches!(err, WorkerError::Workspace(_)));
    }

    #[tokio::test]
    async fn test_cleanup_removes_everything() {
        let root = TempDir::new().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::new()).await.unwrap();
        let dir = ws.path().to_path_buf();
        fs::write(ws.final_path(), b"mp4").await.unwrap();

        ws.cleanup().await.unwrap();
        assert!(!dir.exists());
    }
}
