//! Filesystem helpers shared by the stages.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Create the parent directory of `path` if it does not exist yet.
pub async fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Remove a file, ignoring errors. Used to drop partial outputs.
pub async fn remove_file_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b").join("file.mp4");

        ensure_parent_dir(&target).await.unwrap();

        assert!(target.parent().unwrap().is_dir());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_bare_file_name() {
        ensure_parent_dir(Path::new("file.mp4")).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_file_quietly() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("partial.bin");
        fs::write(&file, b"abc").await.unwrap();

        remove_file_quietly(&file).await;
        assert!(!file.exists());

        // Missing file is fine
        remove_file_quietly(&file).await;
    }
}
