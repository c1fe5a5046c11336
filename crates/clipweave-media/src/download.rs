//! Asset fetching.
//!
//! Retrieves one remote asset into the job workspace, byte for byte. There is
//! no retry: a failed fetch fails the job.

use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_parent_dir, remove_file_quietly};

/// Default whole-request timeout for a single asset.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP(S) and local-file asset fetcher.
///
/// `file://` URLs are copied from disk; the transport uses them for images it
/// received inline.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("clipweave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MediaError::invalid_input(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` into `dest`, creating parent directories.
    ///
    /// Returns the number of bytes written. On failure no file is left at `dest`.
    pub async fn fetch_to_file(&self, url: &str, dest: impl AsRef<Path>) -> MediaResult<u64> {
        let dest = dest.as_ref();
        let parsed = Url::parse(url)
            .map_err(|e| MediaError::fetch_failed(url, None, format!("invalid URL: {}", e)))?;

        ensure_parent_dir(dest).await?;

        let result = match parsed.scheme() {
            "http" | "https" => self.fetch_http(url, dest).await,
            "file" => copy_local(&parsed, url, dest).await,
            other => Err(MediaError::fetch_failed(
                url,
                None,
                format!("unsupported URL scheme '{}'", other),
            )),
        };

        match result {
            Ok(bytes) => {
                info!("Fetched {} ({} bytes) -> {}", url, bytes, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                remove_file_quietly(dest).await;
                Err(e)
            }
        }
    }

    async fn fetch_http(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        debug!("GET {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::fetch_failed(url, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::fetch_failed(
                url,
                Some(status.as_u16()),
                format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MediaError::fetch_failed(url, Some(status.as_u16()), e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}

async fn copy_local(parsed: &Url, url: &str, dest: &Path) -> MediaResult<u64> {
    let source = parsed
        .to_file_path()
        .map_err(|_| MediaError::fetch_failed(url, None, "not a local file path"))?;

    tokio::fs::copy(&source, dest)
        .await
        .map_err(|e| MediaError::fetch_failed(url, None, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> AssetFetcher {
        AssetFetcher::new(Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_exact_bytes() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("img_0.png");

        let written = fetcher()
            .fetch_to_file(&format!("{}/a.png", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_404_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("img_0.png");

        let err = fetcher()
            .fetch_to_file(&format!("{}/missing.png", server.uri()), &dest)
            .await
            .unwrap_err();

        assert_eq!(err.fetch_status(), Some(404));
        assert!(err.to_string().contains("404 Not Found"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_local_file_url() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("inline.png");
        std::fs::write(&source, b"\x89PNG fake").unwrap();
        let url = Url::from_file_path(&source).unwrap();
        let dest = dir.path().join("job").join("img_0.png");

        let written = fetcher().fetch_to_file(url.as_str(), &dest).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&dest).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_fetch_rejects_unknown_scheme() {
        let dir = TempDir::new().unwrap();
        let err = fetcher()
            .fetch_to_file("ftp://example.com/a.png", dir.path().join("a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Fetch { status: None, .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_garbage_url() {
        let dir = TempDir::new().unwrap();
        let err = fetcher()
            .fetch_to_file("not a url", dir.path().join("a.png"))
            .await
            .unwrap_err();
        assert_eq!(err.stage_label(), "fetch");
    }
}
