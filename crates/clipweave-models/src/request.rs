//! Compile request model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::encoding::DEFAULT_IMAGE_DURATION_SECS;

/// Errors raised when a compile request is malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Provide images[] and/or videos[] URLs.")]
    NoAssets,

    #[error("imageDurationSec must be a positive number, got {0}")]
    InvalidImageDuration(f64),

    #[error("Empty asset URL at {field}[{index}]")]
    EmptyUrl { field: &'static str, index: usize },

    #[error("Unsupported asset URL at {field}[{index}]: only http and https are accepted")]
    UnsupportedUrl { field: &'static str, index: usize },
}

/// Whether `entry` is an inline `data:` image, resolved by the transport
/// before the pipeline runs.
pub fn is_data_url(entry: &str) -> bool {
    entry
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

fn is_remote_url(entry: &str) -> bool {
    Url::parse(entry.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// A request to compile remote images and videos into one video.
///
/// Images become fixed-duration clips and come first in the output, followed by
/// the videos, both in the order given here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,

    /// Video URLs
    #[serde(default)]
    pub videos: Vec<String>,

    /// Duration of each image clip in seconds
    #[serde(default = "default_image_duration")]
    pub image_duration_sec: f64,

    /// Reserved for a future voiceover track. Accepted and ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_url: Option<String>,
}

fn default_image_duration() -> f64 {
    DEFAULT_IMAGE_DURATION_SECS
}

impl Default for CompileRequest {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            videos: Vec::new(),
            image_duration_sec: DEFAULT_IMAGE_DURATION_SECS,
            voiceover_url: None,
        }
    }
}

impl CompileRequest {
    /// Create a request for the given images and videos with default timing.
    pub fn new(images: Vec<String>, videos: Vec<String>) -> Self {
        Self {
            images,
            videos,
            ..Default::default()
        }
    }

    /// Returns a new request with a different per-image duration.
    pub fn with_image_duration(mut self, secs: f64) -> Self {
        self.image_duration_sec = secs;
        self
    }

    /// Total number of assets referenced by the request.
    pub fn asset_count(&self) -> usize {
        self.images.len() + self.videos.len()
    }

    /// Validate the request.
    ///
    /// Every entry must be an `http`/`https` URL; `images` may also hold
    /// `data:` URLs.
    ///
    /// This is the transport boundary's job; the pipeline assumes a
    /// validated request.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.images.is_empty() && self.videos.is_empty() {
            return Err(RequestError::NoAssets);
        }

        if !self.image_duration_sec.is_finite() || self.image_duration_sec <= 0.0 {
            return Err(RequestError::InvalidImageDuration(self.image_duration_sec));
        }

        for (field, urls) in [("images", &self.images), ("videos", &self.videos)] {
            for (index, url) in urls.iter().enumerate() {
                if url.trim().is_empty() {
                    return Err(RequestError::EmptyUrl { field, index });
                }

                // Local paths and other schemes would read the server's own disk
                let inline_image = field == "images" && is_data_url(url);
                if !inline_image && !is_remote_url(url) {
                    return Err(RequestError::UnsupportedUrl { field, index });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let req: CompileRequest =
            serde_json::from_str(r#"{"images":["https://x/a.png"]}"#).unwrap();
        assert_eq!(req.images.len(), 1);
        assert!(req.videos.is_empty());
        assert_eq!(req.image_duration_sec, 5.0);
        assert!(req.voiceover_url.is_none());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let req: CompileRequest = serde_json::from_str(
            r#"{"videos":["https://x/v.mp4"],"imageDurationSec":3,"voiceoverUrl":"https://x/vo.mp3"}"#,
        )
        .unwrap();
        assert_eq!(req.image_duration_sec, 3.0);
        assert_eq!(req.voiceover_url.as_deref(), Some("https://x/vo.mp3"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_assets() {
        assert_eq!(CompileRequest::default().validate(), Err(RequestError::NoAssets));
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let req = CompileRequest::new(vec!["https://x/a.png".into()], vec![])
            .with_image_duration(0.0);
        assert!(matches!(
            req.validate(),
            Err(RequestError::InvalidImageDuration(_))
        ));

        let req = req.with_image_duration(f64::NAN);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_url() {
        let req = CompileRequest::new(vec![], vec!["https://x/v.mp4".into(), " ".into()]);
        assert_eq!(
            req.validate(),
            Err(RequestError::EmptyUrl {
                field: "videos",
                index: 1
            })
        );
    }

    #[test]
    fn test_validate_rejects_local_and_odd_schemes() {
        for bad in ["file:///etc/passwd", "/etc/passwd", "ftp://x/v.mp4", "https://"] {
            let req = CompileRequest::new(vec![], vec![bad.to_string()]);
            assert_eq!(
                req.validate(),
                Err(RequestError::UnsupportedUrl {
                    field: "videos",
                    index: 0
                }),
                "{}",
                bad
            );
        }

        let req = CompileRequest::new(vec!["https://x/a.png".into(), "file:///tmp/a.png".into()], vec![]);
        assert_eq!(
            req.validate(),
            Err(RequestError::UnsupportedUrl {
                field: "images",
                index: 1
            })
        );
    }

    #[test]
    fn test_validate_allows_inline_images_only() {
        let req = CompileRequest::new(vec!["data:image/png;base64,aGVsbG8=".into()], vec![]);
        assert!(req.validate().is_ok());

        let req = CompileRequest::new(vec![], vec!["data:video/mp4;base64,AAAA".into()]);
        assert!(matches!(req.validate(), Err(RequestError::UnsupportedUrl { .. })));
    }
}
