//! Canonical encoding profile.
//!
//! Every clip entering the concat stage is re-encoded to exactly this profile,
//! because the final join is a stream copy and cannot reconcile mismatches.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical frame width in pixels
pub const CANONICAL_WIDTH: u32 = 1280;
/// Canonical frame height in pixels
pub const CANONICAL_HEIGHT: u32 = 720;
/// Canonical frame rate
pub const CANONICAL_FPS: u32 = 24;
/// Video codec (H.264)
pub const VIDEO_CODEC: &str = "libx264";
/// Encoding preset
pub const VIDEO_PRESET: &str = "veryfast";
/// Constant Rate Factor
pub const VIDEO_CRF: u8 = 21;
/// Pixel format
pub const PIXEL_FORMAT: &str = "yuv420p";
/// Letterbox pad color
pub const PAD_COLOR: &str = "black";

/// Audio codec
pub const AUDIO_CODEC: &str = "aac";
/// Audio sample rate in Hz
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
/// Audio channel layout
pub const AUDIO_CHANNEL_LAYOUT: &str = "stereo";

/// Default per-image clip duration in seconds.
pub const DEFAULT_IMAGE_DURATION_SECS: f64 = 5.0;
/// Shortest synthetic silent track we will ask ffmpeg to generate.
pub const MIN_SYNTHETIC_AUDIO_SECS: f64 = 0.01;
/// Synthetic track length used when the probed duration is zero or unknown.
pub const FALLBACK_SYNTHETIC_AUDIO_SECS: f64 = 5.0;

/// MIME type of the compiled output.
pub const OUTPUT_MIME_TYPE: &str = "video/mp4";
/// Suggested file name of the compiled output.
pub const OUTPUT_FILE_NAME: &str = "final.mp4";

/// Target video stream profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
}

impl VideoProfile {
    /// The single profile all output clips share.
    pub fn canonical() -> Self {
        Self {
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            fps: CANONICAL_FPS,
            codec: VIDEO_CODEC.to_string(),
            preset: VIDEO_PRESET.to_string(),
            crf: VIDEO_CRF,
            pixel_format: PIXEL_FORMAT.to_string(),
        }
    }

    /// Video filter chain: resample frame rate, fit inside the frame keeping
    /// aspect ratio, letterbox with black bars, then fix the pixel format.
    pub fn filter_chain(&self) -> String {
        format!(
            "fps={fps},scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={pad},format={pix}",
            fps = self.fps,
            w = self.width,
            h = self.height,
            pad = PAD_COLOR,
            pix = self.pixel_format,
        )
    }
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Target audio stream profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioProfile {
    pub codec: String,
    pub sample_rate: u32,
    pub channel_layout: String,
}

impl AudioProfile {
    /// The single profile all output clips share.
    pub fn canonical() -> Self {
        Self {
            codec: AUDIO_CODEC.to_string(),
            sample_rate: AUDIO_SAMPLE_RATE,
            channel_layout: AUDIO_CHANNEL_LAYOUT.to_string(),
        }
    }

    /// lavfi source producing silence in this profile.
    pub fn silent_source(&self) -> String {
        format!(
            "anullsrc=channel_layout={}:sample_rate={}",
            self.channel_layout, self.sample_rate
        )
    }

    /// Audio filter resampling an existing track into this profile.
    pub fn format_filter(&self) -> String {
        format!(
            "aformat=sample_rates={}:channel_layouts={}",
            self.sample_rate, self.channel_layout
        )
    }
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_filter_chain() {
        assert_eq!(
            VideoProfile::canonical().filter_chain(),
            "fps=24,scale=1280:720:force_original_aspect_ratio=decrease,\
             pad=1280:720:(ow-iw)/2:(oh-ih)/2:color=black,format=yuv420p"
        );
    }

    #[test]
    fn test_audio_fragments() {
        let audio = AudioProfile::canonical();
        assert_eq!(
            audio.silent_source(),
            "anullsrc=channel_layout=stereo:sample_rate=44100"
        );
        assert_eq!(
            audio.format_filter(),
            "aformat=sample_rates=44100:channel_layouts=stereo"
        );
    }
}
