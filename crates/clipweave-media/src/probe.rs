//! FFprobe media inspection.
//!
//! Two independent queries with deliberately different failure policies:
//! the duration query is strict (a failing ffprobe is a [`MediaError::Probe`]),
//! while the audio-stream query degrades to "no audio" on any failure, so a
//! clip ffprobe cannot inspect still gets a synthesized silent track.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::command::{ProcessRunner, ProcessSpec};
use crate::error::{MediaError, MediaResult};

/// What a clip looks like to the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// At least one audio stream is present
    pub has_audio: bool,
    /// Container duration in seconds, never negative
    pub duration: f64,
}

/// Outcome of the audio-stream query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPresence {
    Present,
    Absent,
    /// The query itself failed; treated as absent.
    Unknown(String),
}

impl AudioPresence {
    pub fn has_audio(&self) -> bool {
        matches!(self, AudioPresence::Present)
    }
}

/// Arguments for the container duration query.
pub fn duration_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Arguments for the audio stream listing query.
pub fn audio_stream_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "a".to_string(),
        "-show_entries".to_string(),
        "stream=index".to_string(),
        "-of".to_string(),
        "csv=p=0".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Parse ffprobe's duration output. Missing, `N/A` or garbage reads as zero;
/// negatives clamp to zero.
pub fn parse_duration(stdout: &str) -> f64 {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .unwrap_or(0.0)
        .max(0.0)
}

/// Read the container duration in seconds.
pub async fn probe_duration(runner: &dyn ProcessRunner, path: &Path) -> MediaResult<f64> {
    let spec = ProcessSpec::new("ffprobe", duration_args(path));
    let output = runner.run(&spec).await?;

    if !output.success() {
        return Err(MediaError::probe_failed(
            path,
            format!("duration query {}", output.exit_description()),
            Some(output.stderr),
        ));
    }

    Ok(parse_duration(&output.stdout))
}

/// Check for at least one audio stream. Never fails.
pub async fn probe_audio(runner: &dyn ProcessRunner, path: &Path) -> AudioPresence {
    let spec = ProcessSpec::new("ffprobe", audio_stream_args(path));

    match runner.run(&spec).await {
        Ok(output) if output.success() => {
            if output.stdout.trim().is_empty() {
                AudioPresence::Absent
            } else {
                AudioPresence::Present
            }
        }
        Ok(output) => AudioPresence::Unknown(format!(
            "audio query {}: {}",
            output.exit_description(),
            output.stderr_tail(5)
        )),
        Err(e) => AudioPresence::Unknown(e.to_string()),
    }
}

/// Probe a clip for duration and audio presence.
pub async fn probe_media(runner: &dyn ProcessRunner, path: impl AsRef<Path>) -> MediaResult<MediaProbe> {
    let path = path.as_ref();

    let duration = probe_duration(runner, path).await?;
    let audio = probe_audio(runner, path).await;

    if let AudioPresence::Unknown(reason) = &audio {
        warn!(path = %path.display(), "Audio probe failed, assuming no audio: {}", reason);
    }

    let probe = MediaProbe {
        has_audio: audio.has_audio(),
        duration,
    };
    debug!(path = %path.display(), ?probe, "Probed media");

    Ok(probe)
}
