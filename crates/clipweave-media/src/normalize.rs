//! Clip normalization.
//!
//! The concat stage joins clips with a stream copy, so every clip it receives
//! must carry exactly one video stream and one audio stream in identical
//! formats. This module rewrites an arbitrary clip into that shape:
//!
//! - video is always rescaled, letterboxed and re-encoded to [`VideoProfile`];
//! - native audio is resampled into [`AudioProfile`];
//! - a clip without audio gets a synthesized silent track as long as the
//!   probed video.

use std::path::Path;
use tracing::{error, info};

use clipweave_models::encoding::{FALLBACK_SYNTHETIC_AUDIO_SECS, MIN_SYNTHETIC_AUDIO_SECS};
use clipweave_models::{AudioProfile, VideoProfile};

use crate::command::{FfmpegCommand, ProcessRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;
use crate::probe::{probe_media, MediaProbe};

/// Length of the synthesized silent track for a clip of `probed` seconds.
///
/// Zero (unknown) falls back to a fixed length; anything else is floored so
/// ffmpeg never gets a degenerate zero-length source.
pub fn synthetic_audio_duration(probed: f64) -> f64 {
    let duration = if probed > 0.0 {
        probed
    } else {
        FALLBACK_SYNTHETIC_AUDIO_SECS
    };
    duration.max(MIN_SYNTHETIC_AUDIO_SECS)
}

/// Build the normalization command for `input` given what probing found.
pub fn build_normalize_command(input: &Path, output: &Path, probe: &MediaProbe) -> FfmpegCommand {
    let video = VideoProfile::canonical();
    let audio = AudioProfile::canonical();

    let mut cmd = FfmpegCommand::new(output).input(input);

    if !probe.has_audio {
        let secs = synthetic_audio_duration(probe.duration);
        cmd = cmd.input_with(
            ["-f".to_string(), "lavfi".to_string(), "-t".to_string(), secs.to_string()],
            audio.silent_source(),
        );
    }

    cmd = cmd
        .map("0:v:0")
        .video_filter(video.filter_chain())
        .video_codec(&video.codec)
        .preset(&video.preset)
        .crf(video.crf)
        .pixel_format(&video.pixel_format)
        .faststart();

    if probe.has_audio {
        cmd.map("0:a:0")
            .audio_filter(audio.format_filter())
            .audio_codec(&audio.codec)
    } else {
        cmd.map("1:a:0").audio_codec(&audio.codec)
    }
}

/// Normalize `input` into `output`. Returns the probe of the input.
pub async fn normalize_clip(
    runner: &dyn ProcessRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<MediaProbe> {
    let input = input.as_ref();
    let output = output.as_ref();

    let probe = probe_media(runner, input).await?;

    info!(
        "Normalizing clip: {} -> {} (duration: {:.2}s, audio: {})",
        input.display(),
        output.display(),
        probe.duration,
        if probe.has_audio { "native" } else { "synthesized" }
    );

    ensure_parent_dir(output).await?;

    let cmd = build_normalize_command(input, output, &probe);
    let result = runner.run(&cmd.to_spec()).await?;

    if !result.success() {
        error!(
            input = %input.display(),
            "Normalization failed ({}):\n{}",
            result.exit_description(),
            result.stderr_tail(20)
        );
        return Err(MediaError::encode_failed(
            format!("normalizing {} {}", input.display(), result.exit_description()),
            Some(result.stderr),
            result.exit_code,
        ));
    }

    Ok(probe)
}
