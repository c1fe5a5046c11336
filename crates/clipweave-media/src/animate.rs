//! Still image to video clip.

use std::path::Path;
use tracing::{error, info};

use clipweave_models::{AudioProfile, VideoProfile};

use crate::command::{FfmpegCommand, ProcessRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;

/// Build the ffmpeg command looping `image` for `duration` seconds with a
/// silent stereo track, in the canonical profile.
pub fn build_animate_command(image: &Path, output: &Path, duration: f64) -> FfmpegCommand {
    let video = VideoProfile::canonical();
    let audio = AudioProfile::canonical();

    FfmpegCommand::new(output)
        .input_with(["-loop", "1"], image.to_string_lossy())
        .input_with(
            ["-f".to_string(), "lavfi".to_string(), "-t".to_string(), duration.to_string()],
            audio.silent_source(),
        )
        .shortest()
        .video_filter(video.filter_chain())
        .video_codec(&video.codec)
        .preset(&video.preset)
        .crf(video.crf)
        .audio_codec(&audio.codec)
        .pixel_format(&video.pixel_format)
        .faststart()
}

/// Turn a still image into a `duration`-second clip.
///
/// There is no partial result: either the whole clip is written or this fails
/// with [`MediaError::Encode`].
pub async fn animate_image(
    runner: &dyn ProcessRunner,
    image: impl AsRef<Path>,
    output: impl AsRef<Path>,
    duration: f64,
) -> MediaResult<()> {
    let image = image.as_ref();
    let output = output.as_ref();

    if !duration.is_finite() || duration <= 0.0 {
        return Err(MediaError::invalid_input(format!(
            "image clip duration must be positive, got {}",
            duration
        )));
    }

    info!(
        "Animating image: {} -> {} ({}s)",
        image.display(),
        output.display(),
        duration
    );

    ensure_parent_dir(output).await?;

    let cmd = build_animate_command(image, output, duration);
    let result = runner.run(&cmd.to_spec()).await?;

    if !result.success() {
        error!(
            image = %image.display(),
            "Image animation failed ({}):\n{}",
            result.exit_description(),
            result.stderr_tail(20)
        );
        return Err(MediaError::encode_failed(
            format!("animating {} {}", image.display(), result.exit_description()),
            Some(result.stderr),
            result.exit_code,
        ));
    }

    Ok(())
}
