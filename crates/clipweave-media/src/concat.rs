//! Stream-copy concatenation through ffmpeg's concat demuxer.
//!
//! Inputs must already share one profile (see [`crate::normalize`]); nothing
//! here re-encodes or checks that.

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::command::{FfmpegCommand, ProcessRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;

/// Quote a path for a concat manifest `file` directive.
///
/// The path is wrapped in single quotes; an embedded `'` closes the quote,
/// emits an escaped quote and reopens it (`'\''`).
pub fn quote_manifest_path(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

/// Serialize `clips` into concat demuxer manifest text, one `file` line each.
pub fn build_manifest(clips: &[PathBuf]) -> MediaResult<String> {
    if clips.is_empty() {
        return Err(MediaError::concat_failed("no clips to concatenate", None, None));
    }

    let mut manifest = String::new();
    for clip in clips {
        let path = clip.to_str().ok_or_else(|| {
            MediaError::concat_failed(
                format!("clip path is not valid UTF-8: {}", clip.display()),
                None,
                None,
            )
        })?;

        // The manifest is line based; a line break cannot be quoted.
        if path.contains(['\n', '\r']) {
            return Err(MediaError::concat_failed(
                format!("clip path contains a line break: {:?}", path),
                None,
                None,
            ));
        }

        manifest.push_str("file ");
        manifest.push_str(&quote_manifest_path(path));
        manifest.push('\n');
    }

    Ok(manifest)
}

/// Build the stream-copy concat command reading `manifest`.
pub fn build_concat_command(manifest: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_with(["-f", "concat", "-safe", "0"], manifest.to_string_lossy())
        .codec_copy()
        .faststart()
}

/// Join `clips` in order into `output`, writing the manifest to `manifest_path`.
pub async fn concat_clips(
    runner: &dyn ProcessRunner,
    clips: &[PathBuf],
    manifest_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let manifest_path = manifest_path.as_ref();
    let output = output.as_ref();

    let manifest = build_manifest(clips)?;
    ensure_parent_dir(manifest_path).await?;
    tokio::fs::write(manifest_path, manifest).await?;

    info!(
        "Concatenating {} clips -> {} (manifest: {})",
        clips.len(),
        output.display(),
        manifest_path.display()
    );

    ensure_parent_dir(output).await?;

    let cmd = build_concat_command(manifest_path, output);
    let result = runner.run(&cmd.to_spec()).await?;

    if !result.success() {
        error!(
            "Concatenation failed ({}):\n{}",
            result.exit_description(),
            result.stderr_tail(20)
        );
        return Err(MediaError::concat_failed(
            format!("joining {} clips {}", clips.len(), result.exit_description()),
            Some(result.stderr),
            result.exit_code,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProcessOutput;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_quote_plain_path() {
        assert_eq!(quote_manifest_path("/tmp/job/norm_0.mp4"), "'/tmp/job/norm_0.mp4'");
    }

    #[test]
    fn test_quote_path_with_quote_and_spaces() {
        assert_eq!(
            quote_manifest_path("/tmp/my job/it's here.mp4"),
            r"'/tmp/my job/it'\''s here.mp4'"
        );
        assert_eq!(quote_manifest_path("''"), r"''\'''\'''");
    }

    #[test]
    fn test_manifest_preserves_order() {
        let clips = vec![
            PathBuf::from("/w/norm_0.mp4"),
            PathBuf::from("/w/with space/norm_1.mp4"),
            PathBuf::from("/w/o'brien/norm_2.mp4"),
        ];
        let manifest = build_manifest(&clips).unwrap();
        assert_eq!(
            manifest,
            "file '/w/norm_0.mp4'\n\
             file '/w/with space/norm_1.mp4'\n\
             file '/w/o'\\''brien/norm_2.mp4'\n"
        );
    }

    #[test]
    fn test_manifest_rejects_empty_and_newlines() {
        assert!(matches!(build_manifest(&[]), Err(MediaError::Concat { .. })));
        assert!(matches!(
            build_manifest(&[PathBuf::from("/w/bad\nname.mp4")]),
            Err(MediaError::Concat { .. })
        ));
    }

    #[test]
    fn test_concat_command_args() {
        let args = build_concat_command(Path::new("/w/concat.txt"), Path::new("/w/final.mp4")).build_args();
        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-f", "concat", "-safe", "0", "-i", "/w/concat.txt",
                "-c", "copy", "-movflags", "+faststart", "/w/final.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn test_concat_writes_manifest_and_runs() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![dir.path().join("norm_0.mp4"), dir.path().join("norm_1.mp4")];
        let manifest = dir.path().join("concat.txt");
        let output = dir.path().join("final.mp4");
        let runner = ScriptedRunner::succeeding();

        concat_clips(&runner, &clips, &manifest, &output).await.unwrap();

        let written = std::fs::read_to_string(&manifest).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.lines().next().unwrap().ends_with("norm_0.mp4'"));
        assert_eq!(runner.ffmpeg_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concat_failure_is_concat_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(|_| Ok(ProcessOutput::failed(1, "Impossible to open")));

        let err = concat_clips(
            &runner,
            &[dir.path().join("norm_0.mp4")],
            dir.path().join("concat.txt"),
            dir.path().join("final.mp4"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::Concat { exit_code: Some(1), .. }));
    }
}
