//! FFmpeg command builder and process runner.
//!
//! Every external tool call goes through [`ProcessRunner`]: a command, its
//! arguments and an optional working directory in, the exit status and captured
//! output back. Stages decide what a non-zero exit means for them.

use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// One external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments, passed verbatim (no shell)
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command line for logs.
    pub fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last `max_lines` lines of stderr.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }

    /// Human-readable exit description.
    pub fn exit_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external processes to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` and wait for it to finish.
    ///
    /// Returns `Err` only when the process could not be run or awaited; a
    /// non-zero exit is reported through [`ProcessOutput::exit_code`].
    async fn run(&self, spec: &ProcessSpec) -> MediaResult<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Per-process timeout in seconds
    timeout_secs: Option<u64>,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal. Sending `true` kills the running process.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    async fn wait_guarded<F>(&self, wait: F) -> MediaResult<std::process::Output>
    where
        F: Future<Output = std::io::Result<std::process::Output>>,
    {
        let timed = async {
            match self.timeout_secs {
                Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), wait).await {
                    Ok(result) => result.map_err(MediaError::from),
                    Err(_) => {
                        // Dropping the wait future kills the child (kill_on_drop).
                        warn!("Process timed out after {} seconds, killing it", secs);
                        Err(MediaError::Timeout(secs))
                    }
                },
                None => wait.await.map_err(MediaError::from),
            }
        };

        let Some(mut cancel_rx) = self.cancel_rx.clone() else {
            return timed.await;
        };

        if *cancel_rx.borrow() {
            return Err(MediaError::Cancelled);
        }

        tokio::select! {
            result = timed => result,
            _ = cancelled(&mut cancel_rx) => {
                info!("Process cancelled, killing it");
                Err(MediaError::Cancelled)
            }
        }
    }
}

/// Resolves once the watch value turns `true`; never if the sender is dropped first.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> MediaResult<ProcessOutput> {
        which::which(&spec.program).map_err(|_| MediaError::ToolNotFound(spec.program.clone()))?;

        debug!("Running: {}", spec.display());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn()?;
        let output = self.wait_guarded(child.wait_with_output()).await?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// One ffmpeg input with the options that precede its `-i`.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a plain file input.
    pub fn input(self, source: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), source.as_ref().to_string_lossy())
    }

    /// Add an input preceded by its own options (e.g. `-f lavfi -t 3`).
    pub fn input_with<I, S>(mut self, args: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            source: source.into(),
        });
        self
    }

    /// Add output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Select a stream for the output (e.g. `0:v:0`).
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Copy all streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Stop at the end of the shortest input.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Output path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// Convert into a runnable process spec.
    pub fn to_spec(&self) -> ProcessSpec {
        ProcessSpec::new("ffmpeg", self.build_args())
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg".to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::ToolNotFound("ffprobe".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_orders_inputs() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input_with(["-loop", "1"], "img.png")
            .input_with(["-f", "lavfi"], "anullsrc")
            .video_codec("libx264")
            .crf(21);

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-loop", "1", "-i", "img.png", "-f", "lavfi", "-i",
                "anullsrc", "-c:v", "libx264", "-crf", "21", "out.mp4",
            ]
        );
        assert_eq!(cmd.to_spec().program, "ffmpeg");
    }

    #[test]
    fn test_stderr_tail() {
        let output = ProcessOutput::failed(1, "a\nb\nc\nd");
        assert_eq!(output.stderr_tail(2), "c\nd");
        assert_eq!(output.stderr_tail(10), "a\nb\nc\nd");
        assert!(!output.success());
        assert_eq!(output.exit_description(), "exited with status 1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        if which::which("sh").is_err() {
            return;
        }
        let runner = TokioProcessRunner::new();
        let spec = ProcessSpec::new("sh", ["-c", "echo out; echo err >&2; exit 3"]);
        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_timeout() {
        if which::which("sleep").is_err() {
            return;
        }
        let runner = TokioProcessRunner::new().with_timeout(1);
        let spec = ProcessSpec::new("sleep", ["5"]);
        assert!(matches!(runner.run(&spec).await, Err(MediaError::Timeout(1))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_cancel() {
        if which::which("sleep").is_err() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let runner = TokioProcessRunner::new().with_cancel(rx);
        let spec = ProcessSpec::new("sleep", ["5"]);
        let handle = tokio::spawn(async move { runner.run(&spec).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(MediaError::Cancelled)));
    }

    #[tokio::test]
    async fn test_tokio_runner_missing_tool() {
        let spec = ProcessSpec::new("clipweave-definitely-missing-tool", ["-h"]);
        let err = TokioProcessRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
