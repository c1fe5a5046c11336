//! Compile pipeline orchestrator.
//!
//! One job runs strictly stage by stage:
//!
//! 1. create a fresh workspace
//! 2. fetch every image and video
//! 3. animate images into silent clips
//! 4. list image clips (input order) followed by raw videos (input order)
//! 5. normalize every clip in that list
//! 6. concatenate the normalized clips
//!
//! Items inside a stage may run concurrently up to
//! [`WorkerConfig::max_stage_parallel`]; results always keep input order. The
//! first failure aborts the job and nothing is retried.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::watch;
use tracing::{debug, Instrument};

use clipweave_media::{
    animate_image, concat_clips, normalize_clip, AssetFetcher, MediaError, MediaResult,
    ProcessRunner, TokioProcessRunner,
};
use clipweave_models::encoding::{OUTPUT_FILE_NAME, OUTPUT_MIME_TYPE};
use clipweave_models::{AssetKind, CompileRequest, JobId, JobStage};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::workspace::JobWorkspace;

/// Result of a successful compile job.
#[derive(Debug, Clone)]
pub struct CompiledVideo {
    pub job_id: JobId,
    /// Workspace holding the output and all intermediates
    pub workspace: JobWorkspace,
    /// The compiled file
    pub path: PathBuf,
    pub mime_type: &'static str,
    /// Suggested download name
    pub file_name: &'static str,
}

/// Runs compile jobs.
#[derive(Clone)]
pub struct CompilePipeline {
    config: WorkerConfig,
    runner: Arc<dyn ProcessRunner>,
    fetcher: AssetFetcher,
}

impl CompilePipeline {
    /// Create a pipeline that spawns real ffmpeg/ffprobe processes.
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        Self::build(config, None)
    }

    /// Like [`CompilePipeline::new`], but running processes are killed and the
    /// job fails with a cancellation error once `cancel_rx` turns `true`.
    pub fn with_cancel(config: WorkerConfig, cancel_rx: watch::Receiver<bool>) -> WorkerResult<Self> {
        Self::build(config, Some(cancel_rx))
    }

    fn build(config: WorkerConfig, cancel_rx: Option<watch::Receiver<bool>>) -> WorkerResult<Self> {
        let mut runner = TokioProcessRunner::new();
        if let Some(cancel_rx) = cancel_rx {
            runner = runner.with_cancel(cancel_rx);
        }
        if let Some(timeout) = config.process_timeout {
            runner = runner.with_timeout(timeout.as_secs().max(1));
        }

        let fetcher = AssetFetcher::new(config.fetch_timeout)
            .map_err(|e| WorkerError::config_error(e.to_string()))?;

        Ok(Self::with_parts(config, Arc::new(runner), fetcher))
    }

    /// Create a pipeline from explicit collaborators.
    pub fn with_parts(config: WorkerConfig, runner: Arc<dyn ProcessRunner>, fetcher: AssetFetcher) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Compile `request` into one video.
    ///
    /// The request must already be validated. On failure the workspace is left
    /// on disk for inspection, but no path to it is returned.
    pub async fn run(&self, request: &CompileRequest) -> WorkerResult<CompiledVideo> {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "compile");
        let span = logger.create_span();

        self.run_job(job_id, request, &logger).instrument(span).await
    }

    async fn run_job(&self, job_id: JobId, request: &CompileRequest, logger: &JobLogger) -> WorkerResult<CompiledVideo> {
        let started = Instant::now();
        let mut stage = JobStage::Created;

        metrics::record_job_started();
        logger.log_start(&format!(
            "{} images, {} videos, {}s per image",
            request.images.len(),
            request.videos.len(),
            request.image_duration_sec
        ));
        if request.voiceover_url.is_some() {
            logger.log_warning("voiceoverUrl is reserved and ignored");
        }

        let result = match JobWorkspace::create(&self.config.work_dir, &job_id).await {
            Ok(workspace) => self
                .execute(&workspace, request, &mut stage, logger)
                .await
                .map(|path| (workspace, path)),
            Err(e) => Err(e),
        };

        match result {
            Ok((workspace, path)) => {
                let elapsed = started.elapsed();
                metrics::record_job_finished(elapsed.as_secs_f64());
                logger.log_completion(&format!("{}", path.display()), elapsed);

                Ok(CompiledVideo {
                    job_id,
                    workspace,
                    path,
                    mime_type: OUTPUT_MIME_TYPE,
                    file_name: OUTPUT_FILE_NAME,
                })
            }
            Err(e) => {
                let failed_in = e.failed_stage().unwrap_or(stage);
                stage.fail();
                metrics::record_job_failed(e.failed_stage());
                logger.log_failure(
                    failed_in,
                    &e.to_string(),
                    e.media_error().and_then(MediaError::stderr),
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        workspace: &JobWorkspace,
        request: &CompileRequest,
        stage: &mut JobStage,
        logger: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        let runner = self.runner.as_ref();

        // Fetch
        let (images, videos) = self
            .stage(stage, logger, request.asset_count(), async {
                let images = self.fetch_all(workspace, AssetKind::Image, &request.images).await?;
                let videos = self.fetch_all(workspace, AssetKind::Video, &request.videos).await?;
                Ok((images, videos))
            })
            .await?;

        // Animate
        let duration = request.image_duration_sec;
        let image_clips = self
            .stage(
                stage,
                logger,
                images.len(),
                self.ordered(images.into_iter().enumerate(), |(i, image)| async move {
                    let output = workspace.image_clip_path(i);
                    animate_image(runner, &image, &output, duration).await?;
                    Ok(output)
                }),
            )
            .await?;

        // Normalize image clips first, then raw videos
        let clips: Vec<PathBuf> = image_clips.into_iter().chain(videos).collect();
        let normalized = self
            .stage(
                stage,
                logger,
                clips.len(),
                self.ordered(clips.into_iter().enumerate(), |(i, clip)| async move {
                    let output = workspace.normalized_path(i);
                    let probe = normalize_clip(runner, &clip, &output).await?;
                    metrics::record_clip_normalized(probe.has_audio);
                    Ok(output)
                }),
            )
            .await?;

        // Concatenate
        let final_path = workspace.final_path();
        self.stage(stage, logger, normalized.len(), async {
            concat_clips(runner, &normalized, workspace.manifest_path(), &final_path).await
        })
        .await?;

        stage.advance();
        debug_assert_eq!(*stage, JobStage::Done);

        Ok(final_path)
    }

    /// Advance to the next stage and run `work` in it, tagging any failure
    /// with that stage.
    async fn stage<T, F>(&self, stage: &mut JobStage, logger: &JobLogger, items: usize, work: F) -> WorkerResult<T>
    where
        F: Future<Output = MediaResult<T>>,
    {
        let current = stage
            .advance()
            .ok_or_else(|| WorkerError::workspace("job already finished"))?;
        logger.log_stage(current, items);

        let started = Instant::now();
        let result = work.await.map_err(|e| WorkerError::stage(current, e));
        metrics::record_stage(current, started.elapsed().as_secs_f64());

        result
    }

    /// Run `f` over `items` with bounded concurrency, collecting outputs in
    /// input order and stopping at the first error.
    async fn ordered<I, F, Fut>(&self, items: I, f: F) -> MediaResult<Vec<PathBuf>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = MediaResult<PathBuf>>,
    {
        stream::iter(items)
            .map(f)
            .buffered(self.config.max_stage_parallel.max(1))
            .try_collect()
            .await
    }

    async fn fetch_all(&self, workspace: &JobWorkspace, kind: AssetKind, urls: &[String]) -> MediaResult<Vec<PathBuf>> {
        let fetcher = &self.fetcher;

        // Owned URLs keep the returned future `Send`
        self.ordered(urls.iter().cloned().enumerate(), |(i, url)| async move {
            let dest = workspace.asset_path(kind, i);
            let bytes = fetcher.fetch_to_file(&url, &dest).await?;
            metrics::record_fetched_bytes(bytes);
            debug!(kind = ?kind, index = i, "Fetched asset");
            Ok(dest)
        })
        .await
    }
}

/// Suggested `Content-Disposition` value for a compiled video.
pub fn content_disposition(video: &CompiledVideo) -> String {
    format!("inline; filename=\"{}\"", video.file_name)
}

impl CompiledVideo {
    /// Size of the compiled file in bytes.
    pub async fn file_size(&self) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipweave_media::testing::ScriptedRunner;
    use clipweave_media::ProcessOutput;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// ffprobe says every clip is 2s; only fetched videos carry audio.
    fn probe_runner() -> ScriptedRunner {
        ScriptedRunner::new(|spec| {
            if spec.program != "ffprobe" {
                return Ok(ProcessOutput::ok(""));
            }
            if spec.args.contains(&"format=duration".to_string()) {
                return Ok(ProcessOutput::ok("2.000000\n"));
            }
            let file = spec.args.last().cloned().unwrap_or_default();
            if file.contains("vid_") {
                Ok(ProcessOutput::ok("1\n"))
            } else {
                Ok(ProcessOutput::ok(""))
            }
        })
    }

    async fn asset_server() -> MockServer {
        let server = MockServer::start().await;
        for name in ["a.png", "b.png", "x.mp4", "y.mp4"] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", name)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(name.as_bytes().to_vec()))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    fn pipeline(root: &Path, runner: &ScriptedRunner, parallel: usize) -> CompilePipeline {
        let config = WorkerConfig::default()
            .with_work_dir(root)
            .with_max_stage_parallel(parallel);
        let fetcher = AssetFetcher::new(Duration::from_secs(10)).unwrap();
        CompilePipeline::with_parts(config, Arc::new(runner.clone()), fetcher)
    }

    fn file_name(arg: &str) -> String {
        Path::new(arg).file_name().unwrap().to_string_lossy().to_string()
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_run_future_is_send() {
        let root = TempDir::new().unwrap();
        let runner = ScriptedRunner::succeeding();
        let pipeline = pipeline(root.path(), &runner, 2);
        let request = CompileRequest::new(vec!["https://x/a.png".into()], vec!["https://x/v.mp4".into()]);

        // Spawned handlers need this; the future is never polled
        assert_send(pipeline.run(&request));
    }

    #[tokio::test]
    async fn test_cancelled_pipeline_fails_first_stage_needing_a_process() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let (cancel_tx, cancel_rx) = watch::channel(true);
        let config = WorkerConfig::default().with_work_dir(root.path());
        let pipeline = CompilePipeline::with_cancel(config, cancel_rx).unwrap();

        let request = CompileRequest::new(vec![format!("{}/a.png", server.uri())], vec![]);
        let err = pipeline.run(&request).await.unwrap_err();
        drop(cancel_tx);

        assert_eq!(err.failed_stage(), Some(JobStage::Animating));
        assert!(matches!(
            err.media_error(),
            Some(MediaError::Cancelled) | Some(MediaError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pipeline_orders_images_then_videos() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = probe_runner();

        let request = CompileRequest::new(
            vec![format!("{}/a.png", server.uri()), format!("{}/b.png", server.uri())],
            vec![format!("{}/x.mp4", server.uri())],
        )
        .with_image_duration(2.0);

        let video = pipeline(root.path(), &runner, 1).run(&request).await.unwrap();

        assert_eq!(video.path, video.workspace.final_path());
        assert_eq!(video.mime_type, "video/mp4");
        assert_eq!(content_disposition(&video), "inline; filename=\"final.mp4\"");
        assert!(video.workspace_path().starts_with(root.path()));
        assert_eq!(
            std::fs::read(video.workspace.asset_path(AssetKind::Video, 0)).unwrap(),
            b"x.mp4"
        );

        let outputs: Vec<String> = runner
            .ffmpeg_calls()
            .iter()
            .map(|spec| file_name(spec.args.last().unwrap()))
            .collect();
        assert_eq!(
            outputs,
            vec![
                "imgclip_0.mp4",
                "imgclip_1.mp4",
                "norm_0.mp4",
                "norm_1.mp4",
                "norm_2.mp4",
                "final.mp4",
            ]
        );

        // Each normalize reads the clip in combined-list position
        let norm_inputs: Vec<String> = runner.ffmpeg_calls()[2..5]
            .iter()
            .map(|spec| {
                let i = spec.args.iter().position(|a| a == "-i").unwrap();
                file_name(&spec.args[i + 1])
            })
            .collect();
        assert_eq!(norm_inputs, vec!["imgclip_0.mp4", "imgclip_1.mp4", "vid_0.mp4"]);

        // Image clips got synthetic audio, the video kept its own
        let norm_calls = runner.ffmpeg_calls();
        assert!(norm_calls[2].args.contains(&"1:a:0".to_string()));
        assert!(norm_calls[4].args.contains(&"0:a:0".to_string()));

        let manifest = std::fs::read_to_string(video.workspace.manifest_path()).unwrap();
        let order: Vec<&str> = manifest.lines().collect();
        assert_eq!(order.len(), 3);
        assert!(order[0].ends_with("norm_0.mp4'"));
        assert!(order[1].ends_with("norm_1.mp4'"));
        assert!(order[2].ends_with("norm_2.mp4'"));
    }

    #[tokio::test]
    async fn test_image_duration_reaches_animator() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = probe_runner();

        let request = CompileRequest::new(vec![format!("{}/a.png", server.uri())], vec![])
            .with_image_duration(3.0);
        pipeline(root.path(), &runner, 1).run(&request).await.unwrap();

        let animate = &runner.ffmpeg_calls()[0];
        let t = animate.args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(animate.args[t + 1], "3");
    }

    #[tokio::test]
    async fn test_fetch_404_aborts_before_any_tool_runs() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = probe_runner();

        let request = CompileRequest::new(
            vec![format!("{}/a.png", server.uri()), format!("{}/gone.png", server.uri())],
            vec![format!("{}/x.mp4", server.uri())],
        );

        let err = pipeline(root.path(), &runner, 1).run(&request).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(JobStage::Fetching));
        assert_eq!(err.media_error().and_then(|e| e.fetch_status()), Some(404));
        assert!(runner.calls().is_empty());

        // No final output anywhere under the root
        let job_dir = std::fs::read_dir(root.path()).unwrap().next().unwrap().unwrap().path();
        assert!(!job_dir.join("final.mp4").exists());
        assert!(!job_dir.join("img_1.png").exists());
    }

    #[tokio::test]
    async fn test_animation_failure_names_stage() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(|spec| {
            if spec.program == "ffmpeg" {
                Ok(ProcessOutput::failed(1, "Error opening input"))
            } else {
                Ok(ProcessOutput::ok("1"))
            }
        });

        let request = CompileRequest::new(vec![format!("{}/a.png", server.uri())], vec![]);
        let err = pipeline(root.path(), &runner, 1).run(&request).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(JobStage::Animating));
        assert!(err.to_string().starts_with("animating stage failed"));
        assert_eq!(runner.ffmpeg_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concat_failure_names_stage() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(|spec| {
            let is_concat = spec.args.iter().any(|a| a == "concat");
            if is_concat {
                Ok(ProcessOutput::failed(1, "Invalid data"))
            } else {
                Ok(ProcessOutput::ok("1"))
            }
        });

        let request = CompileRequest::new(vec![], vec![format!("{}/x.mp4", server.uri())]);
        let err = pipeline(root.path(), &runner, 1).run(&request).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(JobStage::Concatenating));
    }

    #[tokio::test]
    async fn test_parallel_stages_keep_order() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = probe_runner();

        let request = CompileRequest::new(
            vec![format!("{}/a.png", server.uri()), format!("{}/b.png", server.uri())],
            vec![format!("{}/x.mp4", server.uri()), format!("{}/y.mp4", server.uri())],
        );

        let video = pipeline(root.path(), &runner, 4).run(&request).await.unwrap();

        let manifest = std::fs::read_to_string(video.workspace.manifest_path()).unwrap();
        let names: Vec<String> = manifest
            .lines()
            .map(|l| file_name(l.trim_start_matches("file '").trim_end_matches('\'')))
            .collect();
        assert_eq!(names, vec!["norm_0.mp4", "norm_1.mp4", "norm_2.mp4", "norm_3.mp4"]);
        assert_eq!(
            std::fs::read(video.workspace.asset_path(AssetKind::Video, 1)).unwrap(),
            b"y.mp4"
        );
    }

    #[tokio::test]
    async fn test_jobs_get_separate_workspaces() {
        let server = asset_server().await;
        let root = TempDir::new().unwrap();
        let runner = probe_runner();
        let pipeline = pipeline(root.path(), &runner, 1);

        let request = CompileRequest::new(vec![], vec![format!("{}/x.mp4", server.uri())]);
        let (a, b) = tokio::join!(pipeline.run(&request), pipeline.run(&request));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.job_id, b.job_id);
        assert_ne!(a.workspace_path(), b.workspace_path());
    }
}
