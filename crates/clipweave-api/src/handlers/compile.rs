//! Compile handler.

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use futures::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use clipweave_models::CompileRequest;
use clipweave_worker::{content_disposition, JobWorkspace};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Compile the requested images and videos into one MP4 and stream it back.
pub async fn compile(
    State(state): State<AppState>,
    payload: Result<Json<CompileRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(mut request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;

    let inline_files = state.inline_images.resolve(&mut request).await?;
    let result = state.pipeline.run(&request).await;
    state.inline_images.release(&inline_files).await;
    let video = result?;

    let file = File::open(&video.path)
        .await
        .map_err(|e| ApiError::internal(format!("cannot open {}: {}", video.path.display(), e)))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    info!(job_id = %video.job_id, bytes = len, "Streaming compiled video");
    metrics::record_compile_response(len);

    let guard = if state.config.keep_workspaces {
        info!(job_id = %video.job_id, "Keeping workspace {}", video.workspace_path().display());
        None
    } else {
        Some(WorkspaceGuard(Some(video.workspace.clone())))
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, video.mime_type)
        .header(header::CONTENT_DISPOSITION, content_disposition(&video))
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(file_chunks(file, guard)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Removes a job workspace when dropped.
///
/// Rides along with the response body, so the workspace goes away once the
/// stream has finished or the client has disconnected.
struct WorkspaceGuard(Option<JobWorkspace>);

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        let Some(workspace) = self.0.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to remove workspace {}", workspace.path().display());
            return;
        };

        handle.spawn(async move {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.cleanup().await {
                warn!("Failed to remove workspace {}: {}", path.display(), e);
            }
        });
    }
}

/// Read `file` in fixed-size chunks, ending after EOF or the first error.
/// `guard` is dropped together with the stream state.
fn file_chunks(
    file: File,
    guard: Option<WorkspaceGuard>,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    stream::unfold(Some((file, guard)), |state| async move {
        let (mut file, guard) = state?;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];

        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some((file, guard))))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}
