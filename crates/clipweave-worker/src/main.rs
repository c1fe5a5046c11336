//! Compile worker binary.
//!
//! Reads a compile request as JSON from the file named by the first argument,
//! or from stdin when none is given, and prints the compiled video's path.

use std::io::Read;

use tokio::sync::watch;
use tracing::{error, info};

use clipweave_media::MediaError;
use clipweave_models::CompileRequest;
use clipweave_worker::{init_tracing, CompilePipeline, WorkerConfig};

fn read_request() -> anyhow::Result<CompileRequest> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path, e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let request: CompileRequest = serde_json::from_str(&raw)?;
    request.validate()?;
    Ok(request)
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting clipweave-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let request = match read_request() {
        Ok(r) => r,
        Err(e) => {
            error!("Invalid compile request: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl-C kills running ffmpeg processes instead of orphaning them
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            cancel_tx.send(true).ok();
        }
    });

    let pipeline = match CompilePipeline::with_cancel(config, cancel_rx) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let video = match pipeline.run(&request).await {
        Ok(v) => v,
        Err(e) if matches!(e.media_error(), Some(MediaError::Cancelled)) => {
            error!("Compile cancelled: {}", e);
            std::process::exit(130);
        }
        Err(e) => {
            error!("Compile failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", video.path.display());
    info!(job_id = %video.job_id, "Worker finished");
}
