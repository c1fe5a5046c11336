//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use metrics::{counter, histogram};

use clipweave_models::JobStage;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "clipweave_jobs_total";
    pub const JOBS_FAILED_TOTAL: &str = "clipweave_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "clipweave_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "clipweave_stage_duration_seconds";
    pub const ASSETS_FETCHED_BYTES: &str = "clipweave_assets_fetched_bytes_total";
    pub const CLIPS_NORMALIZED_TOTAL: &str = "clipweave_clips_normalized_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_TOTAL).increment(1);
}

pub fn record_job_finished(duration_secs: f64) {
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(stage: Option<JobStage>) {
    let stage = stage.map(|s| s.as_str()).unwrap_or("setup");
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
}

pub fn record_stage(stage: JobStage, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

pub fn record_fetched_bytes(bytes: u64) {
    counter!(names::ASSETS_FETCHED_BYTES).increment(bytes);
}

pub fn record_clip_normalized(native_audio: bool) {
    let audio = if native_audio { "native" } else { "synthesized" };
    counter!(names::CLIPS_NORMALIZED_TOTAL, "audio" => audio).increment(1);
}
