//! Shared data models for the clipweave compile service.
//!
//! This crate provides Serde-serializable types for:
//! - Compile requests and their validation
//! - Job identity and pipeline stages
//! - The canonical encoding profile every clip is normalized to

pub mod encoding;
pub mod job;
pub mod request;

// Re-export common types
pub use encoding::{AudioProfile, VideoProfile};
pub use job::{AssetKind, JobId, JobStage};
pub use request::{is_data_url, CompileRequest, RequestError};
