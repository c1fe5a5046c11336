#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the compile pipeline.
//!
//! This crate provides:
//! - A process-runner seam so every ffmpeg/ffprobe call is mockable
//! - Type-safe FFmpeg command building
//! - Asset fetching over HTTP(S)
//! - Media probing (duration and audio presence)
//! - Image animation, clip normalization and stream-copy concatenation

pub mod animate;
pub mod command;
pub mod concat;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod normalize;
pub mod probe;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use animate::animate_image;
pub use command::{
    check_ffmpeg, check_ffprobe, FfmpegCommand, ProcessOutput, ProcessRunner, ProcessSpec,
    TokioProcessRunner,
};
pub use concat::concat_clips;
pub use download::AssetFetcher;
pub use error::{MediaError, MediaResult};
pub use normalize::normalize_clip;
pub use probe::{probe_media, AudioPresence, MediaProbe};
