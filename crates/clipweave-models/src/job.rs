//! Job identity and pipeline stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a compile job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage of a compile job.
///
/// Stages only move forward: `Created → Fetching → Animating → Normalizing →
/// Concatenating → Done`. `Failed` is reachable from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Created,
    Fetching,
    Animating,
    Normalizing,
    Concatenating,
    Done,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Created => "created",
            JobStage::Fetching => "fetching",
            JobStage::Animating => "animating",
            JobStage::Normalizing => "normalizing",
            JobStage::Concatenating => "concatenating",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        }
    }

    /// Next stage in the happy path, or `None` from a terminal stage.
    pub fn next(&self) -> Option<JobStage> {
        match self {
            JobStage::Created => Some(JobStage::Fetching),
            JobStage::Fetching => Some(JobStage::Animating),
            JobStage::Animating => Some(JobStage::Normalizing),
            JobStage::Normalizing => Some(JobStage::Concatenating),
            JobStage::Concatenating => Some(JobStage::Done),
            JobStage::Done | JobStage::Failed => None,
        }
    }

    /// Move to the next stage in place. Returns the new stage, or `None`
    /// (leaving `self` untouched) when already terminal.
    pub fn advance(&mut self) -> Option<JobStage> {
        let next = self.next()?;
        *self = next;
        Some(next)
    }

    /// Transition to `Failed`. Has no effect once terminal.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            *self = JobStage::Failed;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of remote asset referenced by a compile request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    /// Scratch file name for the `index`-th asset of this kind.
    pub fn scratch_name(&self, index: usize) -> String {
        match self {
            AssetKind::Image => format!("img_{}.png", index),
            AssetKind::Video => format!("vid_{}.mp4", index),
        }
    }
}
