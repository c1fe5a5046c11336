//! Scripted process runner for tests.
//!
//! Records every [`ProcessSpec`] it is asked to run and answers with whatever
//! the supplied closure returns, so stages can be exercised without ffmpeg.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::command::{ProcessOutput, ProcessRunner, ProcessSpec};
use crate::error::MediaResult;

type Responder = dyn Fn(&ProcessSpec) -> MediaResult<ProcessOutput> + Send + Sync;

/// In-memory [`ProcessRunner`] driven by a closure.
#[derive(Clone)]
pub struct ScriptedRunner {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<ProcessSpec>>>,
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ProcessSpec) -> MediaResult<ProcessOutput> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runner where every call succeeds with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(ProcessOutput::ok("")))
    }

    /// Every spec run so far, in call order.
    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// ffmpeg invocations only.
    pub fn ffmpeg_calls(&self) -> Vec<ProcessSpec> {
        self.calls()
            .into_iter()
            .filter(|spec| spec.program == "ffmpeg")
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &ProcessSpec) -> MediaResult<ProcessOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.responder)(spec)
    }
}
