//! Scripted in-memory inference service shared by the pipeline tests.
//!
//! Submission and status answers are consumed from queues in call
//! order; queue exhaustion falls back to "accepted" / "still running"
//! so a test only scripts the calls it cares about.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use loopforge_comfyui::api::ApiError;
use loopforge_comfyui::outputs::{ArtifactRef, HistoryEntry, HistoryStatus, NodeOutput};
use loopforge_core::catalog::AnimationSpec;
use loopforge_core::workflow::WorkflowGraph;
use loopforge_pipeline::job::{InferenceService, JobSettings};

pub struct ScriptedService {
    submits: Mutex<VecDeque<Result<String, ApiError>>>,
    statuses: Mutex<VecDeque<Result<Option<HistoryEntry>, ApiError>>>,
    artifact_failures: Mutex<HashMap<String, ApiError>>,
    pub submit_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub artifact_calls: AtomicU32,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            artifact_failures: Mutex::new(HashMap::new()),
            submit_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            artifact_calls: AtomicU32::new(0),
        }
    }

    pub fn push_submit(&self, result: Result<String, ApiError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: Result<Option<HistoryEntry>, ApiError>) {
        self.statuses.lock().unwrap().push_back(result);
    }

    /// Make the next download of `filename` fail with `error`.
    pub fn fail_artifact(&self, filename: &str, error: ApiError) {
        self.artifact_failures
            .lock()
            .unwrap()
            .insert(filename.to_string(), error);
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn artifact_count(&self) -> u32 {
        self.artifact_calls.load(Ordering::SeqCst)
    }
}

impl InferenceService for ScriptedService {
    fn submit(
        &self,
        _workflow: &WorkflowGraph,
    ) -> impl Future<Output = Result<String, ApiError>> + Send {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("scripted-prompt".to_string()));
        async move { result }
    }

    fn fetch_status(
        &self,
        _prompt_id: &str,
    ) -> impl Future<Output = Result<Option<HistoryEntry>, ApiError>> + Send {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None));
        async move { result }
    }

    fn fetch_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self
            .artifact_failures
            .lock()
            .unwrap()
            .remove(&artifact.filename)
        {
            Some(error) => Err(error),
            None => Ok(fake_frame_bytes(&artifact.filename)),
        };
        async move { result }
    }
}

/// Deterministic stand-in bytes for a downloaded frame.
pub fn fake_frame_bytes(filename: &str) -> Vec<u8> {
    format!("png:{filename}").into_bytes()
}

/// A history entry whose single output node produced `filenames` in order.
pub fn finished_entry(filenames: &[&str]) -> HistoryEntry {
    let images = filenames
        .iter()
        .map(|filename| ArtifactRef {
            filename: (*filename).to_string(),
            subfolder: String::new(),
            kind: "output".to_string(),
        })
        .collect();
    HistoryEntry {
        outputs: BTreeMap::from([("9".to_string(), NodeOutput { images })]),
        status: Some(HistoryStatus {
            status_str: Some("success".to_string()),
            completed: Some(true),
            messages: vec![],
        }),
    }
}

/// A history entry the service marked as failed with `message`.
pub fn error_entry(message: &str) -> HistoryEntry {
    HistoryEntry {
        outputs: BTreeMap::new(),
        status: Some(HistoryStatus {
            status_str: Some("error".to_string()),
            completed: Some(false),
            messages: vec![serde_json::json!([
                "execution_error",
                {"exception_message": message}
            ])],
        }),
    }
}

/// Millisecond-scale timing so lifecycle tests finish quickly.
pub fn fast_settings() -> JobSettings {
    JobSettings {
        poll_interval: Duration::from_millis(2),
        timeout: Duration::from_secs(5),
        status_retries: 0,
    }
}

/// A minimal spec for driving the pipeline in tests.
pub fn test_spec(name: &str) -> AnimationSpec {
    AnimationSpec {
        name: name.to_string(),
        prompt: "a test pattern".to_string(),
        negative_prompt: "blurry".to_string(),
        frame_count: 8,
        fps: 24,
        width: 64,
        height: 64,
    }
}
