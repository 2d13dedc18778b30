//! Per-job lifecycle: build, submit, poll, collect.
//!
//! [`run_job`] drives one animation spec from workflow construction to
//! frames staged on local disk, tracking progress through the explicit
//! [`JobState`] machine. The inference service is reached through the
//! [`InferenceService`] trait so tests can substitute a scripted fake.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use loopforge_comfyui::api::{ApiError, ComfyApi};
use loopforge_comfyui::outputs::{ArtifactRef, HistoryEntry};
use loopforge_core::assemble::frame_filename;
use loopforge_core::builder::GraphBuilder;
use loopforge_core::catalog::AnimationSpec;
use loopforge_core::workflow::WorkflowGraph;

/// Default delay between consecutive status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-job wall-clock budget (generation runs are long).
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(1800);

/// Async surface of the inference service used by the orchestrator.
///
/// Implemented by the real HTTP client; test code substitutes scripted
/// fakes to exercise the lifecycle without a network.
pub trait InferenceService: Send + Sync {
    /// Submit a workflow, returning the server-assigned prompt id.
    fn submit(
        &self,
        workflow: &WorkflowGraph,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// Poll for a finished history entry; `None` means still running.
    fn fetch_status(
        &self,
        prompt_id: &str,
    ) -> impl Future<Output = Result<Option<HistoryEntry>, ApiError>> + Send;

    /// Download one artifact's raw bytes.
    fn fetch_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send;
}

impl InferenceService for ComfyApi {
    fn submit(
        &self,
        workflow: &WorkflowGraph,
    ) -> impl Future<Output = Result<String, ApiError>> + Send {
        ComfyApi::submit(self, workflow)
    }

    fn fetch_status(
        &self,
        prompt_id: &str,
    ) -> impl Future<Output = Result<Option<HistoryEntry>, ApiError>> + Send {
        ComfyApi::fetch_status(self, prompt_id)
    }

    fn fetch_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send {
        ComfyApi::fetch_artifact(self, artifact)
    }
}

/// Tunable timing knobs for one job.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Delay between consecutive status polls.
    pub poll_interval: Duration,
    /// Wall-clock budget from submission to completion.
    pub timeout: Duration,
    /// Consecutive failed polls tolerated before the job fails.
    pub status_retries: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_JOB_TIMEOUT,
            status_retries: 0,
        }
    }
}

/// Lifecycle states of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Workflow graph is being constructed.
    Building,
    /// Accepted by the service, not yet observed running.
    Submitted,
    /// Waiting for a history record to appear.
    Polling,
    /// Frames staged locally.
    Completed,
    /// Terminal failure at any stage.
    Failed,
    /// Poll budget exhausted without completion.
    TimedOut,
}

impl JobState {
    pub fn label(self) -> &'static str {
        match self {
            JobState::Building => "building",
            JobState::Submitted => "submitted",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }
}

/// One tracked generation job.
#[derive(Debug)]
pub struct Job {
    pub spec_name: String,
    pub prompt_id: Option<String>,
    pub state: JobState,
    pub submitted_at: Option<DateTime<Utc>>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(spec_name: &str) -> Self {
        Self {
            spec_name: spec_name.to_string(),
            prompt_id: None,
            state: JobState::Building,
            submitted_at: None,
            last_polled_at: None,
        }
    }

    fn mark_submitted(&mut self, prompt_id: &str) {
        self.prompt_id = Some(prompt_id.to_string());
        self.submitted_at = Some(Utc::now());
        self.transition(JobState::Submitted);
    }

    fn mark_polled(&mut self) {
        self.last_polled_at = Some(Utc::now());
    }

    fn transition(&mut self, state: JobState) {
        debug!(spec = %self.spec_name, state = state.label(), "Job state changed");
        self.state = state;
    }
}

/// Failure causes for a single job run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("workflow submission failed: {0}")]
    Submit(#[source] ApiError),

    #[error("status polling failed: {0}")]
    Poll(#[source] ApiError),

    #[error("execution failed on the service: {0}")]
    Remote(String),

    #[error("artifact download failed: {0}")]
    Artifact(#[source] ApiError),

    #[error("frame staging failed at {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job finished without any output artifacts")]
    NoArtifacts,
}

/// Successful terminal result of one job: frames staged on disk.
#[derive(Debug)]
pub struct CompletedJob {
    pub prompt_id: String,
    pub frames_dir: PathBuf,
    pub frame_count: usize,
}

/// Terminal result of [`run_job`].
#[derive(Debug)]
pub enum JobTermination {
    Completed(CompletedJob),
    Failed { error: JobError },
    TimedOut { waited: Duration },
}

/// Run one spec end to end: build the graph, submit it, poll until the
/// service records a history entry, then download every artifact into
/// `frames_root/<spec name>/` in frame order.
///
/// A submission failure is terminal immediately and consumes none of
/// the poll budget. A history entry marked failed by the service, or
/// any artifact that cannot be fetched or written, fails the job even
/// though generation finished remotely.
pub async fn run_job<S, B>(
    service: &S,
    builder: &B,
    spec: &AnimationSpec,
    frames_root: &Path,
    settings: &JobSettings,
) -> JobTermination
where
    S: InferenceService,
    B: GraphBuilder,
{
    let mut job = Job::new(&spec.name);
    let graph = builder.build(spec);
    debug!(spec = %spec.name, nodes = graph.len(), "Built workflow graph");

    let prompt_id = match service.submit(&graph).await {
        Ok(id) => id,
        Err(error) => {
            job.transition(JobState::Failed);
            return JobTermination::Failed {
                error: JobError::Submit(error),
            };
        }
    };
    job.mark_submitted(&prompt_id);
    info!(spec = %spec.name, %prompt_id, "Workflow queued");
    job.transition(JobState::Polling);

    let started = Instant::now();
    let mut poll_failures: u32 = 0;
    let entry = loop {
        let waited = started.elapsed();
        if waited >= settings.timeout {
            job.transition(JobState::TimedOut);
            return JobTermination::TimedOut { waited };
        }

        job.mark_polled();
        match service.fetch_status(&prompt_id).await {
            Ok(Some(entry)) => {
                if let Some(message) = entry.error_message() {
                    job.transition(JobState::Failed);
                    return JobTermination::Failed {
                        error: JobError::Remote(message),
                    };
                }
                break entry;
            }
            Ok(None) => {
                poll_failures = 0;
            }
            Err(error) => {
                poll_failures += 1;
                if poll_failures > settings.status_retries {
                    job.transition(JobState::Failed);
                    return JobTermination::Failed {
                        error: JobError::Poll(error),
                    };
                }
                warn!(
                    spec = %spec.name,
                    error = %error,
                    attempt = poll_failures,
                    "Status poll failed, retrying"
                );
            }
        }

        tokio::time::sleep(settings.poll_interval).await;
    };

    match stage_frames(service, &entry, frames_root, &spec.name).await {
        Ok((frames_dir, frame_count)) => {
            job.transition(JobState::Completed);
            info!(spec = %spec.name, frames = frame_count, "Frames staged");
            JobTermination::Completed(CompletedJob {
                prompt_id,
                frames_dir,
                frame_count,
            })
        }
        Err(error) => {
            job.transition(JobState::Failed);
            JobTermination::Failed { error }
        }
    }
}

/// Download every artifact of a finished entry into the spec's frame
/// directory, named by staging order so the encoder input pattern
/// matches.
async fn stage_frames<S: InferenceService>(
    service: &S,
    entry: &HistoryEntry,
    frames_root: &Path,
    spec_name: &str,
) -> Result<(PathBuf, usize), JobError> {
    let artifacts = entry.ordered_artifacts();
    if artifacts.is_empty() {
        return Err(JobError::NoArtifacts);
    }

    let frames_dir = frames_root.join(spec_name);
    tokio::fs::create_dir_all(&frames_dir)
        .await
        .map_err(|source| JobError::Stage {
            path: frames_dir.clone(),
            source,
        })?;

    for (index, artifact) in artifacts.iter().enumerate() {
        let bytes = service
            .fetch_artifact(artifact)
            .await
            .map_err(JobError::Artifact)?;
        let path = frames_dir.join(frame_filename(index));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| JobError::Stage { path, source })?;
    }

    Ok((frames_dir, artifacts.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels_are_stable() {
        assert_eq!(JobState::Building.label(), "building");
        assert_eq!(JobState::Submitted.label(), "submitted");
        assert_eq!(JobState::Polling.label(), "polling");
        assert_eq!(JobState::Completed.label(), "completed");
        assert_eq!(JobState::Failed.label(), "failed");
        assert_eq!(JobState::TimedOut.label(), "timed_out");
    }

    #[test]
    fn only_end_states_are_terminal() {
        assert!(!JobState::Building.is_terminal());
        assert!(!JobState::Submitted.is_terminal());
        assert!(!JobState::Polling.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::TimedOut.is_terminal());
    }

    #[test]
    fn new_job_starts_building() {
        let job = Job::new("demo");
        assert_eq!(job.state, JobState::Building);
        assert!(job.prompt_id.is_none());
        assert!(job.submitted_at.is_none());
        assert!(job.last_polled_at.is_none());
    }

    #[test]
    fn submission_records_prompt_id_and_time() {
        let mut job = Job::new("demo");
        job.mark_submitted("abc-123");
        assert_eq!(job.state, JobState::Submitted);
        assert_eq!(job.prompt_id.as_deref(), Some("abc-123"));
        assert!(job.submitted_at.is_some());
    }

    #[test]
    fn polling_stamps_last_polled_after_submission() {
        let mut job = Job::new("demo");
        job.mark_submitted("abc-123");
        assert!(job.last_polled_at.is_none());
        job.mark_polled();
        let polled = job.last_polled_at.unwrap();
        assert!(polled >= job.submitted_at.unwrap());
    }

    #[test]
    fn default_settings_match_documented_values() {
        let settings = JobSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.timeout, Duration::from_secs(1800));
        assert_eq!(settings.status_retries, 0);
    }

    #[test]
    fn display_submit_error() {
        let err = JobError::Submit(ApiError::Rejected {
            status: 400,
            body: "bad graph".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "workflow submission failed: workflow rejected (400): bad graph"
        );
    }

    #[test]
    fn display_remote_error() {
        let err = JobError::Remote("CUDA out of memory".to_string());
        assert_eq!(
            err.to_string(),
            "execution failed on the service: CUDA out of memory"
        );
    }

    #[test]
    fn display_no_artifacts_error() {
        let err = JobError::NoArtifacts;
        assert_eq!(
            err.to_string(),
            "job finished without any output artifacts"
        );
    }

    #[test]
    fn display_stage_error_names_path() {
        let err = JobError::Stage {
            path: PathBuf::from("/tmp/frames/demo/00000.png"),
            source: std::io::Error::other("disk full"),
        };
        assert!(err.to_string().contains("/tmp/frames/demo/00000.png"));
    }
}
