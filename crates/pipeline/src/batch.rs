//! Batch execution across an ordered list of animation specs.
//!
//! [`BatchRunner`] walks the spec list, runs each job through the
//! per-job lifecycle plus video assembly, and collects one outcome per
//! spec into a [`BatchReport`]. Jobs are isolated: any failure is
//! recorded and the batch moves on. Concurrency is bounded; the default
//! of one preserves strictly sequential processing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use loopforge_core::assemble::{self, DEFAULT_CRF};
use loopforge_core::builder::GraphBuilder;
use loopforge_core::catalog::AnimationSpec;

use crate::job::{run_job, InferenceService, JobSettings, JobTermination};
use crate::report::{BatchReport, JobOutcome, ReportEntry};

/// Default pause after a successful generation before the next job starts.
pub const DEFAULT_INTER_JOB_PAUSE: Duration = Duration::from_secs(2);

/// Knobs governing a whole batch run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub job: JobSettings,
    /// Pause after each successfully generated job before the worker
    /// picks up its next spec.
    pub inter_job_pause: Duration,
    /// Upper bound on jobs in flight at once (minimum one).
    pub max_concurrent: usize,
    /// H.264 constant-rate-factor passed to the encoder.
    pub video_crf: u8,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            job: JobSettings::default(),
            inter_job_pause: DEFAULT_INTER_JOB_PAUSE,
            max_concurrent: 1,
            video_crf: DEFAULT_CRF,
        }
    }
}

/// Runs batches of animation jobs against one inference service.
pub struct BatchRunner<S, B> {
    service: Arc<S>,
    builder: Arc<B>,
    output_root: PathBuf,
    settings: BatchSettings,
}

impl<S, B> BatchRunner<S, B>
where
    S: InferenceService + 'static,
    B: GraphBuilder + Send + Sync + 'static,
{
    pub fn new(
        service: Arc<S>,
        builder: Arc<B>,
        output_root: PathBuf,
        settings: BatchSettings,
    ) -> Self {
        Self {
            service,
            builder,
            output_root,
            settings,
        }
    }

    /// Directory frames are staged under, one subdirectory per spec.
    pub fn frames_root(&self) -> PathBuf {
        self.output_root.join("frames")
    }

    /// Process every spec and return the batch report.
    ///
    /// Entries appear in the same order as `specs` regardless of how
    /// concurrent jobs interleave. An empty spec list yields an empty,
    /// trivially successful report.
    pub async fn run(&self, specs: &[AnimationSpec]) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, jobs = specs.len(), "Starting batch run");

        let limit = self.settings.max_concurrent.max(1);
        let mut outcomes: Vec<Option<JobOutcome>> = (0..specs.len()).map(|_| None).collect();
        let mut tasks: JoinSet<(usize, JobOutcome)> = JoinSet::new();

        for (index, spec) in specs.iter().enumerate() {
            while tasks.len() >= limit {
                collect_next(&mut tasks, &mut outcomes).await;
            }

            let service = Arc::clone(&self.service);
            let builder = Arc::clone(&self.builder);
            let frames_root = self.frames_root();
            let output_root = self.output_root.clone();
            let settings = self.settings.clone();
            let spec = spec.clone();
            tasks.spawn(async move {
                let outcome = execute_job(
                    service.as_ref(),
                    builder.as_ref(),
                    &spec,
                    &frames_root,
                    &output_root,
                    &settings,
                )
                .await;
                (index, outcome)
            });
        }
        while !tasks.is_empty() {
            collect_next(&mut tasks, &mut outcomes).await;
        }

        let entries = specs
            .iter()
            .zip(outcomes)
            .map(|(spec, outcome)| ReportEntry {
                spec_name: spec.name.clone(),
                outcome: outcome.unwrap_or_else(|| JobOutcome::Failed {
                    error: "job task aborted before reporting an outcome".to_string(),
                }),
            })
            .collect();

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            entries,
        };
        info!(
            %run_id,
            completed = report.completed_count(),
            failed = report.total() - report.completed_count(),
            "Batch run finished"
        );
        report
    }
}

async fn collect_next(tasks: &mut JoinSet<(usize, JobOutcome)>, outcomes: &mut [Option<JobOutcome>]) {
    match tasks.join_next().await {
        Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
        Some(Err(join_error)) => error!(error = %join_error, "Job task failed to join"),
        None => {}
    }
}

/// One spec's full journey: generation, then assembly of the staged
/// frames into the final `{name}.mp4` under the output root.
async fn execute_job<S, B>(
    service: &S,
    builder: &B,
    spec: &AnimationSpec,
    frames_root: &Path,
    output_root: &Path,
    settings: &BatchSettings,
) -> JobOutcome
where
    S: InferenceService,
    B: GraphBuilder,
{
    info!(
        spec = %spec.name,
        frames = spec.frame_count,
        width = spec.width,
        height = spec.height,
        "Starting job"
    );

    match run_job(service, builder, spec, frames_root, &settings.job).await {
        JobTermination::Completed(completed) => {
            let video_path = output_root.join(format!("{}.mp4", spec.name));
            let outcome = match assemble::assemble_video(
                &completed.frames_dir,
                &video_path,
                spec.fps,
                settings.video_crf,
            )
            .await
            {
                Ok(()) => {
                    log_video_info(&video_path).await;
                    info!(spec = %spec.name, video = %video_path.display(), "Video assembled");
                    JobOutcome::Completed {
                        video_path,
                        frame_count: completed.frame_count,
                    }
                }
                Err(assemble_error) => {
                    warn!(
                        spec = %spec.name,
                        frames_dir = %completed.frames_dir.display(),
                        error = %assemble_error,
                        "Frames generated but assembly failed"
                    );
                    JobOutcome::AssemblyFailed {
                        frames_dir: completed.frames_dir,
                        frame_count: completed.frame_count,
                        error: assemble_error.to_string(),
                    }
                }
            };
            if !settings.inter_job_pause.is_zero() {
                tokio::time::sleep(settings.inter_job_pause).await;
            }
            outcome
        }
        JobTermination::Failed { error } => {
            error!(spec = %spec.name, error = %error, "Job failed");
            JobOutcome::Failed {
                error: error.to_string(),
            }
        }
        JobTermination::TimedOut { waited } => {
            error!(spec = %spec.name, waited_secs = waited.as_secs(), "Job timed out");
            JobOutcome::TimedOut {
                waited_secs: waited.as_secs(),
            }
        }
    }
}

async fn log_video_info(video_path: &Path) {
    match assemble::probe_video(video_path).await {
        Ok(probe) => {
            info!(
                video = %video_path.display(),
                duration_secs = assemble::parse_duration(&probe),
                frames = assemble::parse_total_frames(&probe),
                "Probed assembled video"
            );
        }
        Err(error) => {
            warn!(video = %video_path.display(), error = %error, "Could not probe assembled video");
        }
    }
}
