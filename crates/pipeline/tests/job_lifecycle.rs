//! Lifecycle tests for [`run_job`] against a scripted service.
//!
//! Each test drives one spec through submit/poll/collect with queued
//! service answers and asserts the terminal result, the call counts,
//! and what landed on disk.

mod support;

use std::time::Duration;

use assert_matches::assert_matches;

use loopforge_comfyui::api::ApiError;
use loopforge_core::builder::SynthesizedBuilder;
use loopforge_pipeline::job::{run_job, JobError, JobSettings, JobTermination};

use support::{
    error_entry, fake_frame_bytes, fast_settings, finished_entry, test_spec, ScriptedService,
};

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// A job that finishes on the third poll completes, downloads every
/// artifact, and stages frames named by order.
#[tokio::test]
async fn job_completes_and_stages_frames_in_order() {
    let service = ScriptedService::new();
    service.push_status(Ok(None));
    service.push_status(Ok(None));
    service.push_status(Ok(Some(finished_entry(&[
        "loop_00001_.png",
        "loop_00002_.png",
        "loop_00003_.png",
    ]))));

    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &fast_settings(),
    )
    .await;

    let completed = match result {
        JobTermination::Completed(completed) => completed,
        other => panic!("Expected Completed, got {other:?}"),
    };
    assert_eq!(completed.prompt_id, "scripted-prompt");
    assert_eq!(completed.frame_count, 3);
    assert_eq!(completed.frames_dir, frames_root.path().join("demo"));

    assert_eq!(service.submit_count(), 1);
    assert_eq!(service.status_count(), 3);
    assert_eq!(service.artifact_count(), 3);

    // Frames are renumbered by staging order, not by service filename.
    let first = std::fs::read(frames_root.path().join("demo/00000.png")).unwrap();
    assert_eq!(first, fake_frame_bytes("loop_00001_.png"));
    let third = std::fs::read(frames_root.path().join("demo/00002.png")).unwrap();
    assert_eq!(third, fake_frame_bytes("loop_00003_.png"));
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

/// A rejected submission fails the job without consuming any poll budget.
#[tokio::test]
async fn rejected_submission_fails_without_polling() {
    let service = ScriptedService::new();
    service.push_submit(Err(ApiError::Rejected {
        status: 400,
        body: "invalid prompt".to_string(),
    }));

    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &fast_settings(),
    )
    .await;

    assert_matches!(
        result,
        JobTermination::Failed {
            error: JobError::Submit(ApiError::Rejected { status: 400, .. })
        }
    );
    assert_eq!(service.status_count(), 0);
}

/// An entry the service marked failed carries the remote message out.
#[tokio::test]
async fn remote_execution_error_fails_with_service_message() {
    let service = ScriptedService::new();
    service.push_status(Ok(Some(error_entry("CUDA out of memory"))));

    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &fast_settings(),
    )
    .await;

    assert_matches!(
        result,
        JobTermination::Failed { error: JobError::Remote(message) } if message == "CUDA out of memory"
    );
    assert_eq!(service.artifact_count(), 0);
}

/// A finished entry with an empty artifact list is a failure, not an
/// empty success.
#[tokio::test]
async fn finished_entry_without_artifacts_fails() {
    let service = ScriptedService::new();
    service.push_status(Ok(Some(finished_entry(&[]))));

    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &fast_settings(),
    )
    .await;

    assert_matches!(
        result,
        JobTermination::Failed {
            error: JobError::NoArtifacts
        }
    );
}

/// An artifact that cannot be downloaded demotes a remotely finished
/// job to failed.
#[tokio::test]
async fn artifact_fetch_failure_demotes_completion_to_failure() {
    let service = ScriptedService::new();
    service.push_status(Ok(Some(finished_entry(&["a.png", "b.png"]))));
    service.fail_artifact(
        "b.png",
        ApiError::NotFound {
            filename: "b.png".to_string(),
        },
    );

    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &fast_settings(),
    )
    .await;

    assert_matches!(
        result,
        JobTermination::Failed {
            error: JobError::Artifact(ApiError::NotFound { .. })
        }
    );
    assert_eq!(service.artifact_count(), 2);
}

// ---------------------------------------------------------------------------
// Timeout and poll errors
// ---------------------------------------------------------------------------

/// A job that never finishes times out once the wall-clock budget is
/// spent, and never earlier.
#[tokio::test]
async fn pending_job_times_out_after_budget() {
    let service = ScriptedService::new();

    let settings = JobSettings {
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_millis(40),
        status_retries: 0,
    };
    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &settings,
    )
    .await;

    let waited = match result {
        JobTermination::TimedOut { waited } => waited,
        other => panic!("Expected TimedOut, got {other:?}"),
    };
    assert!(waited >= settings.timeout, "timed out early after {waited:?}");
    assert!(service.status_count() >= 1);
}

/// With no retry budget, a single failed poll is terminal.
#[tokio::test]
async fn poll_error_is_terminal_without_retry_budget() {
    let service = ScriptedService::new();
    service.push_status(Err(ApiError::Protocol(
        "history request returned 500".to_string(),
    )));

    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &fast_settings(),
    )
    .await;

    assert_matches!(
        result,
        JobTermination::Failed {
            error: JobError::Poll(ApiError::Protocol(_))
        }
    );
    assert_eq!(service.status_count(), 1);
}

/// With retry budget, a transient poll error is absorbed and the job
/// still completes.
#[tokio::test]
async fn poll_error_is_retried_within_budget() {
    let service = ScriptedService::new();
    service.push_status(Err(ApiError::Protocol(
        "history request returned 502".to_string(),
    )));
    service.push_status(Ok(None));
    service.push_status(Ok(Some(finished_entry(&["only.png"]))));

    let settings = JobSettings {
        status_retries: 2,
        ..fast_settings()
    };
    let frames_root = tempfile::tempdir().unwrap();
    let result = run_job(
        &service,
        &SynthesizedBuilder,
        &test_spec("demo"),
        frames_root.path(),
        &settings,
    )
    .await;

    assert_matches!(result, JobTermination::Completed(_));
    assert_eq!(service.status_count(), 3);
}
