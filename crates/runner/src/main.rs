//! `loopforge` -- batch animation generation CLI.
//!
//! Drives a ComfyUI-compatible inference service through the built-in
//! animation catalog: one workflow submission per spec, frame staging,
//! H.264 assembly, and a JSON batch report under the output directory.
//!
//! Positional arguments select catalog entries by name; with no
//! arguments the full catalog runs.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                         |
//! |------------------------|----------|-------------------------|-------------------------------------|
//! | `COMFYUI_URL`          | no       | `http://127.0.0.1:8188` | Inference service base URL          |
//! | `OUTPUT_DIR`           | no       | `output/animations`     | Frames, videos, and report root     |
//! | `WORKFLOW_TEMPLATE`    | no       | unset                   | API-format workflow template path   |
//! | `POLL_INTERVAL_SECS`   | no       | `1`                     | Delay between status polls          |
//! | `JOB_TIMEOUT_SECS`     | no       | `1800`                  | Wall-clock budget per job           |
//! | `STATUS_RETRIES`       | no       | `0`                     | Consecutive poll failures tolerated |
//! | `INTER_JOB_PAUSE_SECS` | no       | `2`                     | Pause after each successful job     |
//! | `MAX_CONCURRENT_JOBS`  | no       | `1`                     | Jobs in flight at once              |
//! | `VIDEO_CRF`            | no       | `23`                    | H.264 constant-rate-factor          |
//! | `STRICT_EXIT`          | no       | `false`                 | Exit 1 when any job failed          |
//!
//! # Exit codes
//!
//! * `0` -- batch ran to completion (individual jobs may still have
//!   failed; see the report and `STRICT_EXIT`)
//! * `1` -- inference service unreachable, or `STRICT_EXIT=true` with
//!   at least one failed job
//! * `2` -- configuration error (malformed variable, unknown animation
//!   name, unreadable template, unwritable output directory)

use std::sync::Arc;

use loopforge_comfyui::api::ComfyApi;
use loopforge_core::builder::WorkflowBuilder;
use loopforge_core::catalog::AnimationCatalog;
use loopforge_pipeline::batch::BatchRunner;
use loopforge_runner::config::RunnerConfig;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RunnerConfig::from_env().unwrap_or_else(|err| {
        tracing::error!(error = %err, "Invalid configuration");
        std::process::exit(2);
    });

    tracing::info!(
        base_url = %config.base_url,
        output_dir = %config.output_dir.display(),
        max_concurrent = config.max_concurrent_jobs,
        "Starting loopforge",
    );

    let api = ComfyApi::new(&config.base_url);
    if let Err(err) = api.health_check().await {
        tracing::error!(
            error = %err,
            base_url = %config.base_url,
            "Inference service unreachable; is ComfyUI running?",
        );
        std::process::exit(1);
    }
    tracing::info!("Inference service is reachable");

    let builder = WorkflowBuilder::select(config.workflow_template.as_deref()).unwrap_or_else(
        |err| {
            tracing::error!(error = %err, "Workflow template rejected");
            std::process::exit(2);
        },
    );
    tracing::info!(builder = builder.label(), "Workflow builder selected");

    let names: Vec<String> = std::env::args().skip(1).collect();
    let catalog = AnimationCatalog::builtin();
    let specs = if names.is_empty() {
        catalog.specs().to_vec()
    } else {
        catalog.select(&names).unwrap_or_else(|err| {
            tracing::error!(error = %err, "Invalid animation selection");
            std::process::exit(2);
        })
    };
    tracing::info!(jobs = specs.len(), "Animation selection resolved");

    if let Err(err) = tokio::fs::create_dir_all(&config.output_dir).await {
        tracing::error!(
            error = %err,
            output_dir = %config.output_dir.display(),
            "Cannot create output directory",
        );
        std::process::exit(2);
    }

    let runner = BatchRunner::new(
        Arc::new(api),
        Arc::new(builder),
        config.output_dir.clone(),
        config.batch_settings(),
    );
    let report = runner.run(&specs).await;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            let path = config.output_dir.join("report.json");
            if let Err(err) = tokio::fs::write(&path, json).await {
                tracing::warn!(error = %err, path = %path.display(), "Failed to write batch report");
            } else {
                tracing::info!(path = %path.display(), "Batch report written");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to serialize batch report");
        }
    }

    for line in report.summary_lines() {
        tracing::info!("{line}");
    }

    if config.strict_exit && !report.all_succeeded() {
        std::process::exit(1);
    }
}
