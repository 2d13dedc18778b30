//! Runner configuration loaded from environment variables.
//!
//! Every knob has a default suitable for a local ComfyUI instance, so
//! `loopforge` runs with no environment at all. Values are read once at
//! startup into a plain [`RunnerConfig`]; nothing rereads the
//! environment after that.

use std::path::PathBuf;
use std::time::Duration;

use loopforge_comfyui::api::DEFAULT_BASE_URL;
use loopforge_core::assemble::DEFAULT_CRF;
use loopforge_pipeline::batch::{BatchSettings, DEFAULT_INTER_JOB_PAUSE};
use loopforge_pipeline::job::{JobSettings, DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Default root for staged frames, encoded videos, and the report.
pub const DEFAULT_OUTPUT_DIR: &str = "output/animations";

/// A malformed environment variable value.
///
/// Unset variables never error (the default applies); only a value
/// that is present but unparseable does.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidInteger { var: &'static str, value: String },

    #[error("{var} must be true or false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },
}

/// Batch runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Base URL of the inference service.
    pub base_url: String,
    /// Root directory for frames, videos, and the batch report.
    pub output_dir: PathBuf,
    /// Optional API-format workflow template; when set, graphs are
    /// patched from this file instead of synthesized.
    pub workflow_template: Option<PathBuf>,
    /// Delay between consecutive status polls.
    pub poll_interval: Duration,
    /// Wall-clock budget per job.
    pub job_timeout: Duration,
    /// Consecutive poll failures tolerated before a job fails.
    pub status_retries: u32,
    /// Pause after each successful generation.
    pub inter_job_pause: Duration,
    /// Jobs in flight at once (minimum one).
    pub max_concurrent_jobs: usize,
    /// H.264 constant-rate-factor for assembled videos.
    pub video_crf: u8,
    /// Exit non-zero when any job in the batch failed.
    pub strict_exit: bool,
}

impl RunnerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `COMFYUI_URL`          | `http://127.0.0.1:8188` |
    /// | `OUTPUT_DIR`           | `output/animations`     |
    /// | `WORKFLOW_TEMPLATE`    | unset                   |
    /// | `POLL_INTERVAL_SECS`   | `1`                     |
    /// | `JOB_TIMEOUT_SECS`     | `1800`                  |
    /// | `STATUS_RETRIES`       | `0`                     |
    /// | `INTER_JOB_PAUSE_SECS` | `2`                     |
    /// | `MAX_CONCURRENT_JOBS`  | `1`                     |
    /// | `VIDEO_CRF`            | `23`                    |
    /// | `STRICT_EXIT`          | `false`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("COMFYUI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let output_dir = PathBuf::from(
            std::env::var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
        );

        let workflow_template = std::env::var("WORKFLOW_TEMPLATE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let poll_interval = Duration::from_secs(parse_u64(
            "POLL_INTERVAL_SECS",
            std::env::var("POLL_INTERVAL_SECS").ok(),
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?);

        let job_timeout = Duration::from_secs(parse_u64(
            "JOB_TIMEOUT_SECS",
            std::env::var("JOB_TIMEOUT_SECS").ok(),
            DEFAULT_JOB_TIMEOUT.as_secs(),
        )?);

        let status_retries =
            parse_u32("STATUS_RETRIES", std::env::var("STATUS_RETRIES").ok(), 0)?;

        let inter_job_pause = Duration::from_secs(parse_u64(
            "INTER_JOB_PAUSE_SECS",
            std::env::var("INTER_JOB_PAUSE_SECS").ok(),
            DEFAULT_INTER_JOB_PAUSE.as_secs(),
        )?);

        let max_concurrent_jobs = parse_u64(
            "MAX_CONCURRENT_JOBS",
            std::env::var("MAX_CONCURRENT_JOBS").ok(),
            1,
        )?
        .max(1) as usize;

        let video_crf = parse_u8(
            "VIDEO_CRF",
            std::env::var("VIDEO_CRF").ok(),
            DEFAULT_CRF,
        )?;

        let strict_exit = parse_bool("STRICT_EXIT", std::env::var("STRICT_EXIT").ok(), false)?;

        Ok(Self {
            base_url,
            output_dir,
            workflow_template,
            poll_interval,
            job_timeout,
            status_retries,
            inter_job_pause,
            max_concurrent_jobs,
            video_crf,
            strict_exit,
        })
    }

    /// Batch settings derived from this configuration.
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            job: JobSettings {
                poll_interval: self.poll_interval,
                timeout: self.job_timeout,
                status_retries: self.status_retries,
            },
            inter_job_pause: self.inter_job_pause,
            max_concurrent: self.max_concurrent_jobs,
            video_crf: self.video_crf,
        }
    }
}

// ---- private helpers ----

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidInteger { var, value }),
        None => Ok(default),
    }
}

fn parse_u32(var: &'static str, raw: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidInteger { var, value }),
        None => Ok(default),
    }
}

fn parse_u8(var: &'static str, raw: Option<String>, default: u8) -> Result<u8, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidInteger { var, value }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
        None => Ok(default),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
