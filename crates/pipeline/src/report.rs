//! Batch report: the run's sole externally visible result.
//!
//! One [`ReportEntry`] per spec, in catalog order, each carrying a
//! terminal [`JobOutcome`]. The report serializes to JSON for the
//! `report.json` file the runner writes next to the videos, and
//! renders a human summary for the closing log block.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Terminal outcome of one spec's job.
///
/// `AssemblyFailed` is distinct from `Failed`: generation succeeded and
/// the staged frames are kept on disk, only the encode step failed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        video_path: PathBuf,
        frame_count: usize,
    },
    AssemblyFailed {
        frames_dir: PathBuf,
        frame_count: usize,
        error: String,
    },
    Failed {
        error: String,
    },
    TimedOut {
        waited_secs: u64,
    },
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::AssemblyFailed { .. } => "assembly_failed",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::TimedOut { .. } => "timed_out",
        }
    }

    /// Only a fully assembled video counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Outcome of one spec within a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub spec_name: String,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// Full result of a batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per processed spec, in processing (catalog) order.
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn completed_count(&self) -> usize {
        self.count_label("completed")
    }

    pub fn assembly_failed_count(&self) -> usize {
        self.count_label("assembly_failed")
    }

    pub fn failed_count(&self) -> usize {
        self.count_label("failed")
    }

    pub fn timed_out_count(&self) -> usize {
        self.count_label("timed_out")
    }

    /// True when every entry produced a video (trivially true when empty).
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_success())
    }

    /// Names of all specs that did not end in a video, in report order.
    pub fn failed_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| !entry.outcome.is_success())
            .map(|entry| entry.spec_name.as_str())
            .collect()
    }

    /// The closing summary block, one line per element.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "=".repeat(60),
            "Generation Summary".to_string(),
            "=".repeat(60),
            format!("Successful: {}/{}", self.completed_count(), self.total()),
            format!(
                "Failed: {}/{}",
                self.total() - self.completed_count(),
                self.total()
            ),
        ];
        let failed = self.failed_names();
        if !failed.is_empty() {
            lines.push("Failed animations:".to_string());
            for entry in self.entries.iter().filter(|e| !e.outcome.is_success()) {
                lines.push(format!("  - {} ({})", entry.spec_name, entry.outcome.label()));
            }
        }
        lines
    }

    fn count_label(&self, label: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.label() == label)
            .count()
    }
}
