//! Per-unit outcomes of a run, aggregated per batch.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of uploading one file
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadOutcome {
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
    /// `None` on success, otherwise the failure reason
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a directory upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadBatch {
    pub source_directory: PathBuf,
    /// Set when the batch was skipped before any upload
    pub error: Option<String>,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadBatch {
    pub fn uploaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.uploaded()
    }
}

/// Result of a single-file upload
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileUpload {
    Attempted(UploadOutcome),
    Skipped { source_file: PathBuf, reason: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// The encoder ran and exited; `exit_code` is `None` when killed by a signal
    Finished { exit_code: Option<i32> },
    /// Never launched because the camera folder could not be used
    Skipped { reason: String },
    /// The encoder could not be started
    LaunchFailed { reason: String },
    /// Not launched because an earlier launch failed
    NotLaunched,
    /// Launched, but waiting on the process failed
    WaitFailed { reason: String },
}

/// Outcome of one camera's encode job
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub frame_dir: PathBuf,
    pub camera: Option<String>,
    pub log_file: Option<PathBuf>,
    pub video: Option<PathBuf>,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Finished { exit_code: Some(0) })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub source_directory: PathBuf,
    pub log_dir: PathBuf,
    /// Set when the build was skipped before discovering any camera
    pub error: Option<String>,
    pub jobs: Vec<BuildOutcome>,
}

impl BuildReport {
    pub fn launched(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| {
                matches!(
                    j.status,
                    JobStatus::Finished { .. } | JobStatus::WaitFailed { .. }
                )
            })
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_success()).count()
    }
}

/// Everything one invocation did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub build: Option<BuildReport>,
    pub directory_upload: Option<UploadBatch>,
    pub file_upload: Option<FileUpload>,
}

impl RunReport {
    pub fn new() -> Self {
        RunReport {
            started_at: Utc::now(),
            finished_at: None,
            build: None,
            directory_upload: None,
            file_upload: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// One-line summary for the end of a run
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(build) = &self.build {
            parts.push(format!(
                "videos: {}/{} encoded",
                build.succeeded(),
                build.jobs.len()
            ));
        }
        if let Some(batch) = &self.directory_upload {
            parts.push(format!(
                "directory upload: {} uploaded, {} failed",
                batch.uploaded(),
                batch.failed()
            ));
        }
        match &self.file_upload {
            Some(FileUpload::Attempted(outcome)) if outcome.is_success() => {
                parts.push("file upload: ok".to_string())
            }
            Some(FileUpload::Attempted(_)) => parts.push("file upload: failed".to_string()),
            Some(FileUpload::Skipped { .. }) => parts.push("file upload: skipped".to_string()),
            None => {}
        }
        if parts.is_empty() {
            "nothing to do".to_string()
        } else {
            parts.join("; ")
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;
        Ok(())
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
