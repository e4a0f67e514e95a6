//! Error handling for revtax
//!
//! Defines the structured error taxonomy returned by the report pipeline.
//! Binary-level code keeps using anyhow for context chaining; everything the
//! library hands back to a caller is a [`ReportError`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::dates::DateWindow;

/// Pipeline stage a per-window failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Job,
    Fetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submit => "submit",
            Stage::Job => "job",
            Stage::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// Core error types for report generation
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid date range: {reason}")]
    InvalidRange { reason: String },

    #[error("report submission for {window} failed after {attempts} attempt(s): {detail}")]
    Submission {
        window: DateWindow,
        attempts: u32,
        detail: String,
    },

    #[error("report job {job_id} for {window} failed: {reason}")]
    JobFailed {
        job_id: String,
        window: DateWindow,
        reason: String,
    },

    #[error("report job {job_id} for {window} did not finish within {}s", waited.as_secs())]
    JobTimeout {
        job_id: String,
        window: DateWindow,
        waited: Duration,
    },

    #[error("could not download report {job_id} for {window}: {detail}")]
    Fetch {
        job_id: String,
        window: DateWindow,
        detail: String,
    },

    #[error("malformed order entry at line {line} ({window}): field '{field}' {detail}")]
    MalformedRecord {
        window: DateWindow,
        line: usize,
        field: String,
        detail: String,
    },

    #[error("no orders to report for {range}")]
    EmptyDataset { range: DateWindow },

    #[error(
        "execution time limit reached after {}s; last completed window: {}",
        elapsed.as_secs(),
        last_completed.map_or_else(|| "none".to_string(), |w| w.to_string())
    )]
    Timeout {
        last_completed: Option<DateWindow>,
        elapsed: Duration,
    },

    #[error("window {index} of {total} ({window}) failed at {stage} stage: {source}")]
    WindowFailed {
        index: usize,
        total: usize,
        window: DateWindow,
        stage: Stage,
        #[source]
        source: Box<ReportError>,
    },

    #[error("report formatting error: {0}")]
    Format(String),

    #[error("publish error: {0}")]
    Publish(#[from] crate::publish::PublishError),
}

impl ReportError {
    pub fn invalid_range(reason: impl Into<String>) -> Self {
        ReportError::InvalidRange {
            reason: reason.into(),
        }
    }

    /// Stage that failed, for per-window failures
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ReportError::WindowFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// 1-based index of the failed window, for per-window failures
    pub fn failed_window(&self) -> Option<(usize, DateWindow)> {
        match self {
            ReportError::WindowFailed { index, window, .. } => Some((*index, *window)),
            _ => None,
        }
    }
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
