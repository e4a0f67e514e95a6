use thiserror::Error;

use crate::dates::DateWindow;
use crate::provider::JobStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// One provider report job, from successful submit to a terminal status
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub window: DateWindow,
    pub job_id: String,
    status: JobStatus,
    polls: u32,
}

impl ReportJob {
    pub fn new(window: DateWindow, job_id: String) -> Self {
        Self {
            window,
            job_id,
            status: JobStatus::Pending,
            polls: 0,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Apply a polled status.
    ///
    /// Terminal jobs accept nothing further, and a job that started
    /// processing may not fall back to pending.
    pub fn advance(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        let allowed = match (&self.status, &next) {
            (current, _) if current.is_terminal() => false,
            (JobStatus::InProgress, JobStatus::Pending) => false,
            _ => true,
        };

        if !allowed {
            return Err(TransitionError {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }

        self.polls += 1;
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn job() -> ReportJob {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReportJob::new(DateWindow::new(day, day).unwrap(), "r-1".into())
    }

    #[test]
    fn test_normal_lifecycle() {
        let mut job = job();
        job.advance(JobStatus::Pending).unwrap();
        job.advance(JobStatus::InProgress).unwrap();
        job.advance(JobStatus::InProgress).unwrap();
        job.advance(JobStatus::Done {
            document_id: "doc".into(),
        })
        .unwrap();
        assert_eq!(job.polls(), 4);
        assert!(job.status().is_terminal());
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut job = job();
        job.advance(JobStatus::Failed).unwrap();
        let err = job.advance(JobStatus::InProgress).unwrap_err();
        assert_eq!(err.from, "FAILED");
        assert_eq!(err.to, "IN_PROGRESS");
        assert_eq!(job.status(), &JobStatus::Failed);
    }

    #[test]
    fn test_processing_cannot_regress_to_pending() {
        let mut job = job();
        job.advance(JobStatus::InProgress).unwrap();
        assert!(job.advance(JobStatus::Pending).is_err());
    }
}
