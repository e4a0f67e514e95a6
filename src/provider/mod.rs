//! Order-report provider interface
//!
//! The reports API is asynchronous: a report is requested for a window, its
//! processing status is polled, and once done the resulting document is
//! downloaded. [`ReportProvider`] is the narrow seam the job client drives;
//! [`http::HttpReportProvider`] talks to the real API.

pub mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::dates::DateWindow;

pub use http::HttpReportProvider;

/// Per-run account credentials
#[derive(Clone)]
pub struct Credentials {
    pub access_token: String,
    pub marketplace_ids: Vec<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("marketplace_ids", &self.marketplace_ids)
            .finish()
    }
}

/// Processing status of a provider report job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    InProgress,
    Done { document_id: String },
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done { .. } | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Done { .. } => "DONE",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Errors raised while talking to the reports API.
///
/// `Network`, `Timeout`, `RateLimited` and `Server` are transient and retried
/// by the job client; everything else is surfaced as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error (HTTP {status}): {body}")]
    Server {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Timeout(_)
                | ProviderError::RateLimited { .. }
                | ProviderError::Server { .. }
        )
    }

    /// Wait the provider asked for before the next call, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after }
            | ProviderError::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[async_trait]
pub trait ReportProvider: Send + Sync {
    /// Provider identifier for logs
    fn name(&self) -> &'static str;

    /// Request an order report covering `window`; returns the job id
    async fn submit(
        &self,
        credentials: &Credentials,
        window: &DateWindow,
    ) -> Result<String, ProviderError>;

    /// Current processing status of a job
    async fn poll(&self, credentials: &Credentials, job_id: &str)
        -> Result<JobStatus, ProviderError>;

    /// Raw bytes of a finished report document
    async fn fetch(
        &self,
        credentials: &Credentials,
        document_id: &str,
    ) -> Result<Vec<u8>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Timeout("30s".into()).is_retryable());
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(ProviderError::Server {
            status: 503,
            body: String::new(),
            retry_after: None,
        }
        .is_retryable());
    }

    #[test]
    fn test_business_errors_are_not_retryable() {
        assert!(!ProviderError::Rejected {
            status: 403,
            body: "Unauthorized".into()
        }
        .is_retryable());
        assert!(!ProviderError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_hint() {
        let err = ProviderError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(ProviderError::Network("x".into()).retry_after(), None);

        let unavailable = ProviderError::Server {
            status: 503,
            body: String::new(),
            retry_after: Some(Duration::from_secs(10)),
        };
        assert_eq!(unavailable.retry_after(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let creds = Credentials {
            access_token: "Atza|secret".into(),
            marketplace_ids: vec!["ATVPDKIKX0DER".into()],
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("ATVPDKIKX0DER"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Done {
            document_id: "d".into()
        }
        .is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
