//! Report job client
//!
//! Drives one provider job per window: submit, poll until terminal, download
//! and decode. Transient provider failures are absorbed here with backoff;
//! anything that escapes is a [`ReportError`] naming the window and job.

pub mod context;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dates::DateWindow;
use crate::error::{ReportError, Result};
use crate::payload::{self, WindowPayload};
use crate::provider::{Credentials, JobStatus, ProviderError, ReportProvider};

pub use context::RunContext;
pub use state::{ReportJob, TransitionError};

/// Retry and polling knobs for the job client
#[derive(Debug, Clone, PartialEq)]
pub struct JobPolicy {
    pub submit_attempts: u32,
    pub fetch_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub poll_interval: Duration,
    pub poll_backoff: f64,
    pub poll_max_interval: Duration,
    pub max_job_wait: Duration,
    pub min_call_interval: Duration,
}

impl Default for JobPolicy {
    fn default() -> Self {
        crate::config::JobsConfig::default().policy()
    }
}

impl JobPolicy {
    /// Delay before retry number `attempt` (1-based).
    ///
    /// Exponential from `retry_base_delay`, capped at `retry_max_delay`, and
    /// never shorter than the provider's Retry-After hint.
    pub fn retry_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let backoff = self
            .retry_base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.retry_max_delay);
        backoff.max(hint.unwrap_or_default())
    }

    /// Poll interval following `current`
    pub fn next_poll_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.poll_backoff)
            .unwrap_or(self.poll_max_interval)
            .min(self.poll_max_interval)
    }
}

/// Runs report jobs for one account against a provider
pub struct ReportJobClient {
    provider: Arc<dyn ReportProvider>,
    credentials: Credentials,
    policy: JobPolicy,
}

impl ReportJobClient {
    pub fn new(
        provider: Arc<dyn ReportProvider>,
        credentials: Credentials,
        policy: JobPolicy,
    ) -> Self {
        Self {
            provider,
            credentials,
            policy,
        }
    }

    pub fn policy(&self) -> &JobPolicy {
        &self.policy
    }

    /// Submit, poll and fetch the report for one window
    pub async fn run(&self, ctx: &mut RunContext, window: DateWindow) -> Result<WindowPayload> {
        let job_id = self.submit(ctx, window).await?;
        info!("[{}] Submitted job {} for {}", self.provider.name(), job_id, window);

        let mut job = ReportJob::new(window, job_id);
        let document_id = self.wait_for_document(ctx, &mut job).await?;
        info!(
            "[{}] Job {} done after {} poll(s)",
            self.provider.name(),
            job.job_id,
            job.polls()
        );

        let entries = self.download(ctx, &job, &document_id).await?;
        info!(
            "[{}] Fetched {} order rows for {}",
            self.provider.name(),
            entries.len(),
            window
        );

        Ok(WindowPayload { window, entries })
    }

    async fn submit(&self, ctx: &mut RunContext, window: DateWindow) -> Result<String> {
        let max_attempts = self.policy.submit_attempts.max(1);
        let mut attempt = 1;

        loop {
            ctx.throttle().await?;
            match self.provider.submit(&self.credentials, &window).await {
                Ok(job_id) => return Ok(job_id),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    self.back_off(ctx, &e, attempt, max_attempts, "submit").await?;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ReportError::Submission {
                        window,
                        attempts: attempt,
                        detail: e.to_string(),
                    })
                }
            }
        }
    }

    async fn wait_for_document(&self, ctx: &mut RunContext, job: &mut ReportJob) -> Result<String> {
        let started = ctx.elapsed();
        let mut interval = self.policy.poll_interval;

        loop {
            let waited = ctx.elapsed().saturating_sub(started);
            if waited >= self.policy.max_job_wait {
                return Err(ReportError::JobTimeout {
                    job_id: job.job_id.clone(),
                    window: job.window,
                    waited,
                });
            }

            ctx.wait(interval).await?;
            interval = self.policy.next_poll_interval(interval);
            ctx.throttle().await?;

            let status = match self.provider.poll(&self.credentials, &job.job_id).await {
                Ok(status) => status,
                Err(e) if e.is_retryable() => {
                    if let Some(hint) = e.retry_after() {
                        ctx.defer_calls(hint);
                    }
                    warn!(
                        "[{}] Polling job {} failed, will retry: {}",
                        self.provider.name(),
                        job.job_id,
                        e
                    );
                    continue;
                }
                Err(e) => return Err(job_failed(job, format!("status check failed: {}", e))),
            };

            debug!("Job {} -> {}", job.job_id, status.as_str());
            job.advance(status.clone())
                .map_err(|e| job_failed(job, e.to_string()))?;

            match status {
                JobStatus::Done { document_id } => return Ok(document_id),
                JobStatus::Failed | JobStatus::Cancelled => {
                    return Err(job_failed(
                        job,
                        format!("provider reported {}", status.as_str()),
                    ))
                }
                JobStatus::Pending | JobStatus::InProgress => {}
            }
        }
    }

    async fn download(
        &self,
        ctx: &mut RunContext,
        job: &ReportJob,
        document_id: &str,
    ) -> Result<Vec<payload::RawOrderEntry>> {
        let max_attempts = self.policy.fetch_attempts.max(1);
        let mut attempt = 1;

        let bytes = loop {
            ctx.throttle().await?;
            match self.provider.fetch(&self.credentials, document_id).await {
                Ok(bytes) => break bytes,
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    self.back_off(ctx, &e, attempt, max_attempts, "fetch").await?;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ReportError::Fetch {
                        job_id: job.job_id.clone(),
                        window: job.window,
                        detail: format!("{} (after {} attempt(s))", e, attempt),
                    })
                }
            }
        };

        payload::decode_flat_file(&bytes).map_err(|e| ReportError::Fetch {
            job_id: job.job_id.clone(),
            window: job.window,
            detail: format!("undecodable report document: {}", e),
        })
    }

    async fn back_off(
        &self,
        ctx: &mut RunContext,
        error: &ProviderError,
        attempt: u32,
        max_attempts: u32,
        action: &str,
    ) -> Result<()> {
        let hint = error.retry_after();
        if let Some(hint) = hint {
            ctx.defer_calls(hint);
        }
        let delay = self.policy.retry_delay(attempt, hint);
        warn!(
            "[{}] {} failed (attempt {}/{}), retrying in {:.1}s: {}",
            self.provider.name(),
            action,
            attempt,
            max_attempts,
            delay.as_secs_f32(),
            error
        );
        ctx.wait(delay).await
    }
}

fn job_failed(job: &ReportJob, reason: String) -> ReportError {
    ReportError::JobFailed {
        job_id: job.job_id.clone(),
        window: job.window,
        reason,
    }
}
