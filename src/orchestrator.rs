//! Report orchestration
//!
//! A run resolves the requested range, splits it into provider-sized windows,
//! drives one job per window in chronological order, merges the payloads and
//! builds the artifact. Any window failure aborts the run before anything is
//! built, so a partial report is never produced.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::aggregate::{merge, purchase_date_span};
use crate::clock::Clock;
use crate::config::Config;
use crate::dates::{previous_month, resolve_range, split, DateWindow};
use crate::error::{ReportError, Result, Stage};
use crate::jobs::{ReportJobClient, RunContext};
use crate::payload::{RawOrderEntry, WindowPayload};
use crate::provider::{Credentials, ReportProvider};
use crate::publish::ArtifactPublisher;
use crate::report::{ReportArtifact, TaxReportBuilder};

/// One report run for one account
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub account_name: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub credentials: Credentials,
}

/// Artifact together with where the publisher put it
#[derive(Debug, Clone)]
pub struct PublishedReport {
    pub artifact: ReportArtifact,
    pub location: String,
}

pub struct ReportOrchestrator {
    config: Config,
    provider: Arc<dyn ReportProvider>,
    clock: Arc<dyn Clock>,
}

impl ReportOrchestrator {
    pub fn new(config: Config, provider: Arc<dyn ReportProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            provider,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Effective range and its windows for the given dates
    pub fn plan(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(DateWindow, Vec<DateWindow>)> {
        let range = resolve_range(start, end, self.clock.today())?;
        let windows = split(range.start, range.end, self.config.jobs.max_window_days)?;
        Ok((range, windows))
    }

    /// Fetch every window from the provider and build the report
    pub async fn run(&self, request: ReportRequest) -> Result<ReportArtifact> {
        let (range, windows) = self.plan(request.start, request.end)?;
        info!(
            "Generating report for '{}' over {} in {} window(s)",
            request.account_name,
            range,
            windows.len()
        );

        let policy = self.config.jobs.policy();
        let mut ctx = RunContext::new(
            self.clock.clone(),
            policy.min_call_interval,
            self.config.run.deadline(),
        );
        let client = ReportJobClient::new(self.provider.clone(), request.credentials, policy);

        let total = windows.len();
        let mut payloads: Vec<WindowPayload> = Vec::with_capacity(total);
        let mut last_completed: Option<DateWindow> = None;

        for (idx, window) in windows.into_iter().enumerate() {
            if ctx.deadline_reached() {
                return Err(deadline_hit(last_completed, &ctx));
            }

            info!("Window {}/{}: {}", idx + 1, total, window);
            match client.run(&mut ctx, window).await {
                Ok(payload) => {
                    payloads.push(payload);
                    last_completed = Some(window);
                }
                Err(ReportError::Timeout { .. }) => {
                    return Err(deadline_hit(last_completed, &ctx));
                }
                Err(e) => {
                    warn!("Window {}/{} ({}) failed: {}", idx + 1, total, window, e);
                    return Err(match stage_for(&e) {
                        Some(stage) => ReportError::WindowFailed {
                            index: idx + 1,
                            total,
                            window,
                            stage,
                            source: Box::new(e),
                        },
                        None => e,
                    });
                }
            }
        }

        let dataset = merge(&payloads)?;
        info!(
            "Merged {} order(s) from {} window(s)",
            dataset.len(),
            payloads.len()
        );
        if let Some(span) = dataset.date_span() {
            debug!("Purchase dates span {}", span);
        }
        report_builder(&self.config, &request.account_name)
            .build(&dataset, &request.account_name, range)
    }

    /// Bypass mode over this orchestrator's configuration and clock; see [`build_local`]
    pub fn run_with_dataset(
        &self,
        account_name: &str,
        entries: Vec<RawOrderEntry>,
        range: Option<DateWindow>,
    ) -> Result<ReportArtifact> {
        build_local(&self.config, self.clock.today(), account_name, entries, range)
    }

    /// Run and hand the artifact to a publisher
    pub async fn run_and_publish(
        &self,
        request: ReportRequest,
        publisher: &dyn ArtifactPublisher,
        destination: &str,
    ) -> Result<PublishedReport> {
        let artifact = self.run(request).await?;
        let location = publisher.publish(&artifact, destination).await?;
        Ok(PublishedReport { artifact, location })
    }
}

/// Build a report from already-fetched entries without a provider.
///
/// Without an explicit range the covered range is inferred from the
/// entries' purchase dates, falling back to the month before `today`.
pub fn build_local(
    config: &Config,
    today: NaiveDate,
    account_name: &str,
    entries: Vec<RawOrderEntry>,
    range: Option<DateWindow>,
) -> Result<ReportArtifact> {
    let range = match range.or_else(|| purchase_date_span(&entries)) {
        Some(range) => range,
        None => previous_month(today)?,
    };
    info!(
        "Building report for '{}' from {} local row(s) covering {}",
        account_name,
        entries.len(),
        range
    );

    let dataset = merge(&[WindowPayload {
        window: range,
        entries,
    }])?;
    report_builder(config, account_name).build(&dataset, account_name, range)
}

fn report_builder(config: &Config, account_name: &str) -> TaxReportBuilder {
    TaxReportBuilder::new(config.run.allow_empty, config.run.format)
        .with_display_name(config.display_name(account_name))
}

fn deadline_hit(last_completed: Option<DateWindow>, ctx: &RunContext) -> ReportError {
    let err = ReportError::Timeout {
        last_completed,
        elapsed: ctx.elapsed(),
    };
    warn!("{}", err);
    err
}

/// Stage a job client error belongs to; `None` for errors the client does
/// not attribute to a window stage
fn stage_for(error: &ReportError) -> Option<Stage> {
    match error {
        ReportError::Submission { .. } => Some(Stage::Submit),
        ReportError::JobFailed { .. } | ReportError::JobTimeout { .. } => Some(Stage::Job),
        ReportError::Fetch { .. } => Some(Stage::Fetch),
        ReportError::InvalidRange { .. }
        | ReportError::MalformedRecord { .. }
        | ReportError::EmptyDataset { .. }
        | ReportError::Timeout { .. }
        | ReportError::WindowFailed { .. }
        | ReportError::Format(_)
        | ReportError::Publish(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn window() -> DateWindow {
        let day = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        DateWindow::new(day, day).unwrap()
    }

    #[test]
    fn test_stage_attribution() {
        let submission = ReportError::Submission {
            window: window(),
            attempts: 5,
            detail: "HTTP 503".into(),
        };
        let timeout = ReportError::JobTimeout {
            job_id: "r".into(),
            window: window(),
            waited: Duration::from_secs(900),
        };
        let fetch = ReportError::Fetch {
            job_id: "r".into(),
            window: window(),
            detail: "HTTP 500".into(),
        };
        assert_eq!(stage_for(&submission), Some(Stage::Submit));
        assert_eq!(stage_for(&timeout), Some(Stage::Job));
        assert_eq!(stage_for(&fetch), Some(Stage::Fetch));
    }

    #[test]
    fn test_errors_outside_the_job_client_have_no_stage() {
        let format = ReportError::Format("bad".into());
        let empty = ReportError::EmptyDataset { range: window() };
        assert_eq!(stage_for(&format), None);
        assert_eq!(stage_for(&empty), None);
    }

    #[test]
    fn test_build_local_infers_range_without_provider() {
        let entries = vec![RawOrderEntry {
            line: 2,
            fields: [
                ("amazon-order-id", "A"),
                ("purchase-date", "2024-03-03T10:00:00+00:00"),
                ("item-status", "Shipped"),
                ("product-name", "Mug"),
                ("item-price", "10.00"),
                ("item-tax", "0.73"),
                ("ship-state", "CA"),
                ("ship-country", "US"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }];
        let today = NaiveDate::from_ymd_opt(2024, 12, 18).unwrap();

        let artifact = build_local(&Config::default(), today, "po", entries, None).unwrap();
        assert_eq!(artifact.report().covered_range, window());
        assert_eq!(artifact.name(), "PO - Revenue Tax Breakdown - 03-03-2024 - 03-03-2024");
    }
}
