//! Reports API client over reqwest
//!
//! Endpoints follow the 2021-06-30 reports API: create a report, read its
//! processing status, resolve the document and download it. Status codes are
//! classified here so the job client only sees [`ProviderError`] variants.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Credentials, JobStatus, ProviderError, ReportProvider};
use crate::config::ProviderConfig;
use crate::dates::DateWindow;

const PROVIDER_NAME: &str = "reports-api";
const API_VERSION: &str = "2021-06-30";
const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";
const LOG_BODY_LIMIT: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportRequest<'a> {
    report_type: &'a str,
    data_start_time: String,
    data_end_time: String,
    marketplace_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportResponse {
    report_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportStatusResponse {
    processing_status: String,
    report_document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportDocumentResponse {
    url: String,
    compression_algorithm: Option<String>,
}

/// HTTP implementation of [`ReportProvider`]
#[derive(Debug, Clone)]
pub struct HttpReportProvider {
    client: Client,
    base_url: String,
    report_type: String,
}

impl HttpReportProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("revtax/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build reports API HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            report_type: config.report_type.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/reports/{}/{}", self.base_url, API_VERSION, path)
    }

    fn authorized(&self, request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        request.header(ACCESS_TOKEN_HEADER, &credentials.access_token)
    }

    /// Send a request and classify the outcome by status code
    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<Vec<u8>, ProviderError> {
        debug!("[{}] {}", PROVIDER_NAME, action);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(format!("failed to read response body: {}", e)))?
            .to_vec();

        debug!("[{}] {} -> HTTP {}", PROVIDER_NAME, action, status);

        match status {
            200..=299 => Ok(body),
            429 => {
                warn!(
                    "[{}] Rate limited on {} (retry_after={:?})",
                    PROVIDER_NAME, action, retry_after
                );
                Err(ProviderError::RateLimited { retry_after })
            }
            500..=599 => Err(ProviderError::Server {
                status,
                body: truncate_for_log(&body),
                retry_after,
            }),
            _ => Err(ProviderError::Rejected {
                status,
                body: truncate_for_log(&body),
            }),
        }
    }

    fn parse_json<T: for<'de> Deserialize<'de>>(body: &[u8], action: &str) -> Result<T, ProviderError> {
        serde_json::from_slice(body).map_err(|e| {
            ProviderError::Parse(format!("{} returned unexpected JSON: {}", action, e))
        })
    }
}

#[async_trait]
impl ReportProvider for HttpReportProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn submit(
        &self,
        credentials: &Credentials,
        window: &DateWindow,
    ) -> Result<String, ProviderError> {
        let payload = CreateReportRequest {
            report_type: &self.report_type,
            data_start_time: format!("{}T00:00:00Z", window.start.format("%Y-%m-%d")),
            data_end_time: format!("{}T23:59:59Z", window.end.format("%Y-%m-%d")),
            marketplace_ids: &credentials.marketplace_ids,
        };

        let request = self
            .authorized(self.client.post(self.endpoint("reports")), credentials)
            .json(&payload);
        let body = self.execute(request, "createReport").await?;
        let created: CreateReportResponse = Self::parse_json(&body, "createReport")?;
        Ok(created.report_id)
    }

    async fn poll(
        &self,
        credentials: &Credentials,
        job_id: &str,
    ) -> Result<JobStatus, ProviderError> {
        let url = self.endpoint(&format!("reports/{}", job_id));
        let request = self.authorized(self.client.get(url), credentials);
        let body = self.execute(request, "getReport").await?;
        let report: ReportStatusResponse = Self::parse_json(&body, "getReport")?;
        map_processing_status(&report.processing_status, report.report_document_id)
    }

    async fn fetch(
        &self,
        credentials: &Credentials,
        document_id: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.endpoint(&format!("documents/{}", document_id));
        let request = self.authorized(self.client.get(url), credentials);
        let body = self.execute(request, "getReportDocument").await?;
        let document: ReportDocumentResponse = Self::parse_json(&body, "getReportDocument")?;

        if let Some(algorithm) = document.compression_algorithm {
            return Err(ProviderError::Parse(format!(
                "document {} is {}-compressed; only uncompressed documents are supported",
                document_id, algorithm
            )));
        }

        // pre-signed download link; no access token
        self.execute(self.client.get(document.url.as_str()), "downloadDocument")
            .await
    }
}

fn map_processing_status(
    status: &str,
    document_id: Option<String>,
) -> Result<JobStatus, ProviderError> {
    match status {
        "IN_QUEUE" => Ok(JobStatus::Pending),
        "IN_PROGRESS" => Ok(JobStatus::InProgress),
        "DONE" => document_id
            .map(|document_id| JobStatus::Done { document_id })
            .ok_or_else(|| ProviderError::Parse("report is DONE but has no document id".into())),
        "FATAL" => Ok(JobStatus::Failed),
        "CANCELLED" => Ok(JobStatus::Cancelled),
        other => Err(ProviderError::Parse(format!(
            "unknown processing status '{}'",
            other
        ))),
    }
}

fn truncate_for_log(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(LOG_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}
