#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use revtax::clock::ManualClock;
use revtax::config::Config;
use revtax::dates::DateWindow;
use revtax::provider::{Credentials, JobStatus, ProviderError, ReportProvider};
use revtax::publish::{ArtifactPublisher, PublishError};
use revtax::report::ReportArtifact;
use revtax::ReportRequest;

pub const HEADER: &str = "amazon-order-id\tpurchase-date\titem-status\tproduct-name\tsku\tquantity\titem-price\titem-tax\tship-state\tship-country\tcurrency";

/// Provider that replays scripted answers and records every call
#[derive(Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<Result<String, ProviderError>>>,
    polls: Mutex<HashMap<String, VecDeque<Result<JobStatus, ProviderError>>>>,
    documents: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, ProviderError>>>>,
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Vec<DateWindow>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one window's job: polls return `statuses`, then the document
    /// `doc-{job_id}` is served with `document`.
    pub fn job(&self, job_id: &str, statuses: Vec<JobStatus>, document: Vec<u8>) -> &Self {
        self.submits
            .lock()
            .unwrap()
            .push_back(Ok(job_id.to_string()));
        self.polls
            .lock()
            .unwrap()
            .insert(job_id.to_string(), statuses.into_iter().map(Ok).collect());
        self.documents
            .lock()
            .unwrap()
            .entry(document_id(job_id))
            .or_default()
            .push_back(Ok(document));
        self
    }

    /// Queue a submit failure ahead of the next scripted job
    pub fn submit_error(&self, error: ProviderError) -> &Self {
        self.submits.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queue a download failure ahead of the document of `job_id`
    pub fn fetch_error(&self, job_id: &str, error: ProviderError) -> &Self {
        self.documents
            .lock()
            .unwrap()
            .entry(document_id(job_id))
            .or_default()
            .push_front(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn submitted_windows(&self) -> Vec<DateWindow> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn submit(
        &self,
        _credentials: &Credentials,
        window: &DateWindow,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(format!("submit {}", window));
        let answer = self.submits.lock().unwrap().pop_front().unwrap_or(Err(
            ProviderError::Rejected {
                status: 400,
                body: "no job scripted".to_string(),
            },
        ));
        if answer.is_ok() {
            self.submitted.lock().unwrap().push(*window);
        }
        answer
    }

    async fn poll(
        &self,
        _credentials: &Credentials,
        job_id: &str,
    ) -> Result<JobStatus, ProviderError> {
        self.calls.lock().unwrap().push(format!("poll {}", job_id));
        self.polls
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            // an exhausted script keeps the job running
            .unwrap_or(Ok(JobStatus::InProgress))
    }

    async fn fetch(
        &self,
        _credentials: &Credentials,
        document_id: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("fetch {}", document_id));
        self.documents
            .lock()
            .unwrap()
            .get_mut(document_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(ProviderError::Rejected {
                status: 404,
                body: "no document scripted".to_string(),
            }))
    }
}

/// Publisher that keeps artifacts in memory
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ArtifactPublisher for RecordingPublisher {
    async fn publish(
        &self,
        artifact: &ReportArtifact,
        destination: &str,
    ) -> Result<String, PublishError> {
        let location = format!("{}/{}", destination, artifact.file_name());
        self.published
            .lock()
            .unwrap()
            .push((artifact.name().to_string(), location.clone()));
        Ok(location)
    }
}

pub fn document_id(job_id: &str) -> String {
    format!("doc-{}", job_id)
}

pub fn done(job_id: &str) -> JobStatus {
    JobStatus::Done {
        document_id: document_id(job_id),
    }
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn window(start: NaiveDate, end: NaiveDate) -> DateWindow {
    DateWindow::new(start, end).unwrap()
}

/// One shipped line item as a flat file row
pub fn order_line(order_id: &str, date: &str, state: &str, price: &str, tax: &str) -> String {
    line(order_id, date, "Shipped", "Ceramic Mug", state, "US", price, tax)
}

#[allow(clippy::too_many_arguments)]
pub fn line(
    order_id: &str,
    date: &str,
    status: &str,
    product: &str,
    state: &str,
    country: &str,
    price: &str,
    tax: &str,
) -> String {
    format!(
        "{order_id}\t{date}T12:00:00+00:00\t{status}\t{product}\tSKU-1\t1\t{price}\t{tax}\t{state}\t{country}\tUSD"
    )
}

pub fn flat_file(lines: &[String]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for l in lines {
        text.push('\n');
        text.push_str(l);
    }
    text.push('\n');
    text.into_bytes()
}

/// Clock fixed at 2024-12-18
pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(d(2024, 12, 18)))
}

pub fn config() -> Config {
    Config::from_toml(
        r#"
        [run]
        format = "csv"

        [accounts.po]
        display_name = "Pacific Outfitters"
        marketplace_ids = ["ATVPDKIKX0DER"]
        "#,
    )
    .unwrap()
}

pub fn credentials() -> Credentials {
    Credentials {
        access_token: "test-token".to_string(),
        marketplace_ids: vec!["ATVPDKIKX0DER".to_string()],
    }
}

pub fn request(start: NaiveDate, end: NaiveDate) -> ReportRequest {
    ReportRequest {
        account_name: "po".to_string(),
        start: Some(start),
        end: Some(end),
        credentials: credentials(),
    }
}
