//! Revtax - revenue and sales tax breakdown by U.S. state
//!
//! This library fetches order reports from an asynchronous marketplace
//! reports API over arbitrary date ranges, merges the per-window results and
//! builds a per-state revenue/tax report for filing.

pub mod aggregate;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dates;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod payload;
pub mod provider;
pub mod publish;
pub mod report;
pub mod utils;

pub use error::{ReportError, Result};
pub use orchestrator::{PublishedReport, ReportOrchestrator, ReportRequest};
