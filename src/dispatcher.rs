//! Command dispatcher
//!
//! Maps parsed CLI commands onto the orchestrator and prints the results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::cli::{formatters, Cli, Commands};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dates::{split, DateWindow};
use crate::orchestrator::{build_local, ReportOrchestrator, ReportRequest};
use crate::payload;
use crate::provider::HttpReportProvider;
use crate::publish::{ArtifactPublisher, FsPublisher};
use crate::report::{ReportArtifact, ReportFormat};

pub async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    let json_output = cli.json;

    match cli.command {
        Commands::Run {
            account,
            start,
            end,
            format,
            out,
        } => {
            apply_overrides(&mut config, format, out);
            dispatch_run(config, account, start, end, json_output).await
        }
        Commands::Local {
            account,
            file,
            start,
            end,
            format,
            out,
        } => {
            apply_overrides(&mut config, format, out);
            dispatch_local(config, account, file, start, end, json_output).await
        }
        Commands::Windows {
            start,
            end,
            max_days,
        } => {
            if let Some(days) = max_days {
                config.jobs.max_window_days = days;
                config.validate()?;
            }
            dispatch_windows(config, start, end, json_output)
        }
    }
}

fn apply_overrides(config: &mut Config, format: Option<ReportFormat>, out: Option<PathBuf>) {
    if let Some(format) = format {
        config.run.format = format;
    }
    if let Some(out) = out {
        config.run.output_dir = out;
    }
}

async fn dispatch_run(
    config: Config,
    account: String,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    json_output: bool,
) -> Result<()> {
    let credentials = config.credentials(&account)?;
    let provider = Arc::new(HttpReportProvider::new(&config.provider)?);
    let destination = config.run.output_dir.display().to_string();
    let orchestrator = ReportOrchestrator::new(config, provider, Arc::new(SystemClock::new()));

    let request = ReportRequest {
        account_name: account.clone(),
        start,
        end,
        credentials,
    };
    let published = orchestrator
        .run_and_publish(request, &FsPublisher, &destination)
        .await
        .with_context(|| format!("Report run for account '{}' failed", account))?;

    print_report(&published.artifact, &published.location, json_output);
    Ok(())
}

async fn dispatch_local(
    config: Config,
    account: String,
    file: PathBuf,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    json_output: bool,
) -> Result<()> {
    let entries = payload::load_file(&file)?;
    let range = match (start, end) {
        (Some(start), Some(end)) => Some(DateWindow::new(start, end)?),
        _ => None,
    };

    let destination = config.run.output_dir.display().to_string();
    let today = SystemClock::new().today();

    let artifact = build_local(&config, today, &account, entries, range)
        .with_context(|| format!("Could not build report from {}", file.display()))?;
    let location = FsPublisher.publish(&artifact, &destination).await?;
    info!("Local report written to {}", location);

    print_report(&artifact, &location, json_output);
    Ok(())
}

fn dispatch_windows(
    config: Config,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    json_output: bool,
) -> Result<()> {
    let today = SystemClock::new().today();
    let range = crate::dates::resolve_range(start, end, today)?;
    let windows = split(range.start, range.end, config.jobs.max_window_days)?;

    if json_output {
        println!("{}", formatters::format_windows_json(&range, &windows));
    } else {
        print!("{}", formatters::format_windows_table(&range, &windows));
    }
    Ok(())
}

fn print_report(artifact: &ReportArtifact, location: &str, json_output: bool) {
    if json_output {
        println!(
            "{}",
            formatters::format_report_json(artifact, Some(location))
        );
    } else {
        print!(
            "{}",
            formatters::format_report_table(artifact, Some(location))
        );
    }
}
