use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::report::ReportFormat;

pub mod formatters;

#[derive(Parser, Debug)]
#[command(name = "revtax")]
#[command(version, about = "Revenue and sales tax breakdown by U.S. state")]
#[command(
    long_about = "Fetch order reports from the marketplace reports API for any date range (split into 31-day windows), merge them and produce a revenue/tax breakdown by U.S. state as an XLSX workbook or CSV file."
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch orders from the reports API and publish the report
    Run {
        /// Account name as configured under [accounts.<name>]
        #[arg(short, long)]
        account: String,

        /// First day (YYYY-MM-DD or MM-DD-YYYY); defaults to the previous month
        #[arg(long, value_parser = parse_date_arg, requires = "end")]
        start: Option<NaiveDate>,

        /// Last day, inclusive
        #[arg(long, value_parser = parse_date_arg, requires = "start")]
        end: Option<NaiveDate>,

        /// Output format (overrides the configured one)
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,

        /// Output directory (overrides run.output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Build the report from a local orders export (TSV, CSV or JSON)
    Local {
        /// Account name used for the report title
        #[arg(short, long)]
        account: String,

        /// Path to the orders file
        #[arg(long)]
        file: PathBuf,

        /// First day; inferred from the data when omitted
        #[arg(long, value_parser = parse_date_arg, requires = "end")]
        start: Option<NaiveDate>,

        /// Last day, inclusive
        #[arg(long, value_parser = parse_date_arg, requires = "start")]
        end: Option<NaiveDate>,

        /// Output format (overrides the configured one)
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,

        /// Output directory (overrides run.output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show how a date range is split into report windows
    Windows {
        #[arg(long, value_parser = parse_date_arg, requires = "end")]
        start: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date_arg, requires = "start")]
        end: Option<NaiveDate>,

        /// Window length in days (at most 31)
        #[arg(long)]
        max_days: Option<u32>,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    crate::dates::parse_date(value).map_err(|e| e.to_string())
}
