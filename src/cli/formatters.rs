//! Output formatting module for CLI display
//!
//! Keeps presentation (tables, colors, JSON shapes) out of the report logic.

use colored::Colorize;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::dates::{report_period_name, DateWindow};
use crate::report::{ReportArtifact, TaxReportRow};
use crate::utils::{format_currency, format_currency_aligned};

const SUMMARY_AMOUNT_WIDTH: usize = 14;

/// Format a finished report for JSON output
pub fn format_report_json(artifact: &ReportArtifact, location: Option<&str>) -> String {
    #[derive(Serialize)]
    struct JsonRow {
        bucket: String,
        state_code: Option<String>,
        orders: usize,
        revenue: String,
        tax: String,
    }

    #[derive(Serialize)]
    struct JsonReport {
        name: String,
        account: String,
        start: String,
        end: String,
        format: String,
        location: Option<String>,
        generated_at: String,
        rows: Vec<JsonRow>,
        state_revenue: String,
        state_tax: String,
        total_orders: usize,
        total_revenue: String,
        total_tax: String,
    }

    let report = artifact.report();
    let rows = report
        .rows
        .iter()
        .map(|r| JsonRow {
            bucket: r.bucket.label().to_string(),
            state_code: match r.bucket {
                crate::report::Bucket::State(s) => Some(s.code.to_string()),
                _ => None,
            },
            orders: r.orders,
            revenue: r.revenue.to_string(),
            tax: r.tax.to_string(),
        })
        .collect();

    let state = report.state_totals();
    let grand = report.grand_totals();
    let json_report = JsonReport {
        name: artifact.name().to_string(),
        account: artifact.metadata().account_name.clone(),
        start: report.covered_range.start.to_string(),
        end: report.covered_range.end.to_string(),
        format: artifact.format().extension().to_string(),
        location: location.map(str::to_string),
        generated_at: artifact.metadata().generated_at.to_rfc3339(),
        rows,
        state_revenue: state.revenue.to_string(),
        state_tax: state.tax.to_string(),
        total_orders: grand.orders,
        total_revenue: grand.revenue.to_string(),
        total_tax: grand.tax.to_string(),
    };

    serde_json::to_string_pretty(&json_report)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Format a finished report for terminal table output.
///
/// Only states with orders are listed; the totals cover all of them.
pub fn format_report_table(artifact: &ReportArtifact, location: Option<&str>) -> String {
    let report = artifact.report();
    let mut output = format!(
        "\n{} {}\n\n",
        "📊".cyan().bold(),
        artifact.name().bold()
    );

    #[derive(Tabled)]
    struct StateRow {
        #[tabled(rename = "State")]
        state: String,
        #[tabled(rename = "Orders")]
        orders: usize,
        #[tabled(rename = "Revenue")]
        revenue: String,
        #[tabled(rename = "Tax")]
        tax: String,
    }

    let to_row = |r: &TaxReportRow| StateRow {
        state: r.bucket.label().to_string(),
        orders: r.orders,
        revenue: format_currency(r.revenue),
        tax: format_currency(r.tax),
    };

    let rows: Vec<StateRow> = report
        .state_rows()
        .filter(|r| r.orders > 0)
        .map(to_row)
        .collect();

    if rows.is_empty() {
        output.push_str(&format!(
            "{} No taxable orders in {}\n",
            "ℹ".blue().bold(),
            report.period_name()
        ));
    } else {
        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    let state = report.state_totals();
    output.push_str(&format!("\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<22} {}",
        "State revenue:".bold(),
        format_currency_aligned(state.revenue, SUMMARY_AMOUNT_WIDTH)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "State tax:".bold(),
        format_currency_aligned(state.tax, SUMMARY_AMOUNT_WIDTH).green()
    ));

    for other in report.reconciliation_rows().filter(|r| r.orders > 0) {
        output.push_str(&format!(
            "\n{:<22} {} order(s), revenue {}, tax {}",
            format!("{}:", other.bucket.label()).yellow(),
            other.orders,
            format_currency(other.revenue),
            format_currency(other.tax)
        ));
    }

    if let Some(location) = location {
        output.push_str(&format!("\n\n{} Saved to {}", "✓".green().bold(), location));
    }
    output.push('\n');
    output
}

/// Format a range split for terminal output
pub fn format_windows_table(range: &DateWindow, windows: &[DateWindow]) -> String {
    #[derive(Tabled)]
    struct WindowRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "End")]
        end: String,
        #[tabled(rename = "Days")]
        days: i64,
    }

    let rows: Vec<WindowRow> = windows
        .iter()
        .enumerate()
        .map(|(i, w)| WindowRow {
            index: i + 1,
            start: w.start.to_string(),
            end: w.end.to_string(),
            days: w.days(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..), Alignment::right());

    format!(
        "\n{} {} ({}): {} window(s)\n\n{}\n",
        "📅".cyan().bold(),
        report_period_name(range).bold(),
        range,
        windows.len(),
        table
    )
}

/// Format a range split for JSON output
pub fn format_windows_json(range: &DateWindow, windows: &[DateWindow]) -> String {
    let payload = serde_json::json!({
        "range": range,
        "period": report_period_name(range),
        "windows": windows,
    });
    serde_json::to_string_pretty(&payload)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}
