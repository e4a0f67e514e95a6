//! Revenue/tax breakdown report
//!
//! Turns a merged order dataset into per-state revenue and tax rows and
//! renders them as a workbook or CSV. Every order lands in exactly one
//! bucket, so the rows always add up to the dataset:
//!
//! 1. no billable items (all cancelled or non-sale adjustments)
//! 2. purchase date outside the covered range
//! 3. shipped outside the U.S.
//! 4. one of the 50 states or DC
//! 5. other U.S. destinations (territories, military addresses)

mod delimited;
pub mod states;
mod xlsx;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use crate::aggregate::{MergedDataset, OrderRecord};
use crate::dates::{report_period_name, DateWindow};
use crate::error::{ReportError, Result};

pub use states::{normalize_state, UsState, US_STATES};

/// Title fragment shared by every report name
pub const REPORT_KIND: &str = "Revenue Tax Breakdown";

const US_COUNTRY_CODE: &str = "US";

/// Output encoding of a report artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Row a single order is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    State(UsState),
    OtherUs,
    NonUs,
    OutOfRange,
    NoBillableItems,
}

impl Bucket {
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::State(state) => state.name,
            Bucket::OtherUs => "Other US",
            Bucket::NonUs => "Non-US",
            Bucket::OutOfRange => "Out of range",
            Bucket::NoBillableItems => "No billable items",
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Bucket::State(_))
    }

    /// Pick the bucket for one order
    pub fn classify(record: &OrderRecord, covered_range: &DateWindow) -> Self {
        if !record.has_billable_items() {
            Bucket::NoBillableItems
        } else if !covered_range.contains(record.purchase_date) {
            Bucket::OutOfRange
        } else if !record.ship_country.trim().eq_ignore_ascii_case(US_COUNTRY_CODE) {
            Bucket::NonUs
        } else {
            normalize_state(&record.ship_state).map_or(Bucket::OtherUs, Bucket::State)
        }
    }

    fn non_state() -> [Bucket; 4] {
        [
            Bucket::OtherUs,
            Bucket::NonUs,
            Bucket::OutOfRange,
            Bucket::NoBillableItems,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxReportRow {
    pub bucket: Bucket,
    pub orders: usize,
    pub revenue: Decimal,
    pub tax: Decimal,
}

impl TaxReportRow {
    fn empty(bucket: Bucket) -> Self {
        Self {
            bucket,
            orders: 0,
            revenue: Decimal::ZERO,
            tax: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub orders: usize,
    pub revenue: Decimal,
    pub tax: Decimal,
}

/// Structured report: 51 state rows followed by the non-state buckets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxReport {
    pub account_name: String,
    pub display_name: String,
    pub covered_range: DateWindow,
    pub rows: Vec<TaxReportRow>,
}

impl TaxReport {
    pub fn from_dataset(
        dataset: &MergedDataset,
        account_name: &str,
        display_name: &str,
        covered_range: DateWindow,
    ) -> Self {
        let mut rows: Vec<TaxReportRow> = US_STATES
            .iter()
            .map(|s| TaxReportRow::empty(Bucket::State(*s)))
            .chain(Bucket::non_state().into_iter().map(TaxReportRow::empty))
            .collect();

        for record in dataset.records() {
            let bucket = Bucket::classify(record, &covered_range);
            // every bucket has a row, so the lookup cannot miss
            if let Some(row) = rows.iter_mut().find(|r| r.bucket == bucket) {
                row.orders += 1;
                row.revenue += record.revenue();
                row.tax += record.tax();
            }
        }

        Self {
            account_name: account_name.to_string(),
            display_name: display_name.to_string(),
            covered_range,
            rows,
        }
    }

    pub fn state_rows(&self) -> impl Iterator<Item = &TaxReportRow> {
        self.rows.iter().filter(|r| r.bucket.is_state())
    }

    /// Rows that are not filed under a state but keep the totals reconciled
    pub fn reconciliation_rows(&self) -> impl Iterator<Item = &TaxReportRow> {
        self.rows.iter().filter(|r| !r.bucket.is_state())
    }

    pub fn row(&self, bucket: Bucket) -> Option<&TaxReportRow> {
        self.rows.iter().find(|r| r.bucket == bucket)
    }

    /// Revenue and tax over the state rows, the figures that get filed
    pub fn state_totals(&self) -> Totals {
        sum_rows(self.state_rows())
    }

    /// Revenue and tax over every row
    pub fn grand_totals(&self) -> Totals {
        sum_rows(self.rows.iter())
    }

    /// Billable orders purchased inside the covered range
    pub fn reportable_orders(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !matches!(r.bucket, Bucket::OutOfRange | Bucket::NoBillableItems))
            .map(|r| r.orders)
            .sum()
    }

    pub fn period_name(&self) -> String {
        report_period_name(&self.covered_range)
    }

    /// "{display name} - Revenue Tax Breakdown - {period}"
    pub fn title(&self) -> String {
        format!(
            "{} - {} - {}",
            self.display_name,
            REPORT_KIND,
            self.period_name()
        )
    }
}

fn sum_rows<'a>(rows: impl Iterator<Item = &'a TaxReportRow>) -> Totals {
    rows.fold(Totals::default(), |acc, r| Totals {
        orders: acc.orders + r.orders,
        revenue: acc.revenue + r.revenue,
        tax: acc.tax + r.tax,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub account_name: String,
    pub covered_range: DateWindow,
    pub generated_at: DateTime<Utc>,
}

/// Finished report, handed to a publisher
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    name: String,
    format: ReportFormat,
    content: Vec<u8>,
    report: TaxReport,
    metadata: ArtifactMetadata,
}

impl ReportArtifact {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format.extension())
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn report(&self) -> &TaxReport {
        &self.report
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }
}

/// Builds report artifacts from merged datasets
#[derive(Debug, Clone, Default)]
pub struct TaxReportBuilder {
    allow_empty: bool,
    format: ReportFormat,
    display_name: Option<String>,
}

impl TaxReportBuilder {
    pub fn new(allow_empty: bool, format: ReportFormat) -> Self {
        Self {
            allow_empty,
            format,
            display_name: None,
        }
    }

    /// Account name printed on the report; defaults to the upper-cased account name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn build(
        &self,
        dataset: &MergedDataset,
        account_name: &str,
        covered_range: DateWindow,
    ) -> Result<ReportArtifact> {
        let display_name = self
            .display_name
            .clone()
            .unwrap_or_else(|| account_name.to_uppercase());
        let report = TaxReport::from_dataset(dataset, account_name, &display_name, covered_range);

        if report.reportable_orders() == 0 {
            if !self.allow_empty {
                return Err(ReportError::EmptyDataset {
                    range: covered_range,
                });
            }
            warn!(
                "No billable orders inside {} ({} order(s) ignored), building an empty report",
                covered_range,
                dataset.len()
            );
        }

        let grand = report.grand_totals();
        if grand.tax != dataset.total_tax() || grand.orders != dataset.len() {
            return Err(ReportError::Format(format!(
                "report rows do not reconcile with the dataset (tax {} vs {}, orders {} vs {})",
                grand.tax,
                dataset.total_tax(),
                grand.orders,
                dataset.len()
            )));
        }

        let content = match self.format {
            ReportFormat::Xlsx => xlsx::render(&report)?,
            ReportFormat::Csv => delimited::render(&report)?,
        };

        let state = report.state_totals();
        info!(
            "Built {} report '{}': {} orders, revenue {}, tax {} across states",
            self.format.extension(),
            report.title(),
            grand.orders,
            state.revenue,
            state.tax
        );

        Ok(ReportArtifact {
            name: report.title(),
            format: self.format,
            content,
            metadata: ArtifactMetadata {
                account_name: account_name.to_string(),
                covered_range,
                generated_at: Utc::now(),
            },
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{merge, COL_ITEM_STATUS, COL_SHIP_COUNTRY, COL_SHIP_STATE};
    use crate::payload::{RawOrderEntry, WindowPayload};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn january() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap()
    }

    fn entry(
        line: usize,
        id: &str,
        date: &str,
        state: &str,
        country: &str,
        tax: &str,
    ) -> RawOrderEntry {
        let fields = [
            ("amazon-order-id", id),
            ("purchase-date", date),
            ("item-status", "Shipped"),
            ("product-name", "Mug"),
            ("item-price", "100.00"),
            ("item-tax", tax),
            ("ship-state", state),
            ("ship-country", country),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RawOrderEntry { line, fields }
    }

    fn dataset() -> MergedDataset {
        let mut cancelled = entry(7, "F", "2024-01-09", "CA", "US", "9.00");
        cancelled
            .fields
            .insert(COL_ITEM_STATUS.to_string(), "Cancelled".to_string());
        let mut canada = entry(8, "G", "2024-01-10", "TX", "US", "1.00");
        canada
            .fields
            .insert(COL_SHIP_COUNTRY.to_string(), "CA".to_string());
        canada
            .fields
            .insert(COL_SHIP_STATE.to_string(), "ON".to_string());

        merge(&[WindowPayload {
            window: january(),
            entries: vec![
                entry(2, "A", "2024-01-02", "ca", "US", "7.25"),
                entry(3, "B", "2024-01-03", "California", "US", "7.25"),
                entry(4, "C", "2024-01-04", "n.y.", "US", "8.88"),
                entry(5, "D", "2024-01-05", "PR", "US", "1.15"),
                entry(6, "E", "2023-12-31", "NY", "US", "8.88"),
                cancelled,
                canada,
            ],
        }])
        .unwrap()
    }

    #[test]
    fn test_orders_land_in_expected_buckets() {
        let report = TaxReport::from_dataset(&dataset(), "po", "PO", january());
        let ca = normalize_state("CA").unwrap();
        let ny = normalize_state("NY").unwrap();

        assert_eq!(report.row(Bucket::State(ca)).unwrap().orders, 2);
        assert_eq!(report.row(Bucket::State(ca)).unwrap().tax, dec!(14.50));
        assert_eq!(report.row(Bucket::State(ny)).unwrap().tax, dec!(8.88));
        assert_eq!(report.row(Bucket::OtherUs).unwrap().tax, dec!(1.15));
        assert_eq!(report.row(Bucket::OutOfRange).unwrap().tax, dec!(8.88));
        assert_eq!(report.row(Bucket::NonUs).unwrap().tax, dec!(1.00));
        assert_eq!(report.row(Bucket::NoBillableItems).unwrap().orders, 1);
        assert_eq!(report.row(Bucket::NoBillableItems).unwrap().tax, Decimal::ZERO);
    }

    #[test]
    fn test_rows_reconcile_with_dataset() {
        let dataset = dataset();
        let report = TaxReport::from_dataset(&dataset, "po", "PO", january());

        assert_eq!(report.rows.len(), 55);
        assert_eq!(report.state_rows().count(), 51);
        assert_eq!(report.grand_totals().tax, dataset.total_tax());
        assert_eq!(report.grand_totals().orders, dataset.len());
        assert_eq!(report.state_totals().tax, dec!(23.38));
        assert_eq!(report.state_totals().revenue, dec!(300.00));
    }

    #[test]
    fn test_empty_dataset_is_rejected_unless_allowed() {
        let empty = MergedDataset::default();
        let err = TaxReportBuilder::new(false, ReportFormat::Csv)
            .build(&empty, "po", january())
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyDataset { .. }));

        let artifact = TaxReportBuilder::new(true, ReportFormat::Csv)
            .build(&empty, "po", january())
            .unwrap();
        assert_eq!(artifact.report().grand_totals(), Totals::default());
        assert_eq!(artifact.report().state_rows().count(), 51);
    }

    #[test]
    fn test_only_unreportable_orders_count_as_empty() {
        let mut cancelled = entry(3, "B", "2024-01-09", "CA", "US", "9.00");
        cancelled
            .fields
            .insert(COL_ITEM_STATUS.to_string(), "Cancelled".to_string());
        let dataset = merge(&[WindowPayload {
            window: january(),
            entries: vec![entry(2, "A", "2023-12-31", "CA", "US", "7.25"), cancelled],
        }])
        .unwrap();

        let err = TaxReportBuilder::new(false, ReportFormat::Csv)
            .build(&dataset, "po", january())
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyDataset { .. }));

        let artifact = TaxReportBuilder::new(true, ReportFormat::Csv)
            .build(&dataset, "po", january())
            .unwrap();
        assert_eq!(artifact.report().reportable_orders(), 0);
        assert_eq!(artifact.report().row(Bucket::OutOfRange).unwrap().tax, dec!(7.25));
    }

    #[test]
    fn test_artifact_name_uses_display_name_and_period() {
        let artifact = TaxReportBuilder::new(false, ReportFormat::Xlsx)
            .with_display_name("Pacific Outfitters")
            .build(&dataset(), "po", january())
            .unwrap();
        assert_eq!(
            artifact.name(),
            "Pacific Outfitters - Revenue Tax Breakdown - January 2024"
        );
        assert_eq!(
            artifact.file_name(),
            "Pacific Outfitters - Revenue Tax Breakdown - January 2024.xlsx"
        );
        assert_eq!(artifact.metadata().account_name, "po");
        // xlsx files are zip archives
        assert!(artifact.content().starts_with(b"PK"));
    }

    #[test]
    fn test_default_display_name_is_upper_cased_account() {
        let range = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
        )
        .unwrap();
        let artifact = TaxReportBuilder::new(false, ReportFormat::Csv)
            .build(&dataset(), "po", range)
            .unwrap();
        assert_eq!(
            artifact.name(),
            "PO - Revenue Tax Breakdown - 01-02-2024 - 01-20-2024"
        );
    }
}
