//! CSV rendering: the state table with a Total row, then reconciliation rows

use csv::Writer;
use rust_decimal::Decimal;

use super::TaxReport;
use crate::error::{ReportError, Result};
use crate::utils::round_cents;

pub(super) fn render(report: &TaxReport) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());

    write(&mut writer, ["States", "Revenue", "Tax"])?;
    for row in report.state_rows() {
        write(
            &mut writer,
            [row.bucket.label(), &amount(row.revenue), &amount(row.tax)],
        )?;
    }
    let state = report.state_totals();
    write(
        &mut writer,
        ["Total", &amount(state.revenue), &amount(state.tax)],
    )?;

    write(&mut writer, ["Reconciliation", "Revenue", "Tax"])?;
    for row in report.reconciliation_rows() {
        write(
            &mut writer,
            [row.bucket.label(), &amount(row.revenue), &amount(row.tax)],
        )?;
    }
    let grand = report.grand_totals();
    write(
        &mut writer,
        ["All orders", &amount(grand.revenue), &amount(grand.tax)],
    )?;

    writer
        .into_inner()
        .map_err(|e| ReportError::Format(format!("failed to flush CSV: {}", e)))
}

fn write(writer: &mut Writer<Vec<u8>>, record: [&str; 3]) -> Result<()> {
    writer
        .write_record(record)
        .map_err(|e| ReportError::Format(format!("failed to write CSV row: {}", e)))
}

fn amount(value: Decimal) -> String {
    format!("{:.2}", round_cents(value))
}
