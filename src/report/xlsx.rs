//! Workbook rendering
//!
//! Layout:
//! - rows 1-3: Account / Report / Month labels with merged B:C value cells
//! - row 5: States / Revenue / Tax header with an autofilter
//! - one row per state, then a bold highlighted Total row
//! - a reconciliation block below the table for orders not filed under a state

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};

use super::{TaxReport, Totals};
use crate::error::{ReportError, Result};
use crate::utils::round_cents;

const SHEET_NAME: &str = "Tax Report";
const REPORT_DESCRIPTION: &str = "Revenue/Tax breakdown by state";
const CURRENCY_FORMAT: &str = "$#,##0.00";
const HIGHLIGHT: u32 = 0xDDEBF7;

const HEADER_ROW: u32 = 4;
const FIRST_DATA_ROW: u32 = HEADER_ROW + 1;

struct Styles {
    plain: Format,
    bold: Format,
    highlighted: Format,
    currency: Format,
    highlighted_currency: Format,
}

impl Styles {
    fn new() -> Self {
        let plain = Format::new().set_align(FormatAlign::Center);
        let bold = plain.clone().set_bold();
        let highlighted = bold.clone().set_background_color(Color::RGB(HIGHLIGHT));
        let currency = plain.clone().set_num_format(CURRENCY_FORMAT);
        let highlighted_currency = highlighted.clone().set_num_format(CURRENCY_FORMAT);
        Self {
            plain,
            bold,
            highlighted,
            currency,
            highlighted_currency,
        }
    }
}

pub(super) fn render(report: &TaxReport) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    write_sheet(sheet, report)?;
    workbook.save_to_buffer().map_err(xlsx_error)
}

fn write_sheet(sheet: &mut Worksheet, report: &TaxReport) -> Result<()> {
    let styles = Styles::new();
    sheet.set_name(SHEET_NAME).map_err(xlsx_error)?;
    sheet.set_column_width(0, 26).map_err(xlsx_error)?;
    sheet.set_column_width(1, 18).map_err(xlsx_error)?;
    sheet.set_column_width(2, 18).map_err(xlsx_error)?;

    let header = [
        ("Account", report.display_name.clone()),
        ("Report", REPORT_DESCRIPTION.to_string()),
        ("Month", report.period_name()),
    ];
    for (row, (label, value)) in (0u32..).zip(header.iter()) {
        sheet
            .write_string_with_format(row, 0, *label, &styles.bold)
            .map_err(xlsx_error)?;
        sheet
            .merge_range(row, 1, row, 2, value, &styles.plain)
            .map_err(xlsx_error)?;
    }

    for (col, title) in (0u16..).zip(["States", "Revenue", "Tax"]) {
        sheet
            .write_string_with_format(HEADER_ROW, col, title, &styles.highlighted)
            .map_err(xlsx_error)?;
    }

    let mut row = FIRST_DATA_ROW;
    for state_row in report.state_rows() {
        write_amount_row(
            sheet,
            row,
            state_row.bucket.label(),
            state_row.revenue,
            state_row.tax,
            &styles.plain,
            &styles.currency,
        )?;
        row += 1;
    }

    let Totals { revenue, tax, .. } = report.state_totals();
    write_amount_row(
        sheet,
        row,
        "Total",
        revenue,
        tax,
        &styles.highlighted,
        &styles.highlighted_currency,
    )?;
    sheet
        .autofilter(HEADER_ROW, 0, row, 2)
        .map_err(xlsx_error)?;

    row += 2;
    sheet
        .write_string_with_format(row, 0, "Reconciliation", &styles.bold)
        .map_err(xlsx_error)?;
    row += 1;
    for other in report.reconciliation_rows() {
        write_amount_row(
            sheet,
            row,
            other.bucket.label(),
            other.revenue,
            other.tax,
            &styles.plain,
            &styles.currency,
        )?;
        row += 1;
    }

    let grand = report.grand_totals();
    write_amount_row(
        sheet,
        row,
        "All orders",
        grand.revenue,
        grand.tax,
        &styles.bold,
        &styles.currency,
    )
}

fn write_amount_row(
    sheet: &mut Worksheet,
    row: u32,
    label: &str,
    revenue: Decimal,
    tax: Decimal,
    label_format: &Format,
    amount_format: &Format,
) -> Result<()> {
    sheet
        .write_string_with_format(row, 0, label, label_format)
        .map_err(xlsx_error)?;
    sheet
        .write_number_with_format(row, 1, to_cell(revenue)?, amount_format)
        .map_err(xlsx_error)?;
    sheet
        .write_number_with_format(row, 2, to_cell(tax)?, amount_format)
        .map_err(xlsx_error)?;
    Ok(())
}

fn to_cell(amount: Decimal) -> Result<f64> {
    round_cents(amount)
        .to_f64()
        .ok_or_else(|| ReportError::Format(format!("amount {} does not fit a cell", amount)))
}

fn xlsx_error(e: XlsxError) -> ReportError {
    ReportError::Format(format!("failed to write workbook: {}", e))
}
