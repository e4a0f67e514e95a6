//! Date windows and range splitting
//!
//! The reports API accepts at most 31 days per request, so every caller range
//! is cut into inclusive, contiguous sub-windows before any job is submitted.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::error::{ReportError, Result};

/// Longest window the reports API accepts, in calendar days
pub const MAX_WINDOW_DAYS: u32 = 31;

/// Inclusive calendar-day range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ReportError::invalid_range(format!(
                "start_date {} must not be after end_date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// True when the window is exactly one calendar month
    pub fn is_full_month(&self) -> bool {
        self.start.day() == 1
            && self.start.year() == self.end.year()
            && self.start.month() == self.end.month()
            && last_day_of_month(self.start) == Some(self.end)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Split `[start, end]` into ordered windows of at most `max_window_days`.
pub fn split(start: NaiveDate, end: NaiveDate, max_window_days: u32) -> Result<Vec<DateWindow>> {
    let range = DateWindow::new(start, end)?;
    if max_window_days == 0 {
        return Err(ReportError::invalid_range(
            "max_window_days must be at least 1",
        ));
    }

    let span = Days::new(u64::from(max_window_days - 1));
    let mut windows = Vec::new();
    let mut current = range.start;

    loop {
        let window_end = current
            .checked_add_days(span)
            .map_or(range.end, |d| d.min(range.end));
        windows.push(DateWindow {
            start: current,
            end: window_end,
        });

        match window_end.succ_opt() {
            Some(next) if next <= range.end => current = next,
            _ => break,
        }
    }

    Ok(windows)
}

/// First through last day of the calendar month before `today`
pub fn previous_month(today: NaiveDate) -> Result<DateWindow> {
    let last = today
        .with_day(1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| ReportError::invalid_range("no previous month before the minimum date"))?;
    let first = last
        .with_day(1)
        .ok_or_else(|| ReportError::invalid_range("could not resolve first day of month"))?;
    DateWindow::new(first, last)
}

/// Resolve the caller's optional dates into the effective report range.
///
/// Both dates omitted defaults to the previous calendar month. Supplying only
/// one of them is rejected, as is an end date in the future.
pub fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<DateWindow> {
    let range = match (start, end) {
        (None, None) => {
            let range = previous_month(today)?;
            tracing::warn!(
                "No date range supplied, defaulting to the previous month ({})",
                range
            );
            range
        }
        (Some(start), Some(end)) => DateWindow::new(start, end)?,
        _ => {
            return Err(ReportError::invalid_range(
                "start_date and end_date must either both be supplied or both be omitted",
            ))
        }
    };

    if range.end > today {
        return Err(ReportError::invalid_range(format!(
            "end_date {} cannot be later than today ({})",
            range.end, today
        )));
    }

    Ok(range)
}

/// Parse a caller-supplied date.
///
/// Accepts ISO `YYYY-MM-DD` as well as `MM-DD-YYYY` with `-`, `/` or `.`
/// separators.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let cleaned = input.trim().replace(['/', '.'], "-");
    NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&cleaned, "%m-%d-%Y"))
        .map_err(|_| {
            ReportError::invalid_range(format!(
                "could not parse date '{}' (expected YYYY-MM-DD or MM-DD-YYYY)",
                input
            ))
        })
}

/// Human-facing period label used in report titles.
///
/// A full calendar month reads "November 2024"; anything else is rendered as
/// "MM-DD-YYYY - MM-DD-YYYY".
pub fn report_period_name(window: &DateWindow) -> String {
    if window.is_full_month() {
        window.start.format("%B %Y").to_string()
    } else {
        format!(
            "{} - {}",
            window.start.format("%m-%d-%Y"),
            window.end.format("%m-%d-%Y")
        )
    }
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}
