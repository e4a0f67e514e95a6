//! Merge per-window payloads into one order dataset
//!
//! Provider rows are line items; rows sharing an order id within a window
//! belong to one order. Windows may overlap at their boundaries, so an order
//! already seen in an earlier window is ignored when it shows up again.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::dates::DateWindow;
use crate::error::{ReportError, Result};
use crate::payload::{RawOrderEntry, WindowPayload};

pub const COL_ORDER_ID: &str = "amazon-order-id";
pub const COL_PURCHASE_DATE: &str = "purchase-date";
pub const COL_ITEM_STATUS: &str = "item-status";
pub const COL_PRODUCT_NAME: &str = "product-name";
pub const COL_ITEM_PRICE: &str = "item-price";
pub const COL_ITEM_TAX: &str = "item-tax";
pub const COL_SHIP_STATE: &str = "ship-state";
pub const COL_SHIP_COUNTRY: &str = "ship-country";
pub const COL_CURRENCY: &str = "currency";
pub const COL_SKU: &str = "sku";
pub const COL_QUANTITY: &str = "quantity";

const DEFAULT_CURRENCY: &str = "USD";
const CANCELLED_STATUS: &str = "Cancelled";
/// Product name the provider uses for non-sale adjustment rows
const NON_SALE_PRODUCT: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub sku: Option<String>,
    pub product_name: String,
    pub item_status: String,
    pub quantity: u32,
    pub item_price: Decimal,
    pub item_tax: Decimal,
}

impl LineItem {
    /// Sold item that counts toward revenue and tax
    pub fn is_billable(&self) -> bool {
        !self.item_status.eq_ignore_ascii_case(CANCELLED_STATUS)
            && self.product_name != NON_SALE_PRODUCT
    }
}

/// One order, identified by its order id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub purchase_date: NaiveDate,
    pub ship_country: String,
    pub ship_state: String,
    pub currency: String,
    /// Window the order was first delivered in
    pub window: DateWindow,
    pub line_items: Vec<LineItem>,
}

impl OrderRecord {
    pub fn has_billable_items(&self) -> bool {
        self.line_items.iter().any(LineItem::is_billable)
    }

    pub fn revenue(&self) -> Decimal {
        self.billable().map(|i| i.item_price).sum()
    }

    pub fn tax(&self) -> Decimal {
        self.billable().map(|i| i.item_tax).sum()
    }

    fn billable(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(|i| i.is_billable())
    }
}

/// Deduplicated orders sorted by `(purchase_date, order_id)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedDataset {
    records: Vec<OrderRecord>,
}

impl MergedDataset {
    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest purchase dates, if any orders are present
    pub fn date_span(&self) -> Option<DateWindow> {
        let first = self.records.first()?.purchase_date;
        let last = self.records.last()?.purchase_date;
        Some(DateWindow {
            start: first,
            end: last,
        })
    }

    pub fn total_revenue(&self) -> Decimal {
        self.records.iter().map(OrderRecord::revenue).sum()
    }

    pub fn total_tax(&self) -> Decimal {
        self.records.iter().map(OrderRecord::tax).sum()
    }
}

/// Merge window payloads into a single dataset.
///
/// Payloads are visited in window order regardless of input order. Within a
/// window, repeated identical rows are collapsed; across windows the first
/// occurrence of an order id wins.
pub fn merge(payloads: &[WindowPayload]) -> Result<MergedDataset> {
    let mut ordered: Vec<&WindowPayload> = payloads.iter().collect();
    ordered.sort_by_key(|p| p.window.start);

    let mut records: Vec<OrderRecord> = Vec::new();
    let mut raw_rows: Vec<Vec<&BTreeMap<String, String>>> = Vec::new();
    let mut by_order_id: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for payload in ordered {
        for entry in &payload.entries {
            let (header, item) = parse_row(payload.window, entry)?;

            match by_order_id.get(&header.order_id) {
                Some(&idx) if records[idx].window != payload.window => {
                    skipped += 1;
                }
                Some(&idx) => {
                    if !raw_rows[idx].contains(&&entry.fields) {
                        raw_rows[idx].push(&entry.fields);
                        records[idx].line_items.push(item);
                    }
                }
                None => {
                    by_order_id.insert(header.order_id.clone(), records.len());
                    raw_rows.push(vec![&entry.fields]);
                    records.push(OrderRecord {
                        order_id: header.order_id,
                        purchase_date: header.purchase_date,
                        ship_country: header.ship_country,
                        ship_state: header.ship_state,
                        currency: header.currency,
                        window: payload.window,
                        line_items: vec![item],
                    });
                }
            }
        }
    }

    if skipped > 0 {
        debug!(
            "Ignored {} row(s) for orders already delivered by an earlier window",
            skipped
        );
    }

    records.sort_by(|a, b| {
        a.purchase_date
            .cmp(&b.purchase_date)
            .then_with(|| a.order_id.cmp(&b.order_id))
    });

    Ok(MergedDataset { records })
}

/// Purchase-date span of raw entries, skipping values that do not parse.
///
/// Used to infer the covered range of a local export before validation.
pub fn purchase_date_span(entries: &[RawOrderEntry]) -> Option<DateWindow> {
    let mut dates = entries
        .iter()
        .filter_map(|e| e.get(COL_PURCHASE_DATE))
        .filter_map(parse_purchase_date);
    let first = dates.next()?;
    let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    Some(DateWindow { start, end })
}

struct OrderHeader {
    order_id: String,
    purchase_date: NaiveDate,
    ship_country: String,
    ship_state: String,
    currency: String,
}

fn parse_row(window: DateWindow, entry: &RawOrderEntry) -> Result<(OrderHeader, LineItem)> {
    let malformed = |field: &str, detail: String| ReportError::MalformedRecord {
        window,
        line: entry.line,
        field: field.to_string(),
        detail,
    };
    let required = |field: &str| {
        entry
            .get(field)
            .ok_or_else(|| malformed(field, "is missing".to_string()))
    };
    let amount = |field: &str| -> Result<Decimal> {
        let raw = required(field)?;
        if raw.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(raw)
            .map_err(|_| malformed(field, format!("is not a valid amount: '{}'", raw)))
    };

    let order_id = required(COL_ORDER_ID)?;
    if order_id.is_empty() {
        return Err(malformed(COL_ORDER_ID, "is empty".to_string()));
    }

    let raw_date = required(COL_PURCHASE_DATE)?;
    if raw_date.is_empty() {
        return Err(malformed(COL_PURCHASE_DATE, "is empty".to_string()));
    }
    let purchase_date = parse_purchase_date(raw_date).ok_or_else(|| {
        malformed(
            COL_PURCHASE_DATE,
            format!("is not a valid date: '{}'", raw_date),
        )
    })?;

    let quantity = match entry.get(COL_QUANTITY).filter(|q| !q.is_empty()) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| malformed(COL_QUANTITY, format!("is not a valid quantity: '{}'", raw)))?,
        None => 1,
    };

    let item = LineItem {
        sku: entry
            .get(COL_SKU)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        product_name: required(COL_PRODUCT_NAME)?.to_string(),
        item_status: required(COL_ITEM_STATUS)?.to_string(),
        quantity,
        item_price: amount(COL_ITEM_PRICE)?,
        item_tax: amount(COL_ITEM_TAX)?,
    };

    let header = OrderHeader {
        order_id: order_id.to_string(),
        purchase_date,
        ship_country: required(COL_SHIP_COUNTRY)?.to_string(),
        ship_state: required(COL_SHIP_STATE)?.to_string(),
        currency: entry
            .get(COL_CURRENCY)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string(),
    };

    Ok((header, item))
}

/// Calendar date of a provider timestamp (`2024-01-05T10:00:00+00:00`)
fn parse_purchase_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split('T').next()?.trim();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
