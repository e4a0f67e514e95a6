//! Formatting helpers for terminal output
//!
//! Amounts are shown in U.S. conventions: `,` groups thousands and `.`
//! separates cents.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// "$" prefix
    Usd,
    /// No symbol (JSON values, CSV-like output)
    None,
}

/// Core formatting function with full control over output.
///
/// # Arguments
/// * `value` - The decimal value to format
/// * `width` - Minimum width for right-aligned padding (0 for none)
/// * `symbol` - Whether to include the currency symbol
///
/// # Examples
/// ```
/// use revtax::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(-1234), 12, CurrencySymbol::None),
///     "   -1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let value = round_cents(value);
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let digits: Vec<char> = integer_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < Decimal::ZERO { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Usd => "$",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", sign, prefix, grouped, cents);
    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Round to whole cents, halves away from zero (1.005 -> 1.01)
pub fn round_cents(value: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    // a negative amount that rounds away keeps its sign bit otherwise ("-0.00")
    if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    }
}

/// "$1,234.56"
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// "$1,234.56", right-aligned to `width`
pub fn format_currency_aligned(value: Decimal, width: usize) -> String {
    format_currency_with_width(value, width, CurrencySymbol::Usd)
}
