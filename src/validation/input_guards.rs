//! Field-level guards for submitted receipts
//!
//! Each guard checks one textual field and, on success, hands back the parsed
//! value so the caller never has to parse the same text twice.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

static DATE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<year>[0-9]{4})-(?P<month>[0-9]{2})-(?P<day>[0-9]{2})$")
        .expect("date pattern compiles")
});

static TIME_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<hour>[0-9]{1,2}):(?P<minute>[0-9]{2})$").expect("time pattern compiles")
});

/// Reasons a submitted receipt is rejected.
///
/// The variants name the check that failed. Clients normally only ever see
/// the generic message; the variant text is used for logs and for the
/// detailed error mode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Body was not a JSON object with the receipt's field types
    #[error("body is not a receipt document: {reason}")]
    MalformedBody { reason: String },

    #[error("retailer must not be empty")]
    EmptyRetailer,

    #[error("receipt must list at least one item")]
    NoItems,

    #[error("purchaseDate '{value}' is not a YYYY-MM-DD calendar date")]
    InvalidPurchaseDate { value: String },

    #[error("purchaseTime '{value}' is not an HH:MM time of day")]
    InvalidPurchaseTime { value: String },

    #[error("total '{value}' is not a decimal amount")]
    InvalidTotal { value: String },

    #[error("item {index} has an empty shortDescription")]
    EmptyItemDescription { index: usize },

    #[error("item {index} price '{value}' is not a decimal amount")]
    InvalidItemPrice { index: usize, value: String },
}

impl ValidationError {
    /// Short, stable name of the failed check, suitable for metric labels.
    pub fn check_name(&self) -> &'static str {
        match self {
            ValidationError::MalformedBody { .. } => "body",
            ValidationError::EmptyRetailer => "retailer",
            ValidationError::NoItems => "items",
            ValidationError::InvalidPurchaseDate { .. } => "purchase_date",
            ValidationError::InvalidPurchaseTime { .. } => "purchase_time",
            ValidationError::InvalidTotal { .. } => "total",
            ValidationError::EmptyItemDescription { .. } => "item_description",
            ValidationError::InvalidItemPrice { .. } => "item_price",
        }
    }
}

/// Parses a `YYYY-MM-DD` purchase date.
///
/// Month and day must be zero-padded and the date must exist on the calendar.
///
/// ```
/// use receipt_processor::validation::parse_purchase_date;
///
/// assert!(parse_purchase_date("2022-01-01").is_ok());
/// assert!(parse_purchase_date("2022-1-01").is_err());
/// assert!(parse_purchase_date("2022-02-30").is_err());
/// ```
pub fn parse_purchase_date(value: &str) -> ValidationResult<NaiveDate> {
    let invalid = || ValidationError::InvalidPurchaseDate {
        value: value.to_string(),
    };

    let caps = DATE_SHAPE.captures(value).ok_or_else(invalid)?;
    let year: i32 = caps["year"].parse().map_err(|_| invalid())?;
    let month: u32 = caps["month"].parse().map_err(|_| invalid())?;
    let day: u32 = caps["day"].parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parses a 24-hour `HH:MM` purchase time.
///
/// The hour may be written with one digit; the minute always has two.
///
/// ```
/// use receipt_processor::validation::parse_purchase_time;
///
/// assert!(parse_purchase_time("14:33").is_ok());
/// assert!(parse_purchase_time("9:05").is_ok());
/// assert!(parse_purchase_time("24:00").is_err());
/// assert!(parse_purchase_time("13:1").is_err());
/// ```
pub fn parse_purchase_time(value: &str) -> ValidationResult<NaiveTime> {
    let invalid = || ValidationError::InvalidPurchaseTime {
        value: value.to_string(),
    };

    let caps = TIME_SHAPE.captures(value).ok_or_else(invalid)?;
    let hour: u32 = caps["hour"].parse().map_err(|_| invalid())?;
    let minute: u32 = caps["minute"].parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Parses a decimal amount such as `"6.49"` or `"12"`.
///
/// Infinite and NaN values are not amounts and are refused.
pub fn parse_amount(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

pub fn parse_total(value: &str) -> ValidationResult<f64> {
    parse_amount(value).ok_or_else(|| ValidationError::InvalidTotal {
        value: value.to_string(),
    })
}

pub fn parse_item_price(index: usize, value: &str) -> ValidationResult<f64> {
    parse_amount(value).ok_or_else(|| ValidationError::InvalidItemPrice {
        index,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_purchase_date() {
        let date = parse_purchase_date("2022-03-20").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2022, 3, 20));

        assert!(parse_purchase_date("2024-02-29").is_ok());
        assert!(parse_purchase_date("2023-02-29").is_err());
        assert!(parse_purchase_date("2022-13-01").is_err());
        assert!(parse_purchase_date("22-01-01").is_err());
        assert!(parse_purchase_date("2022/01/01").is_err());
        assert!(parse_purchase_date(" 2022-01-01").is_err());
        assert!(parse_purchase_date("").is_err());
    }

    #[test]
    fn test_parse_purchase_time() {
        let time = parse_purchase_time("14:33").unwrap();
        assert_eq!((time.hour(), time.minute()), (14, 33));

        assert!(parse_purchase_time("00:00").is_ok());
        assert!(parse_purchase_time("23:59").is_ok());
        assert!(parse_purchase_time("12:60").is_err());
        assert!(parse_purchase_time("1:5").is_err());
        assert!(parse_purchase_time("13:01:00").is_err());
        assert!(parse_purchase_time("1pm").is_err());
        assert!(parse_purchase_time("").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("6.49"), Some(6.49));
        assert_eq!(parse_amount("12"), Some(12.0));
        assert_eq!(parse_amount("-1.25"), Some(-1.25));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("12.00 USD"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_price_error_carries_index() {
        let err = parse_item_price(3, "abc").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidItemPrice {
                index: 3,
                value: "abc".to_string()
            }
        );
        assert_eq!(err.check_name(), "item_price");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::EmptyRetailer.to_string(),
            "retailer must not be empty"
        );
        assert_eq!(
            ValidationError::InvalidTotal {
                value: "x".to_string()
            }
            .to_string(),
            "total 'x' is not a decimal amount"
        );
    }
}
