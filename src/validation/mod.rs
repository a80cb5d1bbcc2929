//! Receipt validation.
//!
//! A submission is checked once, at the HTTP boundary. The checks run in a
//! fixed order and the first failure is reported:
//! - body parses as a receipt document
//! - retailer is non-empty
//! - at least one item is listed
//! - purchaseDate is a `YYYY-MM-DD` calendar date
//! - purchaseTime is an `HH:MM` time of day
//! - total is a decimal amount
//! - every item has a description and a decimal price
//!
//! # Usage
//!
//! ```rust
//! use receipt_processor::validation::validate_json;
//!
//! let body = br#"{
//!     "retailer": "Target",
//!     "purchaseDate": "2022-01-01",
//!     "purchaseTime": "13:01",
//!     "items": [{"shortDescription": "Item 1", "price": "6.49"}],
//!     "total": "6.49"
//! }"#;
//!
//! let receipt = validate_json(body).unwrap();
//! assert_eq!(receipt.retailer(), "Target");
//! assert_eq!(receipt.items().len(), 1);
//! ```

pub mod input_guards;

pub use input_guards::{
    ValidationError, ValidationResult, parse_amount, parse_item_price, parse_purchase_date,
    parse_purchase_time, parse_total,
};

use crate::model::{Item, Receipt, ValidatedItem, ValidatedReceipt};

/// Parses a raw request body and validates the receipt it holds.
pub fn validate_json(body: &[u8]) -> ValidationResult<ValidatedReceipt> {
    let receipt: Receipt =
        serde_json::from_slice(body).map_err(|err| ValidationError::MalformedBody {
            reason: err.to_string(),
        })?;
    validate(&receipt)
}

/// Validates a deserialized receipt and returns its parsed form.
pub fn validate(receipt: &Receipt) -> ValidationResult<ValidatedReceipt> {
    if receipt.retailer.is_empty() {
        return Err(ValidationError::EmptyRetailer);
    }
    if receipt.items.is_empty() {
        return Err(ValidationError::NoItems);
    }

    let purchase_date = parse_purchase_date(&receipt.purchase_date)?;
    let purchase_time = parse_purchase_time(&receipt.purchase_time)?;
    let total = parse_total(&receipt.total)?;

    let items = receipt
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_item(index, item))
        .collect::<ValidationResult<Vec<_>>>()?;

    Ok(ValidatedReceipt {
        retailer: receipt.retailer.clone(),
        purchase_date,
        purchase_time,
        items,
        total,
    })
}

fn validate_item(index: usize, item: &Item) -> ValidationResult<ValidatedItem> {
    if item.short_description.is_empty() {
        return Err(ValidationError::EmptyItemDescription { index });
    }
    let price = parse_item_price(index, &item.price)?;

    Ok(ValidatedItem {
        short_description: item.short_description.clone(),
        price,
    })
}
