use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ReceiptId(pub String);

impl ReceiptId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for ReceiptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReceiptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A receipt exactly as submitted. Absent fields deserialize to empty values
/// and are rejected later by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Receipt {
    pub retailer: String,
    pub purchase_date: String,
    pub purchase_time: String,
    pub items: Vec<Item>,
    pub total: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub short_description: String,
    pub price: String,
}

/// A receipt whose fields have all been parsed and checked.
///
/// Only [`crate::validation::validate`] builds one, so everything downstream
/// can rely on the parsed values being present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReceipt {
    pub(crate) retailer: String,
    pub(crate) purchase_date: NaiveDate,
    pub(crate) purchase_time: NaiveTime,
    pub(crate) items: Vec<ValidatedItem>,
    pub(crate) total: f64,
}

impl ValidatedReceipt {
    pub fn retailer(&self) -> &str {
        &self.retailer
    }

    pub fn purchase_date(&self) -> NaiveDate {
        self.purchase_date
    }

    pub fn purchase_time(&self) -> NaiveTime {
        self.purchase_time
    }

    pub fn items(&self) -> &[ValidatedItem] {
        &self.items
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedItem {
    pub(crate) short_description: String,
    pub(crate) price: f64,
}

impl ValidatedItem {
    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    pub fn price(&self) -> f64 {
        self.price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReceiptResponse {
    pub id: ReceiptId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsResponse {
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
