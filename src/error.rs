//! Error handling for the receipt service
//!
//! Requests fail in exactly two ways: the submitted receipt is invalid, or a
//! queried id was never issued. Both map to a JSON body of the form
//! `{"error": "<message>"}`.

use crate::model::ErrorResponse;
use crate::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const INVALID_RECEIPT_MESSAGE: &str = "The receipt is invalid.";
pub const RECEIPT_NOT_FOUND_MESSAGE: &str = "No receipt found for that ID.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    /// Submitted receipt failed validation
    InvalidReceipt = 4001,
    /// Queried receipt id was never issued
    ReceiptNotFound = 4041,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidReceipt => StatusCode::BAD_REQUEST,
            ErrorCode::ReceiptNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InvalidReceipt => "validation_error",
            ErrorCode::ReceiptNotFound => "resource_not_found",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// How much of a validation failure is returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationErrorMode {
    /// One message for every failure
    #[default]
    Generic,
    /// Generic message followed by the failed check
    Detailed,
}

impl fmt::Display for ValidationErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorMode::Generic => write!(f, "generic"),
            ValidationErrorMode::Detailed => write!(f, "detailed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReceiptError {
    #[error("invalid receipt: {reason}")]
    InvalidReceipt {
        #[source]
        reason: ValidationError,
        mode: ValidationErrorMode,
    },

    #[error("no receipt found for id '{id}'")]
    NotFound { id: String },
}

impl ReceiptError {
    pub fn invalid(reason: ValidationError, mode: ValidationErrorMode) -> Self {
        ReceiptError::InvalidReceipt { reason, mode }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        ReceiptError::NotFound { id: id.into() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ReceiptError::InvalidReceipt { .. } => ErrorCode::InvalidReceipt,
            ReceiptError::NotFound { .. } => ErrorCode::ReceiptNotFound,
        }
    }

    /// Label for the `error_type` metric dimension.
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReceiptError::InvalidReceipt { reason, .. } => reason.check_name(),
            ReceiptError::NotFound { .. } => "not_found",
        }
    }

    /// The message placed in the response body.
    pub fn client_message(&self) -> String {
        match self {
            ReceiptError::InvalidReceipt {
                mode: ValidationErrorMode::Generic,
                ..
            } => INVALID_RECEIPT_MESSAGE.to_string(),
            ReceiptError::InvalidReceipt {
                reason,
                mode: ValidationErrorMode::Detailed,
            } => format!(
                "{}: {}",
                INVALID_RECEIPT_MESSAGE.trim_end_matches('.'),
                reason
            ),
            ReceiptError::NotFound { .. } => RECEIPT_NOT_FOUND_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ReceiptError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.client_message(),
        };
        (self.code().status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::InvalidReceipt.code(), 4001);
        assert_eq!(ErrorCode::ReceiptNotFound.code(), 4041);
        assert_eq!(ErrorCode::InvalidReceipt.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ReceiptNotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(ErrorCode::InvalidReceipt.category(), "validation_error");
        assert_eq!(ErrorCode::ReceiptNotFound.category(), "resource_not_found");
    }

    #[test]
    fn test_generic_message_hides_reason() {
        let error = ReceiptError::invalid(ValidationError::NoItems, ValidationErrorMode::Generic);
        assert_eq!(error.client_message(), "The receipt is invalid.");
        assert_eq!(error.code(), ErrorCode::InvalidReceipt);
    }

    #[test]
    fn test_detailed_message_names_check() {
        let error = ReceiptError::invalid(ValidationError::NoItems, ValidationErrorMode::Detailed);
        assert_eq!(
            error.client_message(),
            "The receipt is invalid: receipt must list at least one item"
        );
    }

    #[test]
    fn test_not_found_message() {
        let error = ReceiptError::not_found("abc");
        assert_eq!(error.client_message(), "No receipt found for that ID.");
        assert_eq!(error.to_string(), "no receipt found for id 'abc'");
    }

    #[test]
    fn test_metric_labels() {
        let error =
            ReceiptError::invalid(ValidationError::EmptyRetailer, ValidationErrorMode::Generic);
        assert_eq!(error.metric_label(), "retailer");
        assert_eq!(ReceiptError::not_found("abc").metric_label(), "not_found");
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::InvalidReceipt.to_string(), "InvalidReceipt(4001)");
    }

    #[test]
    fn test_into_response_status() {
        let response = ReceiptError::not_found("abc").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            ReceiptError::invalid(ValidationError::EmptyRetailer, ValidationErrorMode::Generic)
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
