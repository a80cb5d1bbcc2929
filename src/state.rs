use crate::config::ServerConfig;
use crate::error::ReceiptError;
use crate::metrics::METRICS;
use crate::model::ReceiptId;
use crate::scoring::{ScoreBreakdown, ScoringEngine};
use crate::store::ScoreStore;
use crate::validation::validate_json;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an accepted submission
#[derive(Debug, Clone)]
pub struct ProcessedReceipt {
    pub id: ReceiptId,
    pub points: i64,
    pub breakdown: ScoreBreakdown,
}

/// Application state shared by every request handler.
pub struct AppState {
    config: Arc<ServerConfig>,
    engine: ScoringEngine,
    store: ScoreStore,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self::with_store(config, ScoreStore::new())
    }

    pub fn with_store(config: Arc<ServerConfig>, store: ScoreStore) -> Self {
        let engine = ScoringEngine::new(config.quarter_check);
        Self {
            config,
            engine,
            store,
        }
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn store(&self) -> &ScoreStore {
        &self.store
    }

    /// Validates, scores and stores a raw submission.
    ///
    /// Nothing is stored unless validation succeeds.
    pub fn process_receipt(&self, body: &[u8]) -> Result<ProcessedReceipt, ReceiptError> {
        let receipt = validate_json(body)
            .map_err(|reason| ReceiptError::invalid(reason, self.config.validation_errors))?;

        let breakdown = self.engine.breakdown(&receipt);
        let points = breakdown.total();
        let id = self.store.insert(points);
        METRICS.record_receipt_scored(points);

        for contribution in breakdown.awarded() {
            debug!(
                receipt_id = %id,
                rule = %contribution.rule,
                points = contribution.points,
                detail = %contribution.description,
                "scoring rule applied"
            );
        }
        info!(receipt_id = %id, points, retailer = receipt.retailer(), "receipt processed");

        Ok(ProcessedReceipt {
            id,
            points,
            breakdown,
        })
    }

    pub fn points(&self, id: &str) -> Result<i64, ReceiptError> {
        self.store
            .lookup(id)
            .ok_or_else(|| ReceiptError::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ValidationErrorMode};
    use crate::scoring::QuarterCheck;
    use assert_matches::assert_matches;

    const CORNER_MARKET: &str = r#"{
        "retailer": "M&M Corner Market",
        "purchaseDate": "2022-03-20",
        "purchaseTime": "14:33",
        "items": [
            {"shortDescription": "Gatorade", "price": "2.25"},
            {"shortDescription": "Gatorade", "price": "2.25"},
            {"shortDescription": "Gatorade", "price": "2.25"},
            {"shortDescription": "Gatorade", "price": "2.25"}
        ],
        "total": "9.00"
    }"#;

    fn state() -> AppState {
        AppState::new(Arc::new(ServerConfig::default()))
    }

    #[test]
    fn processed_receipt_is_retrievable() {
        let state = state();
        let processed = state.process_receipt(CORNER_MARKET.as_bytes()).unwrap();

        assert_eq!(processed.points, 109);
        assert_eq!(processed.breakdown.total(), 109);
        assert_eq!(state.points(processed.id.as_str()).unwrap(), 109);
    }

    #[test]
    fn rejected_receipt_stores_nothing() {
        let state = state();
        let err = state.process_receipt(br#"{"retailer": ""}"#).unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidReceipt);
        assert!(state.store().is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let err = state().points("never-issued").unwrap_err();
        assert_matches!(err, ReceiptError::NotFound { ref id } if id == "never-issued");
    }

    #[test]
    fn configured_modes_flow_into_processing() {
        let config = ServerConfig {
            quarter_check: QuarterCheck::Cents,
            validation_errors: ValidationErrorMode::Detailed,
            ..ServerConfig::default()
        };
        let state = AppState::new(Arc::new(config));

        assert_eq!(state.engine().quarter_check(), QuarterCheck::Cents);

        let err = state.process_receipt(b"{}").unwrap_err();
        assert_eq!(
            err.client_message(),
            "The receipt is invalid: retailer must not be empty"
        );
    }
}
