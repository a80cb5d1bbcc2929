//! Points calculation for validated receipts.
//!
//! Every rule in [`ScoringRule`] is evaluated independently and the results
//! are summed. Scoring is a pure function of the receipt and the configured
//! [`QuarterCheck`]; it never fails.

pub mod rules;

pub use rules::{RuleContribution, ScoringRule};

use crate::model::ValidatedReceipt;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// How the "total is a multiple of 0.25" rule compares amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuarterCheck {
    /// Floating remainder `total % 0.25 == 0.0`, bit-for-bit compatible with
    /// existing clients of the service.
    #[default]
    Float,
    /// Round the total to whole cents, then test `cents % 25 == 0`.
    Cents,
}

impl QuarterCheck {
    pub fn is_quarter_multiple(self, total: f64) -> bool {
        match self {
            QuarterCheck::Float => total % 0.25 == 0.0,
            QuarterCheck::Cents => ((total * 100.0).round() as i64) % 25 == 0,
        }
    }
}

impl std::fmt::Display for QuarterCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuarterCheck::Float => write!(f, "float"),
            QuarterCheck::Cents => write!(f, "cents"),
        }
    }
}

/// Per-rule view of a score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub contributions: Vec<RuleContribution>,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.contributions
            .iter()
            .map(|c| c.points)
            .fold(0, i64::saturating_add)
    }

    /// Contributions that awarded at least one point.
    pub fn awarded(&self) -> impl Iterator<Item = &RuleContribution> {
        self.contributions.iter().filter(|c| c.points != 0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    quarter_check: QuarterCheck,
}

impl ScoringEngine {
    pub fn new(quarter_check: QuarterCheck) -> Self {
        Self { quarter_check }
    }

    pub fn quarter_check(&self) -> QuarterCheck {
        self.quarter_check
    }

    pub fn score(&self, receipt: &ValidatedReceipt) -> i64 {
        self.breakdown(receipt).total()
    }

    pub fn breakdown(&self, receipt: &ValidatedReceipt) -> ScoreBreakdown {
        let contributions = ScoringRule::iter()
            .map(|rule| rule.evaluate(receipt, self.quarter_check))
            .collect();
        ScoreBreakdown { contributions }
    }
}

/// Scores a receipt with the default [`QuarterCheck::Float`] comparison.
pub fn compute_score(receipt: &ValidatedReceipt) -> i64 {
    ScoringEngine::default().score(receipt)
}

pub fn score_breakdown(receipt: &ValidatedReceipt) -> ScoreBreakdown {
    ScoringEngine::default().breakdown(receipt)
}
