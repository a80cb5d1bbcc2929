use super::QuarterCheck;
use crate::model::{ValidatedItem, ValidatedReceipt};
use chrono::{Datelike, Timelike};
use serde::Serialize;
use strum::{Display, EnumIter};

const ROUND_TOTAL_POINTS: i64 = 50;
const QUARTER_TOTAL_POINTS: i64 = 25;
const POINTS_PER_ITEM_PAIR: i64 = 5;
const ODD_DAY_POINTS: i64 = 6;
const AFTERNOON_POINTS: i64 = 10;
const DESCRIPTION_PRICE_MULTIPLIER: f64 = 0.2;

/// One line of the points table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoringRule {
    /// One point per ASCII letter or digit in the retailer name
    RetailerName,
    /// Total has no fractional part
    RoundTotal,
    /// Total is a multiple of 0.25
    QuarterTotal,
    /// Five points for every two items
    ItemPairs,
    /// Price-based bonus for items whose trimmed description length is a multiple of 3
    ItemDescriptions,
    /// Day of the purchase date is odd
    OddPurchaseDay,
    /// Purchased between 14:00 and 16:00
    AfternoonPurchase,
}

/// Points a single rule awarded for one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleContribution {
    pub rule: ScoringRule,
    pub points: i64,
    pub description: String,
}

impl ScoringRule {
    pub fn evaluate(self, receipt: &ValidatedReceipt, quarter_check: QuarterCheck) -> RuleContribution {
        let (points, description) = match self {
            ScoringRule::RetailerName => {
                let count = alphanumeric_count(receipt.retailer());
                (count, format!("{count} alphanumeric characters"))
            }
            ScoringRule::RoundTotal => {
                if is_round_amount(receipt.total()) {
                    (ROUND_TOTAL_POINTS, format!("total {} is a whole amount", receipt.total()))
                } else {
                    (0, format!("total {} has a fractional part", receipt.total()))
                }
            }
            ScoringRule::QuarterTotal => {
                if quarter_check.is_quarter_multiple(receipt.total()) {
                    (
                        QUARTER_TOTAL_POINTS,
                        format!("total {} is a multiple of 0.25 ({quarter_check})", receipt.total()),
                    )
                } else {
                    (0, format!("total {} is not a multiple of 0.25 ({quarter_check})", receipt.total()))
                }
            }
            ScoringRule::ItemPairs => {
                let pairs = (receipt.items().len() / 2) as i64;
                (pairs.saturating_mul(POINTS_PER_ITEM_PAIR), format!("{pairs} item pairs"))
            }
            ScoringRule::ItemDescriptions => {
                let mut matched = 0usize;
                let points = receipt
                    .items()
                    .iter()
                    .filter_map(description_bonus)
                    .inspect(|_| matched += 1)
                    .fold(0i64, i64::saturating_add);
                (points, format!("{matched} items with description length divisible by 3"))
            }
            ScoringRule::OddPurchaseDay => {
                let day = receipt.purchase_date().day();
                if day % 2 == 1 {
                    (ODD_DAY_POINTS, format!("day {day} is odd"))
                } else {
                    (0, format!("day {day} is even"))
                }
            }
            ScoringRule::AfternoonPurchase => {
                let time = receipt.purchase_time();
                if is_afternoon_window(time.hour()) {
                    (AFTERNOON_POINTS, format!("purchased at {}", time.format("%H:%M")))
                } else {
                    (0, format!("purchased at {} outside 14:00-16:00", time.format("%H:%M")))
                }
            }
        };

        RuleContribution {
            rule: self,
            points,
            description,
        }
    }
}

pub fn alphanumeric_count(retailer: &str) -> i64 {
    retailer.chars().filter(char::is_ascii_alphanumeric).count() as i64
}

pub fn is_round_amount(amount: f64) -> bool {
    amount == amount.trunc()
}

/// `None` when the item's trimmed description length is not a multiple of 3.
pub fn description_bonus(item: &ValidatedItem) -> Option<i64> {
    let length = item.short_description().trim().len();
    if length % 3 == 0 {
        Some((item.price() * DESCRIPTION_PRICE_MULTIPLIER).ceil() as i64)
    } else {
        None
    }
}

fn is_afternoon_window(hour: u32) -> bool {
    hour == 14 || hour == 15
}
