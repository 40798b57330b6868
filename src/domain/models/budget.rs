//! Daily spend budget.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily budget snapshot. Spend and count reset by keying on the date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub date: NaiveDate,
    pub spent_usd: f64,
    pub limit_usd: f64,
    pub validations_today: u32,
    pub max_validations_per_day: u32,
}

impl Budget {
    pub fn remaining_usd(&self) -> f64 {
        (self.limit_usd - self.spent_usd).max(0.0)
    }

    pub fn validations_remaining(&self) -> u32 {
        self.max_validations_per_day
            .saturating_sub(self.validations_today)
    }

    /// Whether an estimated cost fits in the remaining budget and ceiling.
    pub fn has_headroom(&self, estimate_usd: f64) -> bool {
        self.spent_usd + estimate_usd <= self.limit_usd && self.validations_remaining() > 0
    }
}
