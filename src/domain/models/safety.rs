//! Safety categories for candidate fixes.

use serde::{Deserialize, Serialize};

/// Risk tier assigned to a candidate fix's diff.
///
/// Scrutiny scales with risk: the category drives judge count, cost
/// estimation, and whether a fix may ever be auto-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    /// Whitespace, comments, added imports. Eligible for direct merge locally.
    Safe,
    /// Logic changes: error handling, conditionals, loop bodies.
    Moderate,
    /// Protected paths, signature changes, SQL, security-sensitive literals.
    /// Never auto-applied; always escalated to a human.
    Risky,
}

impl Default for SafetyCategory {
    fn default() -> Self {
        Self::Moderate
    }
}

impl SafetyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Moderate => "moderate",
            Self::Risky => "risky",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "safe" => Some(Self::Safe),
            "moderate" => Some(Self::Moderate),
            "risky" => Some(Self::Risky),
            _ => None,
        }
    }

    /// Number of judges solicited for this tier.
    pub fn judge_count(&self) -> usize {
        match self {
            Self::Safe => 1,
            Self::Moderate => 2,
            Self::Risky => 3,
        }
    }

    /// Whether this tier may ever be auto-applied without a human.
    pub fn auto_apply_eligible(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_count_scales_with_risk() {
        assert_eq!(SafetyCategory::Safe.judge_count(), 1);
        assert_eq!(SafetyCategory::Moderate.judge_count(), 2);
        assert_eq!(SafetyCategory::Risky.judge_count(), 3);
    }

    #[test]
    fn risky_is_never_auto_apply_eligible() {
        assert!(!SafetyCategory::Risky.auto_apply_eligible());
        assert!(!SafetyCategory::Moderate.auto_apply_eligible());
        assert!(SafetyCategory::Safe.auto_apply_eligible());
    }

    #[test]
    fn round_trips_through_str() {
        for cat in [SafetyCategory::Safe, SafetyCategory::Moderate, SafetyCategory::Risky] {
            assert_eq!(SafetyCategory::from_str(cat.as_str()), Some(cat));
        }
        assert_eq!(SafetyCategory::from_str("bogus"), None);
    }
}
