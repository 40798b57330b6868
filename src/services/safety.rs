//! Safety categorization of candidate fix diffs.
//!
//! Pure function over the unified diff and the changed paths; no I/O.
//! Rules are applied first-match-wins and lean toward risk: the fallback is
//! MODERATE, never SAFE.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::models::{SafetyCategory, SafetyConfig};

static RE_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]\s*(pub\s+)?(async\s+)?(fn|def|function)\s+\w+\s*[(<]").expect("valid regex")
});
static RE_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(alter|drop|create|truncate)\s+(table|index|database)\b|\bdelete\s+from\b|\bupdate\s+\w+\s+set\b|\binsert\s+into\b",
    )
    .expect("valid regex")
});
static RE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+\s*(use\s+[\w:{}, *]+;|import\s+|from\s+[\w.]+\s+import\s+|require\s*\()")
        .expect("valid regex")
});
static RE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]\s*(//|#|/\*|\*|--)").expect("valid regex"));

/// Classifies a candidate diff as SAFE, MODERATE, or RISKY.
#[derive(Debug, Clone)]
pub struct SafetyCategorizer {
    config: SafetyConfig,
}

impl SafetyCategorizer {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    /// First match wins, risk-leaning:
    /// 1. RISKY: protected path, signature change, SQL statement, or
    ///    security-sensitive literal.
    /// 2. SAFE: empty diff, or every changed line is whitespace, an added
    ///    import, or a comment.
    /// 3. Anything else is MODERATE.
    pub fn categorize(&self, diff: &str, changed_paths: &[String]) -> SafetyCategory {
        if self.touches_protected_path(changed_paths) {
            return SafetyCategory::Risky;
        }

        let changed: Vec<&str> = diff
            .lines()
            .filter(|l| {
                (l.starts_with('+') || l.starts_with('-'))
                    && !l.starts_with("+++")
                    && !l.starts_with("---")
            })
            .collect();

        for line in &changed {
            if RE_SIGNATURE.is_match(line) || RE_SQL.is_match(line) || self.is_sensitive(line) {
                return SafetyCategory::Risky;
            }
        }

        if changed.iter().all(|l| Self::is_benign(l)) {
            return SafetyCategory::Safe;
        }

        SafetyCategory::Moderate
    }

    fn touches_protected_path(&self, changed_paths: &[String]) -> bool {
        changed_paths.iter().any(|path| {
            self.config
                .protected_paths
                .iter()
                .any(|protected| path.contains(protected.as_str()))
        })
    }

    fn is_sensitive(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        self.config
            .sensitive_keywords
            .iter()
            .any(|kw| lowered.contains(kw.as_str()))
    }

    /// Whitespace-only change, added import, or comment.
    fn is_benign(line: &str) -> bool {
        let body = &line[1..];
        body.trim().is_empty() || RE_IMPORT.is_match(line) || RE_COMMENT.is_match(line)
    }
}

impl Default for SafetyCategorizer {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn categorizer() -> SafetyCategorizer {
        SafetyCategorizer::default()
    }

    #[test]
    fn empty_diff_is_safe() {
        assert_eq!(categorizer().categorize("", &[]), SafetyCategory::Safe);
    }

    #[test]
    fn whitespace_and_comment_changes_are_safe() {
        let diff = "--- a/src/lib.rs\n+++ b/src/lib.rs\n+// explain the invariant\n+\n-   \n";
        assert_eq!(
            categorizer().categorize(diff, &["src/lib.rs".into()]),
            SafetyCategory::Safe
        );
    }

    #[test]
    fn added_import_is_safe() {
        let diff = "+use std::collections::HashMap;\n+import os\n+from typing import Optional\n";
        assert_eq!(
            categorizer().categorize(diff, &["src/lib.rs".into()]),
            SafetyCategory::Safe
        );
    }

    #[test]
    fn protected_path_is_risky_regardless_of_content() {
        let diff = "+# just a comment\n";
        assert_eq!(
            categorizer().categorize(diff, &["db/migrations/0001_init.sql".into()]),
            SafetyCategory::Risky
        );
    }

    #[test]
    fn signature_change_is_risky() {
        let diff = "-fn parse(input: &str) -> Output {\n+fn parse(input: &str, strict: bool) -> Output {\n";
        assert_eq!(
            categorizer().categorize(diff, &["src/parse.rs".into()]),
            SafetyCategory::Risky
        );
    }

    #[test]
    fn sql_statement_is_risky() {
        let diff = "+    conn.execute(\"DELETE FROM users WHERE id = ?\")\n";
        assert_eq!(
            categorizer().categorize(diff, &["src/db.rs".into()]),
            SafetyCategory::Risky
        );
    }

    #[test]
    fn sensitive_literal_is_risky() {
        let diff = "+    let api_key = load();\n";
        assert_eq!(
            categorizer().categorize(diff, &["src/client.rs".into()]),
            SafetyCategory::Risky
        );
    }

    #[test]
    fn logic_change_is_moderate() {
        let diff = "+    if retries > 3 {\n+        return Err(e);\n+    }\n";
        assert_eq!(
            categorizer().categorize(diff, &["src/retry.rs".into()]),
            SafetyCategory::Moderate
        );
    }

    #[test]
    fn removed_code_line_is_not_safe() {
        let diff = "-    let total = items.len();\n";
        assert_eq!(
            categorizer().categorize(diff, &["src/sum.rs".into()]),
            SafetyCategory::Moderate
        );
    }

    proptest! {
        /// Protected paths dominate every other rule.
        #[test]
        fn protected_path_always_risky(body in "[ -~]{0,120}") {
            let diff = format!("+{body}\n");
            let cat = categorizer().categorize(&diff, &[".env".to_string()]);
            prop_assert_eq!(cat, SafetyCategory::Risky);
        }

        /// Comment-only diffs on ordinary paths never exceed SAFE.
        /// Digits only, so no sensitive keyword can appear by chance.
        #[test]
        fn comment_only_diffs_are_safe(body in "[0-9 ]{0,60}") {
            let diff = format!("+// {body}\n");
            let cat = categorizer().categorize(&diff, &["src/lib.rs".to_string()]);
            prop_assert_eq!(cat, SafetyCategory::Safe);
        }
    }
}
