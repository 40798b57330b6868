//! Cascade detection: files modified repeatedly in a short window, and
//! fixes applied in quick succession to the same file.
//!
//! A cascade usually means the healer is fighting its own side effects, so
//! both checks escalate in preflight rather than letting another automated
//! fix land.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::models::CascadeConfig;

#[derive(Debug, Clone)]
struct RecentFix {
    file: String,
    fingerprint: String,
    applied_at: DateTime<Utc>,
    failed: bool,
}

/// Tracks per-file modification windows and a recent-fix log.
///
/// In-memory by design: the windows are short (minutes to an hour) and a
/// restart starting cold only makes the detector more permissive for one
/// window, while the circuit breaker stays persistent.
pub struct CascadeDetector {
    config: CascadeConfig,
    modifications: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    recent_fixes: Mutex<VecDeque<RecentFix>>,
}

impl CascadeDetector {
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            modifications: Mutex::new(HashMap::new()),
            recent_fixes: Mutex::new(VecDeque::new()),
        }
    }

    /// Record that `file` was modified at `at`.
    pub fn record_modification(&self, file: &str, at: DateTime<Utc>) {
        let mut map = self.modifications.lock().expect("modifications lock");
        map.entry(file.to_string()).or_default().push_back(at);
    }

    /// A file is hot once it has at least `hot_file_threshold` modifications
    /// inside the rolling window. Old entries are pruned lazily.
    pub fn is_hot(&self, file: &str) -> bool {
        self.is_hot_at(file, Utc::now())
    }

    pub fn is_hot_at(&self, file: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::seconds(self.config.modification_window_secs as i64);
        let mut map = self.modifications.lock().expect("modifications lock");
        let Some(window) = map.get_mut(file) else {
            return false;
        };
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }
        window.len() >= self.config.hot_file_threshold
    }

    /// Append to the recent-fix log. Also counts as a modification of the
    /// file, since the healer itself just touched it.
    pub fn record_fix(&self, file: &str, fingerprint: &str, at: DateTime<Utc>, failed: bool) {
        self.record_modification(file, at);
        let mut log = self.recent_fixes.lock().expect("recent_fixes lock");
        log.push_back(RecentFix {
            file: file.to_string(),
            fingerprint: fingerprint.to_string(),
            applied_at: at,
            failed,
        });
    }

    /// True when a fix already touched this exact file within the recency
    /// window: the new error may be the healer's own side effect.
    pub fn check_cascade(&self, file: &str) -> bool {
        self.check_cascade_at(file, Utc::now())
    }

    pub fn check_cascade_at(&self, file: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::seconds(self.config.recent_fix_window_secs as i64);
        let mut log = self.recent_fixes.lock().expect("recent_fixes lock");
        while log.front().is_some_and(|f| f.applied_at <= cutoff) {
            log.pop_front();
        }
        if let Some(hit) = log.iter().find(|f| f.file == file) {
            debug!(file, fingerprint = %hit.fingerprint, "recent fix inside the cascade window");
            return true;
        }
        false
    }

    /// Recent fixes that were rolled back, for diagnostics.
    pub fn recent_failures(&self) -> usize {
        let log = self.recent_fixes.lock().expect("recent_fixes lock");
        log.iter().filter(|f| f.failed).count()
    }
}

impl Default for CascadeDetector {
    fn default() -> Self {
        Self::new(CascadeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CascadeDetector {
        CascadeDetector::default()
    }

    #[test]
    fn two_modifications_are_not_hot() {
        let d = detector();
        let now = Utc::now();
        d.record_modification("src/app.py", now - Duration::seconds(100));
        d.record_modification("src/app.py", now - Duration::seconds(50));
        assert!(!d.is_hot_at("src/app.py", now));
    }

    #[test]
    fn three_modifications_in_window_are_hot() {
        let d = detector();
        let now = Utc::now();
        for secs in [300, 200, 100] {
            d.record_modification("src/app.py", now - Duration::seconds(secs));
        }
        assert!(d.is_hot_at("src/app.py", now));
    }

    #[test]
    fn modifications_outside_window_are_pruned() {
        let d = detector();
        let now = Utc::now();
        d.record_modification("src/app.py", now - Duration::seconds(7200));
        d.record_modification("src/app.py", now - Duration::seconds(7100));
        d.record_modification("src/app.py", now - Duration::seconds(50));
        assert!(!d.is_hot_at("src/app.py", now));
    }

    #[test]
    fn recent_fix_triggers_cascade_check() {
        let d = detector();
        let now = Utc::now();
        d.record_fix("src/app.py", "fp1", now - Duration::seconds(120), false);
        assert!(d.check_cascade_at("src/app.py", now));
        assert!(!d.check_cascade_at("src/other.py", now));
    }

    #[test]
    fn old_fixes_age_out_of_the_cascade_window() {
        let d = detector();
        let now = Utc::now();
        d.record_fix("src/app.py", "fp1", now - Duration::seconds(700), false);
        assert!(!d.check_cascade_at("src/app.py", now));
    }

    #[test]
    fn fixes_count_as_modifications() {
        let d = detector();
        let now = Utc::now();
        d.record_fix("src/app.py", "fp1", now - Duration::seconds(30), false);
        d.record_fix("src/app.py", "fp2", now - Duration::seconds(20), true);
        d.record_modification("src/app.py", now - Duration::seconds(10));
        assert!(d.is_hot_at("src/app.py", now));
        assert_eq!(d.recent_failures(), 1);
    }
}
