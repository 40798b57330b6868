//! Error events observed by the workflow hooks.
//!
//! Events are immutable and produced by external detectors. The fingerprint
//! is the Tier-1 lookup key: a deterministic hash over the error type, the
//! normalized message, and the top stack frame.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(/[\w./-]+)+\.\w+").expect("valid regex"));
static RE_LINE_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\d+(:\d+)?").expect("valid regex"));
static RE_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-f]{8,}\b").expect("valid regex"));
static RE_NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2,}\b").expect("valid regex"));
static RE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]{20,}""#).expect("valid regex"));

/// A single observed failure: runtime error, build break, or test failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Deterministic hash of error type + normalized message + top frame.
    pub fingerprint: String,
    /// Coarse kind, e.g. `py:ModuleNotFoundError` or `rust:E0308`.
    pub error_type: String,
    /// Raw error message as captured.
    pub message: String,
    /// File the error originated in, when known.
    pub file_path: Option<String>,
    /// Stack frames, outermost first, formatted `path:line:symbol`.
    pub stack_frames: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub project_id: String,
}

impl ErrorEvent {
    /// Build an event, computing its fingerprint from the identifying parts.
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        file_path: Option<String>,
        stack_frames: Vec<String>,
        project_id: impl Into<String>,
    ) -> Self {
        let error_type = error_type.into();
        let message = message.into();
        let fingerprint =
            compute_fingerprint(&error_type, &message, stack_frames.first().map(String::as_str));
        Self {
            fingerprint,
            error_type,
            message,
            file_path,
            stack_frames,
            timestamp: Utc::now(),
            project_id: project_id.into(),
        }
    }

    /// Text used for Tier-2 semantic embedding.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.error_type, normalize_message(&self.message))
    }

    /// Top stack frame, when any was captured.
    pub fn top_frame(&self) -> Option<&str> {
        self.stack_frames.first().map(String::as_str)
    }
}

/// Strip dynamic content (paths, line numbers, ids, long literals) so that
/// repeated occurrences of the same error collapse to one template.
pub fn normalize_message(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let s = RE_PATH.replace_all(&lowered, "<path>");
    let s = RE_LINE_COL.replace_all(&s, ":<n>");
    let s = RE_HEX.replace_all(&s, "<id>");
    let s = RE_NUMBERS.replace_all(&s, "<n>");
    let s = RE_QUOTED.replace_all(&s, "<str>");
    s.trim().to_string()
}

/// Deterministic 16-hex-digit fingerprint over the identifying parts.
pub fn compute_fingerprint(error_type: &str, message: &str, top_frame: Option<&str>) -> String {
    let mut hasher = DefaultHasher::new();
    error_type.hash(&mut hasher);
    normalize_message(message).hash(&mut hasher);
    if let Some(frame) = top_frame {
        normalize_message(frame).hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_dynamic_content() {
        let a = normalize_message("ModuleNotFoundError in /home/ci/app/foo.py:120:7 (run 48213)");
        let b = normalize_message("ModuleNotFoundError in /var/build/app/foo.py:98:1 (run 99021)");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = compute_fingerprint("py:ImportError", "No module named 'foo'", Some("app/main.py:10:main"));
        let b = compute_fingerprint("py:ImportError", "No module named 'foo'", Some("app/main.py:10:main"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn fingerprint_varies_with_error_type() {
        let a = compute_fingerprint("py:ImportError", "boom", None);
        let b = compute_fingerprint("py:TypeError", "boom", None);
        assert_ne!(a, b);
    }

    #[test]
    fn events_sharing_identity_share_fingerprints() {
        let a = ErrorEvent::new(
            "py:ModuleNotFoundError",
            "No module named 'requests' at /ci/a/job.py:10",
            None,
            vec!["app/job.py:10:run".to_string()],
            "proj",
        );
        let b = ErrorEvent::new(
            "py:ModuleNotFoundError",
            "No module named 'requests' at /ci/b/job.py:44",
            None,
            vec!["app/job.py:44:run".to_string()],
            "proj",
        );
        assert_eq!(a.fingerprint, b.fingerprint);
    }
}
