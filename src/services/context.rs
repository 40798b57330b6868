//! Context retrieval for judge prompts.
//!
//! Gathers a bounded evidence bundle around the error site: a source
//! snippet, the file's import block, sibling test files, and the candidate
//! change itself. Missing or oversized files degrade to empty sections;
//! context gathering never fails the pipeline.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::models::{ContextConfig, ErrorEvent, FixAction};

/// Evidence bundle rendered into judge prompts.
#[derive(Debug, Clone, Default)]
pub struct FixContext {
    /// Source lines around the error site.
    pub snippet: String,
    /// Import block at the top of the originating file.
    pub imports: String,
    /// Test files found next to the originating file.
    pub related_tests: Vec<String>,
}

impl FixContext {
    /// Render the bundle as prompt sections, omitting empty ones.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        if !self.snippet.is_empty() {
            sections.push(format!("Source around the error site:\n```\n{}\n```", self.snippet));
        }
        if !self.imports.is_empty() {
            sections.push(format!("Imports in the file:\n```\n{}\n```", self.imports));
        }
        if !self.related_tests.is_empty() {
            sections.push(format!("Nearby test files: {}", self.related_tests.join(", ")));
        }
        sections.join("\n\n")
    }
}

pub struct ContextRetriever {
    config: ContextConfig,
    project_root: PathBuf,
}

impl ContextRetriever {
    pub fn new(config: ContextConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
        }
    }

    pub async fn retrieve(&self, event: &ErrorEvent, _candidate: &FixAction) -> FixContext {
        let Some(rel_path) = Self::error_file(event) else {
            return FixContext::default();
        };
        let path = self.project_root.join(&rel_path);

        let contents = match self.read_bounded(&path).await {
            Some(c) => c,
            None => return FixContext::default(),
        };

        let line = Self::error_line(event);
        FixContext {
            snippet: self.snippet_around(&contents, line),
            imports: Self::import_block(&contents),
            related_tests: self.sibling_tests(&path),
        }
    }

    /// Originating file: the explicit path, or the path in the top frame.
    fn error_file(event: &ErrorEvent) -> Option<String> {
        if let Some(path) = &event.file_path {
            return Some(path.clone());
        }
        let frame = event.top_frame()?;
        frame.split(':').next().map(ToString::to_string)
    }

    /// Line number parsed out of the top frame (`path:line:symbol`).
    fn error_line(event: &ErrorEvent) -> Option<usize> {
        let frame = event.top_frame()?;
        frame.split(':').nth(1)?.parse().ok()
    }

    async fn read_bounded(&self, path: &Path) -> Option<String> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        if meta.len() > self.config.max_file_bytes {
            debug!(path = %path.display(), size = meta.len(), "skipping oversized context file");
            return None;
        }
        tokio::fs::read_to_string(path).await.ok()
    }

    fn snippet_around(&self, contents: &str, line: Option<usize>) -> String {
        let lines: Vec<&str> = contents.lines().collect();
        let radius = self.config.snippet_radius;
        let center = line.unwrap_or(1).saturating_sub(1).min(lines.len().saturating_sub(1));
        let start = center.saturating_sub(radius);
        let end = (center + radius + 1).min(lines.len());
        lines[start..end].join("\n")
    }

    /// Leading run of import lines (blank lines and comments allowed through).
    fn import_block(contents: &str) -> String {
        let mut block = Vec::new();
        for line in contents.lines().take(60) {
            let trimmed = line.trim_start();
            if trimmed.starts_with("use ")
                || trimmed.starts_with("import ")
                || trimmed.starts_with("from ")
                || trimmed.starts_with("require(")
            {
                block.push(line);
            } else if !trimmed.is_empty() && !trimmed.starts_with("//") && !trimmed.starts_with('#')
            {
                break;
            }
        }
        block.join("\n")
    }

    /// Test files in the same directory, by naming convention.
    fn sibling_tests(&self, path: &Path) -> Vec<String> {
        let Some(dir) = path.parent() else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut tests: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.contains("test") || name.contains("spec"))
            .collect();
        tests.sort();
        tests.truncate(10);
        tests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever(root: &Path) -> ContextRetriever {
        ContextRetriever::new(ContextConfig::default(), root)
    }

    #[tokio::test]
    async fn missing_file_degrades_to_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let event = ErrorEvent::new(
            "py:ImportError",
            "boom",
            Some("does_not_exist.py".to_string()),
            vec![],
            "proj",
        );
        let ctx = retriever(dir.path())
            .retrieve(&event, &FixAction::command("true", vec![]))
            .await;
        assert!(ctx.snippet.is_empty());
        assert!(ctx.render().is_empty());
    }

    #[tokio::test]
    async fn snippet_centers_on_the_frame_line() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=100).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("app.py"), body).unwrap();

        let event = ErrorEvent::new(
            "py:ValueError",
            "boom",
            Some("app.py".to_string()),
            vec!["app.py:50:run".to_string()],
            "proj",
        );
        let ctx = retriever(dir.path())
            .retrieve(&event, &FixAction::command("true", vec![]))
            .await;
        assert!(ctx.snippet.contains("line 50"));
        assert!(ctx.snippet.contains("line 30"));
        assert!(!ctx.snippet.contains("line 95"));
    }

    #[tokio::test]
    async fn import_block_and_tests_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "import os\nfrom typing import Optional\n\ndef run():\n    pass\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("test_app.py"), "def test_run(): pass\n").unwrap();

        let event = ErrorEvent::new(
            "py:ValueError",
            "boom",
            Some("app.py".to_string()),
            vec![],
            "proj",
        );
        let ctx = retriever(dir.path())
            .retrieve(&event, &FixAction::command("true", vec![]))
            .await;
        assert!(ctx.imports.contains("import os"));
        assert_eq!(ctx.related_tests, vec!["test_app.py".to_string()]);
    }
}
