//! Class diagrams for ranked repositories.
//!
//! The language model sketches a likely architecture in DOT notation and
//! Graphviz renders it to PNG.

use crate::agent::llm::{LanguageModel, LlmError};
use crate::models::EnrichedRepository;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("diagram model failed: {0}")]
    Model(#[from] LlmError),

    #[error("diagram model returned no DOT code")]
    Empty,

    #[error("failed to write DOT file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("graphviz exited with {status}: {stderr}")]
    Render { status: String, stderr: String },
}

/// Produces a rendered diagram for one repository.
#[async_trait]
pub trait DiagramAuthor: Send + Sync {
    async fn diagram(&self, repo: &EnrichedRepository) -> Result<PathBuf, DiagramError>;
}

/// Normalize model output into something Graphviz accepts.
pub fn clean_dot(raw: &str) -> String {
    let mut dot = raw.trim().to_string();

    if dot.starts_with("```") {
        let lines: Vec<&str> = dot.lines().collect();
        if lines.len() > 2 {
            dot = lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }

    let dot: String = dot
        .chars()
        .map(|c| match c {
            '`' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();

    if dot.starts_with("digraph") || dot.starts_with("graph") {
        dot
    } else {
        format!("digraph ClassDiagram {{\n{}\n}}", dot)
    }
}

/// LLM-authored DOT rendered with the Graphviz `dot` executable.
pub struct GraphvizDiagrams {
    llm: Arc<dyn LanguageModel>,
    dot_binary: String,
}

impl GraphvizDiagrams {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            dot_binary: "dot".to_string(),
        }
    }

    /// Use a different Graphviz executable.
    #[allow(dead_code)] // Alternative renderers (e.g. a full path to `dot`)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.dot_binary = binary.into();
        self
    }

    async fn author_dot(&self, repo: &EnrichedRepository) -> Result<String, DiagramError> {
        let candidate = &repo.candidate;
        let user = format!(
            "Repository: {}\nDescription: {}\nLanguage: {}\n\n\
             Create a class diagram in DOT notation for this repository's likely architecture.",
            candidate.full_name,
            candidate.description.as_deref().unwrap_or("No description"),
            candidate.language.as_deref().unwrap_or("Unknown"),
        );

        let content = self.llm.complete(DIAGRAM_SYSTEM_PROMPT, &user).await?;
        if content.trim().is_empty() {
            return Err(DiagramError::Empty);
        }
        Ok(clean_dot(&content))
    }

    async fn render(&self, dot_file: &Path) -> Result<PathBuf, DiagramError> {
        let png = dot_file.with_extension("png");

        let output = Command::new(&self.dot_binary)
            .arg("-Tpng")
            .arg(dot_file)
            .arg("-o")
            .arg(&png)
            .output()
            .await
            .map_err(|source| DiagramError::Spawn {
                binary: self.dot_binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DiagramError::Render {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(png)
    }
}

#[async_trait]
impl DiagramAuthor for GraphvizDiagrams {
    async fn diagram(&self, repo: &EnrichedRepository) -> Result<PathBuf, DiagramError> {
        let dot = self.author_dot(repo).await?;
        debug!("DOT for {}:\n{}", repo.full_name(), dot);

        let mut file = tempfile::Builder::new()
            .prefix("repofinder-")
            .suffix(".dot")
            .tempfile()?;
        file.write_all(dot.as_bytes())?;
        let (_, dot_path) = file.keep().map_err(|e| DiagramError::Io(e.error))?;

        let result = self.render(&dot_path).await;

        if let Err(e) = tokio::fs::remove_file(&dot_path).await {
            warn!("Failed to remove {}: {}", dot_path.display(), e);
        }

        let png = result?;
        info!("Rendered diagram for {} to {}", repo.full_name(), png.display());
        Ok(png)
    }
}

const DIAGRAM_SYSTEM_PROMPT: &str = r#"You are a software architect. Create a class diagram in valid DOT notation.

Rules:
- Use only valid DOT syntax
- Use double quotes for labels, never backticks
- Keep class names simple (no special characters)
- Focus on main classes and relationships
- Use -> for relationships

Example:
digraph ClassDiagram {
    rankdir=TB;
    node [shape=record];
    ClassA [label="ClassA|+method1()|+method2()"];
    ClassB [label="ClassB|+method3()"];
    ClassA -> ClassB;
}

Return ONLY DOT code, no explanations or markdown."#;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fake::ScriptedModel;
    use crate::models::{Candidate, Metric, RepositoryDetails};
    use chrono::Utc;
    use serde_json::json;

    fn repo() -> EnrichedRepository {
        EnrichedRepository {
            candidate: Candidate::from_search_item(json!({
                "id": 7,
                "name": "axum",
                "full_name": "tokio-rs/axum",
                "owner": {"login": "tokio-rs"},
                "language": "Rust",
            }))
            .unwrap(),
            details: RepositoryDetails {
                url: "https://github.com/tokio-rs/axum".to_string(),
                forks: 0,
                watchers: 0,
                size: 0,
                default_branch: None,
                license: None,
                topics: Vec::new(),
                archived: false,
            },
            updated_at: Utc::now(),
            days_since_update: 0,
            contributors: Metric::Unavailable,
            pull_requests: Metric::Unavailable,
            issues: Metric::Unavailable,
            releases: Metric::Unavailable,
            commit_activity: Metric::Unavailable,
            score: None,
        }
    }

    #[test]
    fn test_clean_dot_keeps_complete_graph() {
        let dot = "digraph G {\n  A -> B;\n}";
        assert_eq!(clean_dot(dot), dot);
        assert_eq!(clean_dot("  graph G { A -- B }  "), "graph G { A -- B }");
    }

    #[test]
    fn test_clean_dot_strips_fences() {
        let raw = "```dot\ndigraph G {\n  A -> B;\n}\n```";
        assert_eq!(clean_dot(raw), "digraph G {\n  A -> B;\n}");
    }

    #[test]
    fn test_clean_dot_replaces_quotes() {
        let cleaned = clean_dot("digraph G { A [label=`A`]; B [label=\u{2018}B\u{2019}]; }");
        assert_eq!(cleaned, "digraph G { A [label=\"A\"]; B [label=\"B\"]; }");
    }

    #[test]
    fn test_clean_dot_wraps_bare_statements() {
        assert_eq!(
            clean_dot("A -> B;"),
            "digraph ClassDiagram {\nA -> B;\n}"
        );
    }

    #[tokio::test]
    async fn test_diagram_model_failure() {
        let diagrams = GraphvizDiagrams::new(Arc::new(ScriptedModel::new().fail(500)));
        let err = diagrams.diagram(&repo()).await.unwrap_err();
        assert!(matches!(err, DiagramError::Model(_)));
    }

    #[tokio::test]
    async fn test_diagram_empty_model_output() {
        let diagrams = GraphvizDiagrams::new(Arc::new(ScriptedModel::new().reply("   ")));
        let err = diagrams.diagram(&repo()).await.unwrap_err();
        assert!(matches!(err, DiagramError::Empty));
    }

    #[tokio::test]
    async fn test_diagram_missing_renderer() {
        let model = Arc::new(ScriptedModel::new().reply("digraph G { A -> B; }"));
        let diagrams = GraphvizDiagrams::new(model.clone())
            .with_binary("repofinder-no-such-graphviz-binary");

        let err = diagrams.diagram(&repo()).await.unwrap_err();
        assert!(matches!(err, DiagramError::Spawn { .. }));
        assert!(model.prompts()[0].1.contains("tokio-rs/axum"));
    }
}
