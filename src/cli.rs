//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// repofinder - find, enrich, and rank GitHub repositories
///
/// Describe what you need in plain words. repofinder turns it into GitHub
/// searches, gathers contributor, pull request, issue, release, and commit
/// metrics for every candidate, and ranks them with a composite score.
///
/// Examples:
///   repofinder python web framework for REST APIs
///   repofinder "rust terminal ui library" --format json --output picks.json
///   repofinder --interactive
///   repofinder "draw the second one" --previous ranked.json
///   repofinder --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// What you are looking for, in plain words
    #[arg(value_name = "QUERY", required_unless_present_any = ["init_config", "interactive"])]
    pub query: Vec<String>,

    /// Read queries line by line, carrying the ranking between turns
    #[arg(short, long)]
    pub interactive: bool,

    /// Ranked list saved by an earlier run, for diagram follow-ups
    #[arg(long, value_name = "FILE")]
    pub previous: Option<PathBuf>,

    /// Save the ranked list as JSON for a later --previous
    #[arg(long, value_name = "FILE")]
    pub save_ranked: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Ollama model used for interpretation, narratives, and diagrams
    #[arg(short, long, env = "REPOFINDER_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// GitHub token for a higher API rate limit
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Candidates enriched concurrently
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Pause between enrichment batches, in milliseconds
    #[arg(long, value_name = "MS")]
    pub batch_delay_ms: Option<u64>,

    /// Candidates kept after merging all searches
    #[arg(long, value_name = "COUNT")]
    pub max_candidates: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .repofinder.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .repofinder.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The positional words joined into one query.
    pub fn query_text(&self) -> String {
        self.query.join(" ").trim().to_string()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if !self.interactive && self.query_text().is_empty() {
            return Err("A query is required unless --interactive is set".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }

        if self.max_candidates == Some(0) {
            return Err("Max candidates must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref previous) = self.previous {
            if !previous.is_file() {
                return Err(format!(
                    "Previous ranking file does not exist: {}",
                    previous.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            query: vec!["rust".to_string(), "orm".to_string()],
            interactive: false,
            previous: None,
            save_ranked: None,
            output: None,
            format: None,
            model: None,
            ollama_url: None,
            github_token: None,
            batch_size: None,
            batch_delay_ms: None,
            max_candidates: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_query_text() {
        let args = make_args();
        assert_eq!(args.query_text(), "rust orm");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_query() {
        let mut args = make_args();
        args.query = vec!["  ".to_string()];
        assert!(args.validate().is_err());

        args.interactive = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_values() {
        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.batch_size = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.previous = Some(PathBuf::from("/nonexistent/ranked.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "repofinder",
            "--interactive",
            "--format",
            "json",
            "--batch-delay-ms",
            "250",
        ]);
        assert!(args.interactive);
        assert!(args.query.is_empty());
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.batch_delay_ms, Some(250));
    }
}
