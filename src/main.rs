//! repofinder - find, enrich, and rank GitHub repositories
//!
//! A CLI tool that turns a plain-language need into GitHub searches,
//! enriches every candidate with activity metrics, and ranks them with a
//! composite score. A local Ollama model interprets the query and
//! explains the results.
//!
//! Exit codes:
//!   0 - Completed (including degraded results such as no matches)
//!   1 - Runtime or configuration error

mod agent;
mod analysis;
mod cli;
mod config;
mod diagram;
mod error;
mod github;
mod models;
mod report;

use agent::{
    LanguageModel, LlmConfig, OllamaClient, PipelineRequest, PipelineResponse, RepositoryPipeline,
};
use analysis::{Enricher, EnrichmentSettings, SearchSettings};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use diagram::{DiagramAuthor, GraphvizDiagrams};
use github::{GitHubClient, GitHubClientConfig, MetricsSource};
use models::RankedList;
use report::{Report, ReportMetadata};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("repofinder v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("repofinder failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .repofinder.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, GitHub access, and batch pacing.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

/// Wire the GitHub client, the language model, and the diagram renderer
/// into a pipeline.
fn build_pipeline(config: &Config) -> Result<RepositoryPipeline> {
    if config.github.token.is_none() {
        warn!("No GitHub token configured; unauthenticated requests are heavily rate limited");
    }

    let source: Arc<dyn MetricsSource> = Arc::new(
        GitHubClient::new(GitHubClientConfig {
            api_url: config.github.api_url.clone(),
            token: config.github.token.clone(),
            timeout_seconds: config.github.timeout_seconds,
            user_agent: config.github.user_agent.clone(),
            stats_retry_delay: Duration::from_millis(config.enrichment.stats_retry_delay_ms),
        })
        .context("Failed to create GitHub client")?,
    );

    let llm: Arc<dyn LanguageModel> = Arc::new(
        OllamaClient::new(LlmConfig {
            ollama_url: config.model.ollama_url.clone(),
            model_name: config.model.name.clone(),
            temperature: config.model.temperature,
            timeout_seconds: config.model.timeout_seconds,
        })
        .context("Failed to create Ollama client")?,
    );

    let diagrams: Arc<dyn DiagramAuthor> = Arc::new(GraphvizDiagrams::new(Arc::clone(&llm)));

    let enricher = Enricher::new(
        Arc::clone(&source),
        EnrichmentSettings {
            batch_size: config.enrichment.batch_size,
            batch_delay: Duration::from_millis(config.enrichment.batch_delay_ms),
        },
    )
    .with_progress(config.enrichment.show_progress);

    let search = SearchSettings {
        per_page: config.search.per_page,
        max_candidates: config.search.max_candidates,
    };

    Ok(RepositoryPipeline::new(source, llm, diagrams, enricher, search))
}

/// Run a single query or an interactive session.
async fn run(args: Args, config: Config) -> Result<()> {
    println!("🤖 Model: {} at {}", config.model.name, config.model.ollama_url);

    let pipeline = build_pipeline(&config)?;
    let session_id = format!("session-{}", Utc::now().format("%Y%m%d%H%M%S"));

    let previous = match args.previous {
        Some(ref path) => Some(load_ranked(path)?),
        None => None,
    };

    let ranked = if args.interactive {
        run_interactive(&pipeline, &config, &session_id, previous).await?
    } else {
        run_once(&pipeline, &args, &config, &session_id, previous).await?
    };

    if let Some(ref path) = args.save_ranked {
        save_ranked(path, &ranked)?;
        println!("💾 Ranking saved to: {}", path.display());
    }

    Ok(())
}

/// Answer one query and write the report.
async fn run_once(
    pipeline: &RepositoryPipeline,
    args: &Args,
    config: &Config,
    session_id: &str,
    previous: Option<RankedList>,
) -> Result<RankedList> {
    let query = args.query_text();
    println!("🔍 Searching for: {}\n", query);

    let start = Instant::now();
    let response = pipeline
        .handle(PipelineRequest {
            query: query.clone(),
            session_id: session_id.to_string(),
            previous,
        })
        .await;

    if let Some(ref e) = response.error {
        info!("Completed with a recovered error: {}", e);
    }

    let metadata = ReportMetadata {
        query,
        generated_at: Utc::now(),
        model_used: config.model.name.clone(),
        repositories_ranked: response.repositories.len(),
        duration_seconds: start.elapsed().as_secs_f64(),
    };
    let report = Report::from_response(metadata, &response, config.general.top_n);

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("{}\n", response.narrative.trim());
            println!("✅ Report saved to: {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(response.repositories)
}

/// Read queries from stdin until EOF or `exit`, carrying the ranking
/// from one turn into the next.
async fn run_interactive(
    pipeline: &RepositoryPipeline,
    config: &Config,
    session_id: &str,
    mut ranked: Option<RankedList>,
) -> Result<RankedList> {
    println!("💬 Interactive mode. Describe what you need, or ask for a diagram of a result.");
    println!("   Type 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        let response = pipeline
            .handle(PipelineRequest {
                query: query.to_string(),
                session_id: session_id.to_string(),
                previous: ranked.clone(),
            })
            .await;

        print_turn(&response, config.general.top_n);

        if !response.repositories.is_empty() {
            ranked = Some(response.repositories);
        }
    }

    Ok(ranked.unwrap_or_default())
}

fn print_turn(response: &PipelineResponse, top_n: usize) {
    println!("\n{}\n", response.narrative.trim());

    if let Some(ref diagram) = response.diagram {
        println!("🖼️  Diagram: {}\n", diagram.display());
    }

    if response.diagram.is_none() && response.error.is_none() {
        for (i, repo) in response.repositories.top(top_n).iter().enumerate() {
            println!(
                "   {}. {} ({} stars, score {:.0}) {}",
                i + 1,
                repo.full_name(),
                repo.candidate.stars,
                repo.score.unwrap_or(0.0),
                repo.details.url
            );
        }
        println!();
    }
}

fn load_ranked(path: &Path) -> Result<RankedList> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ranking from {}", path.display()))?;
    let ranked: RankedList = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse ranking from {}", path.display()))?;
    info!("Loaded {} ranked repositories from {}", ranked.len(), path.display());
    Ok(ranked)
}

fn save_ranked(path: &Path, ranked: &RankedList) -> Result<()> {
    let content = serde_json::to_string_pretty(ranked).context("Failed to serialize ranking")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write ranking to {}", path.display()))
}
