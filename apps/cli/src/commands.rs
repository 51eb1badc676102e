//! CLI command definitions, routing, and tracing setup.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use serpwatch_core::{AnalysisInput, AnalysisState, Collaborators, Pipeline, ProgressReporter};
use serpwatch_llm::ChatCompletionsClient;
use serpwatch_search::TavilyClient;
use serpwatch_shared::{AppConfig, init_config, load_config};
use serpwatch_storage::{RankingSink, Storage};

use crate::server;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// serpwatch: where does my site rank, and what should I do about it?
#[derive(Parser)]
#[command(
    name = "serpwatch",
    version,
    about = "Check a domain's search ranking for a keyword and get improvement advice.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one rank check.
    Check {
        /// Search keyword.
        keyword: String,

        /// Domain to look for in the results.
        #[arg(short, long)]
        domain: String,

        /// Region hint, echoed in the result.
        #[arg(short, long)]
        region: Option<String>,

        /// Print the final state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored runs for a keyword, newest first.
    History {
        /// Search keyword.
        keyword: String,

        /// Maximum number of runs to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Serve the pipeline over HTTP.
    Serve {
        /// Address to listen on (defaults to the configured one).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file.
    Init,
    /// Print the effective configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "serpwatch=info",
        1 => "serpwatch=debug",
        _ => "serpwatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Check {
            keyword,
            domain,
            region,
            json,
        } => cmd_check(keyword, domain, region, json).await,
        Command::History { keyword, limit } => cmd_history(&keyword, limit).await,
        Command::Serve { bind } => cmd_serve(bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Wire the standard pipeline to the configured services.
async fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let search = TavilyClient::from_config(&config.search)?;
    let recommender = ChatCompletionsClient::from_config(&config.llm)?;

    let sink: Option<Arc<dyn RankingSink>> = if config.storage.enabled {
        let storage = Storage::open(Path::new(&config.storage.db_path))
            .await
            .wrap_err_with(|| format!("cannot open database '{}'", config.storage.db_path))?;
        Some(Arc::new(storage))
    } else {
        None
    };

    let collaborators = Collaborators {
        search: Arc::new(search),
        recommender: Arc::new(recommender),
        sink,
    };
    Ok(Pipeline::standard(
        collaborators,
        &config.search,
        &config.pipeline,
    )?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_check(
    keyword: String,
    domain: String,
    region: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config).await?;

    info!(keyword = %keyword, domain = %domain, "checking ranking");

    let input = AnalysisInput {
        keyword: Some(keyword),
        domain: Some(domain),
        region,
    };

    let reporter = CliProgress::new();
    let state = pipeline.run_with_progress(input, &reporter).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_summary(&state);
    }

    match state.error {
        Some(error) => Err(eyre!("rank check failed: {error}")),
        None => Ok(()),
    }
}

fn print_summary(state: &AnalysisState) {
    let position = match state.our_position {
        Some(p) if p > 0 => format!("#{p}"),
        Some(_) => "not ranked".to_string(),
        None => "unknown".to_string(),
    };

    println!();
    println!("  Keyword:  {}", state.keyword.as_deref().unwrap_or_default());
    println!("  Domain:   {}", state.domain.as_deref().unwrap_or_default());
    if let Some(region) = &state.region {
        println!("  Region:   {region}");
    }
    println!("  Position: {position}");
    if let Some(results) = &state.search_results {
        println!("  Results:  {}", results.len());
    }
    if let Some(error) = &state.error {
        println!("  Error:    {error}");
    }
    if let Some(analysis) = &state.analysis {
        println!();
        println!("{analysis}");
    }
    println!();
}

async fn cmd_history(keyword: &str, limit: u32) -> Result<()> {
    let config = load_config()?;
    if !config.storage.enabled {
        warn!("storage is disabled; reading the configured database anyway");
    }

    let storage = Storage::open_readonly(Path::new(&config.storage.db_path)).await?;
    let runs = storage.list_runs(keyword, limit).await?;

    if runs.is_empty() {
        println!("No runs recorded for \"{keyword}\".");
        return Ok(());
    }

    println!();
    for run in &runs {
        let position = if run.our_position > 0 {
            format!("#{}", run.our_position)
        } else {
            "-".to_string()
        };
        println!(
            "  {}  {:<24} {:>6}  {}",
            run.checked_at.format("%Y-%m-%d %H:%M"),
            run.domain,
            position,
            &run.results_hash[..run.results_hash.len().min(12)],
        );
    }
    println!();
    Ok(())
}

async fn cmd_serve(bind: Option<String>) -> Result<()> {
    let config = load_config()?;
    let pipeline = build_pipeline(&config).await?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("cannot bind {addr}"))?;

    info!(%addr, "serving rank checks");
    println!("Listening on http://{addr}");

    axum::serve(listener, server::build_router(Arc::new(pipeline)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        let message = match name {
            serpwatch_core::stages::SEARCH => "Searching",
            serpwatch_core::stages::ANALYZE_POSITION => "Locating domain",
            serpwatch_core::stages::GENERATE_RECOMMENDATIONS => "Asking for recommendations",
            serpwatch_core::stages::PERSIST_RESULTS => "Saving",
            other => other,
        };
        self.spinner.set_message(message.to_string());
    }

    fn done(&self, _state: &AnalysisState) {
        self.spinner.finish_and_clear();
    }
}
