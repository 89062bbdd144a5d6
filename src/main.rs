//! CLI entry point for hadith search.
//!
//! Provides commands for building the index, running one-off queries and
//! serving queries over HTTP.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use hadith_search::config::CONFIG_DIR;
use hadith_search::corpus::CorpusLoader;
use hadith_search::io::{ExitCode, JsonResponse, OutputFormat, ResponseMeta, render_hits};
use hadith_search::search::load_or_build_index;
use hadith_search::vector::{EmbeddingGenerator, FastEmbedGenerator, FlatIndex, VectorIndex};
use hadith_search::{QueryService, SearchError, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "hadith-search",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search over the hadith corpus",
    long_about = "Embed the hadith corpus, build a nearest-neighbor index and answer free-text queries.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .hadith directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build and persist the index
    #[command(about = "Embed the corpus and persist the vector index")]
    Index {
        /// Rebuild even if a current index exists
        #[arg(short, long)]
        force: bool,
    },

    /// Run a single query
    #[command(
        about = "Find the hadith closest to a query",
        after_help = "Examples:\n  hadith-search search \"five daily prayers\"\n  hadith-search search \"charity\" --limit 10 --json"
    )]
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Serve queries over HTTP
    #[command(about = "Start the HTTP search server")]
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .hadith/settings.toml")]
    Config,
}

/// Entry point.
///
/// Loads configuration, installs logging and dispatches the command. The
/// process exit code reflects the outcome, see [`ExitCode`].
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(ExitCode::ConfigError.into());
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        })
    };
    settings.debug |= cli.debug;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if settings.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let result = match cli.command {
        Commands::Init { force } => init(force),
        Commands::Config => show_config(&settings),
        Commands::Index { force } => index(settings, force).await,
        Commands::Search { query, limit, json } => {
            search(settings, &query, limit, OutputFormat::from_json_flag(json)).await
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            serve(settings).await
        }
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => report_error(&e),
    };
    if !exit_code.is_success() {
        std::process::exit(exit_code.into());
    }
}

fn init(force: bool) -> anyhow::Result<ExitCode> {
    let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");
    if config_path.exists() && !force {
        eprintln!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        eprintln!("Use --force to overwrite");
        return Ok(ExitCode::ConfigError);
    }

    let path = Settings::init_config_file(force).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(ExitCode::Success)
}

fn show_config(settings: &Settings) -> anyhow::Result<ExitCode> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(settings)?);
    Ok(ExitCode::Success)
}

async fn index(settings: Settings, force: bool) -> anyhow::Result<ExitCode> {
    let started = Instant::now();
    let index = tokio::task::spawn_blocking(move || -> anyhow::Result<FlatIndex> {
        let embedder = load_embedder(&settings)?;
        let (corpus, stats) = CorpusLoader::from_config(&settings.corpus)
            .and_then(|loader| loader.load_with_stats())
            .map_err(SearchError::from)?;
        eprintln!(
            "Loaded {} records from {} files ({} rows skipped)",
            corpus.len(),
            stats.files,
            stats.skipped_rows
        );
        let index = load_or_build_index(&settings, &corpus, embedder.as_ref(), force)?;
        eprintln!("Index: {}", settings.index.path.display());
        Ok(index)
    })
    .await??;

    println!(
        "Indexed {} vectors (dimension {}) in {:.2}s",
        index.len(),
        index.dimension().map_or(0, |d| d.get()),
        started.elapsed().as_secs_f64()
    );
    Ok(ExitCode::Success)
}

async fn search(
    settings: Settings,
    query: &str,
    limit: Option<usize>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let timeout = settings.search.timeout();
    let service = start_service(settings).await?;

    let started = Instant::now();
    let result = service.search_with_timeout(query, limit, timeout).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    service.shutdown();

    match (result, format) {
        (Ok(hits), OutputFormat::Json) => {
            let code = ExitCode::from_hits(&hits);
            let response = JsonResponse::success(hits).with_meta(ResponseMeta::now(elapsed_ms));
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(code)
        }
        (Ok(hits), OutputFormat::Text) => {
            print!("{}", render_hits(&hits));
            Ok(ExitCode::from_hits(&hits))
        }
        (Err(e), OutputFormat::Json) => {
            let response = JsonResponse::from_error(&e);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::from_error(&e))
        }
        (Err(e), OutputFormat::Text) => Err(e.into()),
    }
}

async fn serve(settings: Settings) -> anyhow::Result<ExitCode> {
    let bind = settings.server.bind.clone();
    let service = Arc::new(start_service(settings).await?);
    hadith_search::server::serve_http(Arc::clone(&service), bind).await?;

    if let Some(service) = Arc::into_inner(service) {
        service.shutdown();
    }
    Ok(ExitCode::Success)
}

/// Loads the model and brings the query service up off the async runtime.
async fn start_service(settings: Settings) -> anyhow::Result<QueryService> {
    let service = tokio::task::spawn_blocking(move || -> anyhow::Result<QueryService> {
        let embedder = load_embedder(&settings)?;
        Ok(QueryService::initialize(&settings, embedder)?)
    })
    .await??;
    Ok(service)
}

fn load_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingGenerator>, SearchError> {
    let embedder = FastEmbedGenerator::new(
        &settings.embedding.model,
        settings.embedding.models_dir.clone(),
        settings.embedding.show_progress,
        Some(settings.embedding.batch_size),
    )
    .map_err(SearchError::Embedding)?;
    Ok(Arc::new(embedder))
}

fn report_error(error: &anyhow::Error) -> ExitCode {
    eprintln!("Error: {error}");
    match error.downcast_ref::<SearchError>() {
        Some(search_error) => {
            for suggestion in search_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
            let code = ExitCode::from_error(search_error);
            if code.is_blocking() {
                eprintln!("Blocking error: scripts should stop here");
            }
            code
        }
        None => ExitCode::GeneralError,
    }
}
