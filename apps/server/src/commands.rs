//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use quizbank_core::{AuthService, ImageBackend, Ingestor, LocalImageStore};
use quizbank_server::{AppState, router};
use quizbank_shared::{
    AppConfig, config_file_path, init_config, load_config, load_config_from, validate_images,
};
use quizbank_storage::Storage;
use serde_json::json;
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Command-line entry point for quizbank.
#[derive(Parser)]
#[command(
    name = "quizbank",
    version,
    about = "Extract quiz questions from ZIP archives and serve them over HTTP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.quizbank/quizbank.toml.
    #[arg(long, global = true, env = "QUIZBANK_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Run the HTTP API.
    Serve {
        /// Address to bind (overrides server.address).
        #[arg(long)]
        address: Option<String>,

        /// Database file (overrides database.path).
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Extract questions from a local archive and print them as JSON.
    ///
    /// Images are copied with the local image store; nothing is written to
    /// the database.
    Extract {
        /// Path to the ZIP archive.
        archive: PathBuf,

        /// Category to report alongside the questions.
        #[arg(long, default_value = "")]
        category: String,

        /// Subject to report alongside the questions.
        #[arg(long, default_value = "")]
        subject: String,
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
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "quizbank=info",
        1 => "quizbank=debug",
        _ => "quizbank=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { address, database } => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_serve(config, address, database).await
        }
        Command::Extract {
            archive,
            category,
            subject,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_extract(&config, &archive, &category, &subject).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(
    mut config: AppConfig,
    address: Option<String>,
    database: Option<PathBuf>,
) -> Result<()> {
    if let Some(address) = address {
        config.server.address = address;
    }
    if let Some(database) = database {
        config.database.path = database;
    }
    validate_images(&config.images)?;

    let storage = Arc::new(Storage::open(&config.database.path).await?);
    let auth = AuthService::from_config(storage.clone(), &config)?;
    let ingestor = Ingestor::from_config(ImageBackend::from_config(&config.images)?, &config);

    let state = AppState {
        storage,
        auth: Arc::new(auth),
        ingestor: Arc::new(ingestor),
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.address)
        .await
        .wrap_err_with(|| format!("cannot bind {}", config.server.address))?;
    info!(
        address = %listener.local_addr()?,
        database = %config.database.path.display(),
        images = ?config.images.backend,
        "quizbank listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn cmd_extract(config: &AppConfig, archive: &Path, category: &str, subject: &str) -> Result<()> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("'{}' is not a file path", archive.display()))?;
    let bytes = tokio::fs::read(archive)
        .await
        .wrap_err_with(|| format!("cannot read {}", archive.display()))?;

    let base = match &config.images.public_base_url {
        Some(url) => Url::parse(url).wrap_err("images.public_base_url is not a URL")?,
        None => {
            let dir = std::path::absolute(&config.images.local_dir)?;
            Url::from_directory_path(&dir)
                .map_err(|()| eyre!("cannot build a file URL for {}", dir.display()))?
        }
    };
    let store = ImageBackend::Local(LocalImageStore::new(&config.images.local_dir, base));
    let ingestor = Ingestor::from_config(store, config);

    info!(archive = %archive.display(), "extracting");
    let questions = ingestor.extract_archive(file_name, &bytes).await?;

    let report = json!({
        "archive": file_name,
        "category": category,
        "subject": subject,
        "questions": questions,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let source = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    let config = resolve_config(path)?;
    let content = toml::to_string_pretty(&config)?;
    println!("# {}", source.display());
    println!("{content}");
    Ok(())
}
