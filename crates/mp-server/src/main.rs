use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mp_agents::EventReport;
use mp_core::MediaAttachment;

mod config;
mod error;
mod routes;
mod state;

use config::Config;
use state::AppState;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: every request and reply body size
    Trace,
    /// Verbose: agent runs, merged documents, token cache refreshes
    Debug,
    /// Standard: requests, pipeline results, stored artifacts
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "metropulse")]
#[command(author, version, about = "MetroPulse: city event reports and city info", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./metropulse.toml, then ~/.config/metropulse/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Summarize one event report and print the summary JSON
    Event {
        /// Short name of the event
        #[arg(long)]
        name: String,
        /// What the reporter saw
        #[arg(long)]
        description: String,
        /// Where it happened
        #[arg(long)]
        location: String,
        /// Photo or video files to attach
        #[arg(long = "media", num_args = 1..)]
        media: Vec<PathBuf>,
        /// Also save the summary to the artifact store
        #[arg(long)]
        store: bool,
    },
    /// Gather movies, restaurants and concerts for a city and store them
    City {
        city: String,
    },
    /// Show the effective configuration with secrets redacted
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve log level: --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter()));

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve { host, port }) => serve(config, host, port).await,
        None => serve(config, None, None).await,
        Some(Commands::Event {
            name,
            description,
            location,
            media,
            store,
        }) => {
            if store {
                config.storage.persist_event_summaries = true;
            }
            let report = EventReport::new(name, description, location)
                .with_attachments(read_media(&media).await?);
            run_event(&config, report).await
        }
        Some(Commands::City { city }) => run_city(&config, &city).await,
        Some(Commands::Config) => show_config(&config),
    }
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = AppState::from_config(&config)?;
    let app = routes::router(state, config.server.body_limit);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "MetroPulse API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn read_media(paths: &[PathBuf]) -> Result<Vec<MediaAttachment>> {
    let mut attachments = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read media file: {}", path.display()))?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        let attachment = MediaAttachment::new(data, None, file_name);
        info!(
            file = %path.display(),
            mime_type = %attachment.mime_type,
            size = attachment.data.len(),
            "Attached media"
        );
        attachments.push(attachment);
    }
    Ok(attachments)
}

async fn run_event(config: &Config, report: EventReport) -> Result<()> {
    let state = AppState::from_config(config)?;
    let outcome = state.events.summarize_and_store(&report).await?;

    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    if let Some(artifact) = &outcome.artifact {
        eprintln!("Saved to {}", artifact.uri);
    }
    Ok(())
}

async fn run_city(config: &Config, city: &str) -> Result<()> {
    let state = AppState::from_config(config)?;
    let outcome = state.city.gather(city).await?;

    println!("{}", serde_json::to_string_pretty(&outcome.data)?);
    eprintln!("{}", outcome.message);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    match Config::config_path() {
        Ok(path) => println!("# User config file: {}", display_path(&path)),
        Err(e) => warn!(error = %e, "No user config directory"),
    }
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

fn display_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not present)", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_event_command_collects_media() {
        let cli = Cli::try_parse_from([
            "metropulse",
            "event",
            "--name",
            "Flooding",
            "--description",
            "Water under the flyover",
            "--location",
            "Silk Board",
            "--media",
            "a.jpg",
            "b.mp4",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Event { media, store, .. }) => {
                assert_eq!(media, vec![PathBuf::from("a.jpg"), PathBuf::from("b.mp4")]);
                assert!(!store);
            }
            _ => panic!("expected event command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["metropulse", "serve", "--port", "9000", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(9000), .. })));
    }

    #[tokio::test]
    async fn test_read_media_sniffs_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0]).unwrap();

        let attachments = read_media(&[path]).await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_read_media_missing_file() {
        let err = read_media(&[PathBuf::from("/nonexistent/photo.jpg")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read media file"));
    }
}
