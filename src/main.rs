//! study-gate: enrollment, day gating and submission ledger service
//!
//! ## Usage
//!
//! ```bash
//! # Serve the HTTP API with defaults
//! study-gate
//!
//! # Custom config and port
//! study-gate --config /etc/study-gate.toml --http-port 8080
//!
//! # Export participants and submissions as JSON
//! study-gate export --out participant_data.json
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use study_gate::{
    create_router, report, AppState, ArtifactStore, Clock, Config, Store, SystemClock,
};

#[derive(Parser)]
#[command(name = "study-gate")]
#[command(about = "Enrollment and day-gated submissions for multi-day studies")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "study-gate.toml")]
    config: PathBuf,

    /// Data directory (database and uploads)
    #[arg(short, long, env = "STUDY_GATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "STUDY_GATE_HTTP_PORT")]
    http_port: Option<u16>,

    /// Reference timezone (IANA name)
    #[arg(long, env = "STUDY_GATE_TIMEZONE")]
    timezone: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Write every participant and submission as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("study_gate=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(port) = cli.http_port {
        config.server.http_port = port;
    }
    if let Some(tz) = cli.timezone {
        config.study.timezone = tz;
    }

    let tz = config.study.tz().map_err(anyhow::Error::msg)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(tz));

    info!("Data dir: {}", config.storage.data_dir.display());
    info!("Reference timezone: {}", tz);

    let store = Arc::new(Store::open(&config.database_path()).context("opening database")?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, store.clone(), clock).await?,
        Command::Export { out } => {
            let report = report::build_report(&store, clock.now())?;
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    report::write_report(&report, file)?;
                    info!(
                        participants = report.participants.len(),
                        submissions = report.submission_count(),
                        "Exported to {}",
                        path.display()
                    );
                }
                None => report::write_report(&report, std::io::stdout().lock())?,
            }
        }
    }

    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => warn!("Store still referenced at shutdown, skipping explicit close"),
    }

    Ok(())
}

async fn serve(config: &Config, store: Arc<Store>, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    let artifacts = ArtifactStore::new(config.artifact_root()).await?;
    let state = Arc::new(AppState::assemble(store, clock, artifacts, &config.study));
    let app = create_router(state, config.server.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.server.bind_addr, config.server.http_port)
        .parse()
        .context("invalid bind address")?;
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
