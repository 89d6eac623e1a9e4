use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pothole_ai::PotholeDetector;
use pothole_fetch::ImageFetcher;
use pothole_server::config::{Cli, Command};
use pothole_server::{AppState, build_router, commands};
use pothole_store::{ComplaintStore, MemoryStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("pothole-server v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let store = open_store(cli.database.as_deref())?;

    match cli.command() {
        Command::Serve => serve(&cli, store).await,
        Command::Import { file } => {
            warn_if_ephemeral(&cli);
            commands::import_complaints(store.as_ref(), &file).await?;
            Ok(())
        }
        Command::Requeue { id } => {
            warn_if_ephemeral(&cli);
            commands::requeue_complaint(store.as_ref(), &id).await
        }
    }
}

fn open_store(database: Option<&Path>) -> anyhow::Result<Arc<dyn ComplaintStore>> {
    match database {
        #[cfg(feature = "duckdb")]
        Some(path) => {
            let store = pothole_store::DuckStore::open_persistent(path)
                .with_context(|| format!("opening database {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "duckdb"))]
        Some(path) => anyhow::bail!(
            "built without the duckdb feature; cannot open {}",
            path.display()
        ),
        None => {
            info!("no database configured, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn warn_if_ephemeral(cli: &Cli) {
    if cli.database.is_none() {
        warn!("no --database given; changes are discarded on exit");
    }
}

async fn serve(cli: &Cli, store: Arc<dyn ComplaintStore>) -> anyhow::Result<()> {
    let detector = PotholeDetector::load(&cli.model);
    if let Some(name) = detector.model_name() {
        info!(model = name, "detector ready");
    }

    let scratch_dir = cli.scratch_dir();
    let fetcher = ImageFetcher::new(cli.fetch_timeout(), &scratch_dir)
        .with_context(|| format!("preparing scratch directory {}", scratch_dir.display()))?;

    let app = build_router(AppState::new(store, detector, fetcher));

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    info!("listening on http://{}", cli.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
