//! civic-intake - Civic issue intake service
//!
//! Accepts geotagged photo reports, detects duplicates, routes them to a
//! municipal department and serves triage, voting, comments and citizen
//! notifications over HTTP.

use anyhow::{Context, Result};
use civic_common::config::{
    default_config_path, load_toml_config, resolve_root_folder, RootFolderLayout, TomlConfig,
    ROOT_FOLDER_ENV,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civic_intake::config::{resolve_captioner_api_key, IntakeSettings};
use civic_intake::index::VisualIndex;
use civic_intake::services::{
    DbNotificationSink, DisabledCaptioner, DisabledEmbeddingExtractor, GeminiCaptioner,
    HttpEmbeddingExtractor, LocalImageStore,
};
use civic_intake::spatial::SqliteSpatialIndex;
use civic_intake::types::{Captioner, EmbeddingExtractor, EMBEDDING_DIM};
use civic_intake::workflow::Collaborators;
use civic_intake::{AppState, IssueIngestionPipeline};

/// Command-line arguments for civic-intake
#[derive(Parser, Debug)]
#[command(name = "civic-intake")]
#[command(about = "Civic issue intake service")]
#[command(version)]
struct Args {
    /// Root folder holding the database, index snapshot and uploads
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "CIVIC_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "CIVIC_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_config(args.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("civic_intake={0},civic_common={0},tower_http=info", toml_config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting civic-intake v{}", env!("CARGO_PKG_VERSION"));

    // Root folder and database
    let root = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let layout = RootFolderLayout::new(root);
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root().display());

    let db = civic_common::db::init_database(&layout.database_path())
        .await
        .context("Failed to open database")?;
    let settings = IntakeSettings::load(&db).await?;

    // Visual index, restored from its snapshot pair
    let index_dir = layout.index_dir();
    let visual_index = Arc::new(
        tokio::task::spawn_blocking(move || VisualIndex::open(&index_dir, EMBEDDING_DIM)).await?,
    );

    // Collaborators
    let port = args.port.unwrap_or(toml_config.port);
    let image_base_url = toml_config
        .image_base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}/uploads", toml_config.bind_address, port));

    let extractor: Arc<dyn EmbeddingExtractor> = match &toml_config.embedder.endpoint {
        Some(endpoint) => Arc::new(HttpEmbeddingExtractor::new(
            endpoint.clone(),
            EMBEDDING_DIM,
            Duration::from_secs(toml_config.embedder.timeout_secs),
        )?),
        None => {
            warn!("No embedder endpoint configured; visual duplicate detection disabled");
            Arc::new(DisabledEmbeddingExtractor)
        }
    };

    let captioner: Arc<dyn Captioner> = match resolve_captioner_api_key(&db, &toml_config).await? {
        Some(key) => Arc::new(GeminiCaptioner::new(
            toml_config.captioner.endpoint.clone(),
            toml_config.captioner.model.clone(),
            Some(key),
            Duration::from_secs(toml_config.captioner.timeout_secs),
        )?),
        None => {
            warn!("Captioning disabled; new issues route to 'other' until a key is configured");
            Arc::new(DisabledCaptioner)
        }
    };

    let collaborators = Collaborators {
        extractor,
        captioner,
        image_store: Arc::new(LocalImageStore::new(layout.uploads_dir(), &image_base_url)),
        notifier: Arc::new(DbNotificationSink::new(db.clone())),
    };

    let pipeline = Arc::new(IssueIngestionPipeline::new(
        db.clone(),
        Arc::clone(&visual_index),
        Arc::new(SqliteSpatialIndex::new(db.clone())),
        collaborators,
        settings,
    ));

    let state = AppState::new(pipeline, toml_config.staff_secret.clone())
        .with_uploads_dir(layout.uploads_dir());
    let app = civic_intake::build_router(state);

    let addr: SocketAddr = format!("{}:{}", toml_config.bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", toml_config.bind_address))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Final snapshot flush
    let flushed = tokio::task::spawn_blocking(move || visual_index.flush()).await?;
    match flushed {
        Ok(()) => info!("Visual index flushed"),
        Err(e) => error!(error = %e, "Visual index flush on shutdown failed"),
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Explicit path, else the platform default if it exists, else built-in defaults
fn load_config(explicit: Option<&std::path::Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => load_toml_config(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => Ok(TomlConfig::default()),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
