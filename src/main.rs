// Main entry point for the leaf disease detection service

use leafscan::{
    core::{Config, StorageMode},
    storage::{CleanupTask, Clock, DiskImageStorage, ImageStorage, MemoryImageStorage, SystemClock},
    web::{build_router, AppState},
    DiseaseCatalog, Metrics, RandomAnalyzer,
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match Config::new() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let level = match config.log_level() {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    };
    let filter = EnvFilter::new(format!("leafscan={},tower_http={}", level, level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== LEAF DISEASE DETECTOR ===");
    info!(
        "Config: storage={:?} results_dir={} retention={}h serverless={}",
        config.storage_mode(),
        config.results_dir().display(),
        config.cleanup.retention.as_secs() / 3600,
        if config.is_serverless() { "ON" } else { "OFF" }
    );
    if config.uses_default_secret() {
        warn!("SESSION_SECRET is not set; using the insecure development default");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let storage: Arc<dyn ImageStorage> = match config.storage_mode() {
        StorageMode::Disk => Arc::new(
            DiskImageStorage::new(config.results_dir())
                .context("Failed to prepare results directory")?,
        ),
        StorageMode::Inline => Arc::new(MemoryImageStorage::new(clock.clone())),
    };

    // Initialize metrics
    let metrics = Metrics::new();

    let catalog = Arc::new(DiseaseCatalog::builtin());
    let analyzer = Arc::new(RandomAnalyzer::new(&catalog));
    info!("Disease catalog loaded: {} records", catalog.len());

    let state = AppState::new(config.clone(), storage, analyzer, catalog, clock, metrics)
        .context("Failed to build application state")?;

    // Background cleanup only where long-running work is allowed
    if config.is_serverless() {
        info!("Serverless mode: cleanup runs on uploads and redirects instead of in the background");
    } else {
        CleanupTask::new(
            state.sweeper.clone(),
            state.results.clone(),
            state.flashes.clone(),
            config.cleanup.interval,
        )
        .spawn();
    }

    let app = build_router(state);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                  - Upload form");
    info!("  POST /upload            - Analyze an image (multipart/form-data)");
    info!("  GET  /results           - Latest analysis for this session");
    info!("  GET  /results/image/:id - Stored result image");
    info!("  GET  /browse            - Disease library");
    info!("  GET  /api/disease/:id   - Disease record (JSON)");
    info!("  GET  /health            - Health check");
    info!("  GET  /metrics           - Prometheus metrics");
    info!("  GET  /stats             - Detailed statistics");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
