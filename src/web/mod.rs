// HTTP surface: shared state, routes and layers

pub mod handlers;
pub mod views;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::{Config, MAX_UPLOAD_BYTES};
use crate::core::errors::ConfigResult;
use crate::middleware::session::{session_middleware, SessionSigner};
use crate::orchestration::AnalysisOrchestrator;
use crate::services::analyzer::DiseaseAnalyzer;
use crate::services::catalog::DiseaseCatalog;
use crate::storage::cleanup::{CleanupTask, RetentionSweeper};
use crate::storage::clock::Clock;
use crate::storage::flash::FlashStore;
use crate::storage::image_store::ImageStorage;
use crate::storage::result_images::ResultImages;
use crate::storage::result_store::{MemoryResultStore, ResultStore};
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub catalog: Arc<DiseaseCatalog>,
    pub results: Arc<dyn ResultStore>,
    pub flashes: Arc<FlashStore>,
    pub images: Arc<ResultImages>,
    pub sweeper: Arc<RetentionSweeper>,
    /// Request-driven cleanup, set when no background loop runs
    pub on_demand_cleanup: Option<Arc<CleanupTask>>,
    pub signer: SessionSigner,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire stores, sweeper and orchestrator around the given backends.
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn ImageStorage>,
        analyzer: Arc<dyn DiseaseAnalyzer>,
        catalog: Arc<DiseaseCatalog>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> ConfigResult<Self> {
        let retention = config.cleanup.retention;
        let interval = config.cleanup.interval;
        let sweeper = Arc::new(
            RetentionSweeper::new(storage.clone(), clock.clone(), retention, interval)
                .with_metrics(metrics.clone()),
        );
        let results: Arc<dyn ResultStore> =
            Arc::new(MemoryResultStore::new(clock.clone(), retention));
        let flashes = Arc::new(FlashStore::new(clock.clone(), retention));

        let mut images = ResultImages::new(config.storage_mode(), storage, sweeper.clone());
        let on_demand_cleanup = config.is_serverless().then(|| {
            Arc::new(CleanupTask::new(
                sweeper.clone(),
                results.clone(),
                flashes.clone(),
                interval,
            ))
        });
        if let Some(ref cleanup) = on_demand_cleanup {
            images = images.with_on_demand_cleanup(cleanup.clone());
        }
        let images = Arc::new(images);
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            &config,
            analyzer,
            catalog.clone(),
            images.clone(),
            clock.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            signer: SessionSigner::new(config.session_secret())?,
            results,
            flashes,
            config,
            orchestrator,
            catalog,
            images,
            sweeper,
            on_demand_cleanup,
            metrics,
        })
    }
}

/// Build the router with every endpoint and layer.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let signer = state.signer.clone();

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/results", get(handlers::results))
        .route("/results/image/*id", get(handlers::result_image))
        .route("/browse", get(handlers::browse))
        .route("/api/disease/:id", get(handlers::disease_api))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/stats", get(handlers::stats_endpoint))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn_with_state(
            signer,
            session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handlers::handle_panic))
        .layer(cors)
}
