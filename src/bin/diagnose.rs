//! Run the analysis flow on a local image and print the diagnosis
//! Run with: cargo run --release --bin diagnose -- <image_path>

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use leafscan::core::config::StorageMode;
use leafscan::core::types::UploadPayload;
use leafscan::storage::{Clock, MemoryImageStorage, ResultImages, RetentionSweeper, SystemClock};
use leafscan::{AnalysisOrchestrator, Config, DiseaseCatalog, Metrics, RandomAnalyzer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("leafscan=info")
        .with_target(false)
        .init();

    // Get image path from args
    let args: Vec<String> = std::env::args().collect();
    let Some(image_path) = args.get(1) else {
        bail!("usage: diagnose <image_path>");
    };
    let path = Path::new(image_path);
    if !path.exists() {
        bail!("Image not found: {}", image_path);
    }

    let mut config = Config::new().context("Failed to load configuration")?;
    config.storage.mode = StorageMode::Inline;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", image_path))?;
    info!("Loaded {} ({} bytes)", image_path, bytes.len());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
    let sweeper = Arc::new(RetentionSweeper::new(
        storage.clone(),
        clock.clone(),
        config.cleanup.retention,
        config.cleanup.interval,
    ));
    let images = Arc::new(ResultImages::new(StorageMode::Inline, storage, sweeper));
    let catalog = Arc::new(DiseaseCatalog::builtin());
    let analyzer = Arc::new(RandomAnalyzer::new(&catalog));
    let orchestrator =
        AnalysisOrchestrator::new(&config, analyzer, catalog, images, clock, Metrics::new());

    let result = orchestrator
        .analyze_upload(UploadPayload::File { filename, bytes })
        .await
        .context("Analysis failed")?;

    println!("\n=== Diagnosis ===");
    println!("Disease:    {} (id {})", result.disease_name, result.disease_id);
    println!("Confidence: {}", result.confidence_label());
    println!("Analyzed at {} (display {})", result.analysis_size, result.display_size);
    println!("Affected areas:");
    if result.affected_areas.is_empty() {
        println!("  (none)");
    } else {
        for (i, area) in result.affected_areas.iter().enumerate() {
            println!(
                "  {}. {}x{} at ({}, {})",
                i + 1,
                area.width,
                area.height,
                area.x,
                area.y
            );
        }
    }
    println!("\nTreatment:  {}", result.treatment);
    println!("Prevention: {}", result.prevention);

    Ok(())
}
