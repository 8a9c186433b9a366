// Analysis Orchestrator: upload → pipeline → analyzer → catalog → stored result

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{IntakeError, IntakeResult};
use crate::core::types::{AnalysisResult, UploadPayload};
use crate::services::analyzer::DiseaseAnalyzer;
use crate::services::catalog::DiseaseCatalog;
use crate::services::intake::ImagePipeline;
use crate::storage::clock::Clock;
use crate::storage::result_images::ResultImages;
use crate::utils::Metrics;

/// Single owner of the upload-to-result flow, shared by the HTTP layer and the CLI
pub struct AnalysisOrchestrator {
    pipeline: ImagePipeline,
    analyzer: Arc<dyn DiseaseAnalyzer>,
    catalog: Arc<DiseaseCatalog>,
    images: Arc<ResultImages>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl AnalysisOrchestrator {
    pub fn new(
        config: &Config,
        analyzer: Arc<dyn DiseaseAnalyzer>,
        catalog: Arc<DiseaseCatalog>,
        images: Arc<ResultImages>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        info!(
            "Analyzer: {} (analysis ≤{}px, display ≤{}px, JPEG q{})",
            analyzer.name(),
            config.imaging.analysis_max_edge,
            config.imaging.display_max_edge,
            config.imaging.jpeg_quality
        );
        Self {
            pipeline: ImagePipeline::new(config.imaging.clone()),
            analyzer,
            catalog,
            images,
            clock,
            metrics,
        }
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    pub fn images(&self) -> &Arc<ResultImages> {
        &self.images
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.pipeline.jpeg_quality()
    }

    /// Run one upload through the whole flow.
    ///
    /// # Workflow:
    /// 1. Validate and decode the payload, derive analysis and display copies
    /// 2. Run the analyzer on the analysis copy
    /// 3. Resolve the disease against the catalog (Healthy Plant fallback)
    /// 4. Persist the display copy per storage mode
    #[instrument(skip(self, payload), fields(captured = payload.is_captured()))]
    pub async fn analyze_upload(&self, payload: UploadPayload) -> IntakeResult<AnalysisResult> {
        let start = Instant::now();
        self.metrics.record_upload();

        let prepared = match self.pipeline.prepare_async(payload).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.record_failure(&e);
                return Err(e);
            }
        };

        let analyzer = Arc::clone(&self.analyzer);
        let analysis = prepared.analysis;
        let diagnosis = tokio::task::spawn_blocking(move || analyzer.analyze(&analysis))
            .await
            .map_err(|e| IntakeError::Internal(format!("analyzer task failed: {}", e)))?;

        let (record, affected_areas) = match self.catalog.lookup(diagnosis.disease_id) {
            Some(record) => (record, diagnosis.affected_areas),
            None => {
                warn!(
                    "Analyzer returned unknown disease id {}, falling back to healthy plant",
                    diagnosis.disease_id
                );
                (self.catalog.resolve(diagnosis.disease_id), Vec::new())
            }
        };

        let image = self.images.persist(prepared.display_jpeg).await.map_err(|e| {
            error!("Failed to persist result image: {}", e);
            IntakeError::from(e)
        })?;

        let healthy = record.id == self.catalog.healthy_id();
        let elapsed = start.elapsed();
        self.metrics.record_analysis(healthy, elapsed);
        info!(
            "Analyzed upload in {:?}: {} ({:.1}%, {} areas)",
            elapsed,
            record.name,
            diagnosis.confidence,
            affected_areas.len()
        );

        Ok(AnalysisResult {
            image,
            disease_id: record.id,
            disease_name: record.name.clone(),
            confidence: diagnosis.confidence,
            description: record.description.clone(),
            treatment: record.treatment.clone(),
            prevention: record.prevention.clone(),
            affected_areas,
            analysis_size: prepared.analysis_size,
            display_size: prepared.display_size,
            created_at: self.clock.now(),
        })
    }

    fn record_failure(&self, err: &IntakeError) {
        if err.is_validation() {
            info!("Upload rejected: {}", err);
            self.metrics.record_rejected_upload();
        } else {
            error!("Error processing upload: {}", err);
            if matches!(err, IntakeError::Decode(_) | IntakeError::InvalidBase64(_)) {
                self.metrics.record_decode_failure();
            }
        }
    }
}
