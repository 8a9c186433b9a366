// Library exports for the leaf disease detection service

// Core modules
pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod storage;
pub mod utils;
pub mod web;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{ConfigError, IntakeError, StorageError},
    types::{AffectedArea, AnalysisResult, Diagnosis, DiseaseRecord, UploadPayload},
};

pub use orchestration::AnalysisOrchestrator;

pub use services::{DiseaseAnalyzer, DiseaseCatalog, ImagePipeline, RandomAnalyzer};

pub use storage::{CleanupTask, DiskImageStorage, MemoryImageStorage, ResultStore, SystemClock};

pub use utils::Metrics;

pub use web::{build_router, AppState};
