pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, StorageMode, MAX_UPLOAD_BYTES};
pub use errors::{ConfigError, IntakeError, ResultIdError, StorageError};
pub use types::{
    AffectedArea, AnalysisResult, Diagnosis, Dimensions, DiseaseRecord, Flash, FlashLevel,
    ResultId, ResultImage, SessionId, UploadPayload,
};
