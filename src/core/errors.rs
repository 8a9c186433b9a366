// Custom error types for the intake pipeline, storage and configuration
//
// Using thiserror for ergonomic error definitions with:
// - User-facing messages kept separate from logged detail
// - Type-safe error matching in the web handlers
// - Source error chaining

use thiserror::Error;

/// Errors raised while turning an upload into an analysis result
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("No file selected for uploading")]
    NoFileSelected,

    #[error("No image data provided")]
    NoImageData,

    #[error("Unsupported file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("Invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Image decoding failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Result storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal processing failure: {0}")]
    Internal(String),
}

impl IntakeError {
    /// Validation failures are reported to the user verbatim and are not logged as errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IntakeError::NoFileSelected
                | IntakeError::NoImageData
                | IntakeError::UnsupportedExtension(_)
        )
    }

    /// Message shown to the end user through the flash/redirect idiom.
    ///
    /// Decode and internal failures map to generic text.
    pub fn user_message(&self, captured: bool) -> &'static str {
        match self {
            IntakeError::NoFileSelected => "No file selected for uploading",
            IntakeError::NoImageData => "No file selected for uploading",
            IntakeError::UnsupportedExtension(_) => "Allowed file types are png, jpg, jpeg",
            IntakeError::TooLarge { .. } => "The file is too large. Maximum size is 16MB.",
            IntakeError::InvalidBase64(_) => "Error processing the captured image",
            IntakeError::Decode(_) if captured => "Error processing the captured image",
            IntakeError::Decode(_) => "Error processing the image. Please try another image.",
            IntakeError::Storage(_) | IntakeError::Internal(_) => {
                "An unexpected error occurred. Please try again later."
            }
        }
    }
}

/// Result image storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to list {path}: {source}")]
    ListFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Results directory creation failed: {0}")]
    DirectoryCreationFailed(std::io::Error),

    #[error("Storage task join failed: {0}")]
    TaskJoinFailed(String),
}

/// Rejected result image identifiers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResultIdError {
    #[error("Result id is empty")]
    Empty,

    #[error("Result id contains path traversal characters: {0:?}")]
    PathTraversal(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid imaging config: {0}")]
    InvalidImagingConfig(String),

    #[error("JPEG quality must be in [1, 100], got {0}")]
    InvalidJpegQuality(u8),

    #[error("Invalid storage mode {0:?} (expected \"disk\" or \"inline\")")]
    InvalidStorageMode(String),

    #[error("Invalid cleanup config: {0}")]
    InvalidCleanupConfig(String),

    #[error("Invalid results path: {0}")]
    InvalidResultsPath(String),

    #[error("Environment variable {name} could not be parsed: {value:?}")]
    EnvVarError { name: String, value: String },

    #[error("Session secret rejected: {0}")]
    InvalidSessionSecret(String),
}

// Convenience type aliases for Results
pub type IntakeResult<T> = Result<T, IntakeError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(IntakeError::NoFileSelected.is_validation());
        assert!(IntakeError::UnsupportedExtension("gif".into()).is_validation());
        assert!(!IntakeError::Internal("boom".into()).is_validation());
        assert!(!IntakeError::TooLarge { limit: 1 }.is_validation());
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = IntakeError::Internal("disk full at /srv/results".into());
        assert!(!err.user_message(false).contains("/srv"));
    }

    #[test]
    fn test_decode_message_depends_on_source() {
        let err = IntakeError::Decode(image::load_from_memory(b"not an image").unwrap_err());
        assert_eq!(err.user_message(true), "Error processing the captured image");
        assert_eq!(
            err.user_message(false),
            "Error processing the image. Please try another image."
        );
    }
}
