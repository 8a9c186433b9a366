// Domain types shared by the pipeline, storage and web layers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::core::errors::ResultIdError;

/// One entry of the disease reference catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub id: u32,
    pub name: String,
    pub crops: Vec<String>,
    pub description: String,
    pub treatment: String,
    pub prevention: String,
}

/// Rectangle flagged as disease-relevant, in analysis-image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AffectedArea {
    pub fn fits_within(&self, size: Dimensions) -> bool {
        self.x + self.width <= size.width && self.y + self.height <= size.height
    }

    /// Map a rectangle from `from` coordinates into `to` coordinates.
    pub fn rescale(&self, from: Dimensions, to: Dimensions) -> AffectedArea {
        if from.width == 0 || from.height == 0 {
            return *self;
        }
        let sx = to.width as f64 / from.width as f64;
        let sy = to.height as f64 / from.height as f64;
        let x = ((self.x as f64 * sx).round() as u32).min(to.width);
        let y = ((self.y as f64 * sy).round() as u32).min(to.height);
        AffectedArea {
            x,
            y,
            width: ((self.width as f64 * sx).round() as u32).min(to.width - x),
            height: ((self.height as f64 * sy).round() as u32).min(to.height - y),
        }
    }
}

/// Pixel size of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raw analyzer output, before catalog resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub disease_id: u32,
    /// Percentage in [0, 100]
    pub confidence: f32,
    pub affected_areas: Vec<AffectedArea>,
}

/// Opaque identifier of a stored result image.
///
/// Construction rejects anything that could escape the results directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(String);

impl ResultId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, ResultIdError> {
        if raw.is_empty() {
            return Err(ResultIdError::Empty);
        }
        if raw.contains("..") || raw.contains('/') || raw.contains('\\') || raw.contains('\0') {
            return Err(ResultIdError::PathTraversal(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.jpg", self.0)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side session key, carried in the signed session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        uuid::Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the display copy travels with a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultImage {
    /// Base64 JPEG embedded in the record
    Inline { jpeg_base64: String },
    /// JPEG on disk, referenced by id
    Stored { id: ResultId },
}

/// Outcome of one upload, held per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image: ResultImage,
    pub disease_id: u32,
    pub disease_name: String,
    pub confidence: f32,
    pub description: String,
    pub treatment: String,
    pub prevention: String,
    pub affected_areas: Vec<AffectedArea>,
    pub analysis_size: Dimensions,
    pub display_size: Dimensions,
    pub created_at: SystemTime,
}

impl AnalysisResult {
    /// Confidence as shown to users, e.g. `87.3%`
    pub fn confidence_label(&self) -> String {
        format!("{:.1}%", self.confidence)
    }

    pub fn stored_id(&self) -> Option<&ResultId> {
        match &self.image {
            ResultImage::Stored { id } => Some(id),
            ResultImage::Inline { .. } => None,
        }
    }

    /// Affected areas mapped onto the display copy
    pub fn display_areas(&self) -> Vec<AffectedArea> {
        self.affected_areas
            .iter()
            .map(|area| area.rescale(self.analysis_size, self.display_size))
            .collect()
    }
}

/// Raw upload as received from the form
#[derive(Debug, Clone)]
pub enum UploadPayload {
    /// Multipart `file` field
    File { filename: String, bytes: Vec<u8> },
    /// `image_data` field, base64 optionally prefixed with `data:...;base64,`
    DataUrl(String),
}

impl UploadPayload {
    pub fn is_captured(&self) -> bool {
        matches!(self, UploadPayload::DataUrl(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Error,
    Warning,
    Info,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Error => "error",
            FlashLevel::Warning => "warning",
            FlashLevel::Info => "info",
        }
    }
}

/// One-shot message carried across a redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Warning,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_id_rejects_traversal() {
        assert_eq!(ResultId::parse(""), Err(ResultIdError::Empty));
        assert!(matches!(
            ResultId::parse("../../etc/passwd"),
            Err(ResultIdError::PathTraversal(_))
        ));
        assert!(ResultId::parse("a/b").is_err());
        assert!(ResultId::parse("..").is_err());
        assert!(ResultId::parse("a\\b").is_err());

        let id = ResultId::generate();
        let parsed = ResultId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
        assert!(parsed.file_name().ends_with(".jpg"));
    }

    #[test]
    fn test_rescale_stays_in_bounds() {
        let area = AffectedArea {
            x: 400,
            y: 300,
            width: 100,
            height: 100,
        };
        let from = Dimensions::new(512, 400);
        let to = Dimensions::new(600, 469);
        let scaled = area.rescale(from, to);
        assert!(scaled.fits_within(to));
        assert_eq!(scaled.x, 469);
    }

    #[test]
    fn test_confidence_label_has_one_decimal() {
        let result = AnalysisResult {
            image: ResultImage::Inline {
                jpeg_base64: String::new(),
            },
            disease_id: 1,
            disease_name: "Late Blight".into(),
            confidence: 87.26,
            description: String::new(),
            treatment: String::new(),
            prevention: String::new(),
            affected_areas: Vec::new(),
            analysis_size: Dimensions::new(1, 1),
            display_size: Dimensions::new(1, 1),
            created_at: SystemTime::now(),
        };
        assert_eq!(result.confidence_label(), "87.3%");
        assert!(result.stored_id().is_none());
    }
}
