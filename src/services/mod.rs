pub mod analyzer;
pub mod catalog;
pub mod intake;

// Re-export commonly used services
pub use analyzer::{DiseaseAnalyzer, RandomAnalyzer};
pub use catalog::{DiseaseCatalog, HEALTHY_PLANT_ID};
pub use intake::{ImagePipeline, PreparedImage};
