pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{encode_jpeg, fit_within, highlight_jpeg_async, shrink_to_fit, to_rgb};
pub use metrics::{Metrics, MetricsSnapshot};
