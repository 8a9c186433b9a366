// Upload intake: extension check, payload decoding, RGB normalization,
// analysis/display copies and JPEG re-encoding of the display copy.

use base64::{engine::general_purpose, Engine};
use image::RgbImage;
use tracing::debug;

use crate::core::config::ImagingConfig;
use crate::core::errors::{IntakeError, IntakeResult};
use crate::core::types::{Dimensions, UploadPayload};
use crate::utils::image_ops;

/// Extensions accepted for multipart file uploads
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Both derived copies of one upload
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Copy handed to the analyzer
    pub analysis: RgbImage,
    /// JPEG bytes of the copy shown to the user
    pub display_jpeg: Vec<u8>,
    pub analysis_size: Dimensions,
    pub display_size: Dimensions,
}

/// Reject filenames whose extension is not png, jpg or jpeg.
pub fn validate_extension(filename: &str) -> IntakeResult<()> {
    if filename.is_empty() {
        return Err(IntakeError::NoFileSelected);
    }
    let extension = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return Err(IntakeError::UnsupportedExtension(String::new())),
    };
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(IntakeError::UnsupportedExtension(extension))
    }
}

/// Decode a base64 payload, dropping any `data:<mime>;base64,` prefix.
///
/// ASCII whitespace is ignored, so line-wrapped payloads decode.
pub fn decode_data_url(data: &str) -> IntakeResult<Vec<u8>> {
    let encoded = match data.find("base64,") {
        Some(pos) => &data[pos + "base64,".len()..],
        None => data,
    };
    let encoded: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if encoded.is_empty() {
        return Err(IntakeError::NoImageData);
    }
    Ok(general_purpose::STANDARD.decode(encoded)?)
}

/// Turns validated upload bytes into analysis and display copies.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    imaging: ImagingConfig,
}

impl ImagePipeline {
    pub fn new(imaging: ImagingConfig) -> Self {
        Self { imaging }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.imaging.jpeg_quality
    }

    /// Validate the payload and extract its raw image bytes. No decoding happens here.
    pub fn raw_bytes(payload: UploadPayload) -> IntakeResult<Vec<u8>> {
        match payload {
            UploadPayload::File { filename, bytes } => {
                validate_extension(&filename)?;
                Ok(bytes)
            }
            UploadPayload::DataUrl(data) => decode_data_url(&data),
        }
    }

    /// Decode and derive both copies. CPU-bound.
    pub fn prepare(&self, bytes: &[u8]) -> IntakeResult<PreparedImage> {
        let decoded = image::load_from_memory(bytes)?;
        let rgb = image_ops::to_rgb(decoded);
        debug!("Decoded upload: {}x{}", rgb.width(), rgb.height());

        let analysis = image_ops::shrink_to_fit(&rgb, self.imaging.analysis_max_edge);
        let display = image_ops::shrink_to_fit(&rgb, self.imaging.display_max_edge);
        let display_jpeg = image_ops::encode_jpeg(&display, self.imaging.jpeg_quality)?;

        Ok(PreparedImage {
            analysis_size: Dimensions::new(analysis.width(), analysis.height()),
            display_size: Dimensions::new(display.width(), display.height()),
            analysis,
            display_jpeg,
        })
    }

    /// Validate, decode and derive copies on the blocking pool.
    pub async fn prepare_async(&self, payload: UploadPayload) -> IntakeResult<PreparedImage> {
        let bytes = Self::raw_bytes(payload)?;
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.prepare(&bytes))
            .await
            .map_err(|e| IntakeError::Internal(format!("image task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn imaging() -> ImagingConfig {
        ImagingConfig {
            analysis_max_edge: 512,
            display_max_edge: 600,
            jpeg_quality: 85,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([30, 160, 60]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_extension_allow_set() {
        for name in ["leaf.png", "leaf.jpg", "leaf.jpeg", "LEAF.JPG", "my.leaf.Png"] {
            assert!(validate_extension(name).is_ok(), "{name} should be accepted");
        }
        assert!(matches!(
            validate_extension("leaf.gif"),
            Err(IntakeError::UnsupportedExtension(ext)) if ext == "gif"
        ));
        assert!(validate_extension("notes.txt").is_err());
        assert!(validate_extension("no_extension").is_err());
        assert!(matches!(
            validate_extension(""),
            Err(IntakeError::NoFileSelected)
        ));
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let raw = b"leaf bytes";
        let encoded = general_purpose::STANDARD.encode(raw);
        let with_prefix = format!("data:image/jpeg;base64,{}", encoded);
        assert_eq!(decode_data_url(&with_prefix).unwrap(), raw);
        assert_eq!(decode_data_url(&encoded).unwrap(), raw);
    }

    #[test]
    fn test_wrapped_data_url_decodes() {
        let raw: Vec<u8> = (0..=255u8).collect();
        let encoded = general_purpose::STANDARD.encode(&raw);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.contains('\n'));

        let payload = format!("data:image/jpeg;base64,\n{}\n", wrapped);
        assert_eq!(decode_data_url(&payload).unwrap(), raw);
        assert_eq!(decode_data_url(" \t\n ").unwrap_err().to_string(), "No image data provided");
    }

    #[test]
    fn test_data_url_errors() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,"),
            Err(IntakeError::NoImageData)
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@not base64@@"),
            Err(IntakeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_prepare_produces_independent_copies() {
        let pipeline = ImagePipeline::new(imaging());
        let prepared = pipeline.prepare(&png_bytes(1200, 900)).unwrap();

        assert_eq!(prepared.analysis_size, Dimensions::new(512, 384));
        assert_eq!(prepared.analysis.dimensions(), (512, 384));
        assert_eq!(prepared.display_size, Dimensions::new(600, 450));
        assert_eq!(&prepared.display_jpeg[..2], &[0xFF, 0xD8]);

        let display = image::load_from_memory(&prepared.display_jpeg).unwrap();
        assert_eq!((display.width(), display.height()), (600, 450));
    }

    #[test]
    fn test_small_images_are_not_enlarged() {
        let pipeline = ImagePipeline::new(imaging());
        let prepared = pipeline.prepare(&png_bytes(120, 80)).unwrap();
        assert_eq!(prepared.analysis_size, Dimensions::new(120, 80));
        assert_eq!(prepared.display_size, Dimensions::new(120, 80));
    }

    #[test]
    fn test_corrupt_bytes_are_decode_errors() {
        let pipeline = ImagePipeline::new(imaging());
        assert!(matches!(
            pipeline.prepare(b"\x89PNG but not really"),
            Err(IntakeError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_async_rejects_before_decode() {
        let pipeline = ImagePipeline::new(imaging());
        let payload = UploadPayload::File {
            filename: "leaf.gif".into(),
            bytes: png_bytes(10, 10),
        };
        let err = pipeline.prepare_async(payload).await.unwrap_err();
        assert!(err.is_validation());

        let encoded = general_purpose::STANDARD.encode(png_bytes(40, 30));
        let captured = UploadPayload::DataUrl(format!("data:image/png;base64,{}", encoded));
        let prepared = pipeline.prepare_async(captured).await.unwrap();
        assert_eq!(prepared.display_size, Dimensions::new(40, 30));
    }
}
