use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, Rgb, RgbImage};

use crate::core::types::AffectedArea;

/// Outline colour used when highlighting affected areas
pub const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline thickness in pixels
pub const HIGHLIGHT_THICKNESS: u32 = 3;

/// Normalize any decoded colour layout (palette, grey, alpha, 16-bit) to 8-bit RGB.
pub fn to_rgb(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Dimensions after shrinking so the longer edge is at most `max_edge`.
///
/// Aspect ratio is preserved, images are never enlarged and no edge drops below 1px.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge || longer == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / longer as f64;
    let scaled = |edge: u32| ((edge as f64 * scale).round() as u32).clamp(1, max_edge);
    (scaled(width), scaled(height))
}

/// Independent downscaled copy whose longer edge is at most `max_edge`.
pub fn shrink_to_fit(img: &RgbImage, max_edge: u32) -> RgbImage {
    let (width, height) = fit_within(img.width(), img.height(), max_edge);
    if (width, height) == img.dimensions() {
        return img.clone();
    }
    image::imageops::resize(img, width, height, FilterType::Lanczos3)
}

/// Encode an RGB image as baseline JPEG at the given quality (1-100).
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, quality).encode_image(img)?;
    Ok(jpeg_bytes)
}

/// Draw a hollow rectangle, clipped to the image.
pub fn draw_outline(img: &mut RgbImage, area: &AffectedArea, thickness: u32, color: Rgb<u8>) {
    let (img_w, img_h) = img.dimensions();
    if area.width == 0 || area.height == 0 || area.x >= img_w || area.y >= img_h {
        return;
    }
    let right = (area.x + area.width).min(img_w);
    let bottom = (area.y + area.height).min(img_h);

    for y in area.y..bottom {
        for x in area.x..right {
            let on_edge = x < area.x + thickness
                || x + thickness >= right
                || y < area.y + thickness
                || y + thickness >= bottom;
            if on_edge {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Decode a stored JPEG, outline every area in red and re-encode it.
pub fn highlight_jpeg(
    jpeg: &[u8],
    areas: &[AffectedArea],
    quality: u8,
) -> Result<Vec<u8>, ImageError> {
    let mut img = to_rgb(image::load_from_memory(jpeg)?);
    for area in areas {
        draw_outline(&mut img, area, HIGHLIGHT_THICKNESS, HIGHLIGHT_COLOR);
    }
    encode_jpeg(&img, quality)
}

/// Asynchronously highlight areas using spawn_blocking.
///
/// Decode plus re-encode is CPU-bound and would otherwise stall the runtime.
pub async fn highlight_jpeg_async(
    jpeg: Vec<u8>,
    areas: Vec<AffectedArea>,
    quality: u8,
) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        highlight_jpeg(&jpeg, &areas, quality).context("Failed to highlight affected areas")
    })
    .await
    .context("Failed to spawn blocking task for highlighting")?
}
