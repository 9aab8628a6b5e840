use crate::snapshot::{SnapshotError, SnapshotFormat, SnapshotSettings};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;

/// A snapshot after resizing and encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSnapshot {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,

    /// Format actually written; WebP requests fall back to PNG
    pub format: SnapshotFormat,
}

/// Decodes a raw capture, scales it down to `max_width`, and re-encodes it
///
/// Images narrower than `max_width` keep their size. The aspect ratio is
/// preserved, with the scaled height rounded and never below one pixel.
pub fn encode_snapshot(raw: &[u8], settings: &SnapshotSettings) -> Result<EncodedSnapshot, SnapshotError> {
    let image = image::load_from_memory(raw).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    let image = fit_width(image, settings.max_width);
    let (width, height) = image.dimensions();

    let format = match settings.format {
        SnapshotFormat::Webp => {
            tracing::warn!("WebP encoding is not available, writing PNG instead");
            SnapshotFormat::Png
        }
        other => other,
    };

    let mut buffer = Cursor::new(Vec::new());
    match format {
        SnapshotFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(settings.quality))
        }
        _ => image.write_to(&mut buffer, ImageOutputFormat::Png),
    }
    .map_err(|e| SnapshotError::Encode(e.to_string()))?;

    Ok(EncodedSnapshot {
        bytes: buffer.into_inner(),
        width,
        height,
        format,
    })
}

fn fit_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_width || max_width == 0 {
        return image;
    }

    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    image.resize_exact(max_width, scaled.max(1), FilterType::Triangle)
}
