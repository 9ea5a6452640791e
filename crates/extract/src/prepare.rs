use anyhow::{Context, Result};
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, info};

/// Formats the extraction model accepts.
pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

const START_QUALITY: u8 = 95;
const MIN_QUALITY: u8 = 5;
const QUALITY_STEP: u8 = 5;

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl PreparedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Verify `bytes` decode as a supported image and shrink them to at most
/// `max_bytes` when possible. Oversized images are re-encoded as JPEG at
/// falling quality; the lowest quality result is returned even if it is
/// still too large.
pub fn prepare_image(bytes: Vec<u8>, max_bytes: usize) -> Result<PreparedImage> {
    let format = image::guess_format(&bytes).context("Unrecognised image data")?;
    if !SUPPORTED_FORMATS.contains(&format) {
        anyhow::bail!("Unsupported image format: {:?}", format);
    }

    let decoded = image::load_from_memory_with_format(&bytes, format)
        .context("Invalid or corrupted image")?;

    if bytes.len() <= max_bytes {
        return Ok(PreparedImage { format, bytes });
    }

    let rgb = decoded.to_rgb8();
    let mut quality = START_QUALITY;
    loop {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(&rgb)
            .context("Failed to compress image")?;
        debug!(quality, size = buffer.len(), "compressed image candidate");

        if buffer.len() <= max_bytes || quality <= MIN_QUALITY {
            info!(
                original = bytes.len(),
                compressed = buffer.len(),
                quality,
                "image compressed"
            );
            return Ok(PreparedImage {
                format: ImageFormat::Jpeg,
                bytes: buffer,
            });
        }
        quality -= QUALITY_STEP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(2654435761).wrapping_add(y.wrapping_mul(40503)) ^ (x * y);
            Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
        });
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_small_image_untouched() {
        let original = png(8, 8);
        let prepared = prepare_image(original.clone(), 1024 * 1024).unwrap();
        assert_eq!(prepared.format, ImageFormat::Png);
        assert_eq!(prepared.bytes, original);
        assert_eq!(prepared.mime_type(), "image/png");
    }

    #[test]
    fn test_large_image_recompressed_as_jpeg() {
        let original = png(256, 256);
        let prepared = prepare_image(original.clone(), 2_000).unwrap();
        assert_eq!(prepared.format, ImageFormat::Jpeg);
        assert!(prepared.bytes.len() < original.len());
    }

    #[test]
    fn test_rejects_non_image() {
        assert!(prepare_image(b"plain text, not pixels".to_vec(), 1024).is_err());
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        let err = prepare_image(bmp, 1024).unwrap_err();
        assert!(err.to_string().contains("Unsupported image format"));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let mut truncated = png(16, 16);
        truncated.truncate(40);
        let err = prepare_image(truncated, 1024).unwrap_err();
        assert!(err.to_string().contains("Invalid or corrupted image"));
    }
}
