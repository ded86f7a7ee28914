//! Frame downscaling and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage};

use slidesync_models::ImageData;

use crate::error::MediaResult;

/// Dimensions that fit `(width, height)` inside a `max_dimension` square,
/// preserving aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let larger = width.max(height);
    if larger <= max_dimension || larger == 0 {
        return (width, height);
    }
    let scale = f64::from(max_dimension) / f64::from(larger);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

/// Downscale `frame` so its larger side is at most `max_dimension` and
/// encode it as JPEG at `quality` (1-100).
pub fn encode_frame(frame: &DynamicImage, max_dimension: u32, quality: u8) -> MediaResult<ImageData> {
    let rgb = frame.to_rgb8();
    let (width, height) = fit_within(rgb.width(), rgb.height(), max_dimension);

    let rgb = if (width, height) == (rgb.width(), rgb.height()) {
        rgb
    } else {
        image::imageops::resize(&rgb, width, height, FilterType::Triangle)
    };

    let mut data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100));
    encoder.encode(rgb.as_raw(), width, height, ColorType::Rgb8)?;

    Ok(ImageData::jpeg(data, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])))
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        assert_eq!(fit_within(1920, 1080, 768), (768, 432));
        assert_eq!(fit_within(1080, 1920, 768), (432, 768));
        assert_eq!(fit_within(640, 360, 768), (640, 360));
        assert_eq!(fit_within(768, 768, 768), (768, 768));
    }

    #[test]
    fn test_fit_within_never_collapses_to_zero() {
        assert_eq!(fit_within(4000, 1, 100), (100, 1));
    }

    #[test]
    fn test_encode_frame_downscales() {
        let encoded = encode_frame(&solid(1280, 720), 512, 70).unwrap();
        assert_eq!((encoded.width, encoded.height), (512, 288));
        assert_eq!(encoded.mime_type, "image/jpeg");
        // JPEG SOI marker
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&encoded.data).unwrap();
        assert_eq!(decoded.dimensions(), (512, 288));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let noisy = DynamicImage::ImageRgb8(RgbImage::from_fn(256, 256, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        }));
        let high = encode_frame(&noisy, 256, 95).unwrap();
        let low = encode_frame(&noisy, 256, 20).unwrap();
        assert!(low.len() < high.len());
    }
}
