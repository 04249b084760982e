//! Decoder and encoder.
//!
//! | Codec | Encoder | Quality | Size pass |
//! |---|---|---|---|
//! | JPEG | `JpegEncoder::new_with_quality` | yes | none available in this encoder |
//! | PNG | `PngEncoder::new_with_quality` | ignored | `CompressionType::Best` + adaptive filtering |
//! | WebP | `WebPEncoder::new_lossless` after quality-driven quantization | yes | none |
//!
//! The `image` crate only ships a lossless WebP encoder. Lossy output is
//! produced by snapping color samples onto a quality-dependent grid before the
//! lossless encode, which keeps alpha intact and lets lower qualities compress
//! further. Quality 100 skips quantization.

use super::mode::ChannelLayout;
use crate::options::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageReader, Limits};
use std::io::Cursor;
use thiserror::Error;

/// Per-axis decode cap used when nothing else is configured.
pub const DEFAULT_MAX_SOURCE_DIMENSION: u32 = 16384;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("source is {width}x{height}, larger than the {max}px limit")]
    SourceTooLarge { width: u32, height: u32, max: u32 },
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ImagingError {
    /// True for every failure that happens before a pixel buffer exists.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            ImagingError::Decode(_) | ImagingError::SourceTooLarge { .. }
        )
    }
}

/// Source-size guard applied before any pixel allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_dimension: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_SOURCE_DIMENSION,
        }
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, ImagingError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ImagingError::Decode("unrecognized image format".into()));
    }
    Ok(reader)
}

/// Decode `bytes` into a pixel buffer.
///
/// The format is sniffed from the content, never from a file name. The header
/// is read first so oversized sources are rejected before the decoder
/// allocates; the decode itself then runs under the same limits. Animated
/// GIFs yield their first frame.
pub fn decode(bytes: &[u8], limits: &DecodeLimits) -> Result<DynamicImage, ImagingError> {
    let max = limits.max_dimension;
    let (width, height) = reader(bytes)?
        .into_dimensions()
        .map_err(|e| ImagingError::Decode(e.to_string()))?;
    if width > max || height > max {
        return Err(ImagingError::SourceTooLarge { width, height, max });
    }

    let mut image_limits = Limits::default();
    image_limits.max_image_width = Some(max);
    image_limits.max_image_height = Some(max);

    let mut reader = reader(bytes)?;
    reader.limits(image_limits);
    reader
        .decode()
        .map_err(|e| ImagingError::Decode(e.to_string()))
}

/// Serialize `img` with the codec selected by `format`.
pub fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, ImagingError> {
    let mut out = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, quality.value());
            img.write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            img.write_with_encoder(encoder)
        }
        OutputFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut out);
            if quality.value() >= 100 {
                img.write_with_encoder(encoder)
            } else {
                let mut quantized = img.clone();
                quantize_for_webp(&mut quantized, quality.value());
                quantized.write_with_encoder(encoder)
            }
        }
    };
    result.map_err(|e| ImagingError::Encode(format!("{format}: {e}")))?;
    Ok(out)
}

/// Snap color samples to `webp_levels(quality)` evenly spaced values.
/// Alpha is left exact.
fn quantize_for_webp(img: &mut DynamicImage, quality: u8) {
    let layout = ChannelLayout::of(img);
    let (stride, colors) = (
        layout.color_channels() + usize::from(layout.has_alpha()),
        layout.color_channels(),
    );
    let step = 255.0 / (f32::from(webp_levels(quality)) - 1.0);

    let samples: &mut [u8] = match img {
        DynamicImage::ImageRgb8(buf) => buf,
        DynamicImage::ImageRgba8(buf) => buf,
        DynamicImage::ImageLuma8(buf) => buf,
        DynamicImage::ImageLumaA8(buf) => buf,
        // Wider buffers never reach the encoder; the normalizer resolves to 8 bits.
        _ => return,
    };
    for pixel in samples.chunks_exact_mut(stride) {
        for sample in pixel.iter_mut().take(colors) {
            let bucket = (f32::from(*sample) / step).round();
            *sample = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Number of distinct values per channel: 2 at quality 1, 256 at quality 100,
/// growing quadratically so high qualities stay close to lossless.
fn webp_levels(quality: u8) -> u16 {
    if quality >= 100 {
        return 256;
    }
    let normalized = f32::from(quality.clamp(1, 100)) / 100.0;
    let levels = 2.0 + normalized * normalized * 254.0;
    levels.round().clamp(2.0, 256.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_fixture, gradient_rgb};
    use image::{ColorType, GenericImageView, ImageFormat, Rgba, RgbaImage};

    fn q(value: u32) -> Quality {
        Quality::new(value).unwrap()
    }

    fn sample_rgba() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(8, 8, |x, y| {
            Rgba([(x * 30) as u8, (y * 30) as u8, 90, if x == 0 { 0 } else { 255 }])
        }))
    }

    // =========================================================================
    // Decode
    // =========================================================================

    #[test]
    fn decode_sniffs_format_from_content() {
        let bytes = encode_fixture(&gradient_rgb(12, 7), ImageFormat::Png);
        let img = decode(&bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(img.dimensions(), (12, 7));
    }

    #[test]
    fn decode_accepts_gif_and_tiff() {
        for format in [ImageFormat::Gif, ImageFormat::Tiff] {
            let source = DynamicImage::ImageRgba8(gradient_rgb(5, 4).to_rgba8());
            let bytes = encode_fixture(&source, format);
            let img = decode(&bytes, &DecodeLimits::default()).unwrap();
            assert_eq!(img.dimensions(), (5, 4), "{format:?}");
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode(b"definitely not an image", &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
        assert!(err.is_decode());
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let bytes = encode_fixture(&gradient_rgb(64, 64), ImageFormat::Png);
        let err = decode(&bytes[..bytes.len() / 2], &DecodeLimits::default()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn decode_guard_rejects_oversized_source() {
        let bytes = encode_fixture(&gradient_rgb(40, 10), ImageFormat::Png);
        let limits = DecodeLimits { max_dimension: 32 };
        match decode(&bytes, &limits).unwrap_err() {
            ImagingError::SourceTooLarge { width, height, max } => {
                assert_eq!((width, height, max), (40, 10, 32));
            }
            other => panic!("expected SourceTooLarge, got {other:?}"),
        }
    }

    // =========================================================================
    // Encode
    // =========================================================================

    #[test]
    fn jpeg_output_has_no_alpha() {
        let rgb = DynamicImage::ImageRgb8(sample_rgba().to_rgb8());
        let bytes = encode(&rgb, OutputFormat::Jpeg, q(85)).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = image::load_from_memory(&bytes).unwrap();
        assert!(!back.color().has_alpha());
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let img = gradient_rgb(64, 64);
        let low = encode(&img, OutputFormat::Jpeg, q(10)).unwrap();
        let high = encode(&img, OutputFormat::Jpeg, q(95)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn png_keeps_alpha_and_ignores_quality() {
        let img = sample_rgba();
        let a = encode(&img, OutputFormat::Png, q(1)).unwrap();
        let b = encode(&img, OutputFormat::Png, q(100)).unwrap();
        assert_eq!(a, b);
        let back = image::load_from_memory(&a).unwrap();
        assert_eq!(back.color(), ColorType::Rgba8);
        assert_eq!(back.to_rgba8(), img.to_rgba8());
    }

    #[test]
    fn webp_container_and_alpha() {
        let bytes = encode(&sample_rgba(), OutputFormat::Webp, q(80)).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
        let back = image::load_from_memory(&bytes).unwrap();
        assert!(back.color().has_alpha());
        assert_eq!(back.to_rgba8().get_pixel(0, 3)[3], 0);
    }

    #[test]
    fn webp_quality_100_is_lossless() {
        let img = sample_rgba();
        let bytes = encode(&img, OutputFormat::Webp, q(100)).unwrap();
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!(back.to_rgba8(), img.to_rgba8());
    }

    #[test]
    fn webp_rejects_canvas_beyond_codec_limit() {
        let wide = DynamicImage::ImageRgb8(image::RgbImage::new(20_000, 1));
        let err = encode(&wide, OutputFormat::Webp, q(80)).unwrap_err();
        assert!(matches!(err, ImagingError::Encode(_)));
        assert!(!err.is_decode());
    }

    // =========================================================================
    // WebP quantization
    // =========================================================================

    #[test]
    fn webp_levels_range() {
        assert_eq!(webp_levels(1), 2);
        assert_eq!(webp_levels(50), 66);
        assert_eq!(webp_levels(99), 251);
        assert_eq!(webp_levels(100), 256);
    }

    #[test]
    fn quantize_leaves_alpha_exact() {
        let mut img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([100, 101, 102, 77])));
        quantize_for_webp(&mut img, 1);
        // Two levels: every color sample snaps to 0 or 255
        let px = img.to_rgba8().get_pixel(0, 0).0;
        assert_eq!(px, [0, 0, 0, 77]);
    }
}
