//! Shared test utilities for the pixelscale test suite.
//!
//! Fixtures are synthetic images built in memory, so tests never depend on
//! files checked into the repository.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = jpeg_fixture(1000, 800);
//! let img = gradient_rgb(100, 50);
//! let options = options_from_json(r#"{"preset": "medium", "format": "png"}"#);
//! ```

use crate::options::ProcessingOptions;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

// =========================================================================
// Pixel buffers
// =========================================================================

/// RGB buffer whose every pixel is distinct enough to track through crops
/// and flips.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// RGBA buffer with a transparent left column.
pub fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x == 0 { 0 } else { 255 };
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, alpha])
    }))
}

/// Single-color RGB buffer.
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// Encode `img` as `format` with the `image` crate's default settings.
pub fn encode_fixture(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .unwrap_or_else(|e| panic!("failed to encode {format:?} fixture: {e}"));
    buf
}

/// A baseline JPEG of the given size.
pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_fixture(&gradient_rgb(width, height), ImageFormat::Jpeg)
}

/// A PNG with an alpha channel of the given size.
pub fn png_rgba_fixture(width: u32, height: u32) -> Vec<u8> {
    encode_fixture(&gradient_rgba(width, height), ImageFormat::Png)
}

// =========================================================================
// Options
// =========================================================================

/// Parse and validate options from the same JSON a request body would carry.
pub fn options_from_json(json: &str) -> ProcessingOptions {
    serde_json::from_str(json).unwrap_or_else(|e| panic!("invalid options {json}: {e}"))
}

/// Decode an output payload back into pixels.
pub fn decode_output(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory(bytes).unwrap_or_else(|e| panic!("output does not decode: {e}"))
}
