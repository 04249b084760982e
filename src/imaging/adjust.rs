//! Adjustment stage: brightness → contrast → saturation.
//!
//! Each operator blends the image with a degenerate version of itself:
//! `out = base + factor · (in - base)`, where `factor = 1 + value/100`.
//!
//! | Operator | Degenerate base |
//! |---|---|
//! | Brightness | black |
//! | Contrast | mid-gray (128) |
//! | Saturation | the pixel's own luminance |
//!
//! Alpha is never touched.

use super::filters::luma;
use super::mode;
use crate::options::Adjustment;
use image::DynamicImage;

/// Apply the three adjustments in order, skipping zero values.
pub fn apply(
    img: DynamicImage,
    brightness: Adjustment,
    contrast: Adjustment,
    saturation: Adjustment,
) -> DynamicImage {
    if brightness.is_identity() && contrast.is_identity() && saturation.is_identity() {
        return img;
    }
    let mut img = mode::ensure_color(img);
    if !brightness.is_identity() {
        tracing::debug!(value = brightness.value(), "brightness");
        img = adjust_brightness(img, brightness.factor());
    }
    if !contrast.is_identity() {
        tracing::debug!(value = contrast.value(), "contrast");
        img = adjust_contrast(img, contrast.factor());
    }
    if !saturation.is_identity() {
        tracing::debug!(value = saturation.value(), "saturation");
        img = adjust_saturation(img, saturation.factor());
    }
    img
}

pub fn adjust_brightness(img: DynamicImage, factor: f32) -> DynamicImage {
    map_rgb(img, |[r, g, b]| {
        [blend(0.0, r, factor), blend(0.0, g, factor), blend(0.0, b, factor)]
    })
}

/// Pivot of the contrast operator.
const MID_GRAY: f32 = 128.0;

pub fn adjust_contrast(img: DynamicImage, factor: f32) -> DynamicImage {
    map_rgb(img, |[r, g, b]| {
        [
            blend(MID_GRAY, r, factor),
            blend(MID_GRAY, g, factor),
            blend(MID_GRAY, b, factor),
        ]
    })
}

pub fn adjust_saturation(img: DynamicImage, factor: f32) -> DynamicImage {
    map_rgb(img, |[r, g, b]| {
        let gray = f32::from(luma(r, g, b));
        [blend(gray, r, factor), blend(gray, g, factor), blend(gray, b, factor)]
    })
}

fn blend(base: f32, sample: u8, factor: f32) -> u8 {
    (base + factor * (f32::from(sample) - base))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Rewrite the RGB samples of an 8-bit color buffer, carrying alpha through.
/// Buffers without color channels are returned unchanged.
pub(crate) fn map_rgb(img: DynamicImage, f: impl Fn([u8; 3]) -> [u8; 3]) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(mut buf) => {
            for px in buf.pixels_mut() {
                px.0 = f(px.0);
            }
            DynamicImage::ImageRgb8(buf)
        }
        DynamicImage::ImageRgba8(mut buf) => {
            for px in buf.pixels_mut() {
                let [r, g, b, a] = px.0;
                let [r, g, b] = f([r, g, b]);
                px.0 = [r, g, b, a];
            }
            DynamicImage::ImageRgba8(buf)
        }
        other => other,
    }
}
