//! Pixel-format resolution.
//!
//! Every channel-layout decision in the pipeline lives here so the invariants
//! can be audited in one place:
//!
//! 1. [`normalize`] runs once, right after decode, and resolves the buffer
//!    against the *output* codec: JPEG never carries alpha, PNG always does,
//!    WebP keeps whatever the source had.
//! 2. [`after_grayscale`] is the single re-check, run by the grayscale filter.
//! 3. [`ensure_color`] is the precondition of the color-math stages (sepia and
//!    the enhancement operators), which need RGB channels to act on.
//!
//! All resolved buffers are 8 bits per channel. The `image` crate expands
//! palette-indexed sources during decode, so an indexed source reaches this
//! module as RGB or RGBA and falls under the alpha rule.

use crate::options::OutputFormat;
use image::{DynamicImage, GrayAlphaImage};

/// Channel layout of an 8-bit pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Rgb,
    Rgba,
    Gray,
    GrayAlpha,
}

impl ChannelLayout {
    pub fn of(img: &DynamicImage) -> Self {
        let color = img.color();
        match (color.has_color(), color.has_alpha()) {
            (true, false) => ChannelLayout::Rgb,
            (true, true) => ChannelLayout::Rgba,
            (false, false) => ChannelLayout::Gray,
            (false, true) => ChannelLayout::GrayAlpha,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, ChannelLayout::Rgba | ChannelLayout::GrayAlpha)
    }

    /// Number of non-alpha channels.
    pub fn color_channels(self) -> usize {
        match self {
            ChannelLayout::Rgb | ChannelLayout::Rgba => 3,
            ChannelLayout::Gray | ChannelLayout::GrayAlpha => 1,
        }
    }
}

fn into_rgb8(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn into_rgba8(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgba8(_) => img,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    }
}

fn into_luma8(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) => img,
        other => DynamicImage::ImageLuma8(other.to_luma8()),
    }
}

/// Resolve a freshly decoded buffer against the output codec.
///
/// | Output | Source has alpha | Source lacks alpha |
/// |---|---|---|
/// | JPEG | RGB (alpha dropped, not composited) | RGB, or gray if the source is gray |
/// | PNG | RGBA | RGBA with opaque alpha |
/// | WebP | RGBA | RGB, or gray if the source is gray |
pub fn normalize(img: DynamicImage, format: OutputFormat) -> DynamicImage {
    let color = img.color();
    match format {
        OutputFormat::Png => into_rgba8(img),
        OutputFormat::Jpeg if color.has_alpha() || color.has_color() => into_rgb8(img),
        OutputFormat::Webp if color.has_alpha() => into_rgba8(img),
        OutputFormat::Webp if color.has_color() => into_rgb8(img),
        OutputFormat::Jpeg | OutputFormat::Webp => into_luma8(img),
    }
}

/// Re-check after desaturation.
///
/// Only PNG keeps the single luminance channel (with its alpha, so PNG output
/// still carries one). Every other codec gets the gray values replicated back
/// into three RGB channels so later stages see a uniform channel count.
pub fn after_grayscale(gray: GrayAlphaImage, format: OutputFormat) -> DynamicImage {
    let gray = DynamicImage::ImageLumaA8(gray);
    match format {
        OutputFormat::Png => gray,
        OutputFormat::Jpeg | OutputFormat::Webp => into_rgb8(gray),
    }
}

/// Make sure the buffer has color channels, keeping alpha if present.
pub fn ensure_color(img: DynamicImage) -> DynamicImage {
    match ChannelLayout::of(&img) {
        ChannelLayout::Rgb => into_rgb8(img),
        ChannelLayout::Rgba => into_rgba8(img),
        ChannelLayout::Gray => into_rgb8(img),
        ChannelLayout::GrayAlpha => into_rgba8(img),
    }
}
