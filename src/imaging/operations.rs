//! High-level image operations.
//!
//! [`transform`] is the whole pixel pipeline with no I/O: bytes in, encoded
//! derivative out. Stage order is fixed:
//!
//! ```text
//! decode → normalize → crop → resize → rotate/flip → filter → adjust → encode
//! ```

use super::codec::{self, DecodeLimits, ImagingError};
use super::mode::{self, ChannelLayout};
use super::{adjust, filters, geometry};
use crate::options::ProcessingOptions;
use image::DynamicImage;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// An encoded derivative plus what it was encoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// Channel layout of the buffer handed to the encoder.
    pub layout: ChannelLayout,
}

/// Decode, run every stage, encode.
pub fn transform(
    bytes: &[u8],
    options: &ProcessingOptions,
    limits: &DecodeLimits,
) -> Result<EncodedImage> {
    let img = codec::decode(bytes, limits)?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded"
    );

    let img = render(img, options);
    let format = options.format();
    let layout = ChannelLayout::of(&img);
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        ?layout,
        %format,
        "encoding"
    );

    let bytes = codec::encode(&img, format, options.quality())?;
    Ok(EncodedImage {
        bytes,
        content_type: format.content_type(),
        width: img.width(),
        height: img.height(),
        layout,
    })
}

/// Every pixel stage between decode and encode.
pub fn render(img: DynamicImage, options: &ProcessingOptions) -> DynamicImage {
    let format = options.format();
    let img = mode::normalize(img, format);
    let img = geometry::apply(img, options);
    let img = filters::apply(img, options.filter(), format);
    adjust::apply(
        img,
        options.brightness(),
        options.contrast(),
        options.saturation(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        decode_output, encode_fixture, gradient_rgb, jpeg_fixture, options_from_json,
        png_rgba_fixture,
    };
    use image::{GenericImageView, ImageFormat};

    fn run(bytes: &[u8], json: &str) -> EncodedImage {
        transform(bytes, &options_from_json(json), &DecodeLimits::default()).unwrap()
    }

    // =========================================================================
    // End-to-end scenarios
    // =========================================================================

    #[test]
    fn medium_preset_contains() {
        let out = run(&jpeg_fixture(1000, 800), r#"{"preset": "medium"}"#);
        assert_eq!((out.width, out.height), (800, 640));
        assert_eq!(decode_output(&out.bytes).dimensions(), (800, 640));
        assert_eq!(out.content_type, "image/jpeg");
    }

    #[test]
    fn width_only_derives_height() {
        let out = run(&jpeg_fixture(1000, 500), r#"{"width": 400}"#);
        assert_eq!((out.width, out.height), (400, 200));
    }

    #[test]
    fn stretch_ignores_aspect() {
        let out = run(
            &jpeg_fixture(1000, 500),
            r#"{"width": 400, "height": 300, "maintain_aspect": false}"#,
        );
        assert_eq!((out.width, out.height), (400, 300));
    }

    #[test]
    fn crop_window() {
        let out = run(
            &jpeg_fixture(100, 100),
            r#"{"crop_x": 10, "crop_y": 10, "crop_width": 50, "crop_height": 50, "format": "png"}"#,
        );
        assert_eq!((out.width, out.height), (50, 50));
    }

    #[test]
    fn rotate_quarter_turn_swaps_canvas() {
        let out = run(&jpeg_fixture(100, 50), r#"{"rotate": 90}"#);
        assert_eq!((out.width, out.height), (50, 100));
    }

    #[test]
    fn rotation_identity() {
        let source = encode_fixture(&gradient_rgb(30, 20), ImageFormat::Png);
        let plain = run(&source, r#"{"format": "png"}"#);
        let zero = run(&source, r#"{"format": "png", "rotate": 0}"#);
        let full = run(&source, r#"{"format": "png", "rotate": 360}"#);
        assert_eq!(plain.bytes, zero.bytes);
        assert_eq!(plain.bytes, full.bytes);
    }

    // =========================================================================
    // Codec alpha law
    // =========================================================================

    #[test]
    fn jpeg_source_to_png_gains_alpha() {
        let out = run(&jpeg_fixture(20, 10), r#"{"format": "png"}"#);
        assert_eq!(out.layout, ChannelLayout::Rgba);
        assert_eq!(out.content_type, "image/png");
        assert!(decode_output(&out.bytes).color().has_alpha());
    }

    #[test]
    fn alpha_source_to_jpeg_loses_alpha() {
        let out = run(&png_rgba_fixture(20, 10), r#"{"format": "jpeg"}"#);
        assert!(!out.layout.has_alpha());
        assert!(!decode_output(&out.bytes).color().has_alpha());
    }

    #[test]
    fn alpha_law_holds_for_every_filter() {
        for filter in ["none", "grayscale", "sepia", "blur", "sharpen", "contour", "emboss"] {
            let png = run(
                &jpeg_fixture(16, 16),
                &format!(r#"{{"format": "png", "filter": "{filter}", "saturation": 20}}"#),
            );
            assert!(
                decode_output(&png.bytes).color().has_alpha(),
                "png/{filter} lost alpha"
            );

            let jpeg = run(
                &png_rgba_fixture(16, 16),
                &format!(r#"{{"format": "jpeg", "filter": "{filter}", "brightness": 10}}"#),
            );
            assert!(
                !decode_output(&jpeg.bytes).color().has_alpha(),
                "jpeg/{filter} gained alpha"
            );
        }
    }

    #[test]
    fn webp_keeps_source_alpha() {
        let out = run(&png_rgba_fixture(20, 10), r#"{"format": "webp", "quality": 70}"#);
        assert_eq!(out.content_type, "image/webp");
        assert!(decode_output(&out.bytes).color().has_alpha());
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn undecodable_source_is_decode_error() {
        let err = transform(
            b"\x00\x01\x02",
            &ProcessingOptions::default(),
            &DecodeLimits::default(),
        )
        .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn encoder_rejection_surfaces_as_encode_error() {
        let wide = encode_fixture(
            &DynamicImage::ImageRgb8(image::RgbImage::new(20_000, 1)),
            ImageFormat::Png,
        );
        let limits = DecodeLimits {
            max_dimension: 20_000,
        };
        let err = transform(&wide, &options_from_json(r#"{"format": "webp"}"#), &limits)
            .unwrap_err();
        assert!(matches!(err, ImagingError::Encode(_)));
    }
}
