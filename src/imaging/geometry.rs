//! Geometric stage: crop, then resize, then rotate/flip.
//!
//! | Step | Implementation |
//! |---|---|
//! | Crop | `DynamicImage::crop_imm` on the clipped rectangle |
//! | Resize | `resize_exact` with `Lanczos3`, target from [`ResizePlan`] |
//! | Quarter turns | `rotate90` / `rotate180` / `rotate270` (lossless) |
//! | Other angles | `imageproc` projective warp, bicubic, expanded canvas |
//! | Flips | `fliph`, then `flipv` |

use super::calculations::{ResizePlan, calculate_rotated_canvas, clip_crop};
use crate::options::{CropRect, ProcessingOptions};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use imageproc::definitions::{Clamp, Image};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

/// Run crop → resize → rotate/flip in that fixed order.
pub fn apply(img: DynamicImage, options: &ProcessingOptions) -> DynamicImage {
    let img = crop(img, options.crop());
    let img = resize(img, options);
    rotate_and_flip(
        img,
        options.rotate(),
        options.flip_horizontal(),
        options.flip_vertical(),
    )
}

/// Crop to `rect`, clipped to the buffer. Never fails.
pub fn crop(img: DynamicImage, rect: Option<CropRect>) -> DynamicImage {
    let Some(rect) = rect else {
        return img;
    };
    match clip_crop((img.width(), img.height()), rect) {
        Some((x, y, width, height)) => {
            if (x, y, width, height) == (0, 0, img.width(), img.height()) {
                return img;
            }
            tracing::debug!(x, y, width, height, "crop");
            img.crop_imm(x, y, width, height)
        }
        None => {
            tracing::warn!(
                crop_x = rect.x,
                crop_y = rect.y,
                width = img.width(),
                height = img.height(),
                "crop origin lies outside the image, skipping crop"
            );
            img
        }
    }
}

/// Resize according to the preset / aspect / stretch precedence.
pub fn resize(img: DynamicImage, options: &ProcessingOptions) -> DynamicImage {
    let source = (img.width(), img.height());
    let plan = ResizePlan::from_options(source, options);
    let (width, height) = plan.output_size(source);

    if (width, height) == source {
        return img;
    }
    tracing::debug!(?plan, from = ?source, to = ?(width, height), "resize");
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Rotate clockwise by `degrees`, then mirror left-right, then flip top-bottom.
pub fn rotate_and_flip(
    img: DynamicImage,
    degrees: u16,
    flip_horizontal: bool,
    flip_vertical: bool,
) -> DynamicImage {
    let mut img = rotate(img, degrees);
    if flip_horizontal {
        img = img.fliph();
    }
    if flip_vertical {
        img = img.flipv();
    }
    img
}

/// Rotate clockwise by `degrees`, expanding the canvas so no corner is cut.
///
/// `0` and `360` are identities. Uncovered corners are filled with black, or
/// with transparent black when the buffer has alpha.
pub fn rotate(img: DynamicImage, degrees: u16) -> DynamicImage {
    match degrees % 360 {
        0 => img,
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        other => {
            let degrees = f32::from(other);
            tracing::debug!(degrees, "rotate with expanded canvas");
            match img {
                DynamicImage::ImageRgb8(buf) => {
                    DynamicImage::ImageRgb8(rotate_expanded(&buf, degrees, Rgb([0, 0, 0])))
                }
                DynamicImage::ImageRgba8(buf) => {
                    DynamicImage::ImageRgba8(rotate_expanded(&buf, degrees, Rgba([0, 0, 0, 0])))
                }
                DynamicImage::ImageLuma8(buf) => {
                    DynamicImage::ImageLuma8(rotate_expanded(&buf, degrees, Luma([0])))
                }
                DynamicImage::ImageLumaA8(buf) => {
                    DynamicImage::ImageLumaA8(rotate_expanded(&buf, degrees, LumaA([0, 0])))
                }
                other => DynamicImage::ImageRgba8(rotate_expanded(
                    &other.to_rgba8(),
                    degrees,
                    Rgba([0, 0, 0, 0]),
                )),
            }
        }
    }
}

fn rotate_expanded<P>(image: &Image<P>, degrees: f32, fill: P) -> Image<P>
where
    P: Pixel + Send + Sync,
    <P as Pixel>::Subpixel: Into<f32> + Clamp<f32> + Send + Sync,
{
    let (w, h) = image.dimensions();
    let (new_w, new_h) = calculate_rotated_canvas((w, h), f64::from(degrees));

    // Move the source center to the origin, rotate, then move it to the
    // center of the expanded canvas.
    let projection = Projection::translate(new_w as f32 / 2.0, new_h as f32 / 2.0)
        * Projection::rotate(degrees.to_radians())
        * Projection::translate(-(w as f32) / 2.0, -(h as f32) / 2.0);

    let mut out: Image<P> = ImageBuffer::new(new_w, new_h);
    warp_into(image, &projection, Interpolation::Bicubic, fill, &mut out);
    out
}
