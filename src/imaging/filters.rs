//! Filter stage. Exactly one [`Filter`] applies per invocation.
//!
//! The convolution filters use the classic 3×3 kernels (the same coefficients
//! common image editors ship as "sharpen", "contour" and "emboss"). Each
//! output sample is `sum(kernel · window) / scale + offset`, rounded and
//! clamped. Border pixels are copied through unfiltered and alpha is never
//! convolved.

use super::adjust::map_rgb;
use super::mode::{self, ChannelLayout};
use crate::options::{Filter, OutputFormat};
use image::{DynamicImage, GrayAlphaImage, ImageBuffer, LumaA, Pixel};

/// Gaussian sigma of the `blur` filter.
pub const BLUR_RADIUS: f32 = 2.0;

/// A 3×3 kernel, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    pub weights: [i32; 9],
    pub scale: i32,
    pub offset: i32,
}

impl Kernel {
    pub const SHARPEN: Kernel = Kernel {
        weights: [-2, -2, -2, -2, 32, -2, -2, -2, -2],
        scale: 16,
        offset: 0,
    };

    pub const CONTOUR: Kernel = Kernel {
        weights: [-1, -1, -1, -1, 8, -1, -1, -1, -1],
        scale: 1,
        offset: 255,
    };

    pub const EMBOSS: Kernel = Kernel {
        weights: [-1, 0, 0, 0, 1, 0, 0, 0, 0],
        scale: 1,
        offset: 128,
    };
}

/// Apply `filter`. `format` is needed for the grayscale re-check.
pub fn apply(img: DynamicImage, filter: Filter, format: OutputFormat) -> DynamicImage {
    if filter != Filter::None {
        tracing::debug!(%filter, "filter");
    }
    match filter {
        Filter::None => img,
        Filter::Grayscale => grayscale(&img, format),
        Filter::Sepia => sepia(img),
        Filter::Blur => img.blur(BLUR_RADIUS),
        Filter::Sharpen => convolve(img, &Kernel::SHARPEN),
        Filter::Contour => convolve(img, &Kernel::CONTOUR),
        Filter::Emboss => convolve(img, &Kernel::EMBOSS),
    }
}

/// ITU-R 601 luma, rounded.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114;
    ((weighted + 500) / 1000) as u8
}

/// Desaturate, then hand the luminance buffer to the mode re-check.
pub fn grayscale(img: &DynamicImage, format: OutputFormat) -> DynamicImage {
    let rgba = img.to_rgba8();
    let gray = GrayAlphaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        LumaA([luma(r, g, b), a])
    });
    mode::after_grayscale(gray, format)
}

/// Warm-tone matrix applied to every pixel; alpha is kept.
pub fn sepia(img: DynamicImage) -> DynamicImage {
    map_rgb(mode::ensure_color(img), sepia_tone)
}

fn sepia_tone([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let tone = |kr: f32, kg: f32, kb: f32| (kr * r + kg * g + kb * b).clamp(0.0, 255.0) as u8;
    [
        tone(0.393, 0.769, 0.189),
        tone(0.349, 0.686, 0.168),
        tone(0.272, 0.534, 0.131),
    ]
}

/// Run a 3×3 kernel over the color channels of `img`.
pub fn convolve(img: DynamicImage, kernel: &Kernel) -> DynamicImage {
    let colors = ChannelLayout::of(&img).color_channels();
    match img {
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(convolve_buffer(&buf, kernel, colors)),
        DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(convolve_buffer(&buf, kernel, colors)),
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(convolve_buffer(&buf, kernel, colors)),
        DynamicImage::ImageLumaA8(buf) => DynamicImage::ImageLumaA8(convolve_buffer(&buf, kernel, colors)),
        other => {
            let buf = other.to_rgba8();
            DynamicImage::ImageRgba8(convolve_buffer(&buf, kernel, 3))
        }
    }
}

fn convolve_buffer<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    kernel: &Kernel,
    colors: usize,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = src.dimensions();
    let mut out = src.clone();
    if width < 3 || height < 3 {
        return out;
    }

    let stride = usize::from(P::CHANNEL_COUNT);
    let row = width as usize * stride;
    let input = src.as_raw();
    let scale = kernel.scale as f32;
    let offset = kernel.offset as f32;

    for y in 1..height as usize - 1 {
        for x in 1..width as usize - 1 {
            for c in 0..colors {
                let mut sum = 0i32;
                for (i, weight) in kernel.weights.iter().enumerate() {
                    let sy = y + i / 3 - 1;
                    let sx = x + i % 3 - 1;
                    sum += weight * i32::from(input[sy * row + sx * stride + c]);
                }
                let value = (sum as f32 / scale + offset).round().clamp(0.0, 255.0);
                out[(x as u32, y as u32)].channels_mut()[c] = value as u8;
            }
        }
    }
    out
}
