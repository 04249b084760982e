//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! The geometric stage asks these for target sizes and only then touches
//! pixels.

use crate::options::{CropRect, ProcessingOptions};

/// How the resize step will change the buffer, decided from the options and
/// the current dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// No size fields were given.
    Keep,
    /// Shrink to fit inside `bounds`, preserving aspect ratio, never upscaling.
    Contain { bounds: (u32, u32) },
    /// Resize to exactly `size`, ignoring aspect ratio.
    Stretch { size: (u32, u32) },
}

impl ResizePlan {
    /// Decide the resize strategy. Precedence: preset, then aspect-preserving
    /// width/height, then stretch, then nothing.
    pub fn from_options(source: (u32, u32), options: &ProcessingOptions) -> Self {
        let (src_w, src_h) = source;

        if let Some(preset) = options.preset() {
            return ResizePlan::Contain {
                bounds: preset.bounding_box(),
            };
        }

        match (options.width(), options.height()) {
            (None, None) => ResizePlan::Keep,
            (width, height) if !options.maintain_aspect() => ResizePlan::Stretch {
                size: (width.unwrap_or(src_w), height.unwrap_or(src_h)),
            },
            (Some(w), Some(h)) => ResizePlan::Contain { bounds: (w, h) },
            (Some(w), None) => ResizePlan::Contain {
                bounds: (w, scaled_edge(w, src_h, src_w)),
            },
            (None, Some(h)) => ResizePlan::Contain {
                bounds: (scaled_edge(h, src_w, src_h), h),
            },
        }
    }

    /// Final buffer dimensions after executing this plan on `source`.
    pub fn output_size(self, source: (u32, u32)) -> (u32, u32) {
        match self {
            ResizePlan::Keep => source,
            ResizePlan::Contain { bounds } => calculate_contain_dimensions(source, bounds),
            ResizePlan::Stretch { size } => size,
        }
    }
}

/// `round(edge * numerator / denominator)`, ties to even, at least 1.
fn scaled_edge(edge: u32, numerator: u32, denominator: u32) -> u32 {
    let value = f64::from(edge) * f64::from(numerator) / f64::from(denominator.max(1));
    (value.round_ties_even() as u32).max(1)
}

/// Pick the floor or ceiling of `value`, whichever keeps `error` smaller
/// (floor wins ties), and never return less than 1.
fn round_aspect(value: f64, error: impl Fn(f64) -> f64) -> u32 {
    let (floor, ceil) = (value.floor(), value.ceil());
    let chosen = if error(ceil) < error(floor) { ceil } else { floor };
    (chosen as u32).max(1)
}

/// Calculate the containment size of `source` inside `bounds`.
///
/// Returns the largest size that fits entirely within the box while keeping
/// the source aspect ratio. Sources that already fit are returned unchanged,
/// so this never upscales. At least one axis of the result touches the box
/// whenever the source had to shrink.
///
/// # Examples
/// ```
/// # use pixelscale::imaging::calculate_contain_dimensions;
/// // 1000x800 into the 800x800 "medium" box
/// assert_eq!(calculate_contain_dimensions((1000, 800), (800, 800)), (800, 640));
///
/// // Already fits: unchanged
/// assert_eq!(calculate_contain_dimensions((640, 480), (800, 800)), (640, 480));
/// ```
pub fn calculate_contain_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (box_w, box_h) = bounds;

    if src_w == 0 || src_h == 0 || (box_w >= src_w && box_h >= src_h) {
        return source;
    }

    let aspect = f64::from(src_w) / f64::from(src_h);
    let (x, y) = (f64::from(box_w), f64::from(box_h.max(1)));

    if x / y >= aspect {
        // Box is relatively wider: height is the limiting edge
        let w = round_aspect(y * aspect, |n| (aspect - n / y).abs());
        (w, box_h)
    } else {
        // Box is relatively taller: width is the limiting edge
        let h = round_aspect(x / aspect, |n| {
            if n == 0.0 { 0.0 } else { (aspect - x / n).abs() }
        });
        (box_w, h)
    }
}

/// Clip a crop rectangle to the buffer.
///
/// Right and bottom edges are clamped to the buffer size. Returns
/// `(x, y, width, height)` of the effective region, or `None` when nothing of
/// the rectangle overlaps the buffer.
pub fn clip_crop(buffer: (u32, u32), crop: CropRect) -> Option<(u32, u32, u32, u32)> {
    let (buf_w, buf_h) = buffer;

    let left = crop.x.min(buf_w);
    let top = crop.y.min(buf_h);
    let right = crop.x.saturating_add(crop.width).min(buf_w);
    let bottom = crop.y.saturating_add(crop.height).min(buf_h);

    let width = right.saturating_sub(left);
    let height = bottom.saturating_sub(top);
    if width == 0 || height == 0 {
        return None;
    }
    Some((left, top, width, height))
}

/// Canvas size needed to hold `source` rotated by `degrees` without clipping
/// any corner.
///
/// Quarter turns swap or keep the dimensions exactly. Other angles rotate the
/// four corners about the center and take the integer hull of the result.
pub fn calculate_rotated_canvas(source: (u32, u32), degrees: f64) -> (u32, u32) {
    let (w, h) = source;
    let normalized = degrees.rem_euclid(360.0);

    if normalized == 0.0 || normalized == 180.0 {
        return (w, h);
    }
    if normalized == 90.0 || normalized == 270.0 {
        return (h, w);
    }

    let (sin, cos) = normalized.to_radians().sin_cos();
    let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
    let corners = [(0.0, 0.0), (f64::from(w), 0.0), (f64::from(w), f64::from(h)), (0.0, f64::from(h))];

    let (mut min_x, mut max_x, mut min_y, mut max_y) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for (x, y) in corners {
        let (dx, dy) = (x - cx, y - cy);
        let rx = dx * cos - dy * sin;
        let ry = dx * sin + dy * cos;
        min_x = min_x.min(rx);
        max_x = max_x.max(rx);
        min_y = min_y.min(ry);
        max_y = max_y.max(ry);
    }

    // Snap away float noise so e.g. 99.9999999 does not grow the canvas
    let snap = |v: f64| (v * 1e6).round() / 1e6;
    let new_w = (snap(max_x).ceil() - snap(min_x).floor()) as u32;
    let new_h = (snap(max_y).ceil() - snap(min_y).floor()) as u32;
    (new_w.max(1), new_h.max(1))
}
