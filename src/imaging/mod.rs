//! Image processing: pure Rust, no I/O.
//!
//! | Stage | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed, size-guarded) |
//! | **Normalize** | [`mode::normalize`] resolves channels against the output codec |
//! | **Crop / resize / flip** | `image` (`crop_imm`, `resize_exact` Lanczos3, `fliph`/`flipv`) |
//! | **Rotate** | `image` quarter turns; `imageproc` warp for other angles |
//! | **Filter** | grayscale, sepia, Gaussian blur, 3×3 kernels |
//! | **Adjust** | brightness, contrast, saturation |
//! | **Encode** | JPEG, PNG, WebP via `image::codecs` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Mode**: every channel-layout decision
//! - **Geometry / Filters / Adjust**: the pixel stages, each `DynamicImage → DynamicImage`
//! - **Codec**: decoder and per-codec encoders
//! - **Operations**: [`transform`], the stages chained in their fixed order

mod adjust;
mod calculations;
pub mod codec;
mod filters;
mod geometry;
pub mod mode;
pub mod operations;

pub use calculations::{calculate_contain_dimensions, calculate_rotated_canvas};
pub use codec::{DecodeLimits, ImagingError};
pub use mode::ChannelLayout;
pub use operations::{EncodedImage, transform};
