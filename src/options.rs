//! Options model for a single transformation request.
//!
//! A request arrives as an [`OptionsSpec`]: plain, serde-friendly fields with
//! the same names the upload and reprocess endpoints accept. Converting it into
//! [`ProcessingOptions`] bounds-checks every field once; after that the value is
//! immutable and every stage can trust it.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 85).
//! - [`Adjustment`]: an enhancement delta (-100–100) and its multiplicative factor.
//! - [`Preset`]: named bounding boxes (`thumbnail` 150², `medium` 800², `large` 1920²).
//! - [`Filter`]: the single filter applied by the filter stage.
//! - [`OutputFormat`]: output codec, with its extension, content type and alpha support.
//! - [`CropRect`]: crop origin and extent, present only when all four fields are given.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest accepted target width or height.
pub const MAX_DIMENSION: u32 = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("unknown {field} '{value}' (expected one of: {expected})")]
    UnknownVariant {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), OptionsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(OptionsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Result<Self, OptionsError> {
        check_range("quality", i64::from(value), 1, 100)?;
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Enhancement delta in `-100..=100`.
///
/// The enhancement operators are multiplicative: `0` leaves the image alone,
/// `-100` collapses the property entirely and `100` doubles it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Adjustment(i8);

impl Adjustment {
    pub fn new(field: &'static str, value: i32) -> Result<Self, OptionsError> {
        check_range(field, i64::from(value), -100, 100)?;
        Ok(Self(value as i8))
    }

    pub fn value(self) -> i32 {
        i32::from(self.0)
    }

    pub fn is_identity(self) -> bool {
        self.0 == 0
    }

    /// `1 + value/100`, always within `[0, 2]`.
    pub fn factor(self) -> f32 {
        1.0 + f32::from(self.0) / 100.0
    }
}

/// Named bounding box for containment resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Thumbnail,
    Medium,
    Large,
}

impl Preset {
    pub fn bounding_box(self) -> (u32, u32) {
        match self {
            Preset::Thumbnail => (150, 150),
            Preset::Medium => (800, 800),
            Preset::Large => (1920, 1920),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Thumbnail => "thumbnail",
            Preset::Medium => "medium",
            Preset::Large => "large",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(Preset::Thumbnail),
            "medium" => Ok(Preset::Medium),
            "large" => Ok(Preset::Large),
            other => Err(OptionsError::UnknownVariant {
                field: "preset",
                value: other.to_string(),
                expected: "thumbnail, medium, large",
            }),
        }
    }
}

/// The single filter applied by the filter stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    None,
    Grayscale,
    Sepia,
    Blur,
    Sharpen,
    Contour,
    Emboss,
}

impl Filter {
    pub fn as_str(self) -> &'static str {
        match self {
            Filter::None => "none",
            Filter::Grayscale => "grayscale",
            Filter::Sepia => "sepia",
            Filter::Blur => "blur",
            Filter::Sharpen => "sharpen",
            Filter::Contour => "contour",
            Filter::Emboss => "emboss",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Filter::None),
            "grayscale" => Ok(Filter::Grayscale),
            "sepia" => Ok(Filter::Sepia),
            "blur" => Ok(Filter::Blur),
            "sharpen" => Ok(Filter::Sharpen),
            "contour" => Ok(Filter::Contour),
            "emboss" => Ok(Filter::Emboss),
            other => Err(OptionsError::UnknownVariant {
                field: "filter",
                value: other.to_string(),
                expected: "none, grayscale, sepia, blur, sharpen, contour, emboss",
            }),
        }
    }
}

/// Output codec.
///
/// | Format | Compression | Alpha | Quality |
/// |---|---|---|---|
/// | `Jpeg` | lossy | never | used |
/// | `Png` | lossless | always | ignored |
/// | `Webp` | lossy | kept when present | used |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// Canonical file extension, used in derivative keys.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(OptionsError::UnknownVariant {
                field: "format",
                value: other.to_string(),
                expected: "jpeg, png, webp",
            }),
        }
    }
}

/// Crop origin and extent in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Raw, unvalidated request fields.
///
/// Unknown keys are rejected so that typos surface as errors instead of being
/// silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub preset: Option<Preset>,
    pub maintain_aspect: bool,
    pub crop_x: Option<u32>,
    pub crop_y: Option<u32>,
    pub crop_width: Option<u32>,
    pub crop_height: Option<u32>,
    pub rotate: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub filter: Filter,
    pub brightness: i32,
    pub contrast: i32,
    pub saturation: i32,
    pub format: OutputFormat,
    pub quality: u32,
}

impl Default for OptionsSpec {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            preset: None,
            maintain_aspect: true,
            crop_x: None,
            crop_y: None,
            crop_width: None,
            crop_height: None,
            rotate: 0,
            flip_horizontal: false,
            flip_vertical: false,
            filter: Filter::None,
            brightness: 0,
            contrast: 0,
            saturation: 0,
            format: OutputFormat::Jpeg,
            quality: u32::from(Quality::default().value()),
        }
    }
}

impl OptionsSpec {
    /// Bounds-check every field and freeze the result.
    pub fn validate(self) -> Result<ProcessingOptions, OptionsError> {
        ProcessingOptions::try_from(self)
    }
}

/// Validated, immutable description of one transformation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OptionsSpec", into = "OptionsSpec")]
pub struct ProcessingOptions {
    width: Option<u32>,
    height: Option<u32>,
    preset: Option<Preset>,
    maintain_aspect: bool,
    crop: Option<CropRect>,
    // Partial crop fields are kept only so the options echo back unchanged.
    crop_fields: [Option<u32>; 4],
    rotate: u16,
    flip_horizontal: bool,
    flip_vertical: bool,
    filter: Filter,
    brightness: Adjustment,
    contrast: Adjustment,
    saturation: Adjustment,
    format: OutputFormat,
    quality: Quality,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            preset: None,
            maintain_aspect: true,
            crop: None,
            crop_fields: [None; 4],
            rotate: 0,
            flip_horizontal: false,
            flip_vertical: false,
            filter: Filter::None,
            brightness: Adjustment::default(),
            contrast: Adjustment::default(),
            saturation: Adjustment::default(),
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
        }
    }
}

impl TryFrom<OptionsSpec> for ProcessingOptions {
    type Error = OptionsError;

    fn try_from(spec: OptionsSpec) -> Result<Self, Self::Error> {
        let max = i64::from(MAX_DIMENSION);
        if let Some(w) = spec.width {
            check_range("width", i64::from(w), 1, max)?;
        }
        if let Some(h) = spec.height {
            check_range("height", i64::from(h), 1, max)?;
        }
        if let Some(w) = spec.crop_width {
            check_range("crop_width", i64::from(w), 1, i64::from(u32::MAX))?;
        }
        if let Some(h) = spec.crop_height {
            check_range("crop_height", i64::from(h), 1, i64::from(u32::MAX))?;
        }
        check_range("rotate", i64::from(spec.rotate), 0, 360)?;

        let crop = match (spec.crop_x, spec.crop_y, spec.crop_width, spec.crop_height) {
            (Some(x), Some(y), Some(width), Some(height)) => Some(CropRect {
                x,
                y,
                width,
                height,
            }),
            _ => None,
        };

        Ok(Self {
            width: spec.width,
            height: spec.height,
            preset: spec.preset,
            maintain_aspect: spec.maintain_aspect,
            crop,
            crop_fields: [spec.crop_x, spec.crop_y, spec.crop_width, spec.crop_height],
            rotate: spec.rotate as u16,
            flip_horizontal: spec.flip_horizontal,
            flip_vertical: spec.flip_vertical,
            filter: spec.filter,
            brightness: Adjustment::new("brightness", spec.brightness)?,
            contrast: Adjustment::new("contrast", spec.contrast)?,
            saturation: Adjustment::new("saturation", spec.saturation)?,
            format: spec.format,
            quality: Quality::new(spec.quality)?,
        })
    }
}

impl From<ProcessingOptions> for OptionsSpec {
    fn from(options: ProcessingOptions) -> Self {
        let [crop_x, crop_y, crop_width, crop_height] = options.crop_fields;
        Self {
            width: options.width,
            height: options.height,
            preset: options.preset,
            maintain_aspect: options.maintain_aspect,
            crop_x,
            crop_y,
            crop_width,
            crop_height,
            rotate: u32::from(options.rotate),
            flip_horizontal: options.flip_horizontal,
            flip_vertical: options.flip_vertical,
            filter: options.filter,
            brightness: options.brightness.value(),
            contrast: options.contrast.value(),
            saturation: options.saturation.value(),
            format: options.format,
            quality: u32::from(options.quality.value()),
        }
    }
}

impl ProcessingOptions {
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn preset(&self) -> Option<Preset> {
        self.preset
    }

    pub fn maintain_aspect(&self) -> bool {
        self.maintain_aspect
    }

    /// The crop rectangle, only when all four crop fields were given.
    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    /// Clockwise rotation in degrees, `0..=360`.
    pub fn rotate(&self) -> u16 {
        self.rotate
    }

    pub fn flip_horizontal(&self) -> bool {
        self.flip_horizontal
    }

    pub fn flip_vertical(&self) -> bool {
        self.flip_vertical
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn brightness(&self) -> Adjustment {
        self.brightness
    }

    pub fn contrast(&self) -> Adjustment {
        self.contrast
    }

    pub fn saturation(&self) -> Adjustment {
        self.saturation
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}
