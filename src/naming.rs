//! Derivative storage keys.
//!
//! A derivative lives at `processed/{size}/{stem}.{ext}`:
//! - `size` is the preset name, or `custom` when no preset was requested
//! - `stem` is the source key's file name without its extension
//! - `ext` is the output format's canonical extension
//!
//! The key depends on the *preset field only*. Two requests without a preset
//! but with different explicit dimensions both map to `custom` and the second
//! publish replaces the first. Quality, crop, rotation, filters and
//! adjustments never reach the key either.
//!
//! ```text
//! raw/a1b2c3.png + preset=thumbnail, format=webp → processed/thumbnail/a1b2c3.webp
//! raw/a1b2c3.png + width=400                     → processed/custom/a1b2c3.jpg
//! ```

use crate::options::{OutputFormat, Preset, ProcessingOptions};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Top-level prefix of every derivative key.
pub const PROCESSED_PREFIX: &str = "processed";

/// Size segment used when no preset is set.
pub const CUSTOM_SIZE: &str = "custom";

/// Parsed form of a derivative key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    /// `None` means the `custom` size segment.
    pub preset: Option<Preset>,
    pub stem: String,
    pub format: OutputFormat,
}

impl DerivativeKey {
    pub fn new(source_key: &str, options: &ProcessingOptions) -> Self {
        Self {
            preset: options.preset(),
            stem: source_stem(source_key).to_string(),
            format: options.format(),
        }
    }

    pub fn size_segment(&self) -> &'static str {
        self.preset.map_or(CUSTOM_SIZE, Preset::as_str)
    }
}

impl fmt::Display for DerivativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PROCESSED_PREFIX}/{}/{}.{}",
            self.size_segment(),
            self.stem,
            self.format.extension()
        )
    }
}

/// Error returned when a string is not a derivative key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyError(pub String);

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a derivative key: {}", self.0)
    }
}

impl std::error::Error for ParseKeyError {}

impl FromStr for DerivativeKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyError(s.to_string());
        let mut parts = s.splitn(3, '/');
        let (Some(PROCESSED_PREFIX), Some(size), Some(file)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(err());
        };
        let preset = match size {
            CUSTOM_SIZE => None,
            other => Some(other.parse::<Preset>().map_err(|_| err())?),
        };
        let (stem, ext) = file.rsplit_once('.').ok_or_else(err)?;
        if stem.contains('/') {
            return Err(err());
        }
        let format = ext.parse::<OutputFormat>().map_err(|_| err())?;
        if format.extension() != ext {
            return Err(err());
        }
        Ok(Self {
            preset,
            stem: stem.to_string(),
            format,
        })
    }
}

/// File name of `source_key` without its extension. Empty if there is none.
pub fn source_stem(source_key: &str) -> &str {
    Path::new(source_key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
}

/// Derivative key for `source_key` processed with `options`.
pub fn derivative_key(source_key: &str, options: &ProcessingOptions) -> String {
    DerivativeKey::new(source_key, options).to_string()
}
