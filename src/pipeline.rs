//! Orchestrator: read → transform → key → publish.
//!
//! ```text
//! storage.read(raw)      StorageRead
//!   → decode             Decode
//!   → pixel stages       (infallible)
//!   → encode             Encode
//!   → derivative key     (pure)
//!   → storage.write      StorageWrite
//! ```
//!
//! Publishing is the only side effect and runs strictly last, so any failure
//! leaves the processed bucket untouched. Every abort is logged once, here,
//! with the failing stage and the source key. Nothing is retried.
//!
//! A [`Pipeline`] holds no mutable state. One instance can serve any number
//! of concurrent invocations as long as its storage handle is shareable,
//! which [`Storage`] requires.

use crate::config::PipelineConfig;
use crate::imaging::{self, ImagingError};
use crate::naming;
use crate::options::ProcessingOptions;
use crate::storage::{Storage, StorageError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage that can abort an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StorageRead,
    Decode,
    Encode,
    StorageWrite,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::StorageRead => "storage_read",
            Stage::Decode => "decode",
            Stage::Encode => "encode",
            Stage::StorageWrite => "storage_write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to read source {source_key}: {source}")]
    StorageRead {
        source_key: String,
        #[source]
        source: StorageError,
    },
    #[error("failed to decode {source_key}: {source}")]
    Decode {
        source_key: String,
        #[source]
        source: ImagingError,
    },
    #[error("failed to encode {source_key}: {source}")]
    Encode {
        source_key: String,
        #[source]
        source: ImagingError,
    },
    #[error("failed to store {key} for {source_key}: {source}")]
    StorageWrite {
        source_key: String,
        key: String,
        #[source]
        source: StorageError,
    },
}

impl ProcessError {
    pub fn stage(&self) -> Stage {
        match self {
            ProcessError::StorageRead { .. } => Stage::StorageRead,
            ProcessError::Decode { .. } => Stage::Decode,
            ProcessError::Encode { .. } => Stage::Encode,
            ProcessError::StorageWrite { .. } => Stage::StorageWrite,
        }
    }

    pub fn source_key(&self) -> &str {
        match self {
            ProcessError::StorageRead { source_key, .. }
            | ProcessError::Decode { source_key, .. }
            | ProcessError::Encode { source_key, .. }
            | ProcessError::StorageWrite { source_key, .. } => source_key,
        }
    }

    fn imaging(source_key: &str, source: ImagingError) -> Self {
        let source_key = source_key.to_string();
        if source.is_decode() {
            ProcessError::Decode { source_key, source }
        } else {
            ProcessError::Encode { source_key, source }
        }
    }
}

/// A published derivative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedResult {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Derivative key in the processed bucket.
    pub key: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// The image pipeline bound to a configuration and a storage handle.
pub struct Pipeline<S: Storage> {
    config: PipelineConfig,
    storage: S,
}

impl<S: Storage> Pipeline<S> {
    pub fn new(config: PipelineConfig, storage: S) -> Self {
        Self { config, storage }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Where the derivative for `(source_key, options)` is published.
    pub fn derivative_key(&self, source_key: &str, options: &ProcessingOptions) -> String {
        naming::derivative_key(source_key, options)
    }

    /// Transform `source_bytes` and publish the result.
    pub fn process(
        &self,
        source_bytes: &[u8],
        options: &ProcessingOptions,
        source_key: &str,
    ) -> Result<ProcessedResult, ProcessError> {
        self.publish(source_bytes, options, source_key)
            .map_err(log_abort)
    }

    /// Read `source_key` from the raw bucket, then [`process`](Self::process) it.
    pub fn process_stored(
        &self,
        source_key: &str,
        options: &ProcessingOptions,
    ) -> Result<ProcessedResult, ProcessError> {
        let bucket = &self.config.storage.raw_bucket;
        let bytes = self
            .storage
            .read(bucket, source_key)
            .map_err(|source| ProcessError::StorageRead {
                source_key: source_key.to_string(),
                source,
            })
            .map_err(log_abort)?;
        tracing::debug!(source_key, bucket = %bucket, bytes = bytes.len(), "source read");
        self.process(&bytes, options, source_key)
    }

    /// Remove the derivative for `(source_key, options)`, returning its key.
    ///
    /// Removing a derivative that was never published succeeds.
    pub fn revert(
        &self,
        source_key: &str,
        options: &ProcessingOptions,
    ) -> Result<String, ProcessError> {
        let key = self.derivative_key(source_key, options);
        let bucket = &self.config.storage.processed_bucket;
        self.storage
            .delete(bucket, &key)
            .map_err(|source| ProcessError::StorageWrite {
                source_key: source_key.to_string(),
                key: key.clone(),
                source,
            })
            .map_err(log_abort)?;
        tracing::info!(source_key, bucket = %bucket, key = %key, "derivative removed");
        Ok(key)
    }

    fn publish(
        &self,
        source_bytes: &[u8],
        options: &ProcessingOptions,
        source_key: &str,
    ) -> Result<ProcessedResult, ProcessError> {
        let limits = self.config.limits.decode_limits();
        let encoded = imaging::transform(source_bytes, options, &limits)
            .map_err(|e| ProcessError::imaging(source_key, e))?;

        let key = self.derivative_key(source_key, options);
        let bucket = &self.config.storage.processed_bucket;
        self.storage
            .write(bucket, &key, &encoded.bytes, encoded.content_type)
            .map_err(|source| ProcessError::StorageWrite {
                source_key: source_key.to_string(),
                key: key.clone(),
                source,
            })?;

        let url = self.storage.public_url(bucket, &key);
        tracing::info!(
            source_key,
            bucket = %bucket,
            key = %key,
            bytes = encoded.bytes.len(),
            content_type = encoded.content_type,
            "derivative published"
        );
        Ok(ProcessedResult {
            bytes: encoded.bytes,
            content_type: encoded.content_type,
            key,
            url,
            width: encoded.width,
            height: encoded.height,
        })
    }
}

fn log_abort(err: ProcessError) -> ProcessError {
    tracing::error!(
        stage = %err.stage(),
        source_key = err.source_key(),
        error = %err,
        "processing aborted"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{MemoryStorage, RecordedOp};
    use crate::test_helpers::{encode_fixture, jpeg_fixture, options_from_json};
    use image::{DynamicImage, ImageFormat, RgbImage};

    const RAW: &str = "pixelscale-raw";
    const PROCESSED: &str = "pixelscale-processed";

    fn pipeline(storage: MemoryStorage) -> Pipeline<MemoryStorage> {
        Pipeline::new(PipelineConfig::default(), storage)
    }

    // =========================================================================
    // Success path
    // =========================================================================

    #[test]
    fn process_publishes_to_processed_bucket() {
        let p = pipeline(MemoryStorage::new());
        let opts = options_from_json(r#"{"preset": "thumbnail", "format": "png"}"#);
        let result = p.process(&jpeg_fixture(300, 200), &opts, "raw/abc.jpg").unwrap();

        assert_eq!(result.key, "processed/thumbnail/abc.png");
        assert_eq!(result.content_type, "image/png");
        assert_eq!(result.url, "memory://pixelscale-processed/processed/thumbnail/abc.png");
        assert_eq!((result.width, result.height), (150, 100));

        let stored = p.storage().get(PROCESSED, &result.key).unwrap();
        assert_eq!(stored.bytes, result.bytes);
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(p.storage().writes().len(), 1);
    }

    #[test]
    fn process_stored_reads_raw_bucket() {
        let storage = MemoryStorage::new();
        storage.insert(RAW, "raw/abc.jpg", jpeg_fixture(100, 50));
        let p = pipeline(storage);

        let result = p
            .process_stored("raw/abc.jpg", &options_from_json(r#"{"rotate": 90}"#))
            .unwrap();
        assert_eq!((result.width, result.height), (50, 100));

        let ops = p.storage().get_operations();
        assert_eq!(
            ops[0],
            RecordedOp::Read {
                bucket: RAW.into(),
                key: "raw/abc.jpg".into()
            }
        );
        assert!(matches!(&ops[1], RecordedOp::Write { bucket, .. } if bucket == PROCESSED));
    }

    #[test]
    fn republishing_same_key_replaces() {
        let p = pipeline(MemoryStorage::new());
        let a = p
            .process(&jpeg_fixture(100, 100), &options_from_json(r#"{"width": 10}"#), "raw/x.jpg")
            .unwrap();
        let b = p
            .process(&jpeg_fixture(100, 100), &options_from_json(r#"{"width": 20}"#), "raw/x.jpg")
            .unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(p.storage().get(PROCESSED, &a.key).unwrap().bytes, b.bytes);
    }

    // =========================================================================
    // Failure policy
    // =========================================================================

    #[test]
    fn decode_failure_writes_nothing() {
        let p = pipeline(MemoryStorage::new());
        let err = p
            .process(b"not an image", &ProcessingOptions::default(), "raw/bad.jpg")
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Decode);
        assert_eq!(err.source_key(), "raw/bad.jpg");
        assert!(p.storage().writes().is_empty());
    }

    #[test]
    fn oversized_source_is_decode_failure() {
        let mut config = PipelineConfig::default();
        config.limits.max_source_dimension = 64;
        let p = Pipeline::new(config, MemoryStorage::new());
        let err = p
            .process(&jpeg_fixture(100, 10), &ProcessingOptions::default(), "raw/big.jpg")
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Decode);
        assert!(p.storage().writes().is_empty());
    }

    #[test]
    fn encode_failure_writes_nothing() {
        let mut config = PipelineConfig::default();
        config.limits.max_source_dimension = 20_000;
        let p = Pipeline::new(config, MemoryStorage::new());
        let wide = encode_fixture(
            &DynamicImage::ImageRgb8(RgbImage::new(20_000, 1)),
            ImageFormat::Png,
        );
        let err = p
            .process(&wide, &options_from_json(r#"{"format": "webp"}"#), "raw/wide.png")
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Encode);
        assert!(p.storage().writes().is_empty());
    }

    #[test]
    fn missing_source_is_storage_read_failure() {
        let p = pipeline(MemoryStorage::new());
        let err = p
            .process_stored("raw/missing.jpg", &ProcessingOptions::default())
            .unwrap_err();
        assert_eq!(err.stage(), Stage::StorageRead);
        assert!(matches!(
            err,
            ProcessError::StorageRead {
                source: StorageError::NotFound { .. },
                ..
            }
        ));
        assert!(p.storage().writes().is_empty());
    }

    #[test]
    fn write_failure_surfaces_with_key() {
        let p = pipeline(MemoryStorage::failing_writes());
        let err = p
            .process(&jpeg_fixture(20, 20), &ProcessingOptions::default(), "raw/a.jpg")
            .unwrap_err();
        assert_eq!(err.stage(), Stage::StorageWrite);
        match err {
            ProcessError::StorageWrite { key, .. } => assert_eq!(key, "processed/custom/a.jpg"),
            other => panic!("expected StorageWrite, got {other:?}"),
        }
    }

    #[test]
    fn error_message_names_source() {
        let p = pipeline(MemoryStorage::new());
        let err = p
            .process(b"", &ProcessingOptions::default(), "raw/empty.jpg")
            .unwrap_err();
        assert!(err.to_string().contains("raw/empty.jpg"));
    }

    // =========================================================================
    // Revert
    // =========================================================================

    #[test]
    fn revert_removes_published_derivative() {
        let p = pipeline(MemoryStorage::new());
        let opts = options_from_json(r#"{"preset": "large"}"#);
        let result = p.process(&jpeg_fixture(40, 40), &opts, "raw/r.jpg").unwrap();

        let key = p.revert("raw/r.jpg", &opts).unwrap();
        assert_eq!(key, result.key);
        assert!(p.storage().get(PROCESSED, &key).is_none());
        // Second revert is a no-op
        assert!(p.revert("raw/r.jpg", &opts).is_ok());
    }

    #[test]
    fn result_serializes_without_bytes() {
        let p = pipeline(MemoryStorage::new());
        let result = p
            .process(&jpeg_fixture(10, 10), &ProcessingOptions::default(), "raw/s.jpg")
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("bytes").is_none());
        assert_eq!(json["key"], "processed/custom/s.jpg");
        assert_eq!(json["content_type"], "image/jpeg");
    }
}
