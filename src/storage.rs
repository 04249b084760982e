//! Byte storage collaborator.
//!
//! The pipeline reads sources from, and publishes derivatives to, a
//! [`Storage`] implementation addressed by `(bucket, key)`. One handle is
//! shared across concurrent invocations, so implementations must be
//! `Send + Sync`.
//!
//! [`LocalStorage`] keeps objects on the filesystem at `{root}/{key}`. The
//! bucket is not part of the path; the `raw/` and `processed/` key prefixes
//! already keep sources and derivatives apart. Writes go to a temp file in
//! the destination directory and are renamed into place, so a reader sees
//! either the old object or the complete new one.

use crate::config::StorageConfig;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("storage I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid key {0:?}")]
    InvalidKey(String),
}

pub trait Storage: Send + Sync {
    /// Fetch an object. Missing objects are [`StorageError::NotFound`].
    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Store an object, replacing any previous one under the same key.
    fn write(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Public URL of an object. Does not check that it exists.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Remove an object. Removing a missing object succeeds.
    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).read(bucket, key)
    }

    fn write(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        (**self).write(bucket, key, bytes, content_type)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        (**self).public_url(bucket, key)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        (**self).delete(bucket, key)
    }
}

/// Reject keys that could escape the storage root or alias another key.
///
/// A valid key is a non-empty, relative, `/`-separated path whose segments
/// are neither empty nor `.` / `..`, with no backslashes or NUL bytes.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidKey(key.to_string());
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(invalid());
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(invalid());
    }
    if key
        .split('/')
        .any(|segment| matches!(segment, "" | "." | ".."))
    {
        return Err(invalid());
    }
    Ok(())
}

/// Filesystem-backed storage.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url_prefix: public_url_prefix.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root, config.public_url_prefix.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn io_error(key: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

impl Storage for LocalStorage {
    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => io_error(key)(e),
        })
    }

    fn write(
        &self,
        _bucket: &str,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(io_error(key))?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(io_error(key))?;
        tmp.write_all(bytes).map_err(io_error(key))?;
        tmp.as_file().sync_all().map_err(io_error(key))?;
        tmp.persist(&path).map_err(|e| io_error(key)(e.error))?;
        Ok(())
    }

    fn public_url(&self, _bucket: &str, key: &str) -> String {
        format!("{}/{}", self.public_url_prefix.trim_end_matches('/'), key)
    }

    fn delete(&self, _bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key)(e)),
        }
    }
}
