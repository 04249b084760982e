//! # Pixelscale
//!
//! A deterministic image transformation pipeline. A source image and a
//! validated set of options go in; one encoded derivative comes out and is
//! published to storage under a key derived from the source key and options.
//!
//! # Architecture: One Fixed Pipeline
//!
//! ```text
//! storage.read → decode → normalize → crop → resize → rotate/flip
//!              → filter → adjust → encode → key → storage.write
//! ```
//!
//! Everything between the read and the write is a pure function of
//! `(bytes, options)`, so the pixel stages are unit tested without storage and
//! the orchestrator is tested against an in-memory store.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`options`] | Request model: validated, immutable [`options::ProcessingOptions`] |
//! | [`imaging`] | Pixel stages and codecs; [`imaging::transform`] chains them |
//! | [`naming`] | Derivative key generator |
//! | [`storage`] | [`storage::Storage`] trait and the filesystem-backed [`storage::LocalStorage`] |
//! | [`pipeline`] | Orchestrator: failure policy, atomic publish, abort logging |
//! | [`config`] | `pixelscale.toml` loading, validation, environment overrides |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Channel Layout Is Resolved Once
//!
//! The output codec decides the buffer's channels right after decode: JPEG
//! never carries alpha, PNG always does, WebP keeps what the source had. The
//! grayscale filter is the only stage allowed to revisit that decision. Both
//! rules live in [`imaging::mode`], so no stage converts ad hoc.
//!
//! ## Explicit Configuration, No Globals
//!
//! A [`pipeline::Pipeline`] is built from a [`config::PipelineConfig`] value
//! and a storage handle. Nothing is cached process-wide; tests build as many
//! independent pipelines as they like.
//!
//! ## Publish Last
//!
//! The storage write is the only side effect and happens after encoding
//! succeeds. [`storage::LocalStorage`] writes through a temp file and a
//! rename, so readers never observe a half-written derivative.
//!
//! ## Library Logs, Binary Subscribes
//!
//! Library code emits `tracing` events only. The `pixelscale` binary installs
//! the subscriber, filtered by `RUST_LOG` or the configured level.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
