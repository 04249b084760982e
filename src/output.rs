//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! raw/abc.jpg → processed/medium/abc.jpg
//!     800x640 image/jpeg, 48213 bytes
//!     URL: /uploads/processed/medium/abc.jpg
//! raw/bad.jpg FAILED at decode
//!     failed to decode raw/bad.jpg: decode failed: ...
//!
//! Processed 1 image, 1 failed
//! ```
//!
//! With `--json`, each result is one JSON object per line instead:
//!
//! ```text
//! {"status":"ok","source_key":"raw/abc.jpg","content_type":"image/jpeg","key":"processed/medium/abc.jpg",...}
//! {"status":"failed","source_key":"raw/bad.jpg","stage":"decode","error":"..."}
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::pipeline::{ProcessError, ProcessedResult, Stage};
use serde::Serialize;

const INDENT: &str = "    ";

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

// ============================================================================
// process
// ============================================================================

/// Human-readable lines for one processed source.
pub fn format_process_result(
    source_key: &str,
    result: &Result<ProcessedResult, ProcessError>,
) -> Vec<String> {
    match result {
        Ok(done) => vec![
            format!("{source_key} → {}", done.key),
            format!(
                "{INDENT}{}x{} {}, {} bytes",
                done.width,
                done.height,
                done.content_type,
                done.bytes.len()
            ),
            format!("{INDENT}URL: {}", done.url),
        ],
        Err(err) => vec![
            format!("{source_key} FAILED at {}", err.stage()),
            format!("{INDENT}{err}"),
        ],
    }
}

pub fn print_process_result(source_key: &str, result: &Result<ProcessedResult, ProcessError>) {
    for line in format_process_result(source_key, result) {
        println!("{}", line);
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum JsonLine<'a> {
    Ok {
        source_key: &'a str,
        #[serde(flatten)]
        result: &'a ProcessedResult,
    },
    Failed {
        source_key: &'a str,
        stage: Stage,
        error: String,
    },
}

/// One JSON object describing one processed source.
pub fn format_process_json(
    source_key: &str,
    result: &Result<ProcessedResult, ProcessError>,
) -> Result<String, serde_json::Error> {
    let line = match result {
        Ok(done) => JsonLine::Ok {
            source_key,
            result: done,
        },
        Err(err) => JsonLine::Failed {
            source_key,
            stage: err.stage(),
            error: err.to_string(),
        },
    };
    serde_json::to_string(&line)
}

pub fn print_process_json(
    source_key: &str,
    result: &Result<ProcessedResult, ProcessError>,
) -> Result<(), serde_json::Error> {
    println!("{}", format_process_json(source_key, result)?);
    Ok(())
}

/// Final tally line.
pub fn format_process_summary(succeeded: usize, failed: usize) -> String {
    if failed == 0 {
        format!("Processed {}", plural(succeeded, "image"))
    } else {
        format!("Processed {}, {} failed", plural(succeeded, "image"), failed)
    }
}

// ============================================================================
// key / revert
// ============================================================================

pub fn format_key(source_key: &str, key: &str) -> String {
    format!("{source_key} → {key}")
}

pub fn format_revert(source_key: &str, key: &str) -> String {
    format!("{source_key}: removed {key}")
}
