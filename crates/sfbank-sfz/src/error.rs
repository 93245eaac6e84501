use std::path::PathBuf;

use sfbank_model::{IoKind, ModelError};
use thiserror::Error;

/// Result type alias for SFZ operations.
pub type Result<T> = std::result::Result<T, SfzError>;

/// Errors that can occur while reading, importing or exporting SFZ files.
///
/// SFZ errors fall into a few categories:
///
/// - File access errors: the SFZ file, an included file or a sample file
///   cannot be read, or an export target cannot be written
/// - Syntax errors: malformed headers, opcodes or directives
/// - Semantic errors: valid syntax carrying values that cannot be used
///
/// Problems that can be worked around (unknown opcodes, regions without a
/// sample) are not errors; they are listed in the import report instead.
#[derive(Error, Debug)]
pub enum SfzError {
    /// File-system failure with the path it happened on.
    #[error("{kind}: {}", path.display())]
    Io { path: PathBuf, kind: IoKind },

    /// Syntax error with its location.
    ///
    /// Common causes:
    /// - A header without its closing `>`
    /// - A `/*` comment that is never closed
    /// - A `#define` or `#include` without its argument
    #[error("{}:{line}:{column}: {message}", path.display())]
    ParseAt {
        /// File the error is in (the including file for nested includes)
        path: PathBuf,
        /// Line number (1-based)
        line: usize,
        /// Column position (1-based)
        column: usize,
        message: String,
    },

    /// A file that includes itself, directly or through other files.
    ///
    /// `chain` lists the inclusion path from the top-level file down to the
    /// repeated file.
    #[error("inclusion cycle: {}", chain.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    InclusionCycle { path: PathBuf, chain: Vec<PathBuf> },

    /// An opcode value that cannot be converted.
    ///
    /// For example `key=foo` or `loop_mode=sometimes`.
    #[error("invalid value for opcode {opcode}: {value}")]
    InvalidValue { opcode: String, value: String },

    /// The file has no `<region>` sections.
    #[error("missing required region definition")]
    MissingRegion,

    /// A sample file that is not a usable WAV file.
    #[error("cannot decode {}: {reason}", path.display())]
    Wav { path: PathBuf, reason: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SfzError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error, during: IoKind) -> Self {
        SfzError::Io {
            path: path.into(),
            kind: IoKind::classify(err, during),
        }
    }
}
