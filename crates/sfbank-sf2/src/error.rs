//! Error types for the sfbank-sf2 crate.

use sfbank_model::{ModelError, Version};
use thiserror::Error;

/// Errors raised while decoding or encoding a sound bank.
///
/// Structural problems are fatal for the whole file: nothing is returned
/// from a load that fails with [`Sf2Error::Corrupt`] or
/// [`Sf2Error::MissingChunk`].
#[derive(Error, Debug)]
pub enum Sf2Error {
    /// Bad signature, truncated data, inverted or out-of-bounds index.
    #[error("corrupt sound bank: {0}")]
    Corrupt(String),

    /// A required chunk is absent.
    #[error("missing required chunk '{0}'")]
    MissingChunk(&'static str),

    /// File version this codec does not handle.
    #[error("unsupported file version {0}")]
    UnsupportedVersion(Version),

    /// The external sample codec failed on one sample.
    #[error("sample codec failed on '{sample}': {reason}")]
    Codec { sample: String, reason: String },

    /// A table outgrew the 16-bit indices of the format.
    #[error("too many {0} for the file format")]
    Limit(&'static str),

    /// Rejected by the entity graph (integrity or semantic error).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Failure writing the output buffer.
    #[error("encoding error: {0}")]
    Encoding(#[from] std::io::Error),
}

impl Sf2Error {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

/// Result type alias using Sf2Error.
pub type Result<T> = std::result::Result<T, Sf2Error>;
