//! Error types for sfbank-core

use std::io;
use std::path::{Path, PathBuf};

use sfbank_model::{IoKind, ModelError};
use sfbank_sf2::Sf2Error;
use sfbank_sfz::SfzError;
use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while opening, editing or saving a bank
#[derive(Debug, Error)]
pub enum CoreError {
    /// File system failure, with the offending path
    #[error("{kind}: {}", path.display())]
    Io { path: PathBuf, kind: IoKind },

    /// Another mutator holds the instance
    #[error("the sound bank is being edited by another operation")]
    Busy,

    /// The file extension does not name a known format
    #[error("unknown sound bank format: {}", .0.display())]
    UnknownFormat(PathBuf),

    /// A background job panicked
    #[error("background job '{0}' panicked")]
    JobPanicked(String),

    /// Binary bank codec error
    #[error(transparent)]
    Sf2(#[from] Sf2Error),

    /// SFZ import/export error
    #[error(transparent)]
    Sfz(#[from] SfzError),

    /// Entity graph error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CoreError {
    pub(crate) fn io(path: &Path, err: &io::Error, during: IoKind) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            kind: IoKind::classify(err, during),
        }
    }

    /// True when the operation stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Model(ModelError::Cancelled)
                | Self::Sf2(Sf2Error::Model(ModelError::Cancelled))
                | Self::Sfz(SfzError::Model(ModelError::Cancelled))
        )
    }

    /// True for integrity conditions the caller should present and resolve.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Model(ModelError::Integrity(_))
                | Self::Sf2(Sf2Error::Model(ModelError::Integrity(_)))
                | Self::Sfz(SfzError::Model(ModelError::Integrity(_)))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfbank_model::IntegrityError;

    #[test]
    fn test_cancellation_is_seen_through_codec_errors() {
        assert!(CoreError::from(Sf2Error::Model(ModelError::Cancelled)).is_cancelled());
        assert!(CoreError::from(ModelError::Cancelled).is_cancelled());
        assert!(!CoreError::Busy.is_cancelled());
    }

    #[test]
    fn test_integrity_errors_are_distinguishable() {
        let err = CoreError::from(Sf2Error::Model(
            IntegrityError::MissingField { field: "name" }.into(),
        ));
        assert!(err.is_integrity());
        assert!(!CoreError::Busy.is_integrity());
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let core = CoreError::io(Path::new("/tmp/x.sf2"), &err, IoKind::Read);
        assert!(matches!(core, CoreError::Io { kind: IoKind::NotFound, .. }));
        assert!(core.to_string().contains("x.sf2"));
    }
}
