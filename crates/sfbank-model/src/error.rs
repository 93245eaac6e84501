use std::fmt;
use std::io;

use thiserror::Error;

use crate::attributes::{GeneratorType, ModulatorSignature};
use crate::ids::{EntityKind, InstrumentId, PresetId, SampleId};

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors returned by editing, resolution and duplication operations.
///
/// Semantic problems (duplicate signatures, out-of-range values) are
/// rejected here; the codecs decide separately whether to auto-correct them
/// during bulk loads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A generator value outside its published range.
    #[error("value {value} for {generator} is outside {min}..={max}")]
    OutOfRange {
        generator: GeneratorType,
        value: i32,
        min: i32,
        max: i32,
    },

    /// An instrument-only generator set on a preset zone.
    #[error("{0} cannot be used at preset level")]
    ForbiddenAtPresetLevel(GeneratorType),

    /// A zone reference generator (`instrument`, `sampleID`) set directly.
    ///
    /// References are the zone's target and are changed through the zone.
    #[error("{0} is a zone reference and cannot be set as a parameter")]
    ReferenceGenerator(GeneratorType),

    /// Two explicit modulators in one zone share a full signature.
    #[error("zone already holds a modulator with signature {0:?}")]
    DuplicateModulator(ModulatorSignature),

    /// A preset-level modulator targeting a generator presets cannot modulate.
    #[error("modulator destination {destination} is not allowed at preset level")]
    InvalidModulatorDestination { destination: GeneratorType },

    /// No modulator with this signature exists in the zone.
    #[error("no modulator with signature {0:?}")]
    UnknownModulator(ModulatorSignature),

    #[error("a {kind} named '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("name '{name}' is longer than {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("bank {bank} program {program} is already taken")]
    BankProgramTaken { bank: u16, program: u16 },

    #[error("bank {bank} program {program} is outside the valid range")]
    InvalidBankProgram { bank: u16, program: u16 },

    #[error("unknown sample {0}")]
    UnknownSample(SampleId),

    #[error("unknown instrument {0}")]
    UnknownInstrument(InstrumentId),

    #[error("unknown preset {0}")]
    UnknownPreset(PresetId),

    #[error("zone index {index} out of bounds ({len} zones)")]
    ZoneOutOfBounds { index: usize, len: usize },

    #[error("invalid stereo link for sample {sample}: {reason}")]
    InvalidLink { sample: SampleId, reason: String },

    #[error("loop {start}..{end} does not fit sample {sample} of {len} frames")]
    InvalidLoop {
        sample: SampleId,
        start: u32,
        end: u32,
        len: usize,
    },

    #[error("no free bank/program slot left")]
    NoFreeBankProgram,

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("operation cancelled")]
    Cancelled,
}

/// Conditions the caller is expected to present and resolve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    /// Deleting an entity that is still referenced.
    #[error("{kind} '{name}' is used by {}", users.join(", "))]
    InUse {
        kind: EntityKind,
        name: String,
        users: Vec<String>,
    },

    /// A field that must be filled before export.
    #[error("required field '{field}' is empty")]
    MissingField { field: &'static str },
}

/// What a failed file-system operation was doing.
///
/// Shared by the codec and runtime crates so that every I/O failure is
/// reported with the path and one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    NotFound,
    AccessDenied,
    Create,
    Rename,
    Delete,
    Read,
    Write,
}

impl IoKind {
    /// Classify an I/O error raised while performing `during`.
    ///
    /// Missing files and permission problems are reported as such whatever
    /// the operation was.
    pub fn classify(err: &io::Error, during: IoKind) -> IoKind {
        match err.kind() {
            io::ErrorKind::NotFound => IoKind::NotFound,
            io::ErrorKind::PermissionDenied => IoKind::AccessDenied,
            _ => during,
        }
    }
}

impl fmt::Display for IoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "file not found",
            Self::AccessDenied => "access denied",
            Self::Create => "cannot create file",
            Self::Rename => "cannot rename file",
            Self::Delete => "cannot delete file",
            Self::Read => "cannot read file",
            Self::Write => "cannot write file",
        };
        f.write_str(text)
    }
}
