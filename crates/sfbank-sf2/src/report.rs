//! Problems corrected while loading, and samples affected while saving.

use std::fmt;

use log::warn;
use sfbank_model::{EntityKind, GeneratorType};

/// A semantic problem found in a file and corrected on load.
///
/// Structural problems are errors instead; see [`crate::Sf2Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    /// A generator id outside the published table; dropped.
    UnknownGenerator { owner: String, id: u16 },
    /// Repeated generator in one zone; the last value wins at the first position.
    DuplicateGenerator { owner: String, generator: GeneratorType },
    /// Generator following the zone's reference; dropped.
    GeneratorAfterReference { owner: String, id: u16 },
    /// A zone other than the first without a reference; dropped.
    ZoneWithoutReference { owner: String, zone: usize },
    /// Instrument-only generator in a preset zone; dropped.
    ForbiddenAtPresetLevel { owner: String, generator: GeneratorType },
    /// Value outside its range; kept as stored, clamped on resolution.
    OutOfRange {
        owner: String,
        generator: GeneratorType,
        value: i32,
    },
    /// Unreadable modulator record; dropped.
    InvalidModulator { owner: String, reason: String },
    /// Preset modulator aimed at a generator presets cannot modulate; dropped.
    InvalidModulatorDestination {
        owner: String,
        destination: GeneratorType,
    },
    /// Two modulators in one zone with the same signature; the last wins.
    DuplicateModulator { owner: String },
    /// One-way or mismatched stereo link; the sample is loaded as mono.
    BrokenStereoLink { sample: String },
    /// Loop outside the sample data; clamped.
    LoopOutOfBounds { sample: String },
    /// 24-bit extension present but unusable for this version or size.
    Sm24Ignored,
    /// Name already used by an entity of the same kind.
    Renamed {
        kind: EntityKind,
        from: String,
        to: String,
    },
    /// Bank/program already used by an earlier preset.
    PresetMoved {
        name: String,
        from: (u16, u16),
        to: (u16, u16),
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGenerator { owner, id } => {
                write!(f, "{}: unknown generator {} dropped", owner, id)
            }
            Self::DuplicateGenerator { owner, generator } => {
                write!(f, "{}: duplicate {} (last value kept)", owner, generator)
            }
            Self::GeneratorAfterReference { owner, id } => {
                write!(f, "{}: generator {} after the zone reference dropped", owner, id)
            }
            Self::ZoneWithoutReference { owner, zone } => {
                write!(f, "{}: zone {} has no reference and was dropped", owner, zone)
            }
            Self::ForbiddenAtPresetLevel { owner, generator } => {
                write!(f, "{}: {} is not allowed at preset level", owner, generator)
            }
            Self::OutOfRange {
                owner,
                generator,
                value,
            } => write!(f, "{}: {} value {} is out of range", owner, generator, value),
            Self::InvalidModulator { owner, reason } => {
                write!(f, "{}: modulator dropped ({})", owner, reason)
            }
            Self::InvalidModulatorDestination { owner, destination } => write!(
                f,
                "{}: preset modulator targeting {} dropped",
                owner, destination
            ),
            Self::DuplicateModulator { owner } => {
                write!(f, "{}: duplicate modulator signature (last kept)", owner)
            }
            Self::BrokenStereoLink { sample } => {
                write!(f, "sample '{}': broken stereo link, loaded as mono", sample)
            }
            Self::LoopOutOfBounds { sample } => {
                write!(f, "sample '{}': loop outside the data, clamped", sample)
            }
            Self::Sm24Ignored => f.write_str("24-bit sample extension ignored"),
            Self::Renamed { kind, from, to } => {
                write!(f, "duplicate {} name '{}' renamed to '{}'", kind, from, to)
            }
            Self::PresetMoved { name, from, to } => write!(
                f,
                "preset '{}' moved from {:03}:{:03} to {:03}:{:03}",
                name, from.0, from.1, to.0, to.1
            ),
        }
    }
}

/// Everything corrected during one load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub(crate) fn push(&mut self, warning: LoadWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadWarning> {
        self.warnings.iter()
    }
}

/// Outcome of a save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeReport {
    /// Samples stored as PCM because the codec failed on them.
    pub fallback_samples: Vec<String>,
}

impl EncodeReport {
    pub fn is_complete(&self) -> bool {
        self.fallback_samples.is_empty()
    }
}
