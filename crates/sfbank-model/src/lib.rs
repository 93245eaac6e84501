//! SoundFont entity graph and parameter resolution for sfbank.
//!
//! This crate holds everything that does not touch a file:
//! - The generator and modulator vocabulary with its published ranges
//! - Samples, instruments, presets and the [`SoundFont`] container
//! - Generator and modulator resolution for a (key, velocity) pair
//! - Referential integrity checks and deep duplication
//!
//! # Architecture
//!
//! Entities live in arenas addressed by typed ids ([`SampleId`],
//! [`InstrumentId`], [`PresetId`]). Zones refer to their targets by id, and
//! stereo links are id pairs kept symmetric by [`SoundFont::set_link`].
//! Loaders build fonts with the tolerant `insert_*` methods; editors use the
//! strict `add_*`/`set_*` methods, which reject invalid values.
//!
//! # Example
//!
//! ```
//! use sfbank_model::{Instrument, Preset, Sample, SampleData, SoundFont, Zone};
//! use sfbank_model::resolve::resolve_preset_voices;
//!
//! let mut font = SoundFont::new("Demo");
//! let sample = font.add_sample(Sample::new("Sine", SampleData::from_pcm(vec![0; 1000]), 44100))?;
//! let inst = font.add_instrument(Instrument::new("Sine").with_zone(Zone::new(sample)))?;
//! let preset = font.add_preset(Preset::new("Sine", 0, 0).with_zone(Zone::new(inst)))?;
//!
//! let voices = resolve_preset_voices(&font, preset, 60, 100)?;
//! assert_eq!(voices.len(), 1);
//! assert_eq!(voices[0].root_key, 60);
//! # Ok::<(), sfbank_model::ModelError>(())
//! ```

pub mod attributes;
pub mod cancel;
pub mod duplicate;
pub mod error;
pub mod ids;
pub mod instrument;
pub mod integrity;
pub mod preset;
pub mod resolve;
pub mod sample;
pub mod soundfont;
pub mod zone;

pub use attributes::{
    Amount, Generator, GeneratorType, Level, ModDestination, ModSource, Modulator,
    ModulatorSignature, Range, Transform,
};
pub use cancel::CancelToken;
pub use duplicate::{Choice, Collision, DuplicateReport, Duplicator, Subtree};
pub use error::{IntegrityError, IoKind, ModelError, Result};
pub use ids::{EntityKind, InstrumentId, PresetId, SampleId};
pub use instrument::Instrument;
pub use integrity::{Issue, Removal};
pub use preset::{Preset, PERCUSSION_BANK};
pub use sample::{Sample, SampleData, SampleLink, SampleParam, MAX_NAME_LEN};
pub use soundfont::{FontInfo, SoundFont, Version, ZoneRef};
pub use zone::{GeneratorList, ModulatorList, Zone, ZoneModulator, ZoneParams};
