//! SF2 sound bank codec for sfbank.
//!
//! Reads and writes the RIFF `sfbk` container in its plain PCM form
//! (versions 2.01 and 2.04) and in the compressed form (version 3), where
//! each sample is stored as a length-prefixed block produced by an external
//! [`SampleCodec`].
//!
//! # Architecture
//!
//! - [`riff`] walks and writes chunks
//! - [`records`] holds the fixed-size `pdta` records
//! - [`reader`] turns the flat tables into a [`sfbank_model::SoundFont`],
//!   correcting semantic problems and listing them in a [`LoadReport`]
//! - [`writer`] flattens a font back into tables, recomputing zone index
//!   ranges and terminal records
//!
//! Structural corruption is fatal: a read either returns a complete font or
//! an [`Sf2Error`].
//!
//! # Example
//!
//! ```
//! use sfbank_model::{Instrument, Preset, Sample, SampleData, SoundFont, Version, Zone};
//! use sfbank_sf2::{read_sf2, write_sf2};
//!
//! let mut font = SoundFont::new("Demo");
//! let sample = font.add_sample(Sample::new("Click", SampleData::from_pcm(vec![0, 1000, 0]), 44100))?;
//! let inst = font.add_instrument(Instrument::new("Click").with_zone(Zone::new(sample)))?;
//! font.add_preset(Preset::new("Click", 0, 0).with_zone(Zone::new(inst)))?;
//!
//! let bytes = write_sf2(&font, Version::SF2_01)?;
//! let loaded = read_sf2(&bytes)?;
//! assert_eq!(loaded.font.preset_count(), 1);
//! assert!(loaded.report.is_clean());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod error;
pub mod reader;
pub mod records;
pub mod report;
pub mod riff;
pub mod writer;

pub use codec::{CodecError, CodecFailurePolicy, SampleCodec};
pub use error::{Result, Sf2Error};
pub use reader::{read_sf2, Loaded, Sf2Reader};
pub use report::{EncodeReport, LoadReport, LoadWarning};
pub use writer::{write_sf2, Encoded, Sf2Writer};
