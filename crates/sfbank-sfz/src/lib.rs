//! SFZ support for sfbank.
//!
//! This crate translates between SFZ instruments and the sfbank entity
//! graph:
//! - Parsing SFZ text with `#include`, `#define` and both comment styles
//! - Importing a file as one instrument plus one preset, samples read from
//!   WAV files
//! - Exporting every preset as a flattened `.sfz` file with its WAV samples
//!
//! # Architecture
//!
//! - [`parser`] produces an [`SfzFile`] whose sections already carry their
//!   inherited opcodes
//! - [`import`] converts regions to zones, opcode values to generators
//! - [`export`] flattens presets with [`sfbank_model::resolve::preset_layers`]
//!   and sorts them into [`family`] directories
//! - [`wav`] reads and writes sample files
//!
//! # Example
//!
//! ```no_run
//! use sfbank_model::SoundFont;
//! use sfbank_sfz::{export_sfz, import_sfz, ExportOptions};
//!
//! let mut font = SoundFont::new("Imported");
//! let report = import_sfz("instruments/piano.sfz", &mut font)?;
//! for warning in &report.warnings {
//!     println!("{}", warning);
//! }
//! export_sfz(&font, "out", &ExportOptions::default())?;
//! # Ok::<(), sfbank_sfz::SfzError>(())
//! ```

pub mod error;
pub mod export;
pub mod family;
pub mod import;
pub mod parser;
pub mod wav;

pub use error::{Result, SfzError};
pub use export::{export_sfz, ExportOptions, ExportReport};
pub use family::family_directory;
pub use import::{import_sfz, ImportReport, ImportWarning};
pub use parser::{parse_sfz_file, parse_sfz_str, SfzFile, SfzSection, SfzSectionType};
