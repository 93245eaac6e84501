//! SFZ text parser.
//!
//! Turns SFZ text into an [`SfzFile`]: directives applied, sections
//! classified and opcodes flattened down the inheritance chain. Values stay
//! text; [`SfzSection::get`] converts them on demand.

use std::path::Path;

mod parse;
pub mod path_utils;
mod types;
mod values;

pub use path_utils::{combine_sample_path, normalize_path};
pub use types::{SfzFile, SfzSection, SfzSectionType};
pub use values::{LoopMode, Note, OpcodeValue};

use crate::error::Result;

/// Parse SFZ text. Relative `#include` paths are taken from the working
/// directory.
pub fn parse_sfz_str(content: &str) -> Result<SfzFile> {
    parse::parse_sfz(content)
}

/// Parse an SFZ file and everything it includes.
pub fn parse_sfz_file<P: AsRef<Path>>(path: P) -> Result<SfzFile> {
    parse::parse_sfz_path(path.as_ref())
}
