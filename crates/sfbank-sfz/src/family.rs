//! Instrument-family directories for exported presets.
//!
//! SoundFont presets carry no instrument family. On export a family is
//! guessed from the General MIDI program map: programs come in sixteen
//! blocks of eight, one per family, and bank 128 holds drum kits. The guess
//! is lossy. A bank that does not follow General MIDI numbering ends up in
//! arbitrary directories, and nothing of the classification is read back
//! on import.

use sfbank_model::PERCUSSION_BANK;

const FAMILIES: [&str; 16] = [
    "Piano",
    "Chromatic percussion",
    "Organ",
    "Guitar",
    "Bass",
    "Strings",
    "Ensemble",
    "Brass",
    "Reed",
    "Pipe",
    "Synth lead",
    "Synth pad",
    "Synth effects",
    "Ethnic",
    "Percussive",
    "Sound effects",
];

/// Directory name for a preset, e.g. `040-047 Strings`.
pub fn family_directory(bank: u16, program: u16) -> String {
    if bank == PERCUSSION_BANK {
        return "Percussion kit".to_string();
    }
    match FAMILIES.get(usize::from(program / 8)) {
        Some(family) => {
            let first = program / 8 * 8;
            format!("{:03}-{:03} {}", first, first + 7, family)
        }
        None => "Other".to_string(),
    }
}
