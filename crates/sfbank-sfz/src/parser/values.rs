use std::str::FromStr;

use crate::error::{Result, SfzError};

/// Conversion of raw opcode text into a typed value.
///
/// All SFZ values are text in the file. The opcode name is passed along so
/// that a failed conversion can report which opcode it was.
pub trait OpcodeValue: Sized {
    fn parse_opcode(opcode: &str, value: &str) -> Result<Self>;
}

fn invalid(opcode: &str, value: &str) -> SfzError {
    SfzError::InvalidValue {
        opcode: opcode.to_string(),
        value: value.to_string(),
    }
}

impl OpcodeValue for String {
    fn parse_opcode(_opcode: &str, value: &str) -> Result<Self> {
        Ok(value.to_string())
    }
}

impl OpcodeValue for f64 {
    /// Volume levels, tuning, envelope times, frequencies.
    fn parse_opcode(opcode: &str, value: &str) -> Result<Self> {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(opcode, value))
    }
}

impl OpcodeValue for i64 {
    /// Sample offsets, group numbers, velocities.
    fn parse_opcode(opcode: &str, value: &str) -> Result<Self> {
        value.trim().parse::<i64>().map_err(|_| invalid(opcode, value))
    }
}

/// A MIDI key number, written either as a number or as a note name.
///
/// Note names use `c4` for key 60, with `#` or `b` accidentals:
///
/// ```text
/// key=60
/// lokey=c#4
/// hikey=Bb5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note(pub u8);

impl FromStr for Note {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        let s = s.trim();
        if let Ok(number) = s.parse::<i32>() {
            return u8::try_from(number).ok().filter(|k| *k <= 127).map(Note).ok_or(());
        }
        let mut chars = s.chars();
        let semitone = match chars.next().map(|c| c.to_ascii_lowercase()) {
            Some('c') => 0,
            Some('d') => 2,
            Some('e') => 4,
            Some('f') => 5,
            Some('g') => 7,
            Some('a') => 9,
            Some('b') => 11,
            _ => return Err(()),
        };
        let rest = chars.as_str();
        let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
            (1, octave)
        } else if let Some(octave) = rest.strip_prefix('b') {
            (-1, octave)
        } else {
            (0, rest)
        };
        let octave: i32 = octave.parse().map_err(|_| ())?;
        let key = (octave + 1) * 12 + semitone + accidental;
        u8::try_from(key).ok().filter(|k| *k <= 127).map(Note).ok_or(())
    }
}

impl OpcodeValue for Note {
    fn parse_opcode(opcode: &str, value: &str) -> Result<Self> {
        value.parse().map_err(|_| invalid(opcode, value))
    }
}

/// Loop modes for sample playback.
///
/// ```text
/// loop_mode=no_loop
/// loop_mode=one_shot
/// loop_mode=loop_continuous
/// loop_mode=loop_sustain
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// The sample plays once and stops at note-off
    NoLoop,
    /// The sample plays to its end, ignoring note-off
    OneShot,
    /// The sample loops until the voice ends
    LoopContinuous,
    /// The sample loops until note-off, then plays to its end
    LoopSustain,
}

impl LoopMode {
    /// Text used by the `loop_mode` opcode.
    pub fn as_str(self) -> &'static str {
        match self {
            LoopMode::NoLoop => "no_loop",
            LoopMode::OneShot => "one_shot",
            LoopMode::LoopContinuous => "loop_continuous",
            LoopMode::LoopSustain => "loop_sustain",
        }
    }
}

impl FromStr for LoopMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_lowercase().as_str() {
            "no_loop" | "noloop" => Ok(LoopMode::NoLoop),
            "one_shot" | "oneshot" => Ok(LoopMode::OneShot),
            "loop" | "loop_continuous" => Ok(LoopMode::LoopContinuous),
            "loop_sustain" => Ok(LoopMode::LoopSustain),
            _ => Err(()),
        }
    }
}

impl OpcodeValue for LoopMode {
    fn parse_opcode(opcode: &str, value: &str) -> Result<Self> {
        value.parse().map_err(|_| invalid(opcode, value))
    }
}
