//! Modulator records and the ten default modulators.
//!
//! A modulator connects a controller source to a generator destination with
//! a signed amount, an optional secondary (amount) source and an output
//! transform. Two modulators are "the same" when their signature matches:
//! (primary source, destination, amount source, transform).

use std::fmt;

use super::generator::GeneratorType;

/// Continuity curve applied to a controller source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveType {
    Linear,
    Concave,
    Convex,
    Switch,
    /// Reserved curve ids, kept verbatim.
    Other(u8),
}

impl CurveType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Linear,
            1 => Self::Concave,
            2 => Self::Convex,
            3 => Self::Switch,
            other => Self::Other(other),
        }
    }

    fn bits(self) -> u16 {
        match self {
            Self::Linear => 0,
            Self::Concave => 1,
            Self::Convex => 2,
            Self::Switch => 3,
            Self::Other(b) => u16::from(b & 0x3F),
        }
    }
}

/// General controller palette (used when the CC flag is clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralController {
    NoController,
    NoteOnVelocity,
    NoteOnKeyNumber,
    PolyPressure,
    ChannelPressure,
    PitchWheel,
    PitchWheelSensitivity,
    /// Points at another modulator's output.
    Link,
    Unknown(u8),
}

impl GeneralController {
    fn from_index(index: u8) -> Self {
        match index {
            0 => Self::NoController,
            2 => Self::NoteOnVelocity,
            3 => Self::NoteOnKeyNumber,
            10 => Self::PolyPressure,
            13 => Self::ChannelPressure,
            14 => Self::PitchWheel,
            16 => Self::PitchWheelSensitivity,
            127 => Self::Link,
            other => Self::Unknown(other),
        }
    }
}

/// Packed 16-bit controller source descriptor.
///
/// Bits 0-6 index, bit 7 MIDI CC flag, bit 8 direction (max to min),
/// bit 9 polarity (bipolar), bits 10-15 curve type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModSource(u16);

impl ModSource {
    /// "No controller" source.
    pub const NONE: ModSource = ModSource(0);

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn new(index: u8, cc: bool, descending: bool, bipolar: bool, curve: CurveType) -> Self {
        let mut raw = u16::from(index & 0x7F);
        if cc {
            raw |= 1 << 7;
        }
        if descending {
            raw |= 1 << 8;
        }
        if bipolar {
            raw |= 1 << 9;
        }
        raw |= curve.bits() << 10;
        Self(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn index(self) -> u8 {
        (self.0 & 0x7F) as u8
    }

    pub fn is_cc(self) -> bool {
        self.0 & (1 << 7) != 0
    }

    pub fn is_descending(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    pub fn is_bipolar(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    pub fn curve(self) -> CurveType {
        CurveType::from_bits((self.0 >> 10) as u8)
    }

    /// General controller, or `None` for MIDI CC sources.
    pub fn general(self) -> Option<GeneralController> {
        (!self.is_cc()).then(|| GeneralController::from_index(self.index()))
    }

    pub fn is_none(self) -> bool {
        self.general() == Some(GeneralController::NoController)
    }
}

impl fmt::Display for ModSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cc() {
            write!(f, "CC{}", self.index())?;
        } else {
            write!(f, "{:?}", GeneralController::from_index(self.index()))?;
        }
        write!(
            f,
            " ({:?}, {}, {})",
            self.curve(),
            if self.is_bipolar() { "bipolar" } else { "unipolar" },
            if self.is_descending() { "-" } else { "+" }
        )
    }
}

/// Output transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transform {
    #[default]
    Linear,
    Absolute,
}

impl Transform {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Linear),
            2 => Some(Self::Absolute),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Linear => 0,
            Self::Absolute => 2,
        }
    }
}

/// Target of a modulator: a generator, or the input of another modulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModDestination {
    Generator(GeneratorType),
    /// Index of the target modulator inside the same zone list.
    Modulator(u16),
}

impl ModDestination {
    /// Decode a destination word. Bit 15 marks a link.
    pub fn from_u16(raw: u16) -> Option<Self> {
        if raw & 0x8000 != 0 {
            Some(Self::Modulator(raw & 0x7FFF))
        } else {
            GeneratorType::from_u16(raw).map(Self::Generator)
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Generator(g) => g.id(),
            Self::Modulator(i) => 0x8000 | (i & 0x7FFF),
        }
    }

    pub fn generator(self) -> Option<GeneratorType> {
        match self {
            Self::Generator(g) => Some(g),
            Self::Modulator(_) => None,
        }
    }
}

impl fmt::Display for ModDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator(g) => write!(f, "{}", g),
            Self::Modulator(i) => write!(f, "modulator #{}", i),
        }
    }
}

/// Identity of a modulator for override and duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModulatorSignature {
    pub source: ModSource,
    pub destination: ModDestination,
    pub amount_source: ModSource,
    pub transform: Transform,
}

/// A complete modulator record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modulator {
    pub source: ModSource,
    pub destination: ModDestination,
    pub amount: i16,
    pub amount_source: ModSource,
    pub transform: Transform,
}

impl Modulator {
    pub fn new(source: ModSource, destination: ModDestination, amount: i16) -> Self {
        Self {
            source,
            destination,
            amount,
            amount_source: ModSource::NONE,
            transform: Transform::Linear,
        }
    }

    pub fn with_amount_source(mut self, amount_source: ModSource) -> Self {
        self.amount_source = amount_source;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn signature(&self) -> ModulatorSignature {
        ModulatorSignature {
            source: self.source,
            destination: self.destination,
            amount_source: self.amount_source,
            transform: self.transform,
        }
    }

    /// The ten modulators every instrument zone starts with.
    pub fn defaults() -> [Modulator; 10] {
        use GeneratorType as G;
        let m = |src: u16, dest: GeneratorType, amount: i16| {
            Modulator::new(
                ModSource::from_raw(src),
                ModDestination::Generator(dest),
                amount,
            )
        };
        [
            // Velocity to attenuation, concave, negative
            m(0x0502, G::InitialAttenuation, 960),
            // Velocity to filter cutoff, linear, negative
            m(0x0102, G::InitialFilterFc, -2400),
            // Channel pressure to vibrato LFO pitch depth
            m(0x000D, G::VibLfoToPitch, 50),
            // CC1 (mod wheel) to vibrato LFO pitch depth
            m(0x0081, G::VibLfoToPitch, 50),
            // CC7 (volume) to attenuation
            m(0x0587, G::InitialAttenuation, 960),
            // CC10 (pan) to pan, bipolar
            m(0x028A, G::Pan, 1000),
            // CC11 (expression) to attenuation
            m(0x058B, G::InitialAttenuation, 960),
            // CC91 to reverb send
            m(0x00DB, G::ReverbEffectsSend, 200),
            // CC93 to chorus send
            m(0x00DD, G::ChorusEffectsSend, 200),
            // Pitch wheel to pitch, scaled by pitch wheel sensitivity
            m(0x020E, G::FineTune, 12700).with_amount_source(ModSource::from_raw(0x0010)),
        ]
    }
}

impl fmt::Display for Modulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({:+})",
            self.source, self.destination, self.amount
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_source_bitfield() {
        let src = ModSource::from_raw(0x0502);
        assert_eq!(src.index(), 2);
        assert!(!src.is_cc());
        assert!(src.is_descending());
        assert!(!src.is_bipolar());
        assert_eq!(src.curve(), CurveType::Concave);
        assert_eq!(src.general(), Some(GeneralController::NoteOnVelocity));

        let pan = ModSource::from_raw(0x028A);
        assert!(pan.is_cc());
        assert!(pan.is_bipolar());
        assert_eq!(pan.index(), 10);
        assert_eq!(pan.general(), None);

        let rebuilt = ModSource::new(2, false, true, false, CurveType::Concave);
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn test_destination_link_bit() {
        assert_eq!(
            ModDestination::from_u16(48),
            Some(ModDestination::Generator(GeneratorType::InitialAttenuation))
        );
        assert_eq!(ModDestination::from_u16(0x8003), Some(ModDestination::Modulator(3)));
        assert_eq!(ModDestination::Modulator(3).raw(), 0x8003);
        assert_eq!(ModDestination::from_u16(14), None);
    }

    #[test]
    fn test_transform() {
        assert_eq!(Transform::from_u16(0), Some(Transform::Linear));
        assert_eq!(Transform::from_u16(2), Some(Transform::Absolute));
        assert_eq!(Transform::from_u16(1), None);
    }

    #[test]
    fn test_defaults() {
        let defaults = Modulator::defaults();
        assert_eq!(defaults.len(), 10);
        let pitch = defaults[9];
        assert_eq!(pitch.amount, 12700);
        assert_eq!(pitch.amount_source.raw(), 0x0010);
        assert_eq!(
            pitch.destination,
            ModDestination::Generator(GeneratorType::FineTune)
        );

        // Signatures are unique
        let sigs: HashSet<_> = defaults.iter().map(|m| m.signature()).collect();
        assert_eq!(sigs.len(), defaults.len());
    }
}
