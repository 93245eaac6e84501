//! Generator operators and their published parameter table.
//!
//! Every generator id below is a fixed wire constant from the SoundFont 2.04
//! format. The table attached to each id (unit, default, valid range,
//! scope) is what editing operations validate against and what resolution
//! clamps to.

use std::fmt;

/// Number of generator slots addressed by wire ids (0..=60).
pub const GENERATOR_SLOTS: usize = 61;

/// Generator operator.
///
/// Unused and reserved ids (14, 18-20, 42, 49, 55, 59, 60) are not part of
/// the enumeration: readers skip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeynumToModEnvHold = 31,
    KeynumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeynumToVolEnvHold = 39,
    KeynumToVolEnvDecay = 40,
    Instrument = 41,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    Keynum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
}

/// Unit a generator amount is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Sample points.
    Samples,
    /// Multiples of 32768 sample points.
    CoarseSamples,
    /// Relative pitch in cents.
    Cents,
    /// Absolute frequency in cents above 8.176 Hz.
    AbsoluteCents,
    /// Time as 1200 * log2(seconds).
    Timecents,
    /// Timecents added per key number away from 60.
    TimecentsPerKey,
    /// Attenuation in tenths of a decibel.
    Centibels,
    /// Tenths of a percent.
    Permille,
    /// Semitones.
    Semitones,
    /// Cents of pitch per key.
    CentsPerKey,
    /// MIDI key number, -1 meaning "not overridden".
    KeyNumber,
    /// MIDI velocity, -1 meaning "not overridden".
    Velocity,
    /// Plain integer (exclusive class, sample modes).
    Number,
    /// Index into the sample or instrument list.
    Index,
    /// Low/high byte pair.
    Range,
}

/// Where a generator may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Instrument and preset zones.
    Any,
    /// Instrument zones only.
    InstrumentOnly,
    /// Key or velocity range selector (never an effective value).
    Selector,
    /// Terminal reference of a preset zone to an instrument.
    PresetReference,
    /// Terminal reference of an instrument zone to a sample.
    InstrumentReference,
}

/// Zone level, instrument or preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Instrument,
    Preset,
}

/// Published description of one generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorInfo {
    /// Name used by the SoundFont 2.04 format.
    pub name: &'static str,
    pub unit: Unit,
    /// Value used when no zone sets the generator.
    pub default: i32,
    pub min: i32,
    pub max: i32,
    pub scope: Scope,
}

const fn info(
    name: &'static str,
    unit: Unit,
    default: i32,
    min: i32,
    max: i32,
    scope: Scope,
) -> GeneratorInfo {
    GeneratorInfo {
        name,
        unit,
        default,
        min,
        max,
        scope,
    }
}

impl GeneratorType {
    /// All defined generators in wire-id order.
    pub const ALL: [GeneratorType; 52] = [
        Self::StartAddrsOffset,
        Self::EndAddrsOffset,
        Self::StartloopAddrsOffset,
        Self::EndloopAddrsOffset,
        Self::StartAddrsCoarseOffset,
        Self::ModLfoToPitch,
        Self::VibLfoToPitch,
        Self::ModEnvToPitch,
        Self::InitialFilterFc,
        Self::InitialFilterQ,
        Self::ModLfoToFilterFc,
        Self::ModEnvToFilterFc,
        Self::EndAddrsCoarseOffset,
        Self::ModLfoToVolume,
        Self::ChorusEffectsSend,
        Self::ReverbEffectsSend,
        Self::Pan,
        Self::DelayModLfo,
        Self::FreqModLfo,
        Self::DelayVibLfo,
        Self::FreqVibLfo,
        Self::DelayModEnv,
        Self::AttackModEnv,
        Self::HoldModEnv,
        Self::DecayModEnv,
        Self::SustainModEnv,
        Self::ReleaseModEnv,
        Self::KeynumToModEnvHold,
        Self::KeynumToModEnvDecay,
        Self::DelayVolEnv,
        Self::AttackVolEnv,
        Self::HoldVolEnv,
        Self::DecayVolEnv,
        Self::SustainVolEnv,
        Self::ReleaseVolEnv,
        Self::KeynumToVolEnvHold,
        Self::KeynumToVolEnvDecay,
        Self::Instrument,
        Self::KeyRange,
        Self::VelRange,
        Self::StartloopAddrsCoarseOffset,
        Self::Keynum,
        Self::Velocity,
        Self::InitialAttenuation,
        Self::EndloopAddrsCoarseOffset,
        Self::CoarseTune,
        Self::FineTune,
        Self::SampleId,
        Self::SampleModes,
        Self::ScaleTuning,
        Self::ExclusiveClass,
        Self::OverridingRootKey,
    ];

    /// Look up a generator by its wire id.
    pub fn from_u16(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| *g as u16 == id)
    }

    /// Wire id.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Parameter table entry.
    pub const fn info(self) -> GeneratorInfo {
        use Scope::*;
        use Unit::*;
        match self {
            Self::StartAddrsOffset => info("startAddrsOffset", Samples, 0, 0, 32767, InstrumentOnly),
            Self::EndAddrsOffset => info("endAddrsOffset", Samples, 0, -32768, 0, InstrumentOnly),
            Self::StartloopAddrsOffset => {
                info("startloopAddrsOffset", Samples, 0, -32768, 32767, InstrumentOnly)
            }
            Self::EndloopAddrsOffset => {
                info("endloopAddrsOffset", Samples, 0, -32768, 32767, InstrumentOnly)
            }
            Self::StartAddrsCoarseOffset => {
                info("startAddrsCoarseOffset", CoarseSamples, 0, 0, 32767, InstrumentOnly)
            }
            Self::ModLfoToPitch => info("modLfoToPitch", Cents, 0, -12000, 12000, Any),
            Self::VibLfoToPitch => info("vibLfoToPitch", Cents, 0, -12000, 12000, Any),
            Self::ModEnvToPitch => info("modEnvToPitch", Cents, 0, -12000, 12000, Any),
            Self::InitialFilterFc => info("initialFilterFc", AbsoluteCents, 13500, 1500, 13500, Any),
            Self::InitialFilterQ => info("initialFilterQ", Centibels, 0, 0, 960, Any),
            Self::ModLfoToFilterFc => info("modLfoToFilterFc", Cents, 0, -12000, 12000, Any),
            Self::ModEnvToFilterFc => info("modEnvToFilterFc", Cents, 0, -12000, 12000, Any),
            Self::EndAddrsCoarseOffset => {
                info("endAddrsCoarseOffset", CoarseSamples, 0, -32768, 0, InstrumentOnly)
            }
            Self::ModLfoToVolume => info("modLfoToVolume", Centibels, 0, -960, 960, Any),
            Self::ChorusEffectsSend => info("chorusEffectsSend", Permille, 0, 0, 1000, Any),
            Self::ReverbEffectsSend => info("reverbEffectsSend", Permille, 0, 0, 1000, Any),
            Self::Pan => info("pan", Permille, 0, -500, 500, Any),
            Self::DelayModLfo => info("delayModLFO", Timecents, -12000, -12000, 5000, Any),
            Self::FreqModLfo => info("freqModLFO", AbsoluteCents, 0, -16000, 4500, Any),
            Self::DelayVibLfo => info("delayVibLFO", Timecents, -12000, -12000, 5000, Any),
            Self::FreqVibLfo => info("freqVibLFO", AbsoluteCents, 0, -16000, 4500, Any),
            Self::DelayModEnv => info("delayModEnv", Timecents, -12000, -12000, 5000, Any),
            Self::AttackModEnv => info("attackModEnv", Timecents, -12000, -12000, 8000, Any),
            Self::HoldModEnv => info("holdModEnv", Timecents, -12000, -12000, 5000, Any),
            Self::DecayModEnv => info("decayModEnv", Timecents, -12000, -12000, 8000, Any),
            Self::SustainModEnv => info("sustainModEnv", Permille, 0, 0, 1000, Any),
            Self::ReleaseModEnv => info("releaseModEnv", Timecents, -12000, -12000, 8000, Any),
            Self::KeynumToModEnvHold => {
                info("keynumToModEnvHold", TimecentsPerKey, 0, -1200, 1200, Any)
            }
            Self::KeynumToModEnvDecay => {
                info("keynumToModEnvDecay", TimecentsPerKey, 0, -1200, 1200, Any)
            }
            Self::DelayVolEnv => info("delayVolEnv", Timecents, -12000, -12000, 5000, Any),
            Self::AttackVolEnv => info("attackVolEnv", Timecents, -12000, -12000, 8000, Any),
            Self::HoldVolEnv => info("holdVolEnv", Timecents, -12000, -12000, 5000, Any),
            Self::DecayVolEnv => info("decayVolEnv", Timecents, -12000, -12000, 8000, Any),
            Self::SustainVolEnv => info("sustainVolEnv", Centibels, 0, 0, 1440, Any),
            Self::ReleaseVolEnv => info("releaseVolEnv", Timecents, -12000, -12000, 8000, Any),
            Self::KeynumToVolEnvHold => {
                info("keynumToVolEnvHold", TimecentsPerKey, 0, -1200, 1200, Any)
            }
            Self::KeynumToVolEnvDecay => {
                info("keynumToVolEnvDecay", TimecentsPerKey, 0, -1200, 1200, Any)
            }
            Self::Instrument => info("instrument", Index, 0, 0, 65535, PresetReference),
            Self::KeyRange => info("keyRange", Range, 0x7F00, 0, 127, Selector),
            Self::VelRange => info("velRange", Range, 0x7F00, 0, 127, Selector),
            Self::StartloopAddrsCoarseOffset => info(
                "startloopAddrsCoarseOffset",
                CoarseSamples,
                0,
                -32768,
                32767,
                InstrumentOnly,
            ),
            Self::Keynum => info("keynum", KeyNumber, -1, -1, 127, InstrumentOnly),
            Self::Velocity => info("velocity", Velocity, -1, -1, 127, InstrumentOnly),
            Self::InitialAttenuation => info("initialAttenuation", Centibels, 0, 0, 1440, Any),
            Self::EndloopAddrsCoarseOffset => info(
                "endloopAddrsCoarseOffset",
                CoarseSamples,
                0,
                -32768,
                32767,
                InstrumentOnly,
            ),
            Self::CoarseTune => info("coarseTune", Semitones, 0, -120, 120, Any),
            Self::FineTune => info("fineTune", Cents, 0, -99, 99, Any),
            Self::SampleId => info("sampleID", Index, 0, 0, 65535, InstrumentReference),
            Self::SampleModes => info("sampleModes", Number, 0, 0, 3, InstrumentOnly),
            Self::ScaleTuning => info("scaleTuning", CentsPerKey, 100, 0, 1200, Any),
            Self::ExclusiveClass => info("exclusiveClass", Number, 0, 0, 127, InstrumentOnly),
            Self::OverridingRootKey => {
                info("overridingRootKey", KeyNumber, -1, -1, 127, InstrumentOnly)
            }
        }
    }

    /// Format name, e.g. `attackVolEnv`.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Whether the generator may be set on a zone of the given level.
    pub fn allowed_at(self, level: Level) -> bool {
        match (self.info().scope, level) {
            (Scope::Any | Scope::Selector, _) => true,
            (Scope::InstrumentOnly | Scope::InstrumentReference, Level::Instrument) => true,
            (Scope::PresetReference, Level::Preset) => true,
            _ => false,
        }
    }

    /// Key/velocity range selectors.
    pub fn is_selector(self) -> bool {
        self.info().scope == Scope::Selector
    }

    /// Zone link generators (`instrument`, `sampleID`).
    pub fn is_reference(self) -> bool {
        matches!(
            self.info().scope,
            Scope::PresetReference | Scope::InstrumentReference
        )
    }

    /// Sample address offsets, fine or coarse.
    pub fn is_address_offset(self) -> bool {
        matches!(self.info().unit, Unit::Samples | Unit::CoarseSamples)
    }

    /// Generators whose wire word is unsigned.
    pub fn is_unsigned(self) -> bool {
        matches!(self.info().unit, Unit::Index | Unit::Range)
            || matches!(self, Self::SampleModes)
    }

    /// The coarse/fine partner of an offset or tuning generator.
    ///
    /// Partners add together into one effective value; setting one never
    /// clears the other.
    pub fn counterpart(self) -> Option<Self> {
        match self {
            Self::StartAddrsOffset => Some(Self::StartAddrsCoarseOffset),
            Self::StartAddrsCoarseOffset => Some(Self::StartAddrsOffset),
            Self::EndAddrsOffset => Some(Self::EndAddrsCoarseOffset),
            Self::EndAddrsCoarseOffset => Some(Self::EndAddrsOffset),
            Self::StartloopAddrsOffset => Some(Self::StartloopAddrsCoarseOffset),
            Self::StartloopAddrsCoarseOffset => Some(Self::StartloopAddrsOffset),
            Self::EndloopAddrsOffset => Some(Self::EndloopAddrsCoarseOffset),
            Self::EndloopAddrsCoarseOffset => Some(Self::EndloopAddrsOffset),
            Self::CoarseTune => Some(Self::FineTune),
            Self::FineTune => Some(Self::CoarseTune),
            _ => None,
        }
    }

    /// Valid interval for a value at the given level.
    ///
    /// Preset values are offsets added to the instrument value, so they may
    /// span the full width of the range in both directions.
    pub fn valid_range(self, level: Level) -> (i32, i32) {
        let info = self.info();
        match level {
            Level::Instrument => (info.min, info.max),
            Level::Preset => {
                let span = info.max - info.min;
                (-span, span)
            }
        }
    }

    /// Clamp a value into the valid range for the level.
    pub fn clamp(self, value: i32, level: Level) -> i32 {
        let (min, max) = self.valid_range(level);
        value.clamp(min, max)
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key or velocity range carried by a range generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub lo: u8,
    pub hi: u8,
}

impl Range {
    pub const FULL: Range = Range { lo: 0, hi: 127 };

    pub fn new(lo: u8, hi: u8) -> Self {
        Self { lo, hi }
    }

    /// Whether `value` lies inside the (inclusive) range.
    pub fn contains(&self, value: u8) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// Overlap of two ranges, if any.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo <= hi).then_some(Range { lo, hi })
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::FULL
    }
}

/// Raw 16-bit generator amount.
///
/// Stored exactly as read so that encoding reproduces the input word;
/// interpretation (signed, unsigned, byte pair) depends on the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Amount(u16);

impl Amount {
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn from_i16(value: i16) -> Self {
        Self(value as u16)
    }

    pub fn from_range(range: Range) -> Self {
        Self(u16::from(range.lo) | (u16::from(range.hi) << 8))
    }

    /// Build the wire word for `value` as interpreted by `generator`.
    pub fn for_generator(generator: GeneratorType, value: i32) -> Self {
        if generator.is_unsigned() {
            Self(value.clamp(0, u16::MAX as i32) as u16)
        } else {
            Self::from_i16(value.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
        }
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn as_i16(self) -> i16 {
        self.0 as i16
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn as_range(self) -> Range {
        Range {
            lo: (self.0 & 0xFF) as u8,
            hi: (self.0 >> 8) as u8,
        }
    }

    /// Numeric value as interpreted by `generator`.
    pub fn value(self, generator: GeneratorType) -> i32 {
        if generator.is_unsigned() {
            i32::from(self.as_u16())
        } else {
            i32::from(self.as_i16())
        }
    }
}

/// One (parameter id, amount) pair of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generator {
    pub kind: GeneratorType,
    pub amount: Amount,
}

impl Generator {
    pub fn new(kind: GeneratorType, amount: Amount) -> Self {
        Self { kind, amount }
    }

    /// Convenience constructor from a numeric value.
    pub fn with_value(kind: GeneratorType, value: i32) -> Self {
        Self::new(kind, Amount::for_generator(kind, value))
    }

    pub fn value(&self) -> i32 {
        self.amount.value(self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_ids_are_stable() {
        assert_eq!(GeneratorType::Pan.id(), 17);
        assert_eq!(GeneratorType::InitialAttenuation.id(), 48);
        assert_eq!(GeneratorType::OverridingRootKey.id(), 58);
        assert_eq!(GeneratorType::from_u16(53), Some(GeneratorType::SampleId));
        // Unused and reserved ids are not generators
        assert_eq!(GeneratorType::from_u16(14), None);
        assert_eq!(GeneratorType::from_u16(42), None);
        assert_eq!(GeneratorType::from_u16(60), None);
    }

    #[test]
    fn test_all_is_sorted_and_complete() {
        let ids: Vec<u16> = GeneratorType::ALL.iter().map(|g| g.id()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        for id in 0..GENERATOR_SLOTS as u16 {
            if let Some(g) = GeneratorType::from_u16(id) {
                assert_eq!(g.id(), id);
            }
        }
    }

    #[test]
    fn test_scope() {
        assert!(GeneratorType::Pan.allowed_at(Level::Preset));
        assert!(!GeneratorType::StartAddrsOffset.allowed_at(Level::Preset));
        assert!(!GeneratorType::SampleModes.allowed_at(Level::Preset));
        assert!(!GeneratorType::Instrument.allowed_at(Level::Instrument));
        assert!(GeneratorType::SampleId.allowed_at(Level::Instrument));
    }

    #[test]
    fn test_preset_range_is_relative() {
        assert_eq!(GeneratorType::Pan.valid_range(Level::Instrument), (-500, 500));
        assert_eq!(GeneratorType::Pan.valid_range(Level::Preset), (-1000, 1000));
        assert_eq!(GeneratorType::InitialAttenuation.clamp(2000, Level::Instrument), 1440);
    }

    #[test]
    fn test_amount_views() {
        let range = Amount::from_range(Range::new(36, 72));
        assert_eq!(range.raw(), 0x4824);
        assert_eq!(range.as_range(), Range::new(36, 72));

        let neg = Amount::for_generator(GeneratorType::Pan, -250);
        assert_eq!(neg.value(GeneratorType::Pan), -250);
        assert_eq!(neg.raw(), (-250i16) as u16);

        let idx = Amount::for_generator(GeneratorType::SampleId, 40000);
        assert_eq!(idx.value(GeneratorType::SampleId), 40000);
    }

    #[test]
    fn test_range_intersect() {
        let a = Range::new(0, 60);
        assert_eq!(a.intersect(&Range::new(50, 127)), Some(Range::new(50, 60)));
        assert_eq!(a.intersect(&Range::new(61, 127)), None);
        assert!(Range::FULL.contains(127));
    }
}
