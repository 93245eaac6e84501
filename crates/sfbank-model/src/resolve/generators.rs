//! Generator resolution: merging zone generators into effective values.

use crate::attributes::units;
use crate::attributes::{Amount, GeneratorType, Level, Range, GENERATOR_SLOTS};
use crate::error::Result;
use crate::ids::{InstrumentId, PresetId};
use crate::soundfont::SoundFont;
use crate::zone::{effective_range, ZoneParams};

/// Generators in effect for one note, before unit conversion.
///
/// Values are stored as merged from the zones. Selectors and zone references
/// never enter the set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    level: Level,
    values: [Option<Amount>; GENERATOR_SLOTS],
}

impl ParameterSet {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            values: [None; GENERATOR_SLOTS],
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Overlay a zone's generators on the set, in declaration order.
    pub fn apply(&mut self, params: &ZoneParams) {
        for generator in params.generators.iter() {
            if generator.kind.is_selector() || generator.kind.is_reference() {
                continue;
            }
            self.values[generator.kind.id() as usize] = Some(generator.amount);
        }
    }

    pub fn get(&self, kind: GeneratorType) -> Option<Amount> {
        self.values[kind.id() as usize]
    }

    pub fn is_set(&self, kind: GeneratorType) -> bool {
        self.get(kind).is_some()
    }

    /// Stored value, or the default (instruments) or zero offset (presets).
    pub fn raw_value(&self, kind: GeneratorType) -> i32 {
        match self.get(kind) {
            Some(amount) => amount.value(kind),
            None => match self.level {
                Level::Instrument => kind.info().default,
                Level::Preset => 0,
            },
        }
    }

    /// Stored value clamped into its valid range.
    pub fn value(&self, kind: GeneratorType) -> i32 {
        kind.clamp(self.raw_value(kind), self.level)
    }

    /// Explicitly set generators in wire-id order.
    pub fn iter(&self) -> impl Iterator<Item = (GeneratorType, Amount)> + '_ {
        GeneratorType::ALL
            .iter()
            .filter_map(|&g| self.get(g).map(|a| (g, a)))
    }

    /// Absolute values for a voice, with optional preset offsets added.
    pub fn effective(&self, preset: Option<&ParameterSet>) -> EffectiveValues {
        EffectiveValues::combine(self, preset)
    }
}

/// Absolute, clamped generator values with unit conversions.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveValues {
    values: [i32; GENERATOR_SLOTS],
}

impl EffectiveValues {
    /// Instrument values plus preset offsets, clamped to the valid range.
    pub fn combine(instrument: &ParameterSet, preset: Option<&ParameterSet>) -> Self {
        let mut values = [0; GENERATOR_SLOTS];
        for &kind in GeneratorType::ALL.iter() {
            if kind.is_selector() || kind.is_reference() {
                continue;
            }
            let mut value = instrument.raw_value(kind);
            if let Some(preset) = preset {
                if kind.allowed_at(Level::Preset) {
                    value += preset.get(kind).map_or(0, |a| a.value(kind));
                }
            }
            values[kind.id() as usize] = kind.clamp(value, Level::Instrument);
        }
        Self { values }
    }

    pub fn get(&self, kind: GeneratorType) -> i32 {
        self.values[kind.id() as usize]
    }

    /// Timecent generators in seconds.
    pub fn seconds(&self, kind: GeneratorType) -> f64 {
        units::timecents_to_seconds(self.get(kind))
    }

    /// Centibel generators in decibels.
    pub fn decibels(&self, kind: GeneratorType) -> f64 {
        units::centibels_to_db(self.get(kind))
    }

    /// Absolute-cent generators in hertz.
    pub fn hertz(&self, kind: GeneratorType) -> f64 {
        units::abs_cents_to_hz(self.get(kind))
    }

    /// Permille generators in percent.
    pub fn percent(&self, kind: GeneratorType) -> f64 {
        units::permille_to_percent(self.get(kind))
    }

    /// Combined fine + coarse address offset in sample points.
    ///
    /// Pass either generator of the pair.
    pub fn address_offset(&self, kind: GeneratorType) -> i64 {
        let (fine, coarse) = match kind.info().unit {
            crate::attributes::Unit::CoarseSamples => (kind.counterpart(), Some(kind)),
            _ => (Some(kind), kind.counterpart()),
        };
        let fine = fine.map_or(0, |g| i64::from(self.get(g)));
        let coarse = coarse.map_or(0, |g| i64::from(self.get(g)));
        fine + coarse * 32768
    }

    /// Total tuning in cents (coarse semitones plus fine cents).
    pub fn tuning_cents(&self) -> i32 {
        self.get(GeneratorType::CoarseTune) * 100 + self.get(GeneratorType::FineTune)
    }

    /// Key/velocity overrides and root key override, when set.
    pub fn key_override(&self, kind: GeneratorType) -> Option<u8> {
        u8::try_from(self.get(kind)).ok().filter(|k| *k <= 127)
    }
}

/// Whether a local zone plays at (key, velocity), falling back to the
/// global zone's ranges and then to the full range.
pub fn zone_matches(global: &ZoneParams, local: &ZoneParams, key: u8, velocity: u8) -> bool {
    let (keys, velocities) = zone_ranges(global, local);
    keys.contains(key) && velocities.contains(velocity)
}

/// Effective (key, velocity) ranges of a local zone.
pub fn zone_ranges(global: &ZoneParams, local: &ZoneParams) -> (Range, Range) {
    (
        effective_range(local.key_range(), global.key_range()),
        effective_range(local.vel_range(), global.vel_range()),
    )
}

fn merge<'a>(
    level: Level,
    global: &ZoneParams,
    locals: impl Iterator<Item = &'a ZoneParams>,
    key: u8,
    velocity: u8,
) -> ParameterSet {
    let mut set = ParameterSet::new(level);
    set.apply(global);
    for local in locals {
        if zone_matches(global, local, key, velocity) {
            set.apply(local);
        }
    }
    set
}

/// Merged instrument generators at (key, velocity): global zone first,
/// then every matching zone in declaration order.
pub fn resolve_instrument(
    font: &SoundFont,
    id: InstrumentId,
    key: u8,
    velocity: u8,
) -> Result<ParameterSet> {
    let instrument = font.instrument_ref(id)?;
    Ok(merge(
        Level::Instrument,
        &instrument.global,
        instrument.zones.iter().map(|z| &z.params),
        key,
        velocity,
    ))
}

/// Merged preset offsets at (key, velocity).
pub fn resolve_preset(font: &SoundFont, id: PresetId, key: u8, velocity: u8) -> Result<ParameterSet> {
    let preset = font.preset_ref(id)?;
    Ok(merge(
        Level::Preset,
        &preset.global,
        preset.zones.iter().map(|z| &z.params),
        key,
        velocity,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Generator;

    fn params(generators: &[Generator]) -> ZoneParams {
        let mut p = ZoneParams::new();
        for g in generators {
            p.generators.set(g.kind, g.amount);
        }
        p
    }

    #[test]
    fn test_defaults_and_clamp() {
        let mut set = ParameterSet::new(Level::Instrument);
        assert_eq!(set.value(GeneratorType::InitialFilterFc), 13500);
        assert_eq!(set.value(GeneratorType::AttackVolEnv), -12000);

        set.apply(&params(&[Generator::with_value(GeneratorType::Pan, 900)]));
        assert_eq!(set.raw_value(GeneratorType::Pan), 900);
        assert_eq!(set.value(GeneratorType::Pan), 500);

        let preset = ParameterSet::new(Level::Preset);
        assert_eq!(preset.value(GeneratorType::InitialFilterFc), 0);
    }

    #[test]
    fn test_selectors_are_not_values() {
        let mut set = ParameterSet::new(Level::Instrument);
        set.apply(&params(&[
            Generator::new(GeneratorType::KeyRange, Amount::from_range(Range::new(0, 60))),
            Generator::with_value(GeneratorType::FineTune, 12),
        ]));
        assert!(!set.is_set(GeneratorType::KeyRange));
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn test_zone_matches_uses_global_range() {
        let global = params(&[Generator::new(
            GeneratorType::KeyRange,
            Amount::from_range(Range::new(40, 50)),
        )]);
        let local = ZoneParams::new();
        assert!(zone_matches(&global, &local, 45, 100));
        assert!(!zone_matches(&global, &local, 60, 100));
        assert!(zone_matches(&ZoneParams::new(), &local, 0, 0));
    }

    #[test]
    fn test_effective_values() {
        let mut inst = ParameterSet::new(Level::Instrument);
        inst.apply(&params(&[
            Generator::with_value(GeneratorType::StartAddrsOffset, 10),
            Generator::with_value(GeneratorType::StartAddrsCoarseOffset, 2),
            Generator::with_value(GeneratorType::CoarseTune, -1),
            Generator::with_value(GeneratorType::AttackVolEnv, 0),
            Generator::with_value(GeneratorType::InitialAttenuation, 1400),
        ]));
        let mut preset = ParameterSet::new(Level::Preset);
        preset.apply(&params(&[
            Generator::with_value(GeneratorType::FineTune, 30),
            Generator::with_value(GeneratorType::InitialAttenuation, 100),
        ]));

        let values = inst.effective(Some(&preset));
        assert_eq!(values.address_offset(GeneratorType::StartAddrsOffset), 10 + 2 * 32768);
        assert_eq!(values.address_offset(GeneratorType::StartAddrsCoarseOffset), 10 + 2 * 32768);
        assert_eq!(values.tuning_cents(), -70);
        assert!((values.seconds(GeneratorType::AttackVolEnv) - 1.0).abs() < 1e-9);
        // 1400 + 100 clamps to the 1440 ceiling
        assert_eq!(values.get(GeneratorType::InitialAttenuation), 1440);
        assert_eq!(values.key_override(GeneratorType::OverridingRootKey), None);
    }
}
