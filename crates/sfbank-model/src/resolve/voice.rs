//! Voice-level resolution: preset zones layered over instrument zones.

use crate::attributes::{GeneratorType, Level, Modulator, Range};
use crate::error::Result;
use crate::ids::{InstrumentId, PresetId, SampleId};
use crate::soundfont::SoundFont;

use super::generators::{zone_ranges, EffectiveValues, ParameterSet};
use super::modulators::ModulatorSet;

/// Root key used for unpitched samples (original pitch 255).
pub const UNPITCHED_ROOT_KEY: u8 = 60;

/// One sounding layer at a given (key, velocity).
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    /// Preset zone index, `None` when resolving an instrument directly.
    pub preset_zone: Option<usize>,
    pub instrument: InstrumentId,
    pub instrument_zone: usize,
    pub sample: SampleId,
    pub key_range: Range,
    pub vel_range: Range,
    /// Key at which the sample plays at its recorded pitch.
    pub root_key: u8,
    pub values: EffectiveValues,
    /// Instrument modulators followed by preset modulators.
    pub modulators: Vec<Modulator>,
}

struct InstrumentLayer {
    zone: usize,
    sample: SampleId,
    key_range: Range,
    vel_range: Range,
    params: ParameterSet,
    modulators: Vec<Modulator>,
}

fn instrument_layers(
    font: &SoundFont,
    id: InstrumentId,
    accept: &dyn Fn(Range, Range) -> bool,
) -> Result<Vec<InstrumentLayer>> {
    let instrument = font.instrument_ref(id)?;
    let mut layers = Vec::new();
    for (index, zone) in instrument.zones.iter().enumerate() {
        let (key_range, vel_range) = zone_ranges(&instrument.global, &zone.params);
        if !accept(key_range, vel_range) {
            continue;
        }
        let mut params = ParameterSet::new(Level::Instrument);
        params.apply(&instrument.global);
        params.apply(&zone.params);
        let modulators = ModulatorSet::for_zone(
            Level::Instrument,
            &instrument.global.modulators,
            Some(&zone.params.modulators),
        )
        .active();
        layers.push(InstrumentLayer {
            zone: index,
            sample: zone.target,
            key_range,
            vel_range,
            params,
            modulators,
        });
    }
    Ok(layers)
}

fn root_key(font: &SoundFont, sample: SampleId, values: &EffectiveValues) -> Result<u8> {
    if let Some(key) = values.key_override(GeneratorType::OverridingRootKey) {
        return Ok(key);
    }
    let pitch = font.sample_ref(sample)?.original_pitch;
    Ok(if pitch <= 127 { pitch } else { UNPITCHED_ROOT_KEY })
}

/// Voices an instrument plays at (key, velocity), one per matching zone.
pub fn resolve_instrument_voices(
    font: &SoundFont,
    id: InstrumentId,
    key: u8,
    velocity: u8,
) -> Result<Vec<Voice>> {
    let mut voices = Vec::new();
    let accept = |keys: Range, vels: Range| keys.contains(key) && vels.contains(velocity);
    for layer in instrument_layers(font, id, &accept)? {
        let values = layer.params.effective(None);
        voices.push(Voice {
            preset_zone: None,
            instrument: id,
            instrument_zone: layer.zone,
            sample: layer.sample,
            key_range: layer.key_range,
            vel_range: layer.vel_range,
            root_key: root_key(font, layer.sample, &values)?,
            values,
            modulators: layer.modulators,
        });
    }
    Ok(voices)
}

/// Voices a preset plays at (key, velocity): every matching preset zone
/// crossed with every matching zone of its instrument.
///
/// Preset values (global then local) are added to the instrument values and
/// the sum is clamped to the valid range.
pub fn resolve_preset_voices(
    font: &SoundFont,
    id: PresetId,
    key: u8,
    velocity: u8,
) -> Result<Vec<Voice>> {
    layered_voices(font, id, Some((key, velocity)))
}

/// Every layer a preset can sound, whatever the note.
///
/// Each preset zone is crossed with each instrument zone whose ranges
/// overlap it; the voice ranges are the intersections. Used to flatten a
/// preset for formats without a preset level.
pub fn preset_layers(font: &SoundFont, id: PresetId) -> Result<Vec<Voice>> {
    layered_voices(font, id, None)
}

fn layered_voices(font: &SoundFont, id: PresetId, note: Option<(u8, u8)>) -> Result<Vec<Voice>> {
    let preset = font.preset_ref(id)?;
    let mut voices = Vec::new();
    for (index, zone) in preset.zones.iter().enumerate() {
        let (pkeys, pvels) = zone_ranges(&preset.global, &zone.params);
        if let Some((key, velocity)) = note {
            if !pkeys.contains(key) || !pvels.contains(velocity) {
                continue;
            }
        }
        let mut offsets = ParameterSet::new(Level::Preset);
        offsets.apply(&preset.global);
        offsets.apply(&zone.params);
        let preset_modulators = ModulatorSet::for_zone(
            Level::Preset,
            &preset.global.modulators,
            Some(&zone.params.modulators),
        )
        .active();

        let accept = |keys: Range, vels: Range| match note {
            Some((key, velocity)) => keys.contains(key) && vels.contains(velocity),
            None => keys.intersect(&pkeys).is_some() && vels.intersect(&pvels).is_some(),
        };
        for layer in instrument_layers(font, zone.target, &accept)? {
            let values = layer.params.effective(Some(&offsets));
            let mut modulators = layer.modulators;
            modulators.extend(preset_modulators.iter().copied());
            voices.push(Voice {
                preset_zone: Some(index),
                instrument: zone.target,
                instrument_zone: layer.zone,
                sample: layer.sample,
                key_range: layer.key_range.intersect(&pkeys).unwrap_or(layer.key_range),
                vel_range: layer.vel_range.intersect(&pvels).unwrap_or(layer.vel_range),
                root_key: root_key(font, layer.sample, &values)?,
                values,
                modulators,
            });
        }
    }
    Ok(voices)
}
