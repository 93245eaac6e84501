//! The SoundFont container and its editing operations.
//!
//! All mutation of samples, instruments and presets goes through
//! [`SoundFont`] so that the structural invariants hold after every call:
//! unique names, unique bank/program pairs, resolvable zone targets,
//! symmetric stereo links and valid generator values.

use std::fmt;

use log::{debug, warn};

use crate::attributes::{
    Amount, Generator, GeneratorType, Level, ModDestination, Modulator, ModulatorSignature,
};
use crate::error::{ModelError, Result};
use crate::ids::{Arena, EntityKind, InstrumentId, PresetId, SampleId};
use crate::instrument::Instrument;
use crate::preset::{Preset, MAX_PROGRAM, PERCUSSION_BANK};
use crate::sample::{truncate_name, Sample, SampleLink, SampleParam, MAX_NAME_LEN};
use crate::zone::{Zone, ZoneModulator, ZoneParams};

/// Major.minor version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const SF2_01: Version = Version { major: 2, minor: 1 };
    pub const SF2_04: Version = Version { major: 2, minor: 4 };
    pub const SF3_01: Version = Version { major: 3, minor: 1 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Font-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    pub name: String,
    /// File format version.
    pub version: Version,
    pub sound_engine: String,
    pub rom_name: Option<String>,
    pub rom_version: Option<Version>,
    pub creation_date: Option<String>,
    /// Sound designers and engineers.
    pub engineers: Option<String>,
    pub product: Option<String>,
    pub copyright: Option<String>,
    pub comment: Option<String>,
    /// Tools that created or modified the file.
    pub software: Option<String>,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: Version::SF2_01,
            sound_engine: "EMU8000".to_string(),
            rom_name: None,
            rom_version: None,
            creation_date: None,
            engineers: None,
            product: None,
            copyright: None,
            comment: None,
            software: None,
        }
    }
}

/// Address of a zone inside the font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneRef {
    InstrumentGlobal(InstrumentId),
    Instrument(InstrumentId, usize),
    PresetGlobal(PresetId),
    Preset(PresetId, usize),
}

impl ZoneRef {
    pub fn level(&self) -> Level {
        match self {
            Self::InstrumentGlobal(_) | Self::Instrument(..) => Level::Instrument,
            Self::PresetGlobal(_) | Self::Preset(..) => Level::Preset,
        }
    }
}

/// A complete sound bank.
#[derive(Debug, Clone, Default)]
pub struct SoundFont {
    pub info: FontInfo,
    pub(crate) samples: Arena<SampleId, Sample>,
    pub(crate) instruments: Arena<InstrumentId, Instrument>,
    pub(crate) presets: Arena<PresetId, Preset>,
}

impl SoundFont {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: FontInfo {
                name: name.into(),
                ..FontInfo::default()
            },
            ..Self::default()
        }
    }

    // Accessors

    pub fn samples(&self) -> impl Iterator<Item = (SampleId, &Sample)> {
        self.samples.iter()
    }

    pub fn sample(&self, id: SampleId) -> Option<&Sample> {
        self.samples.get(id)
    }

    pub fn instruments(&self) -> impl Iterator<Item = (InstrumentId, &Instrument)> {
        self.instruments.iter()
    }

    pub fn instrument(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.get(id)
    }

    pub fn presets(&self) -> impl Iterator<Item = (PresetId, &Preset)> {
        self.presets.iter()
    }

    pub fn preset(&self, id: PresetId) -> Option<&Preset> {
        self.presets.get(id)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    pub fn preset_count(&self) -> usize {
        self.presets.len()
    }

    pub fn find_sample(&self, name: &str) -> Option<SampleId> {
        self.samples.iter().find(|(_, s)| s.name == name).map(|(id, _)| id)
    }

    pub fn find_instrument(&self, name: &str) -> Option<InstrumentId> {
        self.instruments
            .iter()
            .find(|(_, i)| i.name == name)
            .map(|(id, _)| id)
    }

    pub fn find_preset(&self, bank: u16, program: u16) -> Option<PresetId> {
        self.presets
            .iter()
            .find(|(_, p)| p.bank == bank && p.program == program)
            .map(|(id, _)| id)
    }

    pub fn find_preset_by_name(&self, name: &str) -> Option<PresetId> {
        self.presets.iter().find(|(_, p)| p.name == name).map(|(id, _)| id)
    }

    pub(crate) fn sample_ref(&self, id: SampleId) -> Result<&Sample> {
        self.samples.get(id).ok_or(ModelError::UnknownSample(id))
    }

    pub(crate) fn instrument_ref(&self, id: InstrumentId) -> Result<&Instrument> {
        self.instruments.get(id).ok_or(ModelError::UnknownInstrument(id))
    }

    pub(crate) fn preset_ref(&self, id: PresetId) -> Result<&Preset> {
        self.presets.get(id).ok_or(ModelError::UnknownPreset(id))
    }

    // Names

    /// Whether `name` is used by another entity of `kind`.
    pub fn name_taken(&self, kind: EntityKind, name: &str) -> bool {
        match kind {
            EntityKind::Sample => self.find_sample(name).is_some(),
            EntityKind::Instrument => self.find_instrument(name).is_some(),
            EntityKind::Preset => self.find_preset_by_name(name).is_some(),
        }
    }

    fn check_new_name(&self, kind: EntityKind, name: &str) -> Result<()> {
        if name.len() > MAX_NAME_LEN {
            return Err(ModelError::NameTooLong {
                name: name.to_string(),
                max: MAX_NAME_LEN,
            });
        }
        if self.name_taken(kind, name) {
            return Err(ModelError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// First free name of the form `<name><n>` with `n >= start`, the base
    /// truncated so the result still fits. `name` itself is returned when
    /// free.
    pub fn unique_name(&self, kind: EntityKind, name: &str, start: u32) -> String {
        let name = truncate_name(name);
        if !self.name_taken(kind, name) {
            return name.to_string();
        }
        let mut n = start;
        loop {
            let candidate = suffixed_name(name, n);
            if !self.name_taken(kind, &candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // Samples

    /// Add a sample. The name must be unique; the sample starts unlinked.
    pub fn add_sample(&mut self, mut sample: Sample) -> Result<SampleId> {
        self.check_new_name(EntityKind::Sample, &sample.name)?;
        sample.link = SampleLink::Mono;
        let id = self.samples.insert(sample);
        debug!("Added sample {}", id);
        Ok(id)
    }

    /// Bulk insertion used by loaders: duplicate names are renamed.
    pub fn insert_sample(&mut self, mut sample: Sample) -> SampleId {
        let name = self.unique_name(EntityKind::Sample, &sample.name, 2);
        if name != sample.name {
            warn!("Duplicate sample name '{}' renamed to '{}'", sample.name, name);
            sample.name = name;
        }
        sample.link = SampleLink::Mono;
        self.samples.insert(sample)
    }

    pub fn rename_sample(&mut self, id: SampleId, name: &str) -> Result<()> {
        if self.sample_ref(id)?.name == name {
            return Ok(());
        }
        self.check_new_name(EntityKind::Sample, name)?;
        if let Some(sample) = self.samples.get_mut(id) {
            sample.name = name.to_string();
        }
        Ok(())
    }

    /// Set the stereo link of `id`, mirroring it onto the partner.
    ///
    /// Any previous partner of either sample is unlinked first. `Mono`
    /// removes the link in both directions.
    pub fn set_link(&mut self, id: SampleId, link: SampleLink) -> Result<()> {
        self.sample_ref(id)?;
        if let Some(partner) = link.partner() {
            if partner == id {
                return Err(ModelError::InvalidLink {
                    sample: id,
                    reason: "a sample cannot be linked to itself".to_string(),
                });
            }
            self.sample_ref(partner)?;
        }

        self.detach(id);
        if let Some(partner) = link.partner() {
            self.detach(partner);
            if let Some(p) = self.samples.get_mut(partner) {
                p.link = link.mirrored(id);
            }
        }
        if let Some(s) = self.samples.get_mut(id) {
            s.link = link;
        }
        Ok(())
    }

    /// Link `left` and `right` as a stereo pair.
    pub fn link_stereo(&mut self, left: SampleId, right: SampleId) -> Result<()> {
        self.set_link(left, SampleLink::Left(right))
    }

    pub fn unlink(&mut self, id: SampleId) -> Result<()> {
        self.set_link(id, SampleLink::Mono)
    }

    /// Reset `id` and whoever points back at it to mono.
    pub(crate) fn detach(&mut self, id: SampleId) {
        let Some(old) = self.samples.get(id).and_then(|s| s.link.partner()) else {
            return;
        };
        if let Some(p) = self.samples.get_mut(old) {
            if p.link.partner() == Some(id) {
                p.link = SampleLink::Mono;
            }
        }
        if let Some(s) = self.samples.get_mut(id) {
            s.link = SampleLink::Mono;
        }
    }

    /// Change a sample parameter; linked partners receive the same value.
    pub fn set_sample_param(&mut self, id: SampleId, param: SampleParam) -> Result<()> {
        let mut targets = vec![id];
        targets.extend(self.sample_ref(id)?.link.partner());

        if let SampleParam::Loop { start, end } = param {
            for &t in &targets {
                let sample = self.sample_ref(t)?;
                if !sample.loop_fits(start, end) {
                    return Err(ModelError::InvalidLoop {
                        sample: t,
                        start,
                        end,
                        len: sample.len(),
                    });
                }
            }
        }

        for t in targets {
            if let Some(sample) = self.samples.get_mut(t) {
                match param {
                    SampleParam::SampleRate(rate) => sample.sample_rate = rate,
                    SampleParam::OriginalPitch(key) => sample.original_pitch = key,
                    SampleParam::PitchCorrection(cents) => sample.pitch_correction = cents,
                    SampleParam::Loop { start, end } => {
                        sample.loop_start = start;
                        sample.loop_end = end;
                    }
                }
            }
        }
        Ok(())
    }

    // Instruments

    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<InstrumentId> {
        self.check_new_name(EntityKind::Instrument, &instrument.name)?;
        self.check_instrument_targets(&instrument)?;
        validate_params(&instrument.global, Level::Instrument)?;
        for zone in &instrument.zones {
            validate_params(&zone.params, Level::Instrument)?;
        }
        Ok(self.instruments.insert(instrument))
    }

    /// Bulk insertion used by loaders: names are made unique, values are
    /// taken as they are, zone targets must exist.
    pub fn insert_instrument(&mut self, mut instrument: Instrument) -> Result<InstrumentId> {
        self.check_instrument_targets(&instrument)?;
        let name = self.unique_name(EntityKind::Instrument, &instrument.name, 2);
        if name != instrument.name {
            warn!("Duplicate instrument name '{}' renamed to '{}'", instrument.name, name);
            instrument.name = name;
        }
        Ok(self.instruments.insert(instrument))
    }

    fn check_instrument_targets(&self, instrument: &Instrument) -> Result<()> {
        for zone in &instrument.zones {
            self.sample_ref(zone.target)?;
        }
        Ok(())
    }

    pub fn rename_instrument(&mut self, id: InstrumentId, name: &str) -> Result<()> {
        if self.instrument_ref(id)?.name == name {
            return Ok(());
        }
        self.check_new_name(EntityKind::Instrument, name)?;
        if let Some(instrument) = self.instruments.get_mut(id) {
            instrument.name = name.to_string();
        }
        Ok(())
    }

    /// Append a zone playing `sample`. Returns the zone index.
    pub fn add_instrument_zone(&mut self, id: InstrumentId, sample: SampleId) -> Result<usize> {
        self.sample_ref(sample)?;
        let instrument = self
            .instruments
            .get_mut(id)
            .ok_or(ModelError::UnknownInstrument(id))?;
        instrument.zones.push(Zone::new(sample));
        Ok(instrument.zones.len() - 1)
    }

    // Presets

    pub fn add_preset(&mut self, preset: Preset) -> Result<PresetId> {
        self.check_new_name(EntityKind::Preset, &preset.name)?;
        check_bank_program(preset.bank, preset.program)?;
        if self.find_preset(preset.bank, preset.program).is_some() {
            return Err(ModelError::BankProgramTaken {
                bank: preset.bank,
                program: preset.program,
            });
        }
        self.check_preset_targets(&preset)?;
        validate_params(&preset.global, Level::Preset)?;
        for zone in &preset.zones {
            validate_params(&zone.params, Level::Preset)?;
        }
        Ok(self.presets.insert(preset))
    }

    /// Bulk insertion used by loaders: names are made unique and a taken
    /// bank/program moves to the first free slot.
    pub fn insert_preset(&mut self, mut preset: Preset) -> Result<PresetId> {
        self.check_preset_targets(&preset)?;
        let name = self.unique_name(EntityKind::Preset, &preset.name, 2);
        if name != preset.name {
            warn!("Duplicate preset name '{}' renamed to '{}'", preset.name, name);
            preset.name = name;
        }
        if self.find_preset(preset.bank, preset.program).is_some() {
            let (bank, program) = self
                .first_available_bank_program_from(preset.bank, preset.program)
                .ok_or(ModelError::NoFreeBankProgram)?;
            warn!(
                "Preset '{}' moved from {:03}:{:03} to free slot {:03}:{:03}",
                preset.name, preset.bank, preset.program, bank, program
            );
            preset.bank = bank;
            preset.program = program;
        }
        Ok(self.presets.insert(preset))
    }

    fn check_preset_targets(&self, preset: &Preset) -> Result<()> {
        for zone in &preset.zones {
            self.instrument_ref(zone.target)?;
        }
        Ok(())
    }

    pub fn rename_preset(&mut self, id: PresetId, name: &str) -> Result<()> {
        if self.preset_ref(id)?.name == name {
            return Ok(());
        }
        self.check_new_name(EntityKind::Preset, name)?;
        if let Some(preset) = self.presets.get_mut(id) {
            preset.name = name.to_string();
        }
        Ok(())
    }

    pub fn set_bank_program(&mut self, id: PresetId, bank: u16, program: u16) -> Result<()> {
        self.preset_ref(id)?;
        check_bank_program(bank, program)?;
        match self.find_preset(bank, program) {
            Some(other) if other != id => Err(ModelError::BankProgramTaken { bank, program }),
            _ => {
                if let Some(preset) = self.presets.get_mut(id) {
                    preset.bank = bank;
                    preset.program = program;
                }
                Ok(())
            }
        }
    }

    /// Append a zone layering `instrument`. Returns the zone index.
    pub fn add_preset_zone(&mut self, id: PresetId, instrument: InstrumentId) -> Result<usize> {
        self.instrument_ref(instrument)?;
        let preset = self.presets.get_mut(id).ok_or(ModelError::UnknownPreset(id))?;
        preset.zones.push(Zone::new(instrument));
        Ok(preset.zones.len() - 1)
    }

    /// Lowest free bank/program pair, scanning banks 0..=128.
    pub fn first_available_bank_program(&self) -> Option<(u16, u16)> {
        self.first_available_bank_program_from(0, 0)
    }

    /// First free bank/program pair at or after the given slot, wrapping
    /// around once.
    pub fn first_available_bank_program_from(&self, bank: u16, program: u16) -> Option<(u16, u16)> {
        let slots = (PERCUSSION_BANK as usize + 1) * (MAX_PROGRAM as usize + 1);
        let start = (bank.min(PERCUSSION_BANK) as usize) * (MAX_PROGRAM as usize + 1)
            + program.min(MAX_PROGRAM) as usize;
        (0..slots)
            .map(|i| (start + i) % slots)
            .map(|slot| {
                (
                    (slot / (MAX_PROGRAM as usize + 1)) as u16,
                    (slot % (MAX_PROGRAM as usize + 1)) as u16,
                )
            })
            .find(|&(b, p)| self.find_preset(b, p).is_none())
    }

    // Zones

    pub fn zone_params(&self, zone: ZoneRef) -> Result<&ZoneParams> {
        match zone {
            ZoneRef::InstrumentGlobal(id) => Ok(&self.instrument_ref(id)?.global),
            ZoneRef::Instrument(id, index) => {
                let zones = &self.instrument_ref(id)?.zones;
                zones
                    .get(index)
                    .map(|z| &z.params)
                    .ok_or(ModelError::ZoneOutOfBounds { index, len: zones.len() })
            }
            ZoneRef::PresetGlobal(id) => Ok(&self.preset_ref(id)?.global),
            ZoneRef::Preset(id, index) => {
                let zones = &self.preset_ref(id)?.zones;
                zones
                    .get(index)
                    .map(|z| &z.params)
                    .ok_or(ModelError::ZoneOutOfBounds { index, len: zones.len() })
            }
        }
    }

    fn zone_params_mut(&mut self, zone: ZoneRef) -> Result<&mut ZoneParams> {
        match zone {
            ZoneRef::InstrumentGlobal(id) => self
                .instruments
                .get_mut(id)
                .map(|i| &mut i.global)
                .ok_or(ModelError::UnknownInstrument(id)),
            ZoneRef::Instrument(id, index) => {
                let zones = &mut self
                    .instruments
                    .get_mut(id)
                    .ok_or(ModelError::UnknownInstrument(id))?
                    .zones;
                let len = zones.len();
                zones
                    .get_mut(index)
                    .map(|z| &mut z.params)
                    .ok_or(ModelError::ZoneOutOfBounds { index, len })
            }
            ZoneRef::PresetGlobal(id) => self
                .presets
                .get_mut(id)
                .map(|p| &mut p.global)
                .ok_or(ModelError::UnknownPreset(id)),
            ZoneRef::Preset(id, index) => {
                let zones = &mut self
                    .presets
                    .get_mut(id)
                    .ok_or(ModelError::UnknownPreset(id))?
                    .zones;
                let len = zones.len();
                zones
                    .get_mut(index)
                    .map(|z| &mut z.params)
                    .ok_or(ModelError::ZoneOutOfBounds { index, len })
            }
        }
    }

    /// Remove a local zone, or clear a global one.
    pub fn remove_zone(&mut self, zone: ZoneRef) -> Result<()> {
        match zone {
            ZoneRef::InstrumentGlobal(_) | ZoneRef::PresetGlobal(_) => {
                *self.zone_params_mut(zone)? = ZoneParams::new();
            }
            ZoneRef::Instrument(id, index) => {
                let zones = &mut self
                    .instruments
                    .get_mut(id)
                    .ok_or(ModelError::UnknownInstrument(id))?
                    .zones;
                if index >= zones.len() {
                    return Err(ModelError::ZoneOutOfBounds { index, len: zones.len() });
                }
                zones.remove(index);
            }
            ZoneRef::Preset(id, index) => {
                let zones = &mut self
                    .presets
                    .get_mut(id)
                    .ok_or(ModelError::UnknownPreset(id))?
                    .zones;
                if index >= zones.len() {
                    return Err(ModelError::ZoneOutOfBounds { index, len: zones.len() });
                }
                zones.remove(index);
            }
        }
        Ok(())
    }

    /// Set a generator on a zone. Returns the previous amount.
    pub fn set_generator(&mut self, zone: ZoneRef, generator: Generator) -> Result<Option<Amount>> {
        validate_generator(generator, zone.level())?;
        let params = self.zone_params_mut(zone)?;
        Ok(params.generators.set(generator.kind, generator.amount))
    }

    pub fn unset_generator(&mut self, zone: ZoneRef, kind: GeneratorType) -> Result<Option<Amount>> {
        Ok(self.zone_params_mut(zone)?.generators.remove(kind))
    }

    /// Add an explicit modulator; its signature must be new to the zone.
    pub fn add_modulator(&mut self, zone: ZoneRef, modulator: Modulator) -> Result<()> {
        check_destination(modulator.destination, zone.level())?;
        self.zone_params_mut(zone)?.modulators.add(modulator)
    }

    /// Add or overwrite the modulator with the same signature.
    pub fn replace_modulator(
        &mut self,
        zone: ZoneRef,
        modulator: Modulator,
    ) -> Result<Option<ZoneModulator>> {
        check_destination(modulator.destination, zone.level())?;
        Ok(self.zone_params_mut(zone)?.modulators.replace(modulator))
    }

    /// Suppress the inherited modulator with this signature.
    pub fn disable_modulator(
        &mut self,
        zone: ZoneRef,
        signature: ModulatorSignature,
    ) -> Result<Option<ZoneModulator>> {
        check_destination(signature.destination, zone.level())?;
        Ok(self.zone_params_mut(zone)?.modulators.disable(signature))
    }

    pub fn remove_modulator(
        &mut self,
        zone: ZoneRef,
        signature: &ModulatorSignature,
    ) -> Result<ZoneModulator> {
        self.zone_params_mut(zone)?
            .modulators
            .remove(signature)
            .ok_or(ModelError::UnknownModulator(*signature))
    }
}

/// `base` with a numeric suffix, truncated to fit the name limit.
pub fn suffixed_name(base: &str, n: u32) -> String {
    let suffix = n.to_string();
    let mut end = base.len().min(MAX_NAME_LEN.saturating_sub(suffix.len()));
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &base[..end], suffix)
}

fn check_bank_program(bank: u16, program: u16) -> Result<()> {
    if bank > PERCUSSION_BANK || program > MAX_PROGRAM {
        return Err(ModelError::InvalidBankProgram { bank, program });
    }
    Ok(())
}

/// Validate a generator for a zone of the given level.
pub fn validate_generator(generator: Generator, level: Level) -> Result<()> {
    let kind = generator.kind;
    if kind.is_reference() {
        return Err(ModelError::ReferenceGenerator(kind));
    }
    if !kind.allowed_at(level) {
        return Err(ModelError::ForbiddenAtPresetLevel(kind));
    }
    if kind.is_selector() {
        let range = generator.amount.as_range();
        if range.lo > range.hi || range.hi > 127 {
            return Err(ModelError::OutOfRange {
                generator: kind,
                value: i32::from(generator.amount.raw()),
                min: 0,
                max: 127,
            });
        }
        return Ok(());
    }
    let value = generator.value();
    let (min, max) = kind.valid_range(level);
    if value < min || value > max {
        return Err(ModelError::OutOfRange {
            generator: kind,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Reject modulator destinations a zone of this level cannot modulate.
pub fn check_destination(destination: ModDestination, level: Level) -> Result<()> {
    if let ModDestination::Generator(g) = destination {
        if g.is_selector() || g.is_reference() || !g.allowed_at(level) {
            return Err(ModelError::InvalidModulatorDestination { destination: g });
        }
    }
    Ok(())
}

fn validate_params(params: &ZoneParams, level: Level) -> Result<()> {
    for generator in params.generators.iter() {
        validate_generator(*generator, level)?;
    }
    for entry in params.modulators.iter() {
        check_destination(entry.signature().destination, level)?;
    }
    Ok(())
}
