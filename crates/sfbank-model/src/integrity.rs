//! Referential integrity: delete-time checks and whole-graph audits.

use std::collections::HashMap;
use std::fmt;

use log::{info, warn};

use crate::attributes::Level;
use crate::error::{IntegrityError, ModelError, Result};
use crate::ids::{EntityKind, InstrumentId, PresetId, SampleId};
use crate::instrument::Instrument;
use crate::preset::Preset;
use crate::sample::Sample;
use crate::soundfont::{check_destination, validate_generator, SoundFont};
use crate::zone::ZoneParams;

/// What to do with zones that reference an entity being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Removal {
    /// Fail with [`IntegrityError::InUse`] while referenced.
    #[default]
    Reject,
    /// Remove the referencing zones as well.
    Cascade,
}

impl SoundFont {
    /// Instruments with at least one zone playing `sample`.
    pub fn sample_users(&self, sample: SampleId) -> Vec<InstrumentId> {
        self.instruments
            .iter()
            .filter(|(_, i)| i.uses_sample(sample))
            .map(|(id, _)| id)
            .collect()
    }

    /// Presets with at least one zone layering `instrument`.
    pub fn instrument_users(&self, instrument: InstrumentId) -> Vec<PresetId> {
        self.presets
            .iter()
            .filter(|(_, p)| p.uses_instrument(instrument))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn remove_sample(&mut self, id: SampleId, removal: Removal) -> Result<Sample> {
        let name = self.sample_ref(id)?.name.clone();
        let users = self.sample_users(id);
        if !users.is_empty() {
            match removal {
                Removal::Reject => {
                    return Err(IntegrityError::InUse {
                        kind: EntityKind::Sample,
                        name,
                        users: users
                            .iter()
                            .filter_map(|u| self.instruments.get(*u))
                            .map(|i| i.name.clone())
                            .collect(),
                    }
                    .into())
                }
                Removal::Cascade => {
                    for user in users {
                        if let Some(instrument) = self.instruments.get_mut(user) {
                            instrument.zones.retain(|z| z.target != id);
                        }
                    }
                    info!("Removed zones referencing sample '{}'", name);
                }
            }
        }
        self.detach(id);
        self.samples.remove(id).ok_or(ModelError::UnknownSample(id))
    }

    pub fn remove_instrument(&mut self, id: InstrumentId, removal: Removal) -> Result<Instrument> {
        let name = self.instrument_ref(id)?.name.clone();
        let users = self.instrument_users(id);
        if !users.is_empty() {
            match removal {
                Removal::Reject => {
                    return Err(IntegrityError::InUse {
                        kind: EntityKind::Instrument,
                        name,
                        users: users
                            .iter()
                            .filter_map(|u| self.presets.get(*u))
                            .map(|p| p.name.clone())
                            .collect(),
                    }
                    .into())
                }
                Removal::Cascade => {
                    for user in users {
                        if let Some(preset) = self.presets.get_mut(user) {
                            preset.zones.retain(|z| z.target != id);
                        }
                    }
                    info!("Removed zones referencing instrument '{}'", name);
                }
            }
        }
        self.instruments
            .remove(id)
            .ok_or(ModelError::UnknownInstrument(id))
    }

    /// Presets are never referenced, so removal always succeeds.
    pub fn remove_preset(&mut self, id: PresetId) -> Result<Preset> {
        self.presets.remove(id).ok_or(ModelError::UnknownPreset(id))
    }

    /// Fields a saved file must carry.
    pub fn validate_for_export(&self) -> Result<()> {
        if self.info.name.trim().is_empty() {
            return Err(IntegrityError::MissingField { field: "name" }.into());
        }
        Ok(())
    }

    /// Audit the whole graph.
    ///
    /// Editing operations keep these conditions from arising; the audit is
    /// for fonts built by loaders, which keep some problems as found.
    pub fn check(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        if self.info.name.trim().is_empty() {
            issues.push(Issue::MissingField("name"));
        }

        let mut names: HashMap<(EntityKind, &str), usize> = HashMap::new();
        for (_, s) in self.samples.iter() {
            *names.entry((EntityKind::Sample, s.name.as_str())).or_default() += 1;
        }
        for (_, i) in self.instruments.iter() {
            *names.entry((EntityKind::Instrument, i.name.as_str())).or_default() += 1;
        }
        for (_, p) in self.presets.iter() {
            *names.entry((EntityKind::Preset, p.name.as_str())).or_default() += 1;
        }
        let mut duplicates: Vec<_> = names
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|((kind, name), _)| Issue::DuplicateName {
                kind,
                name: name.to_string(),
            })
            .collect();
        duplicates.sort_by_key(|i| i.to_string());
        issues.extend(duplicates);

        for (id, sample) in self.samples.iter() {
            if let Some(partner) = sample.link().partner() {
                let back = self.samples.get(partner).map(|p| p.link());
                if back != Some(sample.link().mirrored(id)) {
                    issues.push(Issue::AsymmetricLink { sample: id });
                }
            }
            if !sample.rom && !sample.loop_fits(sample.loop_start, sample.loop_end) {
                issues.push(Issue::LoopOutOfBounds { sample: id });
            }
            if self.sample_users(id).is_empty() {
                issues.push(Issue::UnusedSample { sample: id });
            }
        }

        for (id, instrument) in self.instruments.iter() {
            audit_params(&instrument.global, Level::Instrument, &instrument.name, &mut issues);
            for (index, zone) in instrument.zones.iter().enumerate() {
                if !self.samples.contains(zone.target) {
                    issues.push(Issue::DanglingSample { instrument: id, zone: index });
                }
                audit_params(&zone.params, Level::Instrument, &instrument.name, &mut issues);
            }
        }

        let mut slots: HashMap<(u16, u16), usize> = HashMap::new();
        for (id, preset) in self.presets.iter() {
            *slots.entry((preset.bank, preset.program)).or_default() += 1;
            audit_params(&preset.global, Level::Preset, &preset.name, &mut issues);
            for (index, zone) in preset.zones.iter().enumerate() {
                if !self.instruments.contains(zone.target) {
                    issues.push(Issue::DanglingInstrument { preset: id, zone: index });
                }
                audit_params(&zone.params, Level::Preset, &preset.name, &mut issues);
            }
        }
        let mut taken: Vec<_> = slots.into_iter().filter(|(_, n)| *n > 1).collect();
        taken.sort();
        issues.extend(
            taken
                .into_iter()
                .map(|((bank, program), _)| Issue::DuplicateBankProgram { bank, program }),
        );

        if !issues.is_empty() {
            warn!("Integrity check found {} issue(s)", issues.len());
        }
        issues
    }
}

fn audit_params(params: &ZoneParams, level: Level, owner: &str, issues: &mut Vec<Issue>) {
    for generator in params.generators.iter() {
        if let Err(err) = validate_generator(*generator, level) {
            issues.push(Issue::InvalidValue {
                owner: owner.to_string(),
                error: err,
            });
        }
    }
    for entry in params.modulators.iter() {
        if let Err(err) = check_destination(entry.signature().destination, level) {
            issues.push(Issue::InvalidValue {
                owner: owner.to_string(),
                error: err,
            });
        }
    }
}

/// One finding of [`SoundFont::check`].
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    MissingField(&'static str),
    DuplicateName { kind: EntityKind, name: String },
    DuplicateBankProgram { bank: u16, program: u16 },
    AsymmetricLink { sample: SampleId },
    LoopOutOfBounds { sample: SampleId },
    UnusedSample { sample: SampleId },
    DanglingSample { instrument: InstrumentId, zone: usize },
    DanglingInstrument { preset: PresetId, zone: usize },
    /// A stored generator or modulator the editing API would reject.
    InvalidValue { owner: String, error: ModelError },
}

impl Issue {
    /// Unused samples are informational; everything else is a defect.
    pub fn is_warning_only(&self) -> bool {
        matches!(self, Self::UnusedSample { .. })
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "required field '{}' is empty", field),
            Self::DuplicateName { kind, name } => write!(f, "duplicate {} name '{}'", kind, name),
            Self::DuplicateBankProgram { bank, program } => {
                write!(f, "bank {} program {} used more than once", bank, program)
            }
            Self::AsymmetricLink { sample } => write!(f, "sample {} has a one-way stereo link", sample),
            Self::LoopOutOfBounds { sample } => write!(f, "sample {} loop exceeds its data", sample),
            Self::UnusedSample { sample } => write!(f, "sample {} is not used", sample),
            Self::DanglingSample { instrument, zone } => {
                write!(f, "instrument {} zone {} points at a missing sample", instrument, zone)
            }
            Self::DanglingInstrument { preset, zone } => {
                write!(f, "preset {} zone {} points at a missing instrument", preset, zone)
            }
            Self::InvalidValue { owner, error } => write!(f, "{}: {}", owner, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleData;
    use crate::zone::Zone;

    fn font_with_chain() -> (SoundFont, SampleId, InstrumentId, PresetId) {
        let mut font = SoundFont::new("Test");
        let s = font
            .add_sample(Sample::new("S", SampleData::from_pcm(vec![0; 8]), 22050))
            .unwrap();
        let i = font
            .add_instrument(Instrument::new("I").with_zone(Zone::new(s)))
            .unwrap();
        let p = font
            .add_preset(Preset::new("P", 0, 0).with_zone(Zone::new(i)))
            .unwrap();
        (font, s, i, p)
    }

    #[test]
    fn test_remove_referenced_instrument_rejected() {
        let (mut font, _, i, p) = font_with_chain();
        let err = font.remove_instrument(i, Removal::Reject).unwrap_err();
        match err {
            ModelError::Integrity(IntegrityError::InUse { kind, users, .. }) => {
                assert_eq!(kind, EntityKind::Instrument);
                assert_eq!(users, vec!["P".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(font.instrument(i).is_some());
        assert_eq!(font.preset(p).unwrap().zones.len(), 1);
    }

    #[test]
    fn test_cascade_leaves_no_dangling_zone() {
        let (mut font, s, i, p) = font_with_chain();
        font.remove_instrument(i, Removal::Cascade).unwrap();
        assert!(font.preset(p).unwrap().zones.is_empty());

        font.remove_sample(s, Removal::Reject).unwrap();
        let issues = font.check();
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_remove_sample_unlinks_partner() {
        let (mut font, s, _, _) = font_with_chain();
        let r = font
            .add_sample(Sample::new("R", SampleData::from_pcm(vec![0; 8]), 22050))
            .unwrap();
        font.link_stereo(s, r).unwrap();
        font.remove_sample(r, Removal::Reject).unwrap();
        assert_eq!(font.sample(s).unwrap().link(), crate::sample::SampleLink::Mono);
    }

    #[test]
    fn test_missing_name_is_integrity_error() {
        let font = SoundFont::new("");
        assert_eq!(
            font.validate_for_export(),
            Err(ModelError::Integrity(IntegrityError::MissingField { field: "name" }))
        );
        assert_eq!(font.check(), vec![Issue::MissingField("name")]);
    }
}
