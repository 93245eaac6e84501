//! Deep copy of samples, instruments and presets within or across fonts.
//!
//! A copy pulls in everything the selected entities reference (preset ->
//! instruments -> samples -> stereo partners) and remaps ids so the copy is
//! self-consistent. Sample frames are shared, never cloned.
//!
//! The pass runs on a working clone of the target and is committed only on
//! success, so a cancelled or failed copy leaves the target untouched.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{ModelError, Result};
use crate::ids::{EntityKind, InstrumentId, PresetId, SampleId};
use crate::soundfont::SoundFont;
use crate::zone::Zone;

/// Answer to a name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    ReplaceOne,
    ReplaceAll,
    DuplicateOne,
    DuplicateAll,
    IgnoreOne,
    IgnoreAll,
}

impl Choice {
    fn resolution(self) -> Resolution {
        match self {
            Self::ReplaceOne | Self::ReplaceAll => Resolution::Replace,
            Self::DuplicateOne | Self::DuplicateAll => Resolution::Duplicate,
            Self::IgnoreOne | Self::IgnoreAll => Resolution::Ignore,
        }
    }

    /// "-all" answers apply to every later collision without asking.
    pub fn is_sticky(self) -> bool {
        matches!(self, Self::ReplaceAll | Self::DuplicateAll | Self::IgnoreAll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Overwrite the existing entity in place, keeping its id.
    Replace,
    /// Insert a copy under a suffixed name.
    Duplicate,
    /// Reuse the existing entity.
    Ignore,
}

/// A name collision presented to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub kind: EntityKind,
    pub name: String,
}

/// Root of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtree {
    Sample(SampleId),
    Instrument(InstrumentId),
    Preset(PresetId),
}

/// Outcome of a copy: where every source entity ended up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateReport {
    pub samples: HashMap<SampleId, SampleId>,
    pub instruments: HashMap<InstrumentId, InstrumentId>,
    pub presets: HashMap<PresetId, PresetId>,
    pub created: usize,
    pub replaced: usize,
    pub ignored: usize,
}

type Resolver<'a> = dyn FnMut(&Collision) -> Choice + 'a;
type Progress<'a> = dyn FnMut(usize, usize) + 'a;

/// One duplication pass.
pub struct Duplicator<'a> {
    resolver: &'a mut Resolver<'a>,
    progress: Option<Box<Progress<'a>>>,
    cancel: CancelToken,
    suffix_start: u32,
    sticky: Option<Resolution>,
}

impl<'a> Duplicator<'a> {
    pub fn new(resolver: &'a mut Resolver<'a>) -> Self {
        Self {
            resolver,
            progress: None,
            cancel: CancelToken::new(),
            suffix_start: 2,
            sticky: None,
        }
    }

    /// First number tried when suffixing a colliding name.
    pub fn suffix_start(mut self, start: u32) -> Self {
        self.suffix_start = start;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Called with (done, total) after each copied entity.
    pub fn on_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Copy `items` inside one font.
    pub fn run_within(self, font: &mut SoundFont, items: &[Subtree]) -> Result<DuplicateReport> {
        let source = font.clone();
        self.run(&source, font, items)
    }

    /// Copy `items` of `source` into `target`.
    pub fn run(
        mut self,
        source: &SoundFont,
        target: &mut SoundFont,
        items: &[Subtree],
    ) -> Result<DuplicateReport> {
        let closure = Closure::collect(source, items)?;
        let total = closure.len();
        info!("Duplicating {} entities", total);

        let mut work = target.clone();
        let mut report = DuplicateReport::default();
        let mut relink = Vec::new();
        let mut done = 0;

        for &id in &closure.samples {
            self.cancel.check()?;
            let sample = source.sample_ref(id)?;
            let new_id = match self.place(&work, EntityKind::Sample, &sample.name) {
                Placement::Existing(existing, Resolution::Ignore) => {
                    report.ignored += 1;
                    work.find_sample(&existing).ok_or(ModelError::UnknownSample(id))?
                }
                Placement::Existing(existing, _) => {
                    let target_id = work.find_sample(&existing).ok_or(ModelError::UnknownSample(id))?;
                    if let Some(slot) = work.samples.get_mut(target_id) {
                        let link = slot.link;
                        *slot = sample.clone();
                        slot.name = existing;
                        slot.link = link;
                    }
                    report.replaced += 1;
                    relink.push(id);
                    target_id
                }
                Placement::New(name) => {
                    let mut copy = sample.clone();
                    copy.name = name;
                    report.created += 1;
                    relink.push(id);
                    work.add_sample(copy)?
                }
            };
            report.samples.insert(id, new_id);
            done += 1;
            self.report(done, total);
        }

        // Stereo pairs are re-established between the copies
        for id in relink {
            let link = source.sample_ref(id)?.link();
            let copy = report.samples[&id];
            if let Some(&partner) = link.partner().and_then(|p| report.samples.get(&p)) {
                if partner != copy {
                    work.set_link(copy, link.with_partner(partner))?;
                }
            }
        }

        for &id in &closure.instruments {
            self.cancel.check()?;
            let instrument = source.instrument_ref(id)?;
            let mut copy = instrument.clone();
            copy.zones = remap_zones(&instrument.zones, &report.samples)?;
            let new_id = match self.place(&work, EntityKind::Instrument, &instrument.name) {
                Placement::Existing(existing, Resolution::Ignore) => {
                    report.ignored += 1;
                    work.find_instrument(&existing)
                        .ok_or(ModelError::UnknownInstrument(id))?
                }
                Placement::Existing(existing, _) => {
                    let target_id = work
                        .find_instrument(&existing)
                        .ok_or(ModelError::UnknownInstrument(id))?;
                    if let Some(slot) = work.instruments.get_mut(target_id) {
                        slot.global = copy.global;
                        slot.zones = copy.zones;
                    }
                    report.replaced += 1;
                    target_id
                }
                Placement::New(name) => {
                    copy.name = name;
                    report.created += 1;
                    work.insert_instrument(copy)?
                }
            };
            report.instruments.insert(id, new_id);
            done += 1;
            self.report(done, total);
        }

        for &id in &closure.presets {
            self.cancel.check()?;
            let preset = source.preset_ref(id)?;
            let mut copy = preset.clone();
            copy.zones = remap_zones(&preset.zones, &report.instruments)?;
            let new_id = match self.place(&work, EntityKind::Preset, &preset.name) {
                Placement::Existing(existing, Resolution::Ignore) => {
                    report.ignored += 1;
                    work.find_preset_by_name(&existing)
                        .ok_or(ModelError::UnknownPreset(id))?
                }
                Placement::Existing(existing, _) => {
                    let target_id = work
                        .find_preset_by_name(&existing)
                        .ok_or(ModelError::UnknownPreset(id))?;
                    if let Some(slot) = work.presets.get_mut(target_id) {
                        slot.global = copy.global;
                        slot.zones = copy.zones;
                    }
                    report.replaced += 1;
                    target_id
                }
                Placement::New(name) => {
                    copy.name = name;
                    if work.find_preset(copy.bank, copy.program).is_some() {
                        let (bank, program) = work
                            .first_available_bank_program_from(copy.bank, copy.program)
                            .ok_or(ModelError::NoFreeBankProgram)?;
                        debug!(
                            "Preset copy '{}' placed at {:03}:{:03}",
                            copy.name, bank, program
                        );
                        copy.bank = bank;
                        copy.program = program;
                    }
                    report.created += 1;
                    work.insert_preset(copy)?
                }
            };
            report.presets.insert(id, new_id);
            done += 1;
            self.report(done, total);
        }

        *target = work;
        info!(
            "Duplication finished: {} created, {} replaced, {} ignored",
            report.created, report.replaced, report.ignored
        );
        Ok(report)
    }

    fn place(&mut self, work: &SoundFont, kind: EntityKind, name: &str) -> Placement {
        if !work.name_taken(kind, name) {
            return Placement::New(name.to_string());
        }
        let resolution = match self.sticky {
            Some(r) => r,
            None => {
                let choice = (self.resolver)(&Collision {
                    kind,
                    name: name.to_string(),
                });
                if choice.is_sticky() {
                    self.sticky = Some(choice.resolution());
                }
                choice.resolution()
            }
        };
        match resolution {
            Resolution::Duplicate => {
                Placement::New(work.unique_name(kind, name, self.suffix_start))
            }
            other => Placement::Existing(name.to_string(), other),
        }
    }

    fn report(&mut self, done: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress(done, total);
        }
    }
}

enum Placement {
    New(String),
    Existing(String, Resolution),
}

fn remap_zones<R, T>(zones: &[Zone<R>], map: &HashMap<R, T>) -> Result<Vec<Zone<T>>>
where
    R: Copy + Eq + std::hash::Hash + Into<MissingRef>,
    T: Copy,
{
    zones
        .iter()
        .map(|z| {
            let target = *map
                .get(&z.target)
                .ok_or_else(|| Into::<MissingRef>::into(z.target).error())?;
            Ok(Zone {
                target,
                params: z.params.clone(),
            })
        })
        .collect()
}

/// Reference that failed to remap.
enum MissingRef {
    Sample(SampleId),
    Instrument(InstrumentId),
}

impl MissingRef {
    fn error(self) -> ModelError {
        match self {
            Self::Sample(id) => ModelError::UnknownSample(id),
            Self::Instrument(id) => ModelError::UnknownInstrument(id),
        }
    }
}

impl From<SampleId> for MissingRef {
    fn from(id: SampleId) -> Self {
        Self::Sample(id)
    }
}

impl From<InstrumentId> for MissingRef {
    fn from(id: InstrumentId) -> Self {
        Self::Instrument(id)
    }
}

/// Everything reachable from the copy roots, in dependency order.
struct Closure {
    samples: BTreeSet<SampleId>,
    instruments: BTreeSet<InstrumentId>,
    presets: BTreeSet<PresetId>,
}

impl Closure {
    fn collect(font: &SoundFont, items: &[Subtree]) -> Result<Self> {
        let mut closure = Closure {
            samples: BTreeSet::new(),
            instruments: BTreeSet::new(),
            presets: BTreeSet::new(),
        };
        for item in items {
            match *item {
                Subtree::Preset(id) => {
                    closure.presets.insert(id);
                    for zone in &font.preset_ref(id)?.zones {
                        closure.instruments.insert(zone.target);
                    }
                }
                Subtree::Instrument(id) => {
                    font.instrument_ref(id)?;
                    closure.instruments.insert(id);
                }
                Subtree::Sample(id) => {
                    font.sample_ref(id)?;
                    closure.samples.insert(id);
                }
            }
        }
        for &id in &closure.instruments {
            for zone in &font.instrument_ref(id)?.zones {
                closure.samples.insert(zone.target);
            }
        }
        let partners: Vec<SampleId> = closure
            .samples
            .iter()
            .filter_map(|&id| font.sample(id).and_then(|s| s.link().partner()))
            .filter(|p| font.sample(*p).is_some())
            .collect();
        closure.samples.extend(partners);
        Ok(closure)
    }

    fn len(&self) -> usize {
        self.samples.len() + self.instruments.len() + self.presets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Instrument;
    use crate::preset::Preset;
    use crate::sample::{Sample, SampleData, SampleLink};

    fn drum_font() -> (SoundFont, SampleId, InstrumentId, PresetId) {
        let mut font = SoundFont::new("Drums");
        let kick = font
            .add_sample(Sample::new("Kick", SampleData::from_pcm(vec![1, 2, 3]), 44100))
            .unwrap();
        let inst = font
            .add_instrument(Instrument::new("Kit").with_zone(Zone::new(kick)))
            .unwrap();
        let preset = font
            .add_preset(Preset::new("Kit", 128, 0).with_zone(Zone::new(inst)))
            .unwrap();
        (font, kick, inst, preset)
    }

    #[test]
    fn test_duplicate_with_suffix() {
        let (mut font, kick, inst, _) = drum_font();
        let mut asked = 0;
        let mut resolver = |_: &Collision| {
            asked += 1;
            Choice::DuplicateOne
        };
        let report = Duplicator::new(&mut resolver)
            .run_within(&mut font, &[Subtree::Sample(kick)])
            .unwrap();

        let copy = report.samples[&kick];
        assert_ne!(copy, kick);
        assert_eq!(font.sample(copy).unwrap().name, "Kick2");
        assert_eq!(font.sample(kick).unwrap().name, "Kick");
        assert_eq!(font.instrument(inst).unwrap().zones[0].target, kick);
        assert!(font
            .sample(copy)
            .unwrap()
            .data
            .shares_pool(&font.sample(kick).unwrap().data));
        assert_eq!(asked, 1);
    }

    #[test]
    fn test_all_choice_is_sticky() {
        let (mut font, _, _, preset) = drum_font();
        let mut asked = Vec::new();
        let mut resolver = |c: &Collision| {
            asked.push(c.kind);
            Choice::DuplicateAll
        };
        let report = Duplicator::new(&mut resolver)
            .run_within(&mut font, &[Subtree::Preset(preset)])
            .unwrap();

        // One prompt for the first collision only
        assert_eq!(asked, vec![EntityKind::Sample]);
        assert_eq!(report.created, 3);

        let copy = font.preset(report.presets[&preset]).unwrap();
        assert_eq!(copy.name, "Kit2");
        assert_eq!((copy.bank, copy.program), (128, 1));
        let copied_inst = copy.zones[0].target;
        assert_eq!(font.instrument(copied_inst).unwrap().name, "Kit2");
        let copied_sample = font.instrument(copied_inst).unwrap().zones[0].target;
        assert_eq!(font.sample(copied_sample).unwrap().name, "Kick2");
    }

    #[test]
    fn test_ignore_reuses_existing() {
        let (source, _, inst, _) = drum_font();
        let (mut target, target_kick, _, _) = drum_font();
        let mut resolver = |c: &Collision| match c.kind {
            EntityKind::Sample => Choice::IgnoreOne,
            _ => Choice::DuplicateOne,
        };
        let report = Duplicator::new(&mut resolver)
            .run(&source, &mut target, &[Subtree::Instrument(inst)])
            .unwrap();

        assert_eq!(target.sample_count(), 1);
        let copied = target.instrument(report.instruments[&inst]).unwrap();
        assert_eq!(copied.name, "Kit2");
        assert_eq!(copied.zones[0].target, target_kick);
        assert_eq!(report.ignored, 1);
    }

    #[test]
    fn test_replace_keeps_id() {
        let (mut source, kick, _, _) = drum_font();
        source
            .set_sample_param(kick, crate::sample::SampleParam::OriginalPitch(36))
            .unwrap();
        let (mut target, target_kick, _, _) = drum_font();
        let mut resolver = |_: &Collision| Choice::ReplaceAll;
        Duplicator::new(&mut resolver)
            .run(&source, &mut target, &[Subtree::Sample(kick)])
            .unwrap();

        assert_eq!(target.sample_count(), 1);
        assert_eq!(target.sample(target_kick).unwrap().original_pitch, 36);
    }

    #[test]
    fn test_stereo_partner_comes_along() {
        let mut font = SoundFont::new("Stereo");
        let l = font
            .add_sample(Sample::new("Pad L", SampleData::from_pcm(vec![0; 4]), 44100))
            .unwrap();
        let r = font
            .add_sample(Sample::new("Pad R", SampleData::from_pcm(vec![0; 4]), 44100))
            .unwrap();
        font.link_stereo(l, r).unwrap();

        let mut resolver = |_: &Collision| Choice::DuplicateAll;
        let report = Duplicator::new(&mut resolver)
            .run_within(&mut font, &[Subtree::Sample(l)])
            .unwrap();

        let (l2, r2) = (report.samples[&l], report.samples[&r]);
        assert_eq!(font.sample(l2).unwrap().link(), SampleLink::Left(r2));
        assert_eq!(font.sample(r2).unwrap().link(), SampleLink::Right(l2));
        // Originals keep their pairing
        assert_eq!(font.sample(l).unwrap().link(), SampleLink::Left(r));
    }

    #[test]
    fn test_cancel_rolls_back() {
        let (mut font, _, _, preset) = drum_font();
        let token = CancelToken::new();
        let canceller = token.clone();
        let mut resolver = |_: &Collision| Choice::DuplicateAll;
        let result = Duplicator::new(&mut resolver)
            .cancel_token(token)
            .on_progress(move |done, _| {
                if done == 1 {
                    canceller.cancel();
                }
            })
            .run_within(&mut font, &[Subtree::Preset(preset)]);

        assert_eq!(result, Err(ModelError::Cancelled));
        assert_eq!(font.sample_count(), 1);
        assert_eq!(font.instrument_count(), 1);
        assert_eq!(font.preset_count(), 1);
    }
}
