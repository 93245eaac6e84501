//! Decoding of SF2 and compressed sound banks.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use log::{debug, info};
use sfbank_model::soundfont::{check_destination, validate_generator};
use sfbank_model::{
    Amount, CancelToken, EntityKind, FontInfo, Generator, GeneratorType, Instrument, InstrumentId,
    Level, ModDestination, ModSource, ModelError, Modulator, Preset, Sample, SampleData, SampleId,
    SampleLink, SoundFont, Transform, Version, Zone, ZoneParams,
};

use crate::codec::SampleCodec;
use crate::error::{Result, Sf2Error};
use crate::records::{
    decode_name, read_table, Bag, DisabledMark, GenRecord, InstrumentHeader, ModRecord, PresetHeader,
    SampleHeader, DISABLED_CHUNK, MARK_INSTRUMENT, MARK_PRESET, SAMPLE_TYPE_LEFT, SAMPLE_TYPE_LINKED, SAMPLE_TYPE_MONO, SAMPLE_TYPE_RIGHT,
};
use crate::report::{LoadReport, LoadWarning};
use crate::riff::{read_riff, Chunk, INFO, LIST, PDTA, SDTA, SFBK};

/// A decoded font and the corrections made while reading it.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub font: SoundFont,
    pub report: LoadReport,
}

/// Decode a bank with default options.
pub fn read_sf2(bytes: &[u8]) -> Result<Loaded> {
    Sf2Reader::new().read(bytes)
}

/// Configurable decoder.
///
/// Cancellation is checked before each sample, instrument and preset; a
/// cancelled read returns [`ModelError::Cancelled`] and no font.
pub struct Sf2Reader<'a> {
    codec: Option<&'a dyn SampleCodec>,
    cancel: CancelToken,
    progress: Option<Box<dyn FnMut(usize, usize) + 'a>>,
}

impl Default for Sf2Reader<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Sf2Reader<'a> {
    pub fn new() -> Self {
        Self {
            codec: None,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Codec for compressed sample blocks.
    pub fn codec(mut self, codec: &'a dyn SampleCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Called with (done, total) after each entity.
    pub fn on_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn read(mut self, bytes: &[u8]) -> Result<Loaded> {
        let riff = read_riff(bytes, SFBK)?;
        let lists = Lists::find(&riff)?;

        let (info, marks) = parse_info(&lists.info)?;
        let version = info.version;
        if version.major != 2 && version.major != 3 {
            return Err(Sf2Error::UnsupportedVersion(version));
        }
        debug!("Reading sound bank version {}", version);

        let mut tables = Tables::parse(&lists.pdta)?;
        tables.mark_disabled(&marks);
        let mut font = SoundFont::default();
        font.info = info;
        let mut report = LoadReport::default();

        let total = tables.sample_count() + tables.instrument_count() + tables.preset_count();
        let mut done = 0;

        let pool = SamplePool::parse(&lists.sdta, version, &mut report)?;
        let mut sample_ids = Vec::with_capacity(tables.sample_count());
        for header in &tables.shdr[..tables.sample_count()] {
            self.cancel.check()?;
            let sample = self.decode_sample(header, &pool, version, &mut report)?;
            let name = sample.name.clone();
            let id = font.insert_sample(sample);
            note_rename(EntityKind::Sample, &name, font.sample(id).map(|s| s.name.as_str()), &mut report);
            sample_ids.push(id);
            done += 1;
            self.report_progress(done, total);
        }
        link_samples(&mut font, &tables.shdr[..tables.sample_count()], &sample_ids, &mut report)?;

        let mut instrument_ids = Vec::with_capacity(tables.instrument_count());
        for i in 0..tables.instrument_count() {
            self.cancel.check()?;
            let instrument = decode_instrument(&tables, i, &sample_ids, &mut report)?;
            let name = instrument.name.clone();
            let id = font.insert_instrument(instrument)?;
            note_rename(
                EntityKind::Instrument,
                &name,
                font.instrument(id).map(|i| i.name.as_str()),
                &mut report,
            );
            instrument_ids.push(id);
            done += 1;
            self.report_progress(done, total);
        }

        for i in 0..tables.preset_count() {
            self.cancel.check()?;
            let preset = decode_preset(&tables, i, &instrument_ids, &mut report)?;
            let (name, slot) = (preset.name.clone(), (preset.bank, preset.program));
            let id = font.insert_preset(preset)?;
            if let Some(stored) = font.preset(id) {
                if stored.name != name {
                    report.push(LoadWarning::Renamed {
                        kind: EntityKind::Preset,
                        from: name.clone(),
                        to: stored.name.clone(),
                    });
                }
                if (stored.bank, stored.program) != slot {
                    report.push(LoadWarning::PresetMoved {
                        name: stored.name.clone(),
                        from: slot,
                        to: (stored.bank, stored.program),
                    });
                }
            }
            done += 1;
            self.report_progress(done, total);
        }

        info!(
            "Loaded '{}': {} samples, {} instruments, {} presets ({} warnings)",
            font.info.name,
            font.sample_count(),
            font.instrument_count(),
            font.preset_count(),
            report.len()
        );
        Ok(Loaded { font, report })
    }

    fn report_progress(&mut self, done: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress(done, total);
        }
    }

    fn decode_sample(
        &self,
        header: &SampleHeader,
        pool: &SamplePool,
        version: Version,
        report: &mut LoadReport,
    ) -> Result<Sample> {
        let (data, base) = if header.is_rom() {
            (SampleData::default(), header.start)
        } else if header.is_compressed() {
            if version.major < 3 {
                return Err(Sf2Error::corrupt(format!(
                    "sample '{}' is compressed in a version {} file",
                    header.name, version
                )));
            }
            (self.decode_block(header, pool)?, 0)
        } else {
            let start = header.start as usize;
            let end = header.end as usize;
            if start > end {
                return Err(Sf2Error::corrupt(format!(
                    "sample '{}' range {}..{} is inverted",
                    header.name, start, end
                )));
            }
            let data = SampleData::window(pool.frames.clone(), pool.low.clone(), start, end - start)
                .ok_or_else(|| {
                    Sf2Error::corrupt(format!(
                        "sample '{}' range {}..{} exceeds the sample data",
                        header.name, start, end
                    ))
                })?;
            (data, header.start)
        };

        let mut loop_start = header.loop_start.saturating_sub(base);
        let mut loop_end = header.loop_end.saturating_sub(base);
        if !header.is_rom() {
            let len = data.len() as u32;
            let fits = header.loop_start >= base && loop_start <= loop_end && loop_end <= len;
            if !fits {
                report.push(LoadWarning::LoopOutOfBounds {
                    sample: header.name.clone(),
                });
                loop_start = loop_start.min(len);
                loop_end = loop_end.clamp(loop_start, len);
            }
        }

        let mut sample = Sample::new(header.name.clone(), data, header.sample_rate)
            .with_pitch(header.original_pitch, header.pitch_correction)
            .with_loop(loop_start, loop_end);
        sample.rom = header.is_rom();
        Ok(sample)
    }

    /// Decode a `[u32 length][payload]` block at a byte offset of `smpl`.
    fn decode_block(&self, header: &SampleHeader, pool: &SamplePool) -> Result<SampleData> {
        let codec = self.codec.ok_or_else(|| Sf2Error::Codec {
            sample: header.name.clone(),
            reason: "no sample codec configured".to_string(),
        })?;
        let start = header.start as usize;
        let prefix = pool
            .raw
            .get(start..start + 4)
            .ok_or_else(|| Sf2Error::corrupt(format!("sample '{}' block offset out of bounds", header.name)))?;
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let payload = pool
            .raw
            .get(start + 4..start + 4 + len)
            .ok_or_else(|| Sf2Error::corrupt(format!("sample '{}' block is truncated", header.name)))?;
        let frames = codec.decode(payload).map_err(|e| Sf2Error::Codec {
            sample: header.name.clone(),
            reason: e.to_string(),
        })?;
        debug!(
            "Decoded '{}' with {}: {} bytes -> {} frames",
            header.name,
            codec.name(),
            len,
            frames.len()
        );
        Ok(SampleData::from_pcm(frames))
    }
}

fn note_rename(
    kind: EntityKind,
    from: &str,
    to: Option<&str>,
    report: &mut LoadReport,
) {
    if let Some(to) = to {
        if to != from {
            report.push(LoadWarning::Renamed {
                kind,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }
}

/// The three top-level lists.
struct Lists<'a> {
    info: Chunk<'a>,
    sdta: Chunk<'a>,
    pdta: Chunk<'a>,
}

impl<'a> Lists<'a> {
    fn find(riff: &Chunk<'a>) -> Result<Self> {
        let (mut info, mut sdta, mut pdta) = (None, None, None);
        for chunk in riff.children() {
            let chunk = chunk?;
            if chunk.id != LIST {
                debug!("Skipping top-level chunk '{}'", chunk.id);
                continue;
            }
            match chunk.form() {
                Some(INFO) => info = Some(chunk),
                Some(SDTA) => sdta = Some(chunk),
                Some(PDTA) => pdta = Some(chunk),
                other => debug!("Skipping LIST {:?}", other),
            }
        }
        Ok(Self {
            info: info.ok_or(Sf2Error::MissingChunk("INFO"))?,
            sdta: sdta.ok_or(Sf2Error::MissingChunk("sdta"))?,
            pdta: pdta.ok_or(Sf2Error::MissingChunk("pdta"))?,
        })
    }
}

fn text(data: &[u8]) -> String {
    decode_name(data)
}

fn read_version(data: &[u8]) -> Result<Version> {
    if data.len() != 4 {
        return Err(Sf2Error::corrupt(format!("version chunk of {} bytes", data.len())));
    }
    Ok(Version::new(
        u16::from_le_bytes([data[0], data[1]]),
        u16::from_le_bytes([data[2], data[3]]),
    ))
}

fn parse_info(list: &Chunk<'_>) -> Result<(FontInfo, Vec<DisabledMark>)> {
    let mut info = FontInfo::default();
    let mut version = None;
    let mut marks = Vec::new();
    for chunk in list.children() {
        let chunk = chunk?;
        match &chunk.id.0 {
            b"ifil" => version = Some(read_version(chunk.data)?),
            b"isng" => info.sound_engine = text(chunk.data),
            b"INAM" => info.name = text(chunk.data),
            b"irom" => info.rom_name = Some(text(chunk.data)),
            b"iver" => info.rom_version = Some(read_version(chunk.data)?),
            b"ICRD" => info.creation_date = Some(text(chunk.data)),
            b"IENG" => info.engineers = Some(text(chunk.data)),
            b"IPRD" => info.product = Some(text(chunk.data)),
            b"ICOP" => info.copyright = Some(text(chunk.data)),
            b"ICMT" => info.comment = Some(text(chunk.data)),
            b"ISFT" => info.software = Some(text(chunk.data)),
            id if id == DISABLED_CHUNK => match read_table(chunk.data) {
                Ok(read) => marks = read,
                Err(err) => debug!("Ignoring unreadable disabled modulator list: {}", err),
            },
            _ => debug!("Skipping INFO sub-chunk '{}'", chunk.id),
        }
    }
    info.version = version.ok_or(Sf2Error::MissingChunk("ifil"))?;
    Ok((info, marks))
}

/// Contents of the `sdta` list.
struct SamplePool<'a> {
    raw: &'a [u8],
    frames: Arc<[i16]>,
    low: Option<Arc<[u8]>>,
}

impl<'a> SamplePool<'a> {
    fn parse(list: &Chunk<'a>, version: Version, report: &mut LoadReport) -> Result<Self> {
        let (mut raw, mut sm24): (&[u8], Option<&[u8]>) = (&[], None);
        for chunk in list.children() {
            let chunk = chunk?;
            match &chunk.id.0 {
                b"smpl" => raw = chunk.data,
                b"sm24" => sm24 = Some(chunk.data),
                _ => debug!("Skipping sdta sub-chunk '{}'", chunk.id),
            }
        }
        let frames: Arc<[i16]> = raw
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let low: Option<Arc<[u8]>> = match sm24 {
            Some(low) if version >= Version::SF2_04 && version.major == 2 && low.len() >= frames.len() => {
                Some(Arc::from(&low[..frames.len()]))
            }
            Some(_) => {
                report.push(LoadWarning::Sm24Ignored);
                None
            }
            None => None,
        };
        debug!("Sample pool: {} bytes, 24-bit: {}", raw.len(), low.is_some());
        Ok(Self { raw, frames, low })
    }
}

/// The nine `pdta` tables, each including its terminal record.
struct Tables {
    phdr: Vec<PresetHeader>,
    pbag: Vec<Bag>,
    pmod: Vec<ModRecord>,
    pgen: Vec<GenRecord>,
    inst: Vec<InstrumentHeader>,
    ibag: Vec<Bag>,
    imod: Vec<ModRecord>,
    igen: Vec<GenRecord>,
    shdr: Vec<SampleHeader>,
    /// Absolute `pmod` / `imod` positions holding disabled modulators.
    pdis: HashSet<usize>,
    idis: HashSet<usize>,
}

impl Tables {
    fn parse(list: &Chunk<'_>) -> Result<Self> {
        let mut found: [Option<&[u8]>; 9] = [None; 9];
        const NAMES: [&str; 9] = [
            "phdr", "pbag", "pmod", "pgen", "inst", "ibag", "imod", "igen", "shdr",
        ];
        for chunk in list.children() {
            let chunk = chunk?;
            match NAMES.iter().position(|n| n.as_bytes() == &chunk.id.0[..]) {
                Some(i) => found[i] = Some(chunk.data),
                None => debug!("Skipping pdta sub-chunk '{}'", chunk.id),
            }
        }
        let get = |i: usize| found[i].ok_or(Sf2Error::MissingChunk(NAMES[i]));
        Ok(Self {
            phdr: read_table(get(0)?)?,
            pbag: read_table(get(1)?)?,
            pmod: read_table(get(2)?)?,
            pgen: read_table(get(3)?)?,
            inst: read_table(get(4)?)?,
            ibag: read_table(get(5)?)?,
            imod: read_table(get(6)?)?,
            igen: read_table(get(7)?)?,
            shdr: read_table(get(8)?)?,
            pdis: HashSet::new(),
            idis: HashSet::new(),
        })
    }

    fn mark_disabled(&mut self, marks: &[DisabledMark]) {
        for mark in marks {
            let index = mark.index as usize;
            match mark.table {
                MARK_PRESET if index < self.pmod.len() => self.pdis.insert(index),
                MARK_INSTRUMENT if index < self.imod.len() => self.idis.insert(index),
                _ => {
                    debug!("Ignoring disabled mark {:?}", mark);
                    continue;
                }
            };
        }
    }

    fn sample_count(&self) -> usize {
        self.shdr.len() - 1
    }

    fn instrument_count(&self) -> usize {
        self.inst.len() - 1
    }

    fn preset_count(&self) -> usize {
        self.phdr.len() - 1
    }
}

/// Index range `start..end` checked against a table length.
fn span(start: u16, end: u16, len: usize, what: &str) -> Result<Range<usize>> {
    let (start, end) = (usize::from(start), usize::from(end));
    if start > end {
        return Err(Sf2Error::corrupt(format!(
            "{} range {}..{} is inverted",
            what, start, end
        )));
    }
    if end > len {
        return Err(Sf2Error::corrupt(format!(
            "{} range {}..{} exceeds {} records",
            what, start, end, len
        )));
    }
    Ok(start..end)
}

/// A zone as stored, before its reference is resolved.
struct RawZone {
    params: ZoneParams,
    reference: Option<u16>,
}

/// Decode the zones of one instrument or preset.
#[allow(clippy::too_many_arguments)]
fn decode_zones(
    owner: &str,
    level: Level,
    bags: Range<usize>,
    bag: &[Bag],
    gens: &[GenRecord],
    mods: &[ModRecord],
    disabled: &HashSet<usize>,
    report: &mut LoadReport,
) -> Result<Vec<RawZone>> {
    let mut zones = Vec::with_capacity(bags.len());
    for (position, j) in bags.enumerate() {
        let zone_owner = format!("{} zone {}", owner, position);
        let g = span(bag[j].gen_index, bag[j + 1].gen_index, gens.len(), "generator")?;
        let m = span(bag[j].mod_index, bag[j + 1].mod_index, mods.len(), "modulator")?;
        let silenced: Vec<bool> = m.clone().map(|i| disabled.contains(&i)).collect();
        zones.push(decode_zone(&zone_owner, level, &gens[g], &mods[m], &silenced, report));
    }
    Ok(zones)
}

fn decode_zone(
    owner: &str,
    level: Level,
    gens: &[GenRecord],
    mods: &[ModRecord],
    disabled: &[bool],
    report: &mut LoadReport,
) -> RawZone {
    let mut params = ZoneParams::new();
    let mut reference = None;

    for record in gens {
        if reference.is_some() {
            report.push(LoadWarning::GeneratorAfterReference {
                owner: owner.to_string(),
                id: record.operator,
            });
            continue;
        }
        let Some(kind) = GeneratorType::from_u16(record.operator) else {
            report.push(LoadWarning::UnknownGenerator {
                owner: owner.to_string(),
                id: record.operator,
            });
            continue;
        };
        if !kind.allowed_at(level) {
            let warning = match level {
                Level::Preset => LoadWarning::ForbiddenAtPresetLevel {
                    owner: owner.to_string(),
                    generator: kind,
                },
                Level::Instrument => LoadWarning::UnknownGenerator {
                    owner: owner.to_string(),
                    id: record.operator,
                },
            };
            report.push(warning);
            continue;
        }
        if kind.is_reference() {
            reference = Some(record.amount);
            continue;
        }

        let amount = Amount::from_raw(record.amount);
        if let Err(ModelError::OutOfRange { value, .. }) =
            validate_generator(Generator::new(kind, amount), level)
        {
            report.push(LoadWarning::OutOfRange {
                owner: owner.to_string(),
                generator: kind,
                value,
            });
        }
        if params.generators.set(kind, amount).is_some() {
            report.push(LoadWarning::DuplicateGenerator {
                owner: owner.to_string(),
                generator: kind,
            });
        }
    }

    for (record, &is_disabled) in mods.iter().zip(disabled) {
        let Some(destination) = ModDestination::from_u16(record.destination) else {
            report.push(LoadWarning::InvalidModulator {
                owner: owner.to_string(),
                reason: format!("unknown destination {}", record.destination),
            });
            continue;
        };
        let Some(transform) = Transform::from_u16(record.transform) else {
            report.push(LoadWarning::InvalidModulator {
                owner: owner.to_string(),
                reason: format!("unknown transform {}", record.transform),
            });
            continue;
        };
        if let Err(ModelError::InvalidModulatorDestination { destination }) =
            check_destination(destination, level)
        {
            let warning = match level {
                Level::Preset => LoadWarning::InvalidModulatorDestination {
                    owner: owner.to_string(),
                    destination,
                },
                Level::Instrument => LoadWarning::InvalidModulator {
                    owner: owner.to_string(),
                    reason: format!("{} cannot be modulated", destination),
                },
            };
            report.push(warning);
            continue;
        }
        let modulator = Modulator::new(ModSource::from_raw(record.source), destination, record.amount)
            .with_amount_source(ModSource::from_raw(record.amount_source))
            .with_transform(transform);
        let previous = if is_disabled {
            params.modulators.disable(modulator.signature())
        } else {
            params.modulators.replace(modulator)
        };
        if previous.is_some() {
            report.push(LoadWarning::DuplicateModulator {
                owner: owner.to_string(),
            });
        }
    }

    RawZone { params, reference }
}

fn decode_instrument(
    tables: &Tables,
    index: usize,
    sample_ids: &[SampleId],
    report: &mut LoadReport,
) -> Result<Instrument> {
    let header = &tables.inst[index];
    let owner = format!("instrument '{}'", header.name);
    let bags = span(
        header.bag_index,
        tables.inst[index + 1].bag_index,
        tables.ibag.len() - 1,
        "instrument zone",
    )?;
    let zones = decode_zones(
        &owner,
        Level::Instrument,
        bags,
        &tables.ibag,
        &tables.igen,
        &tables.imod,
        &tables.idis,
        report,
    )?;

    let mut instrument = Instrument::new(header.name.clone());
    for (position, zone) in zones.into_iter().enumerate() {
        match zone.reference {
            Some(target) => {
                let sample = sample_ids.get(usize::from(target)).copied().ok_or_else(|| {
                    Sf2Error::corrupt(format!(
                        "{} zone {} references missing sample {}",
                        owner, position, target
                    ))
                })?;
                instrument.zones.push(Zone {
                    target: sample,
                    params: zone.params,
                });
            }
            None if position == 0 => instrument.global = zone.params,
            None => report.push(LoadWarning::ZoneWithoutReference {
                owner: owner.clone(),
                zone: position,
            }),
        }
    }
    Ok(instrument)
}

fn decode_preset(
    tables: &Tables,
    index: usize,
    instrument_ids: &[InstrumentId],
    report: &mut LoadReport,
) -> Result<Preset> {
    let header = &tables.phdr[index];
    let owner = format!("preset '{}'", header.name);
    let bags = span(
        header.bag_index,
        tables.phdr[index + 1].bag_index,
        tables.pbag.len() - 1,
        "preset zone",
    )?;
    let zones = decode_zones(
        &owner,
        Level::Preset,
        bags,
        &tables.pbag,
        &tables.pgen,
        &tables.pmod,
        &tables.pdis,
        report,
    )?;

    let mut preset = Preset::new(header.name.clone(), header.bank, header.program);
    preset.library = header.library;
    preset.genre = header.genre;
    preset.morphology = header.morphology;
    for (position, zone) in zones.into_iter().enumerate() {
        match zone.reference {
            Some(target) => {
                let instrument = instrument_ids.get(usize::from(target)).copied().ok_or_else(|| {
                    Sf2Error::corrupt(format!(
                        "{} zone {} references missing instrument {}",
                        owner, position, target
                    ))
                })?;
                preset.zones.push(Zone {
                    target: instrument,
                    params: zone.params,
                });
            }
            None if position == 0 => preset.global = zone.params,
            None => report.push(LoadWarning::ZoneWithoutReference {
                owner: owner.clone(),
                zone: position,
            }),
        }
    }
    Ok(preset)
}

/// Pair samples whose links point at each other with matching roles.
fn link_samples(
    font: &mut SoundFont,
    headers: &[SampleHeader],
    ids: &[SampleId],
    report: &mut LoadReport,
) -> Result<()> {
    fn counterpart(role: u16) -> Option<u16> {
        match role {
            SAMPLE_TYPE_LEFT => Some(SAMPLE_TYPE_RIGHT),
            SAMPLE_TYPE_RIGHT => Some(SAMPLE_TYPE_LEFT),
            SAMPLE_TYPE_LINKED => Some(SAMPLE_TYPE_LINKED),
            _ => None,
        }
    }

    for (i, header) in headers.iter().enumerate() {
        let role = header.role();
        if role == 0 || role == SAMPLE_TYPE_MONO {
            continue;
        }
        let j = usize::from(header.sample_link);
        let reciprocal = j != i
            && headers.get(j).map_or(false, |partner| {
                usize::from(partner.sample_link) == i && counterpart(role) == Some(partner.role())
            });
        if !reciprocal {
            report.push(LoadWarning::BrokenStereoLink {
                sample: header.name.clone(),
            });
            continue;
        }
        if i < j {
            let link = match role {
                SAMPLE_TYPE_LEFT => SampleLink::Left(ids[j]),
                SAMPLE_TYPE_RIGHT => SampleLink::Right(ids[j]),
                _ => SampleLink::Linked(ids[j]),
            };
            font.set_link(ids[i], link)?;
        }
    }
    Ok(())
}
