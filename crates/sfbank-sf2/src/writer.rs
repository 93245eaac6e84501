//! Encoding of SF2 and compressed sound banks.

use std::collections::HashMap;

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, info, warn};
use sfbank_model::{
    CancelToken, FontInfo, GeneratorType, InstrumentId, ModelError, SampleLink, SoundFont,
    Version, ZoneModulator, ZoneParams,
};

use crate::codec::{CodecFailurePolicy, SampleCodec};
use crate::error::{Result, Sf2Error};
use crate::records::{
    write_table, Bag, DisabledMark, GenRecord, InstrumentHeader, ModRecord, PresetHeader,
    SampleHeader, DISABLED_CHUNK, MARK_INSTRUMENT, MARK_PRESET, SAMPLE_TYPE_COMPRESSED, SAMPLE_TYPE_LEFT, SAMPLE_TYPE_LINKED, SAMPLE_TYPE_MONO,
    SAMPLE_TYPE_RIGHT, SAMPLE_TYPE_ROM,
};
use crate::report::EncodeReport;
use crate::riff::{write_chunk, write_list, FourCC, INFO, LIST, PDTA, RIFF, SDTA, SFBK};

/// Zero frames written after every sample.
pub const GUARD_FRAMES: usize = 46;

/// An encoded bank.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub report: EncodeReport,
}

/// Encode a font as plain SF2 of the given version.
pub fn write_sf2(font: &SoundFont, version: Version) -> Result<Vec<u8>> {
    Ok(Sf2Writer::sf2(version).write(font)?.bytes)
}

struct Compression<'a> {
    codec: &'a dyn SampleCodec,
    quality: f32,
    policy: CodecFailurePolicy,
}

/// Configurable encoder.
///
/// The font is validated for export first; a failed or cancelled write
/// returns no bytes.
pub struct Sf2Writer<'a> {
    version: Version,
    compression: Option<Compression<'a>>,
    cancel: CancelToken,
    progress: Option<Box<dyn FnMut(usize, usize) + 'a>>,
}

impl<'a> Sf2Writer<'a> {
    /// Plain PCM container, version 2.01 or 2.04.
    pub fn sf2(version: Version) -> Self {
        Self {
            version,
            compression: None,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Compressed container: every sample goes through `codec`.
    pub fn compressed(codec: &'a dyn SampleCodec, quality: f32, policy: CodecFailurePolicy) -> Self {
        Self {
            version: Version::SF3_01,
            compression: Some(Compression {
                codec,
                quality: quality.clamp(0.0, 1.0),
                policy,
            }),
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Called with (done, total) after each encoded entity.
    pub fn on_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn write(mut self, font: &SoundFont) -> Result<Encoded> {
        font.validate_for_export()?;
        let expected_major = if self.compression.is_some() { 3 } else { 2 };
        if self.version.major != expected_major {
            return Err(Sf2Error::UnsupportedVersion(self.version));
        }

        let total = font.sample_count() + font.instrument_count() + font.preset_count();
        let mut done = 0;
        let mut report = EncodeReport::default();

        let sample_index = index_map(font.samples().map(|(id, _)| id), "samples")?;
        let instrument_index = index_map(font.instruments().map(|(id, _)| id), "instruments")?;

        // Sample data and headers
        let mut smpl = Vec::new();
        let mut sm24 = Vec::new();
        let wide = self.compression.is_none()
            && self.version >= Version::SF2_04
            && font.samples().any(|(_, s)| s.data.low_bytes().is_some());
        let mut shdr = Vec::with_capacity(font.sample_count() + 1);
        for (_, sample) in font.samples() {
            self.cancel.check()?;
            let mut header = SampleHeader {
                name: sample.name.clone(),
                sample_rate: sample.sample_rate,
                original_pitch: sample.original_pitch,
                pitch_correction: sample.pitch_correction,
                ..Default::default()
            };

            let (link_type, link) = match sample.link() {
                SampleLink::Mono => (SAMPLE_TYPE_MONO, None),
                SampleLink::Left(p) => (SAMPLE_TYPE_LEFT, Some(p)),
                SampleLink::Right(p) => (SAMPLE_TYPE_RIGHT, Some(p)),
                SampleLink::Linked(p) => (SAMPLE_TYPE_LINKED, Some(p)),
            };
            header.sample_type = link_type;
            if let Some(partner) = link {
                header.sample_link = *sample_index
                    .get(&partner)
                    .ok_or(ModelError::UnknownSample(partner))?;
            }

            if sample.rom {
                header.sample_type |= SAMPLE_TYPE_ROM;
                header.loop_start = sample.loop_start;
                header.loop_end = sample.loop_end;
            } else if let Some(block) =
                self.compress(&sample.name, sample.data.frames(), sample.sample_rate, &mut report)?
            {
                let start = frame_u32(smpl.len(), "bytes of sample data")?;
                smpl.write_u32::<LittleEndian>(frame_u32(block.len(), "bytes in one sample")?)?;
                smpl.extend_from_slice(&block);
                if smpl.len() % 2 == 1 {
                    smpl.push(0);
                }
                header.sample_type |= SAMPLE_TYPE_COMPRESSED;
                header.start = start;
                header.end = start + 4 + block.len() as u32;
                header.loop_start = sample.loop_start;
                header.loop_end = sample.loop_end;
            } else {
                let start = frame_u32(smpl.len() / 2, "sample frames")?;
                for &frame in sample.data.frames() {
                    smpl.write_i16::<LittleEndian>(frame)?;
                }
                smpl.resize(smpl.len() + GUARD_FRAMES * 2, 0);
                if wide {
                    match sample.data.low_bytes() {
                        Some(low) => sm24.extend_from_slice(low),
                        None => sm24.resize(sm24.len() + sample.len(), 0),
                    }
                    sm24.resize(sm24.len() + GUARD_FRAMES, 0);
                }
                header.start = start;
                header.end = frame_u32(start as usize + sample.len(), "sample frames")?;
                header.loop_start = start + sample.loop_start;
                header.loop_end = start + sample.loop_end;
            }
            shdr.push(header);
            done += 1;
            self.report_progress(done, total);
        }
        shdr.push(SampleHeader::terminal());

        // Instruments
        let mut inst = Vec::with_capacity(font.instrument_count() + 1);
        let mut izones = ZoneTables::default();
        for (_, instrument) in font.instruments() {
            self.cancel.check()?;
            inst.push(InstrumentHeader {
                name: instrument.name.clone(),
                bag_index: izones.next_bag()?,
            });
            if !instrument.global.is_empty() {
                izones.push(&instrument.global, None)?;
            }
            for zone in &instrument.zones {
                let target = *sample_index
                    .get(&zone.target)
                    .ok_or(ModelError::UnknownSample(zone.target))?;
                izones.push(&zone.params, Some((GeneratorType::SampleId, target)))?;
            }
            done += 1;
            self.report_progress(done, total);
        }
        inst.push(InstrumentHeader {
            name: "EOI".to_string(),
            bag_index: izones.next_bag()?,
        });
        izones.terminate()?;

        // Presets
        let mut phdr = Vec::with_capacity(font.preset_count() + 1);
        let mut pzones = ZoneTables::default();
        for (_, preset) in font.presets() {
            self.cancel.check()?;
            phdr.push(PresetHeader {
                name: preset.name.clone(),
                program: preset.program,
                bank: preset.bank,
                bag_index: pzones.next_bag()?,
                library: preset.library,
                genre: preset.genre,
                morphology: preset.morphology,
            });
            if !preset.global.is_empty() {
                pzones.push(&preset.global, None)?;
            }
            for zone in &preset.zones {
                let target = instrument_target(&instrument_index, zone.target)?;
                pzones.push(&zone.params, Some((GeneratorType::Instrument, target)))?;
            }
            done += 1;
            self.report_progress(done, total);
        }
        phdr.push(PresetHeader::terminal(pzones.next_bag()?));
        pzones.terminate()?;

        // Assemble
        let mut body = Vec::new();
        let mut marks = pzones.marks(MARK_PRESET)?;
        marks.extend(izones.marks(MARK_INSTRUMENT)?);
        write_list(&mut body, LIST, INFO, &info_body(&font.info, self.version, &marks)?)?;

        let mut sdta = Vec::new();
        write_chunk(&mut sdta, FourCC::new(b"smpl"), &smpl)?;
        if wide {
            write_chunk(&mut sdta, FourCC::new(b"sm24"), &sm24)?;
        }
        write_list(&mut body, LIST, SDTA, &sdta)?;

        let mut pdta = Vec::new();
        write_chunk(&mut pdta, FourCC::new(b"phdr"), &write_table(&phdr)?)?;
        write_chunk(&mut pdta, FourCC::new(b"pbag"), &write_table(&pzones.bags)?)?;
        write_chunk(&mut pdta, FourCC::new(b"pmod"), &write_table(&pzones.mods)?)?;
        write_chunk(&mut pdta, FourCC::new(b"pgen"), &write_table(&pzones.gens)?)?;
        write_chunk(&mut pdta, FourCC::new(b"inst"), &write_table(&inst)?)?;
        write_chunk(&mut pdta, FourCC::new(b"ibag"), &write_table(&izones.bags)?)?;
        write_chunk(&mut pdta, FourCC::new(b"imod"), &write_table(&izones.mods)?)?;
        write_chunk(&mut pdta, FourCC::new(b"igen"), &write_table(&izones.gens)?)?;
        write_chunk(&mut pdta, FourCC::new(b"shdr"), &write_table(&shdr)?)?;
        write_list(&mut body, LIST, PDTA, &pdta)?;

        let mut bytes = Vec::with_capacity(body.len() + 12);
        write_list(&mut bytes, RIFF, SFBK, &body)?;

        info!(
            "Encoded '{}' as version {} ({} bytes, {} PCM fallbacks)",
            font.info.name,
            self.version,
            bytes.len(),
            report.fallback_samples.len()
        );
        Ok(Encoded { bytes, report })
    }

    fn report_progress(&mut self, done: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress(done, total);
        }
    }

    /// Compressed payload for one sample, or `None` to store PCM.
    fn compress(
        &self,
        name: &str,
        frames: &[i16],
        sample_rate: u32,
        report: &mut EncodeReport,
    ) -> Result<Option<Vec<u8>>> {
        let Some(compression) = &self.compression else {
            return Ok(None);
        };
        match compression.codec.encode(frames, sample_rate, compression.quality) {
            Ok(payload) => {
                debug!(
                    "Compressed '{}' with {}: {} frames -> {} bytes",
                    name,
                    compression.codec.name(),
                    frames.len(),
                    payload.len()
                );
                Ok(Some(payload))
            }
            Err(e) => match compression.policy {
                CodecFailurePolicy::Abort => Err(Sf2Error::Codec {
                    sample: name.to_string(),
                    reason: e.to_string(),
                }),
                CodecFailurePolicy::KeepPcm => {
                    warn!("Codec failed on '{}' ({}), storing PCM", name, e);
                    report.fallback_samples.push(name.to_string());
                    Ok(None)
                }
            },
        }
    }
}

fn frame_u32(value: usize, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Sf2Error::Limit(what))
}

fn index_u16(value: usize, what: &'static str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Sf2Error::Limit(what))
}

/// Position of every id in iteration order, as written.
fn index_map<I>(ids: impl Iterator<Item = I>, what: &'static str) -> Result<HashMap<I, u16>>
where
    I: std::hash::Hash + Eq,
{
    ids.enumerate()
        .map(|(i, id)| Ok((id, index_u16(i, what)?)))
        .collect()
}

fn instrument_target(index: &HashMap<InstrumentId, u16>, id: InstrumentId) -> Result<u16> {
    index
        .get(&id)
        .copied()
        .ok_or_else(|| ModelError::UnknownInstrument(id).into())
}

/// Flat bag, generator and modulator arrays for one level.
#[derive(Default)]
struct ZoneTables {
    bags: Vec<Bag>,
    gens: Vec<GenRecord>,
    mods: Vec<ModRecord>,
    disabled: Vec<usize>,
}

impl ZoneTables {
    fn next_bag(&self) -> Result<u16> {
        index_u16(self.bags.len(), "zones")
    }

    fn open_bag(&mut self) -> Result<()> {
        let bag = Bag {
            gen_index: index_u16(self.gens.len(), "generators")?,
            mod_index: index_u16(self.mods.len(), "modulators")?,
        };
        self.bags.push(bag);
        Ok(())
    }

    /// Append one zone. Range selectors go first and the reference last.
    fn push(&mut self, params: &ZoneParams, reference: Option<(GeneratorType, u16)>) -> Result<()> {
        self.open_bag()?;
        let generators = &params.generators;
        for kind in [GeneratorType::KeyRange, GeneratorType::VelRange] {
            if let Some(amount) = generators.get(kind) {
                self.gens.push(GenRecord {
                    operator: kind.id(),
                    amount: amount.raw(),
                });
            }
        }
        for generator in generators.iter() {
            if generator.kind.is_selector() || generator.kind.is_reference() {
                continue;
            }
            self.gens.push(GenRecord {
                operator: generator.kind.id(),
                amount: generator.amount.raw(),
            });
        }
        if let Some((kind, target)) = reference {
            self.gens.push(GenRecord {
                operator: kind.id(),
                amount: target,
            });
        }

        for entry in params.modulators.iter() {
            let record = match entry {
                ZoneModulator::Active(m) => ModRecord {
                    source: m.source.raw(),
                    destination: m.destination.raw(),
                    amount: m.amount,
                    amount_source: m.amount_source.raw(),
                    transform: m.transform.raw(),
                },
                // Amount zero silences it for other readers; the mark restores it.
                ZoneModulator::Disabled(sig) => {
                    self.disabled.push(self.mods.len());
                    ModRecord {
                        source: sig.source.raw(),
                        destination: sig.destination.raw(),
                        amount: 0,
                        amount_source: sig.amount_source.raw(),
                        transform: sig.transform.raw(),
                    }
                }
            };
            self.mods.push(record);
        }
        Ok(())
    }

    fn marks(&self, table: u16) -> Result<Vec<DisabledMark>> {
        self.disabled
            .iter()
            .map(|&index| {
                Ok(DisabledMark {
                    table,
                    index: frame_u32(index, "modulators")?,
                })
            })
            .collect()
    }

    /// Append the terminal bag, generator and modulator.
    fn terminate(&mut self) -> Result<()> {
        self.open_bag()?;
        self.gens.push(GenRecord::default());
        self.mods.push(ModRecord::default());
        Ok(())
    }
}

/// Zero-terminated text padded to an even length.
fn text_data(text: &str) -> Vec<u8> {
    let mut data = text.as_bytes().to_vec();
    data.push(0);
    if data.len() % 2 == 1 {
        data.push(0);
    }
    data
}

fn version_data(version: Version) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(4);
    data.write_u16::<LittleEndian>(version.major)?;
    data.write_u16::<LittleEndian>(version.minor)?;
    Ok(data)
}

fn info_body(info: &FontInfo, version: Version, marks: &[DisabledMark]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    write_chunk(&mut body, FourCC::new(b"ifil"), &version_data(version)?)?;
    write_chunk(&mut body, FourCC::new(b"isng"), &text_data(&info.sound_engine))?;
    write_chunk(&mut body, FourCC::new(b"INAM"), &text_data(&info.name))?;
    if let Some(rom) = &info.rom_name {
        write_chunk(&mut body, FourCC::new(b"irom"), &text_data(rom))?;
    }
    if let Some(rom_version) = info.rom_version {
        write_chunk(&mut body, FourCC::new(b"iver"), &version_data(rom_version)?)?;
    }
    let optional = [
        (b"ICRD", &info.creation_date),
        (b"IENG", &info.engineers),
        (b"IPRD", &info.product),
        (b"ICOP", &info.copyright),
        (b"ICMT", &info.comment),
        (b"ISFT", &info.software),
    ];
    for (id, value) in optional {
        if let Some(value) = value {
            write_chunk(&mut body, FourCC::new(id), &text_data(value))?;
        }
    }
    if !marks.is_empty() {
        write_chunk(&mut body, FourCC::new(DISABLED_CHUNK), &write_table(marks)?)?;
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfbank_model::{Instrument, Preset, Sample, SampleData, Zone};

    fn font() -> SoundFont {
        let mut font = SoundFont::new("Writer");
        let sample = font
            .add_sample(Sample::new("Saw", SampleData::from_pcm(vec![1, 2, 3]), 22050))
            .unwrap();
        let inst = font
            .add_instrument(Instrument::new("Saw").with_zone(Zone::new(sample).with_key_range(10, 20)))
            .unwrap();
        font.add_preset(Preset::new("Saw", 0, 0).with_zone(Zone::new(inst)))
            .unwrap();
        font
    }

    #[test]
    fn test_zone_tables_order_and_terminals() {
        let mut params = ZoneParams::new();
        params.generators.set(GeneratorType::Pan, sfbank_model::Amount::from_i16(-50));
        params.generators.set(
            GeneratorType::VelRange,
            sfbank_model::Amount::from_range(sfbank_model::Range::new(0, 64)),
        );
        let mut tables = ZoneTables::default();
        tables.push(&params, Some((GeneratorType::SampleId, 4))).unwrap();
        tables.terminate().unwrap();

        let ops: Vec<_> = tables.gens.iter().map(|g| g.operator).collect();
        assert_eq!(
            ops,
            vec![
                GeneratorType::VelRange.id(),
                GeneratorType::Pan.id(),
                GeneratorType::SampleId.id(),
                0
            ]
        );
        assert_eq!(tables.bags, vec![Bag::default(), Bag { gen_index: 3, mod_index: 0 }]);
    }

    #[test]
    fn test_guard_frames_and_header_offsets() {
        let bytes = write_sf2(&font(), Version::SF2_01).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"sfbk");
        let smpl = bytes
            .windows(4)
            .position(|w| w == b"smpl")
            .unwrap();
        let size = u32::from_le_bytes([bytes[smpl + 4], bytes[smpl + 5], bytes[smpl + 6], bytes[smpl + 7]]);
        assert_eq!(size as usize, (3 + GUARD_FRAMES) * 2);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let mut font = font();
        font.info.name.clear();
        let err = write_sf2(&font, Version::SF2_01).unwrap_err();
        assert!(matches!(err, Sf2Error::Model(ModelError::Integrity(_))));
    }

    #[test]
    fn test_version_must_match_container() {
        let err = write_sf2(&font(), Version::SF3_01).unwrap_err();
        assert!(matches!(err, Sf2Error::UnsupportedVersion(_)));
    }

    #[test]
    fn test_text_data_is_even_and_terminated() {
        assert_eq!(text_data("ab"), vec![b'a', b'b', 0, 0]);
        assert_eq!(text_data("abc"), vec![b'a', b'b', b'c', 0]);
    }
}
