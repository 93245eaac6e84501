//! SFZ import: one instrument and one preset per file.
//!
//! Every usable region becomes an instrument zone. Opcodes with a SoundFont
//! counterpart are converted to generators; the others are listed in the
//! [`ImportReport`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sfbank_model::attributes::units;
use sfbank_model::{
    Amount, GeneratorType, Instrument, InstrumentId, Level, ModelError, Preset, PresetId, Range,
    Sample, SampleId, SoundFont, Zone, ZoneParams,
};

use crate::error::{Result, SfzError};
use crate::parser::{parse_sfz_file, LoopMode, Note, SfzFile, SfzSection};
use crate::wav::read_wav;

/// Opcodes the importer understands.
const KNOWN_OPCODES: &[&str] = &[
    "sample",
    "key",
    "lokey",
    "hikey",
    "lovel",
    "hivel",
    "pitch_keycenter",
    "pitch_keytrack",
    "tune",
    "transpose",
    "volume",
    "pan",
    "ampeg_delay",
    "ampeg_attack",
    "ampeg_hold",
    "ampeg_decay",
    "ampeg_sustain",
    "ampeg_release",
    "fileg_delay",
    "fileg_attack",
    "fileg_hold",
    "fileg_decay",
    "fileg_sustain",
    "fileg_release",
    "fileg_depth",
    "pitcheg_delay",
    "pitcheg_attack",
    "pitcheg_hold",
    "pitcheg_decay",
    "pitcheg_sustain",
    "pitcheg_release",
    "pitcheg_depth",
    "cutoff",
    "resonance",
    "fil_type",
    "amplfo_delay",
    "amplfo_freq",
    "amplfo_depth",
    "fillfo_delay",
    "fillfo_freq",
    "fillfo_depth",
    "pitchlfo_delay",
    "pitchlfo_freq",
    "pitchlfo_depth",
    "loop_mode",
    "offset",
    "end",
    "loop_start",
    "loop_end",
    "group",
    "off_by",
];

/// Something the importer worked around.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportWarning {
    /// Opcode with no SoundFont counterpart, ignored in every region.
    UnsupportedOpcode { opcode: String },
    /// Region that produced no zone.
    RegionSkipped { region: usize, reason: String },
    /// `loop_start`/`loop_end` outside the sample; the whole sample loops.
    LoopOutOfBounds { sample: String },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOpcode { opcode } => write!(f, "opcode '{}' is not supported", opcode),
            Self::RegionSkipped { region, reason } => write!(f, "region {} skipped: {}", region, reason),
            Self::LoopOutOfBounds { sample } => {
                write!(f, "loop of sample '{}' is outside the sample", sample)
            }
        }
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub instrument: InstrumentId,
    pub preset: PresetId,
    pub warnings: Vec<ImportWarning>,
}

/// A WAV file once added to the font, shared by the regions using it.
#[derive(Debug, Clone)]
struct LoadedWav {
    /// One id for mono files, left then right for stereo files.
    ids: Vec<SampleId>,
    root: u8,
    loop_start: u32,
    loop_end: u32,
    len: u32,
}

/// Import an SFZ file into `font`.
///
/// The file's regions become the zones of a new instrument, layered by a
/// new preset at the first free bank/program. Both are named after the file.
/// The font is left untouched when the import fails.
pub fn import_sfz(path: impl AsRef<Path>, font: &mut SoundFont) -> Result<ImportReport> {
    let path = path.as_ref();
    let sfz = parse_sfz_file(path)?;
    if !sfz.has_regions() {
        return Err(SfzError::MissingRegion);
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "SFZ".to_string());

    let mut work = font.clone();
    let mut importer = Importer {
        font: &mut work,
        sfz: &sfz,
        wavs: HashMap::new(),
        unsupported: BTreeSet::new(),
        warnings: Vec::new(),
    };
    let mut instrument = Instrument::new(name.clone());
    for (index, region) in sfz.regions.iter().enumerate() {
        instrument.zones.extend(importer.region(index, region)?);
    }
    if instrument.zones.is_empty() {
        return Err(SfzError::MissingRegion);
    }
    let mut warnings = importer.warnings;
    warnings.extend(
        importer
            .unsupported
            .into_iter()
            .map(|opcode| ImportWarning::UnsupportedOpcode { opcode }),
    );

    let instrument = work.insert_instrument(instrument)?;
    let (bank, program) = work
        .first_available_bank_program()
        .ok_or(ModelError::NoFreeBankProgram)?;
    let preset = work.insert_preset(Preset::new(name, bank, program).with_zone(Zone::new(instrument)))?;

    for warning in &warnings {
        warn!("{}: {}", path.display(), warning);
    }
    info!(
        "Imported {} as preset {:03}:{:03} with {} warnings",
        path.display(),
        bank,
        program,
        warnings.len()
    );
    *font = work;
    Ok(ImportReport {
        instrument,
        preset,
        warnings,
    })
}

struct Importer<'a> {
    font: &'a mut SoundFont,
    sfz: &'a SfzFile,
    wavs: HashMap<PathBuf, LoadedWav>,
    unsupported: BTreeSet<String>,
    warnings: Vec<ImportWarning>,
}

impl Importer<'_> {
    fn region(&mut self, index: usize, region: &SfzSection) -> Result<Vec<Zone<SampleId>>> {
        for opcode in region.opcodes.keys() {
            if !KNOWN_OPCODES.contains(&opcode.as_str()) {
                self.unsupported.insert(opcode.clone());
            }
        }
        let skip = |reason: &str| ImportWarning::RegionSkipped {
            region: index,
            reason: reason.to_string(),
        };
        let Some(path) = self.sfz.resolve_sample_path(region) else {
            self.warnings.push(skip("no sample"));
            return Ok(Vec::new());
        };
        if region.get_opcode_str("sample").is_some_and(|s| s.starts_with('*')) {
            self.warnings.push(skip("generated waveforms are not supported"));
            return Ok(Vec::new());
        }

        let key = region.get::<Note>("key")?;
        let root = region.get::<Note>("pitch_keycenter")?.or(key).map_or(60, |n| n.0);
        let wav = match self.wavs.get(&path) {
            Some(wav) => wav.clone(),
            None => {
                let wav = self.load_wav(&path, region, root)?;
                self.wavs.insert(path, wav.clone());
                wav
            }
        };

        let params = convert_region(region, &wav, root)?;
        let zones = match wav.ids.as_slice() {
            [left, right] => vec![
                stereo_zone(*left, &params, -500),
                stereo_zone(*right, &params, 500),
            ],
            ids => ids
                .iter()
                .map(|&id| Zone {
                    target: id,
                    params: params.clone(),
                })
                .collect(),
        };
        Ok(zones)
    }

    /// Add the samples of a WAV file. The first region using the file sets
    /// their root key and loop.
    fn load_wav(&mut self, path: &Path, region: &SfzSection, root: u8) -> Result<LoadedWav> {
        let wav = read_wav(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sample".to_string());
        let len = wav.channels.first().map_or(0, |c| c.len()) as u32;

        let (loop_start, loop_end) = match (region.get::<i64>("loop_start")?, region.get::<i64>("loop_end")?) {
            (None, None) => (0, len),
            (start, end) => {
                let start = start.unwrap_or(0);
                let end = end.map_or(i64::from(len), |e| e + 1);
                if start < 0 || start > end || end > i64::from(len) {
                    self.warnings.push(ImportWarning::LoopOutOfBounds { sample: stem.clone() });
                    (0, len)
                } else {
                    (start as u32, end as u32)
                }
            }
        };

        let stereo = wav.channels.len() == 2;
        let mut ids = Vec::with_capacity(wav.channels.len());
        for (channel, data) in wav.channels.into_iter().enumerate() {
            let name = match (stereo, channel) {
                (false, _) => stem.clone(),
                (true, 0) => format!("{}L", truncated(&stem)),
                (true, _) => format!("{}R", truncated(&stem)),
            };
            let sample = Sample::new(name, data, wav.sample_rate)
                .with_pitch(root, 0)
                .with_loop(loop_start, loop_end);
            ids.push(self.font.insert_sample(sample));
        }
        if let [left, right] = ids.as_slice() {
            self.font.link_stereo(*left, *right)?;
        }
        debug!("Loaded {} ({} channels, {} frames)", path.display(), ids.len(), len);
        Ok(LoadedWav {
            ids,
            root,
            loop_start,
            loop_end,
            len,
        })
    }
}

/// Base name leaving room for a one-letter channel suffix.
fn truncated(stem: &str) -> &str {
    let mut end = stem.len().min(sfbank_model::MAX_NAME_LEN - 1);
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    &stem[..end]
}

/// Zone for one channel of a stereo file, panned hard to `side` on top of
/// the region's own pan.
fn stereo_zone(sample: SampleId, params: &ZoneParams, side: i32) -> Zone<SampleId> {
    let kind = GeneratorType::Pan;
    let mut params = params.clone();
    let region_pan = params.generators.get(kind).map_or(0, |a| a.value(kind));
    let pan = kind.clamp(region_pan + side, Level::Instrument);
    params.generators.set(kind, Amount::for_generator(kind, pan));
    Zone {
        target: sample,
        params,
    }
}

struct ZoneBuilder<'a> {
    region: &'a SfzSection,
    params: ZoneParams,
}

impl ZoneBuilder<'_> {
    fn set(&mut self, kind: GeneratorType, value: i32) {
        let value = kind.clamp(value, Level::Instrument);
        self.params
            .generators
            .set(kind, Amount::for_generator(kind, value));
    }

    fn seconds(&mut self, opcode: &str, kind: GeneratorType) -> Result<()> {
        if let Some(seconds) = self.region.get::<f64>(opcode)? {
            self.set(kind, units::seconds_to_timecents(seconds));
        }
        Ok(())
    }

    fn hertz(&mut self, opcode: &str, kind: GeneratorType) -> Result<()> {
        if let Some(hz) = self.region.get::<f64>(opcode)? {
            self.set(kind, units::hz_to_abs_cents(hz));
        }
        Ok(())
    }

    fn cents(&mut self, opcode: &str, kind: GeneratorType) -> Result<()> {
        if let Some(cents) = self.region.get::<f64>(opcode)? {
            self.set(kind, cents.round() as i32);
        }
        Ok(())
    }

    /// Split a sample offset over a fine and a coarse generator.
    fn offset(&mut self, fine: GeneratorType, coarse: GeneratorType, value: i64) {
        let coarse_part = value / 32768;
        let fine_part = value % 32768;
        if fine_part != 0 {
            self.set(fine, fine_part as i32);
        }
        if coarse_part != 0 {
            self.set(coarse, coarse_part as i32);
        }
    }

    fn range(&mut self, kind: GeneratorType, lo: u8, hi: u8, opcode: &str) -> Result<()> {
        if lo > hi {
            return Err(SfzError::InvalidValue {
                opcode: opcode.to_string(),
                value: hi.to_string(),
            });
        }
        if (lo, hi) != (0, 127) {
            self.params
                .generators
                .set(kind, Amount::from_range(Range::new(lo, hi)));
        }
        Ok(())
    }
}

fn velocity(region: &SfzSection, opcode: &str) -> Result<Option<u8>> {
    Ok(bounded(region, opcode, 0, 127)?.map(|v| v as u8))
}

/// Integer opcode that must lie within `lo..=hi`.
fn bounded(region: &SfzSection, opcode: &str, lo: i64, hi: i64) -> Result<Option<i64>> {
    match region.get::<i64>(opcode)? {
        Some(v) if (lo..=hi).contains(&v) => Ok(Some(v)),
        Some(v) => Err(SfzError::InvalidValue {
            opcode: opcode.to_string(),
            value: v.to_string(),
        }),
        None => Ok(None),
    }
}

/// Convert the opcodes of one region to zone generators.
fn convert_region(region: &SfzSection, wav: &LoadedWav, root: u8) -> Result<ZoneParams> {
    use GeneratorType::*;

    let mut zone = ZoneBuilder {
        region,
        params: ZoneParams::new(),
    };

    let key = region.get::<Note>("key")?.map(|n| n.0);
    let lokey = region.get::<Note>("lokey")?.map(|n| n.0).or(key).unwrap_or(0);
    let hikey = region.get::<Note>("hikey")?.map(|n| n.0).or(key).unwrap_or(127);
    zone.range(KeyRange, lokey, hikey, "hikey")?;
    let lovel = velocity(region, "lovel")?.unwrap_or(0);
    let hivel = velocity(region, "hivel")?.unwrap_or(127);
    zone.range(VelRange, lovel, hivel, "hivel")?;

    if root != wav.root {
        zone.set(OverridingRootKey, i32::from(root));
    }
    let transpose = bounded(region, "transpose", -127, 127)?.unwrap_or(0) as i32;
    let tune = region.get::<f64>("tune")?.unwrap_or(0.0).round() as i32;
    let tune = tune.saturating_add(transpose * 100);
    if tune / 100 != 0 {
        zone.set(CoarseTune, tune / 100);
    }
    if tune % 100 != 0 {
        zone.set(FineTune, tune % 100);
    }
    if let Some(keytrack) = region.get::<f64>("pitch_keytrack")? {
        zone.set(ScaleTuning, keytrack.round() as i32);
    }

    if let Some(volume) = region.get::<f64>("volume")? {
        zone.set(InitialAttenuation, units::db_to_centibels(-volume));
    }
    if let Some(pan) = region.get::<f64>("pan")? {
        zone.set(Pan, (pan * 5.0).round() as i32);
    }

    zone.seconds("ampeg_delay", DelayVolEnv)?;
    zone.seconds("ampeg_attack", AttackVolEnv)?;
    zone.seconds("ampeg_hold", HoldVolEnv)?;
    zone.seconds("ampeg_decay", DecayVolEnv)?;
    zone.seconds("ampeg_release", ReleaseVolEnv)?;
    if let Some(percent) = region.get::<f64>("ampeg_sustain")? {
        zone.set(SustainVolEnv, sustain_to_centibels(percent));
    }

    // The modulation envelope drives both pitch and filter; the filter
    // envelope's timing wins when both are given.
    for prefix in ["pitcheg", "fileg"] {
        zone.seconds(&format!("{prefix}_delay"), DelayModEnv)?;
        zone.seconds(&format!("{prefix}_attack"), AttackModEnv)?;
        zone.seconds(&format!("{prefix}_hold"), HoldModEnv)?;
        zone.seconds(&format!("{prefix}_decay"), DecayModEnv)?;
        zone.seconds(&format!("{prefix}_release"), ReleaseModEnv)?;
        if let Some(percent) = region.get::<f64>(&format!("{prefix}_sustain"))? {
            zone.set(SustainModEnv, units::percent_to_permille(100.0 - percent));
        }
    }
    zone.cents("pitcheg_depth", ModEnvToPitch)?;
    zone.cents("fileg_depth", ModEnvToFilterFc)?;

    zone.hertz("cutoff", InitialFilterFc)?;
    if let Some(resonance) = region.get::<f64>("resonance")? {
        zone.set(InitialFilterQ, units::db_to_centibels(resonance));
    }

    zone.seconds("amplfo_delay", DelayModLfo)?;
    zone.hertz("amplfo_freq", FreqModLfo)?;
    if let Some(depth) = region.get::<f64>("amplfo_depth")? {
        zone.set(ModLfoToVolume, units::db_to_centibels(depth));
    }
    zone.seconds("fillfo_delay", DelayModLfo)?;
    zone.hertz("fillfo_freq", FreqModLfo)?;
    zone.cents("fillfo_depth", ModLfoToFilterFc)?;
    zone.seconds("pitchlfo_delay", DelayVibLfo)?;
    zone.hertz("pitchlfo_freq", FreqVibLfo)?;
    zone.cents("pitchlfo_depth", VibLfoToPitch)?;

    if let Some(mode) = region.get::<LoopMode>("loop_mode")? {
        let modes = match mode {
            LoopMode::NoLoop | LoopMode::OneShot => 0,
            LoopMode::LoopContinuous => 1,
            LoopMode::LoopSustain => 3,
        };
        if modes != 0 {
            zone.set(SampleModes, modes);
        }
    }

    if let Some(offset) = region.get::<i64>("offset")? {
        zone.offset(StartAddrsOffset, StartAddrsCoarseOffset, offset);
    }
    if let Some(end) = region.get::<i64>("end")? {
        zone.offset(EndAddrsOffset, EndAddrsCoarseOffset, end + 1 - i64::from(wav.len));
    }
    if let Some(start) = region.get::<i64>("loop_start")? {
        zone.offset(
            StartloopAddrsOffset,
            StartloopAddrsCoarseOffset,
            start - i64::from(wav.loop_start),
        );
    }
    if let Some(end) = region.get::<i64>("loop_end")? {
        zone.offset(
            EndloopAddrsOffset,
            EndloopAddrsCoarseOffset,
            end + 1 - i64::from(wav.loop_end),
        );
    }

    if let (Some(group), Some(off_by)) = (region.get::<i64>("group")?, region.get::<i64>("off_by")?) {
        if group == off_by && (1..=127).contains(&group) {
            zone.set(ExclusiveClass, group as i32);
        }
    }

    Ok(zone.params)
}

/// Sustain level in percent to sustain attenuation in centibels.
fn sustain_to_centibels(percent: f64) -> i32 {
    if percent <= 0.0 {
        return 1440;
    }
    if percent >= 100.0 {
        return 0;
    }
    units::db_to_centibels(-20.0 * (percent / 100.0).log10())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sfz_str;

    fn wav(len: u32) -> LoadedWav {
        LoadedWav {
            ids: Vec::new(),
            root: 60,
            loop_start: 0,
            loop_end: len,
            len,
        }
    }

    fn convert(text: &str) -> ZoneParams {
        let sfz = parse_sfz_str(text).unwrap();
        let region = &sfz.regions[0];
        let root = region
            .get::<Note>("pitch_keycenter")
            .unwrap()
            .or(region.get::<Note>("key").unwrap())
            .map_or(60, |n| n.0);
        convert_region(region, &wav(1000), root).unwrap()
    }

    fn value(params: &ZoneParams, kind: GeneratorType) -> Option<i32> {
        params.generators.get(kind).map(|a| a.value(kind))
    }

    #[test]
    fn test_ranges_and_root_key() {
        let params = convert("<region> sample=a.wav key=c5 lovel=10 hivel=90");
        assert_eq!(params.key_range(), Some(Range::new(72, 72)));
        assert_eq!(params.vel_range(), Some(Range::new(10, 90)));
        assert_eq!(value(&params, GeneratorType::OverridingRootKey), Some(72));

        let params = convert("<region> sample=a.wav");
        assert_eq!(params.key_range(), None);
        assert!(params.generators.is_empty());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let sfz = parse_sfz_str("<region> sample=a.wav lokey=70 hikey=60").unwrap();
        let err = convert_region(&sfz.regions[0], &wav(10), 60).unwrap_err();
        assert!(matches!(err, SfzError::InvalidValue { ref opcode, .. } if opcode == "hikey"));
    }

    #[test]
    fn test_level_and_tuning_conversions() {
        let params = convert("<region> sample=a.wav volume=-6 pan=-50 tune=-150 transpose=1");
        assert_eq!(value(&params, GeneratorType::InitialAttenuation), Some(60));
        assert_eq!(value(&params, GeneratorType::Pan), Some(-250));
        assert_eq!(value(&params, GeneratorType::CoarseTune), None);
        assert_eq!(value(&params, GeneratorType::FineTune), Some(-50));
    }

    #[test]
    fn test_transpose_outside_midi_range_is_rejected() {
        let sfz = parse_sfz_str("<region> sample=a.wav transpose=99999999999").unwrap();
        let err = convert_region(&sfz.regions[0], &wav(10), 60).unwrap_err();
        assert!(matches!(err, SfzError::InvalidValue { ref opcode, .. } if opcode == "transpose"));

        let params = convert("<region> sample=a.wav transpose=-127");
        assert_eq!(value(&params, GeneratorType::CoarseTune), Some(-120));
    }

    #[test]
    fn test_stereo_zones_add_region_pan() {
        let mut font = SoundFont::new("Pan");
        let data = sfbank_model::SampleData::from_pcm(vec![0; 4]);
        let id = font.insert_sample(Sample::new("s", data, 44100));

        let params = convert("<region> sample=a.wav pan=-50");
        let left = stereo_zone(id, &params, -500);
        let right = stereo_zone(id, &params, 500);
        assert_eq!(value(&left.params, GeneratorType::Pan), Some(-500));
        assert_eq!(value(&right.params, GeneratorType::Pan), Some(250));

        let params = convert("<region> sample=a.wav");
        assert_eq!(value(&stereo_zone(id, &params, -500).params, GeneratorType::Pan), Some(-500));
        assert_eq!(value(&stereo_zone(id, &params, 500).params, GeneratorType::Pan), Some(500));
    }

    #[test]
    fn test_envelope_conversions() {
        let params = convert(
            "<region> sample=a.wav ampeg_attack=1 ampeg_release=0.5 ampeg_sustain=50 fileg_sustain=25 cutoff=440",
        );
        assert_eq!(value(&params, GeneratorType::AttackVolEnv), Some(0));
        assert_eq!(value(&params, GeneratorType::ReleaseVolEnv), Some(-1200));
        assert_eq!(value(&params, GeneratorType::SustainVolEnv), Some(60));
        assert_eq!(value(&params, GeneratorType::SustainModEnv), Some(750));
        assert_eq!(value(&params, GeneratorType::InitialFilterFc), Some(6900));
    }

    #[test]
    fn test_loop_and_offsets() {
        let params = convert(
            "<region> sample=a.wav loop_mode=loop_sustain offset=40000 end=899 loop_start=10 loop_end=499",
        );
        assert_eq!(value(&params, GeneratorType::SampleModes), Some(3));
        assert_eq!(value(&params, GeneratorType::StartAddrsOffset), Some(40000 - 32768));
        assert_eq!(value(&params, GeneratorType::StartAddrsCoarseOffset), Some(1));
        assert_eq!(value(&params, GeneratorType::EndAddrsOffset), Some(-100));
        assert_eq!(value(&params, GeneratorType::StartloopAddrsOffset), Some(10));
        assert_eq!(value(&params, GeneratorType::EndloopAddrsOffset), Some(-500));
    }

    #[test]
    fn test_exclusive_class_needs_matching_off_by() {
        let params = convert("<region> sample=a.wav group=3 off_by=3");
        assert_eq!(value(&params, GeneratorType::ExclusiveClass), Some(3));
        let params = convert("<region> sample=a.wav group=3 off_by=4");
        assert_eq!(value(&params, GeneratorType::ExclusiveClass), None);
    }
}
