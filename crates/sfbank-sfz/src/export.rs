//! SFZ export: one `.sfz` file per preset.
//!
//! SFZ has no preset level, so every preset is flattened: each preset zone
//! crossed with each overlapping instrument zone becomes one region carrying
//! the combined values. Samples are written once per directory as WAV files.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sfbank_model::attributes::units;
use sfbank_model::resolve::{preset_layers, Voice};
use sfbank_model::{GeneratorType, IoKind, ModelError, PresetId, Range, SampleId, SoundFont};

use crate::error::{Result, SfzError};
use crate::family::family_directory;
use crate::parser::LoopMode;
use crate::wav::write_wav;

/// How presets are laid out on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Sort presets into instrument-family directories.
    pub classify: bool,
    /// Sub-directory, next to each `.sfz` file, holding its samples.
    pub sample_dir: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            classify: true,
            sample_dir: "samples".to_string(),
        }
    }
}

/// Files produced by an export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub samples: Vec<PathBuf>,
    /// Samples left out because they have no data (ROM samples).
    pub skipped_samples: Vec<String>,
}

/// Export every preset of `font` under `dir`.
pub fn export_sfz(font: &SoundFont, dir: impl AsRef<Path>, options: &ExportOptions) -> Result<ExportReport> {
    let dir = dir.as_ref();
    let mut presets: Vec<(PresetId, u16, u16)> = font
        .presets()
        .map(|(id, preset)| (id, preset.bank, preset.program))
        .collect();
    presets.sort_by_key(|&(_, bank, program)| (bank, program));

    let mut exporter = Exporter {
        font,
        options,
        report: ExportReport::default(),
        written: HashMap::new(),
        used_names: HashMap::new(),
    };
    for (id, bank, program) in presets {
        let target = if options.classify {
            dir.join(family_directory(bank, program))
        } else {
            dir.to_path_buf()
        };
        exporter.preset(id, &target)?;
    }
    info!(
        "Exported {} presets and {} samples to {}",
        exporter.report.files.len(),
        exporter.report.samples.len(),
        dir.display()
    );
    Ok(exporter.report)
}

struct Exporter<'a> {
    font: &'a SoundFont,
    options: &'a ExportOptions,
    report: ExportReport,
    /// WAV file name of each sample already written, per directory.
    written: HashMap<(PathBuf, SampleId), String>,
    used_names: HashMap<PathBuf, HashSet<String>>,
}

impl Exporter<'_> {
    fn preset(&mut self, id: PresetId, dir: &Path) -> Result<()> {
        let font = self.font;
        let preset = font.preset(id).ok_or(ModelError::UnknownPreset(id))?;
        create_dir(dir)?;

        let mut text = format!(
            "// {} ({:03}:{:03}) from {}\n",
            preset.name, preset.bank, preset.program, font.info.name
        );
        for voice in preset_layers(font, id)? {
            let Some(file) = self.sample_file(dir, voice.sample)? else {
                continue;
            };
            text.push_str("\n<region>\n");
            for (opcode, value) in self.region(&voice, &file)? {
                text.push_str(&format!("{}={}\n", opcode, value));
            }
        }

        let path = dir.join(format!(
            "{:03}-{:03} {}.sfz",
            preset.bank,
            preset.program,
            file_name(&preset.name)
        ));
        fs::write(&path, text).map_err(|e| SfzError::io(&path, &e, IoKind::Write))?;
        debug!("Wrote {}", path.display());
        self.report.files.push(path);
        Ok(())
    }

    /// Relative path of the sample's WAV file, writing it on first use.
    fn sample_file(&mut self, dir: &Path, id: SampleId) -> Result<Option<String>> {
        if let Some(name) = self.written.get(&(dir.to_path_buf(), id)) {
            return Ok(Some(name.clone()));
        }
        let font = self.font;
        let sample = font.sample(id).ok_or(ModelError::UnknownSample(id))?;
        if sample.is_empty() {
            if !self.report.skipped_samples.contains(&sample.name) {
                warn!("Sample '{}' has no data, its regions are left out", sample.name);
                self.report.skipped_samples.push(sample.name.clone());
            }
            return Ok(None);
        }

        let sample_dir = dir.join(&self.options.sample_dir);
        create_dir(&sample_dir)?;
        let used = self.used_names.entry(dir.to_path_buf()).or_default();
        let base = file_name(&sample.name);
        let mut name = format!("{}.wav", base);
        let mut n = 2;
        while used.contains(&name) {
            name = format!("{}-{}.wav", base, n);
            n += 1;
        }
        used.insert(name.clone());

        let path = sample_dir.join(&name);
        write_wav(&path, sample)?;
        self.report.samples.push(path);
        let relative = format!("{}/{}", self.options.sample_dir, name);
        self.written.insert((dir.to_path_buf(), id), relative.clone());
        Ok(Some(relative))
    }

    fn region(&self, voice: &Voice, file: &str) -> Result<Vec<(&'static str, String)>> {
        use GeneratorType::*;

        let sample = self
            .font
            .sample(voice.sample)
            .ok_or(ModelError::UnknownSample(voice.sample))?;
        let values = &voice.values;
        let mut opcodes = vec![("sample", file.to_string())];

        if voice.key_range != Range::FULL {
            opcodes.push(("lokey", voice.key_range.lo.to_string()));
            opcodes.push(("hikey", voice.key_range.hi.to_string()));
        }
        if voice.vel_range != Range::FULL {
            opcodes.push(("lovel", voice.vel_range.lo.to_string()));
            opcodes.push(("hivel", voice.vel_range.hi.to_string()));
        }
        opcodes.push(("pitch_keycenter", voice.root_key.to_string()));
        let tune = values.tuning_cents() + i32::from(sample.pitch_correction);
        if tune != 0 {
            opcodes.push(("tune", tune.to_string()));
        }
        if values.get(ScaleTuning) != 100 {
            opcodes.push(("pitch_keytrack", values.get(ScaleTuning).to_string()));
        }

        if values.get(InitialAttenuation) != 0 {
            opcodes.push(("volume", number(-values.decibels(InitialAttenuation))));
        }
        if values.get(Pan) != 0 {
            opcodes.push(("pan", number(f64::from(values.get(Pan)) / 5.0)));
        }

        let mut envelope = |stages: [(&'static str, GeneratorType); 5]| {
            for (opcode, kind) in stages {
                if values.get(kind) != kind.info().default {
                    opcodes.push((opcode, number(values.seconds(kind))));
                }
            }
        };
        envelope([
            ("ampeg_delay", DelayVolEnv),
            ("ampeg_attack", AttackVolEnv),
            ("ampeg_hold", HoldVolEnv),
            ("ampeg_decay", DecayVolEnv),
            ("ampeg_release", ReleaseVolEnv),
        ]);
        if values.get(ModEnvToPitch) != 0 {
            envelope([
                ("pitcheg_delay", DelayModEnv),
                ("pitcheg_attack", AttackModEnv),
                ("pitcheg_hold", HoldModEnv),
                ("pitcheg_decay", DecayModEnv),
                ("pitcheg_release", ReleaseModEnv),
            ]);
        }
        if values.get(ModEnvToFilterFc) != 0 {
            envelope([
                ("fileg_delay", DelayModEnv),
                ("fileg_attack", AttackModEnv),
                ("fileg_hold", HoldModEnv),
                ("fileg_decay", DecayModEnv),
                ("fileg_release", ReleaseModEnv),
            ]);
        }
        if values.get(SustainVolEnv) != 0 {
            opcodes.push(("ampeg_sustain", number(sustain_percent(values.get(SustainVolEnv)))));
        }
        let mod_sustain = number(100.0 - values.percent(SustainModEnv));
        if values.get(ModEnvToPitch) != 0 {
            if values.get(SustainModEnv) != 0 {
                opcodes.push(("pitcheg_sustain", mod_sustain.clone()));
            }
            opcodes.push(("pitcheg_depth", values.get(ModEnvToPitch).to_string()));
        }
        if values.get(ModEnvToFilterFc) != 0 {
            if values.get(SustainModEnv) != 0 {
                opcodes.push(("fileg_sustain", mod_sustain));
            }
            opcodes.push(("fileg_depth", values.get(ModEnvToFilterFc).to_string()));
        }

        if values.get(InitialFilterFc) < InitialFilterFc.info().max {
            opcodes.push(("cutoff", number(values.hertz(InitialFilterFc))));
            if values.get(InitialFilterQ) != 0 {
                opcodes.push(("resonance", number(values.decibels(InitialFilterQ))));
            }
        }

        if values.get(ModLfoToVolume) != 0 {
            opcodes.push(("amplfo_delay", number(values.seconds(DelayModLfo))));
            opcodes.push(("amplfo_freq", number(values.hertz(FreqModLfo))));
            opcodes.push(("amplfo_depth", number(values.decibels(ModLfoToVolume))));
        }
        if values.get(ModLfoToFilterFc) != 0 {
            opcodes.push(("fillfo_delay", number(values.seconds(DelayModLfo))));
            opcodes.push(("fillfo_freq", number(values.hertz(FreqModLfo))));
            opcodes.push(("fillfo_depth", values.get(ModLfoToFilterFc).to_string()));
        }
        if values.get(VibLfoToPitch) != 0 {
            opcodes.push(("pitchlfo_delay", number(values.seconds(DelayVibLfo))));
            opcodes.push(("pitchlfo_freq", number(values.hertz(FreqVibLfo))));
            opcodes.push(("pitchlfo_depth", values.get(VibLfoToPitch).to_string()));
        }

        let len = sample.len() as i64;
        let start = values.address_offset(StartAddrsOffset);
        if start != 0 {
            opcodes.push(("offset", start.to_string()));
        }
        let end = values.address_offset(EndAddrsOffset);
        if end != 0 {
            opcodes.push(("end", (len + end - 1).to_string()));
        }
        let mode = match values.get(SampleModes) {
            1 => LoopMode::LoopContinuous,
            3 => LoopMode::LoopSustain,
            _ => LoopMode::NoLoop,
        };
        if mode != LoopMode::NoLoop {
            opcodes.push(("loop_mode", mode.as_str().to_string()));
            let loop_start = i64::from(sample.loop_start) + values.address_offset(StartloopAddrsOffset);
            let loop_end = i64::from(sample.loop_end) + values.address_offset(EndloopAddrsOffset);
            opcodes.push(("loop_start", loop_start.to_string()));
            opcodes.push(("loop_end", (loop_end - 1).to_string()));
        }

        let class = values.get(ExclusiveClass);
        if class != 0 {
            opcodes.push(("group", class.to_string()));
            opcodes.push(("off_by", class.to_string()));
        }
        Ok(opcodes)
    }
}

/// Sustain attenuation in centibels to sustain level in percent.
fn sustain_percent(centibels: i32) -> f64 {
    if centibels >= 1440 {
        return 0.0;
    }
    100.0 * 10f64.powf(-units::centibels_to_db(centibels) / 20.0)
}

/// Decimal text with at most six fractional digits and no trailing zeros.
fn number(value: f64) -> String {
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Entity name made safe for use as a file name.
fn file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || " -_().".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| SfzError::io(dir, &e, IoKind::Create))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(0.5), "0.5");
        assert_eq!(number(2.0), "2");
        assert_eq!(number(-0.0000001), "0");
        assert_eq!(number(440.0), "440");
        assert_eq!(number(0.001), "0.001");
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(file_name("Piano / Soft"), "Piano _ Soft");
        assert_eq!(file_name("..."), "unnamed");
        assert_eq!(file_name("Kick:1"), "Kick_1");
    }

    #[test]
    fn test_sustain_percent() {
        assert_eq!(sustain_percent(0), 100.0);
        assert_eq!(sustain_percent(1440), 0.0);
        assert!((sustain_percent(60) - 50.1187).abs() < 0.001);
    }
}
