use std::fs;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use sfbank_model::resolve::resolve_preset_voices;
use sfbank_model::{GeneratorType, Instrument, Preset, Sample, SampleData, SampleLink, SoundFont, Zone};
use sfbank_sfz::{export_sfz, import_sfz, ExportOptions, ImportWarning, SfzError};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_wav(path: &Path, channels: u16, frames: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let spec = WavSpec {
        channels,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..frames * usize::from(channels) {
        writer.write_sample((i as i16).wrapping_mul(31)).unwrap();
    }
    writer.finalize().unwrap();
}

const DRUMS: &str = "
<control> default_path=samples/
<global> ampeg_release=0.5
<group> lovel=1 hivel=100
<region> sample=kick.wav key=36 volume=-6 amp_veltrack=50
<region> sample=pad.wav lokey=48 hikey=72 pitch_keycenter=60
         loop_mode=loop_continuous loop_start=10 loop_end=89
<region> key=40
";

fn font_with_piano() -> SoundFont {
    let mut font = SoundFont::new("Bank");
    let sample = font
        .add_sample(Sample::new("Piano", SampleData::from_pcm(vec![0; 16]), 44100))
        .unwrap();
    let inst = font
        .add_instrument(Instrument::new("Piano").with_zone(Zone::new(sample)))
        .unwrap();
    font.add_preset(Preset::new("Piano", 0, 0).with_zone(Zone::new(inst)))
        .unwrap();
    font
}

fn setup(dir: &Path) -> std::path::PathBuf {
    write_wav(&dir.join("samples/kick.wav"), 1, 100);
    write_wav(&dir.join("samples/pad.wav"), 2, 100);
    let path = dir.join("drums.sfz");
    fs::write(&path, DRUMS).unwrap();
    path
}

#[test]
fn test_import_builds_instrument_and_preset() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = setup(dir.path());
    let mut font = font_with_piano();

    let report = import_sfz(&path, &mut font).unwrap();
    assert_eq!(
        report.warnings,
        vec![
            ImportWarning::RegionSkipped {
                region: 2,
                reason: "no sample".to_string()
            },
            ImportWarning::UnsupportedOpcode {
                opcode: "amp_veltrack".to_string()
            },
        ]
    );

    let preset = font.preset(report.preset).unwrap();
    assert_eq!((preset.name.as_str(), preset.bank, preset.program), ("drums", 0, 1));
    let instrument = font.instrument(report.instrument).unwrap();
    assert_eq!(instrument.zones.len(), 3);

    let kick = font.sample(font.find_sample("kick").unwrap()).unwrap();
    assert_eq!(kick.original_pitch, 36);
    assert_eq!(kick.len(), 100);

    let left = font.find_sample("padL").unwrap();
    let right = font.find_sample("padR").unwrap();
    assert_eq!(font.sample(left).unwrap().link(), SampleLink::Left(right));
    let pad = font.sample(left).unwrap();
    assert_eq!((pad.loop_start, pad.loop_end), (10, 90));
    assert_eq!(pad.original_pitch, 60);

    let voices = resolve_preset_voices(&font, report.preset, 60, 64).unwrap();
    assert_eq!(voices.len(), 2);
    let pans: Vec<i32> = voices.iter().map(|v| v.values.get(GeneratorType::Pan)).collect();
    assert_eq!(pans, vec![-500, 500]);
    assert_eq!(voices[0].values.get(GeneratorType::ReleaseVolEnv), -1200);
    assert_eq!(voices[0].values.get(GeneratorType::SampleModes), 1);

    // velocity 101 is outside the group's range
    assert!(resolve_preset_voices(&font, report.preset, 60, 101).unwrap().is_empty());
}

#[test]
fn test_failed_import_leaves_font_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sfz");
    fs::write(&path, "<region> sample=missing.wav").unwrap();
    let mut font = font_with_piano();
    let before = font.clone();

    let err = import_sfz(&path, &mut font).unwrap_err();
    assert!(matches!(err, SfzError::Io { .. }));
    assert_eq!(font.sample_count(), before.sample_count());
    assert_eq!(font.preset_count(), 1);
}

#[test]
fn test_file_without_regions_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.sfz");
    fs::write(&path, "<global> volume=-3").unwrap();
    let mut font = SoundFont::new("Empty");
    assert!(matches!(import_sfz(&path, &mut font), Err(SfzError::MissingRegion)));
}

#[test]
fn test_export_then_import_keeps_the_voices() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = setup(dir.path());
    let mut font = SoundFont::new("Bank");
    let report = import_sfz(&path, &mut font).unwrap();

    let out = tempfile::tempdir().unwrap();
    let exported = export_sfz(&font, out.path(), &ExportOptions::default()).unwrap();
    let sfz_path = out.path().join("000-007 Piano").join("000-000 drums.sfz");
    assert_eq!(exported.files, vec![sfz_path.clone()]);
    assert_eq!(exported.samples.len(), 3);
    assert!(out.path().join("000-007 Piano/samples/kick.wav").exists());

    let mut again = SoundFont::new("Again");
    let reimported = import_sfz(&sfz_path, &mut again).unwrap();
    assert!(reimported.warnings.is_empty(), "{:?}", reimported.warnings);

    for (key, velocity) in [(36, 50), (60, 64), (72, 100)] {
        let before = resolve_preset_voices(&font, report.preset, key, velocity).unwrap();
        let after = resolve_preset_voices(&again, reimported.preset, key, velocity).unwrap();
        assert_eq!(before.len(), after.len(), "key {key}");
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.root_key, a.root_key);
            assert_eq!(b.key_range, a.key_range);
            assert_eq!(b.vel_range, a.vel_range);
            for kind in [
                GeneratorType::Pan,
                GeneratorType::InitialAttenuation,
                GeneratorType::ReleaseVolEnv,
                GeneratorType::SampleModes,
            ] {
                assert_eq!(b.values.get(kind), a.values.get(kind), "{kind} at key {key}");
            }
            let (bs, as_) = (font.sample(b.sample).unwrap(), again.sample(a.sample).unwrap());
            assert_eq!(bs.data, as_.data);
            assert_eq!((bs.loop_start, bs.loop_end), (as_.loop_start, as_.loop_end));
        }
    }
}

#[test]
fn test_export_without_classification() {
    let mut font = font_with_piano();
    font.info.name = "Flat".to_string();
    let out = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        classify: false,
        sample_dir: "wav".to_string(),
    };
    let report = export_sfz(&font, out.path(), &options).unwrap();
    assert_eq!(report.files, vec![out.path().join("000-000 Piano.sfz")]);

    let text = fs::read_to_string(&report.files[0]).unwrap();
    assert!(text.contains("sample=wav/Piano.wav"));
    assert!(text.contains("pitch_keycenter=60"));
    assert!(!text.contains("lokey"));
}
