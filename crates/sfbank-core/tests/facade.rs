use std::fs;

use sfbank_core::{open, save, save_with, CoreError, FontHandle, Format, OpenReport, SaveOptions};
use sfbank_model::resolve::resolve_preset_voices;
use sfbank_model::{Instrument, IoKind, Preset, Sample, SampleData, SoundFont, Version, Zone};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn demo_font() -> SoundFont {
    let mut font = SoundFont::new("Demo");
    let frames: Vec<i16> = (0..1000).map(|i| ((i % 100) * 200 - 10000) as i16).collect();
    let sample = font
        .add_sample(Sample::new("Saw", SampleData::from_pcm(frames), 44100).with_loop(100, 900))
        .unwrap();
    let inst = font
        .add_instrument(Instrument::new("Saw").with_zone(Zone::new(sample)))
        .unwrap();
    font.add_preset(Preset::new("Saw Lead", 0, 80).with_zone(Zone::new(inst)))
        .unwrap();
    font
}

#[test]
fn test_sf2_save_and_open() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.sf2");
    let handle = FontHandle::new(demo_font());

    let report = save(&handle, &path, Format::Sf2 { version: Version::SF2_04 }).unwrap();
    assert_eq!(report.files, vec![path.clone()]);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

    let opened = open(&path).unwrap();
    assert!(opened.report.is_clean(), "{:?}", opened.report.warnings());
    assert_eq!(opened.font.info.version, Version::SF2_04);
    let preset = opened.font.find_preset(0, 80).unwrap();
    let voices = resolve_preset_voices(&opened.font, preset, 60, 100).unwrap();
    assert_eq!(voices.len(), 1);
}

#[test]
fn test_compressed_save_and_open() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.sf3");
    let font = demo_font();
    let handle = FontHandle::new(font.clone());

    let report = save(&handle, &path, Format::Sf3).unwrap();
    assert!(report.fallback_samples.is_empty());

    let opened = open(&path).unwrap();
    let original = font.sample(font.find_sample("Saw").unwrap()).unwrap();
    let loaded = opened
        .font
        .sample(opened.font.find_sample("Saw").unwrap())
        .unwrap();
    assert_eq!(loaded.data.frames(), original.data.frames());
    assert_eq!((loaded.loop_start, loaded.loop_end), (100, 900));
}

#[test]
fn test_sfz_save_and_open() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("export");
    let handle = FontHandle::new(demo_font());
    let options = SaveOptions {
        sfz: sfbank_sfz::ExportOptions {
            classify: false,
            sample_dir: "samples".to_string(),
        },
        ..SaveOptions::default()
    };

    let report = save_with(&handle, &out, Format::Sfz, &options).unwrap();
    assert_eq!(report.files, vec![out.join("000-080 Saw Lead.sfz")]);

    let opened = open(&report.files[0]).unwrap();
    assert!(matches!(opened.report, OpenReport::Sfz(_)));
    assert_eq!(opened.font.info.name, "000-080 Saw Lead");
    assert_eq!(opened.font.sample_count(), 1);
    assert_eq!(opened.font.preset_count(), 1);
}

#[test]
fn test_corrupt_file_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.sf2");
    fs::write(&path, b"RIFF\x04\0\0\0junk").unwrap();
    assert!(matches!(open(&path), Err(CoreError::Sf2(_))));
}

#[test]
fn test_unnamed_bank_is_an_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unnamed.sf2");
    let mut font = demo_font();
    font.info.name.clear();

    let err = save(&FontHandle::new(font), &path, Format::Sf2 { version: Version::SF2_01 }).unwrap_err();
    assert!(err.is_integrity());
    assert!(!path.exists());
}

#[test]
fn test_failed_save_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keep.sf2");
    fs::write(&path, b"previous").unwrap();
    let mut font = demo_font();
    font.info.name.clear();

    assert!(save(&FontHandle::new(font), &path, Format::Sf2 { version: Version::SF2_01 }).is_err());
    assert_eq!(fs::read(&path).unwrap(), b"previous");
}

#[test]
fn test_save_into_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing/out.sf2");
    let err = save(&FontHandle::new(demo_font()), &path, Format::Sf3).unwrap_err();
    assert!(matches!(err, CoreError::Io { kind: IoKind::NotFound, .. }));
}
