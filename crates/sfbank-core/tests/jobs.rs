use std::fs;

use crossbeam_channel::bounded;
use sfbank_core::jobs::{compress_job, duplicate_job, load_job, save_job};
use sfbank_core::{CoreError, FontHandle, Format, Progress, SaveOptions};
use sfbank_model::{Choice, Instrument, Preset, Sample, SampleData, SoundFont, Subtree, Version, Zone};
use sfbank_sf2::CodecFailurePolicy;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn drum_font() -> SoundFont {
    let mut font = SoundFont::new("Drums");
    let kick = font
        .add_sample(Sample::new("Kick", SampleData::from_pcm(vec![100; 500]), 44100))
        .unwrap();
    let inst = font
        .add_instrument(Instrument::new("Kit").with_zone(Zone::new(kick)))
        .unwrap();
    font.add_preset(Preset::new("Standard", 128, 0).with_zone(Zone::new(inst)))
        .unwrap();
    font
}

#[test]
fn test_save_then_load_in_background() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drums.sf2");
    let handle = FontHandle::new(drum_font());

    let job = save_job(&handle, &path, Format::Sf2 { version: Version::SF2_01 }, SaveOptions::default());
    let progress = job.progress().clone();
    job.join().unwrap();
    let updates: Vec<Progress> = progress.iter().collect();
    assert_eq!(updates.last(), Some(&Progress { done: 3, total: 3 }));

    let loaded = load_job(&path).join().unwrap();
    assert_eq!(loaded.font.info.name, "Drums");
    assert!(loaded.font.find_preset(128, 0).is_some());
}

#[test]
fn test_compress_job_writes_compressed_bank() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drums.sf3");
    let handle = FontHandle::new(drum_font());

    let report = compress_job(&handle, &path, 0.8, CodecFailurePolicy::Abort)
        .join()
        .unwrap();
    assert!(report.fallback_samples.is_empty());
    let loaded = load_job(&path).join().unwrap();
    assert_eq!(loaded.font.info.version.major, 3);
}

#[test]
fn test_duplicate_with_suffix() {
    init();
    let handle = FontHandle::new(drum_font());
    let kick = handle.read(|font| font.find_sample("Kick").unwrap());

    let job = duplicate_job(&handle, &handle, vec![Subtree::Sample(kick)], 2, |_| Choice::DuplicateOne).unwrap();
    let report = job.join().unwrap();
    assert_eq!(report.created, 1);
    assert!(!handle.is_editing());

    handle.read(|font| {
        let copy = font.find_sample("Kick2").unwrap();
        assert_eq!(report.samples[&kick], copy);
        assert_eq!(font.sample(kick).unwrap().name, "Kick");
        assert_eq!(font.sample_count(), 2);
    });
}

#[test]
fn test_duplicate_across_fonts() {
    let source = FontHandle::new(drum_font());
    let target = FontHandle::new(SoundFont::new("Empty"));
    let preset = source.read(|font| font.find_preset(128, 0).unwrap());

    let report = duplicate_job(&source, &target, vec![Subtree::Preset(preset)], 2, |_| Choice::IgnoreAll)
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(target.read(|font| font.preset_count()), 1);
    assert_eq!(source.read(|font| font.preset_count()), 1);
}

#[test]
fn test_duplicate_needs_the_edit_right() {
    let handle = FontHandle::new(drum_font());
    let _guard = handle.edit().unwrap();
    let result = duplicate_job(&handle, &handle, Vec::new(), 2, |_| Choice::IgnoreOne);
    assert!(matches!(result, Err(CoreError::Busy)));
}

#[test]
fn test_cancelled_duplicate_leaves_target_untouched() {
    init();
    let handle = FontHandle::new(drum_font());
    let preset = handle.read(|font| font.find_preset(128, 0).unwrap());
    let (asked_tx, asked_rx) = bounded(1);
    let (answer_tx, answer_rx) = bounded(1);

    // The first collision blocks until the test has cancelled the job
    let job = duplicate_job(&handle, &handle, vec![Subtree::Preset(preset)], 2, move |_| {
        let _ = asked_tx.send(());
        answer_rx.recv().unwrap_or(Choice::DuplicateAll)
    })
    .unwrap();
    asked_rx.recv().unwrap();
    assert!(handle.is_editing());
    job.cancel();
    answer_tx.send(Choice::DuplicateAll).unwrap();

    let err = job.join().unwrap_err();
    assert!(err.is_cancelled());
    assert!(!handle.is_editing());
    handle.read(|font| {
        assert_eq!(font.sample_count(), 1);
        assert_eq!(font.instrument_count(), 1);
        assert!(font.find_sample("Kick2").is_none());
    });
}

#[test]
fn test_load_job_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_job(dir.path().join("none.sf2")).join().unwrap_err();
    assert!(matches!(err, CoreError::Io { .. }));
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}
