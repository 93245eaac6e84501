//! Plain-text reports printed by the subcommands.

use sfbank_core::Opened;
use sfbank_model::attributes::units::{
    abs_cents_to_hz, centibels_to_db, permille_to_percent, timecents_to_seconds,
};
use sfbank_model::attributes::Unit;
use sfbank_model::resolve::Voice;
use sfbank_model::{GeneratorType, SoundFont};

pub fn print_info(opened: &Opened) {
    let font = &opened.font;
    let info = &font.info;
    println!("Name:        {}", info.name);
    println!("Version:     {}", info.version);
    println!("Engine:      {}", info.sound_engine);
    for (label, value) in [
        ("Created:", &info.creation_date),
        ("Engineers:", &info.engineers),
        ("Product:", &info.product),
        ("Copyright:", &info.copyright),
        ("Software:", &info.software),
        ("Comment:", &info.comment),
    ] {
        if let Some(value) = value {
            println!("{:<12} {}", label, value);
        }
    }

    let frames: usize = font.samples().map(|(_, s)| s.len()).sum();
    println!();
    println!("Samples:     {} ({} frames)", font.sample_count(), frames);
    println!("Instruments: {}", font.instrument_count());
    println!("Presets:     {}", font.preset_count());

    let mut presets: Vec<_> = font.presets().map(|(_, p)| p).collect();
    presets.sort_by_key(|p| (p.bank, p.program));
    if !presets.is_empty() {
        println!();
    }
    for preset in presets {
        println!(
            "  {:03}:{:03}  {}  ({} zone(s))",
            preset.bank,
            preset.program,
            preset.name,
            preset.zones.len()
        );
    }

    let warnings = opened.report.warnings();
    if !warnings.is_empty() {
        println!();
        println!("{} correction(s) made while loading; run `sfbank check` for details", warnings.len());
    }
}

pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        log::warn!("{}", warning);
    }
}

pub fn print_voices(font: &SoundFont, voices: &[Voice]) {
    if voices.is_empty() {
        println!("No voices");
        return;
    }
    for (index, voice) in voices.iter().enumerate() {
        let sample = font.sample(voice.sample).map_or("?", |s| s.name.as_str());
        let instrument = font.instrument(voice.instrument).map_or("?", |i| i.name.as_str());
        println!(
            "Voice {}: sample '{}' from '{}', root key {}, keys {}-{}, velocities {}-{}",
            index + 1,
            sample,
            instrument,
            voice.root_key,
            voice.key_range.lo,
            voice.key_range.hi,
            voice.vel_range.lo,
            voice.vel_range.hi
        );
        for &kind in GeneratorType::ALL.iter() {
            if kind.is_selector() || kind.is_reference() {
                continue;
            }
            let value = voice.values.get(kind);
            if value != kind.info().default {
                println!("    {:<28} {}", kind.name(), describe(kind, value));
            }
        }
        println!("    {} modulator(s)", voice.modulators.len());
        for modulator in &voice.modulators {
            log::info!("    {}", modulator);
        }
    }
}

/// Value in the unit a user reads it in.
fn describe(kind: GeneratorType, value: i32) -> String {
    match kind.info().unit {
        Unit::Timecents => format!("{:.3} s", timecents_to_seconds(value)),
        Unit::Centibels => format!("{:.1} dB", centibels_to_db(value)),
        Unit::AbsoluteCents => format!("{:.1} Hz", abs_cents_to_hz(value)),
        Unit::Permille => format!("{:.1} %", permille_to_percent(value)),
        Unit::Cents | Unit::CentsPerKey => format!("{} cents", value),
        Unit::Semitones => format!("{} semitones", value),
        _ => value.to_string(),
    }
}

/// Print load corrections and integrity issues; returns the number of defects.
pub fn print_check(opened: &Opened) -> usize {
    let warnings = opened.report.warnings();
    if warnings.is_empty() {
        println!("Loaded without corrections");
    } else {
        println!("{} correction(s) made while loading:", warnings.len());
        for warning in &warnings {
            println!("  {}", warning);
        }
    }

    let issues = opened.font.check();
    let defects = issues.iter().filter(|issue| !issue.is_warning_only()).count();
    if issues.is_empty() {
        println!("No integrity issues");
    } else {
        println!("{} integrity issue(s):", issues.len());
        for issue in &issues {
            let tag = if issue.is_warning_only() { "note" } else { "error" };
            println!("  {}: {}", tag, issue);
        }
    }
    defects
}
