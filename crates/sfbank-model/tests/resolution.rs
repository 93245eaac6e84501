use sfbank_model::resolve::{
    resolve_instrument, resolve_instrument_voices, resolve_preset_voices, resolve_zone_modulators,
    ModulatorSlot,
};
use sfbank_model::{
    Amount, Generator, GeneratorType, Instrument, Level, ModDestination, ModSource, Modulator,
    Preset, Range, Sample, SampleData, SoundFont, Zone, ZoneRef,
};

fn one_sample_font() -> (SoundFont, sfbank_model::SampleId) {
    let mut font = SoundFont::new("Scenario");
    let sample = font
        .add_sample(Sample::new("Tone", SampleData::from_pcm(vec![0; 1000]), 44100).with_pitch(60, 0))
        .unwrap();
    (font, sample)
}

#[test]
fn test_single_zone_scenario() {
    let (mut font, sample) = one_sample_font();
    let inst = font
        .add_instrument(Instrument::new("Tone").with_zone(Zone::new(sample).with_key_range(0, 127)))
        .unwrap();
    let preset = font
        .add_preset(Preset::new("Tone", 0, 0).with_zone(Zone::new(inst)))
        .unwrap();

    let voices = resolve_preset_voices(&font, preset, 60, 100).unwrap();
    assert_eq!(voices.len(), 1);
    let voice = &voices[0];
    assert_eq!(voice.sample, sample);
    assert_eq!(voice.root_key, 60);
    assert_eq!(voice.modulators.len(), 10);
    assert_eq!(voice.modulators, Modulator::defaults().to_vec());
}

#[test]
fn test_disjoint_zones_do_not_leak() {
    let (mut font, sample) = one_sample_font();
    let low = Zone::new(sample)
        .with_key_range(0, 59)
        .with_generator(Generator::with_value(GeneratorType::Pan, -300));
    let high = Zone::new(sample)
        .with_key_range(60, 127)
        .with_generator(Generator::with_value(GeneratorType::FineTune, 25));
    let inst = font
        .add_instrument(Instrument::new("Split").with_zone(low).with_zone(high))
        .unwrap();

    let at_low = resolve_instrument(&font, inst, 40, 100).unwrap();
    assert_eq!(at_low.value(GeneratorType::Pan), -300);
    assert!(!at_low.is_set(GeneratorType::FineTune));

    let at_high = resolve_instrument(&font, inst, 80, 100).unwrap();
    assert_eq!(at_high.value(GeneratorType::FineTune), 25);
    assert!(!at_high.is_set(GeneratorType::Pan));
}

#[test]
fn test_overlapping_zones_apply_in_declaration_order() {
    let (mut font, sample) = one_sample_font();
    let first = Zone::new(sample).with_generator(Generator::with_value(GeneratorType::Pan, 100));
    let second = Zone::new(sample)
        .with_vel_range(0, 64)
        .with_generator(Generator::with_value(GeneratorType::Pan, 200));
    let inst = font
        .add_instrument(Instrument::new("Layer").with_zone(first).with_zone(second))
        .unwrap();

    assert_eq!(resolve_instrument(&font, inst, 60, 40).unwrap().value(GeneratorType::Pan), 200);
    assert_eq!(resolve_instrument(&font, inst, 60, 100).unwrap().value(GeneratorType::Pan), 100);
    assert_eq!(resolve_instrument_voices(&font, inst, 60, 40).unwrap().len(), 2);
}

#[test]
fn test_global_zone_and_preset_offsets() {
    let (mut font, sample) = one_sample_font();
    let mut inst = Instrument::new("Global");
    inst.global
        .generators
        .set(GeneratorType::AttackVolEnv, Amount::from_i16(-1200));
    inst.global
        .generators
        .set(GeneratorType::KeyRange, Amount::from_range(Range::new(48, 72)));
    inst.zones.push(
        Zone::new(sample).with_generator(Generator::with_value(GeneratorType::OverridingRootKey, 64)),
    );
    let inst = font.add_instrument(inst).unwrap();

    let mut preset = Preset::new("Offsets", 0, 1);
    preset
        .global
        .generators
        .set(GeneratorType::AttackVolEnv, Amount::from_i16(1200));
    preset.zones.push(Zone::new(inst));
    let preset = font.add_preset(preset).unwrap();

    let voices = resolve_preset_voices(&font, preset, 60, 100).unwrap();
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].values.get(GeneratorType::AttackVolEnv), 0);
    assert_eq!(voices[0].root_key, 64);
    assert_eq!(voices[0].key_range, Range::new(48, 72));

    // Outside the inherited global key range nothing plays
    assert!(resolve_preset_voices(&font, preset, 30, 100).unwrap().is_empty());
}

#[test]
fn test_unpitched_sample_uses_middle_c() {
    let mut font = SoundFont::new("Noise");
    let noise = font
        .add_sample(Sample::new("Noise", SampleData::from_pcm(vec![0; 10]), 22050).with_pitch(255, 0))
        .unwrap();
    let inst = font
        .add_instrument(Instrument::new("Noise").with_zone(Zone::new(noise)))
        .unwrap();
    let voices = resolve_instrument_voices(&font, inst, 90, 10).unwrap();
    assert_eq!(voices[0].root_key, 60);
}

#[test]
fn test_zone_modulators_through_editing_api() {
    let (mut font, sample) = one_sample_font();
    let inst = font.add_instrument(Instrument::new("Mods")).unwrap();
    let index = font.add_instrument_zone(inst, sample).unwrap();
    let zone = ZoneRef::Instrument(inst, index);

    let default = Modulator::defaults()[5];
    font.disable_modulator(ZoneRef::InstrumentGlobal(inst), default.signature())
        .unwrap();
    let extra = Modulator::new(
        ModSource::from_raw(0x0081),
        ModDestination::Generator(GeneratorType::ModLfoToFilterFc),
        600,
    );
    font.add_modulator(zone, extra).unwrap();

    let set = resolve_zone_modulators(&font, zone).unwrap();
    assert_eq!(set.find(&default.signature()), Some(&ModulatorSlot::Disabled(default)));
    assert_eq!(set.find(&extra.signature()), Some(&ModulatorSlot::Added(extra)));
    assert_eq!(set.active().len(), 10);

    let global = resolve_zone_modulators(&font, ZoneRef::InstrumentGlobal(inst)).unwrap();
    assert_eq!(global.active().len(), 9);
    assert_eq!(Level::Instrument, zone.level());
}
