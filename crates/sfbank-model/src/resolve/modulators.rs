//! Modulator resolution: defaults, overrides, disables and additions.

use crate::attributes::{Level, Modulator, ModulatorSignature};
use crate::error::Result;
use crate::soundfont::{SoundFont, ZoneRef};
use crate::zone::{ModulatorList, ZoneModulator};

/// State of one effective modulator slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulatorSlot {
    /// A default modulator left untouched.
    Default(Modulator),
    /// A default modulator replaced by an explicit one with its signature.
    Overridden {
        default: Modulator,
        effective: Modulator,
    },
    /// A default modulator suppressed by an explicit disable.
    Disabled(Modulator),
    /// An explicit modulator with no default counterpart.
    Added(Modulator),
}

impl ModulatorSlot {
    pub fn signature(&self) -> ModulatorSignature {
        match self {
            Self::Default(m) | Self::Disabled(m) | Self::Added(m) => m.signature(),
            Self::Overridden { default, .. } => default.signature(),
        }
    }

    /// The modulator in effect, if any.
    pub fn active(&self) -> Option<&Modulator> {
        match self {
            Self::Default(m) | Self::Added(m) => Some(m),
            Self::Overridden { effective, .. } => Some(effective),
            Self::Disabled(_) => None,
        }
    }
}

/// Effective modulators of a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ModulatorSet {
    slots: Vec<ModulatorSlot>,
}

impl ModulatorSet {
    /// Instrument zones start from the ten defaults, preset zones from
    /// nothing.
    pub fn new(level: Level) -> Self {
        let slots = match level {
            Level::Instrument => Modulator::defaults()
                .into_iter()
                .map(ModulatorSlot::Default)
                .collect(),
            Level::Preset => Vec::new(),
        };
        Self { slots }
    }

    /// Resolve a zone: defaults, then global entries, then local entries.
    pub fn for_zone(level: Level, global: &ModulatorList, local: Option<&ModulatorList>) -> Self {
        let mut set = Self::new(level);
        set.apply(global);
        if let Some(local) = local {
            set.apply(local);
        }
        set
    }

    /// Apply explicit entries in order.
    pub fn apply(&mut self, list: &ModulatorList) {
        for entry in list.iter() {
            self.apply_entry(entry);
        }
    }

    fn apply_entry(&mut self, entry: &ZoneModulator) {
        let sig = entry.signature();
        let position = self.slots.iter().position(|s| s.signature() == sig);
        match (entry, position) {
            (ZoneModulator::Active(m), Some(i)) => {
                self.slots[i] = match self.slots[i] {
                    ModulatorSlot::Default(d)
                    | ModulatorSlot::Disabled(d)
                    | ModulatorSlot::Overridden { default: d, .. } => ModulatorSlot::Overridden {
                        default: d,
                        effective: *m,
                    },
                    ModulatorSlot::Added(_) => ModulatorSlot::Added(*m),
                };
            }
            (ZoneModulator::Active(m), None) => self.slots.push(ModulatorSlot::Added(*m)),
            (ZoneModulator::Disabled(_), Some(i)) => match self.slots[i] {
                ModulatorSlot::Default(d)
                | ModulatorSlot::Disabled(d)
                | ModulatorSlot::Overridden { default: d, .. } => {
                    self.slots[i] = ModulatorSlot::Disabled(d);
                }
                ModulatorSlot::Added(_) => {
                    self.slots.remove(i);
                }
            },
            // Disabling something that is not there has no effect
            (ZoneModulator::Disabled(_), None) => {}
        }
    }

    pub fn slots(&self) -> &[ModulatorSlot] {
        &self.slots
    }

    pub fn find(&self, sig: &ModulatorSignature) -> Option<&ModulatorSlot> {
        self.slots.iter().find(|s| s.signature() == *sig)
    }

    /// Modulators in effect, in slot order.
    pub fn active(&self) -> Vec<Modulator> {
        self.slots.iter().filter_map(|s| s.active().copied()).collect()
    }
}

/// Effective modulators of one zone of the font.
///
/// Local zones inherit the global zone's entries; a global zone resolves on
/// its own.
pub fn resolve_zone_modulators(font: &SoundFont, zone: ZoneRef) -> Result<ModulatorSet> {
    let params = font.zone_params(zone)?;
    let set = match zone {
        ZoneRef::InstrumentGlobal(_) | ZoneRef::PresetGlobal(_) => {
            ModulatorSet::for_zone(zone.level(), &params.modulators, None)
        }
        ZoneRef::Instrument(id, _) => {
            let global = &font.instrument_ref(id)?.global;
            ModulatorSet::for_zone(Level::Instrument, &global.modulators, Some(&params.modulators))
        }
        ZoneRef::Preset(id, _) => {
            let global = &font.preset_ref(id)?.global;
            ModulatorSet::for_zone(Level::Preset, &global.modulators, Some(&params.modulators))
        }
    };
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{GeneratorType, ModDestination, ModSource};

    fn velocity_to_attenuation() -> Modulator {
        Modulator::defaults()[0]
    }

    #[test]
    fn test_instrument_starts_with_defaults() {
        let set = ModulatorSet::new(Level::Instrument);
        assert_eq!(set.active().len(), 10);
        assert!(ModulatorSet::new(Level::Preset).active().is_empty());
    }

    #[test]
    fn test_disable_removes_default() {
        let mut list = ModulatorList::new();
        list.disable(velocity_to_attenuation().signature());
        let set = ModulatorSet::for_zone(Level::Instrument, &list, None);

        assert_eq!(set.active().len(), 9);
        assert_eq!(
            set.find(&velocity_to_attenuation().signature()),
            Some(&ModulatorSlot::Disabled(velocity_to_attenuation()))
        );
    }

    #[test]
    fn test_zero_amount_is_an_override() {
        let mut zero = velocity_to_attenuation();
        zero.amount = 0;
        let mut list = ModulatorList::new();
        list.add(zero).unwrap();
        let set = ModulatorSet::for_zone(Level::Instrument, &list, None);

        assert_eq!(set.active().len(), 10);
        assert!(set.active().contains(&zero));
        assert!(matches!(
            set.find(&zero.signature()),
            Some(ModulatorSlot::Overridden { effective, .. }) if effective.amount == 0
        ));
    }

    #[test]
    fn test_different_signature_coexists() {
        let extra = Modulator::new(
            ModSource::from_raw(0x0081),
            ModDestination::Generator(GeneratorType::InitialFilterFc),
            -1200,
        );
        let mut list = ModulatorList::new();
        list.add(extra).unwrap();
        let set = ModulatorSet::for_zone(Level::Instrument, &list, None);

        assert_eq!(set.active().len(), 11);
        for d in Modulator::defaults() {
            assert_eq!(set.find(&d.signature()), Some(&ModulatorSlot::Default(d)));
        }
    }

    #[test]
    fn test_local_overrides_global() {
        let base = velocity_to_attenuation();
        let mut global = ModulatorList::new();
        global.disable(base.signature());

        let mut loud = base;
        loud.amount = 480;
        let mut local = ModulatorList::new();
        local.add(loud).unwrap();

        let set = ModulatorSet::for_zone(Level::Instrument, &global, Some(&local));
        assert_eq!(
            set.find(&base.signature()),
            Some(&ModulatorSlot::Overridden {
                default: base,
                effective: loud
            })
        );

        // A global addition disabled locally disappears
        let extra = Modulator::new(
            ModSource::from_raw(0x0003),
            ModDestination::Generator(GeneratorType::Pan),
            100,
        );
        let mut global = ModulatorList::new();
        global.add(extra).unwrap();
        let mut local = ModulatorList::new();
        local.disable(extra.signature());
        let set = ModulatorSet::for_zone(Level::Instrument, &global, Some(&local));
        assert!(set.find(&extra.signature()).is_none());
        assert_eq!(set.active().len(), 10);
    }
}
