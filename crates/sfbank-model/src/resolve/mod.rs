//! Note-time resolution of zone parameters.
//!
//! Nothing here mutates the font. Resolution never fails on stored values:
//! out-of-range generators are clamped, unknown ids are absent by
//! construction. The only errors are unknown entity ids.

pub mod generators;
pub mod modulators;
pub mod voice;

pub use generators::{
    resolve_instrument, resolve_preset, zone_matches, zone_ranges, EffectiveValues, ParameterSet,
};
pub use modulators::{resolve_zone_modulators, ModulatorSet, ModulatorSlot};
pub use voice::{
    preset_layers, resolve_instrument_voices, resolve_preset_voices, Voice, UNPITCHED_ROOT_KEY,
};
