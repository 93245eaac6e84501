use crate::ids::SampleId;
use crate::zone::{Zone, ZoneParams};

/// Named set of sample zones.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub name: String,
    /// Global zone; empty when the instrument has none.
    pub global: ZoneParams,
    pub zones: Vec<Zone<SampleId>>,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global: ZoneParams::new(),
            zones: Vec::new(),
        }
    }

    pub fn with_zone(mut self, zone: Zone<SampleId>) -> Self {
        self.zones.push(zone);
        self
    }

    /// Whether any zone plays `sample`.
    pub fn uses_sample(&self, sample: SampleId) -> bool {
        self.zones.iter().any(|z| z.target == sample)
    }
}
