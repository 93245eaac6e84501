use crate::ids::InstrumentId;
use crate::zone::{Zone, ZoneParams};

/// Highest regular bank; bank 128 holds percussion kits.
pub const PERCUSSION_BANK: u16 = 128;
pub const MAX_PROGRAM: u16 = 127;

/// Named, bank/program addressed set of instrument zones.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub bank: u16,
    pub program: u16,
    /// Reserved words carried through load and save untouched.
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
    pub global: ZoneParams,
    pub zones: Vec<Zone<InstrumentId>>,
}

impl Preset {
    pub fn new(name: impl Into<String>, bank: u16, program: u16) -> Self {
        Self {
            name: name.into(),
            bank,
            program,
            library: 0,
            genre: 0,
            morphology: 0,
            global: ZoneParams::new(),
            zones: Vec::new(),
        }
    }

    pub fn with_zone(mut self, zone: Zone<InstrumentId>) -> Self {
        self.zones.push(zone);
        self
    }

    pub fn uses_instrument(&self, instrument: InstrumentId) -> bool {
        self.zones.iter().any(|z| z.target == instrument)
    }

    pub fn is_percussion(&self) -> bool {
        self.bank == PERCUSSION_BANK
    }
}
