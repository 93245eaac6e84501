//! Zones: ordered generator and modulator lists bound to a target.

use crate::attributes::{Amount, Generator, GeneratorType, Modulator, ModulatorSignature, Range};
use crate::error::{ModelError, Result};

/// Ordered generators of one zone, at most one per generator type.
///
/// Order is kept as declared; replacing a value keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorList {
    items: Vec<Generator>,
}

impl GeneratorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: GeneratorType) -> Option<Amount> {
        self.items.iter().find(|g| g.kind == kind).map(|g| g.amount)
    }

    pub fn contains(&self, kind: GeneratorType) -> bool {
        self.get(kind).is_some()
    }

    /// Set a value, replacing in place or appending. Returns the old value.
    pub fn set(&mut self, kind: GeneratorType, amount: Amount) -> Option<Amount> {
        match self.items.iter_mut().find(|g| g.kind == kind) {
            Some(existing) => Some(std::mem::replace(&mut existing.amount, amount)),
            None => {
                self.items.push(Generator::new(kind, amount));
                None
            }
        }
    }

    pub fn remove(&mut self, kind: GeneratorType) -> Option<Amount> {
        let pos = self.items.iter().position(|g| g.kind == kind)?;
        Some(self.items.remove(pos).amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Generator> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn key_range(&self) -> Option<Range> {
        self.get(GeneratorType::KeyRange).map(Amount::as_range)
    }

    pub fn vel_range(&self) -> Option<Range> {
        self.get(GeneratorType::VelRange).map(Amount::as_range)
    }
}

impl FromIterator<Generator> for GeneratorList {
    fn from_iter<T: IntoIterator<Item = Generator>>(iter: T) -> Self {
        let mut list = GeneratorList::new();
        for g in iter {
            list.set(g.kind, g.amount);
        }
        list
    }
}

/// Explicit modulator entry of a zone.
///
/// Disabling is an explicit state: an amount of zero is a valid override
/// and never means "disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneModulator {
    Active(Modulator),
    /// Suppresses an inherited modulator with this signature.
    Disabled(ModulatorSignature),
}

impl ZoneModulator {
    pub fn signature(&self) -> ModulatorSignature {
        match self {
            Self::Active(m) => m.signature(),
            Self::Disabled(sig) => *sig,
        }
    }
}

/// Explicit modulators of one zone; signatures are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulatorList {
    items: Vec<ZoneModulator>,
}

impl ModulatorList {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, sig: &ModulatorSignature) -> Option<usize> {
        self.items.iter().position(|m| m.signature() == *sig)
    }

    pub fn find(&self, sig: &ModulatorSignature) -> Option<&ZoneModulator> {
        self.position(sig).map(|i| &self.items[i])
    }

    /// Append a new modulator; fails if its signature is already present.
    pub fn add(&mut self, modulator: Modulator) -> Result<()> {
        let sig = modulator.signature();
        if self.position(&sig).is_some() {
            return Err(ModelError::DuplicateModulator(sig));
        }
        self.items.push(ZoneModulator::Active(modulator));
        Ok(())
    }

    /// Replace the entry with the same signature in place, or append.
    /// Returns the previous entry.
    pub fn replace(&mut self, modulator: Modulator) -> Option<ZoneModulator> {
        self.put(ZoneModulator::Active(modulator))
    }

    /// Mark a signature disabled, replacing any entry for it.
    pub fn disable(&mut self, sig: ModulatorSignature) -> Option<ZoneModulator> {
        self.put(ZoneModulator::Disabled(sig))
    }

    fn put(&mut self, entry: ZoneModulator) -> Option<ZoneModulator> {
        match self.position(&entry.signature()) {
            Some(i) => Some(std::mem::replace(&mut self.items[i], entry)),
            None => {
                self.items.push(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, sig: &ModulatorSignature) -> Option<ZoneModulator> {
        let i = self.position(sig)?;
        Some(self.items.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZoneModulator> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Generators and modulators of one zone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneParams {
    pub generators: GeneratorList,
    pub modulators: ModulatorList,
}

impl ZoneParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty global zone is equivalent to no global zone.
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty() && self.modulators.is_empty()
    }

    pub fn key_range(&self) -> Option<Range> {
        self.generators.key_range()
    }

    pub fn vel_range(&self) -> Option<Range> {
        self.generators.vel_range()
    }
}

/// A local zone bound to its target (a sample or an instrument).
#[derive(Debug, Clone, PartialEq)]
pub struct Zone<R> {
    pub target: R,
    pub params: ZoneParams,
}

impl<R> Zone<R> {
    pub fn new(target: R) -> Self {
        Self {
            target,
            params: ZoneParams::new(),
        }
    }

    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.params.generators.set(generator.kind, generator.amount);
        self
    }

    pub fn with_key_range(self, lo: u8, hi: u8) -> Self {
        self.with_generator(Generator::new(
            GeneratorType::KeyRange,
            Amount::from_range(Range::new(lo, hi)),
        ))
    }

    pub fn with_vel_range(self, lo: u8, hi: u8) -> Self {
        self.with_generator(Generator::new(
            GeneratorType::VelRange,
            Amount::from_range(Range::new(lo, hi)),
        ))
    }
}

/// Effective key or velocity range of a local zone: its own, else the
/// global zone's, else the full range.
pub fn effective_range(local: Option<Range>, global: Option<Range>) -> Range {
    local.or(global).unwrap_or(Range::FULL)
}
