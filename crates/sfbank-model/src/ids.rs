//! Stable entity ids and the arena that owns entities.
//!
//! Ids are indices into a slot vector. Removing an entity empties its slot
//! without shifting others, so every other id stays valid.

use std::fmt;
use std::marker::PhantomData;

/// Id type usable as an arena key.
pub trait ArenaId: Copy + Eq + std::hash::Hash + fmt::Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl ArenaId for $name {
            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Id of a sample in a [`crate::SoundFont`].
    SampleId
);
entity_id!(
    /// Id of an instrument in a [`crate::SoundFont`].
    InstrumentId
);
entity_id!(
    /// Id of a preset in a [`crate::SoundFont`].
    PresetId
);

/// Kind of top-level entity, used in errors and collision prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Sample,
    Instrument,
    Preset,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample => f.write_str("sample"),
            Self::Instrument => f.write_str("instrument"),
            Self::Preset => f.write_str("preset"),
        }
    }
}

/// Slot storage keyed by a typed id.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    slots: Vec<Option<T>>,
    live: usize,
    _id: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _id: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> I {
        let id = I::from_index(self.slots.len());
        self.slots.push(Some(value));
        self.live += 1;
        id
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let value = self.slots.get_mut(id.index()).and_then(Option::take);
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (I::from_index(i), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (I::from_index(i), v)))
    }

    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.iter().map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_survive_removal() {
        let mut arena: Arena<SampleId, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        let c = arena.insert("c");

        assert_eq!(arena.remove(b), Some("b"));
        assert_eq!(arena.remove(b), None);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(c), Some(&"c"));

        // Slots are never reused
        let d = arena.insert("d");
        assert_ne!(d, b);
        let ids: Vec<_> = arena.ids().collect();
        assert_eq!(ids, vec![a, c, d]);
    }
}
