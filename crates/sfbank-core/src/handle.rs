//! Shared, exclusively edited sound bank instances.
//!
//! A [`FontHandle`] wraps one [`SoundFont`] in an `Arc<RwLock>` so any
//! number of threads can read it. Mutation goes through an [`EditGuard`]:
//! at most one exists per instance, and a second [`FontHandle::edit`] fails
//! fast with [`CoreError::Busy`] instead of queueing behind a long job.
//!
//! Edits run on a copy that replaces the shared font only when the edit
//! succeeds, so a failed or cancelled operation leaves the instance
//! exactly as it was.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use sfbank_model::SoundFont;

use crate::error::{CoreError, Result};

/// Thread-safe handle to one sound bank.
#[derive(Clone)]
pub struct FontHandle {
    font: Arc<RwLock<SoundFont>>,
    editing: Arc<AtomicBool>,
}

impl FontHandle {
    pub fn new(font: SoundFont) -> Self {
        Self {
            font: Arc::new(RwLock::new(font)),
            editing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read the font with a closure.
    ///
    /// Readers never wait for a running edit: the shared font is only
    /// locked for writing while a finished edit is swapped in.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SoundFont) -> R,
    {
        // The font is replaced whole, so a poisoned lock still guards a
        // consistent value.
        let font = self.font.read().unwrap_or_else(PoisonError::into_inner);
        f(&font)
    }

    /// Clone of the current font.
    pub fn snapshot(&self) -> SoundFont {
        self.read(|font| font.clone())
    }

    /// Take the exclusive editing right.
    pub fn edit(&self) -> Result<EditGuard> {
        self.editing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::Busy)?;
        debug!("Editing started");
        Ok(EditGuard {
            handle: self.clone(),
        })
    }

    /// Whether an edit is in progress.
    pub fn is_editing(&self) -> bool {
        self.editing.load(Ordering::Acquire)
    }

    /// Whether both handles point at the same instance.
    pub fn same_instance(&self, other: &FontHandle) -> bool {
        Arc::ptr_eq(&self.font, &other.font)
    }

    fn replace(&self, font: SoundFont) {
        let mut shared = self.font.write().unwrap_or_else(PoisonError::into_inner);
        *shared = font;
    }
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontHandle")
            .field("name", &self.read(|font| font.info.name.clone()))
            .field("editing", &self.is_editing())
            .finish_non_exhaustive()
    }
}

/// Exclusive editing right on one instance, released on drop.
pub struct EditGuard {
    handle: FontHandle,
}

impl EditGuard {
    /// Run `f` on a copy of the font and publish the copy if `f` succeeds.
    pub fn apply<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut SoundFont) -> std::result::Result<T, E>,
    {
        let mut work = self.handle.snapshot();
        let value = f(&mut work)?;
        self.handle.replace(work);
        Ok(value)
    }

    /// Replace the font outright.
    pub fn commit(&mut self, font: SoundFont) {
        self.handle.replace(font);
    }

    pub fn handle(&self) -> &FontHandle {
        &self.handle
    }
}

impl Drop for EditGuard {
    fn drop(&mut self) {
        self.handle.editing.store(false, Ordering::Release);
        debug!("Editing finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfbank_model::{ModelError, Sample, SampleData};

    fn handle() -> FontHandle {
        FontHandle::new(SoundFont::new("Bank"))
    }

    #[test]
    fn test_second_editor_is_busy() {
        let handle = handle();
        let guard = handle.edit().unwrap();
        assert!(handle.is_editing());
        assert!(matches!(handle.clone().edit(), Err(CoreError::Busy)));
        drop(guard);
        assert!(!handle.is_editing());
        assert!(handle.edit().is_ok());
    }

    #[test]
    fn test_successful_edit_is_published() {
        let handle = handle();
        let mut guard = handle.edit().unwrap();
        guard
            .apply(|font| font.add_sample(Sample::new("Kick", SampleData::from_pcm(vec![0; 8]), 44100)))
            .unwrap();
        drop(guard);
        assert_eq!(handle.read(|font| font.sample_count()), 1);
    }

    #[test]
    fn test_failed_edit_rolls_back() {
        let handle = handle();
        let mut guard = handle.edit().unwrap();
        let result: std::result::Result<(), ModelError> = guard.apply(|font| {
            font.add_sample(Sample::new("Kick", SampleData::from_pcm(vec![0; 8]), 44100))?;
            Err(ModelError::Cancelled)
        });
        assert_eq!(result, Err(ModelError::Cancelled));
        assert_eq!(handle.read(|font| font.sample_count()), 0);
    }

    #[test]
    fn test_readers_see_font_while_editing() {
        let handle = handle();
        let _guard = handle.edit().unwrap();
        assert_eq!(handle.snapshot().info.name, "Bank");
        assert!(handle.same_instance(&handle.clone()));
        assert!(!handle.same_instance(&FontHandle::new(SoundFont::new("Other"))));
    }
}
