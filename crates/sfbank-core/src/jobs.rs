//! Long-running operations as background [`Job`]s.
//!
//! Loads and saves work on their own data (the file, or a snapshot of the
//! handle taken when the job starts) and never block editors. A
//! duplication mutates its target, so it takes the target's edit right
//! before the thread starts and holds it until the job ends.

use std::path::PathBuf;

use log::info;
use sfbank_model::{Choice, Collision, DuplicateReport, Duplicator, Subtree};
use sfbank_sf2::CodecFailurePolicy;

use crate::error::Result;
use crate::handle::FontHandle;
use crate::io::{open_with, save_font, Format, Opened, SaveOptions, SaveReport};
use crate::job::Job;

/// Open a bank in the background.
pub fn load_job(path: impl Into<PathBuf>) -> Job<Opened> {
    let path = path.into();
    let name = format!("load {}", path.display());
    Job::spawn(name, move |ctx| open_with(&path, &ctx.cancel_token(), ctx.reporter()))
}

/// Save the current state of `handle` in the background.
pub fn save_job(handle: &FontHandle, path: impl Into<PathBuf>, format: Format, options: SaveOptions) -> Job<SaveReport> {
    let path = path.into();
    let font = handle.snapshot();
    let name = format!("save {}", path.display());
    Job::spawn(name, move |ctx| {
        save_font(&font, &path, format, &options, &ctx.cancel_token(), ctx.reporter())
    })
}

/// Re-encode every sample and save a compressed bank in the background.
pub fn compress_job(
    handle: &FontHandle,
    path: impl Into<PathBuf>,
    quality: f32,
    policy: CodecFailurePolicy,
) -> Job<SaveReport> {
    let options = SaveOptions {
        quality,
        policy,
        ..SaveOptions::default()
    };
    save_job(handle, path, Format::Sf3, options)
}

/// Copy `items` of `source` into `target` in the background.
///
/// `source` and `target` may be the same instance. Fails with
/// [`crate::CoreError::Busy`] when `target` is already being edited; the
/// target changes only if the whole copy succeeds.
pub fn duplicate_job<R>(
    source: &FontHandle,
    target: &FontHandle,
    items: Vec<Subtree>,
    suffix_start: u32,
    resolver: R,
) -> Result<Job<DuplicateReport>>
where
    R: FnMut(&Collision) -> Choice + Send + 'static,
{
    let mut guard = target.edit()?;
    let source = source.snapshot();
    let name = format!("duplicate {} item(s)", items.len());

    Ok(Job::spawn(name, move |ctx| {
        let mut resolver = resolver;
        let mut work = guard.handle().snapshot();
        let report = Duplicator::new(&mut resolver)
            .suffix_start(suffix_start)
            .cancel_token(ctx.cancel_token())
            .on_progress(ctx.reporter())
            .run(&source, &mut work, &items)?;
        guard.commit(work);
        info!("Duplicated {} entities", report.created);
        Ok(report)
    }))
}
