//! Opening and saving sound banks by path.
//!
//! The format is picked from the file extension on open (`.sf2`, `.sf3`,
//! `.sfz`) and named explicitly on save. Binary banks are written to a
//! temporary file next to the target and renamed over it, so a failed save
//! never leaves a half-written bank behind. SFZ saves write a directory
//! tree and have no such guarantee.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use sfbank_model::{CancelToken, IoKind, SoundFont, Version};
use sfbank_sf2::{CodecFailurePolicy, LoadReport, Sf2Reader, Sf2Writer};
use sfbank_sfz::{export_sfz, import_sfz, ExportOptions, ImportReport};

use crate::codec::WavCodec;
use crate::error::{CoreError, Result};
use crate::handle::FontHandle;

/// On-disk representation of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Plain PCM bank, version 2.01 or 2.04.
    Sf2 { version: Version },
    /// Bank with compressed samples.
    Sf3,
    /// Directory of `.sfz` files and WAV samples.
    Sfz,
}

impl Format {
    /// Format named by the extension of `path`; `.sf2` uses `sf2_version`.
    pub fn from_path(path: &Path, sf2_version: Version) -> Option<Format> {
        match extension(path)?.as_str() {
            "sf2" => Some(Format::Sf2 { version: sf2_version }),
            "sf3" => Some(Format::Sf3),
            "sfz" => Some(Format::Sfz),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sf2 { version } => write!(f, "SF2 {}", version),
            Self::Sf3 => f.write_str("SF3"),
            Self::Sfz => f.write_str("SFZ"),
        }
    }
}

/// Knobs for [`save_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOptions {
    /// Compressed export quality, `0.0..=1.0`.
    pub quality: f32,
    pub policy: CodecFailurePolicy,
    pub sfz: ExportOptions,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            quality: 0.6,
            policy: CodecFailurePolicy::default(),
            sfz: ExportOptions::default(),
        }
    }
}

/// Corrections and warnings collected while opening.
#[derive(Debug, Clone)]
pub enum OpenReport {
    Bank(LoadReport),
    Sfz(ImportReport),
}

impl OpenReport {
    pub fn warnings(&self) -> Vec<String> {
        match self {
            Self::Bank(report) => report.iter().map(ToString::to_string).collect(),
            Self::Sfz(report) => report.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn is_clean(&self) -> bool {
        match self {
            Self::Bank(report) => report.is_clean(),
            Self::Sfz(report) => report.warnings.is_empty(),
        }
    }
}

/// An opened bank.
#[derive(Debug, Clone)]
pub struct Opened {
    pub font: SoundFont,
    pub report: OpenReport,
}

impl Opened {
    pub fn into_handle(self) -> (FontHandle, OpenReport) {
        (FontHandle::new(self.font), self.report)
    }
}

/// What a save produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub files: Vec<PathBuf>,
    /// Samples stored as PCM after the codec failed on them.
    pub fallback_samples: Vec<String>,
    /// Samples left out of an SFZ export.
    pub skipped_samples: Vec<String>,
}

/// Open a bank, picking the format from the extension.
pub fn open(path: impl AsRef<Path>) -> Result<Opened> {
    open_with(path.as_ref(), &CancelToken::new(), |_, _| {})
}

pub(crate) fn open_with(
    path: &Path,
    cancel: &CancelToken,
    mut progress: impl FnMut(usize, usize),
) -> Result<Opened> {
    match extension(path).as_deref() {
        Some("sf2") | Some("sf3") => {
            let bytes = fs::read(path).map_err(|e| CoreError::io(path, &e, IoKind::Read))?;
            info!("Opening {} ({} bytes)", path.display(), bytes.len());
            let codec = WavCodec;
            let loaded = Sf2Reader::new()
                .codec(&codec)
                .cancel_token(cancel.clone())
                .on_progress(progress)
                .read(&bytes)?;
            Ok(Opened {
                font: loaded.font,
                report: OpenReport::Bank(loaded.report),
            })
        }
        Some("sfz") => {
            cancel.check()?;
            info!("Importing {}", path.display());
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut font = SoundFont::new(name);
            let report = import_sfz(path, &mut font)?;
            progress(1, 1);
            Ok(Opened {
                font,
                report: OpenReport::Sfz(report),
            })
        }
        _ => Err(CoreError::UnknownFormat(path.to_path_buf())),
    }
}

/// Save the current state of `handle` with default options.
pub fn save(handle: &FontHandle, path: impl AsRef<Path>, format: Format) -> Result<SaveReport> {
    save_with(handle, path, format, &SaveOptions::default())
}

pub fn save_with(
    handle: &FontHandle,
    path: impl AsRef<Path>,
    format: Format,
    options: &SaveOptions,
) -> Result<SaveReport> {
    let font = handle.snapshot();
    save_font(&font, path.as_ref(), format, options, &CancelToken::new(), |_, _| {})
}

pub(crate) fn save_font(
    font: &SoundFont,
    path: &Path,
    format: Format,
    options: &SaveOptions,
    cancel: &CancelToken,
    progress: impl FnMut(usize, usize),
) -> Result<SaveReport> {
    info!("Saving {} as {}", path.display(), format);
    let codec = WavCodec;
    let writer = match format {
        Format::Sf2 { version } => Sf2Writer::sf2(version),
        Format::Sf3 => Sf2Writer::compressed(&codec, options.quality, options.policy),
        Format::Sfz => {
            cancel.check()?;
            fs::create_dir_all(path).map_err(|e| CoreError::io(path, &e, IoKind::Create))?;
            let exported = export_sfz(font, path, &options.sfz)?;
            return Ok(SaveReport {
                files: exported.files,
                fallback_samples: Vec::new(),
                skipped_samples: exported.skipped_samples,
            });
        }
    };

    let encoded = writer.cancel_token(cancel.clone()).on_progress(progress).write(font)?;
    write_atomic(path, &encoded.bytes)?;
    Ok(SaveReport {
        files: vec![path.to_path_buf()],
        fallback_samples: encoded.report.fallback_samples,
        skipped_samples: Vec::new(),
    })
}

/// Write `bytes` to a temporary sibling of `path`, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path.file_name().ok_or_else(|| CoreError::Io {
        path: path.to_path_buf(),
        kind: IoKind::Create,
    })?;
    let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let written = File::create(&temp)
        .map_err(|e| CoreError::io(&temp, &e, IoKind::Create))
        .and_then(|mut file| {
            file.write_all(bytes)
                .and_then(|_| file.sync_all())
                .map_err(|e| CoreError::io(&temp, &e, IoKind::Write))
        })
        .and_then(|_| fs::rename(&temp, path).map_err(|e| CoreError::io(path, &e, IoKind::Rename)));

    if written.is_err() && temp.exists() {
        if let Err(e) = fs::remove_file(&temp) {
            warn!("Could not delete {}: {}", temp.display(), e);
        }
    }
    written
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        let v = Version::SF2_04;
        assert_eq!(Format::from_path(Path::new("a.sf2"), v), Some(Format::Sf2 { version: v }));
        assert_eq!(Format::from_path(Path::new("a.SF3"), v), Some(Format::Sf3));
        assert_eq!(Format::from_path(Path::new("dir/a.sfz"), v), Some(Format::Sfz));
        assert_eq!(Format::from_path(Path::new("a.wav"), v), None);
        assert_eq!(Format::from_path(Path::new("noext"), v), None);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        assert!(matches!(open("bank.dls"), Err(CoreError::UnknownFormat(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sf2");
        match open(&path) {
            Err(CoreError::Io { path: p, kind }) => {
                assert_eq!(p, path);
                assert_eq!(kind, IoKind::NotFound);
            }
            other => panic!("expected not found, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_atomic_write_replaces_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sf2");
        fs::write(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rename_onto_directory_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.sf2");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inside"), b"x").unwrap();
        let err = write_atomic(&path, b"bytes").unwrap_err();
        assert!(matches!(err, CoreError::Io { kind: IoKind::Rename, .. }));
        assert!(!dir.path().join(".taken.sf2.tmp").exists());
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope/out.sf2");
        let err = write_atomic(&path, b"bytes").unwrap_err();
        assert!(matches!(err, CoreError::Io { kind: IoKind::NotFound, .. }));
    }
}
