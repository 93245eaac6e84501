use std::path::{Path, PathBuf};

/// Normalize path separators for the current operating system.
///
/// SFZ files written on Windows use backslashes; elsewhere they are turned
/// into forward slashes.
///
/// ```
/// use sfbank_sfz::parser::path_utils::normalize_path;
///
/// #[cfg(not(windows))]
/// assert_eq!(normalize_path("samples\\piano\\C4.wav"), "samples/piano/C4.wav");
/// ```
pub fn normalize_path(path: &str) -> String {
    if cfg!(windows) {
        path.to_string()
    } else {
        path.replace('\\', "/")
    }
}

/// Join a default path and a sample path.
///
/// Absolute sample paths are returned unchanged.
///
/// ```
/// use sfbank_sfz::parser::path_utils::combine_sample_path;
/// use std::path::PathBuf;
///
/// assert_eq!(combine_sample_path("samples/piano", "C4.wav"), PathBuf::from("samples/piano/C4.wav"));
/// ```
pub fn combine_sample_path(default_path: &str, sample_path: &str) -> PathBuf {
    let sample_path = normalize_path(sample_path);
    let path = Path::new(&sample_path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    PathBuf::from(normalize_path(default_path)).join(path)
}

/// Resolve a sample path the way SFZ players do.
///
/// 1. An absolute sample path is used directly
/// 2. A relative one is joined to `default_path` when there is one
/// 3. A path still relative is taken from the SFZ file's directory
pub fn resolve_absolute_path(
    sample_path: &str,
    default_path: Option<&str>,
    sfz_file_path: Option<&Path>,
) -> PathBuf {
    let mut path = match default_path {
        Some(default_path) => combine_sample_path(default_path, sample_path),
        None => PathBuf::from(normalize_path(sample_path)),
    };
    if !path.is_absolute() {
        if let Some(sfz_dir) = sfz_file_path.and_then(Path::parent) {
            path = sfz_dir.join(path);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_sample_path() {
        assert_eq!(
            combine_sample_path("samples/piano/", "C4.wav"),
            PathBuf::from("samples/piano/C4.wav")
        );
        #[cfg(not(windows))]
        assert_eq!(
            combine_sample_path("samples\\piano\\", "C4.wav"),
            PathBuf::from("samples/piano/C4.wav")
        );
        #[cfg(not(windows))]
        assert_eq!(
            combine_sample_path("samples/", "/abs/C4.wav"),
            PathBuf::from("/abs/C4.wav")
        );
    }

    #[test]
    fn test_resolve_relative_to_sfz_file() {
        let sfz = PathBuf::from("/music/instruments/piano.sfz");
        assert_eq!(
            resolve_absolute_path("piano.wav", Some("samples/"), Some(&sfz)),
            PathBuf::from("/music/instruments/samples/piano.wav")
        );
        assert_eq!(
            resolve_absolute_path("samples/piano.wav", None, Some(&sfz)),
            PathBuf::from("/music/instruments/samples/piano.wav")
        );
        assert_eq!(
            resolve_absolute_path("piano.wav", None, None),
            PathBuf::from("piano.wav")
        );
    }
}
