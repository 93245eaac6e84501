use std::fs;
use std::path::Path;

use sfbank_sfz::{parse_sfz_file, SfzError};

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_include_is_relative_to_including_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.sfz",
        "#define $VEL 100\n<global> volume=-3\n#include \"parts/strings.sfz\"\n",
    );
    write(
        dir.path(),
        "parts/strings.sfz",
        "<region> sample=a.wav hivel=$VEL\n#include \"more/cello.sfz\"\n",
    );
    write(dir.path(), "parts/more/cello.sfz", "<region> sample=b.wav key=36\n");

    let sfz = parse_sfz_file(dir.path().join("main.sfz")).unwrap();
    assert_eq!(sfz.regions.len(), 2);
    assert_eq!(sfz.regions[0].get_opcode_str("hivel"), Some("100"));
    assert_eq!(sfz.regions[1].get_opcode_str("volume"), Some("-3"));
    assert_eq!(sfz.includes.len(), 2);

    // samples stay relative to the top-level file
    let sample = sfz.resolve_sample_path(&sfz.regions[1]).unwrap();
    assert_eq!(sample, fs::canonicalize(dir.path()).unwrap().join("b.wav"));
}

#[test]
fn test_same_file_included_twice_is_not_a_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.sfz",
        "#include \"region.sfz\"\n#include \"region.sfz\"\n",
    );
    write(dir.path(), "region.sfz", "<region> sample=a.wav\n");

    let sfz = parse_sfz_file(dir.path().join("main.sfz")).unwrap();
    assert_eq!(sfz.regions.len(), 2);
}

#[test]
fn test_self_inclusion_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "loop.sfz", "<region> sample=a.wav\n#include \"loop.sfz\"\n");

    let err = parse_sfz_file(dir.path().join("loop.sfz")).unwrap_err();
    match err {
        SfzError::InclusionCycle { chain, .. } => assert_eq!(chain.len(), 2),
        other => panic!("expected an inclusion cycle, got {other:?}"),
    }
}

#[test]
fn test_transitive_inclusion_cycle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.sfz", "#include \"b.sfz\"\n");
    write(dir.path(), "b.sfz", "#include \"c.sfz\"\n");
    write(dir.path(), "c.sfz", "<region> sample=x.wav\n#include \"a.sfz\"\n");

    let err = parse_sfz_file(dir.path().join("a.sfz")).unwrap_err();
    match err {
        SfzError::InclusionCycle { path, chain } => {
            assert!(path.ends_with("a.sfz"));
            let names: Vec<_> = chain
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, vec!["a.sfz", "b.sfz", "c.sfz", "a.sfz"]);
        }
        other => panic!("expected an inclusion cycle, got {other:?}"),
    }
}

#[test]
fn test_missing_include_reports_the_path() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.sfz", "#include \"gone.sfz\"\n");

    let err = parse_sfz_file(dir.path().join("main.sfz")).unwrap_err();
    assert!(matches!(err, SfzError::Io { ref path, .. } if path.ends_with("gone.sfz")));
}
