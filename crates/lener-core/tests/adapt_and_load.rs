use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lener_core::{
    FormatSpec, Freshness, LenerError, ParseOptions, Split, adapt, load_file, load_split,
};

const DOC: &str = "TRIBUNAL B-ORGANIZACAO\nDE I-ORGANIZACAO\nCONTAS I-ORGANIZACAO\n\nJoão B-PESSOA\nSilva I-PESSOA\nrecorreu O\n";

fn seed_dataset(root: &Path, docs_per_split: usize) {
    for split in Split::ALL {
        let dir = root.join(split.dir_name());
        fs::create_dir_all(&dir).unwrap();
        for i in 0..docs_per_split {
            fs::write(dir.join(format!("doc{i:02}.conll")), DOC).unwrap();
        }
    }
}

fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let key = path.strip_prefix(dir).unwrap().display().to_string();
                files.insert(key, fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[test]
fn segmented_adaptation_is_idempotent() {
    let src = tempfile::tempdir().unwrap();
    seed_dataset(src.path(), 3);
    let target = src.path().join("crf");

    for freshness in [Freshness::Force, Freshness::ContentHash] {
        let spec = FormatSpec::segmented().with_freshness(freshness);
        adapt(src.path(), &target, &spec).unwrap();
        let first = snapshot(&target);
        adapt(src.path(), &target, &spec).unwrap();
        assert_eq!(first, snapshot(&target), "{freshness:?}");
    }
}

#[test]
fn segmented_output_loads_with_header_options() {
    let src = tempfile::tempdir().unwrap();
    seed_dataset(src.path(), 2);
    let target = src.path().join("crf");
    adapt(src.path(), &target, &FormatSpec::segmented()).unwrap();

    let first_line = fs::read_to_string(target.join("train/doc00.conll")).unwrap();
    assert!(first_line.starts_with("w chunk\n"));

    let sequences = load_split(&target.join("train"), &ParseOptions::segmented()).unwrap();
    assert_eq!(sequences.len(), 4);
    let ids: Vec<usize> = sequences.iter().map(|s| s.id()).collect();
    assert_eq!(ids, [1, 2, 3, 4]);
    assert_eq!(sequences[1].labels(), ["B-PESSOA", "I-PESSOA", "O"]);
}

#[test]
fn concatenated_keeps_floor_of_percentage() {
    let src = tempfile::tempdir().unwrap();
    seed_dataset(src.path(), 7);
    let target = src.path().join("embedding");

    for (percentage, expected) in [(0.5, 3), (1.0, 7), (0.0, 1), (0.1, 1)] {
        let summary = adapt(src.path(), &target, &FormatSpec::concatenated(percentage)).unwrap();
        assert_eq!(summary.documents[&Split::Train], expected);

        // Two sentences per document, separated by blank lines.
        let sequences =
            load_file(&target.join("train.txt"), &ParseOptions::concatenated()).unwrap();
        assert_eq!(sequences.len(), 2 * expected, "percentage {percentage}");
        assert!(!fs::read_to_string(target.join("test.txt")).unwrap().contains(' '));
    }
}

#[test]
fn out_of_range_percentage_touches_nothing() {
    let src = tempfile::tempdir().unwrap();
    let target = src.path().join("embedding");
    let err = adapt(src.path(), &target, &FormatSpec::concatenated(1.5)).unwrap_err();
    assert!(matches!(err, LenerError::InvalidArgument(_)));
    assert!(!target.exists());
}

#[test]
fn missing_split_is_not_found() {
    let src = tempfile::tempdir().unwrap();
    seed_dataset(src.path(), 1);
    fs::remove_dir_all(src.path().join("dev")).unwrap();
    let err = adapt(src.path(), &src.path().join("crf"), &FormatSpec::segmented()).unwrap_err();
    assert!(matches!(err, LenerError::NotFound { .. }));
}
