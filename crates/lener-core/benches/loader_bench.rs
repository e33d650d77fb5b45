use std::fmt::Write as _;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lener_core::metrics::evaluate;
use lener_core::{ParseOptions, TaggedSequence, load_file};

const TOKENS: &[(&str, &str)] = &[
    ("ACÓRDÃO", "O"),
    ("TCU", "B-ORGANIZACAO"),
    ("Plenário", "I-ORGANIZACAO"),
    ("Relator", "O"),
    ("Ministro", "O"),
    ("Benjamin", "B-PESSOA"),
    ("Zymler", "I-PESSOA"),
    ("25", "B-TEMPO"),
    ("/", "I-TEMPO"),
    ("5", "I-TEMPO"),
    ("/", "I-TEMPO"),
    ("2016", "I-TEMPO"),
];

fn corpus(blocks: usize) -> String {
    let mut out = String::from("w chunk\n");
    for _ in 0..blocks {
        for (tok, tag) in TOKENS {
            let _ = writeln!(out, "{tok} {tag}");
        }
        out.push('\n');
    }
    out
}

fn bench_loader(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ACORDAOTCU25052016.conll");
    std::fs::write(&path, corpus(500)).unwrap();
    let options = ParseOptions::segmented();

    c.bench_function("load_file_500_blocks", |b| {
        b.iter(|| load_file(black_box(&path), &options).unwrap());
    });
}

fn bench_metrics(c: &mut Criterion) {
    let reference: Vec<TaggedSequence> = (1..=500)
        .map(|id| TaggedSequence::from_pairs(id, TOKENS.iter().copied()))
        .collect();
    let predicted: Vec<Vec<String>> = reference.iter().map(|s| s.labels().to_vec()).collect();
    let tags: Vec<String> = lener_core::LENER_TAGS.iter().map(|t| t.to_string()).collect();

    c.bench_function("evaluate_500_sequences_per_tag", |b| {
        b.iter(|| evaluate(black_box(&reference), &predicted, "O", Some(&tags)).unwrap());
    });
}

criterion_group!(benches, bench_loader, bench_metrics);
criterion_main!(benches);
