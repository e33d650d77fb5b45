use std::fs;
use std::path::Path;

use lener_core::{LENER_TAGS, LenerError, Split, TaggedSequence};
use lener_trainer::{
    CrfVariant, DataOptions, EmbeddingVariant, Experiment, ExperimentConfig, ModelAdapter,
    ModelFamily, SplitStrategy, Stage, TrainingConfig,
};

const DOC_A: &str = "O O\nTribunal B-ORGANIZACAO\nde I-ORGANIZACAO\nContas I-ORGANIZACAO\njulgou O\n\nA O\nLei B-LEGISLACAO\n8.666 I-LEGISLACAO\nfoi O\ncitada O\n";
const DOC_B: &str = "João B-PESSOA\nSilva I-PESSOA\nrecorreu O\nem O\n2016 B-TEMPO\n\nBrasília B-LOCAL\nsediou O\no O\njulgamento O\n";

fn seed_dataset(root: &Path) {
    for split in Split::ALL {
        let dir = root.join(split.dir_name());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.conll"), DOC_A).unwrap();
        fs::write(dir.join("b.conll"), DOC_B).unwrap();
    }
}

fn crf_config(root: &Path, split: SplitStrategy) -> ExperimentConfig {
    ExperimentConfig {
        dataset_dir: root.to_path_buf(),
        output_dir: root.join("output"),
        training: Some(TrainingConfig::default().with_epochs(100)),
        data: DataOptions::default().with_split(split),
        ..ExperimentConfig::default()
    }
}

#[test]
fn predict_before_train_is_rejected_without_io() {
    let dir = tempfile::tempdir().unwrap();
    let mut adapter = ModelAdapter::new(
        ModelFamily::Crf(CrfVariant::FirstOrder),
        dir.path(),
        dir.path().join("work"),
        DataOptions::default(),
    );
    assert_eq!(adapter.stage(), Stage::Unbuilt);

    let output = dir.path().join("predictions.txt");
    let seq = TaggedSequence::from_pairs(1, [("Lei", "B-LEGISLACAO")]);
    let err = adapter.predict(&[seq], &output).unwrap_err();
    assert!(matches!(err, LenerError::PreconditionViolation(_)));
    assert!(!output.exists());

    let err = adapter.evaluate(&dir.path().join("missing.txt"), true).unwrap_err();
    assert!(matches!(err, LenerError::PreconditionViolation(_)));
}

#[test]
fn unknown_optimization_method_is_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    for family in [
        ModelFamily::Crf(CrfVariant::HigherOrder),
        ModelFamily::Embedding(EmbeddingVariant::Bilstm),
    ] {
        let mut adapter =
            ModelAdapter::new(family, dir.path(), dir.path().join("work"), DataOptions::default());
        let config = TrainingConfig::default().with_method("ADAM");
        let err = adapter.train(&config).unwrap_err();
        assert!(matches!(err, LenerError::InvalidConfig(_)), "{family}");
    }
}

#[test]
fn crf_learns_its_training_sentence() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path());
    let config = crf_config(dir.path(), SplitStrategy::Single);

    let outcome = Experiment::new(ModelFamily::Crf(CrfVariant::FirstOrder), config.clone())
        .run()
        .unwrap();
    assert_eq!(outcome.fold, Some(0));
    assert!(outcome.artifact.as_ref().unwrap().is_file());
    let report = outcome.report.unwrap();
    assert_eq!(report.sequences, 4);
    assert_eq!(report.accuracy(), 1.0);
    assert!(report.per_tag.contains_key("B-ORGANIZACAO"));
    assert!(!report.per_tag.contains_key("O"));

    // Same model, single-sentence files with and without a wrong reference label.
    let mut adapter = ModelAdapter::new(
        ModelFamily::Crf(CrfVariant::FirstOrder),
        dir.path().join("crf"),
        &config.output_dir,
        config.data.clone(),
    );
    adapter.train(config.training.as_ref().unwrap()).unwrap();

    let exact = dir.path().join("exact.txt");
    fs::write(&exact, "João B-PESSOA\nSilva I-PESSOA\nrecorreu O\nem O\n2016 B-TEMPO\n").unwrap();
    let report = adapter.evaluate(&exact, false).unwrap();
    assert_eq!(report.accuracy(), 1.0);
    assert!(report.per_tag.is_empty());

    let altered = dir.path().join("altered.txt");
    fs::write(&altered, "João B-PESSOA\nSilva I-PESSOA\nrecorreu O\nem O\n2016 O\n").unwrap();
    let report = adapter.evaluate(&altered, true).unwrap();
    assert!(report.accuracy() < 1.0);

    let written = adapter.handle().unwrap().dir.join("output_evaluation.txt");
    let predictions = fs::read_to_string(written).unwrap();
    assert!(predictions.starts_with("João\tB-PESSOA\n"));
}

#[test]
fn crf_cross_validation_keeps_last_fold() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path());
    let config = crf_config(dir.path(), SplitStrategy::CrossValidation { k: 5 });

    let outcome = Experiment::new(ModelFamily::Crf(CrfVariant::HigherOrder), config)
        .run()
        .unwrap();
    // Four training sentences cap k at four.
    assert_eq!(outcome.fold, Some(3));
    let artifact = outcome.artifact.unwrap();
    assert!(artifact.ends_with("crf-higher-order/fold-3/model.crfsuite"));
    for fold in 0..4 {
        let path = dir
            .path()
            .join(format!("output/crf-higher-order/fold-{fold}/model.crfsuite"));
        assert!(path.is_file());
    }
}

#[test]
fn semi_markov_scores_every_row_of_a_raw_directory() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path());
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join("a.conll"), DOC_A).unwrap();
    fs::write(raw.join("b.conll"), DOC_B).unwrap();

    let mut config = crf_config(dir.path(), SplitStrategy::Single);
    config.eval_file = Some(raw.clone());
    let outcome = Experiment::new(ModelFamily::Crf(CrfVariant::SemiMarkov), config)
        .run()
        .unwrap();
    assert!(
        outcome
            .artifact
            .unwrap()
            .ends_with("crf-semi-markov/fold-0/model.crfsuite")
    );

    // No file of `raw/` has a header, so no first row is dropped.
    let report = outcome.report.unwrap();
    assert_eq!(report.sequences, 4);
    assert_eq!(report.tokens, 19);

    // Only LeNER tags the model learned; I-TEMPO and I-LOCAL never occur.
    let tags: Vec<&str> = report.per_tag.keys().map(String::as_str).collect();
    assert_eq!(
        tags,
        [
            "B-LEGISLACAO",
            "B-LOCAL",
            "B-ORGANIZACAO",
            "B-PESSOA",
            "B-TEMPO",
            "I-LEGISLACAO",
            "I-ORGANIZACAO",
            "I-PESSOA",
        ]
    );
    assert!(tags.iter().all(|t| LENER_TAGS.contains(t)));
}

#[test]
fn embedding_experiment_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    seed_dataset(dir.path());
    let config = ExperimentConfig {
        dataset_dir: dir.path().to_path_buf(),
        output_dir: dir.path().join("output"),
        training: Some(TrainingConfig::embedding().with_epochs(2)),
        eval_split: Split::Dev,
        ..ExperimentConfig::default()
    };

    let outcome = Experiment::new(ModelFamily::Embedding(EmbeddingVariant::Window), config)
        .run()
        .unwrap();
    assert!(dir.path().join("embedding/train.txt").is_file());
    assert!(outcome.evaluated.ends_with("embedding/dev.txt"));
    let report = outcome.report.unwrap();
    assert_eq!(report.sequences, 4);
    assert!((0.0..=1.0).contains(&report.overall.accuracy));
    assert!(
        dir.path()
            .join("output/embedding-window/output_evaluation.txt")
            .is_file()
    );
}

#[test]
fn unknown_selector_is_invalid_argument() {
    let err =
        Experiment::from_selectors("crf", "maxent", ExperimentConfig::default()).unwrap_err();
    assert!(matches!(err, LenerError::InvalidArgument(_)));
}
