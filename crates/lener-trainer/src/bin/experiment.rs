//! `lener-experiment`: run one NER experiment over the LeNER corpus.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lener_core::{Freshness, Split};
use lener_trainer::{Experiment, ExperimentConfig, ModelFamily};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lener-experiment")]
#[command(about = "Adapt the LeNER dataset, train a tagger and print its evaluation")]
#[command(version)]
struct Cli {
    /// Model family: crf or embedding
    #[arg(long)]
    method: String,

    /// Variant of the family (crf: first-order, higher-order, semi-markov; embedding: bilstm, window)
    #[arg(long)]
    model: String,

    /// Dataset root holding train/, dev/ and test/
    #[arg(long, env = "LENER_DATASET_DIR")]
    dataset_dir: Option<PathBuf>,

    /// Where trained models are written
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON experiment configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optimization method (crf: lbfgs, l2sgd, ap, pa, arow; embedding: adamw, sgd)
    #[arg(long)]
    optimization_method: Option<String>,

    /// Number of training iterations / epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Share of documents kept by the concatenated layout, in [0, 1]
    #[arg(long)]
    percentage: Option<f64>,

    /// Regenerate the adapted dataset even if it looks current
    #[arg(long)]
    force_adapt: bool,

    /// Only report overall metrics
    #[arg(long)]
    no_per_tag: bool,

    /// Evaluate on this file or directory instead of the adapted split
    #[arg(long)]
    eval_file: Option<PathBuf>,

    /// Adapted split to evaluate on: train, dev or test
    #[arg(long)]
    eval_split: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn experiment_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => ExperimentConfig::default(),
        };

        if let Some(dir) = &self.dataset_dir {
            config.dataset_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(p) = self.percentage {
            config.percentage = p;
        }
        if self.force_adapt {
            config.freshness = Some(Freshness::Force);
        }
        if self.no_per_tag {
            config.per_tag = false;
        }
        if let Some(path) = &self.eval_file {
            config.eval_file = Some(path.clone());
        }
        if let Some(split) = &self.eval_split {
            config.eval_split = split.parse::<Split>()?;
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<()> {
    let family = ModelFamily::select(&cli.method, &cli.model)?;
    let mut config = cli.experiment_config()?;

    let mut training = config.training_for(family);
    if let Some(method) = &cli.optimization_method {
        training = training.with_method(method.as_str());
    }
    if let Some(epochs) = cli.epochs {
        training = training.with_epochs(epochs);
    }
    config.training = Some(training);

    let outcome = Experiment::new(family, config)
        .run()
        .with_context(|| format!("{family} experiment failed"))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match &outcome.report {
        Some(report) => {
            println!("{} on {}", outcome.model, outcome.evaluated.display());
            println!("{report}");
        }
        None => println!("{}: no training data, nothing evaluated", outcome.model),
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Experiment failed: {e:#}");
        std::process::exit(1);
    }
}
