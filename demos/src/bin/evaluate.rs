//! Evaluation Example
//!
//! Runs a classifier over a COVID / non-COVID manifest split and prints the
//! metrics report as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate trained weights on the test split
//! cargo run --bin evaluate -- --weights baseline.mpk
//!
//! # Treat class 0 as positive and weigh every example equally
//! cargo run --bin evaluate -- --positive-class 0 --per-example-loss
//!
//! # Evaluate a single split file whose image names encode the class
//! cargo run --bin evaluate -- --dataset-root data/CTX --split-file data/CTX/test.txt
//!
//! # Save the ROC curve and the report
//! cargo run --bin evaluate -- --roc-output roc.json --output report.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::data::dataloader::{DataLoaderBuilder, Dataset};
use clap::Parser;
use covid_ct::{CtBatcher, LossAveraging, MetricsEvaluator};
use covid_ct_demos::{
    create_device, get_backend_name, init_tracing, BaselineClassifierConfig, EvaluateConfig,
    RecordedRocCurve, SelectedBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset root holding CT_COVID and CT_NonCOVID
    #[arg(long)]
    dataset_root: Option<PathBuf>,

    /// Manifest of COVID images
    #[arg(long)]
    covid_manifest: Option<PathBuf>,

    /// Manifest of non-COVID images
    #[arg(long)]
    non_covid_manifest: Option<PathBuf>,

    /// Split file whose image names encode the class
    #[arg(long)]
    split_file: Option<PathBuf>,

    /// Resize images to this square size
    #[arg(long)]
    image_size: Option<u32>,

    /// Batch size for evaluation
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of workers for data loading
    #[arg(long)]
    num_workers: Option<usize>,

    /// Baseline classifier weights (.mpk)
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Logit column of the positive class
    #[arg(long)]
    positive_class: Option<usize>,

    /// Average the loss over examples instead of batches
    #[arg(long)]
    per_example_loss: bool,

    /// Write the ROC curve to this JSON file
    #[arg(long)]
    roc_output: Option<PathBuf>,

    /// Write the metrics report to this JSON file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing().context("Failed to initialize logging")?;
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<EvaluateConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        EvaluateConfig::default()
    };

    // Apply command line overrides
    if let Some(root) = args.dataset_root {
        config.dataset_root = root;
    }
    if let Some(path) = args.covid_manifest {
        config.covid_manifest = path;
    }
    if let Some(path) = args.non_covid_manifest {
        config.non_covid_manifest = path;
    }
    if args.split_file.is_some() {
        config.split_file = args.split_file;
    }
    if let Some(size) = args.image_size {
        config.image_size = size;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(num_workers) = args.num_workers {
        config.num_workers = num_workers;
    }
    if args.weights.is_some() {
        config.weights = args.weights;
    }
    if let Some(index) = args.positive_class {
        config.evaluator.positive_class_index = index;
    }
    if args.per_example_loss {
        config.evaluator.loss_averaging = LossAveraging::PerExample;
    }

    anyhow::ensure!(
        config.dataset_root.exists(),
        "Dataset root does not exist: {}",
        config.dataset_root.display()
    );
    anyhow::ensure!(config.batch_size > 0, "Batch size must be positive");

    let device = create_device();
    tracing::info!(backend = get_backend_name(), "using backend");

    let dataset = config.build_dataset()?;
    tracing::info!(
        examples = dataset.len(),
        class_counts = ?dataset.class_counts(),
        "loaded evaluation split"
    );

    let mut model = BaselineClassifierConfig::new().init::<SelectedBackend>(&device);
    if let Some(weights) = &config.weights {
        model = model.load_weights(weights, &device)?;
    } else {
        tracing::warn!("no weights given, evaluating a randomly initialized baseline");
    }

    let dataloader = DataLoaderBuilder::new(CtBatcher::<SelectedBackend>::new())
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset);

    let evaluator = MetricsEvaluator::<SelectedBackend>::new(config.evaluator.clone(), &device)
        .context("Invalid evaluator configuration")?;
    let mut roc = RecordedRocCurve::default();
    let report = evaluator
        .evaluate_with_sink(&model, dataloader.iter(), Some(&mut roc))
        .context("Evaluation failed")?;

    if let Some(path) = &args.roc_output {
        roc.save_json(path)?;
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            tracing::info!(path = %path.display(), "saved metrics report");
        }
        None => println!("{json}"),
    }

    Ok(())
}
