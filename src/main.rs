use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use bosque_io::{ClassScore, Dataset, DatasetReader, ExperimentName, ResultWriter};
use bosque_rf::{ConfusionMatrix, RandomForest, RandomForestConfig};

#[derive(Parser)]
#[command(name = "bosque")]
#[command(about = "Random Forest classification on numeric CSV datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducible training (fresh entropy if not set)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Forest hyperparameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the forest
    #[arg(long, default_value_t = 50)]
    n_trees: usize,

    /// Maximum tree depth (root is depth 0)
    #[arg(long, default_value_t = 10, conflicts_with = "unbounded_depth")]
    max_depth: usize,

    /// Grow trees until no split improves impurity
    #[arg(long, default_value_t = false)]
    unbounded_depth: bool,

    /// A node must hold more than this many rows to be split
    #[arg(long, default_value_t = 2)]
    min_samples_split: usize,

    /// Fraction of rows bootstrap-sampled per tree (with replacement)
    #[arg(long, default_value_t = 0.8)]
    sample_ratio: f64,

    /// Fraction of feature columns sampled per tree (without replacement)
    #[arg(long, default_value_t = 0.6)]
    feat_ratio: f64,
}

/// Where labelled data comes from.
#[derive(Args, Debug, Clone)]
struct LabelledDataArgs {
    /// Path to the input CSV file
    #[arg(long)]
    data: PathBuf,

    /// Header name of the label column (defaults to the last column)
    #[arg(long)]
    label_column: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Fit a forest on a labelled CSV and save the model
    Train {
        #[command(flatten)]
        input: LabelledDataArgs,

        /// Output path for the model binary
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        forest: ForestArgs,
    },

    /// Predict the class of every row in an unlabelled CSV
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the input CSV file (feature columns only)
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Score a trained model against a labelled CSV
    Evaluate {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        input: LabelledDataArgs,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Print a saved model's configuration and tree shapes
    Inspect {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    model: PathBuf,
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    n_trees: usize,
    seed: Option<u64>,
    training_accuracy: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    n_rows: usize,
    predictions_path: PathBuf,
    model_n_trees: usize,
    model_n_classes: usize,
}

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    n_samples: usize,
    accuracy: f64,
    evaluation_path: PathBuf,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    format_version: u32,
    n_features: usize,
    n_classes: usize,
    config: &'a RandomForestConfig,
    trees: Vec<TreeSummary<'a>>,
}

#[derive(Serialize)]
struct TreeSummary<'a> {
    features: &'a [usize],
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
}

fn forest_config(args: &ForestArgs, seed: Option<u64>) -> Result<RandomForestConfig> {
    let max_depth = (!args.unbounded_depth).then_some(args.max_depth);
    Ok(RandomForestConfig::new(args.n_trees)?
        .with_max_depth(max_depth)
        .with_min_samples_split(args.min_samples_split)
        .with_sample_ratio(args.sample_ratio)
        .with_feat_ratio(args.feat_ratio)
        .with_seed(seed))
}

fn read_labelled(args: &LabelledDataArgs) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    let mut reader = DatasetReader::new(&args.data);
    if let Some(column) = &args.label_column {
        reader = reader.with_label_column(column.clone());
    }
    let dataset = reader.read().context("failed to read labelled CSV")?;
    split_labelled(dataset, &args.data)
}

fn split_labelled(dataset: Dataset, path: &Path) -> Result<(Vec<Vec<f64>>, Vec<usize>)> {
    let (features, labels) = dataset.into_parts();
    let labels = labels.with_context(|| format!("{} has no label column", path.display()))?;
    Ok((features, labels))
}

fn load_model(path: &Path) -> Result<RandomForest> {
    let forest = RandomForest::load(path).context("failed to load model")?;
    info!(
        n_trees = forest.n_trees(),
        n_features = forest.n_features(),
        n_classes = forest.n_classes(),
        "model loaded"
    );
    Ok(forest)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            input,
            model,
            forest,
        } => {
            let config = forest_config(&forest, cli.seed)?;
            let (features, labels) = read_labelled(&input)?;

            let forest = config
                .fit(&features, &labels)
                .context("training failed")?;
            forest.save(&model).context("failed to save model")?;

            let training = ConfusionMatrix::evaluate(&forest, &features, &labels)
                .context("failed to score training data")?;
            info!(accuracy = training.accuracy(), "training accuracy");

            let output = TrainOutput {
                model,
                n_samples: features.len(),
                n_features: forest.n_features(),
                n_classes: forest.n_classes(),
                n_trees: forest.n_trees(),
                seed: cli.seed,
                training_accuracy: training.accuracy(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            data,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let forest = load_model(&model)?;

            let dataset = DatasetReader::new(&data)
                .without_labels()
                .read()
                .context("failed to read input CSV")?;

            let predictions = forest
                .predict(dataset.features())
                .context("prediction failed")?;

            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let predictions_path = writer.write_predictions(&predictions)?;

            let output = PredictOutput {
                experiment,
                n_rows: predictions.len(),
                predictions_path,
                model_n_trees: forest.n_trees(),
                model_n_classes: forest.n_classes(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            model,
            input,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let forest = load_model(&model)?;
            let (features, labels) = read_labelled(&input)?;

            let cm = ConfusionMatrix::evaluate(&forest, &features, &labels)
                .context("evaluation failed")?;
            info!(accuracy = cm.accuracy(), "evaluation complete");
            debug!("confusion matrix\n{cm}");

            let scores: Vec<ClassScore> = cm
                .class_metrics()
                .into_iter()
                .map(|m| ClassScore {
                    class: m.class,
                    precision: m.precision,
                    recall: m.recall,
                    f1: m.f1,
                    support: m.support,
                })
                .collect();

            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let evaluation_path =
                writer.write_evaluation(cm.total(), cm.accuracy(), cm.as_rows(), &scores)?;

            let output = EvaluateOutput {
                experiment,
                n_samples: cm.total(),
                accuracy: cm.accuracy(),
                evaluation_path,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Inspect { model } => {
            let forest = load_model(&model)?;

            let trees = forest
                .members()
                .iter()
                .map(|member| TreeSummary {
                    features: member.features(),
                    n_nodes: member.tree().n_nodes(),
                    n_leaves: member.tree().n_leaves(),
                    depth: member.tree().depth(),
                })
                .collect();

            let output = InspectOutput {
                format_version: bosque_rf::FORMAT_VERSION,
                n_features: forest.n_features(),
                n_classes: forest.n_classes(),
                config: forest.config(),
                trees,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
