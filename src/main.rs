use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mush_id::catalog;
use mush_id::dataset::Dataset;
use mush_id::encoding::OneHotEncoder;
use mush_id::{MushroomModel, PipelineConfig};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mush-id")]
#[command(about = "Mushroom edibility classifier: decision tree over one-hot encoded features")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that trains a model.
#[derive(clap::Args, Debug, Clone, Default)]
struct TrainingArgs {
    /// Path to the mushroom CSV (default: ./mushroom.csv)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// JSON config file; flags given here override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the train/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of rows held out for evaluation
    #[arg(long)]
    test_size: Option<f64>,

    /// Maximum tree depth (default: unlimited)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Keep class proportions equal across train and test
    #[arg(long)]
    stratify: bool,

    /// Append a JSON line per training run to this file
    #[arg(long)]
    run_log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the classifier and report held-out accuracy
    Train {
        #[command(flatten)]
        training: TrainingArgs,

        /// Save the trained model as JSON
        #[arg(long)]
        save: Option<PathBuf>,

        /// Number of feature importances to show
        #[arg(long)]
        top: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify one mushroom, e.g. --set odor=Foul --set gill-size=n
    Predict {
        /// FEATURE=VALUE; VALUE may be a code or a readable word
        #[arg(short, long = "set", value_name = "FEATURE=VALUE", required = true)]
        set: Vec<String>,

        /// Use a saved model instead of training
        #[arg(long)]
        model: Option<PathBuf>,

        #[command(flatten)]
        training: TrainingArgs,
    },
    /// List every feature and its options
    Options {
        #[arg(long)]
        model: Option<PathBuf>,

        #[command(flatten)]
        training: TrainingArgs,
    },
    /// Show the most important encoded features
    Importances {
        #[arg(long)]
        top: Option<usize>,

        #[arg(long)]
        model: Option<PathBuf>,

        #[command(flatten)]
        training: TrainingArgs,
    },
    /// Write the one-hot encoded dataset to CSV
    Encode {
        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        training: TrainingArgs,
    },
    /// Train, then classify a known poisonous and a known edible sample
    Demo {
        #[command(flatten)]
        training: TrainingArgs,
    },
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Train { training, save, top, json } => run_train(training, save, top, json),
        Commands::Predict { set, model, training } => run_predict(set, model, training),
        Commands::Options { model, training } => run_options(model, training),
        Commands::Importances { top, model, training } => run_importances(top, model, training),
        Commands::Encode { output, training } => run_encode(output, training),
        Commands::Demo { training } => run_demo(training),
    }
}

/// defaults <- config file <- environment <- flags
fn resolve_config(training: &TrainingArgs) -> Result<PipelineConfig> {
    let mut config = match &training.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env().context("Invalid environment override")?;

    if let Some(dataset) = &training.dataset {
        config.dataset_path = dataset.clone();
    }
    if let Some(seed) = training.seed {
        config.seed = seed;
    }
    if let Some(test_size) = training.test_size {
        config.test_size = test_size;
    }
    if training.max_depth.is_some() {
        config.tree.max_depth = training.max_depth;
    }
    if training.stratify {
        config.stratify = true;
    }
    if let Some(run_log) = &training.run_log {
        config.run_log = Some(run_log.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn obtain_model(model: Option<PathBuf>, training: &TrainingArgs) -> Result<(MushroomModel, PipelineConfig)> {
    let config = resolve_config(training)?;
    let model = match model {
        Some(path) => {
            info!("Loading model from {:?}", path);
            MushroomModel::load(&path)
                .with_context(|| format!("Failed to load model {}", path.display()))?
        }
        None => MushroomModel::train(&config).with_context(|| {
            format!(
                "Failed to train on {} (make sure the CSV exists)",
                config.dataset_path.display()
            )
        })?,
    };
    Ok((model, config))
}

fn parse_assignments(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut record = HashMap::new();
    for pair in pairs {
        let (feature, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected FEATURE=VALUE, got '{}'", pair))?;
        let feature = feature.trim().to_string();
        let code = catalog::code_for(&feature, value);
        record.insert(feature, code);
    }
    Ok(record)
}

fn print_importances(model: &MushroomModel, top_n: usize) {
    println!("\n--- Top {} feature importances ---", top_n);
    for (name, importance) in model.feature_importances(top_n) {
        println!("   {:<40} {:.4}", catalog::decode_encoded_name(&name), importance);
    }
}

fn run_train(training: TrainingArgs, save: Option<PathBuf>, top: Option<usize>, json: bool) -> Result<()> {
    let config = resolve_config(&training)?;
    let model = MushroomModel::train(&config)
        .with_context(|| format!("Failed to train on {}", config.dataset_path.display()))?;
    let top_n = top.unwrap_or(config.top_n);

    if let Some(path) = &save {
        model
            .save(path)
            .with_context(|| format!("Failed to save model to {}", path.display()))?;
    }

    let evaluation = model.evaluation();
    if json {
        let importances: Vec<serde_json::Value> = model
            .feature_importances(top_n)
            .into_iter()
            .map(|(name, importance)| {
                serde_json::json!({
                    "column": name,
                    "readable": catalog::decode_encoded_name(&name),
                    "importance": importance,
                })
            })
            .collect();
        let report = serde_json::json!({
            "dataset": config.dataset_path.display().to_string(),
            "accuracy": evaluation.accuracy,
            "accuracy_display": model.accuracy_display(),
            "baseline_accuracy": evaluation.baseline_accuracy,
            "n_train": evaluation.n_train,
            "n_test": evaluation.n_test,
            "tree_depth": model.tree().depth(),
            "tree_leaves": model.tree().n_leaves(),
            "confusion_matrix": evaluation.confusion,
            "class_distribution": model.class_distribution(),
            "feature_importances": importances,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!(" MUSH-ID: Edibility Classifier");
    println!("{}", "=".repeat(80));
    println!("\n Dataset:    {}", config.dataset_path.display());
    println!(" Samples:    {} train / {} test", evaluation.n_train, evaluation.n_test);
    for (label, count) in model.class_distribution() {
        println!(" Class {:<4}  {}", label, count);
    }
    println!(" Classifier: DecisionTreeClassifier (depth {}, {} leaves)", model.tree().depth(), model.tree().n_leaves());
    println!("\n Accuracy:   {}", model.accuracy_display());
    println!(" Baseline:   {}", mush_id::metrics::format_percentage(evaluation.baseline_accuracy));
    println!("\n Confusion matrix (rows = true, columns = predicted):");
    print!("{}", evaluation.confusion);
    print_importances(&model, top_n);
    Ok(())
}

fn run_predict(set: Vec<String>, model: Option<PathBuf>, training: TrainingArgs) -> Result<()> {
    let record = parse_assignments(&set)?;
    let (model, _) = obtain_model(model, &training)?;

    let prediction = model.predict(&record).context("Prediction failed")?;
    let proba = model.predict_proba(&record)?;

    println!("\nPREDICTED: {}", prediction);
    for (label, p) in proba {
        println!("   P({}) = {:.3}", label, p);
    }
    println!("\nWarning: this is a demonstration model.");
    println!("Do not eat wild mushrooms based on this prediction.");
    Ok(())
}

fn run_options(model: Option<PathBuf>, training: TrainingArgs) -> Result<()> {
    let (model, _) = obtain_model(model, &training)?;
    for options in model.feature_options() {
        let readable: Vec<String> = options
            .values
            .iter()
            .map(|code| format!("{} ({})", catalog::readable_value(&options.feature, code), code))
            .collect();
        println!("{}: {}", catalog::readable_feature(&options.feature), readable.join(", "));
    }
    Ok(())
}

fn run_importances(top: Option<usize>, model: Option<PathBuf>, training: TrainingArgs) -> Result<()> {
    let (model, config) = obtain_model(model, &training)?;
    print_importances(&model, top.unwrap_or(config.top_n));
    Ok(())
}

fn run_encode(output: PathBuf, training: TrainingArgs) -> Result<()> {
    let config = resolve_config(&training)?;
    let dataset = Dataset::load(&config.dataset_path, &config.target)
        .with_context(|| format!("Failed to load {}", config.dataset_path.display()))?;

    let encoder = OneHotEncoder::fit(&dataset);
    let matrix = encoder.transform(&dataset)?;
    let mut df = encoder.to_frame(&matrix)?;
    df.with_column(Series::new(dataset.target(), dataset.labels().to_vec()))?;

    let mut file = std::fs::File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;

    println!("Wrote {} rows x {} columns to {}", df.height(), df.width(), output.display());
    Ok(())
}

fn sample(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn run_demo(training: TrainingArgs) -> Result<()> {
    let config = resolve_config(&training)?;
    let model = MushroomModel::train(&config)
        .with_context(|| format!("Failed to train on {}", config.dataset_path.display()))?;

    println!("\nAccuracy: {}", model.accuracy_display());
    print_importances(&model, config.top_n);

    // Foul odour
    let poisonous = sample(&[
        ("cap-shape", "x"), ("cap-surface", "s"), ("cap-color", "n"), ("bruises", "t"),
        ("odor", "f"), ("gill-attachment", "f"), ("gill-spacing", "c"), ("gill-size", "n"),
        ("gill-color", "b"), ("stalk-shape", "e"), ("stalk-root", "?"),
        ("stalk-surface-above-ring", "s"), ("stalk-surface-below-ring", "s"),
        ("stalk-color-above-ring", "w"), ("stalk-color-below-ring", "w"),
        ("veil-type", "p"), ("veil-color", "w"), ("ring-number", "o"), ("ring-type", "p"),
        ("spore-print-color", "k"), ("population", "v"), ("habitat", "u"),
    ]);
    // No odour
    let edible = sample(&[
        ("cap-shape", "x"), ("cap-surface", "s"), ("cap-color", "n"), ("bruises", "t"),
        ("odor", "n"), ("gill-attachment", "f"), ("gill-spacing", "c"), ("gill-size", "b"),
        ("gill-color", "w"), ("stalk-shape", "e"), ("stalk-root", "c"),
        ("stalk-surface-above-ring", "s"), ("stalk-surface-below-ring", "s"),
        ("stalk-color-above-ring", "w"), ("stalk-color-below-ring", "w"),
        ("veil-type", "p"), ("veil-color", "w"), ("ring-number", "o"), ("ring-type", "p"),
        ("spore-print-color", "k"), ("population", "s"), ("habitat", "u"),
    ]);

    println!("\n--- Prediction Test ---");
    println!("Test 1 (Poisonous): {}", model.predict(&poisonous)?);
    println!("Test 2 (Edible):    {}", model.predict(&edible)?);
    Ok(())
}
