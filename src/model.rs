//! Mushroom Model
//!
//! Runs the pipeline end to end (load, encode, split, fit, evaluate) and keeps
//! what is needed afterwards: the fitted encoder and tree, the per-feature
//! options, and the held-out evaluation.

use crate::config::PipelineConfig;
use crate::dataset::{Dataset, FeatureOptions};
use crate::encoding::OneHotEncoder;
use crate::error::{MushError, Result};
use crate::metrics::{accuracy_score, format_percentage, majority_baseline, ConfusionMatrix};
use crate::observability::{RunLogger, TrainingRunEntry};
use crate::split::{stratified_split, train_test_split};
use crate::tree::DecisionTreeClassifier;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edibility {
    Edible,
    Poisonous,
}

impl std::fmt::Display for Edibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edibility::Edible => write!(f, "EDIBLE"),
            Edibility::Poisonous => write!(f, "POISONOUS"),
        }
    }
}

/// Held-out evaluation of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub baseline_accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub confusion: ConfusionMatrix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MushroomModel {
    target: String,
    poisonous_label: String,
    features: Vec<String>,
    feature_options: Vec<FeatureOptions>,
    class_distribution: Vec<(String, usize)>,
    encoder: OneHotEncoder,
    tree: DecisionTreeClassifier,
    evaluation: Evaluation,
}

impl MushroomModel {
    /// Load the configured dataset and train on it.
    pub fn train(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let dataset = Dataset::load(&config.dataset_path, &config.target)?;
        let logger = RunLogger::new(config.run_log.clone(), 100);
        Self::fit(&dataset, config, &logger)
    }

    /// Train on an already loaded dataset, recording the run in `logger`.
    pub fn fit(dataset: &Dataset, config: &PipelineConfig, logger: &RunLogger) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();
        info!("Training on {} samples...", dataset.len());

        let feature_options = dataset.feature_options();
        let distribution = dataset.class_distribution();
        let ratio = dataset.balance_ratio();
        if ratio < config.min_balance_ratio {
            warn!(
                "Class distribution is imbalanced (minority/majority = {:.3}): {:?}",
                ratio, distribution
            );
        } else {
            info!("Class distribution (balance ratio {:.3}): {:?}", ratio, distribution);
        }

        let encoder = OneHotEncoder::fit(dataset);
        let matrix = encoder.transform(dataset)?;
        info!("One-hot encoded {} features into {} columns", dataset.features().len(), encoder.n_columns());

        let split = if config.stratify {
            stratified_split(dataset.labels(), config.test_size, config.seed)?
        } else {
            train_test_split(dataset.len(), config.test_size, config.seed)?
        };
        let (x_train, x_test) = split.take(&matrix);
        let (y_train, y_test) = split.take(dataset.labels());

        let tree = DecisionTreeClassifier::fit(&x_train, &y_train, config.tree.clone())?;

        let y_pred = tree.predict_batch(&x_test);
        let accuracy = accuracy_score(&y_test, &y_pred)?;
        let labels: Vec<String> = distribution.keys().cloned().collect();
        let confusion = ConfusionMatrix::compute(&labels, &y_test, &y_pred)?;
        let evaluation = Evaluation {
            accuracy,
            baseline_accuracy: majority_baseline(&y_test),
            n_train: y_train.len(),
            n_test: y_test.len(),
            confusion,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        logger.log_run(TrainingRunEntry {
            timestamp: Utc::now(),
            dataset: config.dataset_path.display().to_string(),
            seed: config.seed,
            test_size: config.test_size,
            stratify: config.stratify,
            n_train: evaluation.n_train,
            n_test: evaluation.n_test,
            accuracy,
            baseline_accuracy: evaluation.baseline_accuracy,
            tree_depth: tree.depth(),
            tree_leaves: tree.n_leaves(),
            duration_ms,
        })?;

        info!(
            "Done. Accuracy: {} (baseline {}), depth {}, {} leaves, {} ms",
            format_percentage(accuracy),
            format_percentage(evaluation.baseline_accuracy),
            tree.depth(),
            tree.n_leaves(),
            duration_ms
        );

        Ok(Self {
            target: dataset.target().to_string(),
            poisonous_label: config.poisonous_label.clone(),
            features: dataset.features().to_vec(),
            feature_options,
            class_distribution: distribution.into_iter().collect(),
            encoder,
            tree,
            evaluation,
        })
    }

    /// Raw label predicted for one sample given as feature -> code.
    pub fn predict_label(&self, record: &HashMap<String, String>) -> Result<String> {
        let row = self.encoder.transform_record(record)?;
        Ok(self.tree.predict(&row).to_string())
    }

    pub fn predict(&self, record: &HashMap<String, String>) -> Result<Edibility> {
        let label = self.predict_label(record)?;
        Ok(if label == self.poisonous_label {
            Edibility::Poisonous
        } else {
            Edibility::Edible
        })
    }

    /// Probability per class label at the reached leaf.
    pub fn predict_proba(&self, record: &HashMap<String, String>) -> Result<Vec<(String, f64)>> {
        let row = self.encoder.transform_record(record)?;
        Ok(self
            .tree
            .classes()
            .iter()
            .cloned()
            .zip(self.tree.predict_proba(&row))
            .collect())
    }

    pub fn accuracy(&self) -> f64 {
        self.evaluation.accuracy
    }

    /// Accuracy as a percentage string, e.g. `100.00%`.
    pub fn accuracy_display(&self) -> String {
        format_percentage(self.evaluation.accuracy)
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    /// The `top_n` encoded columns by importance, largest first.
    pub fn feature_importances(&self, top_n: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .encoder
            .columns()
            .iter()
            .cloned()
            .zip(self.tree.feature_importances().iter().copied())
            .collect();
        // Stable sort keeps column order among equal importances.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_n);
        ranked
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn feature_options(&self) -> &[FeatureOptions] {
        &self.feature_options
    }

    pub fn class_distribution(&self) -> &[(String, usize)] {
        &self.class_distribution
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    pub fn tree(&self) -> &DecisionTreeClassifier {
        &self.tree
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            MushError::Model(format!("Failed to create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!("Saved model to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| MushError::Model(format!("Failed to open {}: {}", path.display(), e)))?;
        let model: Self = serde_json::from_reader(BufReader::new(file))?;
        model.encoder.validate().map_err(|e| {
            MushError::Model(format!("{} has an invalid encoder: {}", path.display(), e))
        })?;
        model.tree.validate().map_err(|e| {
            MushError::Model(format!("{} has an invalid tree: {}", path.display(), e))
        })?;
        if model.encoder.n_columns() != model.tree.n_features() {
            return Err(MushError::Model(format!(
                "{} has {} encoded columns but the tree expects {}",
                path.display(),
                model.encoder.n_columns(),
                model.tree.n_features()
            )));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Odor decides edibility; cap-shape is noise.
    fn odor_dataset(n: usize) -> Dataset {
        let odors = ["a", "l", "n", "f", "y", "p"];
        let shapes = ["x", "b"];
        let rows = (0..n)
            .map(|i| {
                let odor = odors[i % odors.len()];
                let label = if ["a", "l", "n"].contains(&odor) { "e" } else { "p" };
                let shape = shapes[(i / odors.len()) % shapes.len()];
                vec![
                    Some(label.to_string()),
                    Some(odor.to_string()),
                    Some(shape.to_string()),
                ]
            })
            .collect();
        Dataset::from_records(
            "class",
            vec!["class".to_string(), "odor".to_string(), "cap-shape".to_string()],
            rows,
        )
        .unwrap()
    }

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fit_learns_odor() {
        let model =
            MushroomModel::fit(&odor_dataset(120), &PipelineConfig::default(), &RunLogger::default())
                .unwrap();
        assert_eq!(model.accuracy(), 1.0);
        assert_eq!(model.accuracy_display(), "100.00%");
        assert_eq!(model.evaluation().n_test, 30);
        assert_eq!(model.evaluation().n_train, 90);

        assert_eq!(model.predict(&record(&[("odor", "f")])).unwrap(), Edibility::Poisonous);
        assert_eq!(
            model.predict(&record(&[("odor", "n"), ("cap-shape", "b")])).unwrap(),
            Edibility::Edible
        );
    }

    #[test]
    fn test_importances_favor_odor() {
        let model =
            MushroomModel::fit(&odor_dataset(120), &PipelineConfig::default(), &RunLogger::default())
                .unwrap();
        let top = model.feature_importances(3);
        assert_eq!(top.len(), 3);
        assert!(top.iter().all(|(name, _)| name.starts_with("odor_")));
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));

        let all = model.feature_importances(100);
        assert_eq!(all.len(), model.encoder().n_columns());
        let total: f64 = all.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_feature_is_rejected() {
        let model =
            MushroomModel::fit(&odor_dataset(60), &PipelineConfig::default(), &RunLogger::default())
                .unwrap();
        assert!(matches!(
            model.predict(&record(&[("smell", "f")])),
            Err(MushError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fit_records_run() {
        let logger = RunLogger::default();
        let config = PipelineConfig {
            stratify: true,
            ..PipelineConfig::default()
        };
        MushroomModel::fit(&odor_dataset(60), &config, &logger).unwrap();
        let runs = logger.recent_runs(5);
        assert_eq!(runs.len(), 1);
        assert!(runs[0].stratify);
        assert_eq!(runs[0].n_train + runs[0].n_test, 60);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model =
            MushroomModel::fit(&odor_dataset(60), &PipelineConfig::default(), &RunLogger::default())
                .unwrap();
        model.save(&path).unwrap();

        let restored = MushroomModel::load(&path).unwrap();
        assert_eq!(restored.features(), model.features());
        assert_eq!(restored.evaluation().confusion, model.evaluation().confusion);
        assert!((restored.accuracy() - model.accuracy()).abs() < 1e-12);
        assert_eq!(
            restored.predict(&record(&[("odor", "y")])).unwrap(),
            Edibility::Poisonous
        );
    }

    fn rewrite_saved(path: &Path, edit: impl Fn(&mut serde_json::Value)) {
        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        edit(&mut json);
        std::fs::write(path, serde_json::to_string(&json).unwrap()).unwrap();
    }

    #[test]
    fn test_load_rejects_tampered_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model =
            MushroomModel::fit(&odor_dataset(60), &PipelineConfig::default(), &RunLogger::default())
                .unwrap();

        model.save(&path).unwrap();
        rewrite_saved(&path, |m| m["tree"]["nodes"] = serde_json::json!([]));
        assert!(matches!(MushroomModel::load(&path), Err(MushError::Model(_))));

        model.save(&path).unwrap();
        rewrite_saved(&path, |m| m["tree"]["nodes"][0]["left"] = serde_json::json!(0));
        assert!(matches!(MushroomModel::load(&path), Err(MushError::Model(_))));

        model.save(&path).unwrap();
        rewrite_saved(&path, |m| {
            m["encoder"]["blocks"][0]["categories"] =
                serde_json::json!(["y", "p", "n", "l", "f", "a"])
        });
        assert!(matches!(MushroomModel::load(&path), Err(MushError::Model(_))));

        model.save(&path).unwrap();
        assert!(MushroomModel::load(&path).is_ok());
    }

    #[test]
    fn test_load_rejects_width_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model =
            MushroomModel::fit(&odor_dataset(60), &PipelineConfig::default(), &RunLogger::default())
                .unwrap();
        model.save(&path).unwrap();
        rewrite_saved(&path, |m| {
            let width = m["tree"]["n_features"].as_u64().unwrap();
            m["tree"]["n_features"] = serde_json::json!(width + 1);
            m["tree"]["importances"].as_array_mut().unwrap().push(serde_json::json!(0.0));
        });

        let err = MushroomModel::load(&path).unwrap_err();
        assert!(err.to_string().contains("encoded columns"), "{}", err);
    }

    #[test]
    fn test_edibility_display() {
        assert_eq!(Edibility::Poisonous.to_string(), "POISONOUS");
        assert_eq!(Edibility::Edible.to_string(), "EDIBLE");
    }
}
