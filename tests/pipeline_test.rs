//! End-to-end pipeline tests
//!
//! Writes a synthetic mushroom CSV where odor alone decides edibility, then
//! runs load -> encode -> split -> train -> evaluate through the public API.

use mush_id::dataset::Dataset;
use mush_id::encoding::OneHotEncoder;
use mush_id::observability::TrainingRunEntry;
use mush_id::{Edibility, MushError, MushroomModel, PipelineConfig};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EDIBLE_ODORS: [&str; 3] = ["a", "l", "n"];
const ODORS: [&str; 6] = ["a", "l", "n", "f", "y", "p"];

fn write_mushroom_csv(dir: &Path, n: usize) -> PathBuf {
    let shapes = ["x", "b", "f"];
    let gill_sizes = ["b", "n"];
    let roots = ["c", "?", "b"];
    let habitats = ["d", "g"];

    let mut csv = String::from("class,cap-shape,odor,gill-size,stalk-root,habitat\n");
    for i in 0..n {
        let odor = ODORS[i % ODORS.len()];
        let class = if EDIBLE_ODORS.contains(&odor) { "e" } else { "p" };
        writeln!(
            csv,
            "{},{},{},{},{},{}",
            class,
            shapes[(i / 6) % shapes.len()],
            odor,
            gill_sizes[(i / 18) % gill_sizes.len()],
            roots[(i / 36) % roots.len()],
            habitats[(i / 7) % habitats.len()],
        )
        .unwrap();
    }

    let path = dir.join("mushroom.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn config_for(path: &Path) -> PipelineConfig {
    PipelineConfig {
        dataset_path: path.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_accuracy_beats_majority_baseline() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 400);

    let model = MushroomModel::train(&config_for(&path)).unwrap();
    let evaluation = model.evaluation();

    assert_eq!(evaluation.n_test, 100);
    assert_eq!(evaluation.n_train, 300);
    assert!(evaluation.accuracy > evaluation.baseline_accuracy);
    assert!(evaluation.accuracy >= 0.95, "accuracy {}", evaluation.accuracy);
    assert_eq!(evaluation.confusion.total(), 100);
}

#[test]
fn test_same_seed_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 300);
    let config = config_for(&path);

    let first = MushroomModel::train(&config).unwrap();
    let second = MushroomModel::train(&config).unwrap();

    assert_eq!(first.accuracy().to_bits(), second.accuracy().to_bits());
    assert_eq!(first.evaluation().confusion, second.evaluation().confusion);
    assert_eq!(first.tree().n_nodes(), second.tree().n_nodes());

    let a = first.feature_importances(10);
    let b = second.feature_importances(10);
    assert_eq!(a.len(), b.len());
    for ((name_a, imp_a), (name_b, imp_b)) in a.iter().zip(&b) {
        assert_eq!(name_a, name_b);
        assert_eq!(imp_a.to_bits(), imp_b.to_bits());
    }

    for odor in ODORS {
        let sample = record(&[("odor", odor), ("cap-shape", "x")]);
        assert_eq!(first.predict(&sample).unwrap(), second.predict(&sample).unwrap());
    }
}

#[test]
fn test_odor_drives_predictions() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 400);
    let model = MushroomModel::train(&config_for(&path)).unwrap();

    let top = model.feature_importances(1);
    assert!(top[0].0.starts_with("odor_"), "top feature was {}", top[0].0);

    for odor in ODORS {
        let expected = if EDIBLE_ODORS.contains(&odor) {
            Edibility::Edible
        } else {
            Edibility::Poisonous
        };
        let sample = record(&[
            ("cap-shape", "x"),
            ("odor", odor),
            ("gill-size", "b"),
            ("stalk-root", "c"),
            ("habitat", "d"),
        ]);
        assert_eq!(model.predict(&sample).unwrap(), expected, "odor {}", odor);
    }
}

#[test]
fn test_feature_options_and_encoding_width() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 120);
    let dataset = Dataset::load(&path, "class").unwrap();

    let options = dataset.feature_options();
    let odor = options.iter().find(|o| o.feature == "odor").unwrap();
    assert_eq!(odor.values, ODORS.to_vec());

    let encoder = OneHotEncoder::fit(&dataset);
    let expected_width: usize = options.iter().map(|o| o.values.len()).sum();
    assert_eq!(encoder.n_columns(), expected_width);
    assert!(encoder.column_index("stalk-root_?").is_some());

    let matrix = encoder.transform(&dataset).unwrap();
    assert!(matrix
        .iter()
        .all(|row| row.iter().sum::<f64>() == options.len() as f64));
}

#[test]
fn test_stratified_training_keeps_balance() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 240);
    let config = PipelineConfig {
        stratify: true,
        ..config_for(&path)
    };
    let model = MushroomModel::train(&config).unwrap();
    let cm = &model.evaluation().confusion;

    let true_e: usize = cm.counts[0].iter().sum();
    let true_p: usize = cm.counts[1].iter().sum();
    assert_eq!(true_e, 30);
    assert_eq!(true_p, 30);
}

#[test]
fn test_saved_model_predicts_like_trained_model() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 300);
    let model = MushroomModel::train(&config_for(&path)).unwrap();

    let model_path = dir.path().join("model.json");
    model.save(&model_path).unwrap();
    let restored = MushroomModel::load(&model_path).unwrap();

    assert_eq!(restored.accuracy_display(), model.accuracy_display());
    for odor in ODORS {
        let sample = record(&[("odor", odor), ("habitat", "g")]);
        assert_eq!(restored.predict(&sample).unwrap(), model.predict(&sample).unwrap());
    }
}

#[test]
fn test_run_log_written() {
    let dir = TempDir::new().unwrap();
    let path = write_mushroom_csv(dir.path(), 120);
    let log_path = dir.path().join("runs.jsonl");
    let config = PipelineConfig {
        run_log: Some(log_path.clone()),
        ..config_for(&path)
    };

    MushroomModel::train(&config).unwrap();
    MushroomModel::train(&config).unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    let entries: Vec<TrainingRunEntry> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seed, 42);
    assert_eq!(entries[0].n_test, 30);
    assert_eq!(entries[0].accuracy.to_bits(), entries[1].accuracy.to_bits());
}

#[test]
fn test_missing_dataset_and_bad_target() {
    let dir = TempDir::new().unwrap();
    let missing = config_for(&dir.path().join("nope.csv"));
    assert!(matches!(MushroomModel::train(&missing), Err(MushError::Dataset(_))));

    let path = write_mushroom_csv(dir.path(), 60);
    let wrong_target = PipelineConfig {
        target: "edible".to_string(),
        ..config_for(&path)
    };
    assert!(matches!(MushroomModel::train(&wrong_target), Err(MushError::Dataset(_))));
}
