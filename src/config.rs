//! Pipeline Configuration
//!
//! Layered as defaults <- JSON file <- environment <- CLI flags. The binary
//! applies the last layer; everything else lives here.

use crate::error::{MushError, Result};
use crate::tree::TreeParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATASET: &str = "MUSH_ID_DATASET";
pub const ENV_SEED: &str = "MUSH_ID_SEED";
pub const ENV_TEST_SIZE: &str = "MUSH_ID_TEST_SIZE";
pub const ENV_RUN_LOG: &str = "MUSH_ID_RUN_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset_path: PathBuf,
    /// Column holding the edibility label.
    pub target: String,
    /// Label value that means poisonous; anything else is edible.
    pub poisonous_label: String,
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    pub seed: u64,
    /// Keep class proportions equal across train and test.
    pub stratify: bool,
    pub top_n: usize,
    /// Below this minority/majority ratio the dataset is reported as imbalanced.
    pub min_balance_ratio: f64,
    pub run_log: Option<PathBuf>,
    pub tree: TreeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("mushroom.csv"),
            target: "class".to_string(),
            poisonous_label: "p".to_string(),
            test_size: 0.25,
            seed: 42,
            stratify: false,
            top_n: 5,
            min_balance_ratio: 0.5,
            run_log: None,
            tree: TreeParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a config file. Missing keys fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MushError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| MushError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dataset) = lookup(ENV_DATASET) {
            self.dataset_path = PathBuf::from(dataset);
        }
        if let Some(seed) = lookup(ENV_SEED) {
            self.seed = seed.trim().parse().map_err(|_| {
                MushError::Config(format!("{} must be an unsigned integer, got '{}'", ENV_SEED, seed))
            })?;
        }
        if let Some(test_size) = lookup(ENV_TEST_SIZE) {
            self.test_size = test_size.trim().parse().map_err(|_| {
                MushError::Config(format!("{} must be a number, got '{}'", ENV_TEST_SIZE, test_size))
            })?;
        }
        if let Some(run_log) = lookup(ENV_RUN_LOG) {
            self.run_log = Some(PathBuf::from(run_log));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(MushError::Config(format!(
                "test_size must be between 0 and 1 (exclusive), got {}",
                self.test_size
            )));
        }
        if self.target.trim().is_empty() {
            return Err(MushError::Config("target column name is empty".to_string()));
        }
        if self.poisonous_label.is_empty() {
            return Err(MushError::Config("poisonous_label is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_balance_ratio) {
            return Err(MushError::Config(format!(
                "min_balance_ratio must be within [0, 1], got {}",
                self.min_balance_ratio
            )));
        }
        self.tree.validate()
    }
}
