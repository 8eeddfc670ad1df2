//! Mushroom Dataset
//!
//! Tabular samples of categorical morphological attributes plus an
//! edibility label. Every cell is kept as a string; an empty cell is a
//! missing value.

use crate::error::{MushError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// Distinct values of one feature, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureOptions {
    pub feature: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    target: String,
    features: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    labels: Vec<String>,
}

impl Dataset {
    /// Load a CSV file with a header row. All columns are read as strings.
    pub fn load(path: impl AsRef<Path>, target: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MushError::Dataset(format!(
                "CSV file not found: {}",
                path.display()
            )));
        }

        info!("Loading dataset: {}", path.display());
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .map_err(|e| MushError::Dataset(format!("Failed to load CSV {}: {}", path.display(), e)))?
            .collect()?;

        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut columns: Vec<Vec<Option<String>>> = Vec::with_capacity(headers.len());
        for name in df.get_column_names() {
            let series = df.column(name)?.cast(&DataType::String)?;
            let values = series
                .str()?
                .into_iter()
                .map(|cell| {
                    cell.map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                })
                .collect();
            columns.push(values);
        }

        let rows = (0..df.height())
            .map(|r| columns.iter().map(|col| col[r].clone()).collect())
            .collect();

        let dataset = Self::from_records(target, headers, rows)?;
        info!(
            "Loaded {} rows, {} features",
            dataset.len(),
            dataset.features().len()
        );
        Ok(dataset)
    }

    /// Build a dataset from a header and rows of optional cells.
    pub fn from_records(
        target: &str,
        headers: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(MushError::Dataset(format!("duplicate column '{}'", dup)));
        }

        let target_idx = headers
            .iter()
            .position(|h| h == target)
            .ok_or_else(|| MushError::Dataset(format!("target column '{}' not found", target)))?;
        if headers.len() < 2 {
            return Err(MushError::Dataset("no feature columns besides the target".to_string()));
        }
        if rows.is_empty() {
            return Err(MushError::Dataset("dataset has no rows".to_string()));
        }

        let features: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut feature_rows = Vec::with_capacity(rows.len());
        let mut labels = Vec::with_capacity(rows.len());
        for (r, mut row) in rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(MushError::Dataset(format!(
                    "row {} has {} cells, expected {}",
                    r + 1,
                    row.len(),
                    headers.len()
                )));
            }
            let label = row.remove(target_idx).ok_or_else(|| {
                MushError::Dataset(format!("row {} has no value for '{}'", r + 1, target))
            })?;
            labels.push(label);
            feature_rows.push(row);
        }

        Ok(Self {
            target: target.to_string(),
            features,
            rows: feature_rows,
            labels,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_index(&self, feature: &str) -> Option<usize> {
        self.features.iter().position(|f| f == feature)
    }

    /// Cell value, `None` when missing or out of range.
    pub fn cell(&self, row: usize, feature: usize) -> Option<&str> {
        self.rows.get(row)?.get(feature)?.as_deref()
    }

    /// Distinct values per feature in first-seen order, feature order preserved.
    pub fn feature_options(&self) -> Vec<FeatureOptions> {
        self.features
            .iter()
            .enumerate()
            .map(|(f, feature)| {
                let mut seen = HashSet::new();
                let values = self
                    .rows
                    .iter()
                    .filter_map(|row| row[f].as_deref())
                    .filter(|v| seen.insert(*v))
                    .map(str::to_string)
                    .collect();
                FeatureOptions {
                    feature: feature.clone(),
                    values,
                }
            })
            .collect()
    }

    /// Sample count per label.
    pub fn class_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Minority class count over majority class count.
    pub fn balance_ratio(&self) -> f64 {
        let counts = self.class_distribution();
        let max = counts.values().copied().max().unwrap_or(0);
        let min = counts.values().copied().min().unwrap_or(0);
        if max == 0 {
            return 1.0;
        }
        min as f64 / max as f64
    }
}
