//! One-Hot Encoding
//!
//! Each categorical feature becomes one binary column per category, named
//! `{feature}_{category}`. Columns follow feature order, then sorted
//! category order within a feature.

use crate::dataset::Dataset;
use crate::error::{MushError, Result};
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Encoded columns belonging to one source feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureBlock {
    pub feature: String,
    pub categories: Vec<String>,
    /// Position of the first column of this block.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    blocks: Vec<FeatureBlock>,
    columns: Vec<String>,
}

impl OneHotEncoder {
    /// Learn the categories of every feature in `dataset`.
    pub fn fit(dataset: &Dataset) -> Self {
        let mut blocks = Vec::with_capacity(dataset.features().len());
        let mut columns = Vec::new();

        for (f, feature) in dataset.features().iter().enumerate() {
            let categories: Vec<String> = (0..dataset.len())
                .filter_map(|r| dataset.cell(r, f))
                .unique()
                .sorted()
                .map(str::to_string)
                .collect();

            let offset = columns.len();
            columns.extend(categories.iter().map(|c| format!("{}_{}", feature, c)));
            blocks.push(FeatureBlock {
                feature: feature.clone(),
                categories,
                offset,
            });
        }

        Self { blocks, columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn blocks(&self) -> &[FeatureBlock] {
        &self.blocks
    }

    /// Check the layout of an encoder that did not come from `fit`.
    ///
    /// Lookups binary-search each block, so categories must be strictly
    /// sorted, and blocks must tile `columns` in order.
    pub fn validate(&self) -> Result<()> {
        let mut offset = 0;
        for block in &self.blocks {
            if block.offset != offset {
                return Err(MushError::Encoding(format!(
                    "block '{}' starts at column {}, expected {}",
                    block.feature, block.offset, offset
                )));
            }
            if block.categories.windows(2).any(|w| w[0] >= w[1]) {
                return Err(MushError::Encoding(format!(
                    "categories of '{}' are not sorted and unique",
                    block.feature
                )));
            }
            offset += block.categories.len();
        }
        if offset != self.columns.len() {
            return Err(MushError::Encoding(format!(
                "blocks cover {} columns but {} are named",
                offset,
                self.columns.len()
            )));
        }
        Ok(())
    }

    fn block(&self, feature: &str) -> Option<&FeatureBlock> {
        self.blocks.iter().find(|b| b.feature == feature)
    }

    /// Encode every row of `dataset`. The dataset must share the fitted features.
    pub fn transform(&self, dataset: &Dataset) -> Result<Vec<Vec<f64>>> {
        if dataset.features().len() != self.blocks.len()
            || dataset
                .features()
                .iter()
                .zip(&self.blocks)
                .any(|(f, b)| *f != b.feature)
        {
            return Err(MushError::Encoding(
                "dataset features do not match the fitted encoder".to_string(),
            ));
        }

        let mut matrix = Vec::with_capacity(dataset.len());
        for r in 0..dataset.len() {
            let mut row = vec![0.0; self.columns.len()];
            for (f, block) in self.blocks.iter().enumerate() {
                if let Some(value) = dataset.cell(r, f) {
                    if let Ok(pos) = block.categories.binary_search_by(|c| c.as_str().cmp(value)) {
                        row[block.offset + pos] = 1.0;
                    }
                }
            }
            matrix.push(row);
        }
        Ok(matrix)
    }

    /// Encode a single sample given as feature -> category.
    ///
    /// Features left out of `record` encode as all zeros, as does a category
    /// the encoder never saw. A feature name the encoder does not know is an
    /// error.
    pub fn transform_record(&self, record: &HashMap<String, String>) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.columns.len()];
        for (feature, value) in record.iter().sorted() {
            let block = self.block(feature).ok_or_else(|| {
                MushError::InvalidInput(format!("unknown feature '{}'", feature))
            })?;
            match block.categories.binary_search(value) {
                Ok(pos) => row[block.offset + pos] = 1.0,
                Err(_) => warn!(
                    "Category '{}' was not seen for feature '{}'; encoding as absent",
                    value, feature
                ),
            }
        }
        Ok(row)
    }

    /// Build a polars frame from an encoded matrix, one `u32` column per encoded name.
    pub fn to_frame(&self, matrix: &[Vec<f64>]) -> Result<DataFrame> {
        if let Some(bad) = matrix.iter().position(|row| row.len() != self.columns.len()) {
            return Err(MushError::Encoding(format!(
                "row {} has {} columns, expected {}",
                bad,
                matrix[bad].len(),
                self.columns.len()
            )));
        }

        let series: Vec<Series> = self
            .columns
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let values: Vec<u32> = matrix.iter().map(|row| row[c] as u32).collect();
                Series::new(name, values)
            })
            .collect();
        Ok(DataFrame::new(series)?)
    }
}
