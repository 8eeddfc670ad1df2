//! Train/Test Split
//!
//! Seeded index permutation; the same inputs and seed always give the same
//! split.

use crate::error::{MushError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::debug;

/// Row indices assigned to each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Gather `items` for the train and test indices.
    pub fn take<T: Clone>(&self, items: &[T]) -> (Vec<T>, Vec<T>) {
        let pick = |idx: &[usize]| -> Vec<T> { idx.iter().map(|&i| items[i].clone()).collect() };
        (pick(&self.train), pick(&self.test))
    }
}

fn check_test_size(test_size: f64) -> Result<()> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MushError::Split(format!(
            "test_size must be between 0 and 1 (exclusive), got {}",
            test_size
        )));
    }
    Ok(())
}

fn check_sides(n_train: usize, n_test: usize, n: usize, test_size: f64) -> Result<()> {
    if n_train == 0 || n_test == 0 {
        return Err(MushError::Split(format!(
            "{} rows with test_size {} leaves {} train and {} test rows; both must be non-empty",
            n, test_size, n_train, n_test
        )));
    }
    Ok(())
}

/// Shuffle `0..n_rows` and hold out `ceil(test_size * n_rows)` rows for testing.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<Split> {
    check_test_size(test_size)?;
    let n_test = (test_size * n_rows as f64).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    check_sides(n_train, n_test, n_rows, test_size)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(&mut rng);

    let test = indices.split_off(n_train);
    debug!(train = indices.len(), test = test.len(), seed, "Split rows");
    Ok(Split {
        train: indices,
        test,
    })
}

/// Split each class separately so train and test keep the label proportions.
pub fn stratified_split(labels: &[String], test_size: f64, seed: u64) -> Result<Split> {
    check_test_size(test_size)?;

    let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(label.as_str()).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for (_, mut indices) in by_class {
        indices.shuffle(&mut rng);
        let n_class = indices.len();
        let mut n_test = (test_size * n_class as f64).ceil() as usize;
        if n_class > 1 {
            n_test = n_test.min(n_class - 1);
        }
        let n_train = indices.len() - n_test;
        test.extend(indices.split_off(n_train));
        train.extend(indices);
    }
    check_sides(train.len(), test.len(), labels.len(), test_size)?;

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    debug!(train = train.len(), test = test.len(), seed, "Stratified split");
    Ok(Split { train, test })
}
