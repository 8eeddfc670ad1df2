//! Evaluation Metrics

use crate::error::{MushError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn check_lengths(truth: &[String], predicted: &[String]) -> Result<()> {
    if truth.len() != predicted.len() {
        return Err(MushError::InvalidInput(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(MushError::InvalidInput("no labels to score".to_string()));
    }
    Ok(())
}

/// Fraction of predictions equal to the true label.
pub fn accuracy_score(truth: &[String], predicted: &[String]) -> Result<f64> {
    check_lengths(truth, predicted)?;
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

/// Accuracy of always predicting the most frequent label in `truth`.
pub fn majority_baseline(truth: &[String]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in truth {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    max as f64 / truth.len() as f64
}

/// `0.9985` -> `"99.85%"`
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Counts of (true label, predicted label) pairs. Rows are true labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn compute(labels: &[String], truth: &[String], predicted: &[String]) -> Result<Self> {
        check_lengths(truth, predicted)?;
        let index = |label: &str| {
            labels.iter().position(|l| l == label).ok_or_else(|| {
                MushError::InvalidInput(format!("label '{}' is not a known class", label))
            })
        };

        let mut counts = vec![vec![0usize; labels.len()]; labels.len()];
        for (t, p) in truth.iter().zip(predicted) {
            counts[index(t)?][index(p)?] += 1;
        }
        Ok(Self {
            labels: labels.to_vec(),
            counts,
        })
    }

    pub fn get(&self, truth: &str, predicted: &str) -> usize {
        let t = self.labels.iter().position(|l| l == truth);
        let p = self.labels.iter().position(|l| l == predicted);
        match (t, p) {
            (Some(t), Some(p)) => self.counts[t][p],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|l| l.len())
            .chain(self.counts.iter().flatten().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);

        write!(f, "{:>width$}", "", width = width)?;
        for label in &self.labels {
            write!(f, " {:>width$}", label, width = width)?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{:>width$}", label, width = width)?;
            for count in row {
                write!(f, " {:>width$}", count, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
