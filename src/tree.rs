//! Decision Tree Classifier
//!
//! CART-style binary tree over numeric feature vectors. Nodes live in a flat
//! array and children are referenced by index; a sample goes left when
//! `x[feature] <= threshold`.
//!
//! Split search is exhaustive over features and over midpoints between
//! consecutive distinct values. Ties keep the earliest feature and the lowest
//! threshold, so fitting the same data twice yields the same tree.

use crate::error::{MushError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Impurity measure used to score candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
}

impl Criterion {
    /// Impurity of a node given its per-class counts.
    pub fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum::<f64>()
            }
            Criterion::Entropy => counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    -p * p.log2()
                })
                .sum(),
        }
    }
}

/// Hyperparameters controlling tree growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub criterion: Criterion,
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub min_impurity_decrease: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_impurity_decrease: 0.0,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(MushError::Config(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf < 1 {
            return Err(MushError::Config(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(MushError::Config(
                "max_depth must be positive when set".to_string(),
            ));
        }
        if !self.min_impurity_decrease.is_finite() || self.min_impurity_decrease < 0.0 {
            return Err(MushError::Config(format!(
                "min_impurity_decrease must be a non-negative number, got {}",
                self.min_impurity_decrease
            )));
        }
        Ok(())
    }
}

/// A node in the tree. Leaves have no feature and no children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub feature: Option<usize>,
    pub threshold: f64,
    pub left: Option<usize>,
    pub right: Option<usize>,
    /// Training samples per class that reached this node.
    pub class_counts: Vec<usize>,
    pub impurity: f64,
    pub n_samples: usize,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }

    /// Index of the majority class; ties go to the lower class index.
    pub fn majority_class(&self) -> usize {
        let mut best = 0;
        for (idx, &count) in self.class_counts.iter().enumerate() {
            if count > self.class_counts[best] {
                best = idx;
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

/// A fitted decision tree classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    params: TreeParams,
    nodes: Vec<TreeNode>,
    classes: Vec<String>,
    n_features: usize,
    importances: Vec<f64>,
}

impl DecisionTreeClassifier {
    /// Fit a tree on `x` (one row per sample) and string labels `y`.
    pub fn fit(x: &[Vec<f64>], y: &[String], params: TreeParams) -> Result<Self> {
        params.validate()?;
        if x.is_empty() {
            return Err(MushError::Model("cannot fit a tree on zero samples".to_string()));
        }
        if x.len() != y.len() {
            return Err(MushError::Model(format!(
                "feature rows ({}) and labels ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if let Some(bad) = x.iter().position(|row| row.len() != n_features) {
            return Err(MushError::Model(format!(
                "row {} has {} features, expected {}",
                bad,
                x[bad].len(),
                n_features
            )));
        }

        let classes: Vec<String> = y.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let class_index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let encoded_y: Vec<usize> = y.iter().map(|label| class_index[label.as_str()]).collect();

        let mut builder = TreeBuilder {
            x,
            y: &encoded_y,
            n_classes: classes.len(),
            n_total: x.len(),
            params: &params,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        let indices: Vec<usize> = (0..x.len()).collect();
        builder.grow(indices, 0);

        let TreeBuilder {
            nodes,
            mut importances,
            ..
        } = builder;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for value in importances.iter_mut() {
                *value /= total;
            }
        }

        let tree = Self {
            params,
            nodes,
            classes,
            n_features,
            importances,
        };
        debug!(
            nodes = tree.n_nodes(),
            leaves = tree.n_leaves(),
            depth = tree.depth(),
            "Fitted decision tree"
        );
        Ok(tree)
    }

    /// Check the structure of a tree that did not come from `fit`.
    ///
    /// Children must sit after their parent in `nodes`, so a valid tree has
    /// no cycles and every walk from the root ends at a leaf.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MushError::Model("tree has no nodes".to_string()));
        }
        if self.classes.is_empty() {
            return Err(MushError::Model("tree has no classes".to_string()));
        }
        if self.importances.len() != self.n_features {
            return Err(MushError::Model(format!(
                "tree has {} importances for {} features",
                self.importances.len(),
                self.n_features
            )));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.class_counts.len() != self.classes.len() {
                return Err(MushError::Model(format!(
                    "node {} has {} class counts, expected {}",
                    idx,
                    node.class_counts.len(),
                    self.classes.len()
                )));
            }
            match (node.feature, node.left, node.right) {
                (None, None, None) => {}
                (Some(feature), Some(left), Some(right)) => {
                    if feature >= self.n_features {
                        return Err(MushError::Model(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, self.n_features
                        )));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(MushError::Model(format!(
                                "node {} has invalid child index {}",
                                idx, child
                            )));
                        }
                    }
                }
                _ => {
                    return Err(MushError::Model(format!(
                        "node {} is neither a leaf nor a complete split",
                        idx
                    )))
                }
            }
        }
        Ok(())
    }

    /// Leaf reached by `sample`; missing feature positions read as 0.0.
    fn leaf_for(&self, sample: &[f64]) -> &TreeNode {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            match (node.feature, node.left, node.right) {
                (Some(feature), Some(left), Some(right)) => {
                    let value = sample.get(feature).copied().unwrap_or(0.0);
                    idx = if value <= node.threshold { left } else { right };
                }
                _ => return node,
            }
        }
    }

    /// Predict the label of a single sample.
    pub fn predict(&self, sample: &[f64]) -> &str {
        let class = self.leaf_for(sample).majority_class();
        &self.classes[class]
    }

    /// Predict labels for many samples.
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<String> {
        samples.iter().map(|s| self.predict(s).to_string()).collect()
    }

    /// Class probabilities at the reached leaf, in `classes()` order.
    pub fn predict_proba(&self, sample: &[f64]) -> Vec<f64> {
        let leaf = self.leaf_for(sample);
        let n = leaf.n_samples.max(1) as f64;
        leaf.class_counts.iter().map(|&c| c as f64 / n).collect()
    }

    /// Normalized mean decrease in impurity per feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn node_at(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        // Iterative walk; very deep trees should not blow the stack.
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            let node = &self.nodes[idx];
            max_depth = max_depth.max(depth);
            if let (Some(left), Some(right)) = (node.left, node.right) {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    n_total: usize,
    params: &'a TreeParams,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    /// Grow the subtree for `indices` and return its node index.
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&indices);
        let n = indices.len();
        let impurity = self.params.criterion.impurity(&counts, n);

        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode {
            feature: None,
            threshold: 0.0,
            left: None,
            right: None,
            class_counts: counts,
            impurity,
            n_samples: n,
        });

        let depth_reached = self.params.max_depth.map_or(false, |max| depth >= max);
        if impurity <= f64::EPSILON || depth_reached || n < self.params.min_samples_split {
            return node_idx;
        }

        let candidate = match self.best_split(&indices, impurity) {
            Some(c) => c,
            None => return node_idx,
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][candidate.feature] <= candidate.threshold);

        let weight = n as f64 / self.n_total as f64;
        self.importances[candidate.feature] += weight * candidate.decrease;

        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);

        let node = &mut self.nodes[node_idx];
        node.feature = Some(candidate.feature);
        node.threshold = candidate.threshold;
        node.left = Some(left);
        node.right = Some(right);
        node_idx
    }

    fn best_split(&self, indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let total_counts = self.class_counts(indices);
        let mut best: Option<SplitCandidate> = None;

        let mut values: Vec<(f64, usize)> = Vec::with_capacity(n);
        for feature in 0..self.x[0].len() {
            values.clear();
            values.extend(indices.iter().map(|&i| (self.x[i][feature], self.y[i])));
            values.sort_by(|a, b| a.0.total_cmp(&b.0));

            if values[0].0 == values[n - 1].0 {
                continue;
            }

            let mut left_counts = vec![0usize; self.n_classes];
            for pos in 0..n - 1 {
                left_counts[values[pos].1] += 1;
                let (current, next) = (values[pos].0, values[pos + 1].0);
                if current == next {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_counts: Vec<usize> = total_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(t, l)| t - l)
                    .collect();
                let left_imp = self.params.criterion.impurity(&left_counts, n_left);
                let right_imp = self.params.criterion.impurity(&right_counts, n_right);
                let weighted =
                    (n_left as f64 * left_imp + n_right as f64 * right_imp) / n as f64;
                let decrease = parent_impurity - weighted;

                let weighted_decrease = decrease * n as f64 / self.n_total as f64;
                if weighted_decrease + 1e-12 < self.params.min_impurity_decrease {
                    continue;
                }

                let better = match best {
                    None => true,
                    Some(b) => decrease > b.decrease + 1e-12,
                };
                if better {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: current + (next - current) / 2.0,
                        decrease,
                    });
                }
            }
        }

        best
    }
}
