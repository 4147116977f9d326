//! Random forest of CART trees for binary labels.
//!
//! Trees split on Gini impurity, each grown on a bootstrap sample with a
//! random subset of features considered at every split.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForestError {
    #[error("training set is empty")]
    Empty,
    #[error("{rows} feature rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },
    #[error("deadline reached before any tree was grown")]
    NoTrees,
}

/// Growth parameters shared by every tree in a forest.
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features tried per split; `None` means `ceil(sqrt(d))`.
    pub max_features: Option<usize>,
    /// Stop adding trees once this instant passes.
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Fraction of positive labels reaching this leaf.
        p1: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { p1 } => return *p1,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let positives = indices.iter().filter(|&&i| self.y[i] == 1).count();
        let n = indices.len();
        let p1 = if n == 0 { 0.0 } else { positives as f64 / n as f64 };

        let pure = positives == 0 || positives == n;
        if pure || depth >= self.max_depth || n < self.min_samples_split.max(2) {
            return self.push(Node::Leaf { p1 });
        }

        let Some((feature, threshold)) = self.best_split(indices, positives, rng) else {
            return self.push(Node::Leaf { p1 });
        };

        // Partition in place: left side holds rows with value <= threshold.
        let mut mid = 0;
        for i in 0..n {
            if self.x[indices[i]][feature] <= threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == n {
            return self.push(Node::Leaf { p1 });
        }

        let slot = self.push(Node::Leaf { p1 });
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = self.build(left_idx, depth + 1, rng);
        let right = self.build(right_idx, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Best (feature, threshold) by Gini decrease over a random feature subset.
    fn best_split(&self, indices: &[usize], positives: usize, rng: &mut StdRng) -> Option<(usize, f64)> {
        let n = indices.len();
        let dim = self.x[indices[0]].len();
        let parent = gini(positives, n);

        let mut best: Option<(usize, f64)> = None;
        let mut best_gain = 1e-12;

        let mut features = sample(rng, dim, self.max_features.min(dim)).into_vec();
        features.sort_unstable();

        let mut sorted: Vec<(f64, u8)> = Vec::with_capacity(n);
        for feature in features {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.x[i][feature], self.y[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0usize;
            for split in 1..n {
                left_pos += sorted[split - 1].1 as usize;
                if sorted[split].0 <= sorted[split - 1].0 {
                    continue;
                }
                let left_n = split;
                let right_n = n - split;
                let weighted = (left_n as f64 * gini(left_pos, left_n)
                    + right_n as f64 * gini(positives - left_pos, right_n))
                    / n as f64;
                let gain = parent - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, 0.5 * (sorted[split - 1].0 + sorted[split].0)));
                }
            }
        }
        best
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// An ensemble of bootstrap-trained decision trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Grow up to `params.n_trees` trees. If the deadline passes midway the
    /// trees grown so far are kept; zero trees is an error.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Result<Self, ForestError> {
        if x.is_empty() {
            return Err(ForestError::Empty);
        }
        if x.len() != y.len() {
            return Err(ForestError::LengthMismatch {
                rows: x.len(),
                labels: y.len(),
            });
        }
        let n_features = x[0].len();
        if let Some((row, r)) = x.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(ForestError::RaggedRow {
                row,
                expected: n_features,
                actual: r.len(),
            });
        }

        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .max(1);
        let n = x.len();

        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            if params.deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            let mut bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut builder = TreeBuilder {
                x,
                y,
                max_depth: params.max_depth,
                min_samples_split: params.min_samples_split,
                max_features,
                nodes: Vec::new(),
            };
            builder.build(&mut bootstrap, 0, rng);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        if trees.is_empty() {
            return Err(ForestError::NoTrees);
        }
        Ok(Self { n_features, trees })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
    }

    /// Mean positive-class probability across trees. `row` must have
    /// `n_features` entries.
    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        total / self.trees.len() as f64
    }
}
