//! CART trees grown on a (bootstrap) sample, used by the random forest.
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::tree::{goes_left, Node, Tree};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    /// Gini impurity over `n_classes` dense class indices.
    Gini { n_classes: usize },
    /// Variance of the target.
    Mse,
}

#[derive(Debug, Clone)]
pub struct CartParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split before settling for the best valid one.
    pub max_features: usize,
    pub criterion: Criterion,
}

/// Sufficient statistics of the targets reaching a node.
#[derive(Debug, Clone)]
struct NodeStats {
    count: f64,
    sum: f64,
    sum_sq: f64,
    class_counts: Vec<f64>,
}

impl NodeStats {
    fn empty(criterion: Criterion) -> Self {
        let n_classes = match criterion {
            Criterion::Gini { n_classes } => n_classes,
            Criterion::Mse => 0,
        };
        NodeStats {
            count: 0.0,
            sum: 0.0,
            sum_sq: 0.0,
            class_counts: vec![0.0; n_classes],
        }
    }

    fn from_rows(criterion: Criterion, y: &[f64], rows: &[usize]) -> Self {
        let mut stats = Self::empty(criterion);
        for &i in rows {
            stats.add(y[i]);
        }
        stats
    }

    fn add(&mut self, y: f64) {
        self.count += 1.0;
        self.sum += y;
        self.sum_sq += y * y;
        if !self.class_counts.is_empty() {
            self.class_counts[y as usize] += 1.0;
        }
    }

    fn remove(&mut self, y: f64) {
        self.count -= 1.0;
        self.sum -= y;
        self.sum_sq -= y * y;
        if !self.class_counts.is_empty() {
            self.class_counts[y as usize] -= 1.0;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini { .. } => {
                let sum_sq: f64 = self
                    .class_counts
                    .iter()
                    .map(|c| (c / self.count).powi(2))
                    .sum();
                1.0 - sum_sq
            }
            Criterion::Mse => {
                let mean = self.sum / self.count;
                (self.sum_sq / self.count - mean * mean).max(0.0)
            }
        }
    }

    fn leaf_values(&self, criterion: Criterion) -> Vec<f64> {
        match criterion {
            Criterion::Gini { .. } => self
                .class_counts
                .iter()
                .map(|c| if self.count > 0.0 { c / self.count } else { 0.0 })
                .collect(),
            Criterion::Mse => vec![if self.count > 0.0 { self.sum / self.count } else { 0.0 }],
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Parent impurity minus the weighted child impurity.
    decrease: f64,
}

/// Grow one tree on `sample` (row indices, repeats allowed).
///
/// `y` holds class indices for Gini and raw targets for MSE. Split importance
/// is recorded as `n_node * impurity_decrease`.
pub fn grow_tree<R: Rng + ?Sized>(
    x: &Array2<f64>,
    y: &[f64],
    sample: &[usize],
    params: &CartParams,
    rng: &mut R,
) -> Tree {
    let mut tree = Tree::new(0);
    grow_node(x, y, sample.to_vec(), 0, params, &mut tree, rng);
    tree
}

fn grow_node<R: Rng + ?Sized>(
    x: &Array2<f64>,
    y: &[f64],
    rows: Vec<usize>,
    depth: usize,
    params: &CartParams,
    tree: &mut Tree,
    rng: &mut R,
) -> usize {
    let stats = NodeStats::from_rows(params.criterion, y, &rows);
    let impurity = stats.impurity(params.criterion);
    let n = rows.len();

    let should_stop = n < params.min_samples_split
        || n < 2 * params.min_samples_leaf
        || params.max_depth.map_or(false, |d| depth >= d)
        || impurity <= 1e-12;

    let split = if should_stop {
        None
    } else {
        find_best_split(x, y, &rows, &stats, impurity, params, rng)
    };

    let Some(split) = split else {
        return tree.push(Node::Leaf {
            values: stats.leaf_values(params.criterion),
            cover: n as f64,
        });
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&i| goes_left(x[[i, split.feature]], split.threshold, true));

    let idx = tree.reserve();
    let left = grow_node(x, y, left_rows, depth + 1, params, tree, rng);
    let right = grow_node(x, y, right_rows, depth + 1, params, tree, rng);
    tree.set(
        idx,
        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            missing_left: true,
            left,
            right,
            cover: n as f64,
            gain: n as f64 * split.decrease,
        },
    );
    idx
}

/// Examine features in random order. After `max_features` features the
/// search stops as soon as a valid split has been found.
fn find_best_split<R: Rng + ?Sized>(
    x: &Array2<f64>,
    y: &[f64],
    rows: &[usize],
    parent: &NodeStats,
    parent_impurity: f64,
    params: &CartParams,
    rng: &mut R,
) -> Option<SplitCandidate> {
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut best: Option<SplitCandidate> = None;
    for (visited, &feature) in features.iter().enumerate() {
        if visited >= params.max_features && best.is_some() {
            break;
        }
        let candidate =
            best_split_for_feature(x, y, rows, parent, parent_impurity, feature, params);
        if let Some(candidate) = candidate {
            if best.as_ref().map_or(true, |b| candidate.decrease > b.decrease) {
                best = Some(candidate);
            }
        }
    }
    best
}

fn best_split_for_feature(
    x: &Array2<f64>,
    y: &[f64],
    rows: &[usize],
    parent: &NodeStats,
    parent_impurity: f64,
    feature: usize,
    params: &CartParams,
) -> Option<SplitCandidate> {
    let mut order = rows.to_vec();
    order.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n = order.len();
    let mut left = NodeStats::empty(params.criterion);
    let mut right = parent.clone();
    let mut best: Option<SplitCandidate> = None;

    for pos in 0..n.saturating_sub(1) {
        let i = order[pos];
        left.add(y[i]);
        right.remove(y[i]);

        let value = x[[i, feature]];
        let next = x[[order[pos + 1], feature]];
        if next <= value {
            continue;
        }
        let n_left = pos + 1;
        let n_right = n - n_left;
        if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
            continue;
        }

        let weighted = (n_left as f64 * left.impurity(params.criterion)
            + n_right as f64 * right.impurity(params.criterion))
            / n as f64;
        let decrease = parent_impurity - weighted;
        if decrease > 1e-12 && best.as_ref().map_or(true, |b| decrease > b.decrease) {
            let mut threshold = value / 2.0 + next / 2.0;
            if threshold >= next {
                threshold = value;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                decrease,
            });
        }
    }
    best
}
