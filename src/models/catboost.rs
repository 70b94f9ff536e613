use std::collections::{HashMap, HashSet};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::Problem;
use crate::data_handling::{Column, FeatureMatrix};
use crate::error::ModelError;
use crate::models::model_trait::{check_training_input, FeatureModel};
use crate::models::objective::Objective;
use crate::models::tree::{goes_left, Node, Tree, TreeEnsemble};
use crate::models::utils::{boosting_targets, ClassLabels};

/// Deepest oblivious tree that will be grown; deeper requests are clamped.
pub const MAX_OBLIVIOUS_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct CatBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of every oblivious tree, at most [`MAX_OBLIVIOUS_DEPTH`].
    pub depth: usize,
    pub reg_lambda: f64,
    /// Upper bound on candidate borders per feature.
    pub max_borders: usize,
}

impl Default for CatBoostParams {
    fn default() -> Self {
        CatBoostParams {
            n_estimators: 100,
            learning_rate: 0.1,
            depth: 6,
            reg_lambda: 3.0,
            max_borders: 32,
        }
    }
}

/// Ordered target statistics for one categorical column.
///
/// During training each row is encoded with the statistics of the rows that
/// precede it in a random permutation, so a row never sees its own target.
/// After training the statistics over all rows are used.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetStatistics {
    prior: f64,
    stats: HashMap<Option<String>, (f64, f64)>,
}

impl TargetStatistics {
    /// Encode `column` along `permutation`, returning the statistics and the
    /// per-row training encodings.
    pub fn fit_ordered(
        column: &Column,
        target: &[f64],
        prior: f64,
        permutation: &[usize],
    ) -> (Self, Vec<f64>) {
        let mut stats: HashMap<Option<String>, (f64, f64)> = HashMap::new();
        let mut encoded = vec![prior; target.len()];
        for &row in permutation {
            let entry = stats.entry(column.category_key(row)).or_insert((0.0, 0.0));
            encoded[row] = (entry.0 + prior) / (entry.1 + 1.0);
            entry.0 += target[row];
            entry.1 += 1.0;
        }
        (TargetStatistics { prior, stats }, encoded)
    }

    pub fn encode(&self, key: &Option<String>) -> f64 {
        match self.stats.get(key) {
            Some((sum, count)) => (sum + self.prior) / (count + 1.0),
            None => self.prior,
        }
    }

    pub fn n_categories(&self) -> usize {
        self.stats.len()
    }
}

/// Gradient boosting over oblivious trees with native categorical support.
///
/// Declared categorical columns (string or numeric) are encoded by ordered
/// target statistics; every other column must be numeric. Missing numeric
/// values sort before every observed value. A tree stops growing once it
/// has at least as many leaves as there are training rows.
pub struct CatBoostModel {
    params: CatBoostParams,
    problem: Problem,
    categorical: HashSet<String>,
    encoders: Vec<Option<TargetStatistics>>,
    ensemble: Option<TreeEnsemble>,
    training: Option<Array2<f64>>,
}

/// One level of an oblivious tree.
struct Level {
    feature: usize,
    threshold: f64,
    /// Loss reduction contributed by each leaf of the previous level.
    leaf_gains: Vec<f64>,
}

impl CatBoostModel {
    pub fn new(mut params: CatBoostParams, problem: Problem, categorical: &[String]) -> Self {
        if params.depth > MAX_OBLIVIOUS_DEPTH {
            log::warn!(
                "CatBoost depth {} exceeds {}; clamping",
                params.depth,
                MAX_OBLIVIOUS_DEPTH
            );
            params.depth = MAX_OBLIVIOUS_DEPTH;
        }
        CatBoostModel {
            params,
            problem,
            categorical: categorical.iter().cloned().collect(),
            encoders: Vec::new(),
            ensemble: None,
            training: None,
        }
    }

    fn encode_training(
        &mut self,
        x: &FeatureMatrix,
        y: &[f64],
        rng: &mut StdRng,
    ) -> Result<Array2<f64>, ModelError> {
        let (ts_target, prior) = match self.problem {
            Problem::Classification => {
                let labels = ClassLabels::fit(y)?;
                let scale = (labels.n_classes() - 1) as f64;
                let target: Vec<f64> = labels.indices().iter().map(|&c| c as f64 / scale).collect();
                (target, 0.5)
            }
            Problem::Regression => (y.to_vec(), y.iter().sum::<f64>() / y.len() as f64),
        };

        let mut permutation: Vec<usize> = (0..x.nrows()).collect();
        permutation.shuffle(rng);

        let mut data = Array2::zeros((x.nrows(), x.ncols()));
        let mut encoders = Vec::with_capacity(x.ncols());
        for (c, column) in x.columns().iter().enumerate() {
            if self.categorical.contains(&column.name) {
                let (encoder, encoded) =
                    TargetStatistics::fit_ordered(column, &ts_target, prior, &permutation);
                log::trace!(
                    "Encoded '{}' with {} categories",
                    column.name,
                    encoder.n_categories()
                );
                for (r, v) in encoded.into_iter().enumerate() {
                    data[[r, c]] = v;
                }
                encoders.push(Some(encoder));
            } else {
                let values = numeric_values(column)?;
                for (r, &v) in values.iter().enumerate() {
                    data[[r, c]] = v;
                }
                encoders.push(None);
            }
        }
        self.encoders = encoders;
        Ok(data)
    }

    fn encode_prediction(&self, x: &FeatureMatrix) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.encoders.len() {
            return Err(ModelError::InvalidInput(format!(
                "expected {} columns, got {}",
                self.encoders.len(),
                x.ncols()
            )));
        }
        let mut data = Array2::zeros((x.nrows(), x.ncols()));
        for (c, (column, encoder)) in x.columns().iter().zip(&self.encoders).enumerate() {
            match encoder {
                Some(encoder) => {
                    for r in 0..x.nrows() {
                        data[[r, c]] = encoder.encode(&column.category_key(r));
                    }
                }
                None => {
                    for (r, &v) in numeric_values(column)?.iter().enumerate() {
                        data[[r, c]] = v;
                    }
                }
            }
        }
        Ok(data)
    }
}

fn numeric_values(column: &Column) -> Result<&[f64], ModelError> {
    column.as_numeric().ok_or_else(|| {
        ModelError::InvalidInput(format!(
            "column '{}' is not numeric and not declared categorical",
            column.name
        ))
    })
}

/// Candidate split points: midpoints between distinct observed values,
/// thinned to at most `max_borders` by taking evenly spaced quantiles.
pub fn quantile_borders(values: impl Iterator<Item = f64>, max_borders: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    let midpoints: Vec<f64> = sorted.windows(2).map(|w| w[0] / 2.0 + w[1] / 2.0).collect();
    if midpoints.len() <= max_borders || max_borders == 0 {
        return midpoints;
    }
    let step = midpoints.len() as f64 / max_borders as f64;
    let mut borders: Vec<f64> = (0..max_borders)
        .map(|i| midpoints[((i as f64 + 0.5) * step) as usize])
        .collect();
    borders.dedup();
    borders
}

struct ObliviousBuilder<'a> {
    x: &'a Array2<f64>,
    borders: &'a [Vec<f64>],
    /// Row order per feature with missing values first.
    sorted_rows: &'a [Vec<usize>],
    reg_lambda: f64,
}

impl ObliviousBuilder<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.reg_lambda)
    }

    /// Best border of `feature` given the current leaf of every row.
    fn best_for_feature(
        &self,
        feature: usize,
        leaf_of: &[usize],
        leaf_g: &[f64],
        leaf_h: &[f64],
        grad: &[f64],
        hess: &[f64],
    ) -> Option<Level> {
        let n_leaves = leaf_g.len();
        let mut gl = vec![0.0; n_leaves];
        let mut hl = vec![0.0; n_leaves];
        let rows = &self.sorted_rows[feature];
        let mut cursor = 0;
        let mut best: Option<(f64, usize, Vec<f64>)> = None;

        for (b, &border) in self.borders[feature].iter().enumerate() {
            while cursor < rows.len() && goes_left(self.x[[rows[cursor], feature]], border, true) {
                let r = rows[cursor];
                gl[leaf_of[r]] += grad[r];
                hl[leaf_of[r]] += hess[r];
                cursor += 1;
            }
            let leaf_gains: Vec<f64> = (0..n_leaves)
                .map(|l| {
                    let (gr, hr) = (leaf_g[l] - gl[l], leaf_h[l] - hl[l]);
                    let parent = self.score(leaf_g[l], leaf_h[l]);
                    0.5 * (self.score(gl[l], hl[l]) + self.score(gr, hr) - parent)
                })
                .collect();
            let gain: f64 = leaf_gains.iter().sum();
            if gain > 1e-12 && best.as_ref().map_or(true, |(g, _, _)| gain > *g) {
                best = Some((gain, b, leaf_gains));
            }
        }
        best.map(|(_, b, leaf_gains)| Level {
            feature,
            threshold: self.borders[feature][b],
            leaf_gains,
        })
    }

    /// Grow one oblivious tree and return it with the value each row lands on.
    ///
    /// Features are visited in a fresh random order at every level; on equal
    /// gain the first one visited wins, so identical columns share levels.
    fn build(
        &self,
        grad: &[f64],
        hess: &[f64],
        depth: usize,
        learning_rate: f64,
        output: usize,
        rng: &mut StdRng,
    ) -> (Tree, Vec<f64>) {
        let n = grad.len();
        let depth = depth.min(MAX_OBLIVIOUS_DEPTH);
        let mut leaf_of = vec![0usize; n];
        let mut levels: Vec<Level> = Vec::with_capacity(depth);

        for _ in 0..depth {
            let n_leaves = 1usize << levels.len();
            if n_leaves >= n {
                break;
            }
            let mut leaf_g = vec![0.0; n_leaves];
            let mut leaf_h = vec![0.0; n_leaves];
            for r in 0..n {
                leaf_g[leaf_of[r]] += grad[r];
                leaf_h[leaf_of[r]] += hess[r];
            }

            let mut order: Vec<usize> = (0..self.x.ncols()).collect();
            order.shuffle(rng);
            let candidates: Vec<Level> = order
                .into_par_iter()
                .filter_map(|f| self.best_for_feature(f, &leaf_of, &leaf_g, &leaf_h, grad, hess))
                .collect();
            let mut best: Option<Level> = None;
            for candidate in candidates {
                let gain: f64 = candidate.leaf_gains.iter().sum();
                if best
                    .as_ref()
                    .map_or(true, |b| gain > b.leaf_gains.iter().sum::<f64>())
                {
                    best = Some(candidate);
                }
            }
            let Some(level) = best else {
                break;
            };

            for r in 0..n {
                let left = goes_left(self.x[[r, level.feature]], level.threshold, true);
                leaf_of[r] = leaf_of[r] * 2 + usize::from(!left);
            }
            levels.push(level);
        }

        let n_leaves = 1usize << levels.len();
        let mut leaf_g = vec![0.0; n_leaves];
        let mut leaf_h = vec![0.0; n_leaves];
        let mut leaf_count = vec![0.0; n_leaves];
        for r in 0..n {
            leaf_g[leaf_of[r]] += grad[r];
            leaf_h[leaf_of[r]] += hess[r];
            leaf_count[leaf_of[r]] += 1.0;
        }
        let leaf_values: Vec<f64> = (0..n_leaves)
            .map(|l| -leaf_g[l] / (leaf_h[l] + self.reg_lambda) * learning_rate)
            .collect();
        let row_values = leaf_of.iter().map(|&l| leaf_values[l]).collect();

        let mut tree = Tree::new(output);
        expand(&levels, &leaf_values, &leaf_count, &mut tree, 0, 0);
        (tree, row_values)
    }
}

/// Lay an oblivious tree out as a regular binary tree, dropping branches
/// no training row reaches.
fn expand(
    levels: &[Level],
    leaf_values: &[f64],
    leaf_count: &[f64],
    tree: &mut Tree,
    level: usize,
    prefix: usize,
) -> usize {
    if level == levels.len() {
        return tree.push(Node::Leaf {
            values: vec![leaf_values[prefix]],
            cover: leaf_count[prefix],
        });
    }
    let span = 1 << (levels.len() - level - 1);
    let cover_of = |p: usize| -> f64 { leaf_count[p * span..(p + 1) * span].iter().sum() };
    let (left_prefix, right_prefix) = (prefix * 2, prefix * 2 + 1);
    let (left_cover, right_cover) = (cover_of(left_prefix), cover_of(right_prefix));
    if left_cover <= 0.0 {
        return expand(levels, leaf_values, leaf_count, tree, level + 1, right_prefix);
    }
    if right_cover <= 0.0 {
        return expand(levels, leaf_values, leaf_count, tree, level + 1, left_prefix);
    }

    let idx = tree.reserve();
    let left = expand(levels, leaf_values, leaf_count, tree, level + 1, left_prefix);
    let right = expand(levels, leaf_values, leaf_count, tree, level + 1, right_prefix);
    tree.set(
        idx,
        Node::Split {
            feature: levels[level].feature,
            threshold: levels[level].threshold,
            missing_left: true,
            left,
            right,
            cover: left_cover + right_cover,
            gain: levels[level].leaf_gains[prefix],
        },
    );
    idx
}

impl FeatureModel for CatBoostModel {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], seed: u64) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(ModelError::InvalidInput(
                "n_estimators must be positive".to_string(),
            ));
        }
        let targets = boosting_targets(self.problem, y)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let data = self.encode_training(x, y, &mut rng)?;
        let objective = Objective::for_problem(self.problem);
        let n_samples = data.nrows();
        let n_outputs = targets.len();

        let borders: Vec<Vec<f64>> = (0..data.ncols())
            .map(|c| quantile_borders(data.column(c).iter().copied(), self.params.max_borders))
            .collect();
        let sorted_rows: Vec<Vec<usize>> = (0..data.ncols())
            .map(|c| {
                let mut rows: Vec<usize> = (0..n_samples).collect();
                rows.sort_by(|&a, &b| {
                    let (va, vb) = (data[[a, c]], data[[b, c]]);
                    match (va.is_nan(), vb.is_nan()) {
                        (true, true) => std::cmp::Ordering::Equal,
                        (true, false) => std::cmp::Ordering::Less,
                        (false, true) => std::cmp::Ordering::Greater,
                        (false, false) => va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal),
                    }
                });
                rows
            })
            .collect();
        let builder = ObliviousBuilder {
            x: &data,
            borders: &borders,
            sorted_rows: &sorted_rows,
            reg_lambda: self.params.reg_lambda,
        };

        let base_score: Vec<f64> = targets.iter().map(|t| objective.base_score(t)).collect();
        let mut margins: Vec<Vec<f64>> = base_score.iter().map(|&b| vec![b; n_samples]).collect();
        let mut grad = vec![0.0; n_samples];
        let mut hess = vec![0.0; n_samples];
        let mut trees = Vec::with_capacity(self.params.n_estimators * n_outputs);

        for _ in 0..self.params.n_estimators {
            for (k, target) in targets.iter().enumerate() {
                objective.gradients(target, &margins[k], &mut grad, &mut hess);
                let (tree, row_values) = builder.build(
                    &grad,
                    &hess,
                    self.params.depth,
                    self.params.learning_rate,
                    k,
                    &mut rng,
                );
                for (m, v) in margins[k].iter_mut().zip(row_values) {
                    *m += v;
                }
                trees.push(tree);
            }
        }

        self.ensemble = Some(TreeEnsemble::new(
            trees,
            data.ncols(),
            n_outputs,
            1.0,
            base_score,
        ));
        self.training = Some(data);
        Ok(())
    }

    /// Raw margins; categorical columns are encoded with the final statistics.
    fn predict(&self, x: &FeatureMatrix) -> Result<Array2<f64>, ModelError> {
        let ensemble = self.ensemble()?;
        let data = self.encode_prediction(x)?;
        Ok(ensemble.predict(&data))
    }

    /// Total split gain per feature, scaled to sum to 100.
    fn feature_importances(&self) -> Result<Vec<f64>, ModelError> {
        let mut importances = self.ensemble()?.split_gains(false);
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v *= 100.0 / total);
        }
        Ok(importances)
    }

    fn ensemble(&self) -> Result<&TreeEnsemble, ModelError> {
        self.ensemble.as_ref().ok_or(ModelError::NotFitted)
    }

    fn training_matrix(&self) -> Result<&Array2<f64>, ModelError> {
        self.training.as_ref().ok_or(ModelError::NotFitted)
    }

    fn name(&self) -> &str {
        "catboost"
    }
}
