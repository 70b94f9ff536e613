use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::Problem;
use crate::data_handling::FeatureMatrix;
use crate::error::ModelError;
use crate::models::model_trait::{
    check_training_input, prediction_matrix, FeatureModel,
};
use crate::models::objective::Objective;
use crate::models::tree::{goes_left, Node, Tree, TreeEnsemble};
use crate::models::utils::boosting_targets;

#[derive(Debug, Clone, PartialEq)]
pub struct XGBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    /// Minimum loss reduction to keep a split.
    pub gamma: f64,
}

impl Default for XGBoostParams {
    fn default() -> Self {
        XGBoostParams {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
        }
    }
}

/// Second-order gradient boosting with exact greedy splits.
///
/// Every split learns a default direction for missing values from the rows
/// that are missing at that node. Input must be numeric; categorical columns
/// have to be encoded by the caller.
pub struct XGBoostModel {
    params: XGBoostParams,
    problem: Problem,
    ensemble: Option<TreeEnsemble>,
    training: Option<Array2<f64>>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    missing_left: bool,
    gain: f64,
}

/// Gradient statistics for one boosting round of one output.
struct RoundContext<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a XGBoostParams,
}

impl RoundContext<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    fn weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.reg_lambda) * self.params.learning_rate
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]))
    }

    fn grow(
        &self,
        rows: Vec<usize>,
        depth: usize,
        tree: &mut Tree,
        row_values: &mut [f64],
        rng: &mut StdRng,
    ) -> usize {
        let (g, h) = self.sums(&rows);
        let split = if depth >= self.params.max_depth
            || rows.len() < 2
            || h < self.params.min_child_weight
        {
            None
        } else {
            self.find_split(&rows, g, h, rng)
        };

        let Some(split) = split else {
            let w = self.weight(g, h);
            for &i in &rows {
                row_values[i] = w;
            }
            return tree.push(Node::Leaf {
                values: vec![w],
                cover: rows.len() as f64,
            });
        };

        let n = rows.len();
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&i| {
            goes_left(self.x[[i, split.feature]], split.threshold, split.missing_left)
        });

        let idx = tree.reserve();
        let left = self.grow(left_rows, depth + 1, tree, row_values, rng);
        let right = self.grow(right_rows, depth + 1, tree, row_values, rng);
        tree.set(
            idx,
            Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                missing_left: split.missing_left,
                left,
                right,
                cover: n as f64,
                gain: split.gain,
            },
        );
        idx
    }

    /// Features are visited in a fresh random order at every node; on equal
    /// gain the first one visited wins, so identical columns share splits.
    fn find_split(
        &self,
        rows: &[usize],
        g: f64,
        h: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..self.x.ncols()).collect();
        order.shuffle(rng);
        let candidates: Vec<SplitCandidate> = order
            .into_par_iter()
            .filter_map(|feature| self.best_split_for_feature(rows, feature, g, h))
            .collect();

        let mut best: Option<SplitCandidate> = None;
        for candidate in candidates {
            if best.as_ref().map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_split_for_feature(
        &self,
        rows: &[usize],
        feature: usize,
        g: f64,
        h: f64,
    ) -> Option<SplitCandidate> {
        let (mut present, missing): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&i| !self.x[[i, feature]].is_nan());
        if present.len() < 2 {
            return None;
        }
        present.sort_by(|&a, &b| {
            self.x[[a, feature]]
                .partial_cmp(&self.x[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let (g_missing, h_missing) = self.sums(&missing);
        let parent = self.score(g, h);
        let mcw = self.params.min_child_weight;

        let mut best: Option<SplitCandidate> = None;
        let mut gl = 0.0;
        let mut hl = 0.0;
        for pos in 0..present.len() - 1 {
            let i = present[pos];
            gl += self.grad[i];
            hl += self.hess[i];
            let value = self.x[[i, feature]];
            let next = self.x[[present[pos + 1], feature]];
            if next <= value {
                continue;
            }

            let directions: &[bool] = if missing.is_empty() { &[false] } else { &[false, true] };
            for &missing_left in directions {
                let (gl_dir, hl_dir) = if missing_left {
                    (gl + g_missing, hl + h_missing)
                } else {
                    (gl, hl)
                };
                let (gr_dir, hr_dir) = (g - gl_dir, h - hl_dir);
                if hl_dir < mcw || hr_dir < mcw {
                    continue;
                }
                let gain = 0.5 * (self.score(gl_dir, hl_dir) + self.score(gr_dir, hr_dir) - parent)
                    - self.params.gamma;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = value / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        missing_left,
                        gain,
                    });
                }
            }
        }
        best
    }
}

impl XGBoostModel {
    pub fn new(params: XGBoostParams, problem: Problem) -> Self {
        XGBoostModel {
            params,
            problem,
            ensemble: None,
            training: None,
        }
    }
}

impl FeatureModel for XGBoostModel {
    /// `seed` only orders the split search, which decides ties between columns.
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], seed: u64) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(ModelError::InvalidInput(
                "n_estimators must be positive".to_string(),
            ));
        }
        let data = x.to_array()?;
        let targets = boosting_targets(self.problem, y)?;
        let objective = Objective::for_problem(self.problem);
        let n_samples = data.nrows();
        let n_outputs = targets.len();

        let base_score: Vec<f64> = targets.iter().map(|t| objective.base_score(t)).collect();
        let mut margins: Vec<Vec<f64>> = base_score.iter().map(|&b| vec![b; n_samples]).collect();
        let mut grad = vec![0.0; n_samples];
        let mut hess = vec![0.0; n_samples];
        let mut row_values = vec![0.0; n_samples];
        let mut trees = Vec::with_capacity(self.params.n_estimators * n_outputs);
        let mut rng = StdRng::seed_from_u64(seed);

        for round in 0..self.params.n_estimators {
            for (k, target) in targets.iter().enumerate() {
                objective.gradients(target, &margins[k], &mut grad, &mut hess);
                let ctx = RoundContext {
                    x: &data,
                    grad: &grad,
                    hess: &hess,
                    params: &self.params,
                };
                let mut tree = Tree::new(k);
                ctx.grow((0..n_samples).collect(), 0, &mut tree, &mut row_values, &mut rng);
                for (m, v) in margins[k].iter_mut().zip(&row_values) {
                    *m += v;
                }
                trees.push(tree);
            }
            log::trace!("Boosting round {} done", round);
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

    /// Raw margins, one column per boosted output.
    fn predict(&self, x: &FeatureMatrix) -> Result<Array2<f64>, ModelError> {
        let ensemble = self.ensemble()?;
        let data = prediction_matrix(x, ensemble.n_features())?;
        Ok(ensemble.predict(&data))
    }

    /// Total gain of the splits made on each feature.
    fn feature_importances(&self) -> Result<Vec<f64>, ModelError> {
        Ok(self.ensemble()?.split_gains(false))
    }

    fn ensemble(&self) -> Result<&TreeEnsemble, ModelError> {
        self.ensemble.as_ref().ok_or(ModelError::NotFitted)
    }

    fn training_matrix(&self) -> Result<&Array2<f64>, ModelError> {
        self.training.as_ref().ok_or(ModelError::NotFitted)
    }

    fn name(&self) -> &str {
        "xgboost"
    }
}
