//! Exact path-dependent TreeSHAP.
//!
//! Implements algorithm 2 of Lundberg et al. (2020), "From local explanations
//! to global understanding with explainable AI for trees". Node covers stand
//! in for the background distribution, so no reference data is needed.
use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;

use crate::error::ModelError;
use crate::models::tree::{goes_left, Node, Tree, TreeEnsemble};

/// SHAP values for a batch of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapValues {
    /// Shape `[n_samples, n_features, n_outputs]`.
    values: Array3<f64>,
    /// Expected model output per output slot.
    expected_value: Vec<f64>,
}

impl ShapValues {
    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn expected_value(&self) -> &[f64] {
        &self.expected_value
    }

    /// Mean absolute attribution per feature, summed over outputs.
    pub fn mean_abs(&self) -> Vec<f64> {
        let n_samples = self.values.len_of(Axis(0));
        if n_samples == 0 {
            return vec![0.0; self.values.len_of(Axis(1))];
        }
        self.values
            .mapv(f64::abs)
            .sum_axis(Axis(0))
            .sum_axis(Axis(1))
            .mapv(|v| v / n_samples as f64)
            .to_vec()
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let PathElement {
        zero_fraction,
        one_fraction,
        ..
    } = path[index];
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;
    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / denom;
        } else {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / denom);
        }
    }
    total
}

/// TreeSHAP over a fitted [`TreeEnsemble`].
pub struct TreeExplainer<'a> {
    ensemble: &'a TreeEnsemble,
    expected_value: Vec<f64>,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(ensemble: &'a TreeEnsemble) -> Self {
        let mut expected_value = ensemble.base_score().to_vec();
        expected_value.resize(ensemble.n_outputs(), 0.0);
        for tree in ensemble.trees() {
            let offset = tree.output_offset();
            let width = ensemble.n_outputs() - offset;
            for (k, v) in tree.expected_values(width).into_iter().enumerate() {
                expected_value[offset + k] += ensemble.scale() * v;
            }
        }
        TreeExplainer {
            ensemble,
            expected_value,
        }
    }

    pub fn expected_value(&self) -> &[f64] {
        &self.expected_value
    }

    /// Attributions for every row of `x`.
    ///
    /// For each row and output, the attributions plus the expected value
    /// equal the ensemble's raw output.
    pub fn shap_values(&self, x: &Array2<f64>) -> Result<ShapValues, ModelError> {
        let n_features = self.ensemble.n_features();
        let n_outputs = self.ensemble.n_outputs();
        if x.ncols() != n_features {
            return Err(ModelError::InvalidInput(format!(
                "explainer expects {} columns, got {}",
                n_features,
                x.ncols()
            )));
        }

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|r| {
                let row = x.row(r).to_vec();
                let mut phi = vec![0.0; n_features * n_outputs];
                for tree in self.ensemble.trees() {
                    if tree.nodes().is_empty() {
                        continue;
                    }
                    self.recurse(tree, &row, &mut phi, tree.root(), Vec::new(), 1.0, 1.0, None);
                }
                phi
            })
            .collect();

        let mut values = Array3::zeros((x.nrows(), n_features, n_outputs));
        for (r, phi) in rows.into_iter().enumerate() {
            for f in 0..n_features {
                for k in 0..n_outputs {
                    values[[r, f, k]] = phi[f * n_outputs + k];
                }
            }
        }
        Ok(ShapValues {
            values,
            expected_value: self.expected_value.clone(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &self,
        tree: &Tree,
        row: &[f64],
        phi: &mut [f64],
        node: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend_path(&mut path, zero_fraction, one_fraction, feature);
        let n_outputs = self.ensemble.n_outputs();

        match tree.node(node) {
            Node::Leaf { values, .. } => {
                for i in 1..path.len() {
                    let weight = unwound_path_sum(&path, i);
                    let element = path[i];
                    let Some(f) = element.feature else {
                        continue;
                    };
                    let contribution = weight * (element.one_fraction - element.zero_fraction);
                    for (k, v) in values.iter().enumerate() {
                        phi[f * n_outputs + tree.output_offset() + k] +=
                            contribution * v * self.ensemble.scale();
                    }
                }
            }
            Node::Split {
                feature: split_feature,
                threshold,
                missing_left,
                left,
                right,
                cover,
                ..
            } => {
                let (hot, cold) = if goes_left(row[*split_feature], *threshold, *missing_left) {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                let hot_zero_fraction = tree.node(hot).cover() / cover;
                let cold_zero_fraction = tree.node(cold).cover() / cover;

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = path.iter().position(|e| e.feature == Some(*split_feature)) {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                self.recurse(
                    tree,
                    row,
                    phi,
                    hot,
                    path.clone(),
                    hot_zero_fraction * incoming_zero,
                    incoming_one,
                    Some(*split_feature),
                );
                self.recurse(
                    tree,
                    row,
                    phi,
                    cold,
                    path,
                    cold_zero_fraction * incoming_zero,
                    0.0,
                    Some(*split_feature),
                );
            }
        }
    }
}
