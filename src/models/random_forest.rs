use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::Problem;
use crate::data_handling::FeatureMatrix;
use crate::error::ModelError;
use crate::models::cart::{self, CartParams, Criterion};
use crate::models::model_trait::{check_training_input, prediction_matrix, FeatureModel};
use crate::models::tree::{Tree, TreeEnsemble};
use crate::models::utils::ClassLabels;

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        RandomForestParams {
            n_estimators: 100,
            max_depth: None,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

/// Bagged CART trees.
///
/// Classification forests output class probabilities (one slot per class),
/// regression forests the mean target. Missing values and unencoded
/// categoricals are rejected.
pub struct RandomForestModel {
    params: RandomForestParams,
    problem: Problem,
    ensemble: Option<TreeEnsemble>,
    training: Option<Array2<f64>>,
}

impl RandomForestModel {
    pub fn new(params: RandomForestParams, problem: Problem) -> Self {
        RandomForestModel {
            params,
            problem,
            ensemble: None,
            training: None,
        }
    }
}

impl FeatureModel for RandomForestModel {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], seed: u64) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(ModelError::InvalidInput(
                "n_estimators must be positive".to_string(),
            ));
        }
        if let Some(column) = x.columns().iter().find(|c| c.missing_count() > 0) {
            return Err(ModelError::InvalidInput(format!(
                "random forest cannot handle NaN values (column '{}')",
                column.name
            )));
        }
        let data = x.to_array()?;
        let n_samples = data.nrows();
        let n_features = data.ncols();

        let (targets, criterion, n_outputs) = match self.problem {
            Problem::Classification => {
                let labels = ClassLabels::fit(y)?;
                let targets: Vec<f64> = labels.indices().iter().map(|&c| c as f64).collect();
                let n_classes = labels.n_classes();
                (targets, Criterion::Gini { n_classes }, n_classes)
            }
            Problem::Regression => {
                if y.iter().any(|v| !v.is_finite()) {
                    return Err(ModelError::InvalidInput(
                        "regression target contains non-finite values".to_string(),
                    ));
                }
                (y.to_vec(), Criterion::Mse, 1)
            }
        };

        let max_features = match self.problem {
            Problem::Classification => ((n_features as f64).sqrt().ceil() as usize).max(1),
            Problem::Regression => n_features,
        };
        let cart_params = CartParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: self.params.min_samples_leaf.max(1),
            max_features,
            criterion,
        };

        // Seeds are drawn up front so the parallel build is reproducible.
        let mut rng = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| rng.gen()).collect();
        let bootstrap = self.params.bootstrap;

        let trees: Vec<Tree> = tree_seeds
            .par_iter()
            .map(|&tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let sample: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                cart::grow_tree(&data, &targets, &sample, &cart_params, &mut rng)
            })
            .collect();

        let scale = 1.0 / trees.len() as f64;
        log::trace!(
            "Grew {} trees on {} rows x {} columns",
            trees.len(),
            n_samples,
            n_features
        );
        self.ensemble = Some(TreeEnsemble::new(
            trees,
            n_features,
            n_outputs,
            scale,
            vec![0.0; n_outputs],
        ));
        self.training = Some(data);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Array2<f64>, ModelError> {
        let ensemble = self.ensemble()?;
        let data = prediction_matrix(x, ensemble.n_features())?;
        Ok(ensemble.predict(&data))
    }

    /// Mean decrease in impurity, normalised to sum to one.
    fn feature_importances(&self) -> Result<Vec<f64>, ModelError> {
        let mut importances = self.ensemble()?.split_gains(true);
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
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
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::Column;

    fn threshold_table() -> (FeatureMatrix, Vec<f64>) {
        let signal: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        let constant = vec![1.0; 40];
        let y: Vec<f64> = signal.iter().map(|&v| if v > 0.5 { 1.0 } else { 0.0 }).collect();
        let x = FeatureMatrix::new(vec![
            Column::numeric("signal", signal),
            Column::numeric("constant", constant),
        ])
        .unwrap();
        (x, y)
    }

    #[test]
    fn forest_learns_a_threshold() {
        let (x, y) = threshold_table();
        let mut forest = RandomForestModel::new(
            RandomForestParams {
                n_estimators: 10,
                ..Default::default()
            },
            Problem::Classification,
        );
        forest.fit(&x, &y, 42).unwrap();

        let proba = forest.predict(&x).unwrap();
        assert_eq!(proba.shape(), &[40, 2]);
        let correct = (0..40)
            .filter(|&i| (proba[[i, 1]] > 0.5) == (y[i] == 1.0))
            .count();
        assert!(correct >= 36, "only {} of 40 correct", correct);

        let importances = forest.feature_importances().unwrap();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn forest_rejects_missing_values() {
        let x = FeatureMatrix::new(vec![Column::numeric("Age", vec![1.0, f64::NAN, 3.0])]).unwrap();
        let mut forest = RandomForestModel::new(RandomForestParams::default(), Problem::Regression);
        let err = forest.fit(&x, &[1.0, 2.0, 3.0], 0).unwrap_err();
        assert!(err.to_string().contains("NaN"));
        assert!(err.to_string().contains("Age"));
    }

    #[test]
    fn same_seed_gives_same_forest() {
        let (x, y) = threshold_table();
        let params = RandomForestParams {
            n_estimators: 5,
            ..Default::default()
        };
        let mut a = RandomForestModel::new(params.clone(), Problem::Regression);
        let mut b = RandomForestModel::new(params, Problem::Regression);
        a.fit(&x, &y, 9).unwrap();
        b.fit(&x, &y, 9).unwrap();
        assert_eq!(a.ensemble().unwrap(), b.ensemble().unwrap());
    }

    #[test]
    fn unfitted_forest_reports_not_fitted() {
        let forest = RandomForestModel::new(RandomForestParams::default(), Problem::Regression);
        assert_eq!(forest.feature_importances().unwrap_err(), ModelError::NotFitted);
    }
}
