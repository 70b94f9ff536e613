use ndarray::Array2;

use crate::data_handling::FeatureMatrix;
use crate::error::ModelError;
use crate::models::tree::TreeEnsemble;

/// Contract between the selector and a model family.
///
/// An adapter is trained once per selection round on the augmented table
/// (real columns followed by probe columns) and then queried for per-column
/// importance: either its native split-based importance or, for SHAP, its
/// fitted ensemble and the encoded training rows it was fitted on.
pub trait FeatureModel: Send {
    /// Fit on `x`/`y`. `seed` drives every random choice the adapter makes.
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64], seed: u64) -> Result<(), ModelError>;

    /// Raw model output (probabilities for forests, margins for boosters),
    /// shape `(n_samples, n_outputs)`.
    fn predict(&self, x: &FeatureMatrix) -> Result<Array2<f64>, ModelError>;

    /// Native importance, one non-negative score per training column.
    fn feature_importances(&self) -> Result<Vec<f64>, ModelError>;

    /// The fitted trees, for attribution.
    fn ensemble(&self) -> Result<&TreeEnsemble, ModelError>;

    /// Training rows after the adapter's own encoding, for attribution.
    fn training_matrix(&self) -> Result<&Array2<f64>, ModelError>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "model"
    }
}

/// Shared input checks run by every adapter before training.
pub(crate) fn check_training_input(x: &FeatureMatrix, y: &[f64]) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::InvalidInput(
            "cannot fit on an empty feature matrix".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::InvalidInput(format!(
            "feature matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

/// Positional numeric view of `x`, checked against the training width.
pub(crate) fn prediction_matrix(
    x: &FeatureMatrix,
    n_features: usize,
) -> Result<Array2<f64>, ModelError> {
    if x.ncols() != n_features {
        return Err(ModelError::InvalidInput(format!(
            "expected {} columns, got {}",
            n_features,
            x.ncols()
        )));
    }
    x.to_array()
}
