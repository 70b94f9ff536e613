use crate::config::Problem;
use crate::error::ModelError;

/// Mapping from raw classification labels to dense class indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabels {
    classes: Vec<f64>,
    indices: Vec<usize>,
}

impl ClassLabels {
    /// Sort the distinct labels ascending and index every row into them.
    pub fn fit(y: &[f64]) -> Result<Self, ModelError> {
        if let Some(pos) = y.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::InvalidInput(format!(
                "target contains a non-finite label at row {}",
                pos
            )));
        }
        let mut classes = y.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        if classes.len() < 2 {
            return Err(ModelError::InvalidInput(
                "classification target must contain at least two classes".to_string(),
            ));
        }
        let indices = y
            .iter()
            .map(|v| classes.partition_point(|c| c < v))
            .collect();
        Ok(ClassLabels { classes, indices })
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// Per-output regression targets for the boosters.
///
/// Binary classification trains one logistic output on "is the larger class",
/// multi-class trains one-vs-rest outputs, regression trains the raw target.
pub fn boosting_targets(problem: Problem, y: &[f64]) -> Result<Vec<Vec<f64>>, ModelError> {
    match problem {
        Problem::Regression => {
            if y.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::InvalidInput(
                    "regression target contains non-finite values".to_string(),
                ));
            }
            Ok(vec![y.to_vec()])
        }
        Problem::Classification => {
            let labels = ClassLabels::fit(y)?;
            let one_vs_rest = |class: usize| -> Vec<f64> {
                labels
                    .indices()
                    .iter()
                    .map(|&c| if c == class { 1.0 } else { 0.0 })
                    .collect()
            };
            if labels.n_classes() == 2 {
                Ok(vec![one_vs_rest(1)])
            } else {
                Ok((0..labels.n_classes()).map(one_vs_rest).collect())
            }
        }
    }
}
