//! Losses for the gradient-boosted families.
use crate::config::Problem;

/// Smallest hessian a row contributes, keeps leaf weights finite.
const MIN_HESSIAN: f64 = 1e-16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Binary log-loss on raw margins.
    Logistic,
    SquaredError,
}

impl Objective {
    pub fn for_problem(problem: Problem) -> Self {
        match problem {
            Problem::Classification => Objective::Logistic,
            Problem::Regression => Objective::SquaredError,
        }
    }

    /// Initial margin: log-odds of the positive rate, or the target mean.
    pub fn base_score(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        match self {
            Objective::Logistic => {
                let p = mean.clamp(1e-6, 1.0 - 1e-6);
                (p / (1.0 - p)).ln()
            }
            Objective::SquaredError => mean,
        }
    }

    /// First and second derivatives of the loss at the current margins.
    pub fn gradients(&self, y: &[f64], margins: &[f64], grad: &mut [f64], hess: &mut [f64]) {
        match self {
            Objective::Logistic => {
                for i in 0..y.len() {
                    let p = sigmoid(margins[i]);
                    grad[i] = p - y[i];
                    hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
                }
            }
            Objective::SquaredError => {
                for i in 0..y.len() {
                    grad[i] = margins[i] - y[i];
                    hess[i] = 1.0;
                }
            }
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
