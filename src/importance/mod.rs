//! Per-fit importance extraction.
pub mod shap;

use crate::config::ImportanceMethod;
use crate::error::ModelError;
use crate::models::model_trait::FeatureModel;
use crate::importance::shap::TreeExplainer;

/// Importance of every column of one augmented fit, split into real
/// features and probes. Scores are only comparable within one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceRecord {
    features: Vec<(String, f64)>,
    probes: Vec<(String, f64)>,
}

impl ImportanceRecord {
    /// Pair `scores` with `names`; the first `n_features` entries are real
    /// features, the rest probes.
    pub fn from_scores(
        names: &[String],
        scores: &[f64],
        n_features: usize,
    ) -> Result<Self, ModelError> {
        if names.len() != scores.len() || n_features > names.len() {
            return Err(ModelError::Training(format!(
                "model returned {} importances for {} columns",
                scores.len(),
                names.len()
            )));
        }
        if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
            return Err(ModelError::Training(format!(
                "non-finite importance for column '{}'",
                names[pos]
            )));
        }
        let pairs: Vec<(String, f64)> = names
            .iter()
            .cloned()
            .zip(scores.iter().map(|s| s.max(0.0)))
            .collect();
        let mut features = pairs;
        let probes = features.split_off(n_features);
        Ok(ImportanceRecord { features, probes })
    }

    pub fn features(&self) -> &[(String, f64)] {
        &self.features
    }

    pub fn probes(&self) -> &[(String, f64)] {
        &self.probes
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.features
            .iter()
            .chain(&self.probes)
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
    }

    pub fn total(&self) -> f64 {
        self.features.iter().chain(&self.probes).map(|(_, s)| s).sum()
    }

    /// Scores rescaled to sum to one. An all-zero record stays all-zero.
    pub fn normalized(&self) -> ImportanceRecord {
        let total = self.total();
        let scale = |pairs: &[(String, f64)]| -> Vec<(String, f64)> {
            pairs
                .iter()
                .map(|(n, s)| (n.clone(), if total > 0.0 { s / total } else { 0.0 }))
                .collect()
        };
        ImportanceRecord {
            features: scale(self.features.as_slice()),
            probes: scale(self.probes.as_slice()),
        }
    }

    /// Largest probe score, the noise floor of this fit.
    pub fn probe_max(&self) -> f64 {
        self.probes.iter().map(|(_, s)| *s).fold(0.0, f64::max)
    }
}

/// One raw importance score per training column of a fitted model.
pub fn extract_importances(
    method: ImportanceMethod,
    model: &dyn FeatureModel,
) -> Result<Vec<f64>, ModelError> {
    match method {
        ImportanceMethod::Embedded => model.feature_importances(),
        ImportanceMethod::Shap => {
            let explainer = TreeExplainer::new(model.ensemble()?);
            let shap = explainer.shap_values(model.training_matrix()?)?;
            Ok(shap.mean_abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        ["Age", "Fare", "__probe_0"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_features_from_probes() {
        let record = ImportanceRecord::from_scores(&names(), &[2.0, 1.0, 1.0], 2).unwrap();
        assert_eq!(record.features().len(), 2);
        assert_eq!(record.probes().len(), 1);
        assert_eq!(record.score("__probe_0"), Some(1.0));

        let normalized = record.normalized();
        assert_eq!(normalized.score("Age"), Some(0.5));
        assert_eq!(normalized.probe_max(), 0.25);
    }

    #[test]
    fn zero_record_stays_zero() {
        let record = ImportanceRecord::from_scores(&names(), &[0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(record.normalized().total(), 0.0);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(ImportanceRecord::from_scores(&names(), &[1.0], 2).is_err());
        assert!(ImportanceRecord::from_scores(&names(), &[1.0, f64::NAN, 0.0], 2).is_err());
    }
}
