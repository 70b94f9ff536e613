//! The random-probe selector.
//!
//! Each fit appends freshly drawn probe columns to the table, trains a new
//! model of the configured family and records how important every column
//! was. Real features that beat the strongest probe across the repeated
//! fits are kept.
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SelectorConfig;
use crate::data_handling::FeatureMatrix;
use crate::error::{Result, SelectorError};
use crate::feature_selection::aggregate::{
    aggregate, decide, AggregatedImportance, SelectionResult,
};
use crate::feature_selection::probe::{draw_probes, probe_names};
use crate::feature_selection::validation::check_input;
use crate::importance::{extract_importances, ImportanceRecord};
use crate::models::factory::build_model;

#[derive(Debug, Clone)]
struct FittedState {
    importance: AggregatedImportance,
    selection: SelectionResult,
}

/// Selects features whose importance beats randomly generated probes.
///
/// # Example
///
/// ```rust
/// use hisoka::config::SelectorConfig;
/// use hisoka::data_handling::{Column, FeatureMatrix};
/// use hisoka::feature_selection::random_probe::RandomFeatureSelector;
///
/// let signal: Vec<f64> = (0..60).map(|i| (i % 2) as f64).collect();
/// let x = FeatureMatrix::new(vec![Column::numeric("signal", signal.clone())]).unwrap();
///
/// let config = SelectorConfig::default().with_number_of_fits(2).with_seed(7);
/// let mut selector = RandomFeatureSelector::new(config);
/// let reduced = selector.fit_transform(&x, &signal).unwrap();
/// assert_eq!(reduced.nrows(), 60);
/// ```
#[derive(Debug, Clone)]
pub struct RandomFeatureSelector {
    config: SelectorConfig,
    state: Option<FittedState>,
}

impl RandomFeatureSelector {
    /// Never fails; options are checked on [`fit`](Self::fit).
    pub fn new(config: SelectorConfig) -> Self {
        RandomFeatureSelector { config, state: None }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Fit using the configured seed, or OS entropy when none is set.
    pub fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<()> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.fit_with_rng(x, y, &mut rng)
    }

    /// Fit drawing every probe and model seed from `rng`.
    ///
    /// State is only replaced when the whole procedure succeeds; on error
    /// the previous fit (if any) stays in place.
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &mut self,
        x: &FeatureMatrix,
        y: &[f64],
        rng: &mut R,
    ) -> Result<()> {
        let config = self.config.validate()?;
        let categorical: Vec<String> =
            check_input(&config, &self.config.categorical_columns, x, y)?;

        let feature_names: Vec<String> =
            x.column_names().into_iter().map(String::from).collect();
        let probes = probe_names(&feature_names, config.n_probes);
        let all_names: Vec<String> = feature_names.iter().chain(&probes).cloned().collect();

        info!(
            "Fitting random-probe selector: model={}, importance={}, problem={}, \
             {} fits, {} features, {} probes",
            config.model,
            config.importance_method,
            config.problem,
            config.number_of_fits,
            feature_names.len(),
            probes.len()
        );

        let mut records = Vec::with_capacity(config.number_of_fits);
        for iteration in 0..config.number_of_fits {
            let probe_columns = draw_probes(rng, &probes, x.nrows(), config.rand_var_type);
            let augmented = x.with_appended(probe_columns)?;
            let seed: u64 = rng.gen();

            let mut model = build_model(
                config.model,
                config.problem,
                &self.config.model_params,
                &categorical,
            );
            model.fit(&augmented, y, seed)?;
            let scores = extract_importances(config.importance_method, &*model)?;
            let record = ImportanceRecord::from_scores(&all_names, &scores, feature_names.len())?;

            let shares = record.normalized();
            let top = shares
                .features()
                .iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            debug!(
                "Fit {}/{}: probe baseline {:.4}, top feature {:?}",
                iteration + 1,
                config.number_of_fits,
                shares.probe_max(),
                top
            );
            records.push(record);
        }

        let importance = aggregate(&records, config.aggregation);
        let selection = decide(&importance, config.margin);
        info!(
            "Kept {} of {} features (probe baseline {:.4})",
            selection.n_selected(),
            feature_names.len(),
            importance.baseline()
        );
        if selection.n_selected() == 0 {
            warn!("No feature beat the probe baseline; transform will return no columns");
        }

        self.state = Some(FittedState { importance, selection });
        Ok(())
    }

    /// [`fit`](Self::fit) followed by [`transform`](Self::transform) on the same table.
    pub fn fit_transform(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<FeatureMatrix> {
        self.fit(x, y)?;
        self.transform(x)
    }

    /// Project `x` onto the retained features, keeping row count and the
    /// fitted column order.
    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        let state = self.state.as_ref().ok_or_else(|| {
            SelectorError::State(
                "This RandomFeatureSelector instance is not fitted yet. \
                 Call 'fit' before 'transform'."
                    .to_string(),
            )
        })?;
        x.select(&state.selection.selected())
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    pub fn selection(&self) -> Option<&SelectionResult> {
        self.state.as_ref().map(|s| &s.selection)
    }

    pub fn aggregated_importance(&self) -> Option<&AggregatedImportance> {
        self.state.as_ref().map(|s| &s.importance)
    }

    pub fn selected_features(&self) -> Option<Vec<&str>> {
        self.selection().map(SelectionResult::selected)
    }

    pub fn support(&self) -> Option<Vec<bool>> {
        self.selection().map(SelectionResult::support)
    }
}
