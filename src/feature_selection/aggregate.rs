//! Cross-fit aggregation and the keep/drop decision.
//!
//! Policy:
//! 1. every fit's record is normalised to sum to one;
//! 2. the probe baseline of a fit is its largest probe score;
//! 3. feature scores and baselines are reduced over fits with the
//!    configured [`Reduction`];
//! 4. a feature is kept iff its score is strictly greater than the
//!    baseline plus the margin. Ties drop.
use statrs::statistics::{Data, Median, Statistics};

use crate::config::Reduction;
use crate::importance::ImportanceRecord;

/// Reduced importance per real feature plus the reduced probe baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedImportance {
    features: Vec<(String, f64)>,
    baseline: f64,
}

impl AggregatedImportance {
    pub fn new(features: Vec<(String, f64)>, baseline: f64) -> Self {
        AggregatedImportance { features, baseline }
    }

    /// Feature scores in fitted-column order.
    pub fn features(&self) -> &[(String, f64)] {
        &self.features
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.features.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }
}

/// Keep/drop decision per real feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    decisions: Vec<(String, bool)>,
}

impl SelectionResult {
    pub fn decisions(&self) -> &[(String, bool)] {
        &self.decisions
    }

    pub fn is_selected(&self, name: &str) -> Option<bool> {
        self.decisions.iter().find(|(n, _)| n == name).map(|(_, keep)| *keep)
    }

    /// Retained feature names in fitted-column order.
    pub fn selected(&self) -> Vec<&str> {
        self.decisions
            .iter()
            .filter(|(_, keep)| *keep)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Boolean mask in fitted-column order.
    pub fn support(&self) -> Vec<bool> {
        self.decisions.iter().map(|(_, keep)| *keep).collect()
    }

    pub fn n_selected(&self) -> usize {
        self.decisions.iter().filter(|(_, keep)| *keep).count()
    }
}

fn reduce(values: Vec<f64>, reduction: Reduction) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match reduction {
        Reduction::Mean => values.iter().mean(),
        Reduction::Median => Data::new(values).median(),
    }
}

/// Combine per-fit records into one score per feature and a baseline.
///
/// # Parameters
///
/// * `records` - One record per fit, all over the same columns.
/// * `reduction` - Central tendency applied across fits.
///
/// # Returns
///
/// The reduced normalised score of every real feature (in the column order
/// of the first record) and the reduced per-fit probe maximum.
pub fn aggregate(records: &[ImportanceRecord], reduction: Reduction) -> AggregatedImportance {
    let normalized: Vec<ImportanceRecord> =
        records.iter().map(ImportanceRecord::normalized).collect();
    let Some(first) = normalized.first() else {
        return AggregatedImportance::new(Vec::new(), 0.0);
    };

    let features = first
        .features()
        .iter()
        .enumerate()
        .map(|(i, (name, _))| {
            let per_fit: Vec<f64> = normalized.iter().map(|r| r.features()[i].1).collect();
            (name.clone(), reduce(per_fit, reduction))
        })
        .collect();
    let baselines: Vec<f64> = normalized.iter().map(ImportanceRecord::probe_max).collect();

    AggregatedImportance::new(features, reduce(baselines, reduction))
}

/// Keep every feature whose score beats `baseline + margin`.
pub fn decide(importance: &AggregatedImportance, margin: f64) -> SelectionResult {
    let threshold = importance.baseline() + margin;
    SelectionResult {
        decisions: importance
            .features()
            .iter()
            .map(|(name, score)| (name.clone(), *score > threshold))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(scores: &[f64]) -> ImportanceRecord {
        let names: Vec<String> =
            ["a", "b", "c", "__probe_0"].iter().map(|s| s.to_string()).collect();
        ImportanceRecord::from_scores(&names, scores, 3).unwrap()
    }

    #[test]
    fn mean_aggregation_against_max_probe() {
        let records = vec![record(&[4.0, 2.0, 2.0, 2.0]), record(&[6.0, 0.0, 3.0, 1.0])];
        let agg = aggregate(&records, Reduction::Mean);
        // Normalised: [0.4, 0.2, 0.2, 0.2] and [0.6, 0.0, 0.3, 0.1].
        assert!((agg.score("a").unwrap() - 0.5).abs() < 1e-12);
        assert!((agg.baseline() - 0.15).abs() < 1e-12);

        let selection = decide(&agg, 0.0);
        assert_eq!(selection.selected(), vec!["a", "c"]);
        assert_eq!(selection.support(), vec![true, false, true]);
    }

    #[test]
    fn raw_records_are_rescaled_before_reduction() {
        // Same shares, totals of 10 and 1000: the large fit must not dominate.
        let small = record(&[4.0, 2.0, 2.0, 2.0]);
        let large = record(&[400.0, 200.0, 200.0, 200.0]);
        let agg = aggregate(&[small.clone(), large], Reduction::Mean);
        let single = aggregate(&[small], Reduction::Mean);
        for ((_, a), (_, b)) in agg.features().iter().zip(single.features()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((agg.baseline() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn ties_drop() {
        let agg = aggregate(&[record(&[1.0, 1.0, 0.0, 1.0])], Reduction::Mean);
        let selection = decide(&agg, 0.0);
        assert_eq!(selection.is_selected("a"), Some(false));
        assert_eq!(selection.n_selected(), 0);
    }

    #[test]
    fn margin_raises_the_bar() {
        let agg = aggregate(&[record(&[5.0, 3.0, 0.0, 2.0])], Reduction::Mean);
        assert_eq!(decide(&agg, 0.0).selected(), vec!["a", "b"]);
        assert_eq!(decide(&agg, 0.2).selected(), vec!["a"]);
    }

    #[test]
    fn median_ignores_a_single_outlier_fit() {
        let records = vec![
            record(&[1.0, 0.0, 0.0, 1.0]),
            record(&[1.0, 0.0, 0.0, 1.0]),
            record(&[1.0, 0.0, 0.0, 0.0]),
        ];
        let mean = aggregate(&records, Reduction::Mean);
        let median = aggregate(&records, Reduction::Median);
        assert!(decide(&mean, 0.0).is_selected("a").unwrap());
        assert!(!decide(&median, 0.0).is_selected("a").unwrap());
        assert_eq!(median.baseline(), 0.5);
    }
}
