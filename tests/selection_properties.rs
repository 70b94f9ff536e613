//! Behavioural properties of the selector: reproducibility, the keep/drop
//! policy on synthetic signal, and state handling.
mod common;

use hisoka::config::{ModelParams, Reduction, SelectorConfig};
use hisoka::data_handling::{Column, FeatureMatrix};
use hisoka::error::SelectorError;
use hisoka::feature_selection::random_probe::RandomFeatureSelector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `signal` decides the target, `duplicate` copies it, `noise` is drawn
/// like a float probe.
fn synthetic(seed: u64, n: usize) -> (FeatureMatrix, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let signal: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let noise: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let y: Vec<f64> = signal.iter().map(|&v| if v > 0.5 { 1.0 } else { 0.0 }).collect();
    let x = FeatureMatrix::new(vec![
        Column::numeric("signal", signal.clone()),
        Column::numeric("noise", noise),
        Column::numeric("duplicate", signal),
    ])
    .unwrap();
    (x, y)
}

fn synthetic_config(model: &str, importance: &str, seed: u64) -> SelectorConfig {
    SelectorConfig::new(model, importance, "float", "classification")
        .with_n_probes(5)
        .with_number_of_fits(5)
        .with_seed(seed)
        .with_model_params(ModelParams {
            n_estimators: Some(50),
            max_depth: Some(6),
            ..Default::default()
        })
}

fn forest_config(seed: u64) -> SelectorConfig {
    synthetic_config("random_forest", "embedded", seed)
}

// ---------------------------------------------------------------------------
// Reproducibility
// ---------------------------------------------------------------------------

#[test]
fn fit_transform_is_idempotent_under_a_seed() {
    common::init_logging();
    let (x, y) = common::load_imputed().unwrap();
    let config = SelectorConfig::new("xgboost", "embedded", "integer", "classification")
        .with_number_of_fits(3)
        .with_seed(99)
        .with_model_params(common::small_params());
    let mut selector = RandomFeatureSelector::new(config);
    let first = selector.fit_transform(&x, &y).unwrap();
    let second = selector.fit_transform(&x, &y).unwrap();
    assert_eq!(first.column_names(), second.column_names());
}

#[test]
fn identical_streams_give_identical_results() {
    common::init_logging();
    let (x, y) = common::load_imputed().unwrap();
    for model in ["random_forest", "xgboost", "catboost"] {
        let config = SelectorConfig::new(model, "shap", "float", "regression")
            .with_categorical_columns(["Sex"])
            .with_number_of_fits(2)
            .with_model_params(common::small_params());
        let mut a = RandomFeatureSelector::new(config.clone());
        let mut b = RandomFeatureSelector::new(config);
        a.fit_with_rng(&x, &y, &mut StdRng::seed_from_u64(17)).unwrap();
        b.fit_with_rng(&x, &y, &mut StdRng::seed_from_u64(17)).unwrap();
        assert_eq!(a.selection(), b.selection(), "{}", model);
        assert_eq!(a.aggregated_importance(), b.aggregated_importance(), "{}", model);
    }
}

// ---------------------------------------------------------------------------
// Keep/drop policy
// ---------------------------------------------------------------------------

#[test]
fn duplicate_of_strong_predictor_is_kept_and_noise_dropped() {
    common::init_logging();
    for model in ["random_forest", "xgboost", "catboost"] {
        for importance in ["embedded", "shap"] {
            let mut noise_dropped = 0;
            for seed in 0..8 {
                let (x, y) = synthetic(seed, 200);
                let config = synthetic_config(model, importance, seed);
                let mut selector = RandomFeatureSelector::new(config);
                selector.fit(&x, &y).unwrap();
                let selection = selector.selection().unwrap();
                let label = format!("{}/{} seed {}", model, importance, seed);
                assert_eq!(selection.is_selected("signal"), Some(true), "{}", label);
                assert_eq!(selection.is_selected("duplicate"), Some(true), "{}", label);
                if selection.is_selected("noise") == Some(false) {
                    noise_dropped += 1;
                }
            }
            assert!(
                noise_dropped >= 5,
                "{}/{}: noise dropped in only {} of 8 runs",
                model,
                importance,
                noise_dropped
            );
        }
    }
}

#[test]
fn column_order_does_not_decide_which_copy_survives() {
    common::init_logging();
    let (x, y) = synthetic(3, 200);
    let reordered = x.select(&["duplicate", "noise", "signal"]).unwrap();
    for model in ["xgboost", "catboost"] {
        let mut selector = RandomFeatureSelector::new(synthetic_config(model, "embedded", 3));
        selector.fit(&reordered, &y).unwrap();
        let selection = selector.selection().unwrap();
        assert_eq!(selection.is_selected("signal"), Some(true), "{}", model);
        assert_eq!(selection.is_selected("duplicate"), Some(true), "{}", model);
    }
}

#[test]
fn regression_with_median_and_integer_probes() {
    common::init_logging();
    let mut rng = StdRng::seed_from_u64(5);
    let driver: Vec<f64> = (0..150).map(|_| rng.gen_range(0.0..10.0)).collect();
    let noise: Vec<f64> = (0..150).map(|_| rng.gen_range(0.0..10.0)).collect();
    let y: Vec<f64> = driver.iter().map(|v| 3.0 * v + rng.gen::<f64>()).collect();
    let x = FeatureMatrix::new(vec![
        Column::numeric("driver", driver),
        Column::numeric("noise", noise),
    ])
    .unwrap();

    let config = SelectorConfig::new("xgboost", "shap", "integer", "regression")
        .with_aggregation(Reduction::Median)
        .with_number_of_fits(3)
        .with_seed(1)
        .with_model_params(common::small_params());
    let mut selector = RandomFeatureSelector::new(config);
    let output = selector.fit_transform(&x, &y).unwrap();
    assert!(output.column("driver").is_some());
    let importance = selector.aggregated_importance().unwrap();
    assert!(importance.score("driver").unwrap() > importance.baseline());
}

// ---------------------------------------------------------------------------
// State handling
// ---------------------------------------------------------------------------

#[test]
fn transform_before_fit_fails() {
    let (x, _) = synthetic(0, 20);
    let selector = RandomFeatureSelector::new(SelectorConfig::default());
    let err = selector.transform(&x).unwrap_err();
    assert!(matches!(err, SelectorError::State(_)));
}

#[test]
fn transform_follows_fitted_column_order() {
    common::init_logging();
    let (x, y) = synthetic(3, 200);
    let mut selector = RandomFeatureSelector::new(forest_config(3));
    selector.fit(&x, &y).unwrap();

    let reordered = x.select(&["duplicate", "noise", "signal"]).unwrap();
    let output = selector.transform(&reordered).unwrap();
    let names = output.column_names();
    assert_eq!(names[0], "signal");
    assert_eq!(*names.last().unwrap(), "duplicate");

    let without_signal = x.select(&["noise", "duplicate"]).unwrap();
    let err = selector.transform(&without_signal).unwrap_err();
    assert!(matches!(err, SelectorError::DataValidation(_)));
    assert!(err.to_string().contains("signal"));
}

#[test]
fn failed_fit_keeps_previous_state() {
    common::init_logging();
    let (x, y) = synthetic(4, 200);
    let mut selector = RandomFeatureSelector::new(forest_config(4));
    selector.fit(&x, &y).unwrap();
    let before = selector.selection().cloned();

    let with_gap = FeatureMatrix::new(vec![Column::numeric(
        "signal",
        (0..200).map(|i| if i == 7 { f64::NAN } else { i as f64 }).collect(),
    )])
    .unwrap();
    let err = selector.fit(&with_gap, &y).unwrap_err();
    assert!(err.to_string().contains("NaN"));
    assert_eq!(selector.selection().cloned(), before);
}
