//! Selector scenarios on the Titanic-style sample table.
mod common;

use hisoka::config::SelectorConfig;
use hisoka::error::SelectorError;
use hisoka::feature_selection::random_probe::RandomFeatureSelector;

const MODELS: [&str; 3] = ["catboost", "xgboost", "random_forest"];
const IMPORTANCE_METHODS: [&str; 2] = ["shap", "embedded"];
const RAND_VAR_TYPES: [&str; 2] = ["float", "integer"];
const PROBLEMS: [&str; 2] = ["regression", "classification"];

/// Every option combination, each with `Sex` declared categorical and three fits.
fn selectors() -> Vec<RandomFeatureSelector> {
    let mut selectors = Vec::new();
    for model in MODELS {
        for importance in IMPORTANCE_METHODS {
            for rand_var_type in RAND_VAR_TYPES {
                for problem in PROBLEMS {
                    let config = SelectorConfig::new(model, importance, rand_var_type, problem)
                        .with_categorical_columns(common::CATEGORICAL)
                        .with_number_of_fits(3)
                        .with_seed(2024)
                        .with_model_params(common::small_params());
                    selectors.push(RandomFeatureSelector::new(config));
                }
            }
        }
    }
    selectors
}

fn selectors_for(model: &str) -> Vec<RandomFeatureSelector> {
    selectors()
        .into_iter()
        .filter(|s| s.config().model == model)
        .collect()
}

#[test]
fn option_grid_has_24_combinations() {
    assert_eq!(selectors().len(), 24);
}

#[test]
fn random_forest_fit_with_nans_should_fail() {
    common::init_logging();
    let (x, y) = common::load_encoded().unwrap();
    let selectors = selectors_for("random_forest");
    assert_eq!(selectors.len(), 8);
    for mut selector in selectors {
        let err = selector.fit_transform(&x, &y).unwrap_err();
        assert!(matches!(err, SelectorError::DataValidation(_)));
        assert!(err.to_string().contains("NaN"), "unexpected message: {}", err);
        assert!(!selector.is_fitted());
    }
}

#[test]
fn xgboost_fit_with_categorical_column_should_fail() {
    common::init_logging();
    let (x, y) = common::load_raw().unwrap();
    for mut selector in selectors_for("xgboost") {
        let err = selector.fit_transform(&x, &y).unwrap_err();
        assert!(err.to_string().contains(common::CATEGORICAL[0]), "unexpected message: {}", err);
    }
}

#[test]
fn fit_transform_returns_table_for_every_combination() {
    common::init_logging();
    let (x, y) = common::load_imputed().unwrap();
    for mut selector in selectors() {
        let output = selector
            .fit_transform(&x, &y)
            .unwrap_or_else(|e| panic!("{:?} failed: {}", selector.config(), e));
        assert_eq!(output.nrows(), x.nrows());
        assert!(output.ncols() <= x.ncols());
        for name in output.column_names() {
            assert!(x.column(name).is_some());
        }
    }
}

#[test]
fn catboost_handles_raw_sex_and_missing_age() {
    common::init_logging();
    let (x, y) = common::load_raw().unwrap();
    let config = SelectorConfig::new("catboost", "embedded", "float", "classification")
        .with_categorical_columns(["Sex", "Cabin"])
        .with_number_of_fits(3)
        .with_seed(7)
        .with_model_params(common::small_params());
    let mut selector = RandomFeatureSelector::new(config);
    let output = selector.fit_transform(&x, &y).unwrap();

    assert_eq!(output.nrows(), x.nrows());
    let selected = selector.selected_features().unwrap();
    assert!(selected.contains(&"Sex"), "selected: {:?}", selected);
    assert_eq!(selector.support().unwrap().len(), x.ncols());
}
