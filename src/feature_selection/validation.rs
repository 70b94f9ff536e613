//! Data checks run after the configuration has been parsed.
use std::collections::BTreeSet;

use crate::config::ValidatedConfig;
use crate::data_handling::FeatureMatrix;
use crate::error::SelectorError;

/// Check `x`/`y` against the chosen model family.
///
/// Returns the declared categorical columns present in `x`, in table order.
/// Declared names missing from `x` are ignored with a warning.
pub fn check_input(
    config: &ValidatedConfig,
    categorical_columns: &BTreeSet<String>,
    x: &FeatureMatrix,
    y: &[f64],
) -> Result<Vec<String>, SelectorError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SelectorError::DataValidation(
            "Feature matrix must have at least one row and one column.".to_string(),
        ));
    }
    if y.len() != x.nrows() {
        return Err(SelectorError::DataValidation(format!(
            "Target has {} rows but the feature matrix has {}.",
            y.len(),
            x.nrows()
        )));
    }
    if y.iter().any(|v| v.is_nan()) {
        return Err(SelectorError::DataValidation(
            "Target contains NaN values.".to_string(),
        ));
    }

    for name in categorical_columns {
        if x.column(name).is_none() {
            log::warn!("Categorical column '{}' is not in the input and will be ignored", name);
        }
    }

    if !config.model.handles_missing() {
        if let Some(column) = x.columns().iter().find(|c| c.missing_count() > 0) {
            return Err(SelectorError::DataValidation(format!(
                "Column '{}' contains NaN values, which model '{}' cannot handle.",
                column.name, config.model
            )));
        }
    }

    for column in x.columns().iter().filter(|c| !c.is_numeric()) {
        let declared = categorical_columns.contains(&column.name);
        if !(declared && config.model.native_categoricals()) {
            return Err(SelectorError::DataValidation(format!(
                "Column '{}' is not numeric-encoded; model '{}' needs it encoded before fitting.",
                column.name, config.model
            )));
        }
    }

    Ok(x.columns()
        .iter()
        .filter(|c| categorical_columns.contains(&c.name))
        .map(|c| c.name.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::data_handling::Column;

    fn raw_table() -> FeatureMatrix {
        FeatureMatrix::new(vec![
            Column::numeric("Age", vec![22.0, f64::NAN, 35.0]),
            Column::categorical("Sex", vec![Some("male"), Some("female"), Some("male")]),
        ])
        .unwrap()
    }

    fn declared(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn validated(model: &str) -> ValidatedConfig {
        SelectorConfig::default().with_model(model).validate().unwrap()
    }

    #[test]
    fn random_forest_rejects_missing_cells() {
        let err = check_input(
            &validated("random_forest"),
            &declared(&["Sex"]),
            &raw_table(),
            &[0.0, 1.0, 0.0],
        )
        .unwrap_err();
        assert!(err.to_string().contains("NaN"));
        assert!(err.to_string().contains("Age"));
    }

    #[test]
    fn xgboost_rejects_string_columns_even_if_declared() {
        let err = check_input(
            &validated("xgboost"),
            &declared(&["Sex"]),
            &raw_table(),
            &[0.0, 1.0, 0.0],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Sex"));
    }

    #[test]
    fn catboost_accepts_declared_string_columns() {
        let categorical = check_input(
            &validated("catboost"),
            &declared(&["Sex", "Cabin"]),
            &raw_table(),
            &[0.0, 1.0, 0.0],
        )
        .unwrap();
        assert_eq!(categorical, vec!["Sex".to_string()]);

        let err = check_input(
            &validated("catboost"),
            &declared(&[]),
            &raw_table(),
            &[0.0, 1.0, 0.0],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Sex"));
    }

    #[test]
    fn target_must_match_and_be_complete() {
        let config = validated("catboost");
        let cats = declared(&["Sex"]);
        assert!(check_input(&config, &cats, &raw_table(), &[0.0, 1.0]).is_err());
        let err = check_input(&config, &cats, &raw_table(), &[0.0, f64::NAN, 1.0]).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }
}
