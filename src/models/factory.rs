use crate::config::{ModelFamily, ModelParams, Problem};
use crate::models::catboost::{CatBoostModel, CatBoostParams};
use crate::models::model_trait::FeatureModel;
use crate::models::random_forest::{RandomForestModel, RandomForestParams};
use crate::models::xgboost::{XGBoostModel, XGBoostParams};

/// Build a fresh, unfitted adapter for `family`.
///
/// Unset entries of `params` fall back to the family defaults. `categorical`
/// only matters for families with native categorical support.
pub fn build_model(
    family: ModelFamily,
    problem: Problem,
    params: &ModelParams,
    categorical: &[String],
) -> Box<dyn FeatureModel> {
    match family {
        ModelFamily::RandomForest => {
            let defaults = RandomForestParams::default();
            let rf = RandomForestParams {
                n_estimators: params.n_estimators.unwrap_or(defaults.n_estimators),
                max_depth: params.max_depth.or(defaults.max_depth),
                min_samples_leaf: params.min_samples_leaf.unwrap_or(defaults.min_samples_leaf),
                ..defaults
            };
            Box::new(RandomForestModel::new(rf, problem))
        }

        ModelFamily::XGBoost => {
            let defaults = XGBoostParams::default();
            let xgb = XGBoostParams {
                n_estimators: params.n_estimators.unwrap_or(defaults.n_estimators),
                learning_rate: params.learning_rate.unwrap_or(defaults.learning_rate),
                max_depth: params.max_depth.unwrap_or(defaults.max_depth),
                reg_lambda: params.reg_lambda.unwrap_or(defaults.reg_lambda),
                ..defaults
            };
            Box::new(XGBoostModel::new(xgb, problem))
        }

        ModelFamily::CatBoost => {
            let defaults = CatBoostParams::default();
            let cb = CatBoostParams {
                n_estimators: params.n_estimators.unwrap_or(defaults.n_estimators),
                learning_rate: params.learning_rate.unwrap_or(defaults.learning_rate),
                depth: params.max_depth.unwrap_or(defaults.depth),
                reg_lambda: params.reg_lambda.unwrap_or(defaults.reg_lambda),
                ..defaults
            };
            Box::new(CatBoostModel::new(cb, problem, categorical))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::{Column, FeatureMatrix};

    #[test]
    fn builds_every_family() {
        let params = ModelParams::default();
        for family in [ModelFamily::RandomForest, ModelFamily::XGBoost, ModelFamily::CatBoost] {
            let model = build_model(family, Problem::Regression, &params, &[]);
            assert_eq!(model.name(), family.as_str());
            assert!(model.ensemble().is_err());
        }
    }

    #[test]
    fn deep_trees_are_bounded_for_every_family() {
        let values: Vec<f64> = (0..200).map(|i| ((i * 37) % 200) as f64).collect();
        let y: Vec<f64> = values.iter().map(|v| v * v).collect();
        let x = FeatureMatrix::new(vec![Column::numeric("x", values)]).unwrap();
        let params = ModelParams {
            n_estimators: Some(1),
            max_depth: Some(64),
            ..Default::default()
        };
        for family in [ModelFamily::RandomForest, ModelFamily::XGBoost, ModelFamily::CatBoost] {
            let mut model = build_model(family, Problem::Regression, &params, &[]);
            model.fit(&x, &y, 3).unwrap();
            let tree = &model.ensemble().unwrap().trees()[0];
            assert!(tree.depth() <= 200, "{}", family.as_str());
        }
    }
}
