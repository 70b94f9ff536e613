use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;

/// Model family used to score features on every fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    RandomForest,
    CatBoost,
    XGBoost,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::CatBoost => "catboost",
            ModelFamily::XGBoost => "xgboost",
        }
    }

    /// Whether the family trains on tables with missing cells.
    pub fn handles_missing(&self) -> bool {
        match self {
            ModelFamily::RandomForest => false,
            ModelFamily::CatBoost | ModelFamily::XGBoost => true,
        }
    }

    /// Whether the family accepts raw (string) categorical columns.
    pub fn native_categoricals(&self) -> bool {
        match self {
            ModelFamily::CatBoost => true,
            ModelFamily::RandomForest | ModelFamily::XGBoost => false,
        }
    }
}

impl FromStr for ModelFamily {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" => Ok(ModelFamily::RandomForest),
            "catboost" => Ok(ModelFamily::CatBoost),
            "xgboost" => Ok(ModelFamily::XGBoost),
            _ => Err(SelectorError::Configuration(
                "Model must be 'random_forest', 'catboost' or 'xgboost'.".to_string(),
            )),
        }
    }
}

/// How per-column importance is read from a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportanceMethod {
    Shap,
    Embedded,
}

impl ImportanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceMethod::Shap => "shap",
            ImportanceMethod::Embedded => "embedded",
        }
    }
}

impl FromStr for ImportanceMethod {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shap" => Ok(ImportanceMethod::Shap),
            "embedded" => Ok(ImportanceMethod::Embedded),
            _ => Err(SelectorError::Configuration(
                "Importance method must be 'shap' or 'embedded'.".to_string(),
            )),
        }
    }
}

/// Distribution of the probe columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RandVarType {
    Integer,
    Float,
}

impl RandVarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RandVarType::Integer => "integer",
            RandVarType::Float => "float",
        }
    }
}

impl FromStr for RandVarType {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" => Ok(RandVarType::Integer),
            "float" => Ok(RandVarType::Float),
            _ => Err(SelectorError::Configuration(
                "Invalid rand_var_type. Must be 'integer' or 'float'.".to_string(),
            )),
        }
    }
}

/// Learning task of the underlying model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Problem {
    Classification,
    Regression,
}

impl Problem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Problem::Classification => "classification",
            Problem::Regression => "regression",
        }
    }
}

impl FromStr for Problem {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classification" => Ok(Problem::Classification),
            "regression" => Ok(Problem::Regression),
            _ => Err(SelectorError::Configuration(
                "Problem must be 'classification' or 'regression'.".to_string(),
            )),
        }
    }
}

macro_rules! impl_option_text {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl AsRef<str> for $ty {
                fn as_ref(&self) -> &str {
                    self.as_str()
                }
            }
        )*
    };
}

impl_option_text!(ModelFamily, ImportanceMethod, RandVarType, Problem);

/// Central-tendency reduction applied across fits.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Mean,
    Median,
}

/// Hyper-parameters forwarded to the model adapter. `None` keeps the family default.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ModelParams {
    pub n_estimators: Option<usize>,
    pub max_depth: Option<usize>,
    pub learning_rate: Option<f64>,
    pub min_samples_leaf: Option<usize>,
    pub reg_lambda: Option<f64>,
}

/// Selector configuration.
///
/// The four enumerated options are stored as given and only parsed when the
/// selector is fitted, so an invalid value never fails construction. Use
/// [`SelectorConfig::validate`] to parse them into [`ValidatedConfig`].
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    pub model: String,
    pub importance_method: String,
    pub rand_var_type: String,
    pub problem: String,
    pub categorical_columns: BTreeSet<String>,
    pub number_of_fits: usize,
    /// Probe columns injected per fit.
    pub n_probes: usize,
    pub aggregation: Reduction,
    /// Extra importance a feature must have above the probe baseline.
    pub margin: f64,
    /// Root of the random stream. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub model_params: ModelParams,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            model: ModelFamily::RandomForest.to_string(),
            importance_method: ImportanceMethod::Embedded.to_string(),
            rand_var_type: RandVarType::Float.to_string(),
            problem: Problem::Classification.to_string(),
            categorical_columns: BTreeSet::new(),
            number_of_fits: 5,
            n_probes: 1,
            aggregation: Reduction::Mean,
            margin: 0.0,
            seed: None,
            model_params: ModelParams::default(),
        }
    }
}

impl SelectorConfig {
    pub fn new(
        model: impl AsRef<str>,
        importance_method: impl AsRef<str>,
        rand_var_type: impl AsRef<str>,
        problem: impl AsRef<str>,
    ) -> Self {
        Self::default()
            .with_model(model)
            .with_importance_method(importance_method)
            .with_rand_var_type(rand_var_type)
            .with_problem(problem)
    }

    pub fn with_model(mut self, model: impl AsRef<str>) -> Self {
        self.model = model.as_ref().to_string();
        self
    }

    pub fn with_importance_method(mut self, method: impl AsRef<str>) -> Self {
        self.importance_method = method.as_ref().to_string();
        self
    }

    pub fn with_rand_var_type(mut self, rand_var_type: impl AsRef<str>) -> Self {
        self.rand_var_type = rand_var_type.as_ref().to_string();
        self
    }

    pub fn with_problem(mut self, problem: impl AsRef<str>) -> Self {
        self.problem = problem.as_ref().to_string();
        self
    }

    pub fn with_categorical_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_number_of_fits(mut self, number_of_fits: usize) -> Self {
        self.number_of_fits = number_of_fits;
        self
    }

    pub fn with_n_probes(mut self, n_probes: usize) -> Self {
        self.n_probes = n_probes;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Reduction) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_model_params(mut self, params: ModelParams) -> Self {
        self.model_params = params;
        self
    }

    /// Parse the enumerated options and check the numeric ones.
    ///
    /// Checks run in a fixed order (`rand_var_type`, `problem`, `model`,
    /// `importance_method`, then the numeric settings) and stop at the first
    /// failure.
    pub fn validate(&self) -> Result<ValidatedConfig, SelectorError> {
        let rand_var_type: RandVarType = self.rand_var_type.parse()?;
        let problem: Problem = self.problem.parse()?;
        let model: ModelFamily = self.model.parse()?;
        let importance_method: ImportanceMethod = self.importance_method.parse()?;

        if self.number_of_fits == 0 {
            return Err(SelectorError::Configuration(
                "number_of_fits must be a positive integer.".to_string(),
            ));
        }
        if self.n_probes == 0 {
            return Err(SelectorError::Configuration(
                "n_probes must be a positive integer.".to_string(),
            ));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(SelectorError::Configuration(
                "margin must be a finite, non-negative number.".to_string(),
            ));
        }

        Ok(ValidatedConfig {
            model,
            importance_method,
            rand_var_type,
            problem,
            number_of_fits: self.number_of_fits,
            n_probes: self.n_probes,
            aggregation: self.aggregation,
            margin: self.margin,
        })
    }
}

/// The parsed, type-checked view of a [`SelectorConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedConfig {
    pub model: ModelFamily,
    pub importance_method: ImportanceMethod,
    pub rand_var_type: RandVarType,
    pub problem: Problem,
    pub number_of_fits: usize,
    pub n_probes: usize,
    pub aggregation: Reduction,
    pub margin: f64,
}
