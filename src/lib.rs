//! hisoka: model-agnostic feature selection with random probe features.
//!
//! The selector injects synthetic noise columns ("probes") into the feature
//! table, fits a tree model several times, and keeps only the real features
//! whose importance beats the probes. Model families (random forest,
//! XGBoost-style and CatBoost-style boosting) live in [`models`] behind a
//! small trait, importance extraction (embedded or TreeSHAP) in
//! [`importance`], and the selection procedure itself in
//! [`feature_selection`].
pub mod config;
pub mod data_handling;
pub mod error;
pub mod feature_selection;
pub mod importance;
pub mod models;
