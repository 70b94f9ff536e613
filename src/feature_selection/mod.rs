//! Random-probe feature selection.
//!
//! [`random_probe::RandomFeatureSelector`] drives the procedure: validate,
//! inject probes, fit, attribute, and finally [`aggregate`] the per-fit
//! importances into a keep/drop decision per feature.
pub mod aggregate;
pub mod probe;
pub mod random_probe;
pub mod validation;
