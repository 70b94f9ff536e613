pub mod cart;
pub mod catboost;
pub mod random_forest;
pub mod tree;
pub mod utils;
pub mod xgboost;

pub mod factory;
pub mod model_trait;
pub mod objective;
