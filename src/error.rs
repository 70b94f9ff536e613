use thiserror::Error;

/// Result alias used by the selector API.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Errors surfaced by the random-probe selector.
///
/// Configuration and data-validation messages are part of the public contract:
/// callers match on the text (e.g. the `NaN` token or a column name), so the
/// variants carry the rendered message verbatim.
#[derive(Error, Debug)]
pub enum SelectorError {
    /// An enumerated option is outside its domain. Raised on `fit`, never on construction.
    #[error("{0}")]
    Configuration(String),

    /// The input table or target is incompatible with the chosen model family.
    #[error("{0}")]
    DataValidation(String),

    /// `transform` was called before a successful `fit`.
    #[error("{0}")]
    State(String),

    /// Failure reported by a model adapter or the attribution engine.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised by model adapters and explainers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("training failed: {0}")]
    Training(String),
}
