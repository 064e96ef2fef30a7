use std::path::PathBuf;

use thiserror::Error;

/// Shown when either form field is empty.
pub const MISSING_FIELDS_MESSAGE: &str = "Please provide both a title and ingredients.";

/// Shown for every submission once the model has failed to load.
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "Model could not be loaded. The app cannot function.";

/// Failure to bring a model directory into memory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model config: {0}")]
    InvalidConfig(String),

    #[error("invalid vocabulary: {0}")]
    InvalidVocab(String),

    #[error("corrupt checkpoint: {0}")]
    Checkpoint(String),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure inside a single generation call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("invalid generation options: {0}")]
    InvalidOptions(String),

    #[error("prompt produced no tokens")]
    EmptyPrompt,

    #[error("no token left to sample at step {step}")]
    NoCandidates { step: usize },

    #[error("{0}")]
    Backend(String),
}

/// Why a form submission did not produce a recipe.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    /// Rejected before the model was touched.
    #[error("{0}")]
    Validation(String),

    /// The model never loaded; holds the load failure for logs.
    #[error("{}", MODEL_UNAVAILABLE_MESSAGE)]
    ModelUnavailable(String),

    #[error("An error occurred during generation: {0}")]
    Generation(#[from] GenerationError),
}

impl SubmitError {
    pub fn missing_fields() -> Self {
        Self::Validation(MISSING_FIELDS_MESSAGE.to_string())
    }

    /// Whether every later submission will fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_form_copy() {
        assert_eq!(
            SubmitError::missing_fields().to_string(),
            "Please provide both a title and ingredients."
        );
        assert_eq!(
            SubmitError::ModelUnavailable("no vocab.txt".into()).to_string(),
            MODEL_UNAVAILABLE_MESSAGE
        );
        let err = SubmitError::from(GenerationError::EmptyPrompt);
        assert_eq!(
            err.to_string(),
            "An error occurred during generation: prompt produced no tokens"
        );
    }

    #[test]
    fn only_model_unavailable_is_fatal() {
        assert!(SubmitError::ModelUnavailable(String::new()).is_fatal());
        assert!(!SubmitError::missing_fields().is_fatal());
        assert!(!SubmitError::Generation(GenerationError::EmptyPrompt).is_fatal());
    }
}
