use thiserror::Error;

/// Errors raised while loading core data (dictionaries, prompt templates)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid term dictionary: {0}")]
    InvalidDictionary(String),

    #[error("Invalid prompt template '{stage}': {reason}")]
    InvalidTemplate { stage: String, reason: String },

    #[error("Prompt template '{stage}' rendered without variable '{variable}'")]
    MissingVariable { stage: String, variable: String },
}
