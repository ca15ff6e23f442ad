use async_openai::error::OpenAIError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Retrieval error: {0}")]
    Retrieval(String),
}

/// Failure kinds that cross a facade boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("delegate unavailable: {0}")]
    DelegateUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<object_store::Error> for ServiceError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => Self::NotFound(err.to_string()),
            object_store::Error::InvalidPath { .. } => Self::InvalidInput(err.to_string()),
            _ => Self::DelegateUnavailable(err.to_string()),
        }
    }
}

impl From<OpenAIError> for ServiceError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::InvalidArgument(msg) => Self::InvalidInput(msg),
            other => Self::DelegateUnavailable(other.to_string()),
        }
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::OpenAI(inner) => inner.into(),
            other @ (AppError::LLMParsing(_) | AppError::Retrieval(_)) => {
                Self::DelegateUnavailable(other.to_string())
            }
        }
    }
}
