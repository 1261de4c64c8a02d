use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict for '{tag}' is already settled")]
    ConflictSettled { tag: String },

    #[error("conflict for '{tag}' has no candidate #{index}")]
    CandidateOutOfRange { tag: String, index: usize },

    #[error("no conflict for tag '{0}'")]
    UnknownConflict(String),

    #[error("{provider} lookup failed: {message}")]
    Provider { provider: String, message: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tag IO error: {0}")]
    Tags(#[from] lofty::error::LoftyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn provider(provider: &str, message: impl std::fmt::Display) -> Self {
        Error::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
