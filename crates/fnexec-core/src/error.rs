//! Error types for fnexec

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Function {0} not found")]
    FunctionNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("execution already registered: {0}")]
    DuplicateExecution(String),

    #[error("transfer failed: {origin} -> {destination}: {message}")]
    Transfer {
        origin: String,
        destination: String,
        message: String,
    },

    #[error("extraction failed: {archive}: {message}")]
    Extraction { archive: String, message: String },

    #[error("process error: {0}")]
    Process(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transfer(
        origin: impl Into<String>,
        destination: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            origin: origin.into(),
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub fn extraction(archive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process(message.into())
    }

    /// Whether this error should be reported to a caller as a client error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FunctionNotFound(_) | Self::ExecutionNotFound(_))
    }
}
