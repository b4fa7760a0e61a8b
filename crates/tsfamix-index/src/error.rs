//! Indexing errors.

use thiserror::Error;
use tsfamix_core::config::ConfigError;
use tsfamix_core::error::{ErrorCategory, ModelError};

use crate::names::NameError;

/// Unified error type for an indexing session.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A change set or query named a file the project does not contain.
    #[error("file not in project: {0}")]
    UnknownFile(String),
}

impl IndexError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IndexError::Model(err) => err.category(),
            IndexError::Name(_) | IndexError::UnknownFile(_) => ErrorCategory::Structural,
            IndexError::Config(_) => ErrorCategory::Recoverable,
        }
    }
}

/// Result type for indexing operations.
pub type IndexResult<T> = Result<T, IndexError>;
