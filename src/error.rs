//! Error types for the tsfamix binary.
//!
//! Library errors ([`ModelError`], [`IndexError`], [`ConfigError`]) are
//! converted to [`FamixError`] at the front door. Each variant maps to a
//! stable [`OutputErrorCode`], which is also the process exit code.

use std::fmt;

use thiserror::Error;

use tsfamix_core::config::ConfigError;
use tsfamix_core::error::ModelError;
use tsfamix_index::IndexError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Bad flags, unreadable or malformed input files.
    InvalidArguments = 2,
    /// A named file or declaration could not be found.
    ResolutionError = 3,
    /// Bugs and unexpected state.
    InternalError = 10,
}

impl OutputErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum FamixError {
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Input exists but is not a valid project dump or change set.
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl From<&FamixError> for OutputErrorCode {
    fn from(err: &FamixError) -> Self {
        match err {
            FamixError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            FamixError::Parse { .. } => OutputErrorCode::InvalidArguments,
            FamixError::Config(_) => OutputErrorCode::InvalidArguments,
            FamixError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            FamixError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<IndexError> for FamixError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Config(err) => FamixError::Config(err),
            IndexError::UnknownFile(path) => FamixError::FileNotFound { path },
            other => FamixError::internal(other.to_string()),
        }
    }
}

impl From<ModelError> for FamixError {
    fn from(err: ModelError) -> Self {
        FamixError::internal(err.to_string())
    }
}

impl FamixError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        FamixError::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        FamixError::FileNotFound { path: path.into() }
    }

    pub fn parse(path: impl Into<String>, message: impl fmt::Display) -> Self {
        FamixError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        FamixError::InternalError {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_codes {
        use super::*;

        #[test]
        fn codes_are_stable() {
            assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
            assert_eq!(OutputErrorCode::ResolutionError.code(), 3);
            assert_eq!(OutputErrorCode::InternalError.code(), 10);
            assert_eq!(OutputErrorCode::InternalError.to_string(), "10");
        }

        #[test]
        fn parse_errors_are_invalid_arguments() {
            let err = FamixError::parse("project.json", "expected value");
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
            assert_eq!(err.to_string(), "failed to parse project.json: expected value");
        }

        #[test]
        fn missing_files_are_resolution_errors() {
            let err = FamixError::file_not_found("nowhere.json");
            assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
        }
    }

    mod conversions {
        use super::*;

        #[test]
        fn unknown_file_converts() {
            let err = FamixError::from(IndexError::UnknownFile("a.ts".to_string()));
            match err {
                FamixError::FileNotFound { path } => assert_eq!(path, "a.ts"),
                other => panic!("expected FileNotFound, got {other:?}"),
            }
        }

        #[test]
        fn model_errors_are_internal() {
            let err = FamixError::from(ModelError::structural("a.ts", 3, "no container"));
            assert_eq!(err.error_code(), OutputErrorCode::InternalError);
        }

        #[test]
        fn config_errors_are_invalid_arguments() {
            let config = ConfigError::InvalidPattern {
                pattern: "[".to_string(),
                message: "unclosed class".to_string(),
            };
            let err = FamixError::from(IndexError::Config(config));
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        }
    }
}
