//! Error types for the entity model and repository.
//!
//! Failures fall into three categories ([`ErrorCategory`]):
//!
//! - **Recoverable**: extraction of a single attribute failed (e.g. a declared
//!   type could not be rendered). The caller substitutes a sentinel and
//!   continues. These never escape the entity constructors.
//! - **Structural**: an expected ancestor or container was not found. The
//!   traversal visited nodes out of order; processing of that node aborts.
//! - **Uniqueness**: two distinct entities would share a fully qualified
//!   name. The first-registered entity is kept.
//!
//! Callers choose to skip, stub, or abort based on the category; no error
//! leaves already-registered entities in a partially updated state.

use thiserror::Error;

use crate::model::{EntityId, EntityKind};

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Substitute a sentinel, log, continue.
    Recoverable,
    /// Traversal-order precondition violated; abort the node.
    Structural,
    /// FQN collision; keep the first entity.
    Uniqueness,
}

/// Unified error type for model construction and repository operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A different entity is already registered under this FQN.
    #[error("duplicate fully qualified name '{fqn}': already registered as {existing}, rejected {rejected:?}")]
    DuplicateFqn {
        fqn: String,
        existing: EntityId,
        rejected: EntityKind,
    },

    /// An expected ancestor or container was not found.
    #[error("structural invariant violated in {file} at node {node}: {message}")]
    Structural {
        file: String,
        node: u32,
        message: String,
    },

    /// A single attribute could not be extracted.
    #[error("could not extract {what} for '{subject}': {reason}")]
    Extraction {
        what: String,
        subject: String,
        reason: String,
    },

    /// The entity id is not (or no longer) registered.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// A syntax node reference points outside its file's arena.
    #[error("unknown node {node} in {file}")]
    UnknownNode { file: String, node: u32 },
}

impl ModelError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::DuplicateFqn { .. } => ErrorCategory::Uniqueness,
            ModelError::Structural { .. } => ErrorCategory::Structural,
            ModelError::UnknownNode { .. } => ErrorCategory::Structural,
            ModelError::Extraction { .. } => ErrorCategory::Recoverable,
            ModelError::UnknownEntity(_) => ErrorCategory::Structural,
        }
    }

    /// Create a structural error.
    pub fn structural(file: impl Into<String>, node: u32, message: impl Into<String>) -> Self {
        ModelError::Structural {
            file: file.into(),
            node,
            message: message.into(),
        }
    }

    /// Create an extraction error.
    pub fn extraction(
        what: impl Into<String>,
        subject: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ModelError::Extraction {
            what: what.into(),
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// True if the caller may substitute a sentinel and continue.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Recoverable
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
