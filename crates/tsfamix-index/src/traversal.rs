//! Declaration traversal (first pass).
//!
//! Visits a file's nodes in document order and hands every declaration to
//! the entity dictionary. Parents precede children in document order, so
//! containers always exist before their members.

use tracing::{debug, error, warn};

use tsfamix_core::error::ErrorCategory;

use crate::dictionary::EntityDictionary;
use crate::error::IndexError;

/// Outcome of traversing one file.
#[derive(Debug, Default)]
pub struct TraversalReport {
    /// Declarations visited.
    pub declarations: usize,
    /// Entities added to the repository, comments and types included.
    pub created: usize,
    /// Per-node failures; the nodes were skipped.
    pub errors: Vec<IndexError>,
}

/// Create or get the entity of every declaration in the dictionary's file.
pub fn traverse(dict: &mut EntityDictionary<'_>) -> TraversalReport {
    let file = dict.file();
    let before = dict.repository().inserted();
    let mut report = TraversalReport::default();
    for node in file.preorder() {
        match dict.ensure_declaration(node) {
            Ok(Some(_)) => report.declarations += 1,
            Ok(None) => {}
            Err(err) => {
                match err.category() {
                    // Already reported by the repository.
                    ErrorCategory::Uniqueness => {}
                    ErrorCategory::Structural => {
                        error!(%err, file = file.path(), %node, "declaration skipped")
                    }
                    ErrorCategory::Recoverable => {
                        warn!(%err, file = file.path(), %node, "declaration skipped")
                    }
                }
                report.errors.push(err);
            }
        }
    }
    report.created = dict.repository().inserted() - before;
    debug!(
        file = file.path(),
        declarations = report.declarations,
        created = report.created,
        "file traversed"
    );
    report
}
