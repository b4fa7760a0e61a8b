//! TypeScript indexing engine for tsfamix.
//!
//! Turns parsed project files into Famix entities in a
//! [`ModelRepository`](tsfamix_core::repository::ModelRepository):
//!
//! - [`names`]: fully qualified names for syntax nodes
//! - [`interner`]: type text to type entities
//! - [`dictionary`]: create-or-get constructors for every entity kind
//! - [`traversal`] and [`resolve`]: the declaration and reference passes
//! - [`incremental`]: re-indexing after file changes
//!
//! [`Indexer`] ties them together for one session.

mod concretisation;
pub mod dictionary;
pub mod error;
pub mod incremental;
pub mod interner;
pub mod metrics;
pub mod names;
pub mod resolve;
mod session;
pub mod traversal;

pub use dictionary::{DictionaryOptions, EntityDictionary, StubKind};
pub use error::{IndexError, IndexResult};
pub use incremental::{ChangeKind, ChangeSet, UpdateReport};
pub use metrics::{ComplexityTable, DecisionPointCounter, MetricSource};
pub use names::NameResolver;
pub use session::{IndexReport, Indexer};
