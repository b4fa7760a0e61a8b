//! tsfamix: incremental TypeScript code model indexer
//!
//! Converts parsed, type-resolved TypeScript projects into a cross-referenced
//! Famix entity graph, and keeps that graph current as files change.

// Core infrastructure - re-exported from tsfamix-core
pub use tsfamix_core::adapter;
pub use tsfamix_core::anchor;
pub use tsfamix_core::config;
pub use tsfamix_core::error as model_error;
pub use tsfamix_core::model;
pub use tsfamix_core::repository;
pub use tsfamix_core::text;

// Indexing engine - re-exported from tsfamix-index
pub use tsfamix_index::{dictionary, incremental, interner, metrics, names, resolve, traversal};
pub use tsfamix_index::error as index_error;
pub use tsfamix_index::{ChangeSet, IndexReport, Indexer, UpdateReport};

// Front door
pub mod cli;
pub mod error;
pub mod output;
