//! Core infrastructure for tsfamix.
//!
//! This crate provides the language-agnostic half of the indexer:
//! - Entity model (ids, kinds, the entity sum type, roles)
//! - Model repository with secondary indexes and cascading removal
//! - Source anchors and content hashes
//! - Parser collaborator data model (syntax arenas, adapter trait)
//! - Error types and categories
//! - Layered configuration
//! - Text position utilities

pub mod adapter;
pub mod anchor;
pub mod config;
pub mod error;
pub mod model;
pub mod repository;
pub mod text;
