//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Infrastructure Types
// ============================================================================

// adapter module - parser collaborator data model
use tsfamix::adapter::{
    normalize_path, Ancestors, ArenaJsonAdapter, CommentRange, DeclRef, KeyExpr, Modifier, NodeId,
    Project, PropertyKey, SourceAdapter, SourceFile, SourceFileBuilder, SyntaxKind, SyntaxNode,
    TemplatePart,
};

// anchor module - source positions
use tsfamix::anchor::{SourceAnchor, Span};

// config module - layered configuration
use tsfamix::config::{
    CliOverrides, ConfigError, ConfigSource, ConfigValue, FileFilter, IndexConfig,
    ProjectConfigFile, DEFAULT_EXCLUSIONS, PROJECT_CONFIG_FILE,
};

// model module - entities
use tsfamix::model::{
    AccessData, AccessorKind, AliasData, AssociationKey, Attributes, BehaviouralData, CommentData,
    ConcretisationData, ContainerData, DecoratorData, Detach, Entity, EntityBody, EntityId,
    EntityKind, HeritageKind, ImportClauseData, InheritanceData, InvocationData, Metrics,
    NamedCore, ParameterConcretisationData, ParameterTypeData, ReferenceData, Role,
    StructuralData, TypeData, Visibility,
};

// repository module - the model repository
use tsfamix::repository::{DanglingReference, ModelRepository, RemovalReport, SourceNode};

// model_error module - error taxonomy
use tsfamix::model_error::{ErrorCategory, ModelError, ModelResult};

// text module - offset utilities
use tsfamix::text::{normalize_whitespace, slice, LineIndex};

// ============================================================================
// Indexing Engine
// ============================================================================

use tsfamix::dictionary::{stub_fqn, DictionaryOptions, EntityDictionary, StubKind};
use tsfamix::incremental::{ChangeKind, ChangeSet, UpdateReport};
use tsfamix::index_error::{IndexError, IndexResult};
use tsfamix::interner::{
    classify, concrete_key, fqn_stem, intern, intern_primitive, split_suffix, TypeScope, TypeText,
    PRIMITIVES, UNKNOWN_TYPE,
};
use tsfamix::metrics::{
    lines_of_code, statement_count, ComplexityTable, DecisionPointCounter, MetricSource,
};
use tsfamix::names::{evaluate_key, NameError, NameResolver, NameResult};
use tsfamix::resolve::{resolve, ResolutionReport};
use tsfamix::traversal::{traverse, TraversalReport};
use tsfamix::{IndexReport, Indexer};

// ============================================================================
// Front Door
// ============================================================================

use tsfamix::cli::{load_changes, load_project, project_root, resolve_config, run_index};
use tsfamix::error::{FamixError, OutputErrorCode};
use tsfamix::output::{
    emit_response, ErrorInfo, ErrorResponse, IndexResponse, UpdateSummary, SCHEMA_VERSION,
};

#[test]
fn api_surface_compiles() {
    // This test passes if the file compiles.
}
