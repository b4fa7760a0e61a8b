//! CLI front door.
//!
//! Loads a project, resolves configuration, runs the indexer and builds the
//! JSON response. The binary in `main.rs` only parses flags and prints.
//!
//! ## Inputs
//!
//! - A project dump: one JSON file holding the list of parsed files, or a
//!   directory of `*.arena.json` files holding one parsed file each.
//! - Optionally a change set (JSON with `created`, `updated` and `deleted`
//!   lists), applied after the full run.
//!
//! Configuration is resolved against the project root: the dump's directory,
//! or the directory itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use tsfamix_core::adapter::{ArenaJsonAdapter, Project, SourceAdapter};
use tsfamix_core::config::{CliOverrides, IndexConfig};
use tsfamix_index::{ChangeSet, Indexer};

use crate::error::FamixError;
use crate::output::IndexResponse;

/// Directory configuration is resolved against.
pub fn project_root(input: &Path) -> PathBuf {
    if input.is_dir() {
        return input.to_path_buf();
    }
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve configuration for the project at `input`.
pub fn resolve_config(input: &Path, overrides: &CliOverrides) -> Result<IndexConfig, FamixError> {
    Ok(IndexConfig::resolve(&project_root(input), overrides)?)
}

/// Load a project dump file or arena directory.
pub fn load_project(input: &Path) -> Result<Project, FamixError> {
    if input.is_dir() {
        return load_arena_dir(input);
    }
    let text = read_input(input)?;
    let project: Project =
        serde_json::from_str(&text).map_err(|e| FamixError::parse(input.display().to_string(), e))?;
    debug!(files = project.len(), path = %input.display(), "project dump loaded");
    Ok(project)
}

fn load_arena_dir(dir: &Path) -> Result<Project, FamixError> {
    let adapter = ArenaJsonAdapter;
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && adapter.can_handle(&p.to_string_lossy()))
        .collect();
    paths.sort();

    let mut project = Project::new();
    for path in paths {
        let display = path.display().to_string();
        let text = read_input(&path)?;
        project
            .load(&adapter, &display, &text)
            .map_err(|e| FamixError::parse(display, e))?;
    }
    debug!(files = project.len(), dir = %dir.display(), "arena directory loaded");
    Ok(project)
}

/// Load a change set file.
pub fn load_changes(path: &Path) -> Result<ChangeSet, FamixError> {
    let text = read_input(path)?;
    serde_json::from_str(&text).map_err(|e| FamixError::parse(path.display().to_string(), e))
}

/// Index the project at `input`, then apply the change set at `changes`.
pub fn run_index(
    input: &Path,
    changes: Option<&Path>,
    config: IndexConfig,
) -> Result<IndexResponse, FamixError> {
    let project = load_project(input)?;
    let change_set = changes.map(load_changes).transpose()?;

    let mut indexer = Indexer::new(project, config)?;
    let report = indexer.index_all();
    let mut response = IndexResponse::new(&report, indexer.repository());

    if let Some(change_set) = change_set {
        info!(path = %input.display(), "applying change set");
        let update = indexer.apply_changes(change_set);
        response = response.with_update(&update, indexer.repository());
    }
    Ok(response)
}

fn read_input(path: &Path) -> Result<String, FamixError> {
    fs::read_to_string(path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, err: io::Error) -> FamixError {
    match err.kind() {
        io::ErrorKind::NotFound => FamixError::file_not_found(path.display().to_string()),
        _ => FamixError::invalid_args(format!("cannot read {}: {}", path.display(), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutputErrorCode;
    use tempfile::TempDir;
    use tsfamix_core::adapter::{Modifier, NodeId, SourceFile, SourceFileBuilder, SyntaxKind, SyntaxNode};
    use tsfamix_core::anchor::Span;

    fn class_file(path: &str, name: &str) -> SourceFile {
        let text = format!("export class {name} {{}}\n");
        let end = text.trim_end().len() as u32;
        let mut b = SourceFileBuilder::new(path, text);
        b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::ClassDeclaration, Span::new(0, end))
                .with_name(name)
                .with_modifier(Modifier::Export),
        );
        b.finish().unwrap()
    }

    fn write_dump(dir: &Path, files: Vec<SourceFile>) -> PathBuf {
        let mut project = Project::new();
        for file in files {
            project.insert(file);
        }
        let path = dir.join("project.json");
        fs::write(&path, serde_json::to_string(&project).unwrap()).unwrap();
        path
    }

    mod loading {
        use super::*;

        #[test]
        fn dump_file_round_trips() {
            let temp = TempDir::new().unwrap();
            let dump = write_dump(temp.path(), vec![class_file("a.ts", "A"), class_file("b.ts", "B")]);
            let project = load_project(&dump).unwrap();
            assert_eq!(project.paths().collect::<Vec<_>>(), vec!["a.ts", "b.ts"]);
            assert_eq!(project_root(&dump), temp.path());
        }

        #[test]
        fn arena_directory_loads_each_file() {
            let temp = TempDir::new().unwrap();
            let file = class_file("src/a.ts", "A");
            fs::write(
                temp.path().join("a.arena.json"),
                serde_json::to_string(&file).unwrap(),
            )
            .unwrap();
            fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
            let project = load_project(temp.path()).unwrap();
            assert_eq!(project.len(), 1);
            assert!(project.contains("src/a.ts"));
        }

        #[test]
        fn missing_dump_is_resolution_error() {
            let temp = TempDir::new().unwrap();
            let err = load_project(&temp.path().join("missing.json")).unwrap_err();
            assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
        }

        #[test]
        fn malformed_dump_is_invalid_arguments() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("project.json");
            fs::write(&path, "{not json").unwrap();
            let err = load_project(&path).unwrap_err();
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        }
    }

    mod running {
        use super::*;

        #[test]
        fn full_run_counts_entities() {
            let temp = TempDir::new().unwrap();
            let dump = write_dump(temp.path(), vec![class_file("a.ts", "A")]);
            let response = run_index(&dump, None, IndexConfig::default()).unwrap();
            assert_eq!(response.status, "ok");
            assert_eq!(response.files, 1);
            assert_eq!(response.counts.get("Class"), Some(&1));
            assert!(response.update.is_none());
        }

        #[test]
        fn change_set_is_applied_after_full_run() {
            let temp = TempDir::new().unwrap();
            let dump = write_dump(temp.path(), vec![class_file("a.ts", "A"), class_file("b.ts", "B")]);
            let changes = temp.path().join("changes.json");
            fs::write(&changes, r#"{"deleted": ["b.ts"]}"#).unwrap();
            let response = run_index(&dump, Some(&changes), IndexConfig::default()).unwrap();
            let update = response.update.unwrap();
            assert!(update.removed >= 2);
            assert!(update.retraversed.is_empty());
            assert_eq!(response.counts.get("Class"), Some(&1));
        }

        #[test]
        fn project_config_is_honoured() {
            let temp = TempDir::new().unwrap();
            let dump = write_dump(temp.path(), vec![class_file("a.ts", "A"), class_file("b.ts", "B")]);
            fs::write(temp.path().join("tsfamix.json"), r#"{"exclude": ["b.ts"]}"#).unwrap();
            let config = resolve_config(&dump, &CliOverrides::default()).unwrap();
            let response = run_index(&dump, None, config).unwrap();
            assert_eq!(response.files, 1);
        }
    }
}
