//! Incremental re-indexing.
//!
//! A change set names created, updated and deleted files. Applying it keeps
//! the repository equal, up to entity ids, to what a full re-index of the
//! changed project would produce:
//!
//! 1. The project is updated and entities anchored in deleted files are
//!    removed. Removal cascades to associations that cannot outlive their
//!    ends.
//! 2. Dependents of the changed files are collected while their entities
//!    still exist: associations that hold references into them, and,
//!    following import clauses transitively, the imports and stub imports of
//!    every file that imports a changed file. Inheritances whose superclass
//!    is a stub or lives in one of those files are dependents too.
//! 3. The changed files' entities and the dependents are removed, then the
//!    changed files and the files that held dependents are traversed again,
//!    and those files plus every module file are resolved again.
//!
//! A change set that only deletes files stops after step 1.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tsfamix_core::adapter::{normalize_path, SourceFile};
use tsfamix_core::model::{EntityBody, EntityId, EntityKind};

use crate::error::IndexError;
use crate::session::{IndexReport, Indexer};

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A batch of file changes, applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub created: Vec<SourceFile>,
    #[serde(default)]
    pub updated: Vec<SourceFile>,
    /// Paths of deleted files.
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet::default()
    }

    pub fn create(mut self, file: SourceFile) -> Self {
        self.created.push(file);
        self
    }

    pub fn update(mut self, file: SourceFile) -> Self {
        self.updated.push(file);
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.deleted.push(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Normalized paths of the files with the given change.
    pub fn paths(&self, kind: ChangeKind) -> BTreeSet<String> {
        match kind {
            ChangeKind::Create => self.created.iter().map(|f| f.path().to_string()).collect(),
            ChangeKind::Update => self.updated.iter().map(|f| f.path().to_string()).collect(),
            ChangeKind::Delete => self.deleted.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    /// Created and updated paths together.
    pub fn changed_paths(&self) -> BTreeSet<String> {
        let mut paths = self.paths(ChangeKind::Create);
        paths.extend(self.paths(ChangeKind::Update));
        paths
    }
}

/// Summary of one [`Indexer::apply_changes`] call.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Entities removed because their file was deleted or changed, cascades
    /// included.
    pub removed: usize,
    /// Dependent entities removed for re-creation.
    pub dependents: usize,
    /// Files traversed again, in path order.
    pub retraversed: Vec<String>,
    /// Files resolved again.
    pub resolved: usize,
    /// Entities added while re-indexing.
    pub created: usize,
    /// Entities in the repository afterwards.
    pub entities: usize,
    pub errors: Vec<IndexError>,
}

impl Indexer {
    /// Apply a batch of file changes.
    pub fn apply_changes(&mut self, changes: ChangeSet) -> UpdateReport {
        let deleted = changes.paths(ChangeKind::Delete);
        let changed = changes.changed_paths();
        info!(
            created = changes.created.len(),
            updated = changes.updated.len(),
            deleted = deleted.len(),
            "applying changes"
        );
        let mut report = UpdateReport::default();

        for path in &deleted {
            self.project.remove(path);
            self.names.forget_file(path);
        }
        for file in changes.created.into_iter().chain(changes.updated) {
            self.names.forget_file(file.path());
            self.project.insert(file);
        }

        let stale: Vec<EntityId> = deleted
            .iter()
            .flat_map(|path| self.repo.in_file(path))
            .collect();
        report.removed += self.repo.remove(stale).total();
        if changed.is_empty() {
            report.entities = self.repo.len();
            info!(removed = report.removed, "deleted files dropped");
            return report;
        }

        // Removal cascades into the import clauses the dependent walk follows,
        // so every dependent is collected before anything is removed.
        let outdated: BTreeSet<EntityId> = changed
            .iter()
            .flat_map(|path| self.repo.in_file(path))
            .collect();
        let mut dependents = self.direct_dependents(&outdated);
        let direct = dependents.len();
        let visited = self.import_dependents(&changed, &mut dependents);
        self.inheritance_dependents(&visited, &mut dependents);

        let removal = self.repo.remove(outdated);
        report.removed += removal.total();
        let mut touched: BTreeSet<String> = removal.files;
        info!(
            removed = report.removed,
            direct,
            importers = visited.len().saturating_sub(changed.len()),
            "changed files dropped"
        );

        touched.extend(dependents.values().flatten().cloned());
        let dropped = self.repo.remove(dependents.keys().copied());
        report.dependents = dropped.total();
        touched.extend(dropped.files);
        debug!(dependents = report.dependents, "dependents dropped");

        touched.extend(changed);
        let retraverse: BTreeSet<String> = touched
            .into_iter()
            .filter(|p| !deleted.contains(p) && self.is_indexed(p))
            .collect();
        let mut to_resolve = retraverse.clone();
        to_resolve.extend(self.module_paths());

        let before = self.repo.inserted();
        let mut run = IndexReport::default();
        self.traverse_files(&retraverse, &mut run);
        self.resolve_files(&to_resolve, &mut run);

        report.retraversed = retraverse.into_iter().collect();
        report.resolved = run.resolved;
        report.created = self.repo.inserted() - before;
        report.entities = self.repo.len();
        report.errors = run.errors;
        info!(
            retraversed = report.retraversed.len(),
            resolved = report.resolved,
            created = report.created,
            errors = report.errors.len(),
            "changes applied"
        );
        report
    }

    /// Associations outside `outdated` that reference into it, with their
    /// anchor files.
    fn direct_dependents(&self, outdated: &BTreeSet<EntityId>) -> BTreeMap<EntityId, Option<String>> {
        let mut dependents = BTreeMap::new();
        for &id in outdated {
            for (holder, _) in self.repo.referrers_of(id) {
                if outdated.contains(&holder) {
                    continue;
                }
                let Some(entity) = self.repo.get(holder) else {
                    continue;
                };
                if entity.kind().is_association() {
                    dependents.insert(holder, entity.file().map(str::to_string));
                }
            }
        }
        dependents
    }

    /// Walk import clauses backwards from the changed files. Every import of
    /// a reached file is a dependent, as is the stub it imported. Returns the
    /// reached files, changed files included.
    fn import_dependents(
        &self,
        changed: &BTreeSet<String>,
        dependents: &mut BTreeMap<EntityId, Option<String>>,
    ) -> BTreeSet<String> {
        let mut visited = changed.clone();
        let mut queue: VecDeque<String> = changed.iter().cloned().collect();
        let clauses = self.repo.by_kind(EntityKind::ImportClause);
        while let Some(path) = queue.pop_front() {
            for clause in &clauses {
                let EntityBody::ImportClause(data) = &clause.body else {
                    continue;
                };
                if data.module_specifier != path {
                    continue;
                }
                let importer_file = clause.file().map(str::to_string);
                dependents.insert(clause.id, importer_file.clone());
                if self.repo.get(data.imported).is_some_and(|e| e.is_stub()) {
                    dependents.insert(data.imported, None);
                }
                if let Some(file) = importer_file {
                    if visited.insert(file.clone()) {
                        queue.push_back(file);
                    }
                }
            }
        }
        visited
    }

    /// Inheritances whose superclass is a stub or declared in a reached file.
    fn inheritance_dependents(
        &self,
        visited: &BTreeSet<String>,
        dependents: &mut BTreeMap<EntityId, Option<String>>,
    ) {
        for inheritance in self.repo.by_kind(EntityKind::Inheritance) {
            let EntityBody::Inheritance(data) = &inheritance.body else {
                continue;
            };
            let Some(superclass) = self.repo.get(data.superclass) else {
                continue;
            };
            let reached = superclass.file().is_some_and(|f| visited.contains(f));
            if superclass.is_stub() || reached {
                dependents.insert(inheritance.id, inheritance.file().map(str::to_string));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsfamix_core::adapter::SourceFileBuilder;

    fn empty(path: &str) -> SourceFile {
        SourceFileBuilder::new(path, "").finish().unwrap()
    }

    #[test]
    fn change_set_paths_are_normalized() {
        let changes = ChangeSet::new()
            .create(empty("src/a.ts"))
            .update(empty("src/b.ts"))
            .delete("./src\\c.ts");
        assert_eq!(
            changes.paths(ChangeKind::Delete).into_iter().collect::<Vec<_>>(),
            vec!["src/c.ts".to_string()]
        );
        assert_eq!(changes.changed_paths().len(), 2);
        assert!(!changes.is_empty());
        assert!(ChangeSet::new().is_empty());
    }

    #[test]
    fn change_set_fields_default_when_absent() {
        let changes: ChangeSet = serde_json::from_str(r#"{"deleted": ["a.ts"]}"#).unwrap();
        assert!(changes.created.is_empty());
        assert!(changes.updated.is_empty());
        assert_eq!(changes.deleted, vec!["a.ts".to_string()]);
    }
}
