//! Indexing session.
//!
//! An [`Indexer`] owns everything one indexing session mutates: the project
//! files, the model repository and the name resolver's caches. Runs are
//! synchronous; a run completes before the next one starts.

use std::collections::BTreeSet;

use tracing::info;

use tsfamix_core::adapter::{NodeId, Project};
use tsfamix_core::config::{FileFilter, IndexConfig};
use tsfamix_core::repository::ModelRepository;

use crate::dictionary::{DictionaryOptions, EntityDictionary};
use crate::error::{IndexError, IndexResult};
use crate::metrics::{DecisionPointCounter, MetricSource};
use crate::names::NameResolver;
use crate::resolve;
use crate::traversal;

/// Summary of a full or partial run.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Files traversed.
    pub files: usize,
    /// Files resolved.
    pub resolved: usize,
    /// Entities added by the run.
    pub created: usize,
    /// Entities in the repository after the run.
    pub entities: usize,
    /// Per-node failures. The run continued past each of them.
    pub errors: Vec<IndexError>,
}

/// One indexing session over a project.
pub struct Indexer {
    pub(crate) project: Project,
    pub(crate) repo: ModelRepository,
    pub(crate) names: NameResolver,
    config: IndexConfig,
    filter: FileFilter,
    options: DictionaryOptions,
    metrics: Box<dyn MetricSource>,
}

impl Indexer {
    pub fn new(project: Project, config: IndexConfig) -> IndexResult<Self> {
        let filter = config.file_filter()?;
        let options = DictionaryOptions {
            hash_names_private: config.hash_names_private.value,
            index_comments: config.index_comments.value,
        };
        Ok(Indexer {
            project,
            repo: ModelRepository::new(),
            names: NameResolver::new(),
            config,
            filter,
            options,
            metrics: Box::new(DecisionPointCounter),
        })
    }

    /// Replace the complexity source.
    pub fn with_metric_source(mut self, source: impl MetricSource + 'static) -> Self {
        self.metrics = Box::new(source);
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn repository(&self) -> &ModelRepository {
        &self.repo
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The file is in the project and passes the include/exclude globs.
    pub fn is_indexed(&self, path: &str) -> bool {
        self.project.contains(path) && self.filter.matches(path)
    }

    /// Indexed files, in path order.
    pub fn indexed_paths(&self) -> Vec<String> {
        self.project
            .paths()
            .filter(|p| self.filter.matches(p))
            .map(str::to_string)
            .collect()
    }

    /// Index every file: traverse all, then resolve all.
    pub fn index_all(&mut self) -> IndexReport {
        let paths = self.indexed_paths();
        info!(files = paths.len(), "indexing project");
        let before = self.repo.inserted();
        let mut report = IndexReport::default();
        self.traverse_files(&paths, &mut report);
        self.resolve_files(&paths, &mut report);
        report.created = self.repo.inserted() - before;
        report.entities = self.repo.len();
        info!(
            files = report.files,
            entities = report.entities,
            errors = report.errors.len(),
            "project indexed"
        );
        report
    }

    /// FQN of a node in a project file.
    pub fn resolve_name(&mut self, path: &str, node: NodeId) -> IndexResult<String> {
        let file = self
            .project
            .get(path)
            .ok_or_else(|| IndexError::UnknownFile(path.to_string()))?;
        Ok(self.names.resolve(file, node)?)
    }

    /// Constructor layer for one project file.
    pub fn dictionary(&mut self, path: &str) -> IndexResult<EntityDictionary<'_>> {
        let file = self
            .project
            .get(path)
            .ok_or_else(|| IndexError::UnknownFile(path.to_string()))?;
        Ok(EntityDictionary::new(
            &mut self.repo,
            &mut self.names,
            file,
            self.options,
            self.metrics.as_ref(),
        ))
    }

    pub(crate) fn traverse_files<'p, I>(&mut self, paths: I, report: &mut IndexReport)
    where
        I: IntoIterator<Item = &'p String>,
    {
        for path in paths {
            if !self.filter.matches(path) {
                continue;
            }
            let Some(file) = self.project.get(path) else {
                continue;
            };
            let mut dict = EntityDictionary::new(
                &mut self.repo,
                &mut self.names,
                file,
                self.options,
                self.metrics.as_ref(),
            );
            let outcome = traversal::traverse(&mut dict);
            report.files += 1;
            report.errors.extend(outcome.errors);
        }
    }

    pub(crate) fn resolve_files<'p, I>(&mut self, paths: I, report: &mut IndexReport)
    where
        I: IntoIterator<Item = &'p String>,
    {
        for path in paths {
            if !self.filter.matches(path) {
                continue;
            }
            let Some(file) = self.project.get(path) else {
                continue;
            };
            let mut dict = EntityDictionary::new(
                &mut self.repo,
                &mut self.names,
                file,
                self.options,
                self.metrics.as_ref(),
            );
            let outcome = resolve::resolve(&mut dict, &self.project);
            report.resolved += 1;
            report.errors.extend(outcome.errors);
        }
    }

    /// Indexed files that import or export.
    pub(crate) fn module_paths(&self) -> BTreeSet<String> {
        self.project
            .files()
            .filter(|f| f.is_module() && self.filter.matches(f.path()))
            .map(|f| f.path().to_string())
            .collect()
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("files", &self.project.len())
            .field("entities", &self.repo.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
