//! Reference resolution (second pass).
//!
//! Runs after every file of the batch has been traversed, so declaration
//! targets resolve to real entities wherever one exists. Targets outside the
//! indexed set become stubs.
//!
//! | Node                          | Association                        |
//! |-------------------------------|------------------------------------|
//! | import specifier / clause     | ImportClause (file → declaration)  |
//! | heritage clause entry         | Inheritance, Concretisation        |
//! | call / `new` expression       | Invocation, Concretisation         |
//! | identifier / property access  | Access (to variables and members)  |
//! | type reference                | Reference, Concretisation          |

use tracing::{debug, error, warn};

use tsfamix_core::adapter::{DeclRef, NodeId, Project, SyntaxKind, SyntaxNode};
use tsfamix_core::error::{ErrorCategory, ModelError};
use tsfamix_core::model::{EntityBody, EntityId, EntityKind, HeritageKind};

use crate::dictionary::{EntityDictionary, StubKind};
use crate::error::{IndexError, IndexResult};

/// Outcome of resolving one file.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Entities added: associations, stubs, clones and their types.
    pub created: usize,
    pub errors: Vec<IndexError>,
}

/// Resolve every reference in the dictionary's file.
pub fn resolve(dict: &mut EntityDictionary<'_>, project: &Project) -> ResolutionReport {
    let file = dict.file();
    let before = dict.repository().inserted();
    let mut report = ResolutionReport::default();
    let mut resolver = Resolver { dict, project };
    for node in file.preorder() {
        if let Err(err) = resolver.resolve_node(node) {
            match err.category() {
                ErrorCategory::Uniqueness => {}
                ErrorCategory::Structural => error!(%err, file = file.path(), %node, "reference skipped"),
                ErrorCategory::Recoverable => warn!(%err, file = file.path(), %node, "reference skipped"),
            }
            report.errors.push(err);
        }
    }
    report.created = resolver.dict.repository().inserted() - before;
    debug!(file = file.path(), created = report.created, "file resolved");
    report
}

struct Resolver<'r, 'a> {
    dict: &'r mut EntityDictionary<'a>,
    project: &'r Project,
}

impl Resolver<'_, '_> {
    fn resolve_node(&mut self, id: NodeId) -> IndexResult<()> {
        let file = self.dict.file();
        let node = file.get(id)?;
        match node.kind {
            SyntaxKind::ImportDeclaration => self.import_declaration(id, node),
            SyntaxKind::HeritageClause => self.heritage_clause(id, node),
            SyntaxKind::CallExpression | SyntaxKind::NewExpression => self.invocation(id, node),
            SyntaxKind::Identifier | SyntaxKind::PropertyAccessExpression => self.access(id, node),
            SyntaxKind::TypeReference => self.type_reference(id, node),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Targets
    // ========================================================================

    /// The real entity a declaration reference points at, if indexed.
    fn lookup(&self, target: &DeclRef) -> Option<EntityId> {
        match target {
            DeclRef::Local { file, node } => self.dict.repository().entity_at(file, *node),
            DeclRef::External { .. } => None,
        }
    }

    /// The real entity, or a stub standing in for it.
    ///
    /// A stub for a project declaration takes the declaration's name, else
    /// `written`, the name at the use site.
    fn lookup_or_stub(
        &mut self,
        target: &DeclRef,
        written: Option<&str>,
        kind: StubKind,
    ) -> IndexResult<EntityId> {
        if let Some(id) = self.lookup(target) {
            return Ok(id);
        }
        let name = match target {
            DeclRef::Local { file, node } => self
                .project
                .get(file)
                .and_then(|f| f.node(*node))
                .and_then(|n| n.name.as_deref())
                .or(written),
            DeclRef::External { .. } => None,
        };
        self.dict.stub_for(target, name, kind)
    }

    /// Nearest enclosing container or behavioural entity, else the file.
    fn scope_entity(&mut self, id: NodeId) -> IndexResult<EntityId> {
        match self.dict.enclosing_entity(id, |k| k.is_container()) {
            Some(owner) => Ok(owner),
            None => self.dict.ensure_file(),
        }
    }

    fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.dict.repository().get(id).map(|e| e.kind())
    }

    // ========================================================================
    // Imports
    // ========================================================================

    fn import_declaration(&mut self, id: NodeId, decl: &SyntaxNode) -> IndexResult<()> {
        let file = self.dict.file();
        let resolved = decl.resolved_module.as_deref();
        let specifier = resolved
            .or(decl.module_specifier.as_deref())
            .unwrap_or_default()
            .to_string();
        let importer = self.dict.ensure_file()?;

        for binding in file.preorder_from(id) {
            let node = file.get(binding)?;
            let imported = match node.kind {
                SyntaxKind::ImportSpecifier => {
                    let name = node.name.as_deref().unwrap_or_default();
                    let target = node.target.clone().or_else(|| {
                        let path = resolved?;
                        let found = self.project.find_export(path, name)?;
                        Some(DeclRef::Local {
                            file: path.to_string(),
                            node: found,
                        })
                    });
                    match target {
                        Some(target) => self.lookup_or_stub(&target, Some(name), StubKind::Entity)?,
                        None => self.dict.ensure_stub(name, &specifier, StubKind::Entity)?,
                    }
                }
                SyntaxKind::ImportClause if node.name.is_some() => {
                    let name = node.name.as_deref().unwrap_or_default();
                    let target = node.target.clone().or_else(|| {
                        let path = resolved?;
                        let found = self.project.get(path)?.default_export()?;
                        Some(DeclRef::Local {
                            file: path.to_string(),
                            node: found,
                        })
                    });
                    match target {
                        Some(target) => self.lookup_or_stub(&target, Some(name), StubKind::Entity)?,
                        None => self.dict.ensure_stub(name, &specifier, StubKind::Entity)?,
                    }
                }
                SyntaxKind::NamespaceImport => {
                    let module = resolved
                        .and_then(|path| self.dict.repository().entity_at(path, NodeId::ROOT));
                    match module {
                        Some(module) => module,
                        None => {
                            let name = node.name.as_deref().unwrap_or("*");
                            self.dict.ensure_stub(name, &specifier, StubKind::Entity)?
                        }
                    }
                }
                _ => continue,
            };
            self.dict.add_import(binding, importer, imported, specifier.clone())?;
        }
        Ok(())
    }

    // ========================================================================
    // Inheritance
    // ========================================================================

    fn heritage_clause(&mut self, id: NodeId, clause: &SyntaxNode) -> IndexResult<()> {
        let file = self.dict.file();
        let owner = clause.parent.unwrap_or(NodeId::ROOT);
        let subclass = self.dict.entity_for(owner).ok_or_else(|| {
            ModelError::structural(file.path(), id.0, "heritage clause outside an indexed type")
        })?;
        let heritage = clause.heritage.unwrap_or_default();
        let stub_kind = match (heritage, self.kind_of(subclass)) {
            (HeritageKind::Implements, _) | (_, Some(EntityKind::Interface)) => StubKind::Interface,
            _ => StubKind::Class,
        };

        for &entry in file.children(id) {
            let node = file.get(entry)?;
            if node.kind != SyntaxKind::ExpressionWithTypeArguments {
                continue;
            }
            let superclass = match &node.target {
                Some(target) => self.lookup_or_stub(target, node.name.as_deref(), stub_kind)?,
                None => {
                    let text = file.text_of(entry);
                    let name = node
                        .name
                        .as_deref()
                        .unwrap_or_else(|| text.split('<').next().unwrap_or(text).trim());
                    self.dict.ensure_stub(name, "external", stub_kind)?
                }
            };
            self.dict.add_inheritance(entry, subclass, superclass, heritage)?;
            if !node.type_arguments.is_empty() {
                self.dict.concretise(superclass, &node.type_arguments, entry)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Invocations
    // ========================================================================

    fn invocation(&mut self, id: NodeId, node: &SyntaxNode) -> IndexResult<()> {
        let sender = match self.dict.enclosing_entity(id, |k| k.is_behavioural()) {
            Some(sender) => sender,
            None => self.dict.ensure_file()?,
        };
        let callee = node.target.as_ref().and_then(|t| self.lookup(t));
        let candidates = match (node.kind, callee) {
            (SyntaxKind::NewExpression, Some(class)) => self.constructors_of(class),
            (_, Some(callee)) if self.kind_of(callee).is_some_and(|k| k.is_behavioural()) => {
                vec![callee]
            }
            _ => Vec::new(),
        };
        let receiver = node.receiver.as_ref().and_then(|r| self.lookup(r));
        self.dict.add_invocation(id, sender, receiver, candidates)?;
        if let Some(generic) = callee {
            if !node.type_arguments.is_empty() {
                self.dict.concretise(generic, &node.type_arguments, id)?;
            }
        }
        Ok(())
    }

    fn constructors_of(&self, class: EntityId) -> Vec<EntityId> {
        let repo = self.dict.repository();
        repo.children_of(class)
            .into_iter()
            .filter(|&c| {
                repo.get(c)
                    .is_some_and(|e| matches!(&e.body, EntityBody::Method(d) if d.is_constructor))
            })
            .collect()
    }

    // ========================================================================
    // Accesses and type references
    // ========================================================================

    fn access(&mut self, id: NodeId, node: &SyntaxNode) -> IndexResult<()> {
        let Some(variable) = node.target.as_ref().and_then(|t| self.lookup(t)) else {
            return Ok(());
        };
        if !self.kind_of(variable).is_some_and(|k| k.is_structural()) {
            return Ok(());
        }
        let accessor = self.scope_entity(id)?;
        self.dict.add_access(id, accessor, variable, node.is_write)?;
        Ok(())
    }

    fn type_reference(&mut self, id: NodeId, node: &SyntaxNode) -> IndexResult<()> {
        let Some(target) = node.target.as_ref().and_then(|t| self.lookup(t)) else {
            return Ok(());
        };
        let source = self.scope_entity(id)?;
        self.dict.add_reference(id, source, target)?;
        if !node.type_arguments.is_empty() {
            self.dict.concretise(target, &node.type_arguments, id)?;
        }
        Ok(())
    }
}
