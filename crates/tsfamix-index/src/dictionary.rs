//! Entity dictionary: create-or-get constructors per declaration kind.
//!
//! Every constructor resolves the node's FQN first. If an entity is already
//! registered under it, that entity is returned without re-deriving anything.
//! Otherwise the constructor extracts attributes, interns types, anchors the
//! entity at the node, registers it under its container and records the
//! entity ↔ node mapping.
//!
//! Containers must exist before their members: the traversal visits nodes in
//! document order, so a missing container is a structural error.
//!
//! Attribute extraction failures (a declaration with no rendered type) are
//! recovered here: they are logged and the `unknown` primitive is used.

use tracing::{debug, warn};

use tsfamix_core::adapter::{DeclRef, Modifier, NodeId, SourceFile, SyntaxKind, SyntaxNode};
use tsfamix_core::anchor::{SourceAnchor, Span};
use tsfamix_core::error::ModelError;
use tsfamix_core::model::{
    AccessData, AccessorKind, AliasData, Attributes, BehaviouralData, CommentData, ContainerData,
    DecoratorData, Entity, EntityBody, EntityId, EntityKind, HeritageKind, ImportClauseData,
    InheritanceData, InvocationData, Metrics, NamedCore, ReferenceData, StructuralData, TypeData,
    Visibility,
};
use tsfamix_core::repository::{ModelRepository, SourceNode};
use tsfamix_core::text::{self, normalize_whitespace};

use crate::error::IndexResult;
use crate::interner::{self, TypeScope, UNKNOWN_TYPE};
use crate::metrics::{self, MetricSource};
use crate::names::{self, NameResolver};

/// Switches that change what the dictionary extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryOptions {
    /// Treat `#name` members as private.
    pub hash_names_private: bool,
    /// Create Comment entities for leading comments.
    pub index_comments: bool,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        DictionaryOptions {
            hash_names_private: true,
            index_comments: true,
        }
    }
}

/// Kind of placeholder created for an unresolved declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubKind {
    Entity,
    Class,
    Interface,
}

/// Per-file constructor layer over the repository.
pub struct EntityDictionary<'a> {
    repo: &'a mut ModelRepository,
    names: &'a mut NameResolver,
    file: &'a SourceFile,
    options: DictionaryOptions,
    metrics: &'a dyn MetricSource,
}

impl<'a> EntityDictionary<'a> {
    pub fn new(
        repo: &'a mut ModelRepository,
        names: &'a mut NameResolver,
        file: &'a SourceFile,
        options: DictionaryOptions,
        metrics: &'a dyn MetricSource,
    ) -> Self {
        EntityDictionary {
            repo,
            names,
            file,
            options,
            metrics,
        }
    }

    pub fn file(&self) -> &'a SourceFile {
        self.file
    }

    pub fn repository(&self) -> &ModelRepository {
        &*self.repo
    }

    pub(crate) fn repository_mut(&mut self) -> &mut ModelRepository {
        &mut *self.repo
    }

    /// Entity created from `node` in this file, if any.
    pub fn entity_for(&self, node: NodeId) -> Option<EntityId> {
        self.repo.entity_at(self.file.path(), node)
    }

    /// Nearest entity-bearing ancestor of `node` whose kind passes `accept`.
    pub fn enclosing_entity<F>(&self, node: NodeId, accept: F) -> Option<EntityId>
    where
        F: Fn(EntityKind) -> bool,
    {
        self.file.ancestors(node).find_map(|a| {
            let id = self.entity_for(a)?;
            let kind = self.repo.get(id)?.kind();
            accept(kind).then_some(id)
        })
    }

    /// Dispatch to the constructor for the node's kind. Nodes that are not
    /// declarations yield `None`.
    pub fn ensure_declaration(&mut self, node: NodeId) -> IndexResult<Option<EntityId>> {
        let kind = self.file.get(node)?.kind;
        let id = match kind {
            SyntaxKind::SourceFile => self.ensure_file()?,
            SyntaxKind::ModuleDeclaration => self.ensure_module(node)?,
            SyntaxKind::ClassDeclaration | SyntaxKind::ClassExpression => self.ensure_class(node)?,
            SyntaxKind::InterfaceDeclaration => self.ensure_interface(node)?,
            SyntaxKind::EnumDeclaration => self.ensure_enum(node)?,
            SyntaxKind::EnumMember => self.ensure_enum_value(node)?,
            SyntaxKind::TypeAliasDeclaration => self.ensure_alias(node)?,
            SyntaxKind::FunctionDeclaration | SyntaxKind::FunctionExpression => {
                self.ensure_function(node)?
            }
            SyntaxKind::ArrowFunction => self.ensure_arrow_function(node)?,
            SyntaxKind::MethodDeclaration
            | SyntaxKind::MethodSignature
            | SyntaxKind::Constructor => self.ensure_method(node)?,
            SyntaxKind::GetAccessor | SyntaxKind::SetAccessor => self.ensure_accessor(node)?,
            SyntaxKind::VariableDeclaration => self.ensure_variable(node)?,
            SyntaxKind::Parameter => self.ensure_parameter(node)?,
            SyntaxKind::PropertyDeclaration | SyntaxKind::PropertySignature => {
                self.ensure_property(node)?
            }
            SyntaxKind::TypeParameter => self.ensure_type_parameter(node)?,
            SyntaxKind::Decorator => self.ensure_decorator(node)?,
            _ => return Ok(None),
        };
        Ok(Some(id))
    }

    // ========================================================================
    // Containers
    // ========================================================================

    /// The file entity.
    pub fn ensure_file(&mut self) -> IndexResult<EntityId> {
        let file = self.file;
        self.create_or_get(NodeId::ROOT, |_, core| {
            let statements = file
                .children(NodeId::ROOT)
                .iter()
                .filter(|&&c| file.kind(c).is_some_and(|k| k.is_statement()))
                .count() as u32;
            Ok(EntityBody::ScriptEntity(ContainerData {
                core,
                metrics: Metrics {
                    lines_of_code: file.lines().line_count(),
                    statements,
                    cyclomatic_complexity: 0,
                },
                is_module: file.is_module(),
                attributes: Attributes::default(),
            }))
        })
    }

    /// A namespace.
    pub fn ensure_module(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Module(ContainerData {
                core,
                metrics: Metrics {
                    lines_of_code: metrics::lines_of_code(dict.file, node),
                    statements: metrics::statement_count(dict.file, node),
                    cyclomatic_complexity: 0,
                },
                is_module: true,
                attributes: dict.attributes(node),
            }))
        })
    }

    pub fn ensure_class(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| Ok(EntityBody::Class(dict.type_data(node, core))))
    }

    pub fn ensure_interface(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Interface(dict.type_data(node, core)))
        })
    }

    pub fn ensure_enum(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| Ok(EntityBody::Enum(dict.type_data(node, core))))
    }

    pub fn ensure_alias(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            let scope = dict.type_scope(core.parent, node)?;
            let text = dict.file.get(node)?.declared_type.clone();
            let aliased = dict.intern_recovering(text.as_deref(), "aliased type", &core.name, &scope)?;
            Ok(EntityBody::Alias(AliasData {
                attributes: dict.attributes(node),
                core,
                aliased_type: Some(aliased),
            }))
        })
    }

    // ========================================================================
    // Behavioural
    // ========================================================================

    /// A function declaration or named/anonymous function expression.
    pub fn ensure_function(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Function(dict.behavioural(node, core, None)?))
        })
    }

    pub fn ensure_arrow_function(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::ArrowFunction(dict.behavioural(node, core, None)?))
        })
    }

    /// A method, method signature or constructor.
    pub fn ensure_method(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Method(dict.behavioural(node, core, None)?))
        })
    }

    pub fn ensure_accessor(&mut self, node: NodeId) -> IndexResult<EntityId> {
        let accessor = match self.file.get(node)?.kind {
            SyntaxKind::SetAccessor => AccessorKind::Set,
            _ => AccessorKind::Get,
        };
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Accessor(dict.behavioural(node, core, Some(accessor))?))
        })
    }

    // ========================================================================
    // Structural
    // ========================================================================

    pub fn ensure_variable(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Variable(dict.structural(node, core, true)?))
        })
    }

    pub fn ensure_parameter(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Parameter(dict.structural(node, core, true)?))
        })
    }

    pub fn ensure_property(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::Property(dict.structural(node, core, true)?))
        })
    }

    /// Enum members have no declared type unless the checker supplied one.
    pub fn ensure_enum_value(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |dict, core| {
            Ok(EntityBody::EnumValue(dict.structural(node, core, false)?))
        })
    }

    pub fn ensure_type_parameter(&mut self, node: NodeId) -> IndexResult<EntityId> {
        self.create_or_get(node, |_, core| Ok(EntityBody::TypeParameter(core)))
    }

    /// A decorator, attached to the declaration it decorates.
    pub fn ensure_decorator(&mut self, node: NodeId) -> IndexResult<EntityId> {
        let file = self.file;
        let target = file.parent(node).ok_or_else(|| {
            ModelError::structural(file.path(), node.0, "decorator without a decorated node")
        })?;
        let decorated = self.ensure_declaration(target)?.ok_or_else(|| {
            ModelError::structural(file.path(), target.0, "decorated node is not a declaration")
        })?;
        self.create_or_get(node, |_, core| {
            Ok(EntityBody::Decorator(DecoratorData {
                core,
                decorated,
                expression: normalize_whitespace(file.text_of(node)),
            }))
        })
    }

    /// Comment entities for the leading comments of `node`.
    pub fn ensure_comments(&mut self, node: NodeId, owner: EntityId) -> IndexResult<Vec<EntityId>> {
        let file = self.file;
        let mut out = Vec::new();
        for comment in &file.get(node)?.comments {
            let content = text::slice(file.text(), comment.span).unwrap_or_default();
            let body = EntityBody::Comment(CommentData {
                owner,
                content: content.to_string(),
                is_jsdoc: comment.is_jsdoc,
            });
            let anchor = SourceAnchor::with_lines(file.path(), comment.span, file.lines());
            let id = self.repo.next_entity_id();
            out.push(self.repo.insert(Entity::new(id, Some(anchor), body))?);
        }
        Ok(out)
    }

    // ========================================================================
    // Stubs
    // ========================================================================

    /// Placeholder for a declaration outside the indexed set.
    ///
    /// `origin` is the file or module the declaration lives in. Stubs are
    /// unanchored and shared by FQN.
    pub fn ensure_stub(&mut self, name: &str, origin: &str, kind: StubKind) -> IndexResult<EntityId> {
        let fqn = stub_fqn(origin, name);
        if let Some(id) = self.repo.id_of(&fqn) {
            return Ok(id);
        }
        let core = NamedCore::stub(name, fqn);
        let body = match kind {
            StubKind::Entity => EntityBody::NamedEntity(core),
            StubKind::Class => EntityBody::Class(stub_type(core)),
            StubKind::Interface => EntityBody::Interface(stub_type(core)),
        };
        let id = self.repo.next_entity_id();
        let id = self.repo.insert(Entity::new(id, None, body))?;
        debug!(%id, name, origin, "stub created");
        Ok(id)
    }

    /// Stub for a declaration reference that did not resolve to an entity.
    pub fn stub_for(&mut self, target: &DeclRef, project_name: Option<&str>, kind: StubKind) -> IndexResult<EntityId> {
        match target {
            DeclRef::Local { file, node } => {
                let name = project_name.map(str::to_string).unwrap_or_else(|| node.to_string());
                self.ensure_stub(&name, file, kind)
            }
            DeclRef::External { name, module } => {
                self.ensure_stub(name, module.as_deref().unwrap_or("external"), kind)
            }
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Intern a type text used at `node`, scoped to the node's container.
    pub fn intern_type(&mut self, text: &str, node: NodeId) -> IndexResult<EntityId> {
        let container = match self.entity_for(node) {
            Some(id) if self.repo.get(id).is_some_and(|e| is_type_container(e.kind())) => Some(id),
            _ => self.container_of(node)?,
        };
        let scope = self.type_scope(container, node)?;
        Ok(interner::intern(&mut *self.repo, text, &scope)?)
    }

    pub(crate) fn type_scope(&mut self, container: Option<EntityId>, node: NodeId) -> IndexResult<TypeScope> {
        let container = match container {
            Some(id) => id,
            None => self.ensure_file()?,
        };
        let container_fqn = self
            .repo
            .get(container)
            .and_then(|e| e.fqn())
            .ok_or(ModelError::UnknownEntity(container))?
            .to_string();
        Ok(TypeScope {
            container,
            container_fqn,
            anchor: self.file.anchor(node),
        })
    }

    /// Intern `text`, or the `unknown` type when the checker gave none.
    fn intern_recovering(
        &mut self,
        text: Option<&str>,
        what: &str,
        subject: &str,
        scope: &TypeScope,
    ) -> IndexResult<EntityId> {
        let text = match text {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                let err = ModelError::extraction(what, subject, "no type text available");
                warn!(%err, file = self.file.path(), "falling back to the unknown type");
                UNKNOWN_TYPE
            }
        };
        Ok(interner::intern(&mut *self.repo, text, scope)?)
    }

    // ========================================================================
    // Associations
    // ========================================================================

    pub fn add_import(
        &mut self,
        site: NodeId,
        importer: EntityId,
        imported: EntityId,
        module_specifier: String,
    ) -> IndexResult<EntityId> {
        self.add_association(
            site,
            EntityBody::ImportClause(ImportClauseData {
                importer,
                imported,
                module_specifier,
            }),
        )
    }

    pub fn add_inheritance(
        &mut self,
        site: NodeId,
        subclass: EntityId,
        superclass: EntityId,
        heritage: HeritageKind,
    ) -> IndexResult<EntityId> {
        self.add_association(
            site,
            EntityBody::Inheritance(InheritanceData {
                subclass,
                superclass,
                heritage,
            }),
        )
    }

    pub fn add_access(
        &mut self,
        site: NodeId,
        accessor: EntityId,
        variable: EntityId,
        is_write: bool,
    ) -> IndexResult<EntityId> {
        self.add_association(
            site,
            EntityBody::Access(AccessData {
                accessor,
                variable,
                is_write,
            }),
        )
    }

    pub fn add_invocation(
        &mut self,
        site: NodeId,
        sender: EntityId,
        receiver: Option<EntityId>,
        candidates: Vec<EntityId>,
    ) -> IndexResult<EntityId> {
        let signature = normalize_whitespace(self.file.text_of(site));
        self.add_association(
            site,
            EntityBody::Invocation(InvocationData {
                sender,
                receiver,
                candidates,
                signature,
            }),
        )
    }

    pub fn add_reference(&mut self, site: NodeId, source: EntityId, target: EntityId) -> IndexResult<EntityId> {
        self.add_association(site, EntityBody::Reference(ReferenceData { source, target }))
    }

    fn add_association(&mut self, site: NodeId, body: EntityBody) -> IndexResult<EntityId> {
        let id = self.repo.next_entity_id();
        Ok(self.repo.insert(Entity::new(id, Some(self.file.anchor(site)), body))?)
    }

    // ========================================================================
    // Construction helpers
    // ========================================================================

    fn create_or_get<F>(&mut self, node: NodeId, build: F) -> IndexResult<EntityId>
    where
        F: FnOnce(&mut Self, NamedCore) -> IndexResult<EntityBody>,
    {
        let fqn = self.names.resolve(self.file, node)?;
        if let Some(id) = self.repo.id_of(&fqn) {
            return Ok(id);
        }
        let parent = self.container_of(node)?;
        let core = NamedCore::new(self.display_name(node), fqn, parent);
        let body = build(self, core)?;
        let id = self.repo.next_entity_id();
        let entity = Entity::new(id, Some(self.file.anchor(node)), body);
        let id = self
            .repo
            .insert_with_source(entity, SourceNode::new(self.file.path(), node))?;
        if self.options.index_comments {
            self.ensure_comments(node, id)?;
        }
        Ok(id)
    }

    /// Entity of the nearest enclosing container node.
    fn container_of(&self, node: NodeId) -> IndexResult<Option<EntityId>> {
        if node == NodeId::ROOT {
            return Ok(None);
        }
        let file = self.file;
        for ancestor in file.ancestors(node) {
            let Some(kind) = file.kind(ancestor) else { continue };
            if !is_container_node(kind) {
                continue;
            }
            return match self.entity_for(ancestor) {
                Some(id) => Ok(Some(id)),
                None => Err(ModelError::structural(
                    file.path(),
                    node.0,
                    format!("container {ancestor} ({kind}) has no entity yet"),
                )
                .into()),
            };
        }
        Err(ModelError::structural(file.path(), node.0, "no enclosing container").into())
    }

    fn display_name(&self, node: NodeId) -> String {
        let file = self.file;
        let Some(n) = file.node(node) else {
            return String::new();
        };
        match n.kind {
            SyntaxKind::SourceFile => file.path().to_string(),
            SyntaxKind::Constructor => "constructor".to_string(),
            _ => n.name.clone().unwrap_or_else(|| {
                let (line, col) = file.position(node);
                format!("{}({}:{})", n.kind.as_str(), line, col)
            }),
        }
    }

    /// Modifiers of a node, including those written on its variable statement.
    fn modifiers(&self, node: NodeId) -> Vec<Modifier> {
        let file = self.file;
        let Some(n) = file.node(node) else {
            return Vec::new();
        };
        let mut out = n.modifiers.clone();
        if n.kind == SyntaxKind::VariableDeclaration {
            if let Some(statement) = n
                .parent
                .and_then(|p| file.node(p))
                .filter(|p| p.kind == SyntaxKind::VariableStatement)
            {
                out.extend(statement.modifiers.iter().copied());
            }
        }
        out
    }

    fn attributes(&self, node: NodeId) -> Attributes {
        let modifiers = self.modifiers(node);
        let has = |m: Modifier| modifiers.contains(&m);
        let is_private_name = self
            .file
            .node(node)
            .and_then(|n| n.name.as_deref())
            .is_some_and(|name| name.starts_with('#'));
        let visibility = if has(Modifier::Private) || (is_private_name && self.options.hash_names_private) {
            Visibility::Private
        } else if has(Modifier::Protected) {
            Visibility::Protected
        } else {
            Visibility::Public
        };
        Attributes {
            visibility,
            is_static: has(Modifier::Static),
            is_abstract: has(Modifier::Abstract),
            is_readonly: has(Modifier::Readonly),
            is_optional: has(Modifier::Optional),
            is_definite: has(Modifier::Definite),
            is_exported: has(Modifier::Export),
            is_default_export: has(Modifier::Default),
            is_ambient: names::is_ambient(self.file, node),
            is_async: has(Modifier::Async),
            is_const: has(Modifier::Const),
            is_private_name,
        }
    }

    fn type_data(&self, node: NodeId, core: NamedCore) -> TypeData {
        TypeData {
            core,
            metrics: Metrics {
                lines_of_code: metrics::lines_of_code(self.file, node),
                ..Metrics::default()
            },
            attributes: self.attributes(node),
            is_generic: self.has_type_parameters(node),
            concrete_parameters: Vec::new(),
        }
    }

    fn behavioural(
        &mut self,
        node: NodeId,
        core: NamedCore,
        accessor: Option<AccessorKind>,
    ) -> IndexResult<BehaviouralData> {
        let file = self.file;
        let n = file.get(node)?;
        let is_constructor = n.kind == SyntaxKind::Constructor;
        let return_type = if is_constructor || accessor == Some(AccessorKind::Set) {
            None
        } else {
            let scope = self.type_scope(core.parent, node)?;
            Some(self.intern_recovering(n.return_type.as_deref(), "return type", &core.name, &scope)?)
        };
        let parameter_count = file
            .children(node)
            .iter()
            .filter(|&&c| file.kind(c) == Some(SyntaxKind::Parameter))
            .count() as u32;
        let metrics = Metrics {
            lines_of_code: metrics::lines_of_code(file, node),
            statements: metrics::statement_count(file, node),
            cyclomatic_complexity: self.metrics.cyclomatic_complexity(file, node, &core.name),
        };
        Ok(BehaviouralData {
            metrics,
            attributes: self.attributes(node),
            signature: signature_text(file, n),
            return_type,
            parameter_count,
            is_generic: self.has_type_parameters(node),
            concrete_parameters: Vec::new(),
            is_constructor,
            accessor,
            core,
        })
    }

    fn structural(&mut self, node: NodeId, core: NamedCore, required: bool) -> IndexResult<StructuralData> {
        let text = self.file.get(node)?.declared_type.clone();
        let declared_type = match (text, required) {
            (None, false) => None,
            (text, _) => {
                let scope = self.type_scope(core.parent, node)?;
                Some(self.intern_recovering(text.as_deref(), "declared type", &core.name, &scope)?)
            }
        };
        Ok(StructuralData {
            attributes: self.attributes(node),
            core,
            declared_type,
        })
    }

    fn has_type_parameters(&self, node: NodeId) -> bool {
        self.file
            .children(node)
            .iter()
            .any(|&c| self.file.kind(c) == Some(SyntaxKind::TypeParameter))
    }
}

/// Declaration text up to the body, whitespace-normalized.
fn signature_text(file: &SourceFile, node: &SyntaxNode) -> String {
    let start = node.span.start;
    let end = node
        .body
        .and_then(|b| file.node(b))
        .map(|b| b.span.start)
        .unwrap_or(node.span.end)
        .max(start);
    let raw = text::slice(file.text(), Span::new(start, end)).unwrap_or_default();
    normalize_whitespace(raw)
        .trim_end_matches(|c: char| c == ';' || c == '{' || c.is_whitespace())
        .to_string()
}

fn stub_type(core: NamedCore) -> TypeData {
    TypeData {
        core,
        metrics: Metrics::default(),
        attributes: Attributes::default(),
        is_generic: false,
        concrete_parameters: Vec::new(),
    }
}

/// FQN of a stub declared in `origin`.
pub fn stub_fqn(origin: &str, name: &str) -> String {
    format!("{{{origin}}}.{name}")
}

/// Node kinds whose entity owns the declarations nested in them.
fn is_container_node(kind: SyntaxKind) -> bool {
    kind.is_function_like()
        || matches!(
            kind,
            SyntaxKind::SourceFile
                | SyntaxKind::ModuleDeclaration
                | SyntaxKind::ClassDeclaration
                | SyntaxKind::ClassExpression
                | SyntaxKind::InterfaceDeclaration
                | SyntaxKind::EnumDeclaration
                | SyntaxKind::TypeAliasDeclaration
        )
}

/// Entities that can scope interned types.
fn is_type_container(kind: EntityKind) -> bool {
    kind.is_container() || kind.is_behavioural() || kind == EntityKind::Alias
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DecisionPointCounter;
    use tsfamix_core::adapter::SourceFileBuilder;

    struct Fixture {
        file: SourceFile,
        class: NodeId,
        method: NodeId,
        field: NodeId,
        untyped: NodeId,
    }

    fn fixture() -> Fixture {
        let text = "/** Shape */\nexport abstract class Shape {\n  #id: number;\n  color;\n  protected static area(scale: number): number { return 1; }\n}";
        let find = |needle: &str| text.find(needle).expect("needle") as u32;
        let mut b = SourceFileBuilder::new("src/shape.ts", text);
        let class = b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::ClassDeclaration, Span::new(find("export"), text.len() as u32))
                .with_name("Shape")
                .with_modifier(Modifier::Export)
                .with_modifier(Modifier::Abstract)
                .with_comment(Span::new(0, 12), true),
        );
        let field = b.add(
            class,
            SyntaxNode::new(SyntaxKind::PropertyDeclaration, Span::new(find("#id"), find("#id") + 12))
                .with_name("#id")
                .with_type("number"),
        );
        let untyped = b.add(
            class,
            SyntaxNode::new(SyntaxKind::PropertyDeclaration, Span::new(find("color"), find("color") + 6))
                .with_name("color"),
        );
        let start = find("protected");
        let end = find("1; }") + 4;
        let method = b.add(
            class,
            SyntaxNode::new(SyntaxKind::MethodDeclaration, Span::new(start, end))
                .with_name("area")
                .with_modifier(Modifier::Protected)
                .with_modifier(Modifier::Static)
                .with_return_type("number"),
        );
        b.add(
            method,
            SyntaxNode::new(SyntaxKind::Parameter, Span::new(find("scale"), find("scale") + 13))
                .with_name("scale")
                .with_type("number"),
        );
        let body = b.add_body(method, SyntaxNode::new(SyntaxKind::Block, Span::new(find("{ return"), end)));
        b.add(body, SyntaxNode::new(SyntaxKind::ReturnStatement, Span::new(find("return"), find("1; }") + 2)));
        Fixture {
            file: b.finish().unwrap(),
            class,
            method,
            field,
            untyped,
        }
    }

    fn with_dictionary<R>(fx: &Fixture, f: impl FnOnce(&mut EntityDictionary<'_>) -> R) -> (ModelRepository, R) {
        let mut repo = ModelRepository::new();
        let mut names = NameResolver::new();
        let counter = DecisionPointCounter;
        let result = {
            let mut dict = EntityDictionary::new(&mut repo, &mut names, &fx.file, DictionaryOptions::default(), &counter);
            f(&mut dict)
        };
        (repo, result)
    }

    mod construction {
        use super::*;

        #[test]
        fn create_or_get_is_idempotent() {
            let fx = fixture();
            let (repo, (a, b)) = with_dictionary(&fx, |dict| {
                dict.ensure_file().unwrap();
                let a = dict.ensure_class(fx.class).unwrap();
                let b = dict.ensure_class(fx.class).unwrap();
                (a, b)
            });
            assert_eq!(a, b);
            assert_eq!(repo.by_kind(EntityKind::Class).len(), 1);
        }

        #[test]
        fn member_before_container_is_structural() {
            let fx = fixture();
            let (_, result) = with_dictionary(&fx, |dict| dict.ensure_method(fx.method));
            let err = result.unwrap_err();
            assert_eq!(err.category(), tsfamix_core::error::ErrorCategory::Structural);
        }

        #[test]
        fn class_attributes_and_comment() {
            let fx = fixture();
            let (repo, class) = with_dictionary(&fx, |dict| {
                dict.ensure_file().unwrap();
                dict.ensure_class(fx.class).unwrap()
            });
            let entity = repo.get(class).unwrap();
            let attrs = entity.attributes().unwrap();
            assert!(attrs.is_abstract);
            assert!(attrs.is_exported);
            let comments = repo.comments(class);
            assert_eq!(comments.len(), 1);
            let EntityBody::Comment(data) = &repo.get(comments[0]).unwrap().body else {
                panic!("expected a comment");
            };
            assert_eq!(data.content, "/** Shape */");
            assert!(data.is_jsdoc);
        }
    }

    mod attributes {
        use super::*;

        #[test]
        fn method_signature_and_metrics() {
            let fx = fixture();
            let (repo, method) = with_dictionary(&fx, |dict| {
                dict.ensure_file().unwrap();
                dict.ensure_class(fx.class).unwrap();
                dict.ensure_method(fx.method).unwrap()
            });
            let EntityBody::Method(data) = &repo.get(method).unwrap().body else {
                panic!("expected a method");
            };
            assert_eq!(data.signature, "protected static area(scale: number): number");
            assert_eq!(data.parameter_count, 1);
            assert_eq!(data.metrics.cyclomatic_complexity, 1);
            assert_eq!(data.metrics.statements, 1);
            assert_eq!(data.attributes.visibility, Visibility::Protected);
            assert!(data.attributes.is_static);
            let ret = repo.get(data.return_type.unwrap()).unwrap();
            assert_eq!(ret.kind(), EntityKind::PrimitiveType);
            assert_eq!(ret.name(), Some("number"));
        }

        #[test]
        fn hash_names_are_private() {
            let fx = fixture();
            let (repo, field) = with_dictionary(&fx, |dict| {
                dict.ensure_file().unwrap();
                dict.ensure_class(fx.class).unwrap();
                dict.ensure_property(fx.field).unwrap()
            });
            let attrs = repo.get(field).unwrap().attributes().unwrap().clone();
            assert_eq!(attrs.visibility, Visibility::Private);
            assert!(attrs.is_private_name);
        }

        #[test]
        fn missing_type_falls_back_to_unknown() {
            let fx = fixture();
            let (repo, prop) = with_dictionary(&fx, |dict| {
                dict.ensure_file().unwrap();
                dict.ensure_class(fx.class).unwrap();
                dict.ensure_property(fx.untyped).unwrap()
            });
            let ty = repo.get(prop).unwrap().declared_type().unwrap();
            assert_eq!(repo.get(ty).unwrap().fqn(), Some(UNKNOWN_TYPE));
        }
    }

    mod types {
        use super::*;

        #[test]
        fn intern_type_scopes_to_the_enclosing_container() {
            let fx = fixture();
            let (repo, (in_method, again, in_field, primitive)) = with_dictionary(&fx, |dict| {
                dict.ensure_file().unwrap();
                dict.ensure_class(fx.class).unwrap();
                dict.ensure_method(fx.method).unwrap();
                dict.ensure_property(fx.field).unwrap();
                let in_method = dict.intern_type("Shape | null", fx.method).unwrap();
                let again = dict.intern_type("Shape  |  null", fx.method).unwrap();
                let in_field = dict.intern_type("Color", fx.field).unwrap();
                let primitive = dict.intern_type("number", fx.field).unwrap();
                (in_method, again, in_field, primitive)
            });
            assert_eq!(in_method, again);
            let ty = repo.get(in_method).unwrap();
            assert_eq!(ty.kind(), EntityKind::Type);
            assert_eq!(ty.fqn(), Some("{src/shape.ts}.Shape.area.Shape | null[Type]"));
            assert_eq!(ty.file(), Some("src/shape.ts"));
            // A property is not a container; its class owns the type.
            let class = repo.id_of("{src/shape.ts}.Shape[ClassDeclaration]").unwrap();
            assert_eq!(repo.get(in_field).unwrap().parent(), Some(class));
            assert_eq!(repo.get(primitive).unwrap().fqn(), Some("number"));
        }
    }

    mod stubs {
        use super::*;

        #[test]
        fn stubs_are_shared_and_unanchored() {
            let fx = fixture();
            let (repo, (a, b)) = with_dictionary(&fx, |dict| {
                let a = dict.ensure_stub("Base", "lib", StubKind::Class).unwrap();
                let b = dict
                    .stub_for(
                        &DeclRef::External {
                            name: "Base".to_string(),
                            module: Some("lib".to_string()),
                        },
                        None,
                        StubKind::Class,
                    )
                    .unwrap();
                (a, b)
            });
            assert_eq!(a, b);
            let stub = repo.get(a).unwrap();
            assert!(stub.is_stub());
            assert!(stub.anchor.is_none());
            assert_eq!(stub.fqn(), Some("{lib}.Base"));
        }
    }
}
