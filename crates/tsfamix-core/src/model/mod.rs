//! Entity model: the nodes and edges of the code graph.
//!
//! Every entity is an [`Entity`]: a repository-assigned [`EntityId`], an
//! optional [`SourceAnchor`], and an [`EntityBody`] carrying the per-kind
//! payload. The body is a closed sum type; code that branches on entity
//! category matches on it exhaustively.
//!
//! # Relationships
//!
//! Entities never hold back-pointers. Each relationship is stored once, as an
//! endpoint id on the entity that owns it:
//!
//! | Holder | Field | Opposite collection (computed) |
//! |--------|-------|--------------------------------|
//! | any named entity | `parent` | child types/functions/variables |
//! | [`InheritanceData`] | `subclass` / `superclass` | super/sub inheritances |
//! | [`ImportClauseData`] | `importer` / `imported` | outgoing/incoming imports |
//! | [`AccessData`] | `accessor` / `variable` | accesses/incoming accesses |
//! | [`InvocationData`] | `sender` / `receiver` / `candidates` | outgoing/received invocations |
//! | [`ConcretisationData`] | `generic` / `concrete` | generic/concrete concretisations |
//!
//! The opposite side is answered by the repository's referrer index, so
//! removal and integrity checks live in one place. [`Entity::references`]
//! enumerates every outgoing id with its [`Role`]; [`Entity::detach`] clears a
//! reference to a removed entity and reports whether the holder must go too.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::anchor::SourceAnchor;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for an entity within one repository.
///
/// Ids are allocated in increasing order and never reused, so iteration in id
/// order is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Create a new entity ID.
    pub fn new(id: u32) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ent_{}", self.0)
    }
}

/// Closed set of entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ScriptEntity,
    Module,
    Class,
    Interface,
    Enum,
    EnumValue,
    Alias,
    Function,
    ArrowFunction,
    Method,
    Accessor,
    Variable,
    Parameter,
    Property,
    TypeParameter,
    Type,
    PrimitiveType,
    ParameterType,
    Decorator,
    Comment,
    /// Placeholder for a referenced declaration whose category is unknown.
    NamedEntity,
    Access,
    Invocation,
    Inheritance,
    ImportClause,
    Reference,
    Concretisation,
    ParameterConcretisation,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 28] = [
        EntityKind::ScriptEntity,
        EntityKind::Module,
        EntityKind::Class,
        EntityKind::Interface,
        EntityKind::Enum,
        EntityKind::EnumValue,
        EntityKind::Alias,
        EntityKind::Function,
        EntityKind::ArrowFunction,
        EntityKind::Method,
        EntityKind::Accessor,
        EntityKind::Variable,
        EntityKind::Parameter,
        EntityKind::Property,
        EntityKind::TypeParameter,
        EntityKind::Type,
        EntityKind::PrimitiveType,
        EntityKind::ParameterType,
        EntityKind::Decorator,
        EntityKind::Comment,
        EntityKind::NamedEntity,
        EntityKind::Access,
        EntityKind::Invocation,
        EntityKind::Inheritance,
        EntityKind::ImportClause,
        EntityKind::Reference,
        EntityKind::Concretisation,
        EntityKind::ParameterConcretisation,
    ];

    /// Stable display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ScriptEntity => "ScriptEntity",
            EntityKind::Module => "Module",
            EntityKind::Class => "Class",
            EntityKind::Interface => "Interface",
            EntityKind::Enum => "Enum",
            EntityKind::EnumValue => "EnumValue",
            EntityKind::Alias => "Alias",
            EntityKind::Function => "Function",
            EntityKind::ArrowFunction => "ArrowFunction",
            EntityKind::Method => "Method",
            EntityKind::Accessor => "Accessor",
            EntityKind::Variable => "Variable",
            EntityKind::Parameter => "Parameter",
            EntityKind::Property => "Property",
            EntityKind::TypeParameter => "TypeParameter",
            EntityKind::Type => "Type",
            EntityKind::PrimitiveType => "PrimitiveType",
            EntityKind::ParameterType => "ParameterType",
            EntityKind::Decorator => "Decorator",
            EntityKind::Comment => "Comment",
            EntityKind::NamedEntity => "NamedEntity",
            EntityKind::Access => "Access",
            EntityKind::Invocation => "Invocation",
            EntityKind::Inheritance => "Inheritance",
            EntityKind::ImportClause => "ImportClause",
            EntityKind::Reference => "Reference",
            EntityKind::Concretisation => "Concretisation",
            EntityKind::ParameterConcretisation => "ParameterConcretisation",
        }
    }

    /// Association kinds are unnamed edges between two or more entities.
    pub fn is_association(&self) -> bool {
        matches!(
            self,
            EntityKind::Access
                | EntityKind::Invocation
                | EntityKind::Inheritance
                | EntityKind::ImportClause
                | EntityKind::Reference
                | EntityKind::Concretisation
                | EntityKind::ParameterConcretisation
        )
    }

    /// Kinds that can contain declarations and carry structural metrics.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            EntityKind::ScriptEntity
                | EntityKind::Module
                | EntityKind::Class
                | EntityKind::Interface
                | EntityKind::Enum
        ) || self.is_behavioural()
    }

    /// Function-like kinds.
    pub fn is_behavioural(&self) -> bool {
        matches!(
            self,
            EntityKind::Function
                | EntityKind::ArrowFunction
                | EntityKind::Method
                | EntityKind::Accessor
        )
    }

    /// Kinds with a declared type.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EntityKind::Variable
                | EntityKind::Parameter
                | EntityKind::Property
                | EntityKind::EnumValue
        )
    }

    /// Kinds that appear as child types of a container.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            EntityKind::Class
                | EntityKind::Interface
                | EntityKind::Enum
                | EntityKind::Alias
                | EntityKind::Type
                | EntityKind::PrimitiveType
                | EntityKind::ParameterType
                | EntityKind::TypeParameter
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Declared access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Which side of a heritage clause an inheritance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeritageKind {
    #[default]
    Extends,
    Implements,
}

/// Get or set accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    Get,
    Set,
}

/// Modifier flags shared by declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub visibility: Visibility,
    /// Class-side member.
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_readonly: bool,
    /// Declared with `?`.
    pub is_optional: bool,
    /// Declared with `!`.
    pub is_definite: bool,
    pub is_exported: bool,
    pub is_default_export: bool,
    /// Declared with `declare` or inside an ambient context.
    pub is_ambient: bool,
    pub is_async: bool,
    pub is_const: bool,
    /// Runtime-private `#name` member.
    pub is_private_name: bool,
}

/// Structural metrics of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub lines_of_code: u32,
    pub statements: u32,
    pub cyclomatic_complexity: u32,
}

// ============================================================================
// Payloads
// ============================================================================

/// Fields every named entity carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCore {
    pub name: String,
    pub fqn: String,
    /// Placeholder for a declaration outside the indexed set.
    pub is_stub: bool,
    /// Structural container.
    pub parent: Option<EntityId>,
}

impl NamedCore {
    pub fn new(name: impl Into<String>, fqn: impl Into<String>, parent: Option<EntityId>) -> Self {
        NamedCore {
            name: name.into(),
            fqn: fqn.into(),
            is_stub: false,
            parent,
        }
    }

    /// A stub core: no container, flagged `is_stub`.
    pub fn stub(name: impl Into<String>, fqn: impl Into<String>) -> Self {
        NamedCore {
            is_stub: true,
            ..NamedCore::new(name, fqn, None)
        }
    }
}

/// Files and namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerData {
    pub core: NamedCore,
    pub metrics: Metrics,
    /// The file has import or export declarations.
    pub is_module: bool,
    pub attributes: Attributes,
}

/// Classes, interfaces and enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeData {
    pub core: NamedCore,
    pub metrics: Metrics,
    pub attributes: Attributes,
    /// Declares type parameters.
    pub is_generic: bool,
    /// Arguments of a concrete (instantiated) clone.
    pub concrete_parameters: Vec<EntityId>,
}

/// Functions, methods, accessors and arrow functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviouralData {
    pub core: NamedCore,
    pub metrics: Metrics,
    pub attributes: Attributes,
    /// Declaration text up to the body.
    pub signature: String,
    pub return_type: Option<EntityId>,
    pub parameter_count: u32,
    pub is_generic: bool,
    pub concrete_parameters: Vec<EntityId>,
    pub is_constructor: bool,
    pub accessor: Option<AccessorKind>,
}

/// Variables, parameters, properties and enum values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralData {
    pub core: NamedCore,
    pub attributes: Attributes,
    pub declared_type: Option<EntityId>,
}

/// Generic instantiation such as `Map<string, number>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterTypeData {
    pub core: NamedCore,
    pub base: Option<EntityId>,
    pub arguments: Vec<EntityId>,
}

/// Type alias declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasData {
    pub core: NamedCore,
    pub attributes: Attributes,
    pub aliased_type: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratorData {
    pub core: NamedCore,
    pub decorated: EntityId,
    /// Source text of the decorator expression.
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentData {
    pub owner: EntityId,
    pub content: String,
    pub is_jsdoc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessData {
    pub accessor: EntityId,
    pub variable: EntityId,
    pub is_write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationData {
    pub sender: EntityId,
    pub receiver: Option<EntityId>,
    pub candidates: Vec<EntityId>,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceData {
    pub subclass: EntityId,
    pub superclass: EntityId,
    pub heritage: HeritageKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportClauseData {
    pub importer: EntityId,
    pub imported: EntityId,
    /// Project-relative module path when resolved, else the raw specifier.
    pub module_specifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub source: EntityId,
    pub target: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcretisationData {
    pub generic: EntityId,
    pub concrete: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterConcretisationData {
    pub generic_parameter: EntityId,
    pub concrete_parameter: EntityId,
    pub concretisations: Vec<EntityId>,
}

/// Per-kind payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityBody {
    ScriptEntity(ContainerData),
    Module(ContainerData),
    Class(TypeData),
    Interface(TypeData),
    Enum(TypeData),
    EnumValue(StructuralData),
    Alias(AliasData),
    Function(BehaviouralData),
    ArrowFunction(BehaviouralData),
    Method(BehaviouralData),
    Accessor(BehaviouralData),
    Variable(StructuralData),
    Parameter(StructuralData),
    Property(StructuralData),
    TypeParameter(NamedCore),
    Type(NamedCore),
    PrimitiveType(NamedCore),
    ParameterType(ParameterTypeData),
    Decorator(DecoratorData),
    Comment(CommentData),
    NamedEntity(NamedCore),
    Access(AccessData),
    Invocation(InvocationData),
    Inheritance(InheritanceData),
    ImportClause(ImportClauseData),
    Reference(ReferenceData),
    Concretisation(ConcretisationData),
    ParameterConcretisation(ParameterConcretisationData),
}

// ============================================================================
// Roles
// ============================================================================

/// The role an outgoing reference plays on its holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    DeclaredType,
    ReturnType,
    ConcreteParameter,
    BaseType,
    TypeArgument,
    AliasedType,
    Decorated,
    CommentOwner,
    Accessor,
    Variable,
    Sender,
    Receiver,
    Candidate,
    Subclass,
    Superclass,
    Importer,
    Imported,
    ReferenceSource,
    ReferenceTarget,
    Generic,
    Concrete,
    GenericParameter,
    ConcreteArgument,
    Concretisation,
}

impl Role {
    /// Losing the referenced entity means losing the holder.
    pub fn is_mandatory(&self) -> bool {
        !matches!(
            self,
            Role::DeclaredType
                | Role::ReturnType
                | Role::ConcreteParameter
                | Role::BaseType
                | Role::TypeArgument
                | Role::AliasedType
                | Role::Receiver
                | Role::Candidate
                | Role::Concretisation
        )
    }
}

/// Outcome of [`Entity::detach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// The reference was cleared; the holder stays valid.
    Keep,
    /// The holder cannot exist without the removed entity.
    Drop,
}

/// Structural identity of an unnamed entity, used to avoid recording the
/// same edge twice when a file is resolved again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationKey {
    pub kind: EntityKind,
    pub ends: Vec<EntityId>,
    /// `(file, start)` for per-site edges.
    pub site: Option<(String, u32)>,
}

// ============================================================================
// Entity
// ============================================================================

/// A node of the code graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<SourceAnchor>,
    pub body: EntityBody,
}

impl Entity {
    pub fn new(id: EntityId, anchor: Option<SourceAnchor>, body: EntityBody) -> Self {
        Entity { id, anchor, body }
    }

    pub fn kind(&self) -> EntityKind {
        match &self.body {
            EntityBody::ScriptEntity(_) => EntityKind::ScriptEntity,
            EntityBody::Module(_) => EntityKind::Module,
            EntityBody::Class(_) => EntityKind::Class,
            EntityBody::Interface(_) => EntityKind::Interface,
            EntityBody::Enum(_) => EntityKind::Enum,
            EntityBody::EnumValue(_) => EntityKind::EnumValue,
            EntityBody::Alias(_) => EntityKind::Alias,
            EntityBody::Function(_) => EntityKind::Function,
            EntityBody::ArrowFunction(_) => EntityKind::ArrowFunction,
            EntityBody::Method(_) => EntityKind::Method,
            EntityBody::Accessor(_) => EntityKind::Accessor,
            EntityBody::Variable(_) => EntityKind::Variable,
            EntityBody::Parameter(_) => EntityKind::Parameter,
            EntityBody::Property(_) => EntityKind::Property,
            EntityBody::TypeParameter(_) => EntityKind::TypeParameter,
            EntityBody::Type(_) => EntityKind::Type,
            EntityBody::PrimitiveType(_) => EntityKind::PrimitiveType,
            EntityBody::ParameterType(_) => EntityKind::ParameterType,
            EntityBody::Decorator(_) => EntityKind::Decorator,
            EntityBody::Comment(_) => EntityKind::Comment,
            EntityBody::NamedEntity(_) => EntityKind::NamedEntity,
            EntityBody::Access(_) => EntityKind::Access,
            EntityBody::Invocation(_) => EntityKind::Invocation,
            EntityBody::Inheritance(_) => EntityKind::Inheritance,
            EntityBody::ImportClause(_) => EntityKind::ImportClause,
            EntityBody::Reference(_) => EntityKind::Reference,
            EntityBody::Concretisation(_) => EntityKind::Concretisation,
            EntityBody::ParameterConcretisation(_) => EntityKind::ParameterConcretisation,
        }
    }

    /// The named core, for named kinds.
    pub fn named(&self) -> Option<&NamedCore> {
        match &self.body {
            EntityBody::ScriptEntity(d) | EntityBody::Module(d) => Some(&d.core),
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => Some(&d.core),
            EntityBody::EnumValue(d)
            | EntityBody::Variable(d)
            | EntityBody::Parameter(d)
            | EntityBody::Property(d) => Some(&d.core),
            EntityBody::Alias(d) => Some(&d.core),
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => Some(&d.core),
            EntityBody::TypeParameter(c)
            | EntityBody::Type(c)
            | EntityBody::PrimitiveType(c)
            | EntityBody::NamedEntity(c) => Some(c),
            EntityBody::ParameterType(d) => Some(&d.core),
            EntityBody::Decorator(d) => Some(&d.core),
            EntityBody::Comment(_)
            | EntityBody::Access(_)
            | EntityBody::Invocation(_)
            | EntityBody::Inheritance(_)
            | EntityBody::ImportClause(_)
            | EntityBody::Reference(_)
            | EntityBody::Concretisation(_)
            | EntityBody::ParameterConcretisation(_) => None,
        }
    }

    pub fn named_mut(&mut self) -> Option<&mut NamedCore> {
        match &mut self.body {
            EntityBody::ScriptEntity(d) | EntityBody::Module(d) => Some(&mut d.core),
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                Some(&mut d.core)
            }
            EntityBody::EnumValue(d)
            | EntityBody::Variable(d)
            | EntityBody::Parameter(d)
            | EntityBody::Property(d) => Some(&mut d.core),
            EntityBody::Alias(d) => Some(&mut d.core),
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => Some(&mut d.core),
            EntityBody::TypeParameter(c)
            | EntityBody::Type(c)
            | EntityBody::PrimitiveType(c)
            | EntityBody::NamedEntity(c) => Some(c),
            EntityBody::ParameterType(d) => Some(&mut d.core),
            EntityBody::Decorator(d) => Some(&mut d.core),
            EntityBody::Comment(_)
            | EntityBody::Access(_)
            | EntityBody::Invocation(_)
            | EntityBody::Inheritance(_)
            | EntityBody::ImportClause(_)
            | EntityBody::Reference(_)
            | EntityBody::Concretisation(_)
            | EntityBody::ParameterConcretisation(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.named().map(|c| c.name.as_str())
    }

    pub fn fqn(&self) -> Option<&str> {
        self.named().map(|c| c.fqn.as_str())
    }

    pub fn is_stub(&self) -> bool {
        self.named().is_some_and(|c| c.is_stub)
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.named().and_then(|c| c.parent)
    }

    /// Project-relative path of the anchoring file.
    pub fn file(&self) -> Option<&str> {
        self.anchor.as_ref().map(|a| a.file.as_str())
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        match &self.body {
            EntityBody::ScriptEntity(d) | EntityBody::Module(d) => Some(&d.metrics),
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                Some(&d.metrics)
            }
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => Some(&d.metrics),
            _ => None,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match &self.body {
            EntityBody::ScriptEntity(d) | EntityBody::Module(d) => Some(&d.attributes),
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                Some(&d.attributes)
            }
            EntityBody::EnumValue(d)
            | EntityBody::Variable(d)
            | EntityBody::Parameter(d)
            | EntityBody::Property(d) => Some(&d.attributes),
            EntityBody::Alias(d) => Some(&d.attributes),
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => Some(&d.attributes),
            _ => None,
        }
    }

    /// Declared type of a structural entity.
    pub fn declared_type(&self) -> Option<EntityId> {
        match &self.body {
            EntityBody::EnumValue(d)
            | EntityBody::Variable(d)
            | EntityBody::Parameter(d)
            | EntityBody::Property(d) => d.declared_type,
            _ => None,
        }
    }

    /// Concrete arguments of an instantiated clone.
    pub fn concrete_parameters(&self) -> &[EntityId] {
        match &self.body {
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                &d.concrete_parameters
            }
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => &d.concrete_parameters,
            _ => &[],
        }
    }

    pub fn is_generic(&self) -> bool {
        match &self.body {
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => d.is_generic,
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => d.is_generic,
            _ => false,
        }
    }

    /// Every outgoing entity reference with its role.
    pub fn references(&self) -> Vec<(EntityId, Role)> {
        let mut out = Vec::new();
        if let Some(parent) = self.parent() {
            out.push((parent, Role::Parent));
        }
        match &self.body {
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                out.extend(d.concrete_parameters.iter().map(|&p| (p, Role::ConcreteParameter)));
            }
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => {
                out.extend(d.return_type.map(|t| (t, Role::ReturnType)));
                out.extend(d.concrete_parameters.iter().map(|&p| (p, Role::ConcreteParameter)));
            }
            EntityBody::EnumValue(d)
            | EntityBody::Variable(d)
            | EntityBody::Parameter(d)
            | EntityBody::Property(d) => {
                out.extend(d.declared_type.map(|t| (t, Role::DeclaredType)));
            }
            EntityBody::Alias(d) => {
                out.extend(d.aliased_type.map(|t| (t, Role::AliasedType)));
            }
            EntityBody::ParameterType(d) => {
                out.extend(d.base.map(|t| (t, Role::BaseType)));
                out.extend(d.arguments.iter().map(|&a| (a, Role::TypeArgument)));
            }
            EntityBody::Decorator(d) => out.push((d.decorated, Role::Decorated)),
            EntityBody::Comment(d) => out.push((d.owner, Role::CommentOwner)),
            EntityBody::Access(d) => {
                out.push((d.accessor, Role::Accessor));
                out.push((d.variable, Role::Variable));
            }
            EntityBody::Invocation(d) => {
                out.push((d.sender, Role::Sender));
                out.extend(d.receiver.map(|r| (r, Role::Receiver)));
                out.extend(d.candidates.iter().map(|&c| (c, Role::Candidate)));
            }
            EntityBody::Inheritance(d) => {
                out.push((d.subclass, Role::Subclass));
                out.push((d.superclass, Role::Superclass));
            }
            EntityBody::ImportClause(d) => {
                out.push((d.importer, Role::Importer));
                out.push((d.imported, Role::Imported));
            }
            EntityBody::Reference(d) => {
                out.push((d.source, Role::ReferenceSource));
                out.push((d.target, Role::ReferenceTarget));
            }
            EntityBody::Concretisation(d) => {
                out.push((d.generic, Role::Generic));
                out.push((d.concrete, Role::Concrete));
            }
            EntityBody::ParameterConcretisation(d) => {
                out.push((d.generic_parameter, Role::GenericParameter));
                out.push((d.concrete_parameter, Role::ConcreteArgument));
                out.extend(d.concretisations.iter().map(|&c| (c, Role::Concretisation)));
            }
            EntityBody::ScriptEntity(_)
            | EntityBody::Module(_)
            | EntityBody::TypeParameter(_)
            | EntityBody::Type(_)
            | EntityBody::PrimitiveType(_)
            | EntityBody::NamedEntity(_) => {}
        }
        out
    }

    /// Clear every reference to `removed`.
    ///
    /// Returns [`Detach::Drop`] when a mandatory reference pointed at it, or
    /// when the last concretisation of a parameter concretisation is gone.
    pub fn detach(&mut self, removed: EntityId) -> Detach {
        let mandatory = self
            .references()
            .iter()
            .any(|(id, role)| *id == removed && role.is_mandatory());
        if mandatory {
            return Detach::Drop;
        }
        match &mut self.body {
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                d.concrete_parameters.retain(|&p| p != removed);
            }
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => {
                if d.return_type == Some(removed) {
                    d.return_type = None;
                }
                d.concrete_parameters.retain(|&p| p != removed);
            }
            EntityBody::EnumValue(d)
            | EntityBody::Variable(d)
            | EntityBody::Parameter(d)
            | EntityBody::Property(d) => {
                if d.declared_type == Some(removed) {
                    d.declared_type = None;
                }
            }
            EntityBody::Alias(d) => {
                if d.aliased_type == Some(removed) {
                    d.aliased_type = None;
                }
            }
            EntityBody::ParameterType(d) => {
                if d.base == Some(removed) {
                    d.base = None;
                }
                d.arguments.retain(|&a| a != removed);
            }
            EntityBody::Invocation(d) => {
                if d.receiver == Some(removed) {
                    d.receiver = None;
                }
                d.candidates.retain(|&c| c != removed);
            }
            EntityBody::ParameterConcretisation(d) => {
                d.concretisations.retain(|&c| c != removed);
                if d.concretisations.is_empty() {
                    return Detach::Drop;
                }
            }
            _ => {}
        }
        Detach::Keep
    }

    /// Dedup key for unnamed entities; `None` for named ones.
    pub fn association_key(&self) -> Option<AssociationKey> {
        let site = self.anchor.as_ref().map(|a| (a.file.clone(), a.start));
        let (ends, site) = match &self.body {
            EntityBody::Comment(d) => (vec![d.owner], site),
            EntityBody::Access(d) => (vec![d.accessor, d.variable], site),
            EntityBody::Invocation(d) => (vec![d.sender], site),
            EntityBody::Reference(d) => (vec![d.source, d.target], site),
            EntityBody::Inheritance(d) => (vec![d.subclass, d.superclass], None),
            EntityBody::ImportClause(d) => (vec![d.importer, d.imported], None),
            EntityBody::Concretisation(d) => (vec![d.generic, d.concrete], None),
            EntityBody::ParameterConcretisation(d) => {
                (vec![d.generic_parameter, d.concrete_parameter], None)
            }
            _ => return None,
        };
        Some(AssociationKey {
            kind: self.kind(),
            ends,
            site,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(id: u32, parent: u32, ty: Option<u32>) -> Entity {
        Entity::new(
            EntityId::new(id),
            None,
            EntityBody::Variable(StructuralData {
                core: NamedCore::new("x", format!("{{a.ts}}.x{id}"), Some(EntityId::new(parent))),
                attributes: Attributes::default(),
                declared_type: ty.map(EntityId::new),
            }),
        )
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId::new(42).to_string(), "ent_42");
    }

    #[test]
    fn kind_matches_body() {
        let v = variable(1, 0, None);
        assert_eq!(v.kind(), EntityKind::Variable);
        assert!(v.kind().is_structural());
        assert!(!v.kind().is_association());
        assert_eq!(v.name(), Some("x"));
    }

    #[test]
    fn kind_table_is_complete() {
        for kind in EntityKind::ALL {
            assert!(!kind.as_str().is_empty());
        }
        assert_eq!(EntityKind::ALL.len(), 28);
    }

    #[test]
    fn references_include_parent_and_type() {
        let v = variable(3, 1, Some(2));
        let refs = v.references();
        assert!(refs.contains(&(EntityId::new(1), Role::Parent)));
        assert!(refs.contains(&(EntityId::new(2), Role::DeclaredType)));
    }

    mod detach {
        use super::*;

        #[test]
        fn optional_reference_is_cleared() {
            let mut v = variable(3, 1, Some(2));
            assert_eq!(v.detach(EntityId::new(2)), Detach::Keep);
            assert_eq!(v.declared_type(), None);
        }

        #[test]
        fn removed_parent_drops_child() {
            let mut v = variable(3, 1, Some(2));
            assert_eq!(v.detach(EntityId::new(1)), Detach::Drop);
        }

        #[test]
        fn association_endpoint_drops_association() {
            let mut inh = Entity::new(
                EntityId::new(9),
                None,
                EntityBody::Inheritance(InheritanceData {
                    subclass: EntityId::new(1),
                    superclass: EntityId::new(2),
                    heritage: HeritageKind::Extends,
                }),
            );
            assert_eq!(inh.detach(EntityId::new(2)), Detach::Drop);
        }

        #[test]
        fn invocation_survives_losing_candidate() {
            let mut inv = Entity::new(
                EntityId::new(9),
                None,
                EntityBody::Invocation(InvocationData {
                    sender: EntityId::new(1),
                    receiver: Some(EntityId::new(2)),
                    candidates: vec![EntityId::new(3)],
                    signature: "f()".to_string(),
                }),
            );
            assert_eq!(inv.detach(EntityId::new(3)), Detach::Keep);
            assert_eq!(inv.detach(EntityId::new(2)), Detach::Keep);
            assert!(inv.references().iter().all(|(_, r)| *r == Role::Sender));
        }

        #[test]
        fn parameter_concretisation_drops_when_empty() {
            let mut pc = Entity::new(
                EntityId::new(9),
                None,
                EntityBody::ParameterConcretisation(ParameterConcretisationData {
                    generic_parameter: EntityId::new(1),
                    concrete_parameter: EntityId::new(2),
                    concretisations: vec![EntityId::new(5), EntityId::new(6)],
                }),
            );
            assert_eq!(pc.detach(EntityId::new(5)), Detach::Keep);
            assert_eq!(pc.detach(EntityId::new(6)), Detach::Drop);
        }
    }

    #[test]
    fn association_key_ignores_optional_ends() {
        let inv = Entity::new(
            EntityId::new(9),
            Some(SourceAnchor::from_span("b.ts", crate::anchor::Span::new(4, 8))),
            EntityBody::Invocation(InvocationData {
                sender: EntityId::new(1),
                receiver: None,
                candidates: vec![EntityId::new(3)],
                signature: "f()".to_string(),
            }),
        );
        let key = inv.association_key().expect("association");
        assert_eq!(key.ends, vec![EntityId::new(1)]);
        assert_eq!(key.site, Some(("b.ts".to_string(), 5)));
        assert!(variable(1, 0, None).association_key().is_none());
    }
}
