//! Parser collaborator data model.
//!
//! The TypeScript parser and type checker are external. Their output enters
//! the engine as plain data: one [`SourceFile`] per project file, each holding
//! an arena of [`SyntaxNode`]s addressed by [`NodeId`]. Everything the engine
//! needs from the checker (declared type text, resolved declaration targets,
//! heritage, write flags, module resolution) is pre-computed on the nodes.
//!
//! # Arena Layout
//!
//! - Node 0 is the root and has kind [`SyntaxKind::SourceFile`].
//! - Every other node has a `parent`; the parent lists it in `children` in
//!   document order.
//! - Spans are 0-based, half-open byte offsets into the file text.
//!
//! Arenas are validated when deserialized, so a malformed dump is rejected
//! before it reaches the engine.
//!
//! # Front-ends
//!
//! A front-end implements [`SourceAdapter`] to turn file text into a
//! [`SourceFile`]. [`SourceFileBuilder`] constructs arenas programmatically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::anchor::{SourceAnchor, Span};
use crate::error::{ModelError, ModelResult};
use crate::model::HeritageKind;
use crate::text::{self, LineIndex};

// ============================================================================
// Nodes
// ============================================================================

/// Index of a node in its file's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The file root.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Syntactic kind tag, named after the TypeScript compiler's kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxKind {
    SourceFile,
    ModuleDeclaration,
    ClassDeclaration,
    ClassExpression,
    InterfaceDeclaration,
    EnumDeclaration,
    EnumMember,
    TypeAliasDeclaration,
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunction,
    MethodDeclaration,
    MethodSignature,
    Constructor,
    GetAccessor,
    SetAccessor,
    PropertyDeclaration,
    PropertySignature,
    PropertyAssignment,
    VariableStatement,
    VariableDeclaration,
    Parameter,
    TypeParameter,
    Decorator,
    Block,
    ModuleBlock,
    ForStatement,
    ForInStatement,
    ForOfStatement,
    WhileStatement,
    DoStatement,
    IfStatement,
    SwitchStatement,
    CaseClause,
    TryStatement,
    CatchClause,
    ReturnStatement,
    ThrowStatement,
    ExpressionStatement,
    ConditionalExpression,
    BinaryExpression,
    ObjectLiteralExpression,
    CallExpression,
    NewExpression,
    Identifier,
    PropertyAccessExpression,
    TypeReference,
    HeritageClause,
    ExpressionWithTypeArguments,
    ImportDeclaration,
    ImportClause,
    ImportSpecifier,
    NamespaceImport,
    ExportDeclaration,
    ExportAssignment,
    Other,
}

impl SyntaxKind {
    /// Tag used in the `[Kind]` suffix of fully qualified names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxKind::SourceFile => "SourceFile",
            SyntaxKind::ModuleDeclaration => "ModuleDeclaration",
            SyntaxKind::ClassDeclaration => "ClassDeclaration",
            SyntaxKind::ClassExpression => "ClassExpression",
            SyntaxKind::InterfaceDeclaration => "InterfaceDeclaration",
            SyntaxKind::EnumDeclaration => "EnumDeclaration",
            SyntaxKind::EnumMember => "EnumMember",
            SyntaxKind::TypeAliasDeclaration => "TypeAliasDeclaration",
            SyntaxKind::FunctionDeclaration => "FunctionDeclaration",
            SyntaxKind::FunctionExpression => "FunctionExpression",
            SyntaxKind::ArrowFunction => "ArrowFunction",
            SyntaxKind::MethodDeclaration => "MethodDeclaration",
            SyntaxKind::MethodSignature => "MethodSignature",
            SyntaxKind::Constructor => "Constructor",
            SyntaxKind::GetAccessor => "GetAccessor",
            SyntaxKind::SetAccessor => "SetAccessor",
            SyntaxKind::PropertyDeclaration => "PropertyDeclaration",
            SyntaxKind::PropertySignature => "PropertySignature",
            SyntaxKind::PropertyAssignment => "PropertyAssignment",
            SyntaxKind::VariableStatement => "VariableStatement",
            SyntaxKind::VariableDeclaration => "VariableDeclaration",
            SyntaxKind::Parameter => "Parameter",
            SyntaxKind::TypeParameter => "TypeParameter",
            SyntaxKind::Decorator => "Decorator",
            SyntaxKind::Block => "Block",
            SyntaxKind::ModuleBlock => "ModuleBlock",
            SyntaxKind::ForStatement => "ForStatement",
            SyntaxKind::ForInStatement => "ForInStatement",
            SyntaxKind::ForOfStatement => "ForOfStatement",
            SyntaxKind::WhileStatement => "WhileStatement",
            SyntaxKind::DoStatement => "DoStatement",
            SyntaxKind::IfStatement => "IfStatement",
            SyntaxKind::SwitchStatement => "SwitchStatement",
            SyntaxKind::CaseClause => "CaseClause",
            SyntaxKind::TryStatement => "TryStatement",
            SyntaxKind::CatchClause => "CatchClause",
            SyntaxKind::ReturnStatement => "ReturnStatement",
            SyntaxKind::ThrowStatement => "ThrowStatement",
            SyntaxKind::ExpressionStatement => "ExpressionStatement",
            SyntaxKind::ConditionalExpression => "ConditionalExpression",
            SyntaxKind::BinaryExpression => "BinaryExpression",
            SyntaxKind::ObjectLiteralExpression => "ObjectLiteralExpression",
            SyntaxKind::CallExpression => "CallExpression",
            SyntaxKind::NewExpression => "NewExpression",
            SyntaxKind::Identifier => "Identifier",
            SyntaxKind::PropertyAccessExpression => "PropertyAccessExpression",
            SyntaxKind::TypeReference => "TypeReference",
            SyntaxKind::HeritageClause => "HeritageClause",
            SyntaxKind::ExpressionWithTypeArguments => "ExpressionWithTypeArguments",
            SyntaxKind::ImportDeclaration => "ImportDeclaration",
            SyntaxKind::ImportClause => "ImportClause",
            SyntaxKind::ImportSpecifier => "ImportSpecifier",
            SyntaxKind::NamespaceImport => "NamespaceImport",
            SyntaxKind::ExportDeclaration => "ExportDeclaration",
            SyntaxKind::ExportAssignment => "ExportAssignment",
            SyntaxKind::Other => "Other",
        }
    }

    /// Function-like declarations and expressions.
    pub fn is_function_like(&self) -> bool {
        matches!(
            self,
            SyntaxKind::FunctionDeclaration
                | SyntaxKind::FunctionExpression
                | SyntaxKind::ArrowFunction
                | SyntaxKind::MethodDeclaration
                | SyntaxKind::MethodSignature
                | SyntaxKind::Constructor
                | SyntaxKind::GetAccessor
                | SyntaxKind::SetAccessor
        )
    }

    /// Loop statements.
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            SyntaxKind::ForStatement
                | SyntaxKind::ForInStatement
                | SyntaxKind::ForOfStatement
                | SyntaxKind::WhileStatement
                | SyntaxKind::DoStatement
        )
    }

    /// Statements counted by the statement metric.
    pub fn is_statement(&self) -> bool {
        self.is_loop()
            || matches!(
                self,
                SyntaxKind::VariableStatement
                    | SyntaxKind::IfStatement
                    | SyntaxKind::SwitchStatement
                    | SyntaxKind::TryStatement
                    | SyntaxKind::ReturnStatement
                    | SyntaxKind::ThrowStatement
                    | SyntaxKind::ExpressionStatement
            )
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-level modifier keywords and markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Export,
    Default,
    Declare,
    Abstract,
    Static,
    Readonly,
    Public,
    Private,
    Protected,
    Async,
    /// `?` on a property or parameter.
    Optional,
    /// `!` on a property.
    Definite,
    Const,
}

/// Resolved declaration target supplied by the checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DeclRef {
    /// A declaration node in a project file.
    Local { file: String, node: NodeId },
    /// A declaration outside the project (library or unresolvable).
    External {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module: Option<String>,
    },
}

/// Object-literal property key as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyKey {
    pub expr: KeyExpr,
    /// Raw source text of the key, used when the key is not static.
    pub raw: String,
}

/// Key expression shapes the name resolver can evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyExpr {
    /// Plain `name:` key.
    Identifier(String),
    /// `'text':` key, unquoted.
    String(String),
    /// `42:` key, as written.
    Number(String),
    /// Identifier used inside a computed key; never static.
    Reference(String),
    /// `[a + b]`
    Concat(Box<KeyExpr>, Box<KeyExpr>),
    /// `` [`a${b}c`] ``
    Template(Vec<TemplatePart>),
    /// Anything else.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplatePart {
    Literal(String),
    Interpolation(KeyExpr),
}

/// Leading comment attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRange {
    pub span: Span,
    /// `/** ... */`
    #[serde(default)]
    pub is_jsdoc: bool,
}

/// One node of a file's syntax arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    /// Checker-rendered declared type text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    /// Checker-rendered return type text for function-likes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    /// Body block of a function-like, namespace or class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<NodeId>,
    /// Declaration an identifier, call, heritage entry, type reference or
    /// import specifier resolves to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<DeclRef>,
    /// Declaration of the receiver expression of a call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<DeclRef>,
    /// Type argument texts at a use site.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heritage: Option<HeritageKind>,
    /// Identifier is the target of an assignment.
    #[serde(default)]
    pub is_write: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_key: Option<PropertyKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentRange>,
    /// Raw module specifier of an import declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_specifier: Option<String>,
    /// Project-relative path the specifier resolves to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_module: Option<String>,
    /// Operator token of a binary expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, span: Span) -> Self {
        SyntaxNode {
            kind,
            name: None,
            span,
            parent: None,
            children: Vec::new(),
            declared_type: None,
            return_type: None,
            modifiers: Vec::new(),
            body: None,
            target: None,
            receiver: None,
            type_arguments: Vec::new(),
            heritage: None,
            is_write: false,
            property_key: None,
            comments: Vec::new(),
            module_specifier: None,
            resolved_module: None,
            operator: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, text: impl Into<String>) -> Self {
        self.declared_type = Some(text.into());
        self
    }

    pub fn with_return_type(mut self, text: impl Into<String>) -> Self {
        self.return_type = Some(text.into());
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        if !self.modifiers.contains(&modifier) {
            self.modifiers.push(modifier);
        }
        self
    }

    pub fn with_target(mut self, target: DeclRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_receiver(mut self, receiver: DeclRef) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_type_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_heritage(mut self, heritage: HeritageKind) -> Self {
        self.heritage = Some(heritage);
        self
    }

    pub fn with_write(mut self) -> Self {
        self.is_write = true;
        self
    }

    pub fn with_property_key(mut self, key: PropertyKey) -> Self {
        self.property_key = Some(key);
        self
    }

    pub fn with_comment(mut self, span: Span, is_jsdoc: bool) -> Self {
        self.comments.push(CommentRange { span, is_jsdoc });
        self
    }

    pub fn with_module(
        mut self,
        specifier: impl Into<String>,
        resolved: Option<String>,
    ) -> Self {
        self.module_specifier = Some(specifier.into());
        self.resolved_module = resolved;
        self
    }

    pub fn with_operator(mut self, op: impl Into<String>) -> Self {
        self.operator = Some(op.into());
        self
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

// ============================================================================
// Source Files
// ============================================================================

/// A parsed project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSourceFile", into = "RawSourceFile")]
pub struct SourceFile {
    path: String,
    text: String,
    nodes: Vec<SyntaxNode>,
    lines: LineIndex,
}

#[derive(Serialize, Deserialize)]
struct RawSourceFile {
    path: String,
    text: String,
    nodes: Vec<SyntaxNode>,
}

impl TryFrom<RawSourceFile> for SourceFile {
    type Error = ModelError;

    fn try_from(raw: RawSourceFile) -> Result<Self, Self::Error> {
        SourceFile::from_parts(raw.path, raw.text, raw.nodes)
    }
}

impl From<SourceFile> for RawSourceFile {
    fn from(file: SourceFile) -> Self {
        RawSourceFile {
            path: file.path,
            text: file.text,
            nodes: file.nodes,
        }
    }
}

impl SourceFile {
    /// Assemble a file from an arena, validating its shape.
    pub fn from_parts(
        path: impl Into<String>,
        text: impl Into<String>,
        nodes: Vec<SyntaxNode>,
    ) -> ModelResult<Self> {
        let path = normalize_path(&path.into());
        let text = text.into();
        match nodes.first() {
            Some(root) if root.kind == SyntaxKind::SourceFile && root.parent.is_none() => {}
            _ => {
                return Err(ModelError::structural(
                    path,
                    0,
                    "arena root must be a SourceFile node",
                ))
            }
        }
        let len = nodes.len() as u32;
        for (index, node) in nodes.iter().enumerate() {
            let refs = node.children.iter().chain(node.parent.iter()).chain(node.body.iter());
            for r in refs {
                if r.0 >= len {
                    return Err(ModelError::UnknownNode { file: path, node: r.0 });
                }
            }
            for child in &node.children {
                if nodes[child.index()].parent != Some(NodeId(index as u32)) {
                    return Err(ModelError::structural(
                        path,
                        child.0,
                        format!("child is not parented to node {index}"),
                    ));
                }
            }
            if index > 0 && node.parent.is_none() {
                return Err(ModelError::structural(path, index as u32, "node has no parent"));
            }
        }
        let lines = LineIndex::new(&text);
        Ok(SourceFile {
            path,
            text,
            nodes,
            lines,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.index())
    }

    /// Like [`node`](Self::node), but a missing node is a structural error.
    pub fn get(&self, id: NodeId) -> ModelResult<&SyntaxNode> {
        self.node(id).ok_or_else(|| ModelError::UnknownNode {
            file: self.path.clone(),
            node: id.0,
        })
    }

    pub fn kind(&self, id: NodeId) -> Option<SyntaxKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Strict ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            file: self,
            next: self.parent(id),
        }
    }

    /// All node ids in document (pre-)order.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(NodeId::ROOT)
    }

    /// Node ids of the subtree rooted at `start`, in document order.
    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if self.node(id).is_none() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Source text covered by a node.
    pub fn text_of(&self, id: NodeId) -> &str {
        self.node(id)
            .and_then(|n| text::slice(&self.text, n.span))
            .unwrap_or("")
    }

    /// Anchor for a node, with line numbers.
    pub fn anchor(&self, id: NodeId) -> SourceAnchor {
        let span = self.node(id).map(|n| n.span).unwrap_or_default();
        SourceAnchor::with_lines(self.path.clone(), span, &self.lines)
    }

    /// 1-based `(line, column)` of a node's start.
    pub fn position(&self, id: NodeId) -> (u32, u32) {
        let start = self.node(id).map(|n| n.span.start).unwrap_or(0);
        self.lines.line_col(start)
    }

    /// The file has import or export declarations.
    pub fn is_module(&self) -> bool {
        self.nodes.iter().any(|n| {
            matches!(
                n.kind,
                SyntaxKind::ImportDeclaration
                    | SyntaxKind::ExportDeclaration
                    | SyntaxKind::ExportAssignment
            ) || (n.parent == Some(NodeId::ROOT) && n.has(Modifier::Export))
        })
    }

    /// Top-level import declarations, in document order.
    pub fn imports(&self) -> Vec<NodeId> {
        self.children(NodeId::ROOT)
            .iter()
            .copied()
            .filter(|&id| self.kind(id) == Some(SyntaxKind::ImportDeclaration))
            .collect()
    }

    /// Names of exported top-level declarations, in document order.
    pub fn exported_names(&self) -> Vec<String> {
        self.exported_declarations()
            .into_iter()
            .filter_map(|(name, _)| Some(name?.to_string()))
            .collect()
    }

    /// Exported top-level declaration with the given name.
    pub fn find_export(&self, name: &str) -> Option<NodeId> {
        self.exported_declarations()
            .into_iter()
            .find(|(n, _)| *n == Some(name))
            .map(|(_, id)| id)
    }

    /// The `export default` declaration, if any.
    pub fn default_export(&self) -> Option<NodeId> {
        self.exported_declarations()
            .into_iter()
            .map(|(_, id)| id)
            .find(|&id| self.node(id).is_some_and(|n| n.has(Modifier::Default)))
    }

    fn exported_declarations(&self) -> Vec<(Option<&str>, NodeId)> {
        let mut out = Vec::new();
        for &id in self.children(NodeId::ROOT) {
            let Some(node) = self.node(id) else { continue };
            if !node.has(Modifier::Export) {
                continue;
            }
            if node.kind == SyntaxKind::VariableStatement {
                for &decl in self.children(id) {
                    if let Some(d) = self.node(decl) {
                        if d.kind == SyntaxKind::VariableDeclaration {
                            out.push((d.name.as_deref(), decl));
                        }
                    }
                }
            } else {
                out.push((node.name.as_deref(), id));
            }
        }
        out
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors<'a> {
    file: &'a SourceFile,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.file.parent(current);
        Some(current)
    }
}

/// Normalize a project-relative path to forward slashes without a leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

// ============================================================================
// Builder
// ============================================================================

/// Incrementally builds a syntax arena.
///
/// ```
/// use tsfamix_core::adapter::{NodeId, SourceFileBuilder, SyntaxKind, SyntaxNode};
/// use tsfamix_core::anchor::Span;
///
/// let text = "class A {}";
/// let mut b = SourceFileBuilder::new("a.ts", text);
/// let class = b.add(NodeId::ROOT, SyntaxNode::new(SyntaxKind::ClassDeclaration, Span::new(0, 10)).with_name("A"));
/// let file = b.finish().unwrap();
/// assert_eq!(file.node(class).unwrap().name.as_deref(), Some("A"));
/// ```
#[derive(Debug, Clone)]
pub struct SourceFileBuilder {
    path: String,
    text: String,
    nodes: Vec<SyntaxNode>,
}

impl SourceFileBuilder {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let root = SyntaxNode::new(SyntaxKind::SourceFile, Span::new(0, text.len() as u32));
        SourceFileBuilder {
            path: path.into(),
            text,
            nodes: vec![root],
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Append `node` as the last child of `parent`.
    pub fn add(&mut self, parent: NodeId, mut node: SyntaxNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        if let Some(p) = self.nodes.get_mut(parent.index()) {
            p.children.push(id);
        }
        id
    }

    /// Append `node` as a child of `parent` and mark it as the parent's body.
    pub fn add_body(&mut self, parent: NodeId, node: SyntaxNode) -> NodeId {
        let id = self.add(parent, node);
        if let Some(p) = self.nodes.get_mut(parent.index()) {
            p.body = Some(id);
        }
        id
    }

    /// Mutable access to an already added node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SyntaxNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn finish(self) -> ModelResult<SourceFile> {
        SourceFile::from_parts(self.path, self.text, self.nodes)
    }
}

// ============================================================================
// Project
// ============================================================================

/// The set of parsed files being indexed, keyed by project-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(with = "files_as_list")]
    files: BTreeMap<String, SourceFile>,
}

mod files_as_list {
    use super::SourceFile;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        files: &BTreeMap<String, SourceFile>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&SourceFile> = files.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, SourceFile>, D::Error> {
        let list = Vec::<SourceFile>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|f| (f.path().to_string(), f))
            .collect())
    }
}

impl Project {
    pub fn new() -> Self {
        Project::default()
    }

    /// Add or replace a file; returns the previous version.
    pub fn insert(&mut self, file: SourceFile) -> Option<SourceFile> {
        self.files.insert(file.path().to_string(), file)
    }

    pub fn remove(&mut self, path: &str) -> Option<SourceFile> {
        self.files.remove(&normalize_path(path))
    }

    pub fn get(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Names of the exported top-level declarations of a file.
    pub fn exported_names(&self, path: &str) -> Vec<String> {
        self.get(path)
            .map(SourceFile::exported_names)
            .unwrap_or_default()
    }

    /// Locate an exported declaration by module path and name.
    pub fn find_export(&self, path: &str, name: &str) -> Option<NodeId> {
        self.get(path)?.find_export(name)
    }

    /// Parse and add a file through a front-end.
    pub fn load<A: SourceAdapter>(
        &mut self,
        adapter: &A,
        path: &str,
        text: &str,
    ) -> Result<Option<SourceFile>, A::Error> {
        let file = adapter.parse_file(path, text)?;
        Ok(self.insert(file))
    }
}

// ============================================================================
// Adapter Trait
// ============================================================================

/// A parser front-end producing [`SourceFile`]s.
pub trait SourceAdapter {
    /// The error type for this adapter.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse one file into a syntax arena.
    fn parse_file(&self, path: &str, text: &str) -> Result<SourceFile, Self::Error>;

    /// Check if this adapter can handle a file, typically by extension.
    fn can_handle(&self, path: &str) -> bool;
}

/// Front-end for pre-parsed arenas serialized as JSON (`*.arena.json`).
///
/// The text argument is the JSON dump of a single [`SourceFile`]; the path
/// recorded in the dump wins over the path it was read from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArenaJsonAdapter;

impl SourceAdapter for ArenaJsonAdapter {
    type Error = serde_json::Error;

    fn parse_file(&self, _path: &str, text: &str) -> Result<SourceFile, Self::Error> {
        serde_json::from_str(text)
    }

    fn can_handle(&self, path: &str) -> bool {
        path.ends_with(".arena.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceFile {
        let text = "export class A {}\nfunction f() {}\n";
        let mut b = SourceFileBuilder::new("./src\\a.ts", text);
        b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::ClassDeclaration, Span::new(0, 17))
                .with_name("A")
                .with_modifier(Modifier::Export),
        );
        let f = b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::FunctionDeclaration, Span::new(18, 33)).with_name("f"),
        );
        b.add_body(f, SyntaxNode::new(SyntaxKind::Block, Span::new(31, 33)));
        b.finish().unwrap()
    }

    #[test]
    fn builder_normalizes_path() {
        assert_eq!(sample().path(), "src/a.ts");
    }

    #[test]
    fn preorder_is_document_order() {
        let file = sample();
        let kinds: Vec<_> = file
            .preorder()
            .into_iter()
            .map(|id| file.kind(id).unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::SourceFile,
                SyntaxKind::ClassDeclaration,
                SyntaxKind::FunctionDeclaration,
                SyntaxKind::Block,
            ]
        );
    }

    #[test]
    fn ancestors_end_at_root() {
        let file = sample();
        let ancestors: Vec<_> = file.ancestors(NodeId(3)).collect();
        assert_eq!(ancestors, vec![NodeId(2), NodeId::ROOT]);
        assert_eq!(file.node(NodeId(2)).unwrap().body, Some(NodeId(3)));
    }

    #[test]
    fn exports_and_module_flag() {
        let file = sample();
        assert!(file.is_module());
        assert_eq!(file.exported_names(), vec!["A".to_string()]);
        assert_eq!(file.find_export("A"), Some(NodeId(1)));
        assert_eq!(file.find_export("f"), None);
    }

    #[test]
    fn anchor_has_lines() {
        let file = sample();
        let anchor = file.anchor(NodeId(2));
        assert_eq!(anchor.start, 19);
        assert_eq!(anchor.start_line, Some(2));
        assert_eq!(file.position(NodeId(2)), (2, 1));
        assert_eq!(file.text_of(NodeId(1)), "export class A {}");
    }

    #[test]
    fn json_round_trip_rebuilds_line_index() {
        let file = sample();
        let json = serde_json::to_string(&file).unwrap();
        let back: SourceFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, file);
        assert_eq!(back.lines().line_count(), 3);
    }

    #[test]
    fn malformed_arena_is_rejected() {
        let nodes = vec![SyntaxNode::new(SyntaxKind::Block, Span::new(0, 0))];
        let err = SourceFile::from_parts("a.ts", "", nodes).unwrap_err();
        assert!(matches!(err, ModelError::Structural { .. }));

        let mut root = SyntaxNode::new(SyntaxKind::SourceFile, Span::new(0, 0));
        root.children.push(NodeId(7));
        let err = SourceFile::from_parts("a.ts", "", vec![root]).unwrap_err();
        assert!(matches!(err, ModelError::UnknownNode { node: 7, .. }));
    }

    #[test]
    fn project_orders_files_by_path() {
        let mut project = Project::new();
        project.insert(SourceFileBuilder::new("b.ts", "").finish().unwrap());
        project.insert(sample());
        let paths: Vec<_> = project.paths().collect();
        assert_eq!(paths, vec!["b.ts", "src/a.ts"]);
        assert_eq!(project.exported_names("src/a.ts"), vec!["A".to_string()]);
        assert!(project.remove("./b.ts").is_some());
    }

    #[test]
    fn arena_adapter_loads_dump() {
        let json = serde_json::to_string(&sample()).unwrap();
        let adapter = ArenaJsonAdapter;
        assert!(adapter.can_handle("src/a.ts.arena.json"));
        assert!(!adapter.can_handle("src/a.ts"));
        let mut project = Project::new();
        project.load(&adapter, "src/a.ts.arena.json", &json).unwrap();
        assert!(project.contains("src/a.ts"));
    }
}
