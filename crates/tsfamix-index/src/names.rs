//! Fully qualified name resolution.
//!
//! A declaration's FQN is built by walking its ancestor chain from the file
//! root down to the node itself:
//!
//! ```text
//! {src/a.ts}.Shapes.Circle.2.area[MethodDeclaration]
//! ^^^^^^^^^^ ^^^^^^ ^^^^^^ ^ ^^^^ ^^^^^^^^^^^^^^^^^^^
//! file       namespace     | name kind of the node
//!                   class  overload marker
//! ```
//!
//! Segment rules:
//!
//! - Named constructs (types, functions, methods, accessors, namespaces,
//!   variables, parameters, decorators, aliases, enum members, properties,
//!   type parameters) contribute their name. Constructors contribute the
//!   literal `constructor`.
//! - Anonymous scopes (blocks, loops, catch clauses, arrow functions,
//!   unnamed function and class expressions) contribute `Kind(line:col)` at
//!   their own start position. A block that is the body of a function, loop
//!   or catch clause contributes nothing; its owner already has a segment.
//! - Object-literal property assignments contribute their statically
//!   evaluated key, so methods of keyed method tables get stable names. A
//!   key that cannot be evaluated falls back to its raw source text.
//! - Ambient signature-only functions and methods render as
//!   `name(type,...):returnType`.
//!
//! Siblings in the same scope that render the same name are numbered in
//! document order: the first keeps the bare name, later ones get a `2`, `3`,
//! ... segment immediately before the name. Numbering is computed once per
//! scope by pre-scanning all its named members, so it does not depend on the
//! order in which callers ask for names.

use std::collections::HashMap;

use thiserror::Error;
use tsfamix_core::adapter::{KeyExpr, Modifier, NodeId, SourceFile, SyntaxKind, TemplatePart};
use tsfamix_core::text::normalize_whitespace;

/// Name resolution failures. Both indicate a caller bug.
#[derive(Debug, Error)]
pub enum NameError {
    #[error("unknown node {node} in {file}")]
    UnknownNode { file: String, node: u32 },

    #[error("node {node} in {file} has no enclosing file root")]
    Detached { file: String, node: u32 },
}

/// Result type for name resolution.
pub type NameResult<T> = Result<T, NameError>;

/// One rendered ancestor segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Printed text; siblings with equal text are numbered.
    Named(String),
    /// `Kind(line:col)`; unique by position, never numbered.
    Anonymous(String),
}

/// Computes FQNs, caching overload markers per scope.
#[derive(Debug, Default)]
pub struct NameResolver {
    /// file → scope node → member node → marker (1 = first occurrence)
    markers: HashMap<String, HashMap<NodeId, HashMap<NodeId, u32>>>,
}

impl NameResolver {
    pub fn new() -> Self {
        NameResolver::default()
    }

    /// Compute the FQN of `node`.
    pub fn resolve(&mut self, file: &SourceFile, node: NodeId) -> NameResult<String> {
        let kind = file
            .kind(node)
            .ok_or_else(|| NameError::UnknownNode {
                file: file.path().to_string(),
                node: node.0,
            })?;

        let mut chain: Vec<NodeId> = std::iter::once(node).chain(file.ancestors(node)).collect();
        match chain.last() {
            Some(&NodeId::ROOT) => {}
            _ => {
                return Err(NameError::Detached {
                    file: file.path().to_string(),
                    node: node.0,
                })
            }
        }
        chain.reverse();

        let mut parts: Vec<String> = Vec::new();
        let mut scope = NodeId::ROOT;
        for id in chain {
            let Some(segment) = segment(file, id) else {
                continue;
            };
            match segment {
                Segment::Named(text) => {
                    let marker = self.marker(file, scope, id);
                    if marker > 1 {
                        parts.push(marker.to_string());
                    }
                    parts.push(text);
                }
                Segment::Anonymous(text) => parts.push(text),
            }
            scope = id;
        }

        let mut fqn = format!("{{{}}}", file.path());
        for part in parts {
            fqn.push('.');
            fqn.push_str(&part);
        }
        fqn.push('[');
        fqn.push_str(kind.as_str());
        fqn.push(']');
        Ok(fqn)
    }

    /// Drop cached markers for a file whose content changed.
    pub fn forget_file(&mut self, path: &str) {
        self.markers.remove(path);
    }

    fn marker(&mut self, file: &SourceFile, scope: NodeId, node: NodeId) -> u32 {
        let scopes = self.markers.entry(file.path().to_string()).or_default();
        let members = scopes
            .entry(scope)
            .or_insert_with(|| scan_scope(file, scope));
        members.get(&node).copied().unwrap_or(1)
    }
}

/// Number every named member of `scope` in document order.
fn scan_scope(file: &SourceFile, scope: NodeId) -> HashMap<NodeId, u32> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut out = HashMap::new();
    let mut stack: Vec<NodeId> = file.children(scope).iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        match segment(file, id) {
            Some(Segment::Named(key)) => {
                let count = seen.entry(key).or_insert(0);
                *count += 1;
                out.insert(id, *count);
            }
            Some(Segment::Anonymous(_)) => {}
            None => stack.extend(file.children(id).iter().rev().copied()),
        }
    }
    out
}

fn segment(file: &SourceFile, id: NodeId) -> Option<Segment> {
    let node = file.node(id)?;
    match node.kind {
        SyntaxKind::Constructor => Some(named("constructor".to_string())),
        SyntaxKind::FunctionDeclaration
        | SyntaxKind::MethodDeclaration
        | SyntaxKind::MethodSignature => match &node.name {
            Some(name) if is_ambient_signature(file, id) => {
                Some(named(signature_suffixed(file, id, name)))
            }
            Some(name) => Some(named(name.clone())),
            None => Some(anonymous(file, id)),
        },
        SyntaxKind::ClassDeclaration
        | SyntaxKind::InterfaceDeclaration
        | SyntaxKind::EnumDeclaration
        | SyntaxKind::EnumMember
        | SyntaxKind::TypeAliasDeclaration
        | SyntaxKind::ModuleDeclaration
        | SyntaxKind::GetAccessor
        | SyntaxKind::SetAccessor
        | SyntaxKind::PropertyDeclaration
        | SyntaxKind::PropertySignature
        | SyntaxKind::VariableDeclaration
        | SyntaxKind::Parameter
        | SyntaxKind::TypeParameter
        | SyntaxKind::Decorator
        | SyntaxKind::FunctionExpression
        | SyntaxKind::ClassExpression => match &node.name {
            Some(name) => Some(named(name.clone())),
            None => Some(anonymous(file, id)),
        },
        SyntaxKind::PropertyAssignment => {
            let key = node
                .property_key
                .as_ref()
                .map(|k| evaluate_key(&k.expr).unwrap_or_else(|| k.raw.clone()))
                .or_else(|| node.name.clone());
            match key {
                Some(key) => Some(named(key)),
                None => Some(anonymous(file, id)),
            }
        }
        SyntaxKind::ArrowFunction | SyntaxKind::CatchClause => Some(anonymous(file, id)),
        SyntaxKind::ForStatement
        | SyntaxKind::ForInStatement
        | SyntaxKind::ForOfStatement
        | SyntaxKind::WhileStatement
        | SyntaxKind::DoStatement => Some(anonymous(file, id)),
        SyntaxKind::Block => {
            let owner = node.parent.and_then(|p| file.kind(p));
            match owner {
                Some(k) if k.is_function_like() || k.is_loop() || k == SyntaxKind::CatchClause => {
                    None
                }
                _ => Some(anonymous(file, id)),
            }
        }
        _ => None,
    }
}

fn named(text: String) -> Segment {
    Segment::Named(text)
}

fn anonymous(file: &SourceFile, id: NodeId) -> Segment {
    let (line, col) = file.position(id);
    let kind = file.kind(id).map(|k| k.as_str()).unwrap_or("Node");
    Segment::Anonymous(format!("{kind}({line}:{col})"))
}

/// A function or method without a body in an ambient context.
pub(crate) fn is_ambient_signature(file: &SourceFile, id: NodeId) -> bool {
    let Some(node) = file.node(id) else {
        return false;
    };
    node.body.is_none()
        && matches!(
            node.kind,
            SyntaxKind::FunctionDeclaration
                | SyntaxKind::MethodDeclaration
                | SyntaxKind::MethodSignature
        )
        && is_ambient(file, id)
}

/// Declared with `declare`, inside a `declare` block, or in a `.d.ts` file.
pub(crate) fn is_ambient(file: &SourceFile, id: NodeId) -> bool {
    file.path().ends_with(".d.ts")
        || std::iter::once(id)
            .chain(file.ancestors(id))
            .any(|a| file.node(a).is_some_and(|n| n.has(Modifier::Declare)))
}

fn signature_suffixed(file: &SourceFile, id: NodeId, name: &str) -> String {
    let params: Vec<String> = file
        .children(id)
        .iter()
        .filter_map(|&c| file.node(c))
        .filter(|n| n.kind == SyntaxKind::Parameter)
        .map(|n| {
            n.declared_type
                .as_deref()
                .map(normalize_whitespace)
                .unwrap_or_else(|| "any".to_string())
        })
        .collect();
    let ret = file
        .node(id)
        .and_then(|n| n.return_type.as_deref())
        .map(normalize_whitespace)
        .unwrap_or_else(|| "any".to_string());
    format!("{}({}):{}", name, params.join(","), ret)
}

/// Statically evaluate an object-literal key.
pub fn evaluate_key(expr: &KeyExpr) -> Option<String> {
    match expr {
        KeyExpr::Identifier(s) | KeyExpr::String(s) => Some(s.clone()),
        KeyExpr::Number(s) => Some(canonical_number(s)),
        KeyExpr::Concat(left, right) => {
            let mut out = evaluate_key(left)?;
            out.push_str(&evaluate_key(right)?);
            Some(out)
        }
        KeyExpr::Template(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(s) => out.push_str(s),
                    TemplatePart::Interpolation(e) => out.push_str(&evaluate_key(e)?),
                }
            }
            Some(out)
        }
        KeyExpr::Reference(_) | KeyExpr::Dynamic => None,
    }
}

/// `1.0` and `1` name the same property.
fn canonical_number(text: &str) -> String {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Ok(v) if v.is_finite() => v.to_string(),
        _ => text.to_string(),
    }
}
