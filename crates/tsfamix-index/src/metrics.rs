//! Member metrics.
//!
//! Cyclomatic complexity comes from a [`MetricSource`], keyed by file and
//! member name. Two sources are provided:
//!
//! - [`DecisionPointCounter`] walks the member's syntax subtree and counts
//!   decision points. It is the default.
//! - [`ComplexityTable`] serves precomputed values, for callers that already
//!   ran an external complexity tool.
//!
//! Statement and line counts are always computed from the syntax tree.

use std::collections::HashMap;

use tsfamix_core::adapter::{NodeId, SourceFile, SyntaxKind};

/// Supplies cyclomatic complexity for behavioural members.
pub trait MetricSource: Send + Sync {
    /// Complexity of `member` declared at `node` in `file`.
    fn cyclomatic_complexity(&self, file: &SourceFile, node: NodeId, member: &str) -> u32;
}

/// Counts decision points: 1 + branches, loops, cases, catches,
/// conditionals and short-circuit operators. A member without a body has
/// complexity 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionPointCounter;

impl MetricSource for DecisionPointCounter {
    fn cyclomatic_complexity(&self, file: &SourceFile, node: NodeId, _member: &str) -> u32 {
        let Some(body) = file.node(node).and_then(|n| n.body) else {
            return 0;
        };
        let decisions = file
            .preorder_from(body)
            .into_iter()
            .filter(|&id| is_decision_point(file, id))
            .count() as u32;
        decisions + 1
    }
}

fn is_decision_point(file: &SourceFile, id: NodeId) -> bool {
    let Some(node) = file.node(id) else {
        return false;
    };
    match node.kind {
        SyntaxKind::IfStatement
        | SyntaxKind::ForStatement
        | SyntaxKind::ForInStatement
        | SyntaxKind::ForOfStatement
        | SyntaxKind::WhileStatement
        | SyntaxKind::DoStatement
        | SyntaxKind::CaseClause
        | SyntaxKind::CatchClause
        | SyntaxKind::ConditionalExpression => true,
        SyntaxKind::BinaryExpression => {
            matches!(node.operator.as_deref(), Some("&&") | Some("||") | Some("??"))
        }
        _ => false,
    }
}

/// Precomputed complexities keyed by `(file, member name)`.
///
/// Members missing from the table fall back to the wrapped source.
pub struct ComplexityTable {
    values: HashMap<(String, String), u32>,
    fallback: Box<dyn MetricSource>,
}

impl ComplexityTable {
    pub fn new() -> Self {
        ComplexityTable {
            values: HashMap::new(),
            fallback: Box::new(DecisionPointCounter),
        }
    }

    pub fn with_fallback(mut self, fallback: impl MetricSource + 'static) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    pub fn insert(&mut self, file: impl Into<String>, member: impl Into<String>, value: u32) {
        self.values.insert((file.into(), member.into()), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for ComplexityTable {
    fn default() -> Self {
        ComplexityTable::new()
    }
}

impl std::fmt::Debug for ComplexityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexityTable")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl MetricSource for ComplexityTable {
    fn cyclomatic_complexity(&self, file: &SourceFile, node: NodeId, member: &str) -> u32 {
        match self.values.get(&(file.path().to_string(), member.to_string())) {
            Some(&value) => value,
            None => self.fallback.cyclomatic_complexity(file, node, member),
        }
    }
}

/// Statements in a member's body, nested blocks included.
pub fn statement_count(file: &SourceFile, node: NodeId) -> u32 {
    let Some(body) = file.node(node).and_then(|n| n.body) else {
        return 0;
    };
    file.preorder_from(body)
        .into_iter()
        .filter(|&id| id != body)
        .filter(|&id| file.kind(id).is_some_and(|k| k.is_statement()))
        .count() as u32
}

/// Source lines spanned by a node.
pub fn lines_of_code(file: &SourceFile, node: NodeId) -> u32 {
    file.anchor(node).line_count().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsfamix_core::adapter::{SourceFileBuilder, SyntaxNode};
    use tsfamix_core::anchor::Span;

    /// `function f(a) { if (a && b) { return 1; } for (;;) {} return a ? 1 : 2; }`
    fn sample() -> (SourceFile, NodeId, NodeId) {
        let text = "function f(a) {\n  if (a && b) { return 1; }\n  for (;;) {}\n  return a ? 1 : 2;\n}\ndeclare function g(): void;";
        let mut b = SourceFileBuilder::new("m.ts", text);
        let f = b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::FunctionDeclaration, Span::new(0, 79)).with_name("f"),
        );
        let body = b.add_body(f, SyntaxNode::new(SyntaxKind::Block, Span::new(14, 79)));
        let if_stmt = b.add(body, SyntaxNode::new(SyntaxKind::IfStatement, Span::new(18, 43)));
        b.add(
            if_stmt,
            SyntaxNode::new(SyntaxKind::BinaryExpression, Span::new(22, 28)).with_operator("&&"),
        );
        let then = b.add(if_stmt, SyntaxNode::new(SyntaxKind::Block, Span::new(30, 43)));
        b.add(then, SyntaxNode::new(SyntaxKind::ReturnStatement, Span::new(32, 41)));
        let for_stmt = b.add(body, SyntaxNode::new(SyntaxKind::ForStatement, Span::new(46, 57)));
        b.add(for_stmt, SyntaxNode::new(SyntaxKind::Block, Span::new(55, 57)));
        let ret = b.add(body, SyntaxNode::new(SyntaxKind::ReturnStatement, Span::new(60, 77)));
        b.add(ret, SyntaxNode::new(SyntaxKind::ConditionalExpression, Span::new(67, 76)));
        let g = b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::FunctionDeclaration, Span::new(80, 107)).with_name("g"),
        );
        (b.finish().unwrap(), f, g)
    }

    #[test]
    fn counts_decision_points() {
        let (file, f, _) = sample();
        // if, &&, for, ?: plus one
        assert_eq!(DecisionPointCounter.cyclomatic_complexity(&file, f, "f"), 5);
    }

    #[test]
    fn signature_only_is_zero() {
        let (file, _, g) = sample();
        assert_eq!(DecisionPointCounter.cyclomatic_complexity(&file, g, "g"), 0);
        assert_eq!(statement_count(&file, g), 0);
    }

    #[test]
    fn statements_and_lines() {
        let (file, f, _) = sample();
        // if, return, for, return
        assert_eq!(statement_count(&file, f), 4);
        assert_eq!(lines_of_code(&file, f), 5);
    }

    #[test]
    fn table_overrides_by_member_name() {
        let (file, f, g) = sample();
        let mut table = ComplexityTable::new();
        table.insert("m.ts", "g", 7);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cyclomatic_complexity(&file, g, "g"), 7);
        assert_eq!(table.cyclomatic_complexity(&file, f, "f"), 5);
    }
}
