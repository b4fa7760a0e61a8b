//! Shared project fixtures for the indexing integration tests.

#![allow(dead_code)]

use tsfamix_core::adapter::{
    DeclRef, Modifier, NodeId, Project, SourceFile, SourceFileBuilder, SyntaxKind, SyntaxNode,
};
use tsfamix_core::anchor::Span;
use tsfamix_core::model::HeritageKind;

/// Span of the `nth` occurrence of `needle` in `text`.
pub fn span(text: &str, needle: &str, nth: usize) -> Span {
    let start = text
        .match_indices(needle)
        .nth(nth)
        .map(|(i, _)| i)
        .unwrap_or_else(|| panic!("{needle:?} #{nth} not in fixture text"));
    Span::new(start as u32, (start + needle.len()) as u32)
}

pub fn local(file: &str, node: NodeId) -> DeclRef {
    DeclRef::Local {
        file: file.to_string(),
        node,
    }
}

pub const A_TEXT: &str = "export class ClassX {}\n";
pub const B_TEXT: &str = "import { ClassX } from './a';\nclass Y extends ClassX {}\n";

/// `a.ts`: one exported class. Returns the file and the class node.
pub fn file_a() -> (SourceFile, NodeId) {
    let mut b = SourceFileBuilder::new("a.ts", A_TEXT);
    let class = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::ClassDeclaration, span(A_TEXT, "export class ClassX {}", 0))
            .with_name("ClassX")
            .with_modifier(Modifier::Export),
    );
    (b.finish().unwrap(), class)
}

/// `b.ts`: imports `ClassX` from `a.ts` and extends it.
pub fn file_b(class_x: NodeId) -> SourceFile {
    let mut b = SourceFileBuilder::new("b.ts", B_TEXT);
    let import = b.add(
        NodeId::ROOT,
        SyntaxNode::new(
            SyntaxKind::ImportDeclaration,
            span(B_TEXT, "import { ClassX } from './a';", 0),
        )
        .with_module("./a", Some("a.ts".to_string())),
    );
    let clause = b.add(
        import,
        SyntaxNode::new(SyntaxKind::ImportClause, span(B_TEXT, "{ ClassX }", 0)),
    );
    b.add(
        clause,
        SyntaxNode::new(SyntaxKind::ImportSpecifier, span(B_TEXT, "ClassX", 0))
            .with_name("ClassX")
            .with_target(local("a.ts", class_x)),
    );
    let y = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::ClassDeclaration, span(B_TEXT, "class Y extends ClassX {}", 0))
            .with_name("Y"),
    );
    let heritage = b.add(
        y,
        SyntaxNode::new(SyntaxKind::HeritageClause, span(B_TEXT, "extends ClassX", 0))
            .with_heritage(HeritageKind::Extends),
    );
    b.add(
        heritage,
        SyntaxNode::new(SyntaxKind::ExpressionWithTypeArguments, span(B_TEXT, "ClassX", 1))
            .with_name("ClassX")
            .with_target(local("a.ts", class_x)),
    );
    b.finish().unwrap()
}

/// `a.ts` and `b.ts` together.
pub fn importing_project() -> Project {
    let (a, class_x) = file_a();
    let mut project = Project::new();
    project.insert(file_b(class_x));
    project.insert(a);
    project
}

pub const GENERIC_TEXT: &str = "class ClassA<T> {}\nclass ClassB extends ClassA<string> {}\n";

/// `g.ts`: a generic class and a subclass instantiating it with `string`.
pub fn generic_file() -> SourceFile {
    let text = GENERIC_TEXT;
    let mut b = SourceFileBuilder::new("g.ts", text);
    let a = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::ClassDeclaration, span(text, "class ClassA<T> {}", 0))
            .with_name("ClassA"),
    );
    b.add(
        a,
        SyntaxNode::new(SyntaxKind::TypeParameter, span(text, "T", 0)).with_name("T"),
    );
    let class_b = b.add(
        NodeId::ROOT,
        SyntaxNode::new(
            SyntaxKind::ClassDeclaration,
            span(text, "class ClassB extends ClassA<string> {}", 0),
        )
        .with_name("ClassB"),
    );
    let heritage = b.add(
        class_b,
        SyntaxNode::new(SyntaxKind::HeritageClause, span(text, "extends ClassA<string>", 0))
            .with_heritage(HeritageKind::Extends),
    );
    b.add(
        heritage,
        SyntaxNode::new(SyntaxKind::ExpressionWithTypeArguments, span(text, "ClassA<string>", 0))
            .with_name("ClassA")
            .with_target(local("g.ts", a))
            .with_type_arguments(["string"]),
    );
    b.finish().unwrap()
}

pub const FUNCTION_TEXT: &str =
    "function f(x: number): number {\n  if (x > 0) { return 1; }\n  return 0;\n}\n";

/// `f.ts`: a function with one branch.
pub fn function_file() -> (SourceFile, NodeId) {
    let text = FUNCTION_TEXT;
    let whole = Span::new(0, text.trim_end().len() as u32);
    let mut b = SourceFileBuilder::new("f.ts", text);
    let f = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::FunctionDeclaration, whole)
            .with_name("f")
            .with_return_type("number"),
    );
    b.add(
        f,
        SyntaxNode::new(SyntaxKind::Parameter, span(text, "x: number", 0))
            .with_name("x")
            .with_type("number"),
    );
    let body_start = span(text, "{", 0).start;
    let body = b.add_body(
        f,
        SyntaxNode::new(SyntaxKind::Block, Span::new(body_start, whole.end)),
    );
    let branch = b.add(
        body,
        SyntaxNode::new(SyntaxKind::IfStatement, span(text, "if (x > 0) { return 1; }", 0)),
    );
    b.add(
        branch,
        SyntaxNode::new(SyntaxKind::ReturnStatement, span(text, "return 1;", 0)),
    );
    b.add(
        body,
        SyntaxNode::new(SyntaxKind::ReturnStatement, span(text, "return 0;", 0)),
    );
    (b.finish().unwrap(), f)
}

pub const ARROWS_TEXT: &str = "const outer = () => () => 1;\n";

/// `arrows.ts`: an arrow function returning another.
pub fn arrows_file() -> (SourceFile, NodeId, NodeId) {
    let text = ARROWS_TEXT;
    let mut b = SourceFileBuilder::new("arrows.ts", text);
    let stmt = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::VariableStatement, span(text, "const outer = () => () => 1;", 0))
            .with_modifier(Modifier::Const),
    );
    let decl = b.add(
        stmt,
        SyntaxNode::new(SyntaxKind::VariableDeclaration, span(text, "outer = () => () => 1", 0))
            .with_name("outer")
            .with_type("() => () => number"),
    );
    let outer = b.add(
        decl,
        SyntaxNode::new(SyntaxKind::ArrowFunction, span(text, "() => () => 1", 0))
            .with_return_type("() => number"),
    );
    let inner = b.add(
        outer,
        SyntaxNode::new(SyntaxKind::ArrowFunction, span(text, "() => 1", 0))
            .with_return_type("number"),
    );
    (b.finish().unwrap(), outer, inner)
}

/// Node of the class declared by [`module_file`] after `imports` imports.
pub fn module_class(imports: usize) -> NodeId {
    NodeId(1 + 3 * imports as u32)
}

/// A file that imports one class from each entry of `imports` and exports
/// its own class. Entries are `(class name, module path, class node)`.
pub fn module_file(path: &str, class: &str, imports: &[(&str, &str, NodeId)]) -> SourceFile {
    let mut text = String::new();
    let mut starts = Vec::new();
    for (name, module, _) in imports {
        starts.push(text.len() as u32);
        let stem = module.trim_end_matches(".ts");
        text.push_str(&format!("import {{ {name} }} from './{stem}';\n"));
    }
    let class_start = text.len() as u32;
    text.push_str(&format!("export class {class} {{}}\n"));

    let mut b = SourceFileBuilder::new(path, text.clone());
    for ((name, module, target), start) in imports.iter().zip(starts) {
        let stem = module.trim_end_matches(".ts");
        let line_len = format!("import {{ {name} }} from './{stem}';").len() as u32;
        let name_len = name.len() as u32;
        let import = b.add(
            NodeId::ROOT,
            SyntaxNode::new(SyntaxKind::ImportDeclaration, Span::new(start, start + line_len))
                .with_module(format!("./{stem}"), Some(module.to_string())),
        );
        let clause = b.add(
            import,
            SyntaxNode::new(SyntaxKind::ImportClause, Span::new(start + 7, start + 11 + name_len)),
        );
        b.add(
            clause,
            SyntaxNode::new(SyntaxKind::ImportSpecifier, Span::new(start + 9, start + 9 + name_len))
                .with_name(*name)
                .with_target(local(module, *target)),
        );
    }
    b.add(
        NodeId::ROOT,
        SyntaxNode::new(
            SyntaxKind::ClassDeclaration,
            Span::new(class_start, text.trim_end().len() as u32),
        )
        .with_name(class)
        .with_modifier(Modifier::Export),
    );
    b.finish().unwrap()
}

pub const BOX_TEXT: &str = "export class Box<T> {}\n";
pub const USER_TEXT: &str = "class User {}\nclass Sub extends Box<User> {}\n";

/// `g.ts`: a generic class. Returns the file and the class node.
pub fn box_file() -> (SourceFile, NodeId) {
    let text = BOX_TEXT;
    let mut b = SourceFileBuilder::new("g.ts", text);
    let class = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::ClassDeclaration, span(text, "export class Box<T> {}", 0))
            .with_name("Box")
            .with_modifier(Modifier::Export),
    );
    b.add(
        class,
        SyntaxNode::new(SyntaxKind::TypeParameter, span(text, "T", 0)).with_name("T"),
    );
    (b.finish().unwrap(), class)
}

/// `u.ts`: a class, and a subclass instantiating `Box` with it.
pub fn user_file(box_class: NodeId) -> SourceFile {
    let text = USER_TEXT;
    let mut b = SourceFileBuilder::new("u.ts", text);
    b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::ClassDeclaration, span(text, "class User {}", 0)).with_name("User"),
    );
    let sub = b.add(
        NodeId::ROOT,
        SyntaxNode::new(SyntaxKind::ClassDeclaration, span(text, "class Sub extends Box<User> {}", 0))
            .with_name("Sub"),
    );
    let heritage = b.add(
        sub,
        SyntaxNode::new(SyntaxKind::HeritageClause, span(text, "extends Box<User>", 0))
            .with_heritage(HeritageKind::Extends),
    );
    b.add(
        heritage,
        SyntaxNode::new(SyntaxKind::ExpressionWithTypeArguments, span(text, "Box<User>", 0))
            .with_name("Box")
            .with_target(local("g.ts", box_class))
            .with_type_arguments(["User"]),
    );
    b.finish().unwrap()
}

/// `g.ts` and `u.ts` together.
pub fn concretising_project() -> Project {
    let (g, box_class) = box_file();
    let mut project = Project::new();
    project.insert(g);
    project.insert(user_file(box_class));
    project
}
