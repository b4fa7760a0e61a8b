//! Type interning.
//!
//! Declared-type texts rendered by the checker are turned into shared type
//! entities:
//!
//! ```text
//! <type>       := <primitive> | <parametric> | <named>
//! <parametric> := base "<" <arg> ("," <arg>)* ">"
//! <arg>        := balanced text up to a top-level "," or ">"
//! ```
//!
//! - Primitive types are global: one unanchored entity per keyword, whose
//!   FQN is the keyword itself.
//! - Parametric types (`Map<string, User>`) become a ParameterType whose
//!   base and arguments are interned recursively.
//! - Everything else (unions, arrays, literal and function types) is kept
//!   verbatim as a Type scoped to the container that used it.
//!
//! Interning is create-or-get on the FQN, so the same text used twice in the
//! same container yields the same entity.

use winnow::ascii::multispace0;
use winnow::combinator::separated;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::{take, take_till};
use winnow::ModalResult;

use tsfamix_core::anchor::SourceAnchor;
use tsfamix_core::error::ModelResult;
use tsfamix_core::model::{Entity, EntityBody, EntityId, NamedCore, ParameterTypeData};
use tsfamix_core::repository::ModelRepository;
use tsfamix_core::text::normalize_whitespace;

/// Keywords interned as primitive types.
pub const PRIMITIVES: &[&str] = &[
    "string",
    "number",
    "boolean",
    "any",
    "unknown",
    "void",
    "never",
    "undefined",
    "null",
    "object",
    "symbol",
    "bigint",
];

/// Type used when the real one could not be determined.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Shape of a declared-type text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeText {
    Primitive(String),
    Parametric { base: String, arguments: Vec<String> },
    Named(String),
}

/// Classify a type text. Whitespace is normalized first.
pub fn classify(text: &str) -> TypeText {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        return TypeText::Primitive(UNKNOWN_TYPE.to_string());
    }
    if PRIMITIVES.contains(&text.as_str()) {
        return TypeText::Primitive(text);
    }
    // Function types contain `=>`, whose `>` would unbalance the argument scan.
    if !text.contains("=>") {
        if let Ok((base, arguments)) = parse_parametric.parse(text.as_str()) {
            return TypeText::Parametric { base, arguments };
        }
    }
    TypeText::Named(text)
}

fn parse_parametric(input: &mut &str) -> ModalResult<(String, Vec<String>)> {
    let _ = multispace0.parse_next(input)?;
    let base: &str = take_till(1.., |c: char| c == '<').parse_next(input)?;
    let base = base.trim();
    if base.is_empty() || !base.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.')) {
        return Err(ErrMode::from_input(input));
    }
    let _ = '<'.parse_next(input)?;
    let arguments: Vec<String> = separated(1.., parse_argument, ',').parse_next(input)?;
    let _ = '>'.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    Ok((base.to_string(), arguments))
}

/// Balanced text up to the next top-level `,` or `>`.
fn parse_argument(input: &mut &str) -> ModalResult<String> {
    let mut depth = 0u32;
    let mut end = None;
    for (i, c) in input.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' if depth > 0 => depth -= 1,
            ',' | '>' if depth == 0 => {
                end = Some(i);
                break;
            }
            _ => {}
        }
    }
    let end = end.ok_or_else(|| ErrMode::from_input(input))?;
    let text: &str = take(end).parse_next(input)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ErrMode::from_input(input));
    }
    Ok(text.to_string())
}

/// The container a type is interned for.
#[derive(Debug, Clone)]
pub struct TypeScope {
    pub container: EntityId,
    pub container_fqn: String,
    /// Where the type was first used.
    pub anchor: SourceAnchor,
}

/// Create or get the entity for a type text.
pub fn intern(repo: &mut ModelRepository, text: &str, scope: &TypeScope) -> ModelResult<EntityId> {
    match classify(text) {
        TypeText::Primitive(name) => intern_primitive(repo, &name),
        TypeText::Named(name) => {
            let fqn = scoped_fqn(&scope.container_fqn, &name, "Type");
            if let Some(id) = repo.id_of(&fqn) {
                return Ok(id);
            }
            let id = repo.next_entity_id();
            let core = NamedCore::new(name, fqn, Some(scope.container));
            repo.insert(Entity::new(id, Some(scope.anchor.clone()), EntityBody::Type(core)))
        }
        TypeText::Parametric { base, arguments } => {
            let name = format!("{}<{}>", base, arguments.join(","));
            let fqn = scoped_fqn(&scope.container_fqn, &name, "ParameterType");
            if let Some(id) = repo.id_of(&fqn) {
                return Ok(id);
            }
            let base = intern(repo, &base, scope)?;
            let arguments = arguments
                .iter()
                .map(|arg| intern(repo, arg, scope))
                .collect::<ModelResult<Vec<_>>>()?;
            let id = repo.next_entity_id();
            let data = ParameterTypeData {
                core: NamedCore::new(name, fqn, Some(scope.container)),
                base: Some(base),
                arguments,
            };
            repo.insert(Entity::new(id, Some(scope.anchor.clone()), EntityBody::ParameterType(data)))
        }
    }
}

/// Create or get a primitive type.
pub fn intern_primitive(repo: &mut ModelRepository, name: &str) -> ModelResult<EntityId> {
    if let Some(id) = repo.id_of(name) {
        return Ok(id);
    }
    let id = repo.next_entity_id();
    repo.insert(Entity::new(id, None, EntityBody::PrimitiveType(NamedCore::stub(name, name))))
}

fn scoped_fqn(container_fqn: &str, name: &str, kind: &str) -> String {
    format!("{}.{}[{}]", fqn_stem(container_fqn), name, kind)
}

/// An FQN without its trailing `[Kind]` suffix.
pub fn fqn_stem(fqn: &str) -> &str {
    split_suffix(fqn).0
}

/// Split `stem[Kind]` into `(stem, "[Kind]")`; the suffix is empty when absent.
pub fn split_suffix(fqn: &str) -> (&str, &str) {
    if !fqn.ends_with(']') {
        return (fqn, "");
    }
    let mut depth = 0i32;
    for (i, c) in fqn.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' => {
                depth -= 1;
                if depth == 0 {
                    return fqn.split_at(i);
                }
            }
            _ => {}
        }
    }
    (fqn, "")
}

/// FQN of the concrete clone of `generic_fqn` for the given arguments.
///
/// The trailing `<...>` group of the stem is replaced if there is one,
/// otherwise the arguments are appended; the kind suffix is kept.
pub fn concrete_key(generic_fqn: &str, arguments: &[String]) -> String {
    let (stem, suffix) = split_suffix(generic_fqn);
    let args: Vec<String> = arguments.iter().map(|a| normalize_whitespace(a)).collect();
    let group = format!("<{}>", args.join(","));
    let base = match trailing_group_start(stem) {
        Some(start) => &stem[..start],
        None => stem,
    };
    format!("{base}{group}{suffix}")
}

fn trailing_group_start(stem: &str) -> Option<usize> {
    if !stem.ends_with('>') {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in stem.char_indices().rev() {
        match c {
            '>' => depth += 1,
            '<' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsfamix_core::anchor::Span;
    use tsfamix_core::model::EntityKind;

    fn scope(repo: &mut ModelRepository) -> TypeScope {
        let id = repo.next_entity_id();
        TypeScope {
            container: id,
            container_fqn: "{a.ts}.A[ClassDeclaration]".to_string(),
            anchor: SourceAnchor::from_span("a.ts", Span::new(0, 1)),
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn primitives() {
            assert_eq!(classify(" string "), TypeText::Primitive("string".to_string()));
            assert_eq!(classify(""), TypeText::Primitive("unknown".to_string()));
        }

        #[test]
        fn parametric_with_nesting() {
            assert_eq!(
                classify("Map<string, Array<number>>"),
                TypeText::Parametric {
                    base: "Map".to_string(),
                    arguments: vec!["string".to_string(), "Array<number>".to_string()],
                }
            );
            assert_eq!(
                classify("Promise<{ a: string, b: number }>"),
                TypeText::Parametric {
                    base: "Promise".to_string(),
                    arguments: vec!["{ a: string, b: number }".to_string()],
                }
            );
        }

        #[test]
        fn everything_else_is_named() {
            assert_eq!(classify("string[]"), TypeText::Named("string[]".to_string()));
            assert_eq!(classify("A<B> | C"), TypeText::Named("A<B> | C".to_string()));
            assert_eq!(classify("Array<string>[]"), TypeText::Named("Array<string>[]".to_string()));
            assert_eq!(
                classify("Promise<() => void>"),
                TypeText::Named("Promise<() => void>".to_string())
            );
        }
    }

    mod interning {
        use super::*;

        #[test]
        fn primitives_are_shared_and_unanchored() {
            let mut repo = ModelRepository::new();
            let scope = scope(&mut repo);
            let a = intern(&mut repo, "string", &scope).unwrap();
            let b = intern(&mut repo, "string", &scope).unwrap();
            assert_eq!(a, b);
            let entity = repo.get(a).unwrap();
            assert_eq!(entity.kind(), EntityKind::PrimitiveType);
            assert_eq!(entity.fqn(), Some("string"));
            assert!(entity.anchor.is_none());
        }

        #[test]
        fn parametric_interns_parts() {
            let mut repo = ModelRepository::new();
            let scope = scope(&mut repo);
            let id = intern(&mut repo, "Map<string, User>", &scope).unwrap();
            let entity = repo.get(id).unwrap();
            assert_eq!(entity.fqn(), Some("{a.ts}.A.Map<string,User>[ParameterType]"));
            let EntityBody::ParameterType(data) = &entity.body else {
                panic!("expected a parameter type");
            };
            assert_eq!(
                repo.get(data.base.unwrap()).unwrap().fqn(),
                Some("{a.ts}.A.Map[Type]")
            );
            assert_eq!(data.arguments.len(), 2);
            assert_eq!(repo.get(data.arguments[0]).unwrap().fqn(), Some("string"));
            assert_eq!(
                repo.get(data.arguments[1]).unwrap().parent(),
                Some(scope.container)
            );
        }
    }

    mod keys {
        use super::*;

        #[test]
        fn stem_and_suffix() {
            assert_eq!(split_suffix("{a.ts}.A[ClassDeclaration]"), ("{a.ts}.A", "[ClassDeclaration]"));
            assert_eq!(fqn_stem("{a.ts}.x.string[][Type]"), "{a.ts}.x.string[]");
            assert_eq!(fqn_stem("string"), "string");
        }

        #[test]
        fn concrete_key_appends_or_replaces() {
            assert_eq!(
                concrete_key("{a.ts}.ClassA[ClassDeclaration]", &["string".to_string()]),
                "{a.ts}.ClassA<string>[ClassDeclaration]"
            );
            assert_eq!(
                concrete_key("{a.ts}.ClassA<T>[ClassDeclaration]", &["Map<string, number>".to_string()]),
                "{a.ts}.ClassA<Map<string, number>>[ClassDeclaration]"
            );
        }
    }
}
