use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::corpus::{Corpus, SchemaFile};
use crate::error::{Result, SchemaError};
use crate::metadata::FileMetadata;
use crate::model::{Declaration, TypeScope};
use crate::parser::parse_declarations;

/// A schema file after include resolution.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Path relative to the corpus root.
    pub path: PathBuf,
    pub stem: String,
    pub metadata: FileMetadata,
    /// Declarations introduced by this file, in source order. Types that
    /// only came from includes are not listed.
    pub declarations: Vec<Declaration>,
    pub source: String,
}

/// Resolve one file of the corpus against its includes.
///
/// Includes are loaded transitively, depth first, each at most once per
/// file. The result holds only the types the file itself introduces: the
/// set of all types visible after parsing it, minus the types that came
/// from its includes.
pub fn resolve_file(corpus: &Corpus, file: &SchemaFile) -> Result<ResolvedFile> {
    let mut scope = TypeScope::new();
    let mut loaded = HashSet::new();
    let mut chain = vec![file.path.clone()];

    for include in &file.metadata.includes {
        load_include(corpus, include, &file.path, &mut scope, &mut loaded, &mut chain)?;
    }

    let parsed = parse_declarations(&file.text, &file.path, &scope)?;
    let mut declarations = Vec::with_capacity(parsed.len());
    for declaration in parsed {
        if let Some(existing) = scope.get(declaration.name()) {
            warn!(
                name = declaration.name(),
                file = %file.path.display(),
                included_from = %existing.file.display(),
                "declaration shadows an included type and will not be emitted"
            );
            continue;
        }
        declarations.push(declaration);
    }

    debug!(
        file = %file.path.display(),
        included = scope.len(),
        introduced = declarations.len(),
        "resolved schema file"
    );

    Ok(ResolvedFile {
        path: file.path.clone(),
        stem: file.stem().to_string(),
        metadata: file.metadata.clone(),
        declarations,
        source: file.text.clone(),
    })
}

fn load_include(
    corpus: &Corpus,
    include: &str,
    from: &Path,
    scope: &mut TypeScope,
    loaded: &mut HashSet<PathBuf>,
    chain: &mut Vec<PathBuf>,
) -> Result<()> {
    let included = corpus.load_include(include, from)?;

    if chain.contains(&included.path) {
        let mut cycle = chain.clone();
        cycle.push(included.path.clone());
        return Err(SchemaError::IncludeCycle { chain: cycle });
    }
    if !loaded.insert(included.path.clone()) {
        return Ok(());
    }

    chain.push(included.path.clone());
    for nested in &included.metadata.includes {
        load_include(corpus, nested, &included.path, scope, loaded, chain)?;
    }
    chain.pop();

    for declaration in parse_declarations(&included.text, &included.path, scope)? {
        if let Some(existing) = scope.get(declaration.name()) {
            warn!(
                name = declaration.name(),
                file = %included.path.display(),
                first = %existing.file.display(),
                "included type declared twice; keeping the first"
            );
            continue;
        }
        scope.insert(declaration, &included.path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(corpus: &Corpus, path: &str) -> Result<ResolvedFile> {
        let file = corpus.get(Path::new(path)).unwrap();
        resolve_file(corpus, file)
    }

    fn names(file: &ResolvedFile) -> Vec<&str> {
        file.declarations.iter().map(Declaration::name).collect()
    }

    #[test]
    fn included_types_are_not_reintroduced() {
        let corpus = Corpus::from_sources([
            ("a.th", "struct A { uint8 x; };"),
            ("b.th", "/* include: \"a.th\" */\nstruct B { A inner; uint8 y; };"),
        ])
        .unwrap();

        let b = resolve(&corpus, "b.th").unwrap();
        assert_eq!(names(&b), vec!["B"]);
        assert_eq!(b.stem, "b");
        assert_eq!(b.metadata.includes, vec!["a.th"]);
    }

    #[test]
    fn transitive_includes() {
        let corpus = Corpus::from_sources([
            ("base.th", "enum Kind : uint8 { One, Two };"),
            ("mid.th", "/* include: base.th */\nstruct Mid { Kind k; };"),
            ("top.th", "/* include: mid.th */\nstruct Top { Mid m; Kind k; };"),
        ])
        .unwrap();

        let top = resolve(&corpus, "top.th").unwrap();
        assert_eq!(names(&top), vec!["Top"]);
    }

    #[test]
    fn diamond_includes_load_once() {
        let corpus = Corpus::from_sources([
            ("base.th", "struct Base { uint8 v; };"),
            ("left.th", "/* include: base.th */\nstruct Left { Base b; };"),
            ("right.th", "/* include: base.th */\nstruct Right { Base b; };"),
            (
                "top.th",
                "/* include: left.th, right.th */\nstruct Top { Left l; Right r; };",
            ),
        ])
        .unwrap();

        assert_eq!(names(&resolve(&corpus, "top.th").unwrap()), vec!["Top"]);
    }

    #[test]
    fn redeclared_included_name_is_dropped() {
        let corpus = Corpus::from_sources([
            ("a.th", "struct A { uint8 x; };"),
            ("b.th", "/* include: a.th */\nstruct A { uint8 x; };\nstruct B { uint8 y; };"),
        ])
        .unwrap();

        assert_eq!(names(&resolve(&corpus, "b.th").unwrap()), vec!["B"]);
    }

    #[test]
    fn types_without_include_are_unknown() {
        let corpus = Corpus::from_sources([
            ("a.th", "struct A { uint8 x; };"),
            ("b.th", "struct B { A inner; };"),
        ])
        .unwrap();

        assert!(matches!(
            resolve(&corpus, "b.th"),
            Err(SchemaError::UnknownType { .. })
        ));
    }

    #[test]
    fn missing_include() {
        let corpus =
            Corpus::from_sources([("b.th", "/* include: gone.th */\nstruct B { uint8 y; };")])
                .unwrap();

        match resolve(&corpus, "b.th").unwrap_err() {
            SchemaError::MissingInclude { path, from, .. } => {
                assert_eq!(path, PathBuf::from("gone.th"));
                assert_eq!(from, PathBuf::from("b.th"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn include_cycle_detected() {
        let corpus = Corpus::from_sources([
            ("a.th", "/* include: b.th */\nstruct A { uint8 x; };"),
            ("b.th", "/* include: a.th */\nstruct B { uint8 y; };"),
        ])
        .unwrap();

        match resolve(&corpus, "a.th").unwrap_err() {
            SchemaError::IncludeCycle { chain } => {
                assert_eq!(
                    chain,
                    vec![
                        PathBuf::from("a.th"),
                        PathBuf::from("b.th"),
                        PathBuf::from("a.th")
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn self_include_is_a_cycle() {
        let corpus =
            Corpus::from_sources([("a.th", "/* include: a.th */\nstruct A { uint8 x; };")])
                .unwrap();
        assert!(matches!(
            resolve(&corpus, "a.th"),
            Err(SchemaError::IncludeCycle { .. })
        ));
    }
}
