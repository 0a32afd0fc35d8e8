use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::model::{Declaration, ScopedType, StructDef, TypeScope};
use crate::resolver::ResolvedFile;

/// A one-byte frame header id addresses at most this many messages.
pub const MAX_MESSAGES: usize = 256;

/// One row of the message id table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageId {
    pub name: String,
    pub id: u8,
    /// File that declared the message, relative to the corpus root.
    pub file: PathBuf,
}

/// Per-compilation state shared by every emitter.
///
/// Owns the message id counter, the name to id table in assignment order,
/// and the corpus-wide type scope. A fresh context is created for each
/// compile run; ids are final once classification is done and emitters
/// only read them.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    next_id: usize,
    messages: Vec<MessageId>,
    ids: HashMap<String, u8>,
    scope: TypeScope,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next message id.
    pub fn assign_id(&mut self, name: &str, file: &Path) -> Result<u8> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }
        let id = u8::try_from(self.next_id).map_err(|_| SchemaError::IdSpaceExhausted {
            name: name.to_string(),
            limit: MAX_MESSAGES,
        })?;
        self.next_id += 1;
        self.ids.insert(name.to_string(), id);
        self.messages.push(MessageId {
            name: name.to_string(),
            id,
            file: file.to_path_buf(),
        });
        debug!(name, id, "assigned message id");
        Ok(id)
    }

    /// Add a declaration to the corpus-wide scope.
    ///
    /// Names are global across the corpus: declaring the same name in two
    /// files that do not include one another is an error.
    pub fn register(&mut self, declaration: &Declaration, file: &Path) -> Result<()> {
        if self.scope.contains(declaration.name()) {
            return Err(SchemaError::Duplicate {
                kind: "declaration",
                name: declaration.name().to_string(),
                file: file.to_path_buf(),
                line: declaration.line(),
            });
        }
        self.scope.insert(declaration.clone(), file);
        Ok(())
    }

    /// Register the declarations a file introduces and number its messages.
    ///
    /// Every struct is a message unless the file's `not_message` annotation
    /// names it. Enums are never messages.
    pub fn classify(&mut self, file: &ResolvedFile) -> Result<()> {
        for declaration in &file.declarations {
            self.register(declaration, &file.path)?;
            if let Declaration::Struct(def) = declaration {
                if !file.metadata.is_excluded(&def.name) {
                    self.assign_id(&def.name, &file.path)?;
                }
            }
        }

        for name in &file.metadata.excluded {
            let declared = file
                .declarations
                .iter()
                .any(|d| matches!(d, Declaration::Struct(def) if &def.name == name));
            if !declared {
                warn!(
                    name = name.as_str(),
                    file = %file.path.display(),
                    "not_message names no struct declared in this file"
                );
            }
        }
        Ok(())
    }

    pub fn message_id(&self, name: &str) -> Option<u8> {
        self.ids.get(name).copied()
    }

    pub fn is_message(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// The id table, in assignment order.
    pub fn messages(&self) -> &[MessageId] {
        &self.messages
    }

    pub fn message_by_id(&self, id: u8) -> Option<&MessageId> {
        self.messages.get(id as usize)
    }

    pub fn lookup(&self, name: &str) -> Option<&ScopedType> {
        self.scope.get(name)
    }

    pub fn struct_def(&self, name: &str) -> Result<&StructDef> {
        self.scope
            .declaration(name)
            .and_then(Declaration::as_struct)
            .ok_or_else(|| SchemaError::UnknownStruct(name.to_string()))
    }

    pub fn scope(&self) -> &TypeScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FileMetadata;
    use crate::model::{Field, FieldType, Primitive};

    fn structure(name: &str) -> Declaration {
        Declaration::Struct(StructDef {
            name: name.to_string(),
            fields: vec![Field {
                name: "x".to_string(),
                ty: FieldType::Primitive(Primitive::Uint8),
                bits: None,
                line: 1,
            }],
            line: 1,
        })
    }

    fn resolved(path: &str, names: &[&str], excluded: &[&str]) -> ResolvedFile {
        ResolvedFile {
            path: PathBuf::from(path),
            stem: path.trim_end_matches(".th").to_string(),
            metadata: FileMetadata {
                includes: Vec::new(),
                excluded: excluded.iter().map(|s| s.to_string()).collect(),
            },
            declarations: names.iter().map(|n| structure(n)).collect(),
            source: String::new(),
        }
    }

    #[test]
    fn ids_are_dense_and_ordered() {
        let mut ctx = CompilationContext::new();
        ctx.classify(&resolved("a.th", &["A", "B"], &[])).unwrap();
        ctx.classify(&resolved("b.th", &["C"], &[])).unwrap();

        let table: Vec<_> = ctx.messages().iter().map(|m| (m.name.as_str(), m.id)).collect();
        assert_eq!(table, vec![("A", 0), ("B", 1), ("C", 2)]);
        assert_eq!(ctx.message_by_id(2).unwrap().file, PathBuf::from("b.th"));
    }

    #[test]
    fn excluded_structs_take_no_id() {
        let mut ctx = CompilationContext::new();
        ctx.classify(&resolved("a.th", &["A", "Point", "B"], &["Point"]))
            .unwrap();

        assert_eq!(ctx.message_id("A"), Some(0));
        assert_eq!(ctx.message_id("Point"), None);
        assert_eq!(ctx.message_id("B"), Some(1));
        assert!(ctx.lookup("Point").is_some());
        assert!(ctx.struct_def("Point").is_ok());
    }

    #[test]
    fn contexts_are_independent() {
        let mut first = CompilationContext::new();
        first.classify(&resolved("a.th", &["A"], &[])).unwrap();
        let mut second = CompilationContext::new();
        second.classify(&resolved("a.th", &["A"], &[])).unwrap();
        assert_eq!(first.messages(), second.messages());
    }

    #[test]
    fn duplicate_across_files_rejected() {
        let mut ctx = CompilationContext::new();
        ctx.classify(&resolved("a.th", &["A"], &[])).unwrap();
        let err = ctx.classify(&resolved("b.th", &["A"], &[])).unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { kind: "declaration", .. }));
    }

    #[test]
    fn id_space_exhausted_after_256() {
        let mut ctx = CompilationContext::new();
        for i in 0..MAX_MESSAGES {
            let id = ctx.assign_id(&format!("M{i}"), Path::new("m.th")).unwrap();
            assert_eq!(id as usize, i);
        }
        let err = ctx.assign_id("Overflow", Path::new("m.th")).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::IdSpaceExhausted { ref name, limit: 256 } if name == "Overflow"
        ));
    }

    #[test]
    fn id_table_serializes() {
        let mut ctx = CompilationContext::new();
        ctx.classify(&resolved("a.th", &["A"], &[])).unwrap();
        let json = serde_json::to_value(ctx.messages()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "name": "A", "id": 0, "file": "a.th" }])
        );
    }

    #[test]
    fn unknown_struct_lookup() {
        let ctx = CompilationContext::new();
        assert!(matches!(ctx.struct_def("Nope"), Err(SchemaError::UnknownStruct(_))));
    }
}
