//! Python bindings: a `ctypes` package with one module per schema file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use gpulink_idl::{
    CompilationContext, Declaration, EnumDef, Field, FieldType, Primitive, ResolvedFile, StructDef,
};
use tracing::debug;

use crate::emitter::{foreign_stem, Artifact, Emitter, FileEmission, Target};
use crate::error::{EmitError, Result};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

#[derive(Debug, Default)]
pub struct PythonEmitter {
    modules: Vec<String>,
    artifacts: Vec<Artifact>,
}

impl PythonEmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Emitter for PythonEmitter {
    fn target(&self) -> Target {
        Target::Python
    }

    fn begin_file(&mut self, file: &ResolvedFile) -> FileEmission {
        FileEmission {
            path: PathBuf::from("messages").join(format!("{}.py", file.stem)),
            stem: file.stem.clone(),
        }
    }

    fn emit(
        &mut self,
        ctx: &CompilationContext,
        emission: FileEmission,
        file: &ResolvedFile,
    ) -> Result<()> {
        let mut module = Module::default();
        let mut body = String::new();
        for declaration in &file.declarations {
            check_names(ctx, declaration)?;
            body.push_str("\n\n");
            match declaration {
                Declaration::Enum(def) => {
                    module.uses_enum = true;
                    body.push_str(&enum_class(def));
                }
                Declaration::Struct(def) => {
                    body.push_str(&structure_class(ctx, def, &file.path, &mut module)?)
                }
            }
        }

        let mut out = banner(&format!(
            "Generated by gpulink from {}. Do not edit.",
            file.path.display()
        ));
        out.push_str(&module.imports());
        out.push_str(&body);

        debug!(path = %emission.path.display(), "emitted Python module");
        self.modules.push(emission.stem);
        self.artifacts.push(Artifact {
            path: emission.path,
            contents: out,
        });
        Ok(())
    }

    fn finish_corpus(&mut self, ctx: &CompilationContext, _sources: &[PathBuf]) -> Result<()> {
        let mut ids = banner("Generated by gpulink. Do not edit.");
        ids.push_str("from enum import IntEnum\n\n\nclass Messages(IntEnum):\n");
        if ctx.messages().is_empty() {
            ids.push_str("    pass\n");
        }
        for message in ctx.messages() {
            ids.push_str(&format!("    {} = {}\n", message.name, message.id));
        }

        let mut header = banner("Generated by gpulink. Do not edit.");
        header.push_str(
            "from ctypes import LittleEndianStructure, c_uint16, c_uint8\n\n\
             START_TOKEN = 0x7E\n\n\n\
             class Header(LittleEndianStructure):\n    \
             _pack_ = 1\n    \
             _fields_ = [\n        \
             (\"id\", c_uint8),\n        \
             (\"size\", c_uint16),\n    \
             ]\n",
        );

        let mut modules = vec!["header".to_string(), "messages".to_string()];
        modules.extend(self.modules.iter().cloned());
        let mut package = banner("Generated by gpulink. Do not edit.");
        package.push_str(&format!("from . import {}\n\n", modules.join(", ")));
        let quoted: Vec<String> = modules.iter().map(|m| format!("\"{m}\"")).collect();
        package.push_str(&format!("__all__ = [{}]\n", quoted.join(", ")));

        for (path, contents) in [
            ("messages/messages.py", ids),
            ("messages/header.py", header),
            ("messages/__init__.py", package),
        ] {
            self.artifacts.push(Artifact {
                path: PathBuf::from(path),
                contents,
            });
        }
        Ok(())
    }

    fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }
}

/// Names a module imports, collected while its classes are generated.
#[derive(Debug, Default)]
struct Module {
    ctypes: BTreeSet<&'static str>,
    uses_enum: bool,
    foreign: BTreeMap<String, BTreeSet<String>>,
}

impl Module {
    fn imports(&self) -> String {
        let mut out = String::new();
        if !self.ctypes.is_empty() {
            let names: Vec<&str> = self.ctypes.iter().copied().collect();
            out.push_str(&format!("from ctypes import {}\n", names.join(", ")));
        }
        if self.uses_enum {
            out.push_str("from enum import IntEnum\n");
        }
        if !self.foreign.is_empty() {
            out.push('\n');
        }
        for (stem, names) in &self.foreign {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            out.push_str(&format!("from .{stem} import {}\n", names.join(", ")));
        }
        out
    }
}

fn banner(note: &str) -> String {
    format!(
        "# ********************************\n\
         # * FILE AUTOMATICALLY GENERATED *\n\
         # ********************************\n\
         # {note}\n\n"
    )
}

fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name) || name.starts_with('_')
}

/// Keywords, underscore names (`ctypes` and `enum` internals) and `ID` as a
/// message field.
fn check_names(ctx: &CompilationContext, declaration: &Declaration) -> Result<()> {
    let scope = declaration.name();
    let clash = match declaration {
        _ if is_reserved(scope) => Some((scope, "file")),
        Declaration::Enum(def) => def
            .values
            .iter()
            .find(|v| is_reserved(&v.name))
            .map(|v| (v.name.as_str(), scope)),
        Declaration::Struct(def) => {
            let message = ctx.is_message(scope);
            def.fields
                .iter()
                .find(|f| is_reserved(&f.name) || (message && f.name == "ID"))
                .map(|f| (f.name.as_str(), scope))
        }
    };
    match clash {
        Some((name, scope)) => Err(EmitError::ReservedName {
            target: Target::Python,
            name: name.to_string(),
            scope: scope.to_string(),
        }),
        None => Ok(()),
    }
}

/// `ctypes` name of a primitive. `integral` asks for a numeric type, which
/// matters for `char` under bit-fields and enums.
fn ctype(p: Primitive, integral: bool) -> Option<&'static str> {
    let name = match p {
        Primitive::Uint8 => "c_uint8",
        Primitive::Uint16 => "c_uint16",
        Primitive::Uint32 => "c_uint32",
        Primitive::Uint64 => "c_uint64",
        Primitive::Int8 => "c_int8",
        Primitive::Int16 => "c_int16",
        Primitive::Int32 => "c_int32",
        Primitive::Int64 => "c_int64",
        Primitive::Char if integral => "c_uint8",
        Primitive::Char => "c_char",
        Primitive::Float => "c_float",
        Primitive::Double => "c_double",
        Primitive::Half => return None,
    };
    Some(name)
}

fn enum_class(def: &EnumDef) -> String {
    let mut out = format!("class {}(IntEnum):\n", def.name);
    if def.values.is_empty() {
        out.push_str("    pass\n");
    }
    for value in &def.values {
        out.push_str(&format!("    {} = {}\n", value.name, value.value));
    }
    out
}

fn structure_class(
    ctx: &CompilationContext,
    def: &StructDef,
    current: &Path,
    module: &mut Module,
) -> Result<String> {
    module.ctypes.insert("LittleEndianStructure");
    let mut out = format!(
        "class {}(LittleEndianStructure):\n    _pack_ = 1\n",
        def.name
    );
    if def.fields.is_empty() {
        out.push_str("    _fields_ = []\n");
    } else {
        out.push_str("    _fields_ = [\n");
        for field in &def.fields {
            let ty = field_type(ctx, field, &field.ty, current, module)?;
            match field.bits {
                Some(bits) => out.push_str(&format!("        (\"{}\", {ty}, {bits}),\n", field.name)),
                None => out.push_str(&format!("        (\"{}\", {ty}),\n", field.name)),
            }
        }
        out.push_str("    ]\n");
    }
    if let Some(id) = ctx.message_id(&def.name) {
        out.push_str(&format!("    ID = {id}\n"));
    }
    Ok(out)
}

fn field_type(
    ctx: &CompilationContext,
    field: &Field,
    ty: &FieldType,
    current: &Path,
    module: &mut Module,
) -> Result<String> {
    let unsupported = |type_name: String| EmitError::UnsupportedType {
        target: Target::Python,
        type_name,
        field: field.name.clone(),
    };

    match ty {
        FieldType::Primitive(p) => {
            let name = ctype(*p, field.bits.is_some()).ok_or_else(|| unsupported(p.to_string()))?;
            module.ctypes.insert(name);
            Ok(name.to_string())
        }
        FieldType::Named(name) => match ctx.lookup(name).map(|entry| &entry.declaration) {
            Some(Declaration::Enum(def)) => {
                let backing =
                    ctype(def.backing, true).ok_or_else(|| unsupported(def.backing.to_string()))?;
                module.ctypes.insert(backing);
                Ok(backing.to_string())
            }
            Some(Declaration::Struct(_)) => {
                if let Some(stem) = foreign_stem(ctx, name, current) {
                    module.foreign.entry(stem).or_default().insert(name.clone());
                }
                Ok(name.clone())
            }
            None => Err(EmitError::Schema(gpulink_idl::SchemaError::UnknownStruct(
                name.clone(),
            ))),
        },
        FieldType::Array { of, count } => {
            let element = field_type(ctx, field, of, current, module)?;
            Ok(format!("{element} * {count}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpulink_idl::{compile_corpus, Corpus};

    fn emit(sources: &[(&str, &str)]) -> Result<Vec<Artifact>> {
        let corpus = Corpus::from_sources(sources.iter().copied()).unwrap();
        let compiled = compile_corpus(&corpus).unwrap();
        let mut emitter = PythonEmitter::new();
        for file in &compiled.files {
            let emission = emitter.begin_file(file);
            emitter.emit(&compiled.context, emission, file)?;
        }
        emitter.finish_corpus(&compiled.context, &[])?;
        Ok(emitter.artifacts().to_vec())
    }

    fn artifact<'a>(artifacts: &'a [Artifact], path: &str) -> &'a str {
        &artifacts
            .iter()
            .find(|a| a.path == Path::new(path))
            .unwrap_or_else(|| panic!("no artifact {path}"))
            .contents
    }

    #[test]
    fn structure_with_bitfields_arrays_and_enum() {
        let artifacts = emit(&[(
            "draw.th",
            "enum Mode : uint16 { Fill, Line = 4 };\n\
             struct Draw { uint8 r : 3; uint8 g : 5; Mode mode; uint8 data[32]; };",
        )])
        .unwrap();
        let module = artifact(&artifacts, "messages/draw.py");

        assert!(module.contains("from ctypes import LittleEndianStructure, c_uint16, c_uint8\n"));
        assert!(module.contains("from enum import IntEnum\n"));
        assert!(module.contains("class Mode(IntEnum):\n    Fill = 0\n    Line = 4\n"));
        assert!(module.contains("class Draw(LittleEndianStructure):\n    _pack_ = 1\n"));
        assert!(module.contains("        (\"r\", c_uint8, 3),\n        (\"g\", c_uint8, 5),\n"));
        assert!(module.contains("        (\"mode\", c_uint16),\n"));
        assert!(module.contains("        (\"data\", c_uint8 * 32),\n"));
        assert!(module.contains("    ID = 0\n"));
    }

    #[test]
    fn included_structs_are_imported() {
        let artifacts = emit(&[
            ("a.th", "struct A { uint8 x; };"),
            (
                "b.th",
                "/* include: a.th */\n/* not_message: B */\nstruct B { A a; A more[2]; uint16 y; };",
            ),
        ])
        .unwrap();
        let b = artifact(&artifacts, "messages/b.py");
        assert!(b.contains("from .a import A\n"));
        assert!(b.contains("(\"more\", A * 2),"));
        assert!(!b.contains("ID ="));
    }

    #[test]
    fn half_is_unsupported() {
        let err = emit(&[("h.th", "struct H { half value; };")]).unwrap_err();
        match err {
            EmitError::UnsupportedType {
                target,
                type_name,
                field,
            } => {
                assert_eq!(target, Target::Python);
                assert_eq!(type_name, "half");
                assert_eq!(field, "value");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn char_fields() {
        let artifacts = emit(&[("c.th", "struct C { char name[8]; char flag : 1; char rest : 7; };")]).unwrap();
        let module = artifact(&artifacts, "messages/c.py");
        assert!(module.contains("(\"name\", c_char * 8),"));
        assert!(module.contains("(\"flag\", c_uint8, 1),"));
    }

    #[test]
    fn package_artifacts() {
        let artifacts = emit(&[
            ("a.th", "struct A { uint8 x; };"),
            ("b.th", "struct Ping { };"),
        ])
        .unwrap();

        let ids = artifact(&artifacts, "messages/messages.py");
        assert!(ids.contains("class Messages(IntEnum):\n    A = 0\n    Ping = 1\n"));

        let package = artifact(&artifacts, "messages/__init__.py");
        assert!(package.contains("from . import header, messages, a, b\n"));
        assert!(package.contains("__all__ = [\"header\", \"messages\", \"a\", \"b\"]"));

        assert!(artifact(&artifacts, "messages/b.py").contains("    _fields_ = []\n    ID = 1\n"));
        assert!(artifact(&artifacts, "messages/header.py").contains("START_TOKEN = 0x7E"));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let cases = [
            ("struct S { uint8 lambda; };", "lambda", "S"),
            ("struct S { uint8 ID; };", "ID", "S"),
            ("struct S { uint8 _fields_; };", "_fields_", "S"),
            ("enum E : uint8 { None };", "None", "E"),
            ("struct pass { uint8 x; };", "pass", "file"),
        ];
        for (text, expected_name, expected_scope) in cases {
            match emit(&[("r.th", text)]) {
                Err(EmitError::ReservedName { target, name, scope }) => {
                    assert_eq!(target, Target::Python);
                    assert_eq!(name, expected_name);
                    assert_eq!(scope, expected_scope);
                }
                other => panic!("{text}: unexpected {other:?}"),
            }
        }

        // `ID` is only reserved inside messages
        assert!(emit(&[("p.th", "/* not_message: P */\nstruct P { uint8 ID; };")]).is_ok());
    }
}
