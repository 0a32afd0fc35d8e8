//! C++ bindings: one packed header per schema file.

use std::path::{Path, PathBuf};

use gpulink_idl::{
    struct_layout, CompilationContext, Declaration, EnumDef, Field, FieldType, Primitive,
    ResolvedFile, StructDef,
};
use tracing::debug;

use crate::emitter::{include_stem, Artifact, Emitter, FileEmission, Target};
use crate::error::{EmitError, Result};

const LIBRARY: &str = "gpulink_messages";
const GENERATED: &str = "Generated by gpulink. Do not edit.";

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char8_t", "char16_t", "char32_t", "class", "compl", "concept",
    "const", "consteval", "constexpr", "constinit", "const_cast", "continue", "co_await",
    "co_return", "co_yield", "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto",
    "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "not", "not_eq",
    "nullptr", "operator", "or", "or_eq", "private", "protected", "public", "register",
    "reinterpret_cast", "requires", "return", "short", "signed", "sizeof", "static",
    "static_assert", "static_cast", "struct", "switch", "template", "this", "thread_local",
    "throw", "true", "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
];

/// Emits `messages/<stem>.hpp` per file plus the id table, the frame header
/// and a CMake interface library.
#[derive(Debug, Default)]
pub struct CppEmitter {
    source_root: Option<PathBuf>,
    headers: Vec<PathBuf>,
    artifacts: Vec<Artifact>,
}

impl CppEmitter {
    /// `source_root` locates the schema files for CMake configure dependencies.
    pub fn new(source_root: Option<&Path>) -> Self {
        Self {
            source_root: source_root.map(Path::to_path_buf),
            ..Self::default()
        }
    }
}

impl Emitter for CppEmitter {
    fn target(&self) -> Target {
        Target::Cpp
    }

    fn begin_file(&mut self, file: &ResolvedFile) -> FileEmission {
        FileEmission {
            path: PathBuf::from("messages").join(format!("{}.hpp", file.stem)),
            stem: file.stem.clone(),
        }
    }

    fn emit(
        &mut self,
        ctx: &CompilationContext,
        emission: FileEmission,
        file: &ResolvedFile,
    ) -> Result<()> {
        let mut out = banner(&format!(
            "Generated by gpulink from {}. Do not edit.",
            file.path.display()
        ));
        out.push_str("#pragma once\n\n#include <cstdint>\n");
        for include in &file.metadata.includes {
            out.push_str(&format!("#include \"{}.hpp\"\n", include_stem(include)));
        }

        for declaration in &file.declarations {
            check_names(ctx, declaration)?;
            out.push('\n');
            match declaration {
                Declaration::Enum(def) => out.push_str(&enum_definition(def)),
                Declaration::Struct(def) => out.push_str(&struct_definition(ctx, def)?),
            }
        }

        debug!(path = %emission.path.display(), "emitted C++ header");
        self.headers.push(emission.path.clone());
        self.artifacts.push(Artifact {
            path: emission.path,
            contents: out,
        });
        Ok(())
    }

    fn finish_corpus(&mut self, ctx: &CompilationContext, sources: &[PathBuf]) -> Result<()> {
        let mut ids = banner(GENERATED);
        ids.push_str("#pragma once\n\n#include <cstdint>\n\nenum class Messages : uint8_t\n{\n");
        for message in ctx.messages() {
            ids.push_str(&format!("    {} = {},\n", message.name, message.id));
        }
        ids.push_str("};\n");

        let mut header = banner(GENERATED);
        header.push_str(
            "#pragma once\n\n#include <cstdint>\n\n\
             constexpr uint8_t start_token = 0x7e;\n\n\
             struct __attribute__((packed, aligned(1))) Header\n{\n    \
             uint8_t id;\n    uint16_t size;\n};\n\
             static_assert(sizeof(Header) == 3, \"Header must match its wire size\");\n",
        );

        let mut headers = vec![
            PathBuf::from("messages/header.hpp"),
            PathBuf::from("messages/messages.hpp"),
        ];
        headers.extend(self.headers.iter().cloned());

        let mut cmake = String::from(
            "# ********************************\n\
             # * FILE AUTOMATICALLY GENERATED *\n\
             # ********************************\n\n",
        );
        cmake.push_str(&format!("add_library({LIBRARY} INTERFACE)\n\n"));
        cmake.push_str(&format!("target_sources({LIBRARY}\n    INTERFACE\n"));
        for path in &headers {
            cmake.push_str(&format!(
                "        ${{CMAKE_CURRENT_LIST_DIR}}/{}\n",
                slashes(path)
            ));
        }
        cmake.push_str(")\n\n");
        cmake.push_str(&format!(
            "target_include_directories({LIBRARY}\n    INTERFACE\n        \
             ${{CMAKE_CURRENT_LIST_DIR}}\n        ${{CMAKE_CURRENT_LIST_DIR}}/messages\n)\n"
        ));
        if !sources.is_empty() {
            cmake.push('\n');
        }
        for source in sources {
            let path = match &self.source_root {
                Some(root) => root.join(source),
                None => source.clone(),
            };
            cmake.push_str(&format!(
                "set_property(DIRECTORY APPEND PROPERTY CMAKE_CONFIGURE_DEPENDS {})\n",
                slashes(&path)
            ));
        }

        self.artifacts.push(Artifact {
            path: PathBuf::from("messages/messages.hpp"),
            contents: ids,
        });
        self.artifacts.push(Artifact {
            path: PathBuf::from("messages/header.hpp"),
            contents: header,
        });
        self.artifacts.push(Artifact {
            path: PathBuf::from("CMakeLists.txt"),
            contents: cmake,
        });
        Ok(())
    }

    fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }
}

fn banner(note: &str) -> String {
    format!(
        "// ********************************\n\
         // * FILE AUTOMATICALLY GENERATED *\n\
         // ********************************\n\
         // {note}\n\n"
    )
}

fn slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn primitive(p: Primitive) -> &'static str {
    match p {
        Primitive::Uint8 => "uint8_t",
        Primitive::Uint16 => "uint16_t",
        Primitive::Uint32 => "uint32_t",
        Primitive::Uint64 => "uint64_t",
        Primitive::Int8 => "int8_t",
        Primitive::Int16 => "int16_t",
        Primitive::Int32 => "int32_t",
        Primitive::Int64 => "int64_t",
        Primitive::Char => "char",
        Primitive::Half => "_Float16",
        Primitive::Float => "float",
        Primitive::Double => "double",
    }
}

fn reserved(name: &str, scope: &str) -> EmitError {
    EmitError::ReservedName {
        target: Target::Cpp,
        name: name.to_string(),
        scope: scope.to_string(),
    }
}

/// Keywords anywhere, `id` as a message field, and the generated
/// `Messages`/`Header` names at file scope.
fn check_names(ctx: &CompilationContext, declaration: &Declaration) -> Result<()> {
    let name = declaration.name();
    if KEYWORDS.contains(&name) || name == "Messages" || name == "Header" {
        return Err(reserved(name, "file"));
    }
    match declaration {
        Declaration::Enum(def) => {
            if let Some(value) = def.values.iter().find(|v| KEYWORDS.contains(&v.name.as_str())) {
                return Err(reserved(&value.name, name));
            }
        }
        Declaration::Struct(def) => {
            let message = ctx.is_message(name);
            if let Some(field) = def
                .fields
                .iter()
                .find(|f| KEYWORDS.contains(&f.name.as_str()) || (message && f.name == "id"))
            {
                return Err(reserved(&field.name, name));
            }
        }
    }
    Ok(())
}

fn enum_definition(def: &EnumDef) -> String {
    let mut out = format!("enum class {} : {}\n{{\n", def.name, primitive(def.backing));
    for (index, value) in def.values.iter().enumerate() {
        let separator = if index + 1 == def.values.len() { "" } else { "," };
        out.push_str(&format!("    {} = {}{separator}\n", value.name, value.value));
    }
    out.push_str("};\n");
    out
}

fn field_declaration(field: &Field) -> String {
    let mut dims = String::new();
    let mut ty = &field.ty;
    while let FieldType::Array { of, count } = ty {
        dims.push_str(&format!("[{count}]"));
        ty = of;
    }
    let base = match ty {
        FieldType::Primitive(p) => primitive(*p).to_string(),
        named => named.to_string(),
    };
    match field.bits {
        Some(bits) => format!("    {base} {} : {bits};\n", field.name),
        None => format!("    {base} {}{dims};\n", field.name),
    }
}

fn struct_definition(ctx: &CompilationContext, def: &StructDef) -> Result<String> {
    let layout = struct_layout(ctx, &def.name)?;
    let mut out = format!(
        "struct __attribute__((packed, aligned(1))) {}\n{{\n",
        def.name
    );
    for field in &def.fields {
        out.push_str(&field_declaration(field));
    }
    if let Some(id) = ctx.message_id(&def.name) {
        if !def.fields.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("    constexpr static uint8_t id = {id};\n"));
    }
    out.push_str("};\n");
    // An empty C++ struct still has sizeof 1.
    if layout.size > 0 {
        out.push_str(&format!(
            "static_assert(sizeof({0}) == {1}, \"{0} must match its wire size\");\n",
            def.name, layout.size
        ));
    }
    Ok(out)
}
