use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use gpulink_idl::{CompilationContext, ResolvedFile};
use serde::Serialize;

use crate::error::Result;

/// Languages bindings can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Cpp,
    Python,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Cpp, Target::Python];

    /// Directory under the output root that holds this target's artifacts.
    pub fn directory(self) -> &'static str {
        match self {
            Target::Cpp => "cpp",
            Target::Python => "python",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpp" | "c++" => Ok(Target::Cpp),
            "python" | "py" => Ok(Target::Python),
            other => Err(format!("unknown target `{other}` (expected cpp or python)")),
        }
    }
}

/// A generated file, relative to the target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: String,
}

/// Where the bindings for one schema file go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEmission {
    /// Output path relative to the target directory.
    pub path: PathBuf,
    pub stem: String,
}

/// A code generator for one target language.
///
/// The driver calls [`begin_file`](Emitter::begin_file) and
/// [`emit`](Emitter::emit) once per resolved schema file in corpus order,
/// then [`finish_corpus`](Emitter::finish_corpus) once. Message ids are read
/// from the shared context; an emitter never numbers messages itself.
pub trait Emitter {
    fn target(&self) -> Target;

    fn begin_file(&mut self, file: &ResolvedFile) -> FileEmission;

    fn emit(
        &mut self,
        ctx: &CompilationContext,
        emission: FileEmission,
        file: &ResolvedFile,
    ) -> Result<()>;

    /// Produce the corpus-wide artifacts: id table, header and package files.
    fn finish_corpus(&mut self, ctx: &CompilationContext, sources: &[PathBuf]) -> Result<()>;

    fn artifacts(&self) -> &[Artifact];
}

/// The emitter for a target.
pub fn emitter_for(target: Target, source_root: Option<&Path>) -> Box<dyn Emitter> {
    match target {
        Target::Cpp => Box::new(crate::cpp::CppEmitter::new(source_root)),
        Target::Python => Box::new(crate::python::PythonEmitter::new()),
    }
}

/// Stem of an include annotation entry: `"sub/common.th"` is `common`.
pub(crate) fn include_stem(include: &str) -> String {
    Path::new(include)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(include)
        .to_string()
}

/// Stem of the file that declared `name`, if it is not the current file.
pub(crate) fn foreign_stem(ctx: &CompilationContext, name: &str, current: &Path) -> Option<String> {
    let entry = ctx.lookup(name)?;
    if entry.file == current {
        return None;
    }
    entry
        .file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
