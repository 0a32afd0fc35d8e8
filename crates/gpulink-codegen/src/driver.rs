use std::path::{Path, PathBuf};

use gpulink_idl::Compilation;
use serde::Serialize;
use tracing::{info, warn};

use crate::emitter::{emitter_for, Artifact, Emitter, Target};
use crate::error::{EmitError, Result};

/// Result of generating one target.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: Target,
    /// Files written, or the error that stopped this target.
    pub result: Result<Vec<PathBuf>>,
}

impl TargetOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn summary(&self) -> OutcomeSummary {
        match &self.result {
            Ok(files) => OutcomeSummary {
                target: self.target,
                ok: true,
                files: files.clone(),
                error: None,
            },
            Err(err) => OutcomeSummary {
                target: self.target,
                ok: false,
                files: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

/// Serializable view of a [`TargetOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub target: Target,
    pub ok: bool,
    pub files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run one emitter over a compiled corpus, in memory.
pub fn emit_target(emitter: &mut dyn Emitter, compilation: &Compilation) -> Result<()> {
    for file in &compilation.files {
        let emission = emitter.begin_file(file);
        emitter.emit(&compilation.context, emission, file)?;
    }
    let sources: Vec<PathBuf> = compilation.files.iter().map(|f| f.path.clone()).collect();
    emitter.finish_corpus(&compilation.context, &sources)
}

/// Write artifacts below `dir`, creating directories as needed.
pub fn write_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(&artifact.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EmitError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &artifact.contents).map_err(|source| EmitError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}

/// Generate every requested target under `<output>/<target>`.
///
/// A target's files are written only after its emitter finished without
/// error. One failing target does not stop the others.
pub fn generate(
    compilation: &Compilation,
    source_root: Option<&Path>,
    output: &Path,
    targets: &[Target],
) -> Vec<TargetOutcome> {
    targets
        .iter()
        .map(|&target| {
            let mut emitter = emitter_for(target, source_root);
            let result = emit_target(emitter.as_mut(), compilation).and_then(|()| {
                write_artifacts(&output.join(target.directory()), emitter.artifacts())
            });
            match &result {
                Ok(files) => info!(%target, files = files.len(), "generated bindings"),
                Err(err) => warn!(%target, error = %err, "target failed"),
            }
            TargetOutcome { target, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpulink_idl::{compile_corpus, Corpus};

    fn temp_out(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gpulink-codegen-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn writes_each_target_under_its_directory() {
        let corpus = Corpus::from_sources([("a.th", "struct A { uint8 x; };")]).unwrap();
        let compiled = compile_corpus(&corpus).unwrap();
        let out = temp_out("both");

        let outcomes = generate(&compiled, None, &out, &Target::ALL);
        assert!(outcomes.iter().all(TargetOutcome::is_ok));
        assert!(out.join("cpp/messages/a.hpp").is_file());
        assert!(out.join("cpp/CMakeLists.txt").is_file());
        assert!(out.join("python/messages/a.py").is_file());
        assert!(out.join("python/messages/__init__.py").is_file());

        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn failing_target_does_not_stop_others() {
        let corpus = Corpus::from_sources([("h.th", "struct H { half v; };")]).unwrap();
        let compiled = compile_corpus(&corpus).unwrap();
        let out = temp_out("partial");

        let outcomes = generate(&compiled, None, &out, &[Target::Python, Target::Cpp]);
        assert!(matches!(
            outcomes[0].result,
            Err(EmitError::UnsupportedType { .. })
        ));
        assert!(outcomes[1].is_ok());
        assert!(!out.join("python").exists());
        assert!(out.join("cpp/messages/h.hpp").is_file());

        let summary = outcomes[0].summary();
        assert!(!summary.ok);
        assert!(summary.error.unwrap().contains("half"));

        let _ = std::fs::remove_dir_all(&out);
    }
}
