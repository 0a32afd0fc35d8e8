use tracing::info;

use crate::context::CompilationContext;
use crate::corpus::Corpus;
use crate::error::{Result, SchemaError};
use crate::layout::{struct_layout, MAX_MESSAGE_SIZE};
use crate::model::Declaration;
use crate::resolver::{resolve_file, ResolvedFile};

/// A fully resolved and classified corpus, ready for emission.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub context: CompilationContext,
    /// Resolved files in corpus order.
    pub files: Vec<ResolvedFile>,
}

/// Resolve every file of the corpus, then assign message ids in corpus
/// order and declaration order.
///
/// Resolution of the whole corpus completes before any id is assigned, so
/// a schema error anywhere leaves nothing half-compiled.
pub fn compile_corpus(corpus: &Corpus) -> Result<Compilation> {
    let files = corpus
        .files()
        .iter()
        .map(|file| resolve_file(corpus, file))
        .collect::<Result<Vec<_>>>()?;

    let mut context = CompilationContext::new();
    for file in &files {
        context.classify(file)?;
    }
    check_layouts(&context, &files)?;

    info!(
        files = files.len(),
        messages = context.messages().len(),
        "compiled schema corpus"
    );
    Ok(Compilation { context, files })
}

/// Every struct must have a bindable layout, and every message must fit a
/// frame payload.
fn check_layouts(context: &CompilationContext, files: &[ResolvedFile]) -> Result<()> {
    let structs = files
        .iter()
        .flat_map(|file| &file.declarations)
        .filter_map(|declaration| match declaration {
            Declaration::Struct(def) => Some(def),
            Declaration::Enum(_) => None,
        });
    for def in structs {
        let layout = struct_layout(context, &def.name)?;
        if context.is_message(&def.name) && layout.size > MAX_MESSAGE_SIZE {
            return Err(SchemaError::MessageTooLarge {
                name: def.name.clone(),
                size: layout.size,
                limit: MAX_MESSAGE_SIZE,
            });
        }
    }
    Ok(())
}
