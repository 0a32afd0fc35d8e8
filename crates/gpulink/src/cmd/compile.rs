use gpulink_codegen::{generate, Target};
use gpulink_idl::{compile_corpus, Corpus};

use crate::cmd::CompileArgs;
use crate::exit::{emit_error, schema_error, CliResult, SUCCESS};
use crate::output::{print_outcomes, OutputFormat};

pub fn run(args: CompileArgs, format: OutputFormat) -> CliResult<i32> {
    let corpus = Corpus::from_directory(&args.input_dir)
        .map_err(|err| schema_error("loading schemas failed", err))?;
    let compilation =
        compile_corpus(&corpus).map_err(|err| schema_error("compile failed", err))?;

    let targets = dedup(&args.target);
    let outcomes = generate(&compilation, corpus.root(), &args.output, &targets);
    let summaries: Vec<_> = outcomes.iter().map(|outcome| outcome.summary()).collect();
    print_outcomes(&summaries, format);

    // Other targets still write their output; the first failure sets the exit code.
    for outcome in outcomes {
        if let Err(err) = outcome.result {
            return Err(emit_error(&format!("{} bindings failed", outcome.target), err));
        }
    }
    Ok(SUCCESS)
}

fn dedup(targets: &[Target]) -> Vec<Target> {
    let mut unique = Vec::with_capacity(targets.len());
    for target in targets {
        if !unique.contains(target) {
            unique.push(*target);
        }
    }
    unique
}
