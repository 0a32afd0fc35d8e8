use gpulink_idl::{compile_corpus, Corpus};

use crate::cmd::IdsArgs;
use crate::exit::{schema_error, CliResult, SUCCESS};
use crate::output::{print_ids, OutputFormat};

pub fn run(args: IdsArgs, format: OutputFormat) -> CliResult<i32> {
    let corpus = Corpus::from_directory(&args.input_dir)
        .map_err(|err| schema_error("loading schemas failed", err))?;
    let compilation =
        compile_corpus(&corpus).map_err(|err| schema_error("compile failed", err))?;
    print_ids(compilation.context.messages(), format);
    Ok(SUCCESS)
}
