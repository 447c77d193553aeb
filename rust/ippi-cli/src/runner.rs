//! Loading, checking and running program files on behalf of the binary.

use crate::config::ConfigError;
use ippi_vm::{ExecOptions, Executor, ExitStatus, InputSource, Program};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Status when a program or input file cannot be opened.
pub const INPUT_FILE_STATUS: i32 = 11;
/// Status when program output cannot be written.
pub const OUTPUT_STATUS: i32 = 12;
/// Status when `ippi.toml` cannot be read or parsed.
pub const CONFIG_STATUS: i32 = 13;
/// Status for host-side failures that have no closer match.
pub const INTERNAL_STATUS: i32 = 99;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing output: {0}")]
    Output(std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] ippi_vm::Error),
}

impl CliError {
    /// Process status reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Open { .. } => INPUT_FILE_STATUS,
            CliError::Output(_) => OUTPUT_STATUS,
            CliError::Config(_) => CONFIG_STATUS,
            CliError::Engine(e) => e.exit_code(),
        }
    }
}

/// Read and validate a JSON program file.
pub fn load_program(path: &Path) -> Result<Program, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let program = source
        .parse::<Program>()
        .map_err(ippi_vm::Error::from)?;
    debug!(path = %path.display(), instructions = program.len(), "loaded program");
    Ok(program)
}

/// Run `program` to completion, writing to `output`.
///
/// Output produced before a failure is still flushed.
pub fn run_program<W, I>(
    program: Program,
    output: &mut W,
    input: I,
    options: ExecOptions,
) -> Result<ExitStatus, CliError>
where
    W: Write,
    I: InputSource + 'static,
{
    let mut vm = Executor::new(program, &mut *output)
        .with_input(input)
        .with_options(options);
    let result = vm.run();
    drop(vm);
    output.flush().map_err(CliError::Output)?;
    Ok(result.map_err(ippi_vm::Error::from)?)
}
