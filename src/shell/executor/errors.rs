use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::shell::builtins::BuiltinError;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("{0}: built-in cannot be used in a pipeline")]
    UnsupportedBuiltinInPipeline(String),
    #[error("{}: {source}", path.display())]
    Redirect { path: PathBuf, source: io::Error },
    #[error("failed to create pipe: {0}")]
    Pipe(#[source] nix::Error),
    #[error("failed to duplicate stream: {0}")]
    Stream(#[source] io::Error),
    #[error("{name}: failed to start: {source}")]
    Spawn { name: String, source: io::Error },
    #[error("{name}: failed to wait: {source}")]
    Wait { name: String, source: io::Error },
    #[error("{name}: {source}")]
    Builtin { name: String, source: BuiltinError },
}
