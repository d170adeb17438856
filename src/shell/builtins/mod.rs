//! Commands implemented inside the shell process.
//!
//! Handlers never touch the process's real standard streams; they read and
//! write through the handles in [`Invocation`], so the executor can point
//! them at a terminal, a redirect target or a pipe.

mod dirs;
mod env;
mod info;
mod session_ops;
mod simple;

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::shell::executor::job_manager::JobManager;
use crate::shell::session::Session;

#[derive(Error, Debug)]
pub enum BuiltinError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("HOME not set")]
    HomeNotSet,
    #[error("no previous directory")]
    NoPreviousDirectory,
    #[error("{path}: {source}")]
    Path { path: String, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOutcome {
    Status(i32),
    /// Ask the REPL to terminate with the given code.
    Exit(i32),
}

impl BuiltinOutcome {
    pub const SUCCESS: BuiltinOutcome = BuiltinOutcome::Status(0);
    pub const FAILURE: BuiltinOutcome = BuiltinOutcome::Status(1);
}

/// Everything a handler may touch while it runs.
pub struct Invocation<'a> {
    pub args: &'a [String],
    pub session: &'a Session,
    pub registry: &'a Registry,
    pub jobs: &'a JobManager,
    /// The stage's input. No standard built-in consumes it; it is wired
    /// so handlers registered with [`Registry::with`] can read a pipe.
    #[allow(dead_code)]
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

pub type Handler =
    Arc<dyn Fn(&mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> + Send + Sync>;

pub struct Builtin {
    pub name: &'static str,
    pub summary: &'static str,
    pub usage: &'static str,
    /// False for commands that change session state or end the shell;
    /// those cannot run as a pipeline stage.
    pub pipeline_safe: bool,
    pub handler: Handler,
}

impl Builtin {
    pub fn new<F>(
        name: &'static str,
        summary: &'static str,
        usage: &'static str,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> + Send + Sync + 'static,
    {
        Self {
            name,
            summary,
            usage,
            pipeline_safe: true,
            handler: Arc::new(handler),
        }
    }

    pub fn stateful(mut self) -> Self {
        self.pipeline_safe = false;
        self
    }

    pub fn run(&self, invocation: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
        (self.handler)(invocation)
    }
}

/// Immutable name → built-in mapping, built once at start-up.
#[derive(Default)]
pub struct Registry {
    commands: BTreeMap<&'static str, Arc<Builtin>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        Self::empty()
            .with(
                Builtin::new("cd", "Change the current directory", "cd [directory|-]", dirs::cd)
                    .stateful(),
            )
            .with(Builtin::new("pwd", "Print the current working directory", "pwd", dirs::pwd))
            .with(Builtin::new("echo", "Display a line of text", "echo [text...]", simple::echo))
            .with(Builtin::new("exit", "Exit the shell", "exit [code]", simple::exit).stateful())
            .with(Builtin::new("help", "Display help information", "help [command]", info::help))
            .with(Builtin::new(
                "history",
                "Display command history",
                "history [n]",
                session_ops::history,
            ))
            .with(
                Builtin::new(
                    "alias",
                    "Create or display aliases",
                    "alias [name[=value]...]",
                    session_ops::alias,
                )
                .stateful(),
            )
            .with(
                Builtin::new("unalias", "Remove aliases", "unalias name...", session_ops::unalias)
                    .stateful(),
            )
            .with(Builtin::new("env", "Display environment variables", "env [name...]", env::env))
            .with(
                Builtin::new(
                    "export",
                    "Export environment variables",
                    "export name[=value]...",
                    env::export,
                )
                .stateful(),
            )
            .with(Builtin::new("which", "Locate a command", "which command...", info::which))
            .with(Builtin::new(
                "type",
                "Display information about command type",
                "type command...",
                info::type_of,
            ))
            .with(Builtin::new("jobs", "List background jobs", "jobs", info::jobs))
    }

    pub fn with(mut self, builtin: Builtin) -> Self {
        self.commands.insert(builtin.name, Arc::new(builtin));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<Builtin>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Built-ins in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.commands.values().map(|b| b.as_ref())
    }
}
