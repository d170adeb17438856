use std::io::{self, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{self, Child};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use nix::sys::signal::Signal;

use super::errors::ExecError;
use super::executor::{Executor, Stage, Target};
use super::io::{cloexec_pipe, Input, Output, Streams};
use super::redirect;
use crate::shell::builtins::{Builtin, BuiltinError, BuiltinOutcome, Invocation};
use crate::shell::parser::{Command, Redirect};

/// Status reported when a built-in stage loses its reader.
pub const BROKEN_PIPE_STATUS: i32 = 128 + Signal::SIGPIPE as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub code: i32,
    pub signaled: bool,
}

/// A launched stage: a child process or a thread running a built-in.
pub enum Running {
    Builtin { name: String, handle: JoinHandle<i32> },
    External { name: String, child: Child },
}

impl Running {
    pub fn pid(&self) -> Option<u32> {
        match self {
            Running::External { child, .. } => Some(child.id()),
            Running::Builtin { .. } => None,
        }
    }

    fn wait(self) -> Result<Finished, ExecError> {
        match self {
            Running::External { name, mut child } => {
                let status = child
                    .wait()
                    .map_err(|source| ExecError::Wait { name: name.clone(), source })?;
                let finished = match (status.code(), status.signal()) {
                    (Some(code), _) => Finished { code, signaled: false },
                    (None, Some(signal)) => Finished { code: 128 + signal, signaled: true },
                    (None, None) => Finished { code: 1, signaled: false },
                };
                debug!("{} (pid {}) exited with {}", name, child.id(), finished.code);
                Ok(finished)
            }
            Running::Builtin { name, handle } => {
                let code = handle.join().unwrap_or_else(|_| {
                    error!("built-in stage {} panicked", name);
                    1
                });
                Ok(Finished { code, signaled: false })
            }
        }
    }
}

/// Waits for every stage, in order, and reports the last stage's status.
/// A failed wait does not stop the remaining stages from being reaped.
pub(super) fn wait_all(running: Vec<Running>) -> Result<Finished, ExecError> {
    let mut last = Finished { code: 0, signaled: false };
    let mut first_error = None;
    for stage in running {
        match stage.wait() {
            Ok(finished) => last = finished,
            Err(e) => {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(last),
    }
}

/// Connects `stages` with pipes and starts all of them without waiting.
///
/// On failure nothing keeps running unobserved: the pipe ends held here are
/// closed and every stage already started is waited for.
pub(super) fn launch(
    executor: &Executor,
    stages: Vec<Stage>,
    streams: Streams,
    background: bool,
) -> Result<Vec<Running>, ExecError> {
    let mut running = Vec::with_capacity(stages.len());
    match launch_into(executor, stages, streams, background, &mut running) {
        Ok(()) => Ok(running),
        Err(e) => {
            error!("pipeline aborted: {}", e);
            if let Err(wait_err) = wait_all(running) {
                warn!("while reaping aborted pipeline: {}", wait_err);
            }
            Err(e)
        }
    }
}

fn launch_into(
    executor: &Executor,
    stages: Vec<Stage>,
    streams: Streams,
    background: bool,
    running: &mut Vec<Running>,
) -> Result<(), ExecError> {
    let count = stages.len();
    let Streams {
        stdin,
        mut stdout,
        stderr,
    } = streams;
    let mut next_input = stdin;

    for (i, stage) in stages.into_iter().enumerate() {
        let last = i + 1 == count;
        let input = std::mem::replace(&mut next_input, Input::Null);
        let output = if last {
            std::mem::replace(&mut stdout, Output::Null)
        } else {
            let (reader, writer) = cloexec_pipe().map_err(ExecError::Pipe)?;
            next_input = Input::Pipe(reader);
            Output::Pipe(writer)
        };

        let mut stage_streams = Streams {
            stdin: input,
            stdout: output,
            stderr: stderr.try_clone().map_err(ExecError::Stream)?,
        };

        if let Some(redirect) = &stage.command.redirect {
            let name = &stage.command.name;
            if !last && redirect.kind.replaces_stdout() {
                sever(&stage_streams, name, redirect, "output is not piped to the next stage");
            }
            if i > 0 && redirect.kind.replaces_stdin() {
                sever(&stage_streams, name, redirect, "input from the previous stage is discarded");
            }
            stage_streams = redirect::apply(redirect, stage_streams, executor.session())?;
        }

        running.push(start(executor, stage, stage_streams, background)?);
    }
    Ok(())
}

fn sever(streams: &Streams, name: &str, redirect: &Redirect, effect: &str) {
    let message = format!(
        "conduit: warning: {}: redirected with {} {}; {}",
        name,
        redirect.kind.operator(),
        redirect.target,
        effect
    );
    warn!("{}", message);
    streams.warn(&message);
}

fn start(
    executor: &Executor,
    stage: Stage,
    streams: Streams,
    background: bool,
) -> Result<Running, ExecError> {
    let Stage { command, target } = stage;
    match target {
        Target::External(path) => {
            let child = spawn_external(executor, &path, &command, streams, background)?;
            debug!("started {} as pid {}", command.name, child.id());
            Ok(Running::External {
                name: command.name,
                child,
            })
        }
        Target::Builtin(builtin) => {
            let handle = spawn_builtin(executor, builtin, command.arguments, streams)
                .map_err(|source| ExecError::Spawn {
                    name: command.name.clone(),
                    source,
                })?;
            Ok(Running::Builtin {
                name: command.name,
                handle,
            })
        }
    }
}

/// The `process::Command` is dropped before returning so the parent does
/// not keep the child's pipe ends open.
fn spawn_external(
    executor: &Executor,
    path: &Path,
    command: &Command,
    streams: Streams,
    background: bool,
) -> Result<Child, ExecError> {
    let session = executor.session();
    let mut process = process::Command::new(path);
    process
        .arg0(&command.name)
        .args(&command.arguments)
        .envs(session.env_overlay())
        .current_dir(session.working_dir())
        .stdin(streams.stdin.into_stdio())
        .stdout(streams.stdout.into_stdio())
        .stderr(streams.stderr.into_stdio());
    if background {
        process.process_group(0);
    }
    process.spawn().map_err(|source| ExecError::Spawn {
        name: command.name.clone(),
        source,
    })
}

fn spawn_builtin(
    executor: &Executor,
    builtin: Arc<Builtin>,
    args: Vec<String>,
    streams: Streams,
) -> io::Result<JoinHandle<i32>> {
    let session = Arc::clone(executor.session());
    let registry = Arc::clone(executor.registry());
    let jobs = executor.jobs().clone();

    thread::Builder::new()
        .name(format!("builtin-{}", builtin.name))
        .spawn(move || {
            let mut stdin = streams.stdin.into_reader();
            let mut stdout = streams.stdout.into_stdout_writer();
            let mut stderr = streams.stderr.into_stderr_writer();
            let result = builtin.run(&mut Invocation {
                args: &args,
                session: &session,
                registry: &registry,
                jobs: &jobs,
                stdin: &mut stdin,
                stdout: &mut stdout,
                stderr: &mut stderr,
            });
            let result = result.and_then(|outcome| {
                stdout.flush()?;
                Ok(outcome)
            });
            // close our end so the next stage sees EOF
            drop(stdout);
            stage_status(builtin.name, result, &mut stderr)
        })
}

/// Exit status of a built-in run as a pipeline or background stage. Errors
/// are reported on the stage's own stderr.
fn stage_status(
    name: &str,
    result: Result<BuiltinOutcome, BuiltinError>,
    stderr: &mut dyn Write,
) -> i32 {
    match result {
        Ok(BuiltinOutcome::Status(code)) | Ok(BuiltinOutcome::Exit(code)) => code,
        Err(BuiltinError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("{}: reader went away", name);
            BROKEN_PIPE_STATUS
        }
        Err(e) => {
            if let Err(write_err) = writeln!(stderr, "conduit: {}: {}", name, e) {
                warn!("could not report {} failure: {}", name, write_err);
            }
            1
        }
    }
}
