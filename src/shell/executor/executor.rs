use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use super::errors::ExecError;
use super::io::{Input, Streams};
use super::job_manager::{JobManager, JobStatus};
use super::pipeline::{self, Running};
use super::redirect;
use crate::shell::builtins::{Builtin, BuiltinError, BuiltinOutcome, Invocation, Registry};
use crate::shell::parser::Command;
use crate::shell::session::Session;
use crate::shell::signals::Foreground;
use crate::utils::path::find_executable;

/// What running one input line produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Foreground completion with the last stage's exit status.
    Status(i32),
    /// Dispatched as job `job`; `pid` is the last external stage, or the
    /// shell itself when the job has no external stage.
    Background { job: usize, pid: u32 },
    /// `exit` was run; the REPL should stop with this code.
    Exit(i32),
}

pub(super) enum Target {
    Builtin(Arc<Builtin>),
    External(PathBuf),
}

pub(super) struct Stage {
    pub command: Command,
    pub target: Target,
}

impl Stage {
    /// Stateful built-ins always run on the calling thread, even with `&`.
    fn runs_inline(&self, background: bool) -> bool {
        match &self.target {
            Target::Builtin(builtin) => !background || !builtin.pipeline_safe,
            Target::External(_) => false,
        }
    }
}

pub struct Executor {
    registry: Arc<Registry>,
    session: Arc<Session>,
    jobs: JobManager,
    foreground: Foreground,
}

impl Executor {
    pub fn new(
        registry: Arc<Registry>,
        session: Arc<Session>,
        jobs: JobManager,
        foreground: Foreground,
    ) -> Self {
        Self {
            registry,
            session,
            jobs,
            foreground,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Runs `command` against the terminal.
    pub fn execute(&self, command: Command) -> Result<Outcome, ExecError> {
        self.execute_with(command, Streams::inherit())
    }

    /// Runs `command` with `streams` standing in for the terminal: the first
    /// stage reads `streams.stdin`, the last writes `streams.stdout`, and
    /// every stage shares `streams.stderr`.
    pub fn execute_with(
        &self,
        command: Command,
        mut streams: Streams,
    ) -> Result<Outcome, ExecError> {
        let command = self.expand_alias(command);
        let background = command.background;
        let line = command.display_line();
        debug!("executing `{}` (background: {})", line, background);

        let in_pipeline = command.stage_count() > 1;
        let mut stages = command
            .into_stages()
            .into_iter()
            .map(|stage| self.classify(stage, in_pipeline))
            .collect::<Result<Vec<_>, _>>()?;

        if !in_pipeline && stages.iter().all(|s| s.runs_inline(background)) {
            if let Some(stage) = stages.pop() {
                return self.run_inline(stage, streams);
            }
        }

        if background && matches!(streams.stdin, Input::Inherit) {
            streams.stdin = Input::Null;
        }
        let running = pipeline::launch(self, stages, streams, background)?;
        if background {
            self.dispatch_background(running, line)
        } else {
            self.wait_foreground(running)
        }
    }

    /// Replaces the head's name with the alias expansion. Only the first
    /// stage is expanded, and only once.
    fn expand_alias(&self, mut command: Command) -> Command {
        let Some(expansion) = self.session.alias(&command.name) else {
            return command;
        };
        let mut words = expansion.split_whitespace().map(str::to_string);
        let Some(name) = words.next() else {
            warn!("alias {} is empty; running it unexpanded", command.name);
            return command;
        };
        debug!("alias {} -> {}", command.name, expansion);
        let mut arguments: Vec<String> = words.collect();
        arguments.append(&mut command.arguments);
        command.name = name;
        command.arguments = arguments;
        command
    }

    /// Built-ins take precedence over executables of the same name.
    fn classify(&self, command: Command, in_pipeline: bool) -> Result<Stage, ExecError> {
        if let Some(builtin) = self.registry.get(&command.name) {
            if in_pipeline && !builtin.pipeline_safe {
                return Err(ExecError::UnsupportedBuiltinInPipeline(command.name));
            }
            return Ok(Stage {
                command,
                target: Target::Builtin(builtin),
            });
        }

        let search_path = self.session.env_var("PATH");
        match find_executable(&command.name, search_path.as_deref(), &self.session.working_dir()) {
            Some(path) => {
                debug!("resolved {} to {}", command.name, path.display());
                Ok(Stage {
                    command,
                    target: Target::External(path),
                })
            }
            None => Err(ExecError::CommandNotFound(command.name)),
        }
    }

    fn run_inline(&self, stage: Stage, streams: Streams) -> Result<Outcome, ExecError> {
        let Stage { command, target } = stage;
        let Target::Builtin(builtin) = target else {
            return Err(ExecError::CommandNotFound(command.name));
        };

        let streams = match &command.redirect {
            Some(redirect) => redirect::apply(redirect, streams, &self.session)?,
            None => streams,
        };
        let mut stdin = streams.stdin.into_reader();
        let mut stdout = streams.stdout.into_stdout_writer();
        let mut stderr = streams.stderr.into_stderr_writer();

        let result = builtin.run(&mut Invocation {
            args: &command.arguments,
            session: &self.session,
            registry: &self.registry,
            jobs: &self.jobs,
            stdin: &mut stdin,
            stdout: &mut stdout,
            stderr: &mut stderr,
        });
        let result = result.and_then(|outcome| {
            stdout.flush()?;
            Ok(outcome)
        });

        match result {
            Ok(BuiltinOutcome::Status(code)) => Ok(Outcome::Status(code)),
            Ok(BuiltinOutcome::Exit(code)) => {
                info!("exit requested with code {}", code);
                Ok(Outcome::Exit(code))
            }
            Err(BuiltinError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                Ok(Outcome::Status(pipeline::BROKEN_PIPE_STATUS))
            }
            Err(source) => Err(ExecError::Builtin {
                name: command.name,
                source,
            }),
        }
    }

    fn wait_foreground(&self, running: Vec<Running>) -> Result<Outcome, ExecError> {
        let _tracked = self.foreground.track(running.iter().filter_map(Running::pid));
        let finished = pipeline::wait_all(running)?;
        Ok(Outcome::Status(finished.code))
    }

    fn dispatch_background(
        &self,
        running: Vec<Running>,
        line: String,
    ) -> Result<Outcome, ExecError> {
        let pid = running
            .iter()
            .rev()
            .find_map(Running::pid)
            .unwrap_or_else(std::process::id);
        let job = self.jobs.add_job(pid, line);

        let jobs = self.jobs.clone();
        thread::Builder::new()
            .name(format!("job-{}", job))
            .spawn(move || {
                let status = match pipeline::wait_all(running) {
                    Ok(finished) => JobStatus::from_code(finished.code, finished.signaled),
                    Err(e) => {
                        warn!("job [{}]: {}", job, e);
                        JobStatus::Exited(1)
                    }
                };
                jobs.finish_job(job, status);
            })
            .map_err(|source| ExecError::Spawn {
                name: format!("job [{}] waiter", job),
                source,
            })?;

        Ok(Outcome::Background { job, pid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::executor::io::Output;
    use crate::shell::parser::parse;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, Instant};

    struct Fixture {
        dir: tempfile::TempDir,
        executor: Executor,
    }

    #[allow(clippy::unwrap_used)]
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::new(fs::canonicalize(dir.path()).unwrap(), 100));
        let executor = Executor::new(
            Arc::new(Registry::standard()),
            session,
            JobManager::new(),
            Foreground::default(),
        );
        Fixture { dir, executor }
    }

    impl Fixture {
        fn path(&self, name: &str) -> std::path::PathBuf {
            self.dir.path().join(name)
        }

        fn run(&self, line: &str) -> Result<Outcome, ExecError> {
            self.executor.execute(parse_ok(line))
        }

        /// Runs `line` with stdout and stderr captured in files.
        #[allow(clippy::unwrap_used)]
        fn capture(&self, line: &str) -> (Result<Outcome, ExecError>, String, String) {
            let out = File::create(self.path(".stdout")).unwrap();
            let err = File::create(self.path(".stderr")).unwrap();
            let streams = Streams {
                stdin: Input::Null,
                stdout: Output::File(out),
                stderr: Output::File(err),
            };
            let result = self.executor.execute_with(parse_ok(line), streams);
            (
                result,
                fs::read_to_string(self.path(".stdout")).unwrap(),
                fs::read_to_string(self.path(".stderr")).unwrap(),
            )
        }
    }

    #[allow(clippy::unwrap_used)]
    fn parse_ok(line: &str) -> Command {
        parse(line).unwrap()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn test_external_pipeline_sorts() {
        let fx = fixture();
        let (result, stdout, _) = fx.capture(r"printf 'b\na\nc\n' | sort");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert_eq!(stdout, "a\nb\nc\n");
    }

    #[test]
    fn test_long_pipeline_connects_every_stage() {
        let fx = fixture();
        let (result, stdout, _) = fx.capture(r"printf 'x\ny\nx\nz\n' | sort | uniq | wc -l");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert_eq!(stdout.trim(), "3");
    }

    #[test]
    fn test_redirect_round_trip() {
        let fx = fixture();
        assert!(matches!(fx.run("echo hi > out.txt"), Ok(Outcome::Status(0))));
        assert_eq!(read(&fx.path("out.txt")), "hi\n");

        let (result, stdout, _) = fx.capture("cat < out.txt");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert_eq!(stdout, "hi\n");

        assert!(matches!(fx.run("printf more >> out.txt"), Ok(Outcome::Status(0))));
        assert_eq!(read(&fx.path("out.txt")), "hi\nmore");
    }

    #[test]
    fn test_stderr_redirects() {
        let fx = fixture();
        assert!(fx.run("sh -c 'echo oops >&2' 2> err.txt").is_ok());
        assert_eq!(read(&fx.path("err.txt")), "oops\n");

        assert!(fx.run("sh -c 'echo out; echo err >&2' &> both.txt").is_ok());
        let both = read(&fx.path("both.txt"));
        assert!(both.contains("out\n") && both.contains("err\n"));
    }

    #[test]
    fn test_missing_input_file_is_an_error() {
        let fx = fixture();
        assert!(matches!(fx.run("cat < absent.txt"), Err(ExecError::Redirect { .. })));
    }

    #[test]
    fn test_unknown_command_is_not_found() {
        let fx = fixture();
        match fx.run("conduit-definitely-missing --flag") {
            Err(ExecError::CommandNotFound(name)) => assert_eq!(name, "conduit-definitely-missing"),
            other => panic!("unexpected: {other:?}"),
        }
        // a pipeline with one unknown stage starts nothing
        let (result, stdout, _) = fx.capture("echo hi | conduit-definitely-missing");
        assert!(matches!(result, Err(ExecError::CommandNotFound(_))));
        assert!(stdout.is_empty());
    }

    #[test]
    fn test_nonzero_exit_is_a_status() {
        let fx = fixture();
        assert!(matches!(fx.run("false"), Ok(Outcome::Status(1))));
        assert!(matches!(fx.run("sh -c 'exit 7'"), Ok(Outcome::Status(7))));
        assert!(matches!(fx.run("sh -c 'kill -TERM $$'"), Ok(Outcome::Status(143))));
    }

    #[test]
    fn test_builtins_participate_in_pipelines() {
        let fx = fixture();
        let (result, stdout, _) = fx.capture("echo three two one | xargs -n1 | sort");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert_eq!(stdout, "one\nthree\ntwo\n");

        let (_, stdout, _) = fx.capture("pwd | cat");
        assert_eq!(
            stdout.trim_end(),
            fx.executor.session().working_dir().display().to_string()
        );
    }

    #[test]
    fn test_stateful_builtin_rejected_in_pipeline() {
        let fx = fixture();
        match fx.run("cd / | cat") {
            Err(ExecError::UnsupportedBuiltinInPipeline(name)) => assert_eq!(name, "cd"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            fx.run("echo hi | exit"),
            Err(ExecError::UnsupportedBuiltinInPipeline(_))
        ));
    }

    #[test]
    fn test_exit_sentinel() {
        let fx = fixture();
        assert!(matches!(fx.run("exit"), Ok(Outcome::Exit(0))));
        assert!(matches!(fx.run("exit 4"), Ok(Outcome::Exit(4))));
        assert!(matches!(fx.run("exit nope"), Err(ExecError::Builtin { .. })));
    }

    #[test]
    fn test_cd_changes_child_working_directory() {
        let fx = fixture();
        fs::create_dir(fx.path("nested")).ok();
        assert!(matches!(fx.run("cd nested"), Ok(Outcome::Status(0))));
        assert!(fx.run("sh -c 'pwd > here.txt'").is_ok());
        let here = read(&fx.path("nested/here.txt"));
        assert!(here.trim_end().ends_with("/nested"), "got {here:?}");
    }

    #[test]
    fn test_alias_expands_head_only() {
        let fx = fixture();
        fx.executor.session().set_alias("say", "printf %s-%s");
        fx.executor.session().set_alias("up", "tr a-z A-Z");

        let (result, stdout, _) = fx.capture("say a b");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert_eq!(stdout, "a-b");

        // `up` in the second stage is not an alias lookup
        let (result, _, _) = fx.capture("say a b | up");
        assert!(matches!(result, Err(ExecError::CommandNotFound(name)) if name == "up"));
    }

    #[test]
    fn test_export_reaches_children() {
        let fx = fixture();
        assert!(fx.run("export CONDUIT_CHILD_VAR=visible").is_ok());
        let (_, stdout, _) = fx.capture("sh -c 'printf %s \"$CONDUIT_CHILD_VAR\"'");
        assert_eq!(stdout, "visible");
        assert!(std::env::var("CONDUIT_CHILD_VAR").is_err());
    }

    #[test]
    fn test_redirect_on_inner_stage_severs_pipe() {
        let fx = fixture();
        let (result, stdout, stderr) = fx.capture("echo kept > mid.txt | wc -c");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert_eq!(read(&fx.path("mid.txt")), "kept\n");
        assert_eq!(stdout.trim(), "0");
        assert!(stderr.contains("warning: echo"), "got {stderr:?}");
    }

    #[test]
    fn test_builtin_stage_survives_closed_reader() {
        let fx = fixture();
        let (result, stdout, stderr) = fx.capture("help | true");
        assert!(matches!(result, Ok(Outcome::Status(0))));
        assert!(stdout.is_empty());
        assert!(stderr.is_empty());
    }

    #[test]
    fn test_background_returns_before_child_exits() {
        let fx = fixture();
        let started = Instant::now();
        let outcome = fx.run("sleep 1 &");
        let elapsed = started.elapsed();

        let (job, pid) = match outcome {
            Ok(Outcome::Background { job, pid }) => (job, pid),
            other => panic!("unexpected: {other:?}"),
        };
        assert!(elapsed < Duration::from_millis(500), "blocked for {elapsed:?}");
        assert_ne!(pid, std::process::id());
        assert!(fx.executor.jobs().get_jobs().iter().any(|j| j.index == job));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !fx.executor.jobs().get_jobs().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(fx.executor.jobs().get_jobs().is_empty());
    }

    #[test]
    fn test_background_builtin_uses_shell_pid() {
        let fx = fixture();
        match fx.run("echo quiet > bg.txt &") {
            Ok(Outcome::Background { pid, .. }) => assert_eq!(pid, std::process::id()),
            other => panic!("unexpected: {other:?}"),
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while !fx.executor.jobs().get_jobs().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(read(&fx.path("bg.txt")), "quiet\n");
    }

    #[test]
    fn test_stateful_builtin_ignores_background() {
        let fx = fixture();
        assert!(matches!(fx.run("cd / &"), Ok(Outcome::Status(0))));
        assert_eq!(fx.executor.session().working_dir(), PathBuf::from("/"));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_spawn_failure_reaps_started_stages() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        fs::create_dir(&gone).unwrap();

        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let registry = Registry::standard().with(Builtin::new("emit", "", "emit", move |inv| {
            // the reader may already be gone
            let written = writeln!(inv.stdout, "payload");
            flag.store(true, Ordering::SeqCst);
            written?;
            Ok(BuiltinOutcome::SUCCESS)
        }));
        let executor = Executor::new(
            Arc::new(registry),
            Arc::new(Session::new(gone.clone(), 10)),
            JobManager::new(),
            Foreground::default(),
        );
        // the external stage now fails to start in a missing directory
        fs::remove_dir(&gone).unwrap();

        let started = Instant::now();
        let result = executor.execute(parse_ok("emit | cat"));
        assert!(
            matches!(&result, Err(ExecError::Spawn { name, .. }) if name == "cat"),
            "got {result:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(finished.load(Ordering::SeqCst), "built-in stage was not joined");
    }
}
