use log::{debug, error, info, warn};
use std::env;
use std::error::Error as StdError;
use std::io::Write;
use std::sync::Arc;

use signal_hook::consts::SIGINT;
use thiserror::Error;

use crate::shell::builtins::Registry;
use crate::shell::executor::job_manager::JobManager;
use crate::shell::executor::{ExecError, Executor, Outcome};
use crate::shell::parser::{parse, ParseError};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::session::Session;
use crate::shell::signals::{self, Pending};
use crate::utils::config::Config;
use crate::utils::path::tilde_path;
use crate::utils::theme::Theme;

#[derive(Error, Debug)]
pub enum LineError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Parses and runs one line. Blank lines are a `Status(0)` no-op.
pub fn evaluate(executor: &Executor, line: &str) -> Result<Outcome, LineError> {
    if line.trim().is_empty() {
        return Ok(Outcome::Status(0));
    }
    let command = parse(line)?;
    Ok(executor.execute(command)?)
}

enum Flow {
    Continue,
    Stop(i32),
}

/// Consumes the pending signal, if any, and prints its notice to `out`.
fn take_signal(pending: &Pending, theme: &Theme, out: &mut dyn Write) -> Flow {
    let (flow, key) = match pending.take() {
        None => return Flow::Continue,
        Some(SIGINT) => {
            debug!("SIGINT while running a command");
            (Flow::Continue, "interrupt_signal")
        }
        Some(signal) => {
            warn!("terminating on signal {}", signal);
            (Flow::Stop(128 + signal), "terminate_signal")
        }
    };
    if let Err(e) = writeln!(out, "{}", (theme.warning_style)(theme.get_message(key))) {
        warn!("could not print signal notice: {}", e);
    }
    flow
}

pub struct Shell<'a> {
    theme: Theme,
    readline: ReadlineManager<'a>,
    executor: Executor,
    pending: Pending,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, Box<dyn StdError>> {
        let signals = signals::install()?;
        let session = Arc::new(Session::new(env::current_dir()?, config.history_limit));
        let executor = Executor::new(
            Arc::new(Registry::standard()),
            session,
            JobManager::new(),
            signals.foreground.clone(),
        );
        let theme = Theme::load(&config.theme);
        debug!("using theme {}", theme.name);
        Ok(Self {
            theme,
            readline: ReadlineManager::new(config)?,
            executor,
            pending: signals.pending.clone(),
        })
    }

    /// Runs the interactive loop and returns the shell's exit status.
    pub fn run(&mut self) -> Result<i32, Box<dyn StdError>> {
        debug!("starting conduit");
        self.readline.load_history();

        println!("{}", (self.theme.success_style)(self.theme.get_message("welcome")));
        println!("{}", (self.theme.warning_style)(self.theme.get_message("help")));

        let code = self.run_loop()?;
        self.readline.save_history();

        info!("leaving conduit with status {}", code);
        Ok(code)
    }

    fn prompt(&self) -> String {
        let session = self.executor.session();
        let home = session.env_var("HOME");
        self.theme
            .prompt(&tilde_path(&session.working_dir(), home.as_deref()))
    }

    fn run_loop(&mut self) -> Result<i32, Box<dyn StdError>> {
        loop {
            if let Flow::Stop(code) = self.check_signals() {
                return Ok(code);
            }

            std::io::stdout().flush()?;
            let prompt = self.prompt();

            match self.readline.readline(&prompt) {
                Ok(line) => {
                    if let Flow::Stop(code) = self.handle_input(&line) {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Eof) => {
                    warn!("EOF on input");
                    println!(
                        "\n{}",
                        (self.theme.warning_style)(self.theme.get_message("eof_signal"))
                    );
                    return Ok(0);
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("interrupted at the prompt");
                    self.pending.take();
                    println!(
                        "{}",
                        (self.theme.warning_style)(self.theme.get_message("interrupt_signal"))
                    );
                }
                Err(err) => {
                    error!("readline failed: {}", err);
                    return Err(err.into());
                }
            }
        }
    }

    fn check_signals(&mut self) -> Flow {
        take_signal(&self.pending, &self.theme, &mut std::io::stdout())
    }

    fn handle_input(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }

        self.executor.session().add_history(line);
        if let Err(e) = self.readline.add_history(line) {
            warn!("could not add history entry: {}", e);
        }
        debug!("running: {}", line);

        match evaluate(&self.executor, line) {
            Ok(Outcome::Status(code)) => {
                debug!("status {}", code);
                Flow::Continue
            }
            Ok(Outcome::Background { job, pid }) => {
                debug!("job [{}] running as {}", job, pid);
                Flow::Continue
            }
            Ok(Outcome::Exit(code)) => {
                println!("{}", (self.theme.success_style)(self.theme.get_message("exit")));
                Flow::Stop(code)
            }
            Err(e) => {
                error!("{}", e);
                eprintln!("{}", self.theme.error_line(&e.to_string()));
                Flow::Continue
            }
        }
    }
}
