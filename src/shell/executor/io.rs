use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;

use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::pipe;

/// Where a stage reads standard input from.
#[derive(Debug)]
pub enum Input {
    Inherit,
    Null,
    Pipe(File),
    File(File),
}

/// Where a stage writes one of its output streams.
#[derive(Debug)]
pub enum Output {
    Inherit,
    Null,
    Pipe(File),
    File(File),
}

impl Input {
    pub fn into_stdio(self) -> Stdio {
        match self {
            Input::Inherit => Stdio::inherit(),
            Input::Null => Stdio::null(),
            Input::Pipe(f) | Input::File(f) => Stdio::from(f),
        }
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self {
            Input::Inherit => Box::new(io::stdin()),
            Input::Null => Box::new(io::empty()),
            Input::Pipe(f) | Input::File(f) => Box::new(f),
        }
    }
}

impl Output {
    pub fn try_clone(&self) -> io::Result<Output> {
        Ok(match self {
            Output::Inherit => Output::Inherit,
            Output::Null => Output::Null,
            Output::Pipe(f) => Output::Pipe(f.try_clone()?),
            Output::File(f) => Output::File(f.try_clone()?),
        })
    }

    pub fn into_stdio(self) -> Stdio {
        match self {
            Output::Inherit => Stdio::inherit(),
            Output::Null => Stdio::null(),
            Output::Pipe(f) | Output::File(f) => Stdio::from(f),
        }
    }

    pub fn into_stdout_writer(self) -> Box<dyn Write + Send> {
        match self {
            Output::Inherit => Box::new(io::stdout()),
            other => other.into_file_writer(),
        }
    }

    pub fn into_stderr_writer(self) -> Box<dyn Write + Send> {
        match self {
            Output::Inherit => Box::new(io::stderr()),
            other => other.into_file_writer(),
        }
    }

    fn into_file_writer(self) -> Box<dyn Write + Send> {
        match self {
            Output::Pipe(f) | Output::File(f) => Box::new(f),
            Output::Inherit | Output::Null => Box::new(io::sink()),
        }
    }
}

/// The three standard streams of one command or pipeline stage.
#[derive(Debug)]
pub struct Streams {
    pub stdin: Input,
    pub stdout: Output,
    pub stderr: Output,
}

impl Streams {
    /// All three streams go to the controlling terminal.
    pub fn inherit() -> Self {
        Self {
            stdin: Input::Inherit,
            stdout: Output::Inherit,
            stderr: Output::Inherit,
        }
    }

    /// Writes a one-line diagnostic to this command's stderr.
    pub fn warn(&self, message: &str) {
        let result = match &self.stderr {
            Output::Inherit => writeln!(io::stderr().lock(), "{}", message),
            Output::Null => Ok(()),
            Output::Pipe(f) | Output::File(f) => {
                let mut f: &File = f;
                writeln!(f, "{}", message)
            }
        };
        if let Err(e) = result {
            log::warn!("could not write diagnostic: {}", e);
        }
    }
}

/// Creates an anonymous pipe as `(reader, writer)` with both ends marked
/// close-on-exec, so only the stage that is handed an end ever holds it.
pub fn cloexec_pipe() -> nix::Result<(File, File)> {
    let (reader, writer): (OwnedFd, OwnedFd) = pipe()?;
    for fd in [&reader, &writer] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((File::from(reader), File::from(writer)))
}
