use std::fs;
use std::io;
use std::path::PathBuf;

use log::debug;

use super::{BuiltinError, BuiltinOutcome, Invocation};

pub fn cd(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    let session = inv.session;
    let (target, announce) = match inv.args {
        [] => (session.env_var("HOME").ok_or(BuiltinError::HomeNotSet)?, false),
        [dash] if dash == "-" => {
            let previous = session.previous_dir().ok_or(BuiltinError::NoPreviousDirectory)?;
            (previous.to_string_lossy().into_owned(), true)
        }
        [dir] => {
            let expanded = shellexpand::tilde_with_context(dir, || session.env_var("HOME"));
            (expanded.into_owned(), false)
        }
        _ => return Err(BuiltinError::Usage("cd [directory|-]")),
    };

    let resolved = session.resolve_path(&target);
    let canonical: PathBuf = fs::canonicalize(&resolved).map_err(|source| BuiltinError::Path {
        path: target.clone(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(BuiltinError::Path {
            path: target,
            source: io::Error::new(io::ErrorKind::Other, "Not a directory"),
        });
    }

    debug!("cd {} -> {}", target, canonical.display());
    session.set_previous_dir(session.working_dir());
    session.set_working_dir(&canonical);
    if announce {
        writeln!(inv.stdout, "{}", canonical.display())?;
    }
    Ok(BuiltinOutcome::SUCCESS)
}

pub fn pwd(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    writeln!(inv.stdout, "{}", inv.session.working_dir().display())?;
    Ok(BuiltinOutcome::SUCCESS)
}
