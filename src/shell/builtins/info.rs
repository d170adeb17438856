use std::path::PathBuf;

use super::{BuiltinError, BuiltinOutcome, Invocation};
use crate::utils::path::find_executable;

enum Resolution {
    Alias(String),
    Builtin,
    Executable(PathBuf),
}

fn resolve(inv: &Invocation<'_>, name: &str) -> Option<Resolution> {
    if let Some(value) = inv.session.alias(name) {
        return Some(Resolution::Alias(value));
    }
    if inv.registry.contains(name) {
        return Some(Resolution::Builtin);
    }
    let search_path = inv.session.env_var("PATH");
    find_executable(name, search_path.as_deref(), &inv.session.working_dir())
        .map(Resolution::Executable)
}

pub fn help(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    match inv.args {
        [] => {
            writeln!(inv.stdout, "Built-in commands:")?;
            for builtin in inv.registry.iter() {
                writeln!(inv.stdout, "  {:<10} {}", builtin.name, builtin.summary)?;
            }
            writeln!(inv.stdout, "Type 'help <command>' for details.")?;
        }
        [name] => match inv.registry.get(name) {
            Some(builtin) => {
                writeln!(inv.stdout, "{}: {}", builtin.name, builtin.summary)?;
                writeln!(inv.stdout, "Usage: {}", builtin.usage)?;
            }
            None => {
                writeln!(inv.stdout, "{}: external command", name)?;
                writeln!(inv.stdout, "Usage: {} [arguments...]", name)?;
            }
        },
        _ => return Err(BuiltinError::Usage("help [command]")),
    }
    Ok(BuiltinOutcome::SUCCESS)
}

pub fn which(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    if inv.args.is_empty() {
        return Err(BuiltinError::Usage("which command..."));
    }
    let mut outcome = BuiltinOutcome::SUCCESS;
    for name in inv.args {
        match resolve(inv, name) {
            Some(Resolution::Alias(value)) => {
                writeln!(inv.stdout, "{}: aliased to {}", name, value)?
            }
            Some(Resolution::Builtin) => writeln!(inv.stdout, "{}: shell built-in command", name)?,
            Some(Resolution::Executable(path)) => writeln!(inv.stdout, "{}", path.display())?,
            None => {
                writeln!(inv.stderr, "which: no {} in PATH", name)?;
                outcome = BuiltinOutcome::FAILURE;
            }
        }
    }
    Ok(outcome)
}

pub fn type_of(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    if inv.args.is_empty() {
        return Err(BuiltinError::Usage("type command..."));
    }
    let mut outcome = BuiltinOutcome::SUCCESS;
    for name in inv.args {
        match resolve(inv, name) {
            Some(Resolution::Alias(value)) => {
                writeln!(inv.stdout, "{} is aliased to `{}'", name, value)?
            }
            Some(Resolution::Builtin) => writeln!(inv.stdout, "{} is a shell builtin", name)?,
            Some(Resolution::Executable(path)) => {
                writeln!(inv.stdout, "{} is {}", name, path.display())?
            }
            None => {
                writeln!(inv.stderr, "type: {}: not found", name)?;
                outcome = BuiltinOutcome::FAILURE;
            }
        }
    }
    Ok(outcome)
}

pub fn jobs(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    for job in inv.jobs.get_jobs() {
        writeln!(inv.stdout, "{}", job)?;
    }
    Ok(BuiltinOutcome::SUCCESS)
}
