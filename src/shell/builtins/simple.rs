use super::{BuiltinError, BuiltinOutcome, Invocation};

pub fn echo(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    writeln!(inv.stdout, "{}", inv.args.join(" "))?;
    Ok(BuiltinOutcome::SUCCESS)
}

pub fn exit(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    match inv.args {
        [] => Ok(BuiltinOutcome::Exit(0)),
        [code] => code
            .parse::<i32>()
            .map(BuiltinOutcome::Exit)
            .map_err(|_| BuiltinError::Usage("exit [code]")),
        _ => Err(BuiltinError::Usage("exit [code]")),
    }
}
