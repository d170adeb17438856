use super::{BuiltinError, BuiltinOutcome, Invocation};

pub fn history(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    let entries = inv.session.history();
    let count = match inv.args {
        [] => entries.len(),
        [n] => n
            .parse::<usize>()
            .map_err(|_| BuiltinError::Usage("history [n]"))?,
        _ => return Err(BuiltinError::Usage("history [n]")),
    };

    let skip = entries.len().saturating_sub(count);
    for (i, entry) in entries.iter().enumerate().skip(skip) {
        writeln!(inv.stdout, "{:4}  {}", i + 1, entry)?;
    }
    Ok(BuiltinOutcome::SUCCESS)
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn alias(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    if inv.args.is_empty() {
        for (name, value) in inv.session.aliases() {
            writeln!(inv.stdout, "alias {}='{}'", name, value)?;
        }
        return Ok(BuiltinOutcome::SUCCESS);
    }

    let mut outcome = BuiltinOutcome::SUCCESS;
    for arg in inv.args {
        match arg.split_once('=') {
            Some((name, _)) if name.is_empty() => {
                writeln!(inv.stderr, "alias: {}: invalid alias name", arg)?;
                outcome = BuiltinOutcome::FAILURE;
            }
            Some((name, value)) => inv.session.set_alias(name, strip_quotes(value)),
            None => match inv.session.alias(arg) {
                Some(value) => writeln!(inv.stdout, "alias {}='{}'", arg, value)?,
                None => {
                    writeln!(inv.stderr, "alias: {}: not found", arg)?;
                    outcome = BuiltinOutcome::FAILURE;
                }
            },
        }
    }
    Ok(outcome)
}

pub fn unalias(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    if inv.args.is_empty() {
        return Err(BuiltinError::Usage("unalias name..."));
    }
    let mut outcome = BuiltinOutcome::SUCCESS;
    for name in inv.args {
        if !inv.session.remove_alias(name) {
            writeln!(inv.stderr, "unalias: {}: not found", name)?;
            outcome = BuiltinOutcome::FAILURE;
        }
    }
    Ok(outcome)
}
