use super::{BuiltinError, BuiltinOutcome, Invocation};

/// Read-only, so it stays usable as a pipeline stage. Assignments go
/// through `export`.
pub fn env(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    if inv.args.is_empty() {
        return list(inv);
    }

    let mut outcome = BuiltinOutcome::SUCCESS;
    for arg in inv.args {
        if arg.contains('=') {
            writeln!(inv.stderr, "env: {}: use export to set variables", arg)?;
            outcome = BuiltinOutcome::FAILURE;
        } else if !show(inv, arg)? {
            outcome = BuiltinOutcome::FAILURE;
        }
    }
    Ok(outcome)
}

/// Lists the merged environment, or for each argument either sets
/// `NAME=value` in the session overlay or prints the value of `NAME`.
pub fn export(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    if inv.args.is_empty() {
        return list(inv);
    }

    let mut outcome = BuiltinOutcome::SUCCESS;
    for arg in inv.args {
        match arg.split_once('=') {
            Some((key, _)) if !is_valid_name(key) => {
                writeln!(inv.stderr, "export: {}: not a valid identifier", key)?;
                outcome = BuiltinOutcome::FAILURE;
            }
            Some((key, value)) => inv.session.set_env(key, value),
            None => {
                if !show(inv, arg)? {
                    outcome = BuiltinOutcome::FAILURE;
                }
            }
        }
    }
    Ok(outcome)
}

fn list(inv: &mut Invocation<'_>) -> Result<BuiltinOutcome, BuiltinError> {
    for (key, value) in inv.session.merged_env() {
        writeln!(inv.stdout, "{}={}", key, value)?;
    }
    Ok(BuiltinOutcome::SUCCESS)
}

/// Prints the value of `key`; false when it is unset.
fn show(inv: &mut Invocation<'_>, key: &str) -> Result<bool, BuiltinError> {
    match inv.session.env_var(key) {
        Some(value) => {
            writeln!(inv.stdout, "{}", value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::shell::session::Session;

    #[test]
    fn test_export_sets_overlay_only() {
        let harness = Harness::new(Session::new("/", 10));
        let out = harness.run("export", &["CONDUIT_ENV_TEST=one=two"]);
        assert!(matches!(out.result, Ok(BuiltinOutcome::Status(0))));
        assert_eq!(
            harness.session.env_var("CONDUIT_ENV_TEST").as_deref(),
            Some("one=two")
        );
        assert!(std::env::var("CONDUIT_ENV_TEST").is_err());

        assert_eq!(harness.run("env", &["CONDUIT_ENV_TEST"]).stdout, "one=two\n");
    }

    #[test]
    fn test_env_listing_is_sorted_and_merged() {
        let harness = Harness::new(Session::new("/", 10));
        harness.session.set_env("CONDUIT_ENV_LISTED", "yes");
        let listing = harness.run("env", &[]).stdout;
        assert!(listing.lines().any(|l| l == "CONDUIT_ENV_LISTED=yes"));

        let keys: Vec<&str> = listing
            .lines()
            .filter_map(|l| l.split_once('='))
            .map(|(k, _)| k)
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_invalid_names_and_unset_lookup() {
        let harness = Harness::new(Session::new("/", 10));
        let out = harness.run("export", &["1X=2"]);
        assert!(matches!(out.result, Ok(BuiltinOutcome::Status(1))));
        assert_eq!(out.stderr, "export: 1X: not a valid identifier\n");

        let out = harness.run("env", &["CONDUIT_ENV_NEVER_SET"]);
        assert!(matches!(out.result, Ok(BuiltinOutcome::Status(1))));
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn test_env_does_not_assign() {
        let harness = Harness::new(Session::new("/", 10));
        let out = harness.run("env", &["CONDUIT_ENV_READONLY=1"]);
        assert!(matches!(out.result, Ok(BuiltinOutcome::Status(1))));
        assert_eq!(
            out.stderr,
            "env: CONDUIT_ENV_READONLY=1: use export to set variables\n"
        );
        assert!(harness.session.env_var("CONDUIT_ENV_READONLY").is_none());
    }
}
